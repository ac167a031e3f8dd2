use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::asset::{self, AssetError, AssetStore};
use crate::backend::{Backend, BackendError, TextureDesc, TextureFilter, TextureId};

/// Failure to create a [`Texture`].
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("texture dimensions {width}x{height} are invalid")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("pixel buffer is {actual} bytes, expected {expected} for tightly packed RGBA8")]
    SizeMismatch { expected: usize, actual: usize },
    /// The asset was missing or not a decodable image.
    #[error("failed to decode texture asset")]
    Decode(#[from] AssetError),
    /// The image decoded fine but the GPU upload failed.
    #[error("failed to upload texture")]
    Upload(#[from] BackendError),
}

/// A GPU-resident RGBA8 image.
///
/// Owned by whoever created it; the GPU object is released when the value is
/// dropped. The backend handle keeps the graphics context alive, so a texture
/// can never outlive the context it was created on.
pub struct Texture<B: Backend> {
    backend: Rc<B>,
    id: TextureId,
    width: u32,
    height: u32,
}

impl<B: Backend> Texture<B> {
    /// Uploads a tightly packed RGBA8 buffer of exactly `width * height * 4`
    /// bytes.
    pub fn from_pixels(
        backend: &Rc<B>,
        width: u32,
        height: u32,
        rgba: &[u8],
        filter: TextureFilter,
    ) -> Result<Self, TextureError> {
        let desc = TextureDesc {
            width,
            height,
            filter,
        };
        let expected = match desc.byte_len() {
            Some(len) if width > 0 && height > 0 => len,
            _ => return Err(TextureError::InvalidDimensions { width, height }),
        };
        if rgba.len() != expected {
            return Err(TextureError::SizeMismatch {
                expected,
                actual: rgba.len(),
            });
        }

        let id = backend.create_texture(&desc, rgba)?;
        log::trace!("texture {} uploaded ({width}x{height}, {filter:?})", id.raw());

        Ok(Self {
            backend: Rc::clone(backend),
            id,
            width,
            height,
        })
    }

    /// Reads and decodes `path` from `store`, then uploads it.
    ///
    /// Missing and malformed assets yield [`TextureError::Decode`]; no fallback
    /// texture is substituted.
    pub fn from_asset<S>(
        backend: &Rc<B>,
        store: &S,
        path: &str,
        filter: TextureFilter,
    ) -> Result<Self, TextureError>
    where
        S: AssetStore + ?Sized,
    {
        let image = asset::decode_rgba8(store, path)?;
        Self::from_pixels(backend, image.width, image.height, &image.pixels, filter)
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether this texture was created on `backend`.
    pub fn belongs_to(&self, backend: &Rc<B>) -> bool {
        Rc::ptr_eq(&self.backend, backend)
    }

    /// Binds this texture for the next draw.
    pub(crate) fn bind(&self) {
        self.backend.bind_texture(self.id);
    }
}

impl<B: Backend> Drop for Texture<B> {
    fn drop(&mut self) {
        self.backend.delete_texture(self.id);
    }
}

impl<B: Backend> fmt::Debug for Texture<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MemoryAssetStore;
    use crate::backend::{ResourceKind, SoftwareBackend};

    fn backend() -> Rc<SoftwareBackend> {
        Rc::new(SoftwareBackend::new(4, 4))
    }

    #[test]
    fn from_pixels_records_dimensions() {
        let backend = backend();
        let tex = Texture::from_pixels(&backend, 2, 3, &[0; 24], TextureFilter::Nearest).unwrap();
        assert_eq!((tex.width(), tex.height()), (2, 3));
        assert_eq!(backend.stats().live(ResourceKind::Texture), 1);
    }

    #[test]
    fn short_buffer_is_rejected_before_upload() {
        let backend = backend();
        let err = Texture::from_pixels(&backend, 2, 2, &[0; 15], TextureFilter::Nearest).unwrap_err();
        assert!(matches!(
            err,
            TextureError::SizeMismatch {
                expected: 16,
                actual: 15
            }
        ));
        assert_eq!(backend.stats().created(ResourceKind::Texture), 0);
    }

    #[test]
    fn zero_sized_texture_is_rejected() {
        let backend = backend();
        assert!(matches!(
            Texture::from_pixels(&backend, 0, 4, &[], TextureFilter::Linear),
            Err(TextureError::InvalidDimensions { width: 0, height: 4 })
        ));
    }

    #[test]
    fn missing_asset_is_a_decode_error() {
        let backend = backend();
        let store = MemoryAssetStore::new();
        let err = Texture::from_asset(&backend, &store, "missing.png", TextureFilter::Nearest)
            .unwrap_err();
        assert!(matches!(err, TextureError::Decode(AssetError::NotFound(_))));
        assert_eq!(backend.stats().created(ResourceKind::Texture), 0);
    }

    #[test]
    fn malformed_asset_is_a_decode_error() {
        let backend = backend();
        let store = MemoryAssetStore::new().with("broken.png", vec![0x89, b'P', b'N', b'G']);
        let err = Texture::from_asset(&backend, &store, "broken.png", TextureFilter::Nearest)
            .unwrap_err();
        assert!(matches!(err, TextureError::Decode(AssetError::Malformed { .. })));
    }

    #[test]
    fn drop_releases_exactly_once() {
        let backend = backend();
        let tex = Texture::from_pixels(&backend, 1, 1, &[1, 2, 3, 4], TextureFilter::Nearest).unwrap();
        drop(tex);
        let stats = backend.stats();
        assert_eq!(stats.released(ResourceKind::Texture), 1);
        assert_eq!(stats.live(ResourceKind::Texture), 0);
        assert_eq!(stats.invalid_releases(), 0);
    }
}
