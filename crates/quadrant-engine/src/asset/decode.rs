use super::{AssetError, AssetStore};

/// An image converted to tightly packed RGBA8, row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Reads `path` from `store` and decodes it to RGBA8.
///
/// The format is sniffed from the content, not the extension.
pub fn decode_rgba8<S>(store: &S, path: &str) -> Result<DecodedImage, AssetError>
where
    S: AssetStore + ?Sized,
{
    let bytes = store.read(path)?;
    let image = image::load_from_memory(&bytes).map_err(|source| AssetError::Malformed {
        path: path.to_string(),
        source,
    })?;

    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    log::debug!("decoded asset `{path}` ({width}x{height})");

    Ok(DecodedImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MemoryAssetStore;

    fn png(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
        let img = image::RgbaImage::from_raw(width, height, pixels.to_vec()).unwrap();
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_to_rgba8() {
        let pixels = [255, 0, 0, 255, 0, 255, 0, 128];
        let store = MemoryAssetStore::new().with("two.png", png(2, 1, &pixels));
        let decoded = decode_rgba8(&store, "two.png").unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 1));
        assert_eq!(decoded.pixels, pixels);
    }

    #[test]
    fn garbage_is_malformed() {
        let store = MemoryAssetStore::new().with("bad.png", b"definitely not an image".to_vec());
        assert!(matches!(
            decode_rgba8(&store, "bad.png"),
            Err(AssetError::Malformed { .. })
        ));
    }

    #[test]
    fn missing_is_not_found() {
        let store = MemoryAssetStore::new();
        assert!(matches!(decode_rgba8(&store, "gone.png"), Err(AssetError::NotFound(_))));
    }
}
