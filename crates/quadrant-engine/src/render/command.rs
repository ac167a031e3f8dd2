use std::fmt;

use glam::Mat4;

use crate::backend::Backend;

use super::Texture;

/// One quad to draw this frame.
///
/// The texture is borrowed: it must outlive the frame it is submitted in, and
/// the renderer never takes ownership. `None` draws with the renderer's opaque
/// white fallback.
pub struct DrawCommand<'a, B: Backend> {
    pub transform: Mat4,
    pub texture: Option<&'a Texture<B>>,
}

impl<'a, B: Backend> DrawCommand<'a, B> {
    /// An untextured quad.
    pub fn new(transform: Mat4) -> Self {
        Self {
            transform,
            texture: None,
        }
    }

    pub fn textured(transform: Mat4, texture: &'a Texture<B>) -> Self {
        Self {
            transform,
            texture: Some(texture),
        }
    }
}

impl<B: Backend> Clone for DrawCommand<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Backend> Copy for DrawCommand<'_, B> {}

impl<B: Backend> fmt::Debug for DrawCommand<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawCommand")
            .field("transform", &self.transform)
            .field("texture", &self.texture.map(|t| t.id()))
            .finish()
    }
}
