use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::{Mat4, Vec2};
use winit::window::Window;

use crate::asset::AssetStore;
use crate::backend::{Backend, BackendError, TextureFilter, WgpuBackend};
use crate::device::{GpuInit, PresentError};

use super::projection::{screen_to_world, viewport_projection};
use super::shader::{QUAD_SHADER, ShaderSource};
use super::{Color, DrawCommand, QuadMesh, ShaderPipeline, Texture, TextureError};

/// Renderer configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererConfig {
    /// Background color written at the start of every frame.
    pub clear_color: Color,
    /// Sampling policy for textures created through the renderer.
    pub texture_filter: TextureFilter,
    /// Program sources. A program that fails to build is logged and frames
    /// are then only cleared.
    pub shader: ShaderSource,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: Color::YELLOW,
            texture_filter: TextureFilter::Nearest,
            shader: QUAD_SHADER,
        }
    }
}

/// Draws lists of transformed, textured quads into a window.
///
/// Construction performs all one-time setup (program, quad mesh, fallback
/// texture) and fails only on unrecoverable errors. Each [`do_frame`] call
/// clears, draws the commands in order and presents.
///
/// Must be used from the thread that created it; the `Rc` backend handle makes
/// the type `!Send`.
///
/// [`do_frame`]: Self::do_frame
pub struct Renderer<B: Backend> {
    // Fields drop top to bottom: program, mesh, fallback texture, then this
    // renderer's handle on the context.
    pipeline: ShaderPipeline<B>,
    mesh: QuadMesh<B>,
    white: Texture<B>,
    backend: Rc<B>,

    config: RendererConfig,
    projection: Mat4,
    viewport: (u32, u32),
}

impl Renderer<WgpuBackend> {
    /// Creates the GPU context for `window` and a renderer on top of it.
    pub fn for_window(
        window: Arc<Window>,
        gpu_init: GpuInit,
        config: RendererConfig,
    ) -> Result<Self> {
        let backend = WgpuBackend::new(window, gpu_init)?;
        Self::new(backend, config)
    }
}

impl<B: Backend> Renderer<B> {
    pub fn new(backend: B, config: RendererConfig) -> Result<Self> {
        Self::with_shared(Rc::new(backend), config)
    }

    /// Builds a renderer on an already shared backend.
    pub fn with_shared(backend: Rc<B>, config: RendererConfig) -> Result<Self> {
        let pipeline = ShaderPipeline::build(&backend, &config.shader);
        let mesh = QuadMesh::upload(&backend).context("failed to upload the quad mesh")?;
        let white = Color::WHITE.to_rgba8();
        let white = Texture::from_pixels(&backend, 1, 1, &white, TextureFilter::Nearest)
            .context("failed to create the fallback texture")?;

        let viewport = backend.drawable_size();
        let projection = viewport_projection(viewport.0, viewport.1).unwrap_or(Mat4::IDENTITY);

        log::info!("renderer ready ({}x{})", viewport.0, viewport.1);

        Ok(Self {
            pipeline,
            mesh,
            white,
            backend,
            config,
            projection,
            viewport,
        })
    }

    /// Renders and presents one frame.
    ///
    /// Commands are drawn in slice order, later ones on top. A command whose
    /// texture was created on a different backend is drawn with the white
    /// fallback. A zero-sized drawable skips the frame entirely.
    pub fn do_frame(&mut self, commands: &[DrawCommand<'_, B>]) -> Result<(), PresentError> {
        let (width, height) = self.backend.drawable_size();
        self.viewport = (width, height);
        let Some(projection) = viewport_projection(width, height) else {
            log::trace!("drawable is {width}x{height}; frame skipped");
            return Ok(());
        };
        self.projection = projection;

        self.backend.begin_frame(width, height, self.config.clear_color);

        if self.pipeline.bind() {
            self.pipeline.set_projection(&self.projection);
            for cmd in commands {
                self.pipeline.set_model(&cmd.transform);
                // Handles are only meaningful on the backend that issued them.
                let texture = match cmd.texture {
                    Some(texture) if texture.belongs_to(&self.backend) => texture,
                    Some(texture) => {
                        log::error!(
                            "texture {} belongs to another backend; drawn untextured",
                            texture.id().raw()
                        );
                        &self.white
                    }
                    None => &self.white,
                };
                texture.bind();
                self.mesh.draw();
            }
        } else if !commands.is_empty() {
            log::trace!("no shader program; {} draw commands dropped", commands.len());
        }

        self.backend.present().inspect_err(|e| {
            log::error!("failed to present frame: {e}");
        })
    }

    /// Uploads a raw RGBA8 texture using the configured filter.
    pub fn create_texture(
        &self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<Texture<B>, TextureError> {
        Texture::from_pixels(&self.backend, width, height, rgba, self.config.texture_filter)
    }

    /// Decodes and uploads an asset using the configured filter.
    pub fn load_texture<S>(&self, store: &S, path: &str) -> Result<Texture<B>, TextureError>
    where
        S: AssetStore + ?Sized,
    {
        Texture::from_asset(&self.backend, store, path, self.config.texture_filter)
    }

    /// Forwards a host resize to the backend. The projection follows on the
    /// next frame.
    pub fn resize(&self, width: u32, height: u32) {
        self.backend.resize(width, height);
    }

    /// Rebuilds the presentation surface after [`PresentError::requires_surface_recreation`].
    pub fn recreate_surface(&self) -> Result<(), BackendError> {
        self.backend.recreate_surface()
    }

    /// Drawable size seen by the last frame.
    pub fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    /// Projection used by the last frame.
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    /// Maps a drawable pixel position to world space with the last projection.
    pub fn screen_to_world(&self, x: f32, y: f32) -> Option<Vec2> {
        screen_to_world(&self.projection, self.viewport, x, y)
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.config.clear_color = color;
    }

    pub fn pipeline(&self) -> &ShaderPipeline<B> {
        &self.pipeline
    }

    /// Shared backend handle, for creating textures directly.
    pub fn backend(&self) -> &Rc<B> {
        &self.backend
    }
}

impl<B: Backend> Drop for Renderer<B> {
    fn drop(&mut self) {
        log::debug!("renderer shutting down");
    }
}
