//! Quadrant engine crate.
//!
//! A minimal 2D sprite renderer: each frame is a list of textured unit quads,
//! each with its own model transform, drawn over a solid clear color with an
//! aspect-preserving orthographic projection.
//!
//! - [`render`]: the renderer, its shader program, quad mesh and textures
//! - [`backend`]: the graphics API seam (wgpu and headless software)
//! - [`device`]: wgpu device and surface management
//! - [`asset`]: image asset lookup and decoding
//! - [`logging`]: logger initialization

pub mod asset;
pub mod backend;
pub mod device;
pub mod logging;
pub mod render;

pub use backend::{Backend, SoftwareBackend, TextureFilter, WgpuBackend};
pub use render::{Color, DrawCommand, Renderer, RendererConfig, Texture};
