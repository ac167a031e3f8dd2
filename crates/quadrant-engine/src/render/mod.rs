//! Quad rendering core.
//!
//! One shader program, one unit-quad mesh and any number of textures, driven
//! by a per-frame list of [`DrawCommand`]s through the [`Renderer`] facade.
//!
//! Convention:
//! - World space: x in `[-1, 1]`, y in `[-h/w, h/w]`, +Y up, origin centered.
//! - Texture rows are stored top to bottom; `(0, 0)` is the top-left texel.

mod color;
mod command;
mod mesh;
mod pipeline;
pub mod projection;
mod renderer;
pub mod shader;
mod texture;

pub use color::Color;
pub use command::DrawCommand;
pub use mesh::{QuadMesh, QUAD_INDICES, QUAD_VERTICES};
pub use pipeline::ShaderPipeline;
pub use renderer::{Renderer, RendererConfig};
pub use shader::{ShaderDiagnostic, ShaderSource, QUAD_SHADER};
pub use texture::{Texture, TextureError};
