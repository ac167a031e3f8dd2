//! Graphics API seam.
//!
//! Everything the render core does to the GPU goes through [`Backend`]: object
//! creation and release, per-frame state (program, uniforms, texture binding),
//! indexed draws and presentation. Handles are plain identifiers; the wrappers
//! in `render` own them and release them exactly once.
//!
//! Implementations:
//! - [`WgpuBackend`]: the window-bound GPU path.
//! - [`SoftwareBackend`]: headless CPU rasterizer with resource accounting.
//!
//! All methods take `&self`; backends are shared through `Rc` by every resource
//! created from them and are therefore confined to one thread.

mod hardware;
mod software;

use std::fmt;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use thiserror::Error;

use crate::device::PresentError;
use crate::render::Color;
use crate::render::shader::CompiledStage;

pub use hardware::WgpuBackend;
pub use software::{Frame, ResourceStats, SoftwareBackend};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw backend identifier.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// A compiled shader stage.
    ShaderId
);
handle!(
    /// A linked vertex + fragment program.
    ProgramId
);
handle!(
    /// Uploaded vertex and index buffers.
    MeshId
);
handle!(
    /// A 2D RGBA8 image.
    TextureId
);

/// Uniform slot of the linked program; the binding index in group 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    #[inline]
    pub fn binding(self) -> u32 {
        self.0
    }
}

/// Kinds of GPU objects, for diagnostics and accounting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Shader,
    Program,
    Mesh,
    Texture,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [Self::Shader, Self::Program, Self::Mesh, Self::Texture];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Shader => 0,
            Self::Program => 1,
            Self::Mesh => 2,
            Self::Texture => 3,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shader => "shader",
            Self::Program => "program",
            Self::Mesh => "mesh",
            Self::Texture => "texture",
        })
    }
}

/// Texture sampling policy.
///
/// `Nearest` is the default: textures are expected to be pixel art and are
/// scaled up without smoothing.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum TextureFilter {
    #[default]
    Nearest,
    Linear,
}

/// Parameters for a texture upload. Data is always tightly packed RGBA8.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub filter: TextureFilter,
}

impl TextureDesc {
    /// Byte length of a tightly packed RGBA8 image of this size.
    ///
    /// `None` when the size overflows `usize`.
    pub fn byte_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(4)
    }
}

/// Mesh vertex: position at attribute 0, texture coordinate at attribute 1.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2  // tex_coords
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// Failure reported by a backend while creating or rebuilding an object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("failed to create {kind}: {reason}")]
    Creation { kind: ResourceKind, reason: String },
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: ResourceKind, id: u32 },
    #[error("surface recreation failed: {0}")]
    Surface(String),
}

/// Graphics API used by the render core.
///
/// Calls mirror a classic immediate-mode API: state set before `draw_indexed`
/// applies to that draw. Deleting an unknown or already-deleted handle must be
/// tolerated (logged), never undefined.
pub trait Backend {
    /// Current drawable size in pixels; may change between frames.
    fn drawable_size(&self) -> (u32, u32);

    /// Host-driven resize of the drawable.
    fn resize(&self, width: u32, height: u32);

    /// Rebuilds the presentation surface after a lost-surface report.
    fn recreate_surface(&self) -> Result<(), BackendError>;

    fn create_shader(&self, stage: &CompiledStage) -> Result<ShaderId, BackendError>;
    fn delete_shader(&self, shader: ShaderId);

    /// Links two compiled stages. Stage compatibility is checked by the caller.
    fn create_program(&self, vertex: ShaderId, fragment: ShaderId)
        -> Result<ProgramId, BackendError>;
    fn delete_program(&self, program: ProgramId);

    fn create_mesh(&self, vertices: &[Vertex], indices: &[u32]) -> Result<MeshId, BackendError>;
    fn delete_mesh(&self, mesh: MeshId);

    /// Uploads `rgba`, which must be exactly `desc.byte_len()` bytes.
    fn create_texture(&self, desc: &TextureDesc, rgba: &[u8]) -> Result<TextureId, BackendError>;
    fn delete_texture(&self, texture: TextureId);

    /// Starts a frame: sets the viewport and clears the color buffer.
    fn begin_frame(&self, width: u32, height: u32, clear: Color);
    fn use_program(&self, program: ProgramId);
    fn set_uniform_mat4(&self, location: UniformLocation, value: &Mat4);
    fn bind_texture(&self, texture: TextureId);
    fn draw_indexed(&self, mesh: MeshId, index_count: u32);

    /// Presents the frame started by `begin_frame`.
    fn present(&self) -> Result<(), PresentError>;
}
