use std::rc::Rc;

use crate::backend::{Backend, BackendError, MeshId, Vertex};

/// Unit square centered on the origin.
///
/// Texture coordinates follow top-left-origin image sampling: the top-left
/// corner samples texel row 0.
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { position: [-0.5, 0.5], tex_coords: [0.0, 0.0] },
    Vertex { position: [-0.5, -0.5], tex_coords: [0.0, 1.0] },
    Vertex { position: [0.5, -0.5], tex_coords: [1.0, 1.0] },
    Vertex { position: [0.5, 0.5], tex_coords: [1.0, 0.0] },
];

/// Two counter-clockwise triangles.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// The static quad shared by every draw command.
///
/// Uploaded once; per-draw variation comes from uniform and texture state set
/// before [`draw`](Self::draw).
pub struct QuadMesh<B: Backend> {
    backend: Rc<B>,
    id: MeshId,
}

impl<B: Backend> QuadMesh<B> {
    pub fn upload(backend: &Rc<B>) -> Result<Self, BackendError> {
        let id = backend.create_mesh(&QUAD_VERTICES, &QUAD_INDICES)?;
        log::debug!("quad mesh uploaded as mesh {}", id.raw());
        Ok(Self {
            backend: Rc::clone(backend),
            id,
        })
    }

    pub fn id(&self) -> MeshId {
        self.id
    }

    /// Issues one indexed draw of the six quad indices.
    pub fn draw(&self) {
        self.backend.draw_indexed(self.id, QUAD_INDICES.len() as u32);
    }
}

impl<B: Backend> Drop for QuadMesh<B> {
    fn drop(&mut self) {
        self.backend.delete_mesh(self.id);
    }
}
