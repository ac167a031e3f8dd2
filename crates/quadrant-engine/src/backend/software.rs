//! Headless CPU backend.
//!
//! Rasterizes indexed triangles into an RGBA8 framebuffer with the semantics
//! of the embedded quad program: `projection * model * position`, nearest
//! texel sampling, straight alpha blending. Every object it hands out is
//! counted, so leaks, double releases and release order are observable.

use std::cell::RefCell;
use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec4};

use crate::device::PresentError;
use crate::render::Color;
use crate::render::shader::CompiledStage;

use super::{
    Backend, BackendError, MeshId, ProgramId, ResourceKind, ShaderId, TextureDesc, TextureId,
    UniformLocation, Vertex,
};

/// An RGBA8 image, row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Frame {
    fn new(width: u32, height: u32, fill: [u8; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at `(x, y)`. Panics when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    fn fill(&mut self, color: [u8; 4]) {
        self.pixels.fill(color);
    }

    fn blend(&mut self, x: u32, y: u32, src: [u8; 4]) {
        let dst = &mut self.pixels[(y * self.width + x) as usize];
        let a = src[3] as f32 / 255.0;
        let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * (1.0 - a)).round() as u8;
        *dst = [
            mix(src[0], dst[0]),
            mix(src[1], dst[1]),
            mix(src[2], dst[2]),
            (src[3] as f32 + dst[3] as f32 * (1.0 - a)).round() as u8,
        ];
    }

    /// Nearest texel for a normalized coordinate, clamped to the edges.
    fn sample(&self, uv: Vec2) -> [u8; 4] {
        let tx = ((uv.x * self.width as f32).floor() as i64).clamp(0, self.width as i64 - 1);
        let ty = ((uv.y * self.height as f32).floor() as i64).clamp(0, self.height as i64 - 1);
        self.pixels[(ty as u32 * self.width + tx as u32) as usize]
    }
}

/// Per-kind object counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceStats {
    created: [usize; 4],
    released: [usize; 4],
    invalid_releases: usize,
    release_order: Vec<ResourceKind>,
}

impl ResourceStats {
    pub fn created(&self, kind: ResourceKind) -> usize {
        self.created[kind.index()]
    }

    pub fn released(&self, kind: ResourceKind) -> usize {
        self.released[kind.index()]
    }

    pub fn live(&self, kind: ResourceKind) -> usize {
        self.created(kind) - self.released(kind)
    }

    pub fn total_live(&self) -> usize {
        ResourceKind::ALL.iter().map(|&k| self.live(k)).sum()
    }

    /// Deletes of handles that were unknown or already released.
    pub fn invalid_releases(&self) -> usize {
        self.invalid_releases
    }

    /// Kinds in the order their objects were released.
    pub fn release_order(&self) -> &[ResourceKind] {
        &self.release_order
    }
}

struct Program {
    projection: Option<u32>,
    model: Option<u32>,
}

struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

#[derive(Default)]
struct State {
    target: Option<Frame>,
    width: u32,
    height: u32,
    presented: Option<Frame>,
    frames_presented: u64,
    surface_lost: bool,

    next_id: u32,
    shaders: HashMap<u32, CompiledStage>,
    programs: HashMap<u32, Program>,
    meshes: HashMap<u32, Mesh>,
    textures: HashMap<u32, Frame>,
    stats: ResourceStats,

    program: Option<u32>,
    texture: Option<u32>,
    uniforms: HashMap<u32, Mat4>,
    draw_calls: usize,
}

impl State {
    fn allocate(&mut self, kind: ResourceKind) -> u32 {
        self.next_id += 1;
        self.stats.created[kind.index()] += 1;
        self.next_id
    }

    fn released(&mut self, kind: ResourceKind, id: u32, found: bool) {
        if found {
            self.stats.released[kind.index()] += 1;
            self.stats.release_order.push(kind);
        } else {
            self.stats.invalid_releases += 1;
            log::error!("release of unknown {kind} {id}");
        }
    }
}

/// CPU rasterizer implementing [`Backend`] without a window or GPU.
pub struct SoftwareBackend {
    state: RefCell<State>,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: RefCell::new(State {
                width,
                height,
                ..State::default()
            }),
        }
    }

    pub fn stats(&self) -> ResourceStats {
        self.state.borrow().stats.clone()
    }

    /// The most recently presented frame.
    pub fn last_frame(&self) -> Option<Frame> {
        self.state.borrow().presented.clone()
    }

    pub fn frames_presented(&self) -> u64 {
        self.state.borrow().frames_presented
    }

    /// Draw calls issued since creation.
    pub fn draw_calls(&self) -> usize {
        self.state.borrow().draw_calls
    }

    /// Simulates the platform dropping the surface; presents fail until
    /// [`recreate_surface`](Backend::recreate_surface) is called.
    pub fn lose_surface(&self) {
        self.state.borrow_mut().surface_lost = true;
    }

    fn draw(state: &mut State, mesh: MeshId, index_count: u32) {
        let Some(program) = state.program.and_then(|id| state.programs.get(&id)) else {
            log::trace!("draw without a program ignored");
            return;
        };
        let uniform = |binding: Option<u32>| {
            binding
                .and_then(|b| state.uniforms.get(&b).copied())
                .unwrap_or(Mat4::ZERO)
        };
        let mvp = uniform(program.projection) * uniform(program.model);

        let Some(mesh) = state.meshes.get(&mesh.0) else {
            log::error!("draw with unknown mesh {}", mesh.0);
            return;
        };
        let Some(texture) = state.texture.and_then(|id| state.textures.get(&id)) else {
            log::trace!("draw without a bound texture ignored");
            return;
        };
        let Some(target) = state.target.as_mut() else {
            log::error!("draw outside of a frame ignored");
            return;
        };

        let (w, h) = (target.width as f32, target.height as f32);
        let screen: Vec<Option<(Vec2, Vec2)>> = mesh
            .vertices
            .iter()
            .map(|v| {
                let clip = mvp * Vec4::new(v.position[0], v.position[1], 0.0, 1.0);
                if clip.w.abs() <= f32::EPSILON {
                    return None;
                }
                let ndc = Vec2::new(clip.x, clip.y) / clip.w;
                let px = Vec2::new((ndc.x + 1.0) * 0.5 * w, (1.0 - ndc.y) * 0.5 * h);
                Some((px, Vec2::from(v.tex_coords)))
            })
            .collect();

        let count = (index_count as usize).min(mesh.indices.len());
        for tri in mesh.indices[..count].chunks_exact(3) {
            let corners = [tri[0], tri[1], tri[2]]
                .map(|i| screen.get(i as usize).copied().flatten());
            if let [Some(a), Some(b), Some(c)] = corners {
                fill_triangle(target, texture, [a, b, c]);
            }
        }
    }
}

/// Signed area of `(a, b, p)`. Evaluated from a fixed endpoint order, so an
/// edge shared by two triangles yields exactly opposite values on each side.
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    let swapped = (b.y, b.x) < (a.y, a.x);
    let (a, b) = if swapped { (b, a) } else { (a, b) };
    let value = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if swapped { -value } else { value }
}

/// Top-left rule for a positively wound edge in y-down screen space.
fn is_top_left(a: Vec2, b: Vec2) -> bool {
    (a.y == b.y && b.x > a.x) || b.y < a.y
}

fn covers(a: Vec2, b: Vec2, value: f32) -> bool {
    value > 0.0 || (value == 0.0 && is_top_left(a, b))
}

/// Fills pixels whose centers fall inside the triangle. Centers exactly on an
/// edge belong to the triangle only when that edge is a top or left edge, so
/// triangles sharing an edge blend each pixel once.
fn fill_triangle(target: &mut Frame, texture: &Frame, corners: [(Vec2, Vec2); 3]) {
    let [(p0, t0), (mut p1, mut t1), (mut p2, mut t2)] = corners;
    let mut area = edge(p0, p1, p2);
    if area.abs() <= f32::EPSILON {
        return;
    }
    if area < 0.0 {
        std::mem::swap(&mut p1, &mut p2);
        std::mem::swap(&mut t1, &mut t2);
        area = -area;
    }

    let min = p0.min(p1).min(p2).floor().max(Vec2::ZERO);
    let max = p0
        .max(p1)
        .max(p2)
        .ceil()
        .min(Vec2::new(target.width as f32, target.height as f32));

    for y in min.y as u32..max.y as u32 {
        for x in min.x as u32..max.x as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let e0 = edge(p1, p2, p);
            let e1 = edge(p2, p0, p);
            let e2 = edge(p0, p1, p);
            if !(covers(p1, p2, e0) && covers(p2, p0, e1) && covers(p0, p1, e2)) {
                continue;
            }
            let uv = t0 * (e0 / area) + t1 * (e1 / area) + t2 * (e2 / area);
            target.blend(x, y, texture.sample(uv));
        }
    }
}

impl Backend for SoftwareBackend {
    fn drawable_size(&self) -> (u32, u32) {
        let state = self.state.borrow();
        (state.width, state.height)
    }

    fn resize(&self, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        state.width = width;
        state.height = height;
    }

    fn recreate_surface(&self) -> Result<(), BackendError> {
        self.state.borrow_mut().surface_lost = false;
        Ok(())
    }

    fn create_shader(&self, stage: &CompiledStage) -> Result<ShaderId, BackendError> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate(ResourceKind::Shader);
        state.shaders.insert(id, stage.clone());
        Ok(ShaderId(id))
    }

    fn delete_shader(&self, shader: ShaderId) {
        let mut state = self.state.borrow_mut();
        let found = state.shaders.remove(&shader.0).is_some();
        state.released(ResourceKind::Shader, shader.0, found);
    }

    fn create_program(
        &self,
        vertex: ShaderId,
        fragment: ShaderId,
    ) -> Result<ProgramId, BackendError> {
        let mut state = self.state.borrow_mut();
        let (Some(vs), Some(_)) = (state.shaders.get(&vertex.0), state.shaders.get(&fragment.0))
        else {
            return Err(BackendError::Creation {
                kind: ResourceKind::Program,
                reason: "shader handle is not live".to_string(),
            });
        };

        let binding = |name: &str| {
            vs.uniforms
                .iter()
                .find(|u| u.name == name && u.group == 0)
                .map(|u| u.binding)
        };
        let program = Program {
            projection: binding("projection"),
            model: binding("model"),
        };

        let id = state.allocate(ResourceKind::Program);
        state.programs.insert(id, program);
        Ok(ProgramId(id))
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        let found = state.programs.remove(&program.0).is_some();
        if state.program == Some(program.0) {
            state.program = None;
        }
        state.released(ResourceKind::Program, program.0, found);
    }

    fn create_mesh(&self, vertices: &[Vertex], indices: &[u32]) -> Result<MeshId, BackendError> {
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(BackendError::Creation {
                kind: ResourceKind::Mesh,
                reason: format!("index {bad} out of range for {} vertices", vertices.len()),
            });
        }
        let mut state = self.state.borrow_mut();
        let id = state.allocate(ResourceKind::Mesh);
        state.meshes.insert(
            id,
            Mesh {
                vertices: vertices.to_vec(),
                indices: indices.to_vec(),
            },
        );
        Ok(MeshId(id))
    }

    fn delete_mesh(&self, mesh: MeshId) {
        let mut state = self.state.borrow_mut();
        let found = state.meshes.remove(&mesh.0).is_some();
        state.released(ResourceKind::Mesh, mesh.0, found);
    }

    fn create_texture(&self, desc: &TextureDesc, rgba: &[u8]) -> Result<TextureId, BackendError> {
        if desc.byte_len() != Some(rgba.len()) || desc.width == 0 || desc.height == 0 {
            return Err(BackendError::Creation {
                kind: ResourceKind::Texture,
                reason: format!(
                    "{} bytes do not describe a {}x{} RGBA8 image",
                    rgba.len(),
                    desc.width,
                    desc.height
                ),
            });
        }

        // Filtering is always nearest here; `desc.filter` only affects the GPU path.
        let image = Frame {
            width: desc.width,
            height: desc.height,
            pixels: rgba
                .chunks_exact(4)
                .map(|c| [c[0], c[1], c[2], c[3]])
                .collect(),
        };

        let mut state = self.state.borrow_mut();
        let id = state.allocate(ResourceKind::Texture);
        state.textures.insert(id, image);
        Ok(TextureId(id))
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut state = self.state.borrow_mut();
        let found = state.textures.remove(&texture.0).is_some();
        if state.texture == Some(texture.0) {
            state.texture = None;
        }
        state.released(ResourceKind::Texture, texture.0, found);
    }

    fn begin_frame(&self, width: u32, height: u32, clear: Color) {
        let mut state = self.state.borrow_mut();
        let fill = clear.to_rgba8();
        match state.target.as_mut() {
            Some(target) if target.width == width && target.height == height => target.fill(fill),
            _ => state.target = Some(Frame::new(width, height, fill)),
        }
        state.uniforms.clear();
    }

    fn use_program(&self, program: ProgramId) {
        self.state.borrow_mut().program = Some(program.0);
    }

    fn set_uniform_mat4(&self, location: UniformLocation, value: &Mat4) {
        self.state.borrow_mut().uniforms.insert(location.0, *value);
    }

    fn bind_texture(&self, texture: TextureId) {
        self.state.borrow_mut().texture = Some(texture.0);
    }

    fn draw_indexed(&self, mesh: MeshId, index_count: u32) {
        let mut state = self.state.borrow_mut();
        state.draw_calls += 1;
        Self::draw(&mut state, mesh, index_count);
    }

    fn present(&self) -> Result<(), PresentError> {
        let mut state = self.state.borrow_mut();
        if state.surface_lost {
            return Err(PresentError::SurfaceLost);
        }
        let Some(frame) = state.target.clone() else {
            return Err(PresentError::Other("present without begin_frame".to_string()));
        };
        state.presented = Some(frame);
        state.frames_presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureFilter;

    fn texture(backend: &SoftwareBackend, w: u32, h: u32, px: [u8; 4]) -> TextureId {
        let desc = TextureDesc {
            width: w,
            height: h,
            filter: TextureFilter::Nearest,
        };
        let data: Vec<u8> = std::iter::repeat(px).take((w * h) as usize).flatten().collect();
        backend.create_texture(&desc, &data).unwrap()
    }

    #[test]
    fn begin_frame_clears_to_color() {
        let backend = SoftwareBackend::new(3, 2);
        backend.begin_frame(3, 2, Color::new(0.0, 0.0, 1.0, 1.0));
        backend.present().unwrap();
        let frame = backend.last_frame().unwrap();
        assert!(frame.pixels().iter().all(|&p| p == [0, 0, 255, 255]));
    }

    #[test]
    fn deleting_twice_is_counted_not_fatal() {
        let backend = SoftwareBackend::new(1, 1);
        let id = texture(&backend, 1, 1, [0; 4]);
        backend.delete_texture(id);
        backend.delete_texture(id);
        let stats = backend.stats();
        assert_eq!(stats.released(ResourceKind::Texture), 1);
        assert_eq!(stats.invalid_releases(), 1);
    }

    #[test]
    fn lost_surface_fails_until_recreated() {
        let backend = SoftwareBackend::new(2, 2);
        backend.lose_surface();
        backend.begin_frame(2, 2, Color::BLACK);
        assert_eq!(backend.present(), Err(PresentError::SurfaceLost));
        backend.recreate_surface().unwrap();
        backend.begin_frame(2, 2, Color::BLACK);
        assert_eq!(backend.present(), Ok(()));
        assert_eq!(backend.frames_presented(), 1);
    }

    #[test]
    fn mesh_with_out_of_range_index_is_rejected() {
        let backend = SoftwareBackend::new(1, 1);
        let v = Vertex {
            position: [0.0, 0.0],
            tex_coords: [0.0, 0.0],
        };
        assert!(backend.create_mesh(&[v], &[0, 1, 0]).is_err());
        assert_eq!(backend.stats().created(ResourceKind::Mesh), 0);
    }

    #[test]
    fn texture_size_mismatch_is_rejected() {
        let backend = SoftwareBackend::new(1, 1);
        let desc = TextureDesc {
            width: 2,
            height: 2,
            filter: TextureFilter::Nearest,
        };
        assert!(backend.create_texture(&desc, &[0; 12]).is_err());
    }

    #[test]
    fn sampling_clamps_to_edges() {
        let frame = Frame {
            width: 2,
            height: 1,
            pixels: vec![[1, 1, 1, 1], [2, 2, 2, 2]],
        };
        assert_eq!(frame.sample(Vec2::new(-0.5, 0.5)), [1, 1, 1, 1]);
        assert_eq!(frame.sample(Vec2::new(1.5, 0.5)), [2, 2, 2, 2]);
    }

    fn corner(x: f32, y: f32) -> (Vec2, Vec2) {
        (Vec2::new(x, y), Vec2::ZERO)
    }

    #[test]
    fn shared_diagonal_is_filled_once() {
        let veil = Frame::new(1, 1, [255, 255, 255, 128]);
        let mut once = Frame::new(1, 1, [0, 0, 0, 255]);
        once.blend(0, 0, [255, 255, 255, 128]);
        let expected = once.pixel(0, 0);

        // Both windings, and a diagonal running through pixel centers.
        for flip in [false, true] {
            let mut target = Frame::new(6, 6, [0, 0, 0, 255]);
            let (a, b) = (corner(1.0, 1.0), corner(5.0, 1.0));
            let (c, d) = (corner(5.0, 5.0), corner(1.0, 5.0));
            let (first, second) = if flip {
                ([a, c, b], [a, d, c])
            } else {
                ([a, b, c], [a, c, d])
            };
            fill_triangle(&mut target, &veil, first);
            fill_triangle(&mut target, &veil, second);

            for y in 0..6 {
                for x in 0..6 {
                    let inside = (1..5).contains(&x) && (1..5).contains(&y);
                    let want = if inside { expected } else { [0, 0, 0, 255] };
                    assert_eq!(target.pixel(x, y), want, "pixel ({x}, {y}), flip {flip}");
                }
            }
        }
    }

    #[test]
    fn half_alpha_blends_evenly() {
        let mut frame = Frame::new(1, 1, [0, 0, 0, 255]);
        frame.blend(0, 0, [255, 255, 255, 128]);
        let [r, _, _, a] = frame.pixel(0, 0);
        assert!((127..=129).contains(&r), "r = {r}");
        assert_eq!(a, 255);
    }
}
