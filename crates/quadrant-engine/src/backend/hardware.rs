//! wgpu implementation of [`Backend`].
//!
//! The immediate-mode calls of the trait are recorded and replayed in a single
//! render pass when the frame is presented. Matrix uniforms are written into a
//! per-frame arena buffer and addressed through dynamic offsets, so every draw
//! sees exactly the values that were current when it was issued.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::Result;
use glam::Mat4;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::device::{Gpu, GpuInit, PresentError};
use crate::render::Color;
use crate::render::shader::{CompiledStage, Stage};

use super::{
    Backend, BackendError, MeshId, ProgramId, ResourceKind, ShaderId, TextureDesc, TextureFilter,
    TextureId, UniformLocation, Vertex,
};

const MAT4_SIZE: u64 = std::mem::size_of::<Mat4>() as u64;
const INITIAL_UNIFORM_SLOTS: u64 = 256;

struct ShaderObject {
    module: wgpu::ShaderModule,
    stage: CompiledStage,
}

struct ProgramObject {
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    /// Group 0 bindings in ascending order; dynamic offsets follow this order.
    bindings: Vec<u32>,
    /// Bind group over the uniform arena, tagged with the arena generation.
    bind_group: Option<(u64, wgpu::BindGroup)>,
}

struct MeshObject {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

struct TextureObject {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

#[derive(Default)]
struct Resources {
    next_id: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    meshes: HashMap<u32, MeshObject>,
    textures: HashMap<u32, TextureObject>,
}

impl Resources {
    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

struct DrawRecord {
    program: u32,
    mesh: u32,
    texture: u32,
    index_count: u32,
    offsets: Vec<wgpu::DynamicOffset>,
}

/// Calls recorded between `begin_frame` and `present`.
struct Recording {
    clear: Color,
    program: Option<u32>,
    texture: Option<u32>,
    /// Binding -> arena slot of the value current for the next draw.
    uniforms: HashMap<u32, u32>,
    draws: Vec<DrawRecord>,
    /// Set once the arena ran out of slots; later draws are dropped.
    arena_full: bool,
}

impl Default for Recording {
    fn default() -> Self {
        Self {
            clear: Color::BLACK,
            program: None,
            texture: None,
            uniforms: HashMap::new(),
            draws: Vec::new(),
            arena_full: false,
        }
    }
}

/// CPU copy of one frame's matrices, one per aligned slot. Slot 0 is a zero
/// matrix used for bindings that were never written.
struct UniformSlots {
    stride: u64,
    data: Vec<u8>,
    max_slots: u64,
}

impl UniformSlots {
    fn new(stride: u64, max_slots: u64) -> Self {
        let mut slots = Self {
            stride,
            data: Vec::new(),
            max_slots,
        };
        slots.reset();
        slots
    }

    fn reset(&mut self) {
        self.data.clear();
        self.data.resize(self.stride as usize, 0);
    }

    fn len(&self) -> u64 {
        self.data.len() as u64 / self.stride
    }

    /// Stores `value` in the next slot; `None` once `max_slots` are taken.
    fn push(&mut self, value: &Mat4) -> Option<u32> {
        if self.len() >= self.max_slots {
            return None;
        }
        let slot = self.len() as u32;
        let start = self.data.len();
        self.data.resize(start + self.stride as usize, 0);
        let bytes = bytemuck::bytes_of(value);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Some(slot)
    }

    fn offset(&self, slot: u32) -> wgpu::DynamicOffset {
        (slot as u64 * self.stride) as wgpu::DynamicOffset
    }
}

/// Growable uniform buffer backing [`UniformSlots`].
///
/// The buffer never grows past the device's `max_buffer_size`; once every slot
/// is taken, further values are refused for the rest of the frame.
struct UniformArena {
    values: UniformSlots,
    buffer: wgpu::Buffer,
    capacity: u64,
    generation: u64,
}

impl UniformArena {
    fn new(device: &wgpu::Device) -> Self {
        let limits = device.limits();
        let stride = slot_stride(limits.min_uniform_buffer_offset_alignment);
        let max_slots = slot_limit(limits.max_buffer_size, stride);
        let capacity = INITIAL_UNIFORM_SLOTS.min(max_slots);
        Self {
            values: UniformSlots::new(stride, max_slots),
            buffer: create_arena_buffer(device, stride, capacity),
            capacity,
            generation: 0,
        }
    }

    fn reset(&mut self) {
        self.values.reset();
    }

    fn push(&mut self, value: &Mat4) -> Option<u32> {
        self.values.push(value)
    }

    fn offset(&self, slot: u32) -> wgpu::DynamicOffset {
        self.values.offset(slot)
    }

    /// Uploads this frame's values, growing the buffer first if needed.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let needed = self.values.len();
        if needed > self.capacity {
            self.capacity = grown_capacity(self.capacity, needed, self.values.max_slots);
            self.buffer = create_arena_buffer(device, self.values.stride, self.capacity);
            self.generation += 1;
            log::debug!("uniform arena grown to {} slots", self.capacity);
        }
        queue.write_buffer(&self.buffer, 0, &self.values.data);
    }
}

fn slot_stride(min_alignment: u32) -> u64 {
    MAT4_SIZE.max(min_alignment as u64)
}

/// Slots addressable in one buffer: bounded by the device limit and by the
/// `u32` dynamic offset.
fn slot_limit(max_buffer_size: u64, stride: u64) -> u64 {
    max_buffer_size.min(u64::from(u32::MAX) + 1) / stride
}

/// Doubles `current` until it holds `needed`, never past `max`.
fn grown_capacity(current: u64, needed: u64, max: u64) -> u64 {
    let mut capacity = current.max(1);
    while capacity < needed && capacity < max {
        capacity = capacity.saturating_mul(2);
    }
    capacity.min(max)
}

fn create_arena_buffer(device: &wgpu::Device, stride: u64, slots: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("quadrant uniform arena"),
        size: stride * slots,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Backend drawing into a window surface through wgpu.
pub struct WgpuBackend {
    resources: RefCell<Resources>,
    recording: RefCell<Recording>,
    arena: RefCell<UniformArena>,
    texture_layout: wgpu::BindGroupLayout,
    gpu: RefCell<Gpu>,
}

impl WgpuBackend {
    /// Creates the device and surface for `window`. Blocks until the adapter
    /// and device are ready.
    pub fn new(window: Arc<Window>, init: GpuInit) -> Result<Self> {
        let gpu = pollster::block_on(Gpu::new(window, init))?;
        let device = gpu.device();

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quadrant texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let arena = UniformArena::new(device);

        Ok(Self {
            resources: RefCell::new(Resources::default()),
            recording: RefCell::new(Recording::default()),
            arena: RefCell::new(arena),
            texture_layout,
            gpu: RefCell::new(gpu),
        })
    }

    fn uniform_layout(
        device: &wgpu::Device,
        bindings: &[u32],
    ) -> wgpu::BindGroupLayout {
        let entries: Vec<_> = bindings
            .iter()
            .map(|&binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(MAT4_SIZE),
                },
                count: None,
            })
            .collect();

        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quadrant uniform bgl"),
            entries: &entries,
        })
    }

    fn ensure_bind_group(device: &wgpu::Device, program: &mut ProgramObject, arena: &UniformArena) {
        if matches!(program.bind_group, Some((generation, _)) if generation == arena.generation) {
            return;
        }

        let entries: Vec<_> = program
            .bindings
            .iter()
            .map(|&binding| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &arena.buffer,
                    offset: 0,
                    size: NonZeroU64::new(MAT4_SIZE),
                }),
            })
            .collect();

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quadrant uniform bind group"),
            layout: &program.uniform_layout,
            entries: &entries,
        });
        program.bind_group = Some((arena.generation, bind_group));
    }
}

/// Runs `create` inside a validation error scope, so an object the device
/// rejects comes back as a creation error instead of reaching the uncaptured
/// error handler.
fn validated<T>(
    device: &wgpu::Device,
    kind: ResourceKind,
    create: impl FnOnce() -> T,
) -> Result<T, BackendError> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let object = create();
    match pollster::block_on(scope.pop()) {
        None => Ok(object),
        Some(err) => {
            log::error!("device rejected {kind}: {err}");
            Err(creation_error(kind, err.to_string()))
        }
    }
}

fn creation_error(kind: ResourceKind, reason: impl Into<String>) -> BackendError {
    BackendError::Creation {
        kind,
        reason: reason.into(),
    }
}

fn filter_mode(filter: TextureFilter) -> wgpu::FilterMode {
    match filter {
        TextureFilter::Nearest => wgpu::FilterMode::Nearest,
        TextureFilter::Linear => wgpu::FilterMode::Linear,
    }
}

impl Backend for WgpuBackend {
    fn drawable_size(&self) -> (u32, u32) {
        let size = self.gpu.borrow().size();
        (size.width, size.height)
    }

    fn resize(&self, width: u32, height: u32) {
        self.gpu.borrow_mut().resize(PhysicalSize::new(width, height));
    }

    fn recreate_surface(&self) -> Result<(), BackendError> {
        self.gpu
            .borrow_mut()
            .recreate_surface()
            .map_err(|e| BackendError::Surface(format!("{e:#}")))
    }

    fn create_shader(&self, stage: &CompiledStage) -> Result<ShaderId, BackendError> {
        let gpu = self.gpu.borrow();
        let label = match stage.stage {
            Stage::Vertex => "quadrant vertex shader",
            Stage::Fragment => "quadrant fragment shader",
        };
        let device = gpu.device();
        let module = validated(device, ResourceKind::Shader, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(stage.source.clone())),
            })
        })?;

        let mut resources = self.resources.borrow_mut();
        let id = resources.allocate();
        resources.shaders.insert(
            id,
            ShaderObject {
                module,
                stage: stage.clone(),
            },
        );
        Ok(ShaderId(id))
    }

    fn delete_shader(&self, shader: ShaderId) {
        if self.resources.borrow_mut().shaders.remove(&shader.0).is_none() {
            log::error!("release of unknown shader {}", shader.0);
        }
    }

    fn create_program(
        &self,
        vertex: ShaderId,
        fragment: ShaderId,
    ) -> Result<ProgramId, BackendError> {
        let gpu = self.gpu.borrow();
        let device = gpu.device();
        let mut resources = self.resources.borrow_mut();

        let (Some(vs), Some(fs)) = (
            resources.shaders.get(&vertex.0),
            resources.shaders.get(&fragment.0),
        ) else {
            return Err(creation_error(ResourceKind::Program, "shader handle is not live"));
        };

        let mut bindings = Vec::new();
        for slot in vs.stage.uniforms.iter().chain(fs.stage.uniforms.iter()) {
            if slot.group != 0 || !slot.is_mat4 {
                return Err(creation_error(
                    ResourceKind::Program,
                    format!(
                        "uniform `{}` at @group({}) @binding({}) is not a group 0 mat4",
                        slot.name, slot.group, slot.binding
                    ),
                ));
            }
            bindings.push(slot.binding);
        }
        bindings.sort_unstable();
        bindings.dedup();

        let uniform_layout = Self::uniform_layout(device, &bindings);
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quadrant pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &self.texture_layout],
            immediate_size: 0,
        });

        let descriptor = wgpu::RenderPipelineDescriptor {
            label: Some("quadrant pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &vs.module,
                entry_point: vs.stage.entry_point.as_deref(),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fs.module,
                entry_point: fs.stage.entry_point.as_deref(),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.surface_format(),
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        };
        let pipeline = validated(device, ResourceKind::Program, || {
            device.create_render_pipeline(&descriptor)
        })?;

        let id = resources.allocate();
        resources.programs.insert(
            id,
            ProgramObject {
                pipeline,
                uniform_layout,
                bindings,
                bind_group: None,
            },
        );
        Ok(ProgramId(id))
    }

    fn delete_program(&self, program: ProgramId) {
        if self.resources.borrow_mut().programs.remove(&program.0).is_none() {
            log::error!("release of unknown program {}", program.0);
        }
        let mut recording = self.recording.borrow_mut();
        if recording.program == Some(program.0) {
            recording.program = None;
        }
    }

    fn create_mesh(&self, vertices: &[Vertex], indices: &[u32]) -> Result<MeshId, BackendError> {
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(creation_error(
                ResourceKind::Mesh,
                format!("index {bad} out of range for {} vertices", vertices.len()),
            ));
        }

        let gpu = self.gpu.borrow();
        let device = gpu.device();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quadrant mesh vbo"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quadrant mesh ibo"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let mut resources = self.resources.borrow_mut();
        let id = resources.allocate();
        resources.meshes.insert(
            id,
            MeshObject {
                vertices: vertex_buffer,
                indices: index_buffer,
                index_count: indices.len() as u32,
            },
        );
        Ok(MeshId(id))
    }

    fn delete_mesh(&self, mesh: MeshId) {
        if self.resources.borrow_mut().meshes.remove(&mesh.0).is_none() {
            log::error!("release of unknown mesh {}", mesh.0);
        }
    }

    fn create_texture(&self, desc: &TextureDesc, rgba: &[u8]) -> Result<TextureId, BackendError> {
        if desc.width == 0 || desc.height == 0 || desc.byte_len() != Some(rgba.len()) {
            return Err(creation_error(
                ResourceKind::Texture,
                format!(
                    "{} bytes do not describe a {}x{} RGBA8 image",
                    rgba.len(),
                    desc.width,
                    desc.height
                ),
            ));
        }

        let gpu = self.gpu.borrow();
        let device = gpu.device();
        let max = device.limits().max_texture_dimension_2d;
        if desc.width > max || desc.height > max {
            return Err(creation_error(
                ResourceKind::Texture,
                format!("{}x{} exceeds the {max} pixel limit", desc.width, desc.height),
            ));
        }

        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("quadrant texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        gpu.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * desc.width),
                rows_per_image: Some(desc.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let filter = filter_mode(desc.filter);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quadrant texture sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quadrant texture bind group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let mut resources = self.resources.borrow_mut();
        let id = resources.allocate();
        resources.textures.insert(
            id,
            TextureObject {
                _texture: texture,
                bind_group,
            },
        );
        Ok(TextureId(id))
    }

    fn delete_texture(&self, texture: TextureId) {
        if self.resources.borrow_mut().textures.remove(&texture.0).is_none() {
            log::error!("release of unknown texture {}", texture.0);
        }
        let mut recording = self.recording.borrow_mut();
        if recording.texture == Some(texture.0) {
            recording.texture = None;
        }
    }

    fn begin_frame(&self, width: u32, height: u32, clear: Color) {
        let size = self.gpu.borrow().size();
        if (size.width, size.height) != (width, height) {
            self.resize(width, height);
        }

        let mut recording = self.recording.borrow_mut();
        recording.clear = clear;
        recording.uniforms.clear();
        recording.draws.clear();
        recording.arena_full = false;
        self.arena.borrow_mut().reset();
    }

    fn use_program(&self, program: ProgramId) {
        self.recording.borrow_mut().program = Some(program.0);
    }

    fn set_uniform_mat4(&self, location: UniformLocation, value: &Mat4) {
        let mut recording = self.recording.borrow_mut();
        if recording.arena_full {
            return;
        }
        match self.arena.borrow_mut().push(value) {
            Some(slot) => {
                recording.uniforms.insert(location.0, slot);
            }
            None => {
                log::error!(
                    "uniform arena is full after {} draws; the rest of this frame is dropped",
                    recording.draws.len()
                );
                recording.arena_full = true;
            }
        }
    }

    fn bind_texture(&self, texture: TextureId) {
        self.recording.borrow_mut().texture = Some(texture.0);
    }

    fn draw_indexed(&self, mesh: MeshId, index_count: u32) {
        let mut recording = self.recording.borrow_mut();
        if recording.arena_full {
            return;
        }
        let (Some(program), Some(texture)) = (recording.program, recording.texture) else {
            log::trace!("draw without a program or texture ignored");
            return;
        };

        let resources = self.resources.borrow();
        let Some(object) = resources.programs.get(&program) else {
            log::error!("draw with unknown program {program}");
            return;
        };

        let arena = self.arena.borrow();
        let offsets = object
            .bindings
            .iter()
            .map(|binding| arena.offset(recording.uniforms.get(binding).copied().unwrap_or(0)))
            .collect();

        recording.draws.push(DrawRecord {
            program,
            mesh: mesh.0,
            texture,
            index_count,
            offsets,
        });
    }

    fn present(&self) -> Result<(), PresentError> {
        let gpu = self.gpu.borrow();
        let mut frame = gpu.begin_frame()?;

        let recording = self.recording.borrow();
        let mut resources = self.resources.borrow_mut();
        let mut arena = self.arena.borrow_mut();

        arena.upload(gpu.device(), gpu.queue());
        for draw in &recording.draws {
            if let Some(program) = resources.programs.get_mut(&draw.program) {
                Self::ensure_bind_group(gpu.device(), program, &arena);
            }
        }

        {
            let mut rpass = frame.begin_clear_pass(recording.clear.into());

            for draw in &recording.draws {
                let (Some(program), Some(mesh), Some(texture)) = (
                    resources.programs.get(&draw.program),
                    resources.meshes.get(&draw.mesh),
                    resources.textures.get(&draw.texture),
                ) else {
                    log::trace!("draw references a released object; skipped");
                    continue;
                };
                let Some((_, uniforms)) = program.bind_group.as_ref() else {
                    continue;
                };

                let count = draw.index_count.min(mesh.index_count);
                rpass.set_pipeline(&program.pipeline);
                rpass.set_bind_group(0, uniforms, &draw.offsets);
                rpass.set_bind_group(1, &texture.bind_group, &[]);
                rpass.set_vertex_buffer(0, mesh.vertices.slice(..));
                rpass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..count, 0, 0..1);
            }
        }

        gpu.submit(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_stride_respects_alignment() {
        assert_eq!(slot_stride(256), 256);
        assert_eq!(slot_stride(16), MAT4_SIZE);
    }

    #[test]
    fn capacity_doubles_until_it_fits() {
        assert_eq!(grown_capacity(256, 257, u64::MAX), 512);
        assert_eq!(grown_capacity(256, 1100, u64::MAX), 2048);
        assert_eq!(grown_capacity(0, 3, u64::MAX), 4);
    }

    #[test]
    fn capacity_stops_at_the_device_limit() {
        let max = slot_limit(256 << 20, 256);
        assert_eq!(max, 1 << 20);
        assert_eq!(grown_capacity(256, max, max), max);
        assert_eq!(grown_capacity(1 << 19, (1 << 19) + 1, max), max);
        assert_eq!(grown_capacity(3, 5, 5), 5);
        assert!(grown_capacity(256, 600_000, max) * 256 <= 256 << 20);
    }

    #[test]
    fn full_slots_refuse_values_until_reset() {
        let mut slots = UniformSlots::new(256, 3);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots.push(&Mat4::IDENTITY), Some(1));
        assert_eq!(slots.push(&Mat4::IDENTITY), Some(2));
        assert_eq!(slots.push(&Mat4::IDENTITY), None);
        assert_eq!(slots.data.len(), 3 * 256);
        assert_eq!(slots.offset(2), 512);

        slots.reset();
        assert_eq!(slots.push(&Mat4::IDENTITY), Some(1));
    }

    #[test]
    fn slot_zero_stays_zeroed() {
        let doubled = Mat4::from_scale(glam::Vec3::splat(2.0));
        let mut slots = UniformSlots::new(64, 8);
        assert_eq!(slots.push(&doubled), Some(1));
        assert!(slots.data[..64].iter().all(|&b| b == 0));
        assert_eq!(&slots.data[64..128], bytemuck::bytes_of(&doubled));
    }

    #[test]
    fn slot_limit_keeps_offsets_in_u32() {
        let max = slot_limit(u64::MAX, 256);
        assert_eq!(max, (u64::from(u32::MAX) + 1) / 256);
        assert!((max - 1) * 256 <= u64::from(u32::MAX));
    }
}
