//! WGSL stage compilation, reflection and link checks.
//!
//! Stages are parsed and validated with naga (the compiler inside wgpu) before
//! any backend sees them, so both backends get the same diagnostics and the
//! same uniform table. Failures are values, not panics: the pipeline decides
//! what to do with them.

use std::fmt;

use thiserror::Error;

/// Vertex + fragment WGSL sources for one program.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub vertex: &'static str,
    pub fragment: &'static str,
}

/// The embedded textured-quad program.
///
/// Interface: attribute 0 = position, attribute 1 = texture coordinate;
/// `projection` and `model` are `mat4x4<f32>` uniforms in group 0; `tex` is
/// sampled unmodified from group 1.
pub const QUAD_SHADER: ShaderSource = ShaderSource {
    vertex: include_str!("shaders/quad_vert.wgsl"),
    fragment: include_str!("shaders/quad_frag.wgsl"),
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn naga(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        })
    }
}

/// A `var<uniform>` declaration found in a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    /// Whether the declared type is `mat4x4<f32>`.
    pub is_mat4: bool,
}

/// A `@location` on an entry point boundary and the WGSL type carried there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varying {
    pub location: u32,
    pub ty: String,
}

/// What a texture-group binding holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleKind {
    /// `texture_2d<f32>`, single-sampled.
    Texture2d,
    /// A filtering (non-comparison) `sampler`.
    Sampler,
    /// Any other texture or sampler type, described for diagnostics.
    Unsupported(String),
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Texture2d => f.write_str("texture_2d<f32>"),
            Self::Sampler => f.write_str("sampler"),
            Self::Unsupported(desc) => f.write_str(desc),
        }
    }
}

/// A texture or sampler declaration found in a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleSlot {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: HandleKind,
}

/// Group holding the bound texture (binding 0) and its sampler (binding 1).
pub const TEXTURE_GROUP: u32 = 1;

/// A stage that parsed and validated.
#[derive(Debug, Clone)]
pub struct CompiledStage {
    pub stage: Stage,
    pub source: String,
    /// Entry point for `stage`, if the module declares one.
    pub entry_point: Option<String>,
    pub uniforms: Vec<UniformSlot>,
    pub handles: Vec<HandleSlot>,
    /// `@location`s consumed by the entry point.
    pub inputs: Vec<Varying>,
    /// `@location`s produced by the entry point.
    pub outputs: Vec<Varying>,
}

/// Compile or link diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderDiagnostic {
    #[error("failed to compile {stage} shader:\n{log}")]
    Compile { stage: Stage, log: String },
    #[error("failed to link program:\n{0}")]
    Link(String),
}

/// Program interface after a successful link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    /// Uniforms of both stages, deduplicated by name.
    pub uniforms: Vec<UniformSlot>,
}

impl ProgramInterface {
    pub fn uniform(&self, name: &str) -> Option<&UniformSlot> {
        self.uniforms.iter().find(|u| u.name == name)
    }
}

/// Prefixes each line of `source` with its right-aligned line number and
/// appends `log`, so driver messages can be matched to the source.
pub fn format_shader_log(source: &str, log: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let width = lines.len().max(1).to_string().len();

    let numbered = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}: {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    match (numbered.is_empty(), log.is_empty()) {
        (true, true) => String::new(),
        (true, false) => log.to_string(),
        (false, true) => numbered,
        (false, false) => format!("{numbered}\n\n{log}"),
    }
}

/// Parses, validates and reflects one stage.
pub fn compile_stage(stage: Stage, source: &str) -> Result<CompiledStage, ShaderDiagnostic> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderDiagnostic::Compile {
        stage,
        log: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| ShaderDiagnostic::Compile {
        stage,
        log: format_shader_log(source, &e.to_string()),
    })?;

    let uniforms = module
        .global_variables
        .iter()
        .filter(|(_, var)| var.space == naga::AddressSpace::Uniform)
        .filter_map(|(_, var)| {
            let name = var.name.clone()?;
            let binding = var.binding.as_ref()?;
            Some(UniformSlot {
                name,
                group: binding.group,
                binding: binding.binding,
                is_mat4: is_mat4(&module, var.ty),
            })
        })
        .collect();

    let handles = module
        .global_variables
        .iter()
        .filter(|(_, var)| var.space == naga::AddressSpace::Handle)
        .filter_map(|(_, var)| {
            let binding = var.binding.as_ref()?;
            Some(HandleSlot {
                name: var.name.clone().unwrap_or_default(),
                group: binding.group,
                binding: binding.binding,
                kind: handle_kind(&module.types[var.ty].inner),
            })
        })
        .collect();

    let mut compiled = CompiledStage {
        stage,
        source: source.to_string(),
        entry_point: None,
        uniforms,
        handles,
        inputs: Vec::new(),
        outputs: Vec::new(),
    };

    if let Some(ep) = module.entry_points.iter().find(|ep| ep.stage == stage.naga()) {
        compiled.entry_point = Some(ep.name.clone());
        for arg in &ep.function.arguments {
            collect_locations(&module, arg.ty, arg.binding.as_ref(), &mut compiled.inputs);
        }
        if let Some(result) = &ep.function.result {
            collect_locations(&module, result.ty, result.binding.as_ref(), &mut compiled.outputs);
        }
    }

    Ok(compiled)
}

/// Checks that two compiled stages form a usable program.
pub fn link(vertex: &CompiledStage, fragment: &CompiledStage) -> Result<ProgramInterface, String> {
    let mut problems = Vec::new();

    if vertex.stage != Stage::Vertex || fragment.stage != Stage::Fragment {
        problems.push(format!(
            "stages attached in the wrong slots ({} / {})",
            vertex.stage, fragment.stage
        ));
    }
    if vertex.entry_point.is_none() {
        problems.push("vertex stage has no @vertex entry point".to_string());
    }
    if fragment.entry_point.is_none() {
        problems.push("fragment stage has no @fragment entry point".to_string());
    }

    for input in &fragment.inputs {
        let location = input.location;
        match vertex.outputs.iter().find(|out| out.location == location) {
            None => problems.push(format!(
                "fragment input @location({location}) is not written by the vertex stage"
            )),
            Some(out) if out.ty != input.ty => problems.push(format!(
                "fragment input @location({location}) is {} but the vertex stage writes {}",
                input.ty, out.ty
            )),
            Some(_) => {}
        }
    }

    for stage in [vertex, fragment] {
        for slot in &stage.handles {
            check_handle(stage.stage, slot, &mut problems);
        }
    }

    let mut uniforms: Vec<UniformSlot> = Vec::new();
    for slot in vertex.uniforms.iter().chain(&fragment.uniforms) {
        match uniforms.iter().find(|u| u.name == slot.name) {
            Some(existing) if existing != slot => problems.push(format!(
                "uniform `{}` declared at @group({}) @binding({}) and @group({}) @binding({})",
                slot.name, existing.group, existing.binding, slot.group, slot.binding
            )),
            Some(_) => {}
            None => uniforms.push(slot.clone()),
        }
    }

    if problems.is_empty() {
        Ok(ProgramInterface { uniforms })
    } else {
        Err(problems.join("\n"))
    }
}

fn is_mat4(module: &naga::Module, ty: naga::Handle<naga::Type>) -> bool {
    matches!(
        module.types[ty].inner,
        naga::TypeInner::Matrix {
            columns: naga::VectorSize::Quad,
            rows: naga::VectorSize::Quad,
            scalar: naga::Scalar::F32,
        }
    )
}

/// Texture-group bindings are only visible to the fragment stage and must match
/// the layout every backend binds: the texture at 0, its sampler at 1.
fn check_handle(stage: Stage, slot: &HandleSlot, problems: &mut Vec<String>) {
    let at = format!("`{}` at @group({}) @binding({})", slot.name, slot.group, slot.binding);

    if stage != Stage::Fragment {
        problems.push(format!(
            "{at} is declared in the {stage} stage; textures are fragment-only"
        ));
    }

    let expected = match (slot.group, slot.binding) {
        (TEXTURE_GROUP, 0) => HandleKind::Texture2d,
        (TEXTURE_GROUP, 1) => HandleKind::Sampler,
        _ => {
            problems.push(format!(
                "{at} is outside the texture bindings (@group({TEXTURE_GROUP}) @binding(0..=1))"
            ));
            return;
        }
    };
    if slot.kind != expected {
        problems.push(format!("{at} must be {expected} but is {}", slot.kind));
    }
}

fn handle_kind(inner: &naga::TypeInner) -> HandleKind {
    match inner {
        naga::TypeInner::Image {
            dim: naga::ImageDimension::D2,
            arrayed: false,
            class:
                naga::ImageClass::Sampled {
                    kind: naga::ScalarKind::Float,
                    multi: false,
                },
        } => HandleKind::Texture2d,
        naga::TypeInner::Sampler { comparison: false } => HandleKind::Sampler,
        naga::TypeInner::Sampler { comparison: true } => {
            HandleKind::Unsupported("sampler_comparison".to_string())
        }
        naga::TypeInner::Image {
            dim,
            arrayed,
            class,
        } => HandleKind::Unsupported(format!(
            "{dim:?}{} image ({class:?})",
            if *arrayed { " array" } else { "" }
        )),
        other => HandleKind::Unsupported(format!("{other:?}")),
    }
}

fn scalar_name(scalar: naga::Scalar) -> String {
    match (scalar.kind, scalar.width) {
        (naga::ScalarKind::Float, 4) => "f32".to_string(),
        (naga::ScalarKind::Float, 2) => "f16".to_string(),
        (naga::ScalarKind::Sint, 4) => "i32".to_string(),
        (naga::ScalarKind::Uint, 4) => "u32".to_string(),
        (naga::ScalarKind::Bool, _) => "bool".to_string(),
        (kind, width) => format!("{kind:?}{}", u32::from(width) * 8),
    }
}

/// WGSL spelling of an inter-stage type; varyings are scalars or vectors.
fn varying_type(inner: &naga::TypeInner) -> String {
    match inner {
        naga::TypeInner::Scalar(scalar) => scalar_name(*scalar),
        naga::TypeInner::Vector { size, scalar } => {
            format!("vec{}<{}>", *size as u8, scalar_name(*scalar))
        }
        other => format!("{other:?}"),
    }
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut Vec<Varying>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => out.push(Varying {
            location: *location,
            ty: varying_type(&module.types[ty].inner),
        }),
        Some(_) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROKEN: &str = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return oops; }";

    fn locations(varyings: &[Varying]) -> Vec<u32> {
        varyings.iter().map(|v| v.location).collect()
    }

    fn link_with_quad_vertex(fs_src: &str) -> Result<ProgramInterface, String> {
        let vs = compile_stage(Stage::Vertex, QUAD_SHADER.vertex).unwrap();
        let fs = compile_stage(Stage::Fragment, fs_src).unwrap();
        link(&vs, &fs)
    }

    #[test]
    fn embedded_vertex_stage_compiles() {
        let vs = compile_stage(Stage::Vertex, QUAD_SHADER.vertex).unwrap();
        assert_eq!(vs.entry_point.as_deref(), Some("vs_main"));
        assert_eq!(locations(&vs.inputs), [0, 1]);
        assert_eq!(locations(&vs.outputs), [0]);
        assert_eq!(vs.outputs[0].ty, "vec2<f32>");
        assert!(vs.handles.is_empty());
    }

    #[test]
    fn embedded_vertex_stage_declares_matrix_uniforms() {
        let vs = compile_stage(Stage::Vertex, QUAD_SHADER.vertex).unwrap();
        let names: Vec<_> = vs.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["projection", "model"]);
        assert!(vs.uniforms.iter().all(|u| u.group == 0 && u.is_mat4));
    }

    #[test]
    fn embedded_fragment_stage_compiles() {
        let fs = compile_stage(Stage::Fragment, QUAD_SHADER.fragment).unwrap();
        assert_eq!(fs.entry_point.as_deref(), Some("fs_main"));
        assert_eq!(locations(&fs.inputs), [0]);
        assert!(fs.uniforms.is_empty());
        let kinds: Vec<_> = fs
            .handles
            .iter()
            .map(|h| (h.group, h.binding, h.kind.clone()))
            .collect();
        assert_eq!(kinds, [(1, 0, HandleKind::Texture2d), (1, 1, HandleKind::Sampler)]);
    }

    #[test]
    fn embedded_program_links() {
        let vs = compile_stage(Stage::Vertex, QUAD_SHADER.vertex).unwrap();
        let fs = compile_stage(Stage::Fragment, QUAD_SHADER.fragment).unwrap();
        let program = link(&vs, &fs).unwrap();
        assert_eq!(program.uniform("projection").map(|u| u.binding), Some(0));
        assert_eq!(program.uniform("model").map(|u| u.binding), Some(1));
        assert!(program.uniform("tex").is_none());
    }

    #[test]
    fn syntax_error_is_a_compile_diagnostic() {
        let err = compile_stage(Stage::Vertex, BROKEN).unwrap_err();
        match err {
            ShaderDiagnostic::Compile { stage, log } => {
                assert_eq!(stage, Stage::Vertex);
                assert!(log.contains("oops"), "log should mention the bad token: {log}");
            }
            other => panic!("expected compile diagnostic, got {other:?}"),
        }
    }

    #[test]
    fn missing_entry_point_fails_link() {
        let vs = compile_stage(Stage::Vertex, QUAD_SHADER.vertex).unwrap();
        let fs = compile_stage(Stage::Fragment, "fn helper() -> f32 { return 1.0; }").unwrap();
        assert!(fs.entry_point.is_none());
        let log = link(&vs, &fs).unwrap_err();
        assert!(log.contains("@fragment"), "got: {log}");
    }

    #[test]
    fn unmatched_varying_fails_link() {
        let fs_src = "@fragment fn fs_main(@location(3) v: vec2<f32>) -> @location(0) vec4<f32> {\n    return vec4<f32>(v, 0.0, 1.0);\n}\n";
        let vs = compile_stage(Stage::Vertex, QUAD_SHADER.vertex).unwrap();
        let fs = compile_stage(Stage::Fragment, fs_src).unwrap();
        let log = link(&vs, &fs).unwrap_err();
        assert!(log.contains("@location(3)"), "got: {log}");
    }

    #[test]
    fn varying_type_mismatch_fails_link() {
        // The quad vertex stage writes vec2<f32> at location 0.
        let fs_src = "@fragment fn fs_main(@location(0) v: vec4<f32>) -> @location(0) vec4<f32> {\n    return v;\n}\n";
        let log = link_with_quad_vertex(fs_src).unwrap_err();
        assert!(log.contains("@location(0)"), "got: {log}");
        assert!(log.contains("vec4<f32>") && log.contains("vec2<f32>"), "got: {log}");
    }

    #[test]
    fn integer_texture_fails_link() {
        let fs_src = "@group(1) @binding(0) var tex: texture_2d<u32>;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    let texel = textureLoad(tex, vec2<i32>(uv * 4.0), 0);
    return vec4<f32>(texel) / 255.0;
}
";
        let log = link_with_quad_vertex(fs_src).unwrap_err();
        assert!(log.contains("`tex`"), "got: {log}");
        assert!(log.contains("must be texture_2d<f32>"), "got: {log}");
    }

    #[test]
    fn texture_outside_texture_group_fails_link() {
        let fs_src = "@group(0) @binding(2) var tex: texture_2d<f32>;
@group(0) @binding(3) var samp: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, uv);
}
";
        let log = link_with_quad_vertex(fs_src).unwrap_err();
        assert!(log.contains("`tex` at @group(0) @binding(2)"), "got: {log}");
        assert!(log.contains("`samp` at @group(0) @binding(3)"), "got: {log}");
    }

    #[test]
    fn swapped_texture_bindings_fail_link() {
        let fs_src = "@group(1) @binding(1) var tex: texture_2d<f32>;
@group(1) @binding(0) var samp: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex, samp, uv);
}
";
        let log = link_with_quad_vertex(fs_src).unwrap_err();
        assert!(log.contains("must be sampler but is texture_2d<f32>"), "got: {log}");
    }

    #[test]
    fn fragment_without_texture_links() {
        let fs_src = "@fragment fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {\n    return vec4<f32>(uv, 0.0, 1.0);\n}\n";
        assert!(link_with_quad_vertex(fs_src).is_ok());
    }

    #[test]
    fn swapped_stages_fail_link() {
        let vs = compile_stage(Stage::Vertex, QUAD_SHADER.vertex).unwrap();
        let fs = compile_stage(Stage::Fragment, QUAD_SHADER.fragment).unwrap();
        assert!(link(&fs, &vs).is_err());
    }

    #[test]
    fn format_shader_log_numbers_lines() {
        let out = format_shader_log("a\nb", "boom");
        assert_eq!(out, "1: a\n2: b\n\nboom");
    }

    #[test]
    fn format_shader_log_right_aligns_numbers() {
        let source = (1..=10).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        let out = format_shader_log(&source, "");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], " 1: l1");
        assert_eq!(lines[9], "10: l10");
    }

    #[test]
    fn format_shader_log_handles_empty_inputs() {
        assert_eq!(format_shader_log("", ""), "");
        assert_eq!(format_shader_log("", "only log"), "only log");
    }

    #[test]
    fn diagnostic_display_names_the_stage() {
        let d = ShaderDiagnostic::Compile {
            stage: Stage::Fragment,
            log: "bad".into(),
        };
        assert!(d.to_string().contains("fragment"));
        assert!(ShaderDiagnostic::Link("x".into()).to_string().contains("link"));
    }
}
