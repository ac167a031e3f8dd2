use std::rc::Rc;

use glam::Mat4;

use crate::backend::{Backend, ProgramId, ShaderId, UniformLocation};

use super::shader::{self, CompiledStage, ProgramInterface, ShaderDiagnostic, ShaderSource, Stage};

/// The single shader program of a renderer.
///
/// Building never fails: compile and link problems are logged, kept in
/// [`diagnostics`](Self::diagnostics), and leave the pipeline without a program.
/// An invalid pipeline binds nothing and draws nothing.
pub struct ShaderPipeline<B: Backend> {
    backend: Rc<B>,
    program: Option<ProgramId>,
    interface: ProgramInterface,
    projection: Option<UniformLocation>,
    model: Option<UniformLocation>,
    diagnostics: Vec<ShaderDiagnostic>,
}

impl<B: Backend> ShaderPipeline<B> {
    /// Compiles both stages, links them and resolves the `projection` and
    /// `model` uniform locations.
    pub fn build(backend: &Rc<B>, source: &ShaderSource) -> Self {
        let mut diagnostics = Vec::new();

        let vertex = compile(backend.as_ref(), Stage::Vertex, source.vertex, &mut diagnostics);
        let fragment = compile(backend.as_ref(), Stage::Fragment, source.fragment, &mut diagnostics);

        let mut program = None;
        let mut interface = ProgramInterface::default();

        if let (Some((vs, vs_id)), Some((fs, fs_id))) = (&vertex, &fragment) {
            match shader::link(vs, fs) {
                Ok(linked) => match backend.create_program(*vs_id, *fs_id) {
                    Ok(id) => {
                        program = Some(id);
                        interface = linked;
                    }
                    Err(e) => report(&mut diagnostics, ShaderDiagnostic::Link(e.to_string())),
                },
                Err(log) => report(&mut diagnostics, ShaderDiagnostic::Link(log)),
            }
        }

        // The program keeps what it needs; stage objects are not used again.
        for (_, id) in vertex.iter().chain(fragment.iter()) {
            backend.delete_shader(*id);
        }

        let mut pipeline = Self {
            backend: Rc::clone(backend),
            program,
            interface,
            projection: None,
            model: None,
            diagnostics,
        };
        pipeline.projection = pipeline.uniform_location("projection");
        pipeline.model = pipeline.uniform_location("model");

        match pipeline.program {
            Some(id) => log::info!(
                "shader program {} linked (projection: {:?}, model: {:?})",
                id.raw(),
                pipeline.projection,
                pipeline.model
            ),
            None => log::error!(
                "shader pipeline has no valid program; frames will only be cleared"
            ),
        }

        pipeline
    }

    /// Whether a program was linked.
    pub fn is_valid(&self) -> bool {
        self.program.is_some()
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Compile and link problems collected while building.
    pub fn diagnostics(&self) -> &[ShaderDiagnostic] {
        &self.diagnostics
    }

    /// Looks up a `mat4x4<f32>` uniform in group 0 of the linked program.
    ///
    /// Returns `None` for unknown names, for uniforms outside group 0 or of
    /// another type, and for an invalid pipeline.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.program?;
        let slot = self.interface.uniform(name)?;
        if slot.group != 0 || !slot.is_mat4 {
            log::warn!(
                "uniform `{name}` at @group({}) @binding({}) is not a group 0 mat4; ignored",
                slot.group,
                slot.binding
            );
            return None;
        }
        Some(UniformLocation(slot.binding))
    }

    pub fn projection_location(&self) -> Option<UniformLocation> {
        self.projection
    }

    pub fn model_location(&self) -> Option<UniformLocation> {
        self.model
    }

    /// Makes this program current. Returns `false` if there is no program.
    pub fn bind(&self) -> bool {
        match self.program {
            Some(id) => {
                self.backend.use_program(id);
                true
            }
            None => false,
        }
    }

    /// Writes a matrix uniform; a `None` location is a no-op.
    pub fn set_uniform(&self, location: Option<UniformLocation>, value: &Mat4) {
        if let Some(location) = location {
            self.backend.set_uniform_mat4(location, value);
        }
    }

    pub fn set_projection(&self, value: &Mat4) {
        self.set_uniform(self.projection, value);
    }

    pub fn set_model(&self, value: &Mat4) {
        self.set_uniform(self.model, value);
    }
}

impl<B: Backend> Drop for ShaderPipeline<B> {
    fn drop(&mut self) {
        if let Some(id) = self.program.take() {
            self.backend.delete_program(id);
        }
    }
}

fn compile<B: Backend>(
    backend: &B,
    stage: Stage,
    source: &str,
    diagnostics: &mut Vec<ShaderDiagnostic>,
) -> Option<(CompiledStage, ShaderId)> {
    let compiled = match shader::compile_stage(stage, source) {
        Ok(compiled) => compiled,
        Err(diag) => {
            report(diagnostics, diag);
            return None;
        }
    };

    match backend.create_shader(&compiled) {
        Ok(id) => Some((compiled, id)),
        Err(e) => {
            report(
                diagnostics,
                ShaderDiagnostic::Compile {
                    stage,
                    log: e.to_string(),
                },
            );
            None
        }
    }
}

fn report(diagnostics: &mut Vec<ShaderDiagnostic>, diag: ShaderDiagnostic) {
    log::error!("{diag}");
    diagnostics.push(diag);
}
