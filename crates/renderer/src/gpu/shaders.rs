use std::sync::Arc;

use transitions::TransitionDescriptor;

use super::api::{GraphicsApi, ShaderStage, UniformValue};
use super::textures::{FROM_UNIT, TO_UNIT};
use crate::error::EngineError;

pub const POSITION_ATTRIBUTE: &str = "a_Position";
pub const TEX_COORD_ATTRIBUTE: &str = "a_TexCoord";
pub const TO_SAMPLER_UNIFORM: &str = "u_Sampler";
pub const FROM_SAMPLER_UNIFORM: &str = "u_Sampler1";
pub const TINT_UNIFORM: &str = "u_color";
pub const SHADOW_COLOUR_UNIFORM: &str = "shadow_colour";
pub const SHADOW_HEIGHT_UNIFORM: &str = "shadow_height";
pub const BOUNCES_UNIFORM: &str = "bounces";

const TINT: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const SHADOW_COLOUR: [f32; 4] = [0.0, 0.0, 0.0, 0.6];
const SHADOW_HEIGHT: f32 = 0.075;
const BOUNCES: f32 = 3.0;

/// Locations looked up once per linked program. Effects are free to leave
/// any of them out of their shaders.
pub struct ProgramBindings<A: GraphicsApi> {
    pub position: Option<u32>,
    pub tex_coord: Option<u32>,
    pub to_sampler: Option<A::UniformLocation>,
    pub from_sampler: Option<A::UniformLocation>,
    pub tint: Option<A::UniformLocation>,
    pub shadow_colour: Option<A::UniformLocation>,
    pub shadow_height: Option<A::UniformLocation>,
    pub bounces: Option<A::UniformLocation>,
}

impl<A: GraphicsApi> ProgramBindings<A> {
    fn resolve(api: &A, program: A::Program) -> Self {
        Self {
            position: api.attrib_location(program, POSITION_ATTRIBUTE),
            tex_coord: api.attrib_location(program, TEX_COORD_ATTRIBUTE),
            to_sampler: api.uniform_location(program, TO_SAMPLER_UNIFORM),
            from_sampler: api.uniform_location(program, FROM_SAMPLER_UNIFORM),
            tint: api.uniform_location(program, TINT_UNIFORM),
            shadow_colour: api.uniform_location(program, SHADOW_COLOUR_UNIFORM),
            shadow_height: api.uniform_location(program, SHADOW_HEIGHT_UNIFORM),
            bounces: api.uniform_location(program, BOUNCES_UNIFORM),
        }
    }

    /// Writes the effect-independent values. The program must be current.
    fn apply_fixed(&self, api: &A) {
        if let Some(location) = &self.to_sampler {
            api.set_uniform_i32(location, TO_UNIT as i32);
        }
        if let Some(location) = &self.from_sampler {
            api.set_uniform_i32(location, FROM_UNIT as i32);
        }
        if let Some(location) = &self.tint {
            api.set_uniform(location, UniformValue::Vec4(TINT));
        }
        if let Some(location) = &self.shadow_colour {
            api.set_uniform(location, UniformValue::Vec4(SHADOW_COLOUR));
        }
        if let Some(location) = &self.shadow_height {
            api.set_uniform(location, UniformValue::Float(SHADOW_HEIGHT));
        }
        if let Some(location) = &self.bounces {
            api.set_uniform(location, UniformValue::Float(BOUNCES));
        }
    }
}

pub struct CompiledProgram<A: GraphicsApi> {
    program: A::Program,
    bindings: ProgramBindings<A>,
    descriptor: Arc<TransitionDescriptor>,
}

impl<A: GraphicsApi> CompiledProgram<A> {
    pub fn program(&self) -> A::Program {
        self.program
    }

    pub fn bindings(&self) -> &ProgramBindings<A> {
        &self.bindings
    }

    pub fn descriptor(&self) -> &Arc<TransitionDescriptor> {
        &self.descriptor
    }
}

/// One vertex and one fragment shader object, recompiled in place for each
/// effect, plus the single program linked from them.
pub struct ShaderCache<A: GraphicsApi> {
    vertex: Option<A::Shader>,
    fragment: Option<A::Shader>,
    current: Option<CompiledProgram<A>>,
}

impl<A: GraphicsApi> Default for ShaderCache<A> {
    fn default() -> Self {
        Self {
            vertex: None,
            fragment: None,
            current: None,
        }
    }
}

impl<A: GraphicsApi> ShaderCache<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&CompiledProgram<A>> {
        self.current.as_ref()
    }

    /// Compiles and links `descriptor`, making the result the current program.
    /// The same descriptor (by identity) keeps its existing program.
    pub fn compile(
        &mut self,
        api: &A,
        descriptor: &Arc<TransitionDescriptor>,
    ) -> Result<&CompiledProgram<A>, EngineError> {
        let reusable = self
            .current
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(&current.descriptor, descriptor));
        if !reusable {
            self.rebuild(api, descriptor)?;
        }
        match self.current.as_ref() {
            Some(compiled) => {
                api.use_program(Some(compiled.program));
                Ok(compiled)
            }
            None => Err(EngineError::Resource("no program after link".into())),
        }
    }

    fn rebuild(
        &mut self,
        api: &A,
        descriptor: &Arc<TransitionDescriptor>,
    ) -> Result<(), EngineError> {
        let vertex = compile_stage(
            api,
            &mut self.vertex,
            ShaderStage::Vertex,
            &descriptor.vertex_source,
        )?;
        let fragment = compile_stage(
            api,
            &mut self.fragment,
            ShaderStage::Fragment,
            &descriptor.fragment_source,
        )?;

        self.release_program(api);
        let program = api.create_program().map_err(EngineError::Resource)?;
        if let Err(log) = api.link_program(program, vertex, fragment) {
            api.delete_program(program);
            tracing::warn!(effect = descriptor.label(), %log, "program link failed");
            return Err(EngineError::Link { log });
        }

        api.use_program(Some(program));
        let bindings = ProgramBindings::resolve(api, program);
        bindings.apply_fixed(api);
        tracing::debug!(effect = descriptor.label(), ?program, "linked transition program");
        self.current = Some(CompiledProgram {
            program,
            bindings,
            descriptor: Arc::clone(descriptor),
        });
        Ok(())
    }

    fn release_program(&mut self, api: &A) {
        if let Some(previous) = self.current.take() {
            api.use_program(None);
            api.delete_program(previous.program);
        }
    }

    /// Deletes the program and both shader objects.
    pub fn release(&mut self, api: &A) {
        self.release_program(api);
        if let Some(shader) = self.vertex.take() {
            api.delete_shader(shader);
        }
        if let Some(shader) = self.fragment.take() {
            api.delete_shader(shader);
        }
    }
}

fn compile_stage<A: GraphicsApi>(
    api: &A,
    slot: &mut Option<A::Shader>,
    stage: ShaderStage,
    source: &str,
) -> Result<A::Shader, EngineError> {
    let shader = match *slot {
        Some(shader) => shader,
        None => {
            let shader = api.create_shader(stage).map_err(EngineError::Resource)?;
            *slot = Some(shader);
            shader
        }
    };
    if let Err(log) = api.compile_shader(shader, source) {
        api.delete_shader(shader);
        *slot = None;
        tracing::warn!(%stage, %log, "shader compile failed");
        return Err(EngineError::Compile { stage, log });
    }
    Ok(shader)
}
