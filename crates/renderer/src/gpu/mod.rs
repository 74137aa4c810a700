//! GPU side of the carousel.
//!
//! - `api` is the GL seam (`GraphicsApi`) and its `glow` implementation.
//! - `shaders` compiles transition descriptors into the single current program
//!   and resolves the bindings every effect shares.
//! - `textures` keeps the from/to texture pair on units 1 and 0.
//! - `uniforms` writes progress and per-effect parameters each frame.
//! - `surface` owns one context's quad buffer, program and textures and issues
//!   the draw call.

mod api;
mod shaders;
mod surface;
mod textures;
mod uniforms;

pub use api::{GlowApi, GraphicsApi, ShaderStage, UniformValue};
pub use shaders::{CompiledProgram, ProgramBindings, ShaderCache};
pub use surface::{RenderingSurface, SurfaceSize, FALLBACK_SIZE};
pub use textures::{TextureBuffer, FROM_UNIT, TO_UNIT};
pub use uniforms::{bind_frame_uniforms, PROGRESS_UNIFORM};
