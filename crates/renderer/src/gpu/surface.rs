use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use transitions::TransitionDescriptor;

use super::api::GraphicsApi;
use super::shaders::ShaderCache;
use super::textures::TextureBuffer;
use super::uniforms::bind_frame_uniforms;
use crate::error::EngineError;
use crate::images::DecodedImage;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];
const CLEAR_DEPTH: f32 = 1.0;

/// Size used when the container reports none.
pub const FALLBACK_SIZE: SurfaceSize = SurfaceSize {
    width: 1920,
    height: 1080,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Rounds a fractional box size. Degenerate sizes yield `None`.
    pub fn from_box(width: f64, height: f64) -> Option<Self> {
        if !width.is_finite() || !height.is_finite() {
            return None;
        }
        let width = width.round();
        let height = height.round();
        if width < 1.0 || height < 1.0 {
            return None;
        }
        Some(Self {
            width: width as u32,
            height: height as u32,
        })
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    tex_coord: [f32; 2],
}

const QUAD: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, 1.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, -1.0],
        tex_coord: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        tex_coord: [1.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        tex_coord: [1.0, 0.0],
    },
];

const QUAD_STRIDE: i32 = std::mem::size_of::<QuadVertex>() as i32;
const TEX_COORD_OFFSET: i32 = std::mem::size_of::<[f32; 2]>() as i32;

/// One rendering context and every GPU object created on it.
///
/// A surface is never reused across a context loss; the context manager
/// disposes it and builds a new one.
pub struct RenderingSurface<A: GraphicsApi> {
    api: A,
    size: SurfaceSize,
    quad: Option<A::Buffer>,
    shaders: ShaderCache<A>,
    textures: TextureBuffer<A>,
    cleared: bool,
}

impl<A: GraphicsApi> RenderingSurface<A> {
    pub fn new(api: A, size: SurfaceSize) -> Result<Self, EngineError> {
        let quad = api.create_buffer().map_err(EngineError::Resource)?;
        api.upload_vertices(quad, bytemuck::cast_slice(&QUAD));
        api.viewport(size.width, size.height);
        Ok(Self {
            api,
            size,
            quad: Some(quad),
            shaders: ShaderCache::new(),
            textures: TextureBuffer::new(),
            cleared: false,
        })
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn live_textures(&self) -> usize {
        self.textures.live_textures()
    }

    pub fn is_disposed(&self) -> bool {
        self.quad.is_none()
    }

    /// Links the effect and uploads the image pair.
    pub fn prepare(
        &mut self,
        descriptor: &Arc<TransitionDescriptor>,
        from: &DecodedImage,
        to: &DecodedImage,
    ) -> Result<(), EngineError> {
        let quad = self.quad.ok_or(EngineError::ContextLost)?;
        let compiled = self.shaders.compile(&self.api, descriptor)?;

        self.api.bind_vertex_buffer(Some(quad));
        let bindings = compiled.bindings();
        if let Some(position) = bindings.position {
            self.api.vertex_attribute(position, 2, QUAD_STRIDE, 0);
        }
        if let Some(tex_coord) = bindings.tex_coord {
            self.api
                .vertex_attribute(tex_coord, 2, QUAD_STRIDE, TEX_COORD_OFFSET);
        }

        self.textures.upload(&self.api, from, to)
    }

    /// Draws one frame of the prepared transition.
    pub fn draw(&mut self, progress: f32) -> Result<(), EngineError> {
        if self.quad.is_none() {
            return Err(EngineError::ContextLost);
        }
        let Some(compiled) = self.shaders.current() else {
            return Err(EngineError::Resource("draw without a linked program".into()));
        };
        if !self.textures.is_complete() {
            return Err(EngineError::Resource("draw without a texture pair".into()));
        }

        if !self.cleared {
            self.api.clear(CLEAR_COLOR, CLEAR_DEPTH);
            self.cleared = true;
        }

        let program = compiled.program();
        self.api.use_program(Some(program));
        bind_frame_uniforms(
            &self.api,
            program,
            progress,
            &compiled.descriptor().uniforms,
        );
        self.textures.bind(&self.api);
        self.api.draw_triangle_strip(QUAD.len() as i32);
        Ok(())
    }

    pub fn resize(&mut self, size: SurfaceSize) {
        self.size = size;
        if !self.is_disposed() {
            self.api.viewport(size.width, size.height);
        }
    }

    /// Deletes every GPU object. Safe to call repeatedly and on a lost
    /// context, where the deletions are no-ops.
    pub fn dispose(&mut self) {
        let Some(quad) = self.quad.take() else {
            return;
        };
        self.api.bind_vertex_buffer(None);
        self.api.delete_buffer(quad);
        self.shaders.release(&self.api);
        self.textures.release(&self.api);
        tracing::debug!(
            width = self.size.width,
            height = self.size.height,
            "rendering surface disposed"
        );
    }
}
