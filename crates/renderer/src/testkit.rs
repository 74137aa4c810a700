//! Recording doubles for the GL seam and the platform.

use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use image::{Rgba, RgbaImage};

use crate::context::Platform;
use crate::gpu::{GraphicsApi, ShaderStage, SurfaceSize, UniformValue};
use crate::images::{DecodedImage, ImageFetch, ImageLoadError, ImageSource};

pub fn solid_image(color: [u8; 4]) -> DecodedImage {
    DecodedImage::from_rgba(RgbaImage::from_pixel(2, 2, Rgba(color)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upload {
    pub unit: u32,
    pub texture: u32,
    pub first_pixel: [u8; 4],
}

#[derive(Debug, Default)]
pub struct GlLog {
    next_id: u32,
    pub shaders_created: u32,
    pub programs_created: u32,
    pub textures_created: u32,
    pub live_shaders: BTreeSet<u32>,
    pub live_programs: BTreeSet<u32>,
    pub live_textures: BTreeSet<u32>,
    pub live_buffers: BTreeSet<u32>,
    shader_stages: BTreeMap<u32, ShaderStage>,
    pub compiled: Vec<(ShaderStage, u32)>,
    pub current_program: Option<u32>,
    pub bound_buffer: Option<u32>,
    pub bound_textures: BTreeMap<u32, u32>,
    pub uploads: Vec<Upload>,
    pub attributes: Vec<(u32, i32, i32, i32)>,
    pub float_writes: Vec<(String, UniformValue)>,
    pub int_writes: Vec<(String, i32)>,
    pub uniform_lookups: u32,
    pub viewport: Option<(u32, u32)>,
    pub clears: u32,
    pub draws: u32,
    pub last_draw_vertices: Option<i32>,
    /// Live bound textures seen by each draw call.
    pub textures_at_draw: Vec<usize>,
    fail_compile: Option<ShaderStage>,
    fail_link: Option<String>,
    texture_budget: Option<u32>,
}

impl GlLog {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Clone)]
pub struct RecordedLocation {
    name: String,
}

/// [`GraphicsApi`] that tracks object lifetimes and state changes. Clones
/// share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingApi {
    log: Rc<RefCell<GlLog>>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Ref<'_, GlLog> {
        self.log.borrow()
    }

    pub fn fail_compile(&self, stage: ShaderStage) {
        self.log.borrow_mut().fail_compile = Some(stage);
    }

    pub fn fail_link(&self, log: &str) {
        self.log.borrow_mut().fail_link = Some(log.to_string());
    }

    /// Lets `count` more textures be created, then fails.
    pub fn fail_texture_after(&self, count: u32) {
        self.log.borrow_mut().texture_budget = Some(count);
    }

    pub fn clear_failures(&self) {
        let mut log = self.log.borrow_mut();
        log.fail_compile = None;
        log.fail_link = None;
        log.texture_budget = None;
    }
}

impl GraphicsApi for RecordingApi {
    type Shader = u32;
    type Program = u32;
    type Texture = u32;
    type Buffer = u32;
    type UniformLocation = RecordedLocation;

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let mut log = self.log.borrow_mut();
        let id = log.next_id();
        log.shaders_created += 1;
        log.live_shaders.insert(id);
        log.shader_stages.insert(id, stage);
        Ok(id)
    }

    fn compile_shader(&self, shader: u32, _source: &str) -> Result<(), String> {
        let mut log = self.log.borrow_mut();
        let stage = log
            .shader_stages
            .get(&shader)
            .copied()
            .ok_or_else(|| "unknown shader".to_string())?;
        if log.fail_compile == Some(stage) {
            return Err(format!("ERROR: 0:1: injected {stage} failure"));
        }
        log.compiled.push((stage, shader));
        Ok(())
    }

    fn delete_shader(&self, shader: u32) {
        let mut log = self.log.borrow_mut();
        log.live_shaders.remove(&shader);
        log.shader_stages.remove(&shader);
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut log = self.log.borrow_mut();
        let id = log.next_id();
        log.programs_created += 1;
        log.live_programs.insert(id);
        Ok(id)
    }

    fn link_program(&self, _program: u32, vertex: u32, fragment: u32) -> Result<(), String> {
        let log = self.log.borrow();
        if let Some(message) = &log.fail_link {
            return Err(message.clone());
        }
        if !log.live_shaders.contains(&vertex) || !log.live_shaders.contains(&fragment) {
            return Err("attached shader was deleted".into());
        }
        Ok(())
    }

    fn use_program(&self, program: Option<u32>) {
        self.log.borrow_mut().current_program = program;
    }

    fn delete_program(&self, program: u32) {
        self.log.borrow_mut().live_programs.remove(&program);
    }

    fn attrib_location(&self, _program: u32, name: &str) -> Option<u32> {
        match name {
            "a_Position" => Some(0),
            "a_TexCoord" => Some(1),
            _ => None,
        }
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<RecordedLocation> {
        let mut log = self.log.borrow_mut();
        log.uniform_lookups += 1;
        log.live_programs.contains(&program).then(|| RecordedLocation {
            name: name.to_string(),
        })
    }

    fn set_uniform(&self, location: &RecordedLocation, value: UniformValue) {
        self.log
            .borrow_mut()
            .float_writes
            .push((location.name.clone(), value));
    }

    fn set_uniform_i32(&self, location: &RecordedLocation, value: i32) {
        self.log
            .borrow_mut()
            .int_writes
            .push((location.name.clone(), value));
    }

    fn create_texture(&self) -> Result<u32, String> {
        let mut log = self.log.borrow_mut();
        match log.texture_budget {
            Some(0) => return Err("out of texture memory".into()),
            Some(remaining) => log.texture_budget = Some(remaining - 1),
            None => {}
        }
        let id = log.next_id();
        log.textures_created += 1;
        log.live_textures.insert(id);
        Ok(id)
    }

    fn upload_texture(&self, unit: u32, texture: u32, image: &RgbaImage) {
        let mut log = self.log.borrow_mut();
        log.bound_textures.insert(unit, texture);
        log.uploads.push(Upload {
            unit,
            texture,
            first_pixel: image.get_pixel(0, 0).0,
        });
    }

    fn bind_texture(&self, unit: u32, texture: Option<u32>) {
        let mut log = self.log.borrow_mut();
        match texture {
            Some(texture) => log.bound_textures.insert(unit, texture),
            None => log.bound_textures.remove(&unit),
        };
    }

    fn delete_texture(&self, texture: u32) {
        let mut log = self.log.borrow_mut();
        log.live_textures.remove(&texture);
        log.bound_textures.retain(|_, bound| *bound != texture);
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let mut log = self.log.borrow_mut();
        let id = log.next_id();
        log.live_buffers.insert(id);
        Ok(id)
    }

    fn upload_vertices(&self, buffer: u32, _bytes: &[u8]) {
        self.log.borrow_mut().bound_buffer = Some(buffer);
    }

    fn bind_vertex_buffer(&self, buffer: Option<u32>) {
        self.log.borrow_mut().bound_buffer = buffer;
    }

    fn delete_buffer(&self, buffer: u32) {
        self.log.borrow_mut().live_buffers.remove(&buffer);
    }

    fn vertex_attribute(&self, index: u32, components: i32, stride: i32, offset: i32) {
        self.log
            .borrow_mut()
            .attributes
            .push((index, components, stride, offset));
    }

    fn viewport(&self, width: u32, height: u32) {
        self.log.borrow_mut().viewport = Some((width, height));
    }

    fn clear(&self, _color: [f32; 4], _depth: f32) {
        self.log.borrow_mut().clears += 1;
    }

    fn draw_triangle_strip(&self, vertices: i32) {
        let mut log = self.log.borrow_mut();
        log.draws += 1;
        log.last_draw_vertices = Some(vertices);
        let live_bound = log
            .bound_textures
            .values()
            .filter(|texture| log.live_textures.contains(texture))
            .count();
        log.textures_at_draw.push(live_bound);
    }
}

/// Platform handing out a fresh [`RecordingApi`] per surface.
#[derive(Debug)]
pub struct FakePlatform {
    pub size: Option<SurfaceSize>,
    pub apis: Vec<RecordingApi>,
    pub destroyed: u32,
    pub resized: Vec<SurfaceSize>,
    pub lose_requests: u32,
    pub fail_create: bool,
    node: bool,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::with_size(SurfaceSize::new(640, 480))
    }

    pub fn with_size(size: SurfaceSize) -> Self {
        Self {
            size: Some(size),
            apis: Vec::new(),
            destroyed: 0,
            resized: Vec::new(),
            lose_requests: 0,
            fail_create: false,
            node: false,
        }
    }

    pub fn without_size() -> Self {
        Self {
            size: None,
            ..Self::new()
        }
    }

    pub fn live_nodes(&self) -> usize {
        usize::from(self.node)
    }

    pub fn current(&self) -> Option<&RecordingApi> {
        self.apis.last()
    }
}

impl Platform for FakePlatform {
    type Api = RecordingApi;

    fn container_size(&self) -> Option<SurfaceSize> {
        self.size
    }

    fn create_surface(&mut self, _size: SurfaceSize) -> anyhow::Result<RecordingApi> {
        if self.fail_create {
            anyhow::bail!("WebGL is not supported");
        }
        let api = RecordingApi::new();
        self.apis.push(api.clone());
        self.node = true;
        Ok(api)
    }

    fn resize_surface(&mut self, size: SurfaceSize) {
        self.resized.push(size);
    }

    fn destroy_surface(&mut self) {
        if self.node {
            self.node = false;
            self.destroyed += 1;
        }
    }

    fn lose_context(&mut self) -> bool {
        self.lose_requests += 1;
        true
    }
}

/// Image source whose entries can be held back or made to fail.
#[derive(Debug, Default)]
pub struct ScriptedImages {
    pub images: Vec<DecodedImage>,
    pub pending: BTreeMap<usize, u32>,
    pub failing: BTreeSet<usize>,
}

impl ScriptedImages {
    pub fn solid(count: usize) -> Self {
        Self {
            images: (0..count)
                .map(|index| solid_image([(index as u8).wrapping_mul(40), 0, 0, 255]))
                .collect(),
            ..Self::default()
        }
    }
}

impl ImageSource for ScriptedImages {
    fn len(&self) -> usize {
        self.images.len()
    }

    fn fetch(&mut self, index: usize) -> ImageFetch {
        if self.failing.contains(&index) {
            return ImageFetch::Failed(ImageLoadError::Decode {
                index,
                message: "corrupt data".into(),
            });
        }
        if let Some(remaining) = self.pending.get_mut(&index) {
            if *remaining > 0 {
                *remaining -= 1;
                return ImageFetch::Pending;
            }
        }
        match self.images.get(index) {
            Some(image) => ImageFetch::Ready(image.clone()),
            None => ImageFetch::Failed(ImageLoadError::Missing { index }),
        }
    }
}
