//! Rendering engine for the fadeshow image carousel.
//!
//! The crate ties the playback scheduler to a GL context. The overall flow is:
//!
//! ```text
//!   host (rAF / timers) ──▶ Carousel::on_frame / on_timer
//!                                  │
//!                                  ▼
//!              Playback ──▶ CarouselStage::prepare / draw
//!                                  │
//!                                  ▼
//!   ContextManager ──▶ RenderingSurface ──▶ ShaderCache + TextureBuffer ──▶ GL
//! ```
//!
//! `Carousel` owns the state. `ContextManager` replaces the surface after a
//! context loss, and `RenderingSurface` owns every GPU object created on one
//! context. GL calls go through the `GraphicsApi` seam, implemented for
//! `glow::Context` by `GlowApi`.

mod context;
mod engine;
mod error;
pub mod gpu;
mod images;
mod resize;

#[cfg(test)]
mod testkit;

pub use context::{ContextManager, LossResponse, Platform};
pub use engine::Carousel;
pub use error::EngineError;
pub use gpu::{GlowApi, GraphicsApi, RenderingSurface, ShaderStage, SurfaceSize, FALLBACK_SIZE};
#[cfg(not(target_arch = "wasm32"))]
pub use images::FileImages;
pub use images::{DecodedImage, ImageFetch, ImageLoadError, ImageSource, StaticImages};
pub use resize::ResizeHandler;
