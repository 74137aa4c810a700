//! Browser bindings for the fadeshow carousel.
//!
//! `WebCarousel` is exported to JavaScript through `wasm-bindgen`. It inserts a
//! WebGL canvas into a container element, drives playback from
//! `requestAnimationFrame` and `setTimeout`, and rebuilds the canvas when the
//! browser drops the context. Everything outside [`options`] is compiled for
//! `wasm32` only.

pub mod options;

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::WebCarousel;
