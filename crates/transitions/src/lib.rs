//! Transition effects: the descriptors the carousel engine renders with, the
//! JSON catalog format that carries them, and on-disk effect packs.

mod builtin;
mod descriptor;
mod manifest;
mod pack;

pub use builtin::{crossfade, QUAD_VERTEX_SHADER};
pub use descriptor::{parse_catalog, CatalogError, TransitionDescriptor, UniformAssignment};
pub use manifest::EffectManifest;
pub use pack::{load_effect_dir, LocalEffect, PackError, MANIFEST_FILE};
