//! Schema of the `effect.toml` file at the root of an on-disk effect pack.
//!
//! A pack is a directory holding the manifest and its GLSL sources:
//!
//! ```toml
//! name = "window-slice"
//! fragment = "fragment.glsl"
//! frame_interval = "100ms"
//!
//! [[uniforms]]
//! name = "count"
//! values = [20.0]
//! ```
//!
//! `vertex` is optional; packs without one use the shared full-surface quad
//! vertex shader. `frame_interval` takes a humantime string or whole
//! milliseconds.
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::descriptor::{deserialize_interval_opt, UniformAssignment};

#[derive(Debug, Deserialize, Clone)]
pub struct EffectManifest {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub vertex: Option<PathBuf>,
    #[serde(default = "default_fragment")]
    pub fragment: PathBuf,
    #[serde(default, deserialize_with = "deserialize_interval_opt")]
    pub frame_interval: Option<Duration>,
    #[serde(default)]
    pub uniforms: Vec<UniformAssignment>,
}

fn default_fragment() -> PathBuf {
    PathBuf::from("fragment.glsl")
}

impl EffectManifest {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.fragment.as_os_str().is_empty() {
            issues.push("fragment source path is empty".to_string());
        }
        if matches!(self.frame_interval, Some(interval) if interval.is_zero()) {
            issues.push("frame_interval must be greater than zero".to_string());
        }
        for uniform in &self.uniforms {
            if uniform.name.trim().is_empty() {
                issues.push("uniform without a name".to_string());
            } else if !uniform.has_supported_arity() {
                issues.push(format!(
                    "uniform '{}' has {} values; expected 1 to 4",
                    uniform.name,
                    uniform.values.len()
                ));
            }
        }
        issues
    }
}
