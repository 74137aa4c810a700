//! Loads effect packs from disk into [`TransitionDescriptor`]s.
//!
//! - `LocalEffect::load` reads and validates `effect.toml`.
//! - `LocalEffect::descriptor` reads the GLSL sources it names.
//! - `load_effect_dir` collects every pack below a directory, in name order.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

use crate::builtin::QUAD_VERTEX_SHADER;
use crate::descriptor::TransitionDescriptor;
use crate::manifest::EffectManifest;

pub const MANIFEST_FILE: &str = "effect.toml";

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error("missing shader source: {0}")]
    SourceMissing(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct LocalEffect {
    root: PathBuf,
    manifest: EffectManifest,
}

impl LocalEffect {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(PackError::ManifestMissing(manifest_path));
        }

        let manifest_raw = fs::read_to_string(&manifest_path)?;
        let manifest: EffectManifest = toml::from_str(&manifest_raw)?;
        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }

        Ok(Self { root, manifest })
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn manifest(&self) -> &EffectManifest {
        &self.manifest
    }

    /// Pack name, falling back to the directory name.
    pub fn name(&self) -> String {
        self.manifest.name.clone().unwrap_or_else(|| {
            self.root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "effect".to_string())
        })
    }

    pub fn fragment_path(&self) -> PathBuf {
        self.root.join(&self.manifest.fragment)
    }

    pub fn vertex_path(&self) -> Option<PathBuf> {
        self.manifest.vertex.as_ref().map(|path| self.root.join(path))
    }

    pub fn descriptor(&self) -> Result<TransitionDescriptor, PackError> {
        let fragment_source = read_source(&self.fragment_path())?;
        let vertex_source = match self.vertex_path() {
            Some(path) => read_source(&path)?,
            None => QUAD_VERTEX_SHADER.to_string(),
        };

        Ok(TransitionDescriptor {
            name: Some(self.name()),
            vertex_source,
            fragment_source,
            uniforms: self.manifest.uniforms.clone(),
            frame_interval_hint: self.manifest.frame_interval,
        })
    }
}

fn read_source(path: &Path) -> Result<String, PackError> {
    if !path.exists() {
        return Err(PackError::SourceMissing(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

/// Loads every subdirectory of `dir` that carries an `effect.toml`.
pub fn load_effect_dir(dir: impl AsRef<Path>) -> Result<Vec<Arc<TransitionDescriptor>>> {
    let dir = dir.as_ref();
    let mut roots = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path.join(MANIFEST_FILE).is_file() {
            roots.push(path);
        }
    }
    roots.sort();

    let mut descriptors = Vec::with_capacity(roots.len());
    for root in roots {
        let effect = LocalEffect::load(&root)
            .with_context(|| format!("loading effect pack {}", root.display()))?;
        let descriptor = effect
            .descriptor()
            .with_context(|| format!("reading sources of {}", root.display()))?;
        debug!(effect = descriptor.label(), path = %root.display(), "loaded effect pack");
        descriptors.push(Arc::new(descriptor));
    }
    Ok(descriptors)
}
