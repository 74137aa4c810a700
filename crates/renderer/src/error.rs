use fadeconfig::ConfigError;
use thiserror::Error;

use crate::gpu::ShaderStage;
use crate::images::ImageLoadError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad constructor arguments. Never raised once the carousel is running.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("GPU context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("GPU context lost")]
    ContextLost,

    #[error("failed to compile {stage} shader: {log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("failed to link shader program: {log}")]
    Link { log: String },

    #[error(transparent)]
    ImageLoad(#[from] ImageLoadError),

    #[error("GPU resource error: {0}")]
    Resource(String),

    #[error("carousel was stopped; it can only start again after a rebuild")]
    Stopped,

    #[error("carousel has been disposed")]
    Disposed,
}

impl EngineError {
    /// Whether the error only aborts the current cycle.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            EngineError::Configuration(_) | EngineError::ContextUnavailable(_) | EngineError::Disposed
        )
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_failures_abort_only_the_cycle() {
        assert!(EngineError::Link { log: "bad".into() }.is_recoverable());
        assert!(EngineError::ContextLost.is_recoverable());
        assert!(!EngineError::ContextUnavailable("no webgl".into()).is_recoverable());
        assert!(!EngineError::Disposed.is_recoverable());
    }
}
