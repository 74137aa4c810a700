use std::sync::Arc;
use std::time::Duration;

use fadeconfig::CarouselConfig;
use renderer::EngineError;
use transitions::{parse_catalog, TransitionDescriptor};

/// Prefix of every surface node id inserted into the container.
pub const SURFACE_ID_PREFIX: &str = "webgl-transition-";

/// Constructor options as they arrive from JavaScript.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarouselOptions {
    /// Inter-cycle wait in milliseconds. Missing or zero keeps the default.
    pub carousel_time_ms: Option<f64>,
    pub watch_resize: bool,
}

impl CarouselOptions {
    pub fn into_config(self) -> Result<CarouselConfig, EngineError> {
        let mut config = CarouselConfig::default().with_watch_resize(self.watch_resize);
        match self.carousel_time_ms {
            Some(ms) if !ms.is_finite() || ms < 0.0 => {
                return Err(EngineError::Configuration(format!(
                    "carouselTime must be a non-negative number of milliseconds, got {ms}"
                )));
            }
            Some(ms) if ms > 0.0 => {
                config = config.with_carousel_time(Duration::from_secs_f64(ms / 1000.0));
            }
            _ => {}
        }
        config.validate()?;
        Ok(config)
    }
}

/// Id for a new surface node. `random` is a uniform sample in `[0, 1)`.
pub fn surface_id(random: f64) -> String {
    let digits = (random.clamp(0.0, 1.0) * 1_000_000.0) as u32 % 1_000_000;
    format!("{SURFACE_ID_PREFIX}{digits:06}")
}

/// Parses the effect catalog JSON handed to the constructor.
pub fn load_effects(json: &str) -> Result<Vec<Arc<TransitionDescriptor>>, EngineError> {
    let effects = parse_catalog(json).map_err(|err| EngineError::Configuration(err.to_string()))?;
    tracing::debug!(effects = effects.len(), "effect catalog loaded");
    Ok(effects)
}
