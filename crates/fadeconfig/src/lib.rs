use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How transition progress advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// One progress step per animation frame delivered by the host.
    #[default]
    Frame,
    /// One progress step per fixed wall-clock interval (the effect's hint, or
    /// `frame_interval` when the effect has none).
    Interval,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecoveryConfig {
    #[serde(
        default = "default_first_backoff",
        deserialize_with = "deserialize_duration"
    )]
    pub first_backoff: Duration,
    #[serde(
        default = "default_retry_backoff",
        deserialize_with = "deserialize_duration"
    )]
    pub retry_backoff: Duration,
}

impl RecoveryConfig {
    /// Backoff before the rebuild that follows a context loss. The first loss
    /// waits longer than losses after a successful recovery.
    pub fn backoff(&self, recoveries: u32) -> Duration {
        if recoveries == 0 {
            self.first_backoff
        } else {
            self.retry_backoff
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            first_backoff: default_first_backoff(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CarouselConfig {
    pub version: u32,
    #[serde(
        default = "default_carousel_time",
        deserialize_with = "deserialize_duration"
    )]
    pub carousel_time: Duration,
    #[serde(default = "default_step")]
    pub step: f32,
    #[serde(default)]
    pub pacing: Pacing,
    #[serde(
        default = "default_frame_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub frame_interval: Duration,
    #[serde(default)]
    pub watch_resize: bool,
    #[serde(
        default = "default_resize_debounce",
        deserialize_with = "deserialize_duration"
    )]
    pub resize_debounce: Duration,
    #[serde(
        default = "default_image_poll",
        deserialize_with = "deserialize_duration"
    )]
    pub image_poll: Duration,
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            version: 1,
            carousel_time: default_carousel_time(),
            step: default_step(),
            pacing: Pacing::default(),
            frame_interval: default_frame_interval(),
            watch_resize: false,
            resize_debounce: default_resize_debounce(),
            image_poll: default_image_poll(),
            recovery: RecoveryConfig::default(),
        }
    }
}

fn default_carousel_time() -> Duration {
    Duration::from_millis(3000)
}

fn default_step() -> f32 {
    0.02
}

fn default_frame_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_resize_debounce() -> Duration {
    Duration::from_millis(300)
}

fn default_image_poll() -> Duration {
    Duration::from_millis(50)
}

fn default_first_backoff() -> Duration {
    Duration::from_millis(3000)
}

fn default_retry_backoff() -> Duration {
    Duration::from_millis(1000)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl CarouselConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: CarouselConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn with_carousel_time(mut self, carousel_time: Duration) -> Self {
        self.carousel_time = carousel_time;
        self
    }

    pub fn with_watch_resize(mut self, watch_resize: bool) -> Self {
        self.watch_resize = watch_resize;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if !self.step.is_finite() || self.step <= 0.0 || self.step > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "step must be within (0, 1], got {}",
                self.step
            )));
        }

        if self.frame_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "frame_interval must be greater than zero".into(),
            ));
        }

        if self.image_poll.is_zero() {
            return Err(ConfigError::Invalid(
                "image_poll must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
