//! TOML configuration for the fragscope viewer.
//!
//! ```toml
//! version = 1
//!
//! [window]
//! width = 1280
//! height = 720
//!
//! [gpu]
//! power_preference = "high-performance"
//! timer_queries = true
//! present_mode = "auto-vsync"
//!
//! [telemetry]
//! target_interval = "16ms 667us"
//! reconcile_band = 2.0
//!
//! [playback]
//! start_paused = false
//! frozen_time = 1.5
//! ```
//!
//! Every section is optional; durations accept seconds as numbers or
//! humantime strings.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories_next::ProjectDirs;
use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const ENV_CONFIG_DIR: &str = "FRAGSCOPE_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "fragscope";
const APPLICATION: &str = "fragscope";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FragscopeConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub gpu: GpuSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub playback: PlaybackSettings,
}

impl Default for FragscopeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            window: WindowSettings::default(),
            gpu: GpuSettings::default(),
            telemetry: TelemetrySettings::default(),
            playback: PlaybackSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "fragscope".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreferenceSetting {
    #[default]
    HighPerformance,
    LowPower,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresentModeSetting {
    #[default]
    AutoVsync,
    AutoNoVsync,
    Fifo,
    Mailbox,
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpuSettings {
    pub power_preference: PowerPreferenceSetting,
    /// Request GPU timestamp queries when the adapter supports them.
    pub timer_queries: bool,
    pub present_mode: PresentModeSetting,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            power_preference: PowerPreferenceSetting::default(),
            timer_queries: true,
            present_mode: PresentModeSetting::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySettings {
    pub frame_window: usize,
    pub gpu_window: usize,
    /// Metrics are published every this many frames.
    pub publish_interval: u64,
    #[serde(deserialize_with = "deserialize_duration")]
    pub target_interval: Duration,
    pub drop_factor: f64,
    pub reconcile_band: f64,
    /// Frame times included in a diagnostics report.
    pub diagnostics_samples: usize,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        let defaults = telemetry::TelemetryConfig::default();
        Self {
            frame_window: defaults.frame_window,
            gpu_window: defaults.gpu_window,
            publish_interval: 10,
            target_interval: defaults.target_interval,
            drop_factor: defaults.drop_factor,
            reconcile_band: defaults.reconcile_band,
            diagnostics_samples: 8,
        }
    }
}

impl TelemetrySettings {
    pub fn telemetry_config(&self) -> telemetry::TelemetryConfig {
        telemetry::TelemetryConfig {
            frame_window: self.frame_window,
            gpu_window: self.gpu_window,
            target_interval: self.target_interval,
            drop_factor: self.drop_factor,
            reconcile_band: self.reconcile_band,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackSettings {
    pub start_paused: bool,
    /// Elapsed time shown while paused.
    #[serde(deserialize_with = "deserialize_duration")]
    pub frozen_time: Duration,
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
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl FragscopeConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: FragscopeConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(
                "window width and height must be greater than zero".into(),
            ));
        }

        let telemetry = &self.telemetry;
        if telemetry.frame_window == 0 || telemetry.gpu_window == 0 {
            return Err(ConfigError::Invalid(
                "telemetry windows must hold at least one sample".into(),
            ));
        }

        if telemetry.publish_interval == 0 {
            return Err(ConfigError::Invalid(
                "telemetry.publish_interval must be at least one frame".into(),
            ));
        }

        if telemetry.target_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "telemetry.target_interval must be greater than zero".into(),
            ));
        }

        for (name, value) in [
            ("drop_factor", telemetry.drop_factor),
            ("reconcile_band", telemetry.reconcile_band),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "telemetry.{name} must be a positive number"
                )));
            }
        }

        Ok(())
    }
}

/// Directory holding `config.toml`; `FRAGSCOPE_CONFIG_DIR` takes precedence.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os(ENV_CONFIG_DIR).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
