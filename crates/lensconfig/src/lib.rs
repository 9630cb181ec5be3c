//! `shaderlens.toml` model and validation.
//!
//! ```toml
//! version = 1
//!
//! [service]
//! base_url = "http://localhost:3001/api"
//! timeout = "60s"
//!
//! [preview]
//! width = 960
//! height = 540
//! fps = 0            # 0 = follow the display
//! reload_interval = "250ms"
//!
//! [renderer]
//! api = "auto"       # auto | modern | legacy
//! power = "high"     # high | low
//!
//! [log]
//! level = "info"
//! ```
//!
//! Every section and key is optional except `version`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "shaderlens.toml";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001/api";

const MAX_PREVIEW_DIMENSION: u32 = 16_384;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiSetting {
    #[default]
    Auto,
    Modern,
    Legacy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    #[default]
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LensConfig {
    pub version: u32,
    #[serde(default)]
    pub service: ServiceSection,
    #[serde(default)]
    pub preview: PreviewSection,
    #[serde(default)]
    pub renderer: RendererSection,
    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(
        default = "default_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PreviewSection {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
    #[serde(
        default = "default_reload_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub reload_interval: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RendererSection {
    #[serde(default)]
    pub api: ApiSetting,
    #[serde(default)]
    pub power: PowerSetting,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogSection {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_width() -> u32 {
    960
}

fn default_height() -> u32 {
    540
}

fn default_reload_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            version: 1,
            service: ServiceSection::default(),
            preview: PreviewSection::default(),
            renderer: RendererSection::default(),
            log: LogSection::default(),
        }
    }
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
        }
    }
}

impl Default for PreviewSection {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: None,
            reload_interval: default_reload_interval(),
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl de::Visitor<'_> for Visitor {
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
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must be non-negative"))
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

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

impl LensConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: LensConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    /// Like [`load`](Self::load) but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Frame cap with `0` meaning uncapped.
    pub fn preview_fps(&self) -> Option<f32> {
        self.preview.fps.filter(|fps| *fps > 0.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        validate_base_url(&self.service.base_url)?;

        if self.service.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "service.timeout must be greater than zero".into(),
            ));
        }

        for (field, value) in [
            ("preview.width", self.preview.width),
            ("preview.height", self.preview.height),
        ] {
            if value == 0 || value > MAX_PREVIEW_DIMENSION {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be between 1 and {MAX_PREVIEW_DIMENSION}, got {value}"
                )));
            }
        }

        if let Some(fps) = self.preview.fps {
            if !fps.is_finite() || fps < 0.0 {
                return Err(ConfigError::Invalid("preview.fps must be >= 0".into()));
            }
        }

        if self.preview.reload_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "preview.reload_interval must be greater than zero".into(),
            ));
        }

        if self.log.level.trim().is_empty() {
            return Err(ConfigError::Invalid("log.level may not be empty".into()));
        }

        Ok(())
    }
}

/// Checks a service base URL is absolute http(s).
pub fn validate_base_url(url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        Some(host) if !host.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::Invalid(format!(
            "service.base_url '{url}' must be an absolute http:// or https:// URL"
        ))),
    }
}
