use crate::error::ConfigError;
use crate::task::MIN_INTERVAL;
use crate::time_unit::parse_interval;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default time the stopping handler waits for a task to go idle.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(5000);

/// Default delay between two quiescence checks while stopping.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Load config from a specific TOML file
pub fn load_toml_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
        .add_source(config::Environment::with_prefix("APP").separator("_"))
        .build()?;
    Ok(config)
}

/// Load config from a specific YAML file
pub fn load_yaml_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
        .add_source(config::Environment::with_prefix("APP").separator("_"))
        .build()?;
    Ok(config)
}

/// Resolve config placeholder like ${app.interval} or ${app.interval:default}
pub fn resolve_config_value(value: &str, config: &Config) -> Result<String, ConfigError> {
    let Some(inner) = value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return Ok(value.to_string());
    };

    match inner.split_once(':') {
        Some((key, default_value)) => match config.get_string(key) {
            Ok(resolved) => Ok(resolved),
            Err(_) => Ok(default_value.to_string()),
        },
        None => Ok(config.get_string(inner)?),
    }
}

/// Resolve a placeholder (if any) and parse the result as an interval.
pub fn resolve_interval(value: &str, config: &Config) -> Result<Duration, ConfigError> {
    let resolved = resolve_config_value(value, config)?;
    parse_interval(&resolved).ok_or(ConfigError::InvalidInterval { value: resolved })
}

/// Scheduler-wide timing settings.
///
/// Read from the `tickwork` table of a config source:
///
/// ```toml
/// [tickwork]
/// grace_period = "5s"
/// poll_interval = "100ms"
/// minimum_interval = "250ms"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// How long the stopping handler waits for a running task before escalating.
    pub grace_period: Duration,
    /// How often the stopping handler checks whether the task went idle.
    pub poll_interval: Duration,
    /// Smallest interval accepted at registration; never below [`MIN_INTERVAL`].
    pub minimum_interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            minimum_interval: MIN_INTERVAL,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    grace_period: Option<String>,
    poll_interval: Option<String>,
    minimum_interval: Option<String>,
}

impl SchedulerSettings {
    /// Read settings from the `tickwork` table, falling back to defaults for
    /// anything missing.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let raw = match config.get::<RawSettings>("tickwork") {
            Ok(raw) => raw,
            Err(config::ConfigError::NotFound(_)) => RawSettings::default(),
            Err(e) => return Err(e.into()),
        };

        let defaults = Self::default();
        let settings = Self {
            grace_period: setting("grace_period", raw.grace_period, defaults.grace_period, config)?,
            poll_interval: setting("poll_interval", raw.poll_interval, defaults.poll_interval, config)?,
            minimum_interval: setting(
                "minimum_interval",
                raw.minimum_interval,
                defaults.minimum_interval,
                config,
            )?,
        };
        settings.validated()
    }

    /// Check the settings for consistency and clamp the minimum interval to
    /// the hard floor.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidSetting {
                key: "poll_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll_interval > self.grace_period {
            return Err(ConfigError::InvalidSetting {
                key: "poll_interval",
                reason: format!(
                    "{:?} exceeds the grace period of {:?}",
                    self.poll_interval, self.grace_period
                ),
            });
        }
        self.minimum_interval = self.minimum_interval.max(MIN_INTERVAL);
        Ok(self)
    }
}

fn setting(
    key: &'static str,
    value: Option<String>,
    default: Duration,
    config: &Config,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => resolve_interval(&value, config).map_err(|_| ConfigError::InvalidSetting {
            key,
            reason: format!("{value:?} is not a duration"),
        }),
    }
}
