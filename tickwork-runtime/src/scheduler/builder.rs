use super::scheduler::BackgroundScheduler;
use crate::config::{load_toml_config, load_yaml_config, SchedulerSettings};
use crate::error::ConfigError;
use crate::lifecycle::{OnStarted, OnStopping};
use crate::scope::ScopeFactory;
use config::Config;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Builder for the scheduler
pub struct SchedulerBuilder<F, L> {
    lifetime: L,
    scope_factory: F,
    config: Arc<Config>,
    settings: Option<SchedulerSettings>,
}

impl<F, L> SchedulerBuilder<F, L>
where
    F: ScopeFactory,
    L: OnStarted + OnStopping,
{
    /// Create a new scheduler builder with default config (empty)
    pub fn new(lifetime: L, scope_factory: F) -> Self {
        Self {
            lifetime,
            scope_factory,
            config: Arc::new(Config::default()),
            settings: None,
        }
    }

    /// Use settings from a TOML file (plus `APP_` environment overrides).
    pub fn with_toml<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let config = load_toml_config(path)?;
        Ok(self.with_config(config))
    }

    /// Use settings from a YAML file (plus `APP_` environment overrides).
    pub fn with_yaml<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let config = load_yaml_config(path)?;
        Ok(self.with_config(config))
    }

    /// Use a config the host already loaded.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Explicit settings; take precedence over the `tickwork` config table.
    pub fn with_settings(mut self, settings: SchedulerSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Build the scheduler. Nothing runs until tasks are registered and the
    /// host signals "started".
    pub fn build(self) -> Result<BackgroundScheduler<F, L>, ConfigError> {
        let settings = match self.settings {
            Some(settings) => settings.validated()?,
            None => SchedulerSettings::from_config(&self.config)?,
        };

        info!(
            grace_period = ?settings.grace_period,
            poll_interval = ?settings.poll_interval,
            minimum_interval = ?settings.minimum_interval,
            "Building background scheduler"
        );

        Ok(BackgroundScheduler::from_parts(
            self.lifetime,
            self.scope_factory,
            settings,
            self.config,
        ))
    }
}
