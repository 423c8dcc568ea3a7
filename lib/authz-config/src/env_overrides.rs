use config::{builder::BuilderState, ConfigBuilder, ConfigError};
use envconfig::Envconfig;
use tracing::debug;

use crate::log::{LogFormat, LogLevel};

#[derive(Envconfig)]
pub struct EnvVarOverrides {
    // Logger overrides
    #[envconfig(from = "AUTHZ_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
    #[envconfig(from = "AUTHZ_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
    #[envconfig(from = "AUTHZ_LOG_FILTER")]
    pub log_filter: Option<String>,

    // Policy overrides
    #[envconfig(from = "AUTHZ_DEFAULT_RULE")]
    pub default_rule: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvVarOverridesError {
    #[error("Failed to override configuration: {0}")]
    FailedToOverrideConfig(#[from] ConfigError),
}

impl EnvVarOverrides {
    pub fn apply_overrides<T: BuilderState>(
        mut self,
        mut config: ConfigBuilder<T>,
    ) -> Result<ConfigBuilder<T>, EnvVarOverridesError> {
        if let Some(log_level) = self.log_level.take() {
            debug!("[config-override] 'log.level' = {:?}", log_level);
            config = config.set_override("log.level", log_level.as_str())?;
        }
        if let Some(log_format) = self.log_format.take() {
            debug!("[config-override] 'log.format' = {:?}", log_format);
            config = config.set_override("log.format", log_format.as_str())?;
        }
        if let Some(log_filter) = self.log_filter.take() {
            debug!("[config-override] 'log.filter' = {:?}", log_filter);
            config = config.set_override("log.filter", log_filter)?;
        }

        if let Some(default_rule) = self.default_rule.take() {
            debug!("[config-override] 'policy.default_rule' = {}", default_rule);
            config = config.set_override("policy.default_rule", default_rule)?;
        }

        Ok(config)
    }
}
