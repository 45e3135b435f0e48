pub mod models;

pub use models::*;

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use garde::Validate;

use crate::error::ConfigError;

/// Load configuration with a 3-tier hierarchy: embedded defaults, then an
/// optional TOML file, then `APP_`-prefixed environment variables
/// (`APP_AUTHZ__URL`, `APP_AUTHZ__FAIL_OPEN`, ...).
pub fn load_config(file: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

    if let Some(file) = file {
        figment = figment.merge(Toml::file(file));
    }

    let config: AppConfig = figment.merge(Env::prefixed("APP_").split("__")).extract()?;

    config
        .validate()
        .map_err(|report| ConfigError::Invalid(report.to_string()))?;

    Ok(config)
}
