//! TOML loading and validation for [`SiteConfig`].

use std::fs;
use std::path::Path;

use contracts::SiteConfig;

use crate::error::ConfigError;
use crate::profile;

/// Environment variable naming a TOML config file for the CLI.
pub const CONFIG_ENV_VAR: &str = "SITE_SIM_CONFIG";

pub fn load_config(path: impl AsRef<Path>) -> Result<SiteConfig, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|err| ConfigError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let config = from_toml_str(&raw)?;
    tracing::debug!(path = %path.display(), run_id = %config.run_id, "loaded site config");
    Ok(config)
}

/// Parse a config document. Missing keys fall back to [`SiteConfig::default`].
pub fn from_toml_str(raw: &str) -> Result<SiteConfig, ConfigError> {
    let defaults = toml::Value::try_from(SiteConfig::default())
        .map_err(|err| ConfigError::Parse(err.to_string()))?;
    let overrides: toml::Value =
        toml::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
    let merged = merge_tables(defaults, overrides);
    let config: SiteConfig = merged
        .try_into()
        .map_err(|err: toml::de::Error| ConfigError::Parse(err.to_string()))?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &SiteConfig) -> Result<(), ConfigError> {
    if !(config.tick_hz.is_finite() && config.tick_hz > 0.0) {
        return Err(ConfigError::Invalid(format!(
            "tick_hz must be positive, got {}",
            config.tick_hz
        )));
    }
    if config.day_cycle_ticks == 0 {
        return Err(ConfigError::Invalid(
            "day_cycle_ticks must be positive".to_string(),
        ));
    }
    if config.machine_types.is_empty() {
        return Err(ConfigError::Invalid(
            "machine_types must name at least one type".to_string(),
        ));
    }
    for machine_type in &config.machine_types {
        if profile::lookup(machine_type).is_none() {
            tracing::warn!(
                machine_type = %machine_type,
                fallback = profile::FALLBACK_MACHINE_TYPE,
                "unknown machine type in config"
            );
        }
    }
    Ok(())
}

fn merge_tables(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_tables(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            toml::Value::Table(base)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use contracts::Weather;

    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let config = from_toml_str(
            r#"
            seed = 99
            worker_count = 4
            initial_weather = "Rain"

            [worker_assignments]
            W1 = "CONST-002"
            "#,
        )
        .expect("config");
        assert_eq!(config.seed, 99);
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.machine_count, SiteConfig::default().machine_count);
        assert_eq!(config.initial_weather, Weather::Rain);
        assert_eq!(config.worker_assignments["W1"], "CONST-002");
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(from_toml_str("").expect("config"), SiteConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            from_toml_str("tick_hz = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            from_toml_str("day_cycle_ticks = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            from_toml_str("machine_types = []"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        assert!(matches!(
            from_toml_str("seed = "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config("/nonexistent/site.toml").expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/site.toml"));
    }
}
