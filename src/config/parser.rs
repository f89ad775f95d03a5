use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use revmon::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Initial cap: {}", config.crawl.initial_cap);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let mut config: Config = toml::from_str(&content)?;

    // Deployment overrides
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Applies `REVMON_*` environment overrides on top of the parsed file
///
/// | Variable | Field |
/// |----------|-------|
/// | `REVMON_DATABASE_PATH` | `output.database-path` |
/// | `REVMON_SNAPSHOT_DIR` | `snapshot.dir` |
/// | `REVMON_SNAPSHOT_ENABLED` | `snapshot.enabled` |
/// | `REVMON_BROWSER_HEADLESS` | `browser.headless` |
/// | `REVMON_MAX_RETRY` | `fetch.max-retry` |
///
/// `lookup` abstracts the environment so tests don't touch process state.
pub(crate) fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("REVMON_DATABASE_PATH") {
        config.output.database_path = path;
    }
    if let Some(dir) = lookup("REVMON_SNAPSHOT_DIR") {
        config.snapshot.dir = dir;
    }
    if let Some(value) = lookup("REVMON_SNAPSHOT_ENABLED") {
        config.snapshot.enabled = parse_bool("REVMON_SNAPSHOT_ENABLED", &value)?;
    }
    if let Some(value) = lookup("REVMON_BROWSER_HEADLESS") {
        config.browser.headless = parse_bool("REVMON_BROWSER_HEADLESS", &value)?;
    }
    if let Some(value) = lookup("REVMON_MAX_RETRY") {
        config.fetch.max_retry = value.trim().parse().map_err(|_| {
            ConfigError::Validation(format!("REVMON_MAX_RETRY must be an integer, got '{}'", value))
        })?;
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{} must be a boolean, got '{}'",
            key, value
        ))),
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is logged at startup so operators can tell which configuration a run used.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok((Config, String))` - Successfully loaded configuration and its hash
/// * `Err(ConfigError)` - Failed to load or parse the configuration
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
