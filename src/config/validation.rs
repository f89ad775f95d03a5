use crate::config::types::{
    BrowserConfig, Config, CrawlConfig, FetchConfig, KeywordConfig, OutputConfig, SelectorConfig,
    SourceEntry,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_browser_config(&config.browser)?;
    validate_crawl_config(&config.crawl)?;
    validate_keywords(&config.keywords)?;
    validate_selectors(&config.selectors)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates HTTP transport configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.max_retry < 1 || config.max_retry > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retry must be between 1 and 10, got {}",
            config.max_retry
        )));
    }

    validate_range("pacing", config.pacing_min_ms, config.pacing_max_ms)?;

    if config.user_agents.is_empty() {
        return Err(ConfigError::Validation(
            "user_agents cannot be empty".to_string(),
        ));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain blank entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser fallback configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.navigation_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "navigation_timeout_ms must be > 0".to_string(),
        ));
    }

    validate_range("settle", config.settle_min_ms, config.settle_max_ms)?;

    if let Some(selector) = &config.wait_for_selector {
        parse_selector(selector)?;
    }

    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.initial_cap < 1 {
        return Err(ConfigError::Validation(format!(
            "initial_cap must be >= 1, got {}",
            config.initial_cap
        )));
    }
    Ok(())
}

fn validate_keywords(config: &KeywordConfig) -> Result<(), ConfigError> {
    for (name, list) in [("captcha", &config.captcha), ("receipt", &config.receipt)] {
        if list.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} keyword list cannot be empty",
                name
            )));
        }
        if list.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "{} keyword list cannot contain blank entries",
                name
            )));
        }
    }
    Ok(())
}

/// Validates that every selector chain is non-empty and parses
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (name, chain) in [
        ("list", &config.list),
        ("content", &config.content),
        ("rating", &config.rating),
        ("date", &config.date),
    ] {
        if chain.is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} selector chain cannot be empty",
                name
            )));
        }
        for selector in chain {
            parse_selector(selector)?;
        }
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates source entries: unique ids, unique absolute http(s) URLs
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    let mut seen_urls = HashSet::new();

    for source in sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate source id '{}'",
                source.id
            )));
        }

        let url = Url::parse(&source.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid source URL '{}': {}", source.url, e))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "Source URL '{}' must use http or https",
                source.url
            )));
        }

        // The sources table keys URLs as written
        if !seen_urls.insert(source.url.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Source '{}' repeats the URL '{}'",
                source.id, source.url
            )));
        }
    }

    Ok(())
}

fn validate_range(name: &str, min: u64, max: u64) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{}_min_ms ({}) must not exceed {}_max_ms ({})",
            name, min, name, max
        )));
    }
    Ok(())
}

fn parse_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: e.to_string(),
        })
}
