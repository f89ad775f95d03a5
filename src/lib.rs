//! revmon: review acquisition and deduplication
//!
//! This crate fetches third-party review pages for registered sources,
//! extracts review candidates and records the ones that are new, using
//! content-hash deduplication with separate stop policies for first-time and
//! recurring crawls.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for revmon operations
#[derive(Debug, Error)]
pub enum RevmonError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// Errors raised by a single transport operation
///
/// These never escape a fetch: the fetch layer folds them into a
/// [`state::FetchOutcome`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("browser error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CandidateHash, CrawlOrchestrator, ReviewCandidate};
pub use state::{CrawlMode, CrawlResult, FailureKind, FetchOutcome, TransportKind};
