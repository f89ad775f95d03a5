//! Configuration module for revmon
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section except `[output]` falls back to production defaults, so a
//! minimal file only names the database and the sources to watch.
//!
//! # Example
//!
//! ```no_run
//! use revmon::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("revmon.toml")).unwrap();
//! println!("Initial crawls examine {} reviews", config.crawl.initial_cap);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlConfig, FetchConfig, KeywordConfig, OutputConfig, SelectorConfig,
    SnapshotConfig, SourceEntry,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
