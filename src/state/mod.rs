//! State module for crawl outcomes
//!
//! This module holds the value types that flow between the crawl stages.
//!
//! # Components
//!
//! - `FetchOutcome`: content or a classified failure from one fetch
//! - `FailureKind`: why a fetch produced no content
//! - `CrawlMode` / `CrawlResult`: stop policy in, terminal summary out

mod crawl_result;
mod failure_kind;

// Re-export main types
pub use crawl_result::{CrawlMode, CrawlResult};
pub use failure_kind::{FailureKind, FetchOutcome, TransportKind};
