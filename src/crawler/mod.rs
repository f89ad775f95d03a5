//! Crawler module for review acquisition
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and a browser render fallback
//! - Challenge detection on rendered pages
//! - Review extraction through selector fallback chains
//! - Content-hash identity and the per-source crawl orchestration

mod browser;
mod captcha;
#[cfg(feature = "browser")]
mod chromium;
mod coordinator;
mod dedupe;
mod fetcher;
mod keywords;
mod parser;

pub use browser::{BrowserTransport, RenderBackend, RenderSession, RenderSettings};
pub use captcha::CaptchaDetector;
#[cfg(feature = "browser")]
pub use chromium::ChromiumBackend;
pub use coordinator::CrawlOrchestrator;
pub use dedupe::{canonicalize_content, hash_candidate, hash_fields, CandidateHash};
pub use fetcher::{build_http_client, FetchStrategy, HttpTransport, PageTransport, RetryPolicy};
pub use keywords::{visible_text, KeywordMatcher};
pub use parser::{ExtractionReport, ItemOutcome, ReviewCandidate, ReviewExtractor, SkipReason};

use crate::config::Config;
use crate::RevmonError;

/// Builds the fetch strategy the configuration asks for
///
/// The render fallback is attached when `[browser] enabled` is set and the
/// crate was built with the `browser` feature.
pub fn build_fetch_strategy(config: &Config) -> Result<FetchStrategy, RevmonError> {
    let http = Box::new(HttpTransport::from_config(&config.fetch)?);

    if !config.browser.enabled {
        tracing::info!("Browser fallback disabled by configuration");
        return Ok(FetchStrategy::http_only(http));
    }

    Ok(FetchStrategy::new(http, browser_fallback(config)))
}

#[cfg(feature = "browser")]
fn browser_fallback(config: &Config) -> Option<Box<dyn PageTransport>> {
    let backend = ChromiumBackend::from_config(&config.browser);
    Some(Box::new(BrowserTransport::from_config(
        Box::new(backend),
        config,
    )))
}

#[cfg(not(feature = "browser"))]
fn browser_fallback(_config: &Config) -> Option<Box<dyn PageTransport>> {
    tracing::warn!("Built without the `browser` feature; no render fallback available");
    None
}
