//! Crawl mode and the terminal result of one crawl invocation

use std::fmt;

/// Stop policy applied while reconciling candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlMode {
    /// First crawl of a source: capped, duplicates are skipped
    Initial,

    /// Recurring crawl: uncapped, the first duplicate ends reconciliation
    Incremental,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Incremental => "incremental",
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one crawl invocation
///
/// Built once by the orchestrator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlResult {
    success: bool,
    new_count: usize,
    total_examined: usize,
    error: Option<String>,
}

impl CrawlResult {
    /// A crawl whose fetch and extraction succeeded
    pub fn succeeded(new_count: usize, total_examined: usize) -> Self {
        Self {
            success: true,
            new_count,
            total_examined,
            error: None,
        }
    }

    /// A crawl that never got usable markup
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            new_count: 0,
            total_examined: 0,
            error: Some(error.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Number of candidates persisted by this invocation
    pub fn new_count(&self) -> usize {
        self.new_count
    }

    /// Number of candidates produced by extraction
    pub fn total_examined(&self) -> usize {
        self.total_examined
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl fmt::Display for CrawlResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "failed ({})", error),
            None => write!(
                f,
                "ok: {} new of {} examined",
                self.new_count, self.total_examined
            ),
        }
    }
}
