//! Output module for crawl reports
//!
//! This module handles:
//! - Summarizing the results of one CLI run
//! - Loading and printing review statistics

pub mod stats;

pub use stats::{load_statistics, print_statistics, ReviewStatistics, SourceStatistics};

use crate::state::CrawlResult;

/// Outcome of one source in a CLI run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source_id: String,
    pub result: CrawlResult,
}

impl RunReport {
    pub fn new(source_id: impl Into<String>, result: CrawlResult) -> Self {
        Self {
            source_id: source_id.into(),
            result,
        }
    }
}

/// Totals over a set of run reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub succeeded: usize,
    pub failed: usize,
    pub new_reviews: usize,
    pub examined: usize,
}

impl RunTotals {
    pub fn from_reports(reports: &[RunReport]) -> Self {
        reports.iter().fold(Self::default(), |mut totals, report| {
            if report.result.success() {
                totals.succeeded += 1;
            } else {
                totals.failed += 1;
            }
            totals.new_reviews += report.result.new_count();
            totals.examined += report.result.total_examined();
            totals
        })
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Prints one line per source followed by the totals
pub fn print_run_summary(reports: &[RunReport]) {
    println!("=== Crawl Summary ===\n");

    for report in reports {
        println!("  {}: {}", report.source_id, report.result);
    }

    let totals = RunTotals::from_reports(reports);
    println!();
    println!(
        "{} succeeded, {} failed, {} new reviews from {} examined",
        totals.succeeded, totals.failed, totals.new_reviews, totals.examined
    );
}
