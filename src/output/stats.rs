//! Statistics generation from the review database
//!
//! This module provides functionality for extracting and displaying
//! review statistics from the storage layer.

use crate::storage::{ReviewStore, StorageResult};

/// Per-source summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatistics {
    pub id: String,
    pub url: String,
    pub review_count: u64,

    /// RFC 3339 timestamp of the last crawl attempt, if any
    pub last_crawl_attempt_at: Option<String>,
}

/// Review statistics summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewStatistics {
    /// Total number of reviews recorded across all sources
    pub total_reviews: u64,

    /// Reviews carrying a receipt or visit verification badge
    pub receipt_reviews: u64,

    /// Registered sources, ordered by id
    pub sources: Vec<SourceStatistics>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The storage backend to query
///
/// # Returns
///
/// * `Ok(ReviewStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(store: &dyn ReviewStore) -> StorageResult<ReviewStatistics> {
    let total_reviews = store.count_total_reviews()?;
    let receipt_reviews = store.count_receipt_reviews()?;

    let mut sources = Vec::new();
    for source in store.list_sources()? {
        let review_count = store.count_reviews_for_source(&source.id)?;
        sources.push(SourceStatistics {
            id: source.id,
            url: source.url,
            review_count,
            last_crawl_attempt_at: source.last_crawl_attempt_at,
        });
    }

    Ok(ReviewStatistics {
        total_reviews,
        receipt_reviews,
        sources,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ReviewStatistics) {
    println!("=== Review Statistics ===\n");

    println!("Overview:");
    println!("  Total reviews: {}", stats.total_reviews);
    let receipt_share = if stats.total_reviews > 0 {
        (stats.receipt_reviews as f64 / stats.total_reviews as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "  Receipt-verified: {} ({:.1}%)",
        stats.receipt_reviews, receipt_share
    );
    println!("  Sources: {}", stats.sources.len());
    println!();

    if stats.sources.is_empty() {
        println!("No sources registered.");
        return;
    }

    println!("Sources:");
    for source in &stats.sources {
        println!(
            "  {}: {} reviews, last attempt {}",
            source.id,
            source.review_count,
            source.last_crawl_attempt_at.as_deref().unwrap_or("never")
        );
        println!("    {}", source.url);
    }
}
