//! Storage traits and error types
//!
//! This module defines the trait interface the crawl pipeline persists through
//! and the associated error types.

use crate::crawler::CandidateHash;
use crate::storage::{NewReview, PersistOutcome, ReviewRecord, SourceRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for review persistence backends
///
/// Hash uniqueness is the backend's job: `persist` must report a second
/// insert of the same hash as [`PersistOutcome::Duplicate`], not as an error,
/// so concurrent crawls of different sources need no extra locking.
pub trait ReviewStore {
    // ===== Deduplication =====

    /// Returns true if a review with this hash has been recorded
    fn exists_by_hash(&self, hash: &CandidateHash) -> StorageResult<bool>;

    /// Records a new review
    ///
    /// # Returns
    ///
    /// * `Inserted(id)` - The review was stored under `id`
    /// * `Duplicate` - Another review with the same hash already exists
    fn persist(&mut self, review: &NewReview<'_>) -> StorageResult<PersistOutcome>;

    // ===== Source Management =====

    /// Records that a crawl of `source_id` was attempted at `at`
    fn mark_last_crawl_attempt(&mut self, source_id: &str, at: DateTime<Utc>)
        -> StorageResult<()>;

    /// Registers a source, updating its URL if the id already exists
    fn upsert_source(&mut self, source_id: &str, url: &str) -> StorageResult<()>;

    /// Gets a source by id
    fn get_source(&self, source_id: &str) -> StorageResult<Option<SourceRecord>>;

    /// Gets all registered sources, ordered by id
    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>>;

    // ===== Statistics =====

    /// Counts reviews recorded for one source
    fn count_reviews_for_source(&self, source_id: &str) -> StorageResult<u64>;

    /// Counts all recorded reviews
    fn count_total_reviews(&self) -> StorageResult<u64>;

    /// Counts reviews classified as receipt/verified-visit reviews
    fn count_receipt_reviews(&self) -> StorageResult<u64>;

    /// Gets the most recently collected reviews of a source, newest first
    fn recent_reviews(&self, source_id: &str, limit: usize) -> StorageResult<Vec<ReviewRecord>>;
}
