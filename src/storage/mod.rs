//! Storage module for persisting reviews
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Source registration and crawl-attempt tracking
//! - Review persistence keyed by content hash
//! - Statistics for the CLI

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ReviewStore, StorageError, StorageResult};

use crate::crawler::{CandidateHash, ReviewCandidate};
use crate::RevmonError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(RevmonError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, RevmonError> {
    Ok(SqliteStorage::new(path)?)
}

/// Represents a registered source in the database
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: String,
    pub url: String,
    pub created_at: String,
    pub last_crawl_attempt_at: Option<String>,
}

/// Represents a stored review
#[derive(Debug, Clone)]
pub struct ReviewRecord {
    pub id: i64,
    pub source_id: String,
    pub review_hash: String,
    pub content: String,
    pub rating: Option<i32>,
    pub is_receipt: bool,
    pub date_text: Option<String>,
    pub snapshot_path: Option<String>,
    pub collected_at: String,
}

/// A review about to be persisted
#[derive(Debug, Clone, Copy)]
pub struct NewReview<'a> {
    pub source_id: &'a str,
    pub hash: &'a CandidateHash,
    pub candidate: &'a ReviewCandidate,
    pub snapshot_path: Option<&'a str>,
}

/// Result of a persist call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Stored under the given row id
    Inserted(i64),

    /// The hash was already present (possibly written by a concurrent crawl)
    Duplicate,
}
