//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ReviewStore trait.

use crate::crawler::CandidateHash;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ReviewStore, StorageResult};
use crate::storage::{NewReview, PersistOutcome, ReviewRecord, SourceRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        // WAL lets concurrent crawl workers read while one writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn map_source(row: &rusqlite::Row<'_>) -> rusqlite::Result<SourceRecord> {
        Ok(SourceRecord {
            id: row.get(0)?,
            url: row.get(1)?,
            created_at: row.get(2)?,
            last_crawl_attempt_at: row.get(3)?,
        })
    }
}

impl ReviewStore for SqliteStorage {
    // ===== Deduplication =====

    fn exists_by_hash(&self, hash: &CandidateHash) -> StorageResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE review_hash = ?1)",
            params![hash.to_hex()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn persist(&mut self, review: &NewReview<'_>) -> StorageResult<PersistOutcome> {
        let now = Utc::now().to_rfc3339();
        let candidate = review.candidate;

        // The UNIQUE constraint on review_hash arbitrates racing writers
        let inserted = self.conn.execute(
            "INSERT INTO reviews
                (source_id, review_hash, content, rating, is_receipt, date_text, snapshot_path, collected_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(review_hash) DO NOTHING",
            params![
                review.source_id,
                review.hash.to_hex(),
                candidate.content(),
                candidate.rating(),
                candidate.is_receipt(),
                candidate.date_text(),
                review.snapshot_path,
                now,
            ],
        )?;

        if inserted == 0 {
            return Ok(PersistOutcome::Duplicate);
        }

        Ok(PersistOutcome::Inserted(self.conn.last_insert_rowid()))
    }

    // ===== Source Management =====

    fn mark_last_crawl_attempt(
        &mut self,
        source_id: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE sources SET last_crawl_attempt_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), source_id],
        )?;

        if updated == 0 {
            return Err(crate::storage::StorageError::SourceNotFound(
                source_id.to_string(),
            ));
        }

        Ok(())
    }

    fn upsert_source(&mut self, source_id: &str, url: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sources (id, url, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET url = excluded.url",
            params![source_id, url, now],
        )?;
        Ok(())
    }

    fn get_source(&self, source_id: &str) -> StorageResult<Option<SourceRecord>> {
        let source = self
            .conn
            .query_row(
                "SELECT id, url, created_at, last_crawl_attempt_at FROM sources WHERE id = ?1",
                params![source_id],
                Self::map_source,
            )
            .optional()?;
        Ok(source)
    }

    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, created_at, last_crawl_attempt_at FROM sources ORDER BY id",
        )?;
        let rows = stmt.query_map([], Self::map_source)?;

        let mut sources = Vec::new();
        for row in rows {
            sources.push(row?);
        }

        Ok(sources)
    }

    // ===== Statistics =====

    fn count_reviews_for_source(&self, source_id: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_reviews(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reviews", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_receipt_reviews(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE is_receipt = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn recent_reviews(&self, source_id: &str, limit: usize) -> StorageResult<Vec<ReviewRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, review_hash, content, rating, is_receipt, date_text,
                    snapshot_path, collected_at
             FROM reviews WHERE source_id = ?1
             ORDER BY collected_at DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![source_id, limit as i64], |row| {
            Ok(ReviewRecord {
                id: row.get(0)?,
                source_id: row.get(1)?,
                review_hash: row.get(2)?,
                content: row.get(3)?,
                rating: row.get(4)?,
                is_receipt: row.get(5)?,
                date_text: row.get(6)?,
                snapshot_path: row.get(7)?,
                collected_at: row.get(8)?,
            })
        })?;

        let mut reviews = Vec::new();
        for row in rows {
            reviews.push(row?);
        }

        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{hash_candidate, ReviewCandidate};

    fn candidate(content: &str, rating: Option<i32>) -> ReviewCandidate {
        ReviewCandidate::new(
            content.to_string(),
            rating,
            Some("2024-01-01".to_string()),
            false,
            format!("<li>{}</li>", content),
        )
    }

    fn storage_with_source() -> SqliteStorage {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_source("clinic-1", "https://example.com/reviews")
            .unwrap();
        storage
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_persist_and_exists() {
        let mut storage = storage_with_source();
        let review = candidate("Friendly staff", Some(5));
        let hash = hash_candidate(&review);

        assert!(!storage.exists_by_hash(&hash).unwrap());

        let outcome = storage
            .persist(&NewReview {
                source_id: "clinic-1",
                hash: &hash,
                candidate: &review,
                snapshot_path: None,
            })
            .unwrap();

        assert!(matches!(outcome, PersistOutcome::Inserted(id) if id > 0));
        assert!(storage.exists_by_hash(&hash).unwrap());
        assert_eq!(storage.count_reviews_for_source("clinic-1").unwrap(), 1);
    }

    #[test]
    fn test_persist_duplicate_hash_is_not_an_error() {
        let mut storage = storage_with_source();
        let review = candidate("Long wait", Some(2));
        let hash = hash_candidate(&review);
        let new_review = NewReview {
            source_id: "clinic-1",
            hash: &hash,
            candidate: &review,
            snapshot_path: None,
        };

        storage.persist(&new_review).unwrap();
        let second = storage.persist(&new_review).unwrap();

        assert_eq!(second, PersistOutcome::Duplicate);
        assert_eq!(storage.count_total_reviews().unwrap(), 1);
    }

    #[test]
    fn test_persist_stores_fields() {
        let mut storage = storage_with_source();
        let review = ReviewCandidate::new(
            "Receipt verified visit".to_string(),
            None,
            None,
            true,
            "<li>raw</li>".to_string(),
        );
        let hash = hash_candidate(&review);

        storage
            .persist(&NewReview {
                source_id: "clinic-1",
                hash: &hash,
                candidate: &review,
                snapshot_path: Some("/tmp/review_abc.html"),
            })
            .unwrap();

        let stored = storage.recent_reviews("clinic-1", 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "Receipt verified visit");
        assert_eq!(stored[0].rating, None);
        assert!(stored[0].is_receipt);
        assert_eq!(stored[0].review_hash, hash.to_hex());
        assert_eq!(stored[0].snapshot_path.as_deref(), Some("/tmp/review_abc.html"));
        assert_eq!(storage.count_receipt_reviews().unwrap(), 1);
    }

    #[test]
    fn test_upsert_source_updates_url() {
        let mut storage = storage_with_source();
        storage
            .upsert_source("clinic-1", "https://example.com/new-reviews")
            .unwrap();

        let sources = storage.list_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "https://example.com/new-reviews");
    }

    #[test]
    fn test_mark_last_crawl_attempt() {
        let mut storage = storage_with_source();
        assert!(storage
            .get_source("clinic-1")
            .unwrap()
            .unwrap()
            .last_crawl_attempt_at
            .is_none());

        storage
            .mark_last_crawl_attempt("clinic-1", Utc::now())
            .unwrap();

        let source = storage.get_source("clinic-1").unwrap().unwrap();
        assert!(source.last_crawl_attempt_at.is_some());
    }

    #[test]
    fn test_mark_unknown_source_fails() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.mark_last_crawl_attempt("missing", Utc::now());
        assert!(matches!(
            result,
            Err(crate::storage::StorageError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_get_missing_source() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(storage.get_source("nope").unwrap().is_none());
    }
}
