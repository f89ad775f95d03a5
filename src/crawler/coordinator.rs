//! Crawl orchestration for a single source
//!
//! One crawl runs four phases in order:
//! - FETCH: get the review page through the fetch strategy
//! - EXTRACT: turn markup into ordered review candidates
//! - RECONCILE: hash each candidate and record the new ones, newest first
//! - FINALIZE: record the attempt and report a [`CrawlResult`]
//!
//! Nothing here returns an error to the caller. Fetch failures end the crawl
//! with an unsuccessful result, per-item storage failures skip the item.

use crate::config::Config;
use crate::crawler::dedupe::{hash_candidate, CandidateHash};
use crate::crawler::fetcher::FetchStrategy;
use crate::crawler::parser::{ReviewCandidate, ReviewExtractor};
use crate::state::{CrawlMode, CrawlResult, FetchOutcome};
use crate::storage::{NewReview, PersistOutcome, ReviewStore, StorageError, StorageResult};
use crate::ConfigError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Hex characters of the review hash used in snapshot file names
const SNAPSHOT_HASH_PREFIX: usize = 16;

/// What reconciling one candidate came to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemDecision {
    /// Recorded as a new review
    Recorded,

    /// Already known, either before the check or by a concurrent writer
    Known,

    /// Storage failed for this item
    Failed,
}

/// Runs crawls for registered sources against a shared review store
pub struct CrawlOrchestrator<S: ReviewStore> {
    fetcher: FetchStrategy,
    extractor: ReviewExtractor,
    store: Arc<Mutex<S>>,
    initial_cap: usize,
    snapshot_dir: Option<PathBuf>,
}

impl<S: ReviewStore> CrawlOrchestrator<S> {
    /// Creates an orchestrator without snapshots
    ///
    /// # Arguments
    ///
    /// * `fetcher` - How pages are fetched
    /// * `extractor` - How candidates are read from markup
    /// * `store` - Where reviews are recorded
    /// * `initial_cap` - How many list elements an initial crawl examines
    pub fn new(
        fetcher: FetchStrategy,
        extractor: ReviewExtractor,
        store: Arc<Mutex<S>>,
        initial_cap: usize,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            initial_cap,
            snapshot_dir: None,
        }
    }

    /// Creates an orchestrator from the configuration
    ///
    /// Fails only if a configured selector does not parse, which validation
    /// normally catches earlier.
    pub fn from_config(
        config: &Config,
        fetcher: FetchStrategy,
        store: Arc<Mutex<S>>,
    ) -> Result<Self, ConfigError> {
        let extractor = ReviewExtractor::new(&config.selectors, &config.keywords)?;
        let orchestrator = Self::new(fetcher, extractor, store, config.crawl.initial_cap);

        Ok(if config.snapshot.enabled {
            orchestrator.with_snapshot_dir(&config.snapshot.dir)
        } else {
            orchestrator
        })
    }

    /// Writes each new review's raw markup into `dir` before recording it
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    /// Picks the mode for a source with no explicit choice
    ///
    /// A source with no recorded reviews gets a capped initial crawl.
    pub fn default_mode(&self, source_id: &str) -> StorageResult<CrawlMode> {
        let count = self.with_store(|store| store.count_reviews_for_source(source_id))?;
        Ok(if count == 0 {
            CrawlMode::Initial
        } else {
            CrawlMode::Incremental
        })
    }

    /// Crawls one source
    ///
    /// # Stop Policy
    ///
    /// Candidates are reconciled in page order, which is assumed newest
    /// first:
    /// - `Initial`: known reviews are skipped, the rest recorded
    /// - `Incremental`: the first known review ends the crawl
    pub async fn crawl(&self, source_id: &str, url: &str, mode: CrawlMode) -> CrawlResult {
        tracing::info!("Crawling {} ({}) in {} mode", source_id, url, mode);

        // FETCH
        let html = match self.fetcher.fetch(url).await {
            FetchOutcome::Content { html, transport } => {
                tracing::info!("Fetched {} via {} ({} bytes)", url, transport, html.len());
                html
            }
            FetchOutcome::Failure { kind, detail } => {
                tracing::error!("Fetch failed for {}: {} ({})", source_id, kind, detail);
                self.mark_attempt(source_id);
                return CrawlResult::failed(format!("{}: {}", kind, detail));
            }
        };

        // EXTRACT
        let cap = match mode {
            CrawlMode::Initial => Some(self.initial_cap),
            CrawlMode::Incremental => None,
        };
        let candidates = self.extractor.extract(&html, cap);
        drop(html);

        if candidates.is_empty() {
            tracing::info!("No review candidates found for {}", source_id);
        }

        // RECONCILE
        let mut new_count = 0;
        for (position, candidate) in candidates.iter().enumerate() {
            let hash = hash_candidate(candidate);

            match self.reconcile(source_id, candidate, &hash).await {
                ItemDecision::Recorded => new_count += 1,
                ItemDecision::Known => match mode {
                    CrawlMode::Initial => {
                        tracing::debug!("Skipping known review {:?}", hash);
                    }
                    CrawlMode::Incremental => {
                        tracing::info!(
                            "Reached known review at position {} for {}, stopping",
                            position + 1,
                            source_id
                        );
                        break;
                    }
                },
                ItemDecision::Failed => {}
            }
        }

        // FINALIZE
        self.mark_attempt(source_id);

        let result = CrawlResult::succeeded(new_count, candidates.len());
        tracing::info!("Crawl of {} finished: {}", source_id, result);
        result
    }

    async fn reconcile(
        &self,
        source_id: &str,
        candidate: &ReviewCandidate,
        hash: &CandidateHash,
    ) -> ItemDecision {
        match self.with_store(|store| store.exists_by_hash(hash)) {
            Ok(true) => return ItemDecision::Known,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Existence check failed for {:?}: {}", hash, e);
                return ItemDecision::Failed;
            }
        }

        let snapshot_path = match &self.snapshot_dir {
            Some(dir) => write_snapshot(dir, candidate, hash).await,
            None => None,
        };

        let review = NewReview {
            source_id,
            hash,
            candidate,
            snapshot_path: snapshot_path.as_deref(),
        };

        match self.with_store(|store| store.persist(&review)) {
            Ok(PersistOutcome::Inserted(id)) => {
                tracing::debug!("Recorded review {:?} as #{}", hash, id);
                ItemDecision::Recorded
            }
            Ok(PersistOutcome::Duplicate) => {
                tracing::debug!("Review {:?} was recorded concurrently", hash);
                ItemDecision::Known
            }
            Err(e) => {
                tracing::warn!("Failed to record review {:?}: {}", hash, e);
                ItemDecision::Failed
            }
        }
    }

    fn mark_attempt(&self, source_id: &str) {
        if let Err(e) = self.with_store(|store| store.mark_last_crawl_attempt(source_id, Utc::now()))
        {
            tracing::warn!("Failed to record crawl attempt for {}: {}", source_id, e);
        }
    }

    /// Runs `op` with the store locked; the lock is released on return
    fn with_store<T>(&self, op: impl FnOnce(&mut S) -> StorageResult<T>) -> StorageResult<T> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| StorageError::Database("review store lock poisoned".to_string()))?;
        op(&mut *store)
    }
}

/// Writes `review_<hash prefix>.html`; returns the path on success
async fn write_snapshot(
    dir: &Path,
    candidate: &ReviewCandidate,
    hash: &CandidateHash,
) -> Option<String> {
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        tracing::warn!("Cannot create snapshot directory {}: {}", dir.display(), e);
        return None;
    }

    let path = dir.join(format!("review_{}.html", hash.hex_prefix(SNAPSHOT_HASH_PREFIX)));
    match tokio::fs::write(&path, candidate.raw_markup()).await {
        Ok(()) => Some(path.to_string_lossy().into_owned()),
        Err(e) => {
            tracing::warn!("Failed to write snapshot {}: {}", path.display(), e);
            None
        }
    }
}
