//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test the full
//! crawl cycle end-to-end: configuration file, HTTP transport, render
//! fallback, extraction and SQLite persistence.

use async_trait::async_trait;
use revmon::config::{load_config, Config};
use revmon::crawler::{
    BrowserTransport, CrawlOrchestrator, FetchStrategy, HttpTransport, RenderBackend,
    RenderSession,
};
use revmon::output::load_statistics;
use revmon::storage::{ReviewStore, SqliteStorage};
use revmon::{CrawlMode, TransportError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SOURCE: &str = "clinic";

/// Review list markup in the layout of the default selector chains
fn review_page(reviews: &[(&str, i32, &str)]) -> String {
    let items: String = reviews
        .iter()
        .map(|(content, rating, date)| {
            format!(
                r#"<li class="pui__X35jYm">
                    <div class="PXMot"><em>{}</em></div>
                    <span class="zPfVt">{}</span>
                    <span class="BB35N">{}</span>
                </li>"#,
                rating, content, date
            )
        })
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", items)
}

/// Writes a configuration file pointing at `url` and loads it
fn write_config(dir: &TempDir, url: &str, extra: &str) -> Config {
    let db_path = dir.path().join("reviews.db");
    let snapshot_dir = dir.path().join("snapshots");
    let toml = format!(
        r#"
[fetch]
request-timeout-ms = 2000
max-retry = 2
backoff-base-ms = 1
pacing-min-ms = 0
pacing-max-ms = 0

[browser]
enabled = false
settle-min-ms = 0
settle-max-ms = 0

[snapshot]
dir = "{}"

[output]
database-path = "{}"

[[source]]
id = "{}"
url = "{}"

{}
"#,
        snapshot_dir.display(),
        db_path.display(),
        SOURCE,
        url,
        extra
    );

    let config_path = dir.path().join("revmon.toml");
    std::fs::write(&config_path, toml).expect("Failed to write config");
    load_config(&config_path).expect("Failed to load config")
}

fn open_store(config: &Config) -> Arc<Mutex<SqliteStorage>> {
    let mut storage =
        SqliteStorage::new(Path::new(&config.output.database_path)).expect("Failed to open db");
    for source in &config.sources {
        storage
            .upsert_source(&source.id, &source.url)
            .expect("Failed to register source");
    }
    Arc::new(Mutex::new(storage))
}

fn http_only(config: &Config) -> FetchStrategy {
    let http = HttpTransport::from_config(&config.fetch).expect("Failed to build client");
    FetchStrategy::http_only(Box::new(http))
}

/// Render backend that serves fixed markup and counts sessions
struct FakeBrowser {
    html: String,
    status: u16,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

struct FakePage {
    html: String,
    status: u16,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderBackend for FakeBrowser {
    async fn open(&self, _user_agent: &str) -> Result<Box<dyn RenderSession>, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            html: self.html.clone(),
            status: self.status,
            closed: Arc::clone(&self.closed),
        }))
    }
}

#[async_trait]
impl RenderSession for FakePage {
    async fn navigate(
        &mut self,
        _url: &str,
        _timeout: Duration,
    ) -> Result<Option<u16>, TransportError> {
        Ok(Some(self.status))
    }

    async fn wait_for_selector(
        &mut self,
        _selector: &str,
        _timeout: Duration,
    ) -> Result<bool, TransportError> {
        Ok(true)
    }

    async fn content(&mut self) -> Result<String, TransportError> {
        Ok(self.html.clone())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), TransportError> {
        std::fs::write(path, b"png")?;
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Strategy whose render fallback is a [`FakeBrowser`] answering with `status`
fn with_fake_browser(
    config: &Config,
    html: String,
    status: u16,
) -> (FetchStrategy, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let backend = FakeBrowser {
        html,
        status,
        opened: Arc::clone(&opened),
        closed: Arc::clone(&closed),
    };

    let http = HttpTransport::from_config(&config.fetch).expect("Failed to build client");
    let browser = BrowserTransport::from_config(Box::new(backend), config);
    let strategy = FetchStrategy::new(Box::new(http), Some(Box::new(browser)));
    (strategy, opened, closed)
}

#[tokio::test]
async fn test_initial_then_incremental_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/place/reviews", server.uri());
    let config = write_config(&dir, &url, "");

    Mock::given(method("GET"))
        .and(path("/place/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_string(review_page(&[
            ("Kind doctor", 5, "1.10.수"),
            ("Long wait", 2, "1.08.월"),
            ("Clean rooms", 4, "1.05.금"),
        ])))
        .mount(&server)
        .await;

    let store = open_store(&config);
    let orchestrator =
        CrawlOrchestrator::from_config(&config, http_only(&config), Arc::clone(&store)).unwrap();

    // First run: nothing stored yet
    let mode = orchestrator.default_mode(SOURCE).unwrap();
    assert_eq!(mode, CrawlMode::Initial);

    let result = orchestrator.crawl(SOURCE, &url, mode).await;
    assert!(result.success(), "first crawl failed: {:?}", result.error());
    assert_eq!(result.new_count(), 3);
    assert_eq!(result.total_examined(), 3);

    // Two new reviews appear above the known ones
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/place/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_string(review_page(&[
            ("Friendly nurse", 5, "1.12.금"),
            ("Parking is hard", 3, "1.11.목"),
            ("Kind doctor", 5, "1.10.수"),
            ("Long wait", 2, "1.08.월"),
            ("Clean rooms", 4, "1.05.금"),
        ])))
        .mount(&server)
        .await;

    let mode = orchestrator.default_mode(SOURCE).unwrap();
    assert_eq!(mode, CrawlMode::Incremental);

    let result = orchestrator.crawl(SOURCE, &url, mode).await;
    assert!(result.success());
    assert_eq!(result.new_count(), 2);
    assert_eq!(result.total_examined(), 5);

    let storage = store.lock().unwrap();
    let stats = load_statistics(&*storage).unwrap();
    assert_eq!(stats.total_reviews, 5);
    assert_eq!(stats.sources.len(), 1);
    assert!(stats.sources[0].last_crawl_attempt_at.is_some());

    let recent = storage.recent_reviews(SOURCE, 10).unwrap();
    assert!(recent.iter().any(|r| r.content == "Friendly nurse" && r.rating == Some(5)));
}

#[tokio::test]
async fn test_initial_crawl_respects_cap() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/reviews", server.uri());
    let config = write_config(&dir, &url, "[crawl]\ninitial-cap = 10\n");

    let contents: Vec<String> = (1..=15).map(|i| format!("Visit number {}", i)).collect();
    let reviews: Vec<(&str, i32, &str)> = contents
        .iter()
        .map(|c| (c.as_str(), 5, "1.01.월"))
        .collect();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(review_page(&reviews)))
        .mount(&server)
        .await;

    let store = open_store(&config);
    let orchestrator =
        CrawlOrchestrator::from_config(&config, http_only(&config), Arc::clone(&store)).unwrap();

    let result = orchestrator.crawl(SOURCE, &url, CrawlMode::Initial).await;
    assert_eq!(result.total_examined(), 10);
    assert_eq!(result.new_count(), 10);
    assert_eq!(store.lock().unwrap().count_total_reviews().unwrap(), 10);
}

#[tokio::test]
async fn test_server_errors_fall_back_to_render_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/reviews", server.uri());
    let config = write_config(&dir, &url, "");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let rendered = review_page(&[("Rendered review", 4, "2.01.목"), ("Another", 3, "1.30.화")]);
    let (fetcher, opened, closed) = with_fake_browser(&config, rendered, 200);

    let store = open_store(&config);
    let orchestrator = CrawlOrchestrator::from_config(&config, fetcher, store).unwrap();

    let result = orchestrator.crawl(SOURCE, &url, CrawlMode::Initial).await;

    assert!(result.success(), "crawl failed: {:?}", result.error());
    assert_eq!(result.new_count(), 2);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_challenge_page_fails_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/reviews", server.uri());
    let config = write_config(&dir, &url, "");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let challenge =
        "<html><body><h2>Please verify you are human</h2><div class='captcha'>CAPTCHA</div></body></html>"
            .to_string();
    let (fetcher, opened, closed) = with_fake_browser(&config, challenge, 200);

    let store = open_store(&config);
    let orchestrator = CrawlOrchestrator::from_config(&config, fetcher, Arc::clone(&store)).unwrap();

    let result = orchestrator.crawl(SOURCE, &url, CrawlMode::Incremental).await;

    assert!(!result.success());
    assert_eq!(result.new_count(), 0);
    assert_eq!(result.total_examined(), 0);
    assert!(
        result.error().unwrap().starts_with("challenge_detected"),
        "unexpected error: {:?}",
        result.error()
    );
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    let storage = store.lock().unwrap();
    assert_eq!(storage.count_total_reviews().unwrap(), 0);
    let source = storage.get_source(SOURCE).unwrap().unwrap();
    assert!(source.last_crawl_attempt_at.is_some());
}

#[tokio::test]
async fn test_server_errors_then_challenge_reports_browser_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/reviews", server.uri());
    let config = write_config(&dir, &url, "");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let challenge =
        "<html><body><p>자동 입력 방지를 위해 보안문자를 입력해주세요</p></body></html>".to_string();
    let (fetcher, opened, closed) = with_fake_browser(&config, challenge, 200);

    let store = open_store(&config);
    let orchestrator = CrawlOrchestrator::from_config(&config, fetcher, Arc::clone(&store)).unwrap();

    let result = orchestrator.crawl(SOURCE, &url, CrawlMode::Initial).await;

    assert!(!result.success());
    assert_eq!(result.new_count(), 0);
    assert!(
        result.error().unwrap().starts_with("challenge_detected"),
        "unexpected error: {:?}",
        result.error()
    );
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(store.lock().unwrap().count_total_reviews().unwrap(), 0);
}

#[tokio::test]
async fn test_rendered_error_page_fails_crawl() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/reviews", server.uri());
    let config = write_config(&dir, &url, "");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let error_page = "<html><body><h1>Not Found</h1></body></html>".to_string();
    let (fetcher, opened, _closed) = with_fake_browser(&config, error_page, 404);

    let store = open_store(&config);
    let orchestrator = CrawlOrchestrator::from_config(&config, fetcher, store).unwrap();

    let result = orchestrator.crawl(SOURCE, &url, CrawlMode::Incremental).await;

    assert!(!result.success());
    assert_eq!(result.error(), Some("non_retryable_status: HTTP 404"));
    assert_eq!(opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_not_found_without_fallback() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/gone", server.uri());
    let config = write_config(&dir, &url, "");

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = open_store(&config);
    let orchestrator = CrawlOrchestrator::from_config(&config, http_only(&config), store).unwrap();

    let result = orchestrator.crawl(SOURCE, &url, CrawlMode::Initial).await;

    assert!(!result.success());
    assert_eq!(result.error(), Some("non_retryable_status: HTTP 404"));
}

#[tokio::test]
async fn test_snapshots_written_for_new_reviews() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let url = format!("{}/reviews", server.uri());
    let config = write_config(&dir, &url, "");

    // Enable snapshots on top of the file
    let mut config = config;
    config.snapshot.enabled = true;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(review_page(&[
            ("First", 5, "3.01.금"),
            ("Second", 4, "2.28.목"),
        ])))
        .mount(&server)
        .await;

    let store = open_store(&config);
    let orchestrator =
        CrawlOrchestrator::from_config(&config, http_only(&config), Arc::clone(&store)).unwrap();

    let result = orchestrator.crawl(SOURCE, &url, CrawlMode::Initial).await;
    assert_eq!(result.new_count(), 2);

    let snapshot_dir = Path::new(&config.snapshot.dir);
    let files: Vec<_> = std::fs::read_dir(snapshot_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(files.len(), 2);
    assert!(files
        .iter()
        .all(|name| name.starts_with("review_") && name.ends_with(".html")));

    let storage = store.lock().unwrap();
    let reviews = storage.recent_reviews(SOURCE, 10).unwrap();
    assert!(reviews.iter().all(|r| r.snapshot_path.is_some()));
}
