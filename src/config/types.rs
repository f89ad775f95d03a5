use serde::Deserialize;

/// Main configuration structure for revmon
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub keywords: KeywordConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Lightweight HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms", default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Maximum attempts on the HTTP transport before falling back
    #[serde(rename = "max-retry", default = "default_max_retry")]
    pub max_retry: u32,

    /// Base backoff interval (milliseconds)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Lower bound of the randomized delay before each attempt (milliseconds)
    #[serde(rename = "pacing-min-ms", default = "default_pacing_min_ms")]
    pub pacing_min_ms: u64,

    /// Upper bound of the randomized delay before each attempt (milliseconds)
    #[serde(rename = "pacing-max-ms", default = "default_pacing_max_ms")]
    pub pacing_max_ms: u64,

    /// User agents picked at random per attempt
    #[serde(rename = "user-agents", default = "default_user_agents")]
    pub user_agents: Vec<String>,

    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_retry: default_max_retry(),
            backoff_base_ms: default_backoff_base_ms(),
            pacing_min_ms: default_pacing_min_ms(),
            pacing_max_ms: default_pacing_max_ms(),
            user_agents: default_user_agents(),
            accept_language: default_accept_language(),
        }
    }
}

/// Browser render fallback configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Whether the render fallback is used at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Timeout for the initial render (milliseconds)
    #[serde(
        rename = "navigation-timeout-ms",
        default = "default_request_timeout_ms"
    )]
    pub navigation_timeout_ms: u64,

    /// Content selector to wait for after the initial render
    #[serde(rename = "wait-for-selector", default)]
    pub wait_for_selector: Option<String>,

    /// How long to wait for `wait_for_selector` before continuing anyway
    #[serde(
        rename = "selector-timeout-ms",
        default = "default_selector_timeout_ms"
    )]
    pub selector_timeout_ms: u64,

    #[serde(rename = "settle-min-ms", default = "default_settle_min_ms")]
    pub settle_min_ms: u64,

    #[serde(rename = "settle-max-ms", default = "default_settle_max_ms")]
    pub settle_max_ms: u64,

    /// URL patterns the browser refuses to load (images, fonts, styles)
    #[serde(
        rename = "blocked-resources",
        default = "default_blocked_resources"
    )]
    pub blocked_resources: Vec<String>,

    /// Save a screenshot into the snapshot directory when a challenge is detected
    #[serde(rename = "screenshot-on-challenge", default)]
    pub screenshot_on_challenge: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            navigation_timeout_ms: default_request_timeout_ms(),
            wait_for_selector: None,
            selector_timeout_ms: default_selector_timeout_ms(),
            settle_min_ms: default_settle_min_ms(),
            settle_max_ms: default_settle_max_ms(),
            blocked_resources: default_blocked_resources(),
            screenshot_on_challenge: false,
        }
    }
}

/// Crawl policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Number of list elements examined on a source's first crawl
    #[serde(rename = "initial-cap", default = "default_initial_cap")]
    pub initial_cap: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            initial_cap: default_initial_cap(),
        }
    }
}

/// Diagnostic snapshot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_snapshot_dir")]
    pub dir: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: default_snapshot_dir(),
        }
    }
}

/// Keyword lists for the markup classifiers
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordConfig {
    #[serde(default = "default_captcha_keywords")]
    pub captcha: Vec<String>,

    #[serde(default = "default_receipt_keywords")]
    pub receipt: Vec<String>,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            captcha: default_captcha_keywords(),
            receipt: default_receipt_keywords(),
        }
    }
}

/// Ordered CSS selector chains for review extraction
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Review list item patterns, in priority order
    #[serde(default = "default_list_selectors")]
    pub list: Vec<String>,

    #[serde(default = "default_content_selectors")]
    pub content: Vec<String>,

    #[serde(default = "default_rating_selectors")]
    pub rating: Vec<String>,

    #[serde(default = "default_date_selectors")]
    pub date: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            list: default_list_selectors(),
            content: default_content_selectors(),
            rating: default_rating_selectors(),
            date: default_date_selectors(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A registered review source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Stable identifier used as the persistence key
    pub id: String,

    /// Review page URL
    pub url: String,
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_max_retry() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_pacing_min_ms() -> u64 {
    300
}

fn default_pacing_max_ms() -> u64 {
    900
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36".to_string(),
    ]
}

fn default_accept_language() -> String {
    "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7".to_string()
}

fn default_selector_timeout_ms() -> u64 {
    5_000
}

fn default_settle_min_ms() -> u64 {
    500
}

fn default_settle_max_ms() -> u64 {
    1_000
}

fn default_blocked_resources() -> Vec<String> {
    [
        "*.png", "*.jpg", "*.jpeg", "*.gif", "*.svg", "*.webp", "*.css", "*.woff", "*.woff2",
        "*.ttf", "*.otf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_initial_cap() -> usize {
    10
}

fn default_snapshot_dir() -> String {
    "/data/snapshots".to_string()
}

fn default_captcha_keywords() -> Vec<String> {
    ["captcha", "recaptcha", "i'm not a robot", "자동 입력 방지", "보안문자"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_receipt_keywords() -> Vec<String> {
    [
        "영수증",
        "네이버페이",
        "방문인증",
        "방문 인증",
        "receipt",
        "naver pay",
        "visit verification",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_list_selectors() -> Vec<String> {
    ["li.pui__X35jYm", "div.YeINN", "div[class*='review']"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_content_selectors() -> Vec<String> {
    [
        "span.zPfVt",
        "div.YEtRQ",
        "div[class*='content']",
        "p[class*='review']",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_rating_selectors() -> Vec<String> {
    ["div.PXMot em", "span[class*='rating']", "div[class*='star']"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_date_selectors() -> Vec<String> {
    ["span.BB35N", "time", "span[class*='date']"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
