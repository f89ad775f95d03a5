//! Browser render transport
//!
//! Used as the fallback when plain HTTP cannot get a page. Each fetch opens
//! a fresh session, renders the page, checks the result for an
//! anti-automation challenge and closes the session again on every path.

use crate::config::Config;
use crate::crawler::captcha::CaptchaDetector;
use crate::crawler::fetcher::{jitter, pick_user_agent, PageTransport};
use crate::state::{FailureKind, FetchOutcome, TransportKind};
use crate::TransportError;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Starts browser sessions
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Opens a new session presenting `user_agent`
    async fn open(&self, user_agent: &str) -> Result<Box<dyn RenderSession>, TransportError>;
}

/// One open browser page
///
/// `close` must be called when done. Implementations should also release
/// their resources on drop in case a caller is cancelled mid-fetch.
#[async_trait]
pub trait RenderSession: Send {
    /// Loads `url` and waits until its DOM content has loaded
    ///
    /// Returns the HTTP status of the main document, or `None` when no
    /// response was observed for it.
    async fn navigate(&mut self, url: &str, timeout: Duration)
        -> Result<Option<u16>, TransportError>;

    /// Waits until `selector` matches; `Ok(false)` if it did not within `timeout`
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, TransportError>;

    /// Rendered markup of the current page
    async fn content(&mut self) -> Result<String, TransportError>;

    async fn screenshot(&mut self, path: &Path) -> Result<(), TransportError>;

    async fn close(&mut self);
}

/// Timing for one render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub navigation_timeout: Duration,
    pub wait_for_selector: Option<String>,
    pub selector_timeout: Duration,
    pub settle_min: Duration,
    pub settle_max: Duration,
}

impl RenderSettings {
    pub fn from_config(config: &crate::config::BrowserConfig) -> Self {
        Self {
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            wait_for_selector: config.wait_for_selector.clone(),
            selector_timeout: Duration::from_millis(config.selector_timeout_ms),
            settle_min: Duration::from_millis(config.settle_min_ms),
            settle_max: Duration::from_millis(config.settle_max_ms),
        }
    }
}

/// Render transport over any [`RenderBackend`]
pub struct BrowserTransport {
    backend: Box<dyn RenderBackend>,
    detector: CaptchaDetector,
    settings: RenderSettings,
    user_agents: Vec<String>,
    screenshot_dir: Option<PathBuf>,
}

impl BrowserTransport {
    pub fn new(
        backend: Box<dyn RenderBackend>,
        detector: CaptchaDetector,
        settings: RenderSettings,
        user_agents: Vec<String>,
    ) -> Self {
        Self {
            backend,
            detector,
            settings,
            user_agents,
            screenshot_dir: None,
        }
    }

    /// Builds a transport from the full configuration
    ///
    /// Challenge screenshots are only taken when both the browser and the
    /// snapshot sections ask for them.
    pub fn from_config(backend: Box<dyn RenderBackend>, config: &Config) -> Self {
        let transport = Self::new(
            backend,
            CaptchaDetector::from_config(&config.keywords),
            RenderSettings::from_config(&config.browser),
            config.fetch.user_agents.clone(),
        );

        if config.browser.screenshot_on_challenge && config.snapshot.enabled {
            transport.with_screenshot_dir(&config.snapshot.dir)
        } else {
            transport
        }
    }

    /// Saves a screenshot into `dir` whenever a challenge is detected
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = Some(dir.into());
        self
    }

    async fn render(&self, session: &mut dyn RenderSession, url: &str) -> FetchOutcome {
        let status = match session.navigate(url, self.settings.navigation_timeout).await {
            Ok(status) => status,
            Err(TransportError::Timeout(detail)) => {
                return FetchOutcome::failure(FailureKind::TransportTimeout, detail)
            }
            Err(e) => return FetchOutcome::failure(FailureKind::RenderFailed, e.to_string()),
        };

        // An error page renders fine but is not the review list
        if let Some(status) = status.filter(|s| *s >= 400) {
            let kind = FailureKind::from_status(status).unwrap_or(FailureKind::NonRetryableStatus);
            tracing::warn!("Render of {} returned HTTP {}", url, status);
            return FetchOutcome::failure(kind, format!("HTTP {}", status));
        }

        if let Some(selector) = &self.settings.wait_for_selector {
            match session
                .wait_for_selector(selector, self.settings.selector_timeout)
                .await
            {
                Ok(true) => tracing::debug!("Selector {} appeared on {}", selector, url),
                Ok(false) => {
                    tracing::warn!("Selector {} did not appear on {}, continuing", selector, url)
                }
                Err(e) => tracing::warn!("Waiting for {} on {} failed: {}", selector, url, e),
            }
        }

        tokio::time::sleep(jitter(self.settings.settle_min, self.settings.settle_max)).await;

        let html = match session.content().await {
            Ok(html) => html,
            Err(e) => return FetchOutcome::failure(FailureKind::RenderFailed, e.to_string()),
        };

        if let Some(keyword) = self.detector.matched_keyword(&html) {
            tracing::warn!("Challenge detected on {} (matched '{}')", url, keyword);
            if let Some(dir) = &self.screenshot_dir {
                self.save_challenge_screenshot(session, dir).await;
            }
            return FetchOutcome::failure(
                FailureKind::ChallengeDetected,
                format!("matched '{}'", keyword),
            );
        }

        FetchOutcome::content(html, TransportKind::Browser)
    }

    async fn save_challenge_screenshot(&self, session: &mut dyn RenderSession, dir: &Path) {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!("Cannot create screenshot directory {}: {}", dir.display(), e);
            return;
        }

        let path = dir.join(challenge_screenshot_name());
        match session.screenshot(&path).await {
            Ok(()) => tracing::info!("Saved challenge screenshot to {}", path.display()),
            Err(e) => tracing::warn!("Failed to save challenge screenshot: {}", e),
        }
    }
}

/// `captcha_<timestamp>_<rand>.png`
fn challenge_screenshot_name() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
    format!(
        "captcha_{}_{}.png",
        Utc::now().format("%Y%m%d_%H%M%S"),
        suffix
    )
}

#[async_trait]
impl PageTransport for BrowserTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Browser
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        let user_agent = pick_user_agent(&self.user_agents).to_string();

        let mut session = match self.backend.open(&user_agent).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Failed to open browser session: {}", e);
                return FetchOutcome::failure(FailureKind::RenderFailed, e.to_string());
            }
        };

        let outcome = self.render(session.as_mut(), url).await;
        session.close().await;
        outcome
    }
}

#[cfg(test)]
mod testing {
    //! Scripted render backend for tests

    use super::*;
    use std::sync::{Arc, Mutex};

    /// What a scripted session does
    #[derive(Debug, Clone)]
    pub struct Script {
        pub navigate_timeout: bool,
        pub navigate_error: Option<String>,
        pub status: Option<u16>,
        pub selector_found: bool,
        pub html: String,
    }

    impl Script {
        pub fn page(html: &str) -> Self {
            Self {
                navigate_timeout: false,
                navigate_error: None,
                status: Some(200),
                selector_found: true,
                html: html.to_string(),
            }
        }
    }

    /// Calls made against all sessions of one backend
    #[derive(Debug, Default)]
    pub struct Journal {
        pub opened: Vec<String>,
        pub navigated: Vec<String>,
        pub selector_waits: usize,
        pub screenshots: Vec<PathBuf>,
        pub closed: usize,
    }

    pub struct ScriptedBackend {
        pub script: Script,
        pub fail_open: bool,
        pub journal: Arc<Mutex<Journal>>,
    }

    impl ScriptedBackend {
        pub fn new(script: Script) -> (Self, Arc<Mutex<Journal>>) {
            let journal = Arc::new(Mutex::new(Journal::default()));
            let backend = Self {
                script,
                fail_open: false,
                journal: Arc::clone(&journal),
            };
            (backend, journal)
        }
    }

    struct ScriptedSession {
        script: Script,
        journal: Arc<Mutex<Journal>>,
    }

    #[async_trait]
    impl RenderBackend for ScriptedBackend {
        async fn open(&self, user_agent: &str) -> Result<Box<dyn RenderSession>, TransportError> {
            if self.fail_open {
                return Err(TransportError::Render("no chrome binary".to_string()));
            }
            self.journal.lock().unwrap().opened.push(user_agent.to_string());
            Ok(Box::new(ScriptedSession {
                script: self.script.clone(),
                journal: Arc::clone(&self.journal),
            }))
        }
    }

    #[async_trait]
    impl RenderSession for ScriptedSession {
        async fn navigate(
            &mut self,
            url: &str,
            _timeout: Duration,
        ) -> Result<Option<u16>, TransportError> {
            self.journal.lock().unwrap().navigated.push(url.to_string());
            if self.script.navigate_timeout {
                return Err(TransportError::Timeout(format!("navigating to {}", url)));
            }
            match &self.script.navigate_error {
                Some(message) => Err(TransportError::Render(message.clone())),
                None => Ok(self.script.status),
            }
        }

        async fn wait_for_selector(
            &mut self,
            _selector: &str,
            _timeout: Duration,
        ) -> Result<bool, TransportError> {
            self.journal.lock().unwrap().selector_waits += 1;
            Ok(self.script.selector_found)
        }

        async fn content(&mut self) -> Result<String, TransportError> {
            Ok(self.script.html.clone())
        }

        async fn screenshot(&mut self, path: &Path) -> Result<(), TransportError> {
            std::fs::write(path, b"png")?;
            self.journal.lock().unwrap().screenshots.push(path.to_path_buf());
            Ok(())
        }

        async fn close(&mut self) {
            self.journal.lock().unwrap().closed += 1;
        }
    }

    /// Settings with no settle delay
    pub fn fast_settings() -> RenderSettings {
        RenderSettings {
            navigation_timeout: Duration::from_secs(1),
            wait_for_selector: None,
            selector_timeout: Duration::from_millis(10),
            settle_min: Duration::ZERO,
            settle_max: Duration::ZERO,
        }
    }
}
