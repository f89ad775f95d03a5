//! Chromium render backend
//!
//! Launches a local Chromium per session through the DevTools protocol.
//! Images, fonts and stylesheets are blocked so a render only costs the
//! markup and scripts.

use crate::config::BrowserConfig;
use crate::crawler::browser::{RenderBackend, RenderSession};
use crate::TransportError;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, ResourceType, SetBlockedUrLsParams,
};
use chromiumoxide::cdp::browser_protocol::page::{EventDomContentEventFired, NavigateParams};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Launches headless (or headed) Chromium sessions
#[derive(Debug, Clone)]
pub struct ChromiumBackend {
    headless: bool,
    blocked_resources: Vec<String>,
}

impl ChromiumBackend {
    pub fn new(headless: bool, blocked_resources: Vec<String>) -> Self {
        Self {
            headless,
            blocked_resources,
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self::new(config.headless, config.blocked_resources.clone())
    }

    fn launch_config(&self) -> Result<chromiumoxide::BrowserConfig, TransportError> {
        let mut builder = chromiumoxide::BrowserConfig::builder()
            .no_sandbox()
            .window_size(1280, 720)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");

        if !self.headless {
            builder = builder.with_head();
        }

        builder.build().map_err(TransportError::Render)
    }
}

#[async_trait]
impl RenderBackend for ChromiumBackend {
    async fn open(&self, user_agent: &str) -> Result<Box<dyn RenderSession>, TransportError> {
        let (browser, mut handler) = Browser::launch(self.launch_config()?)
            .await
            .map_err(render_error)?;

        // The handler drives the CDP connection and must be polled for the
        // browser's whole lifetime
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut session = ChromiumSession {
            browser: Some(browser),
            page: None,
            handler: Some(handler_task),
        };

        if let Err(e) = session.prepare(user_agent, &self.blocked_resources).await {
            session.close().await;
            return Err(e);
        }

        tracing::debug!("Browser session opened");
        Ok(Box::new(session))
    }
}

/// One launched browser with a single page
///
/// Dropping an unclosed session spawns the teardown on the current runtime.
struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
}

impl ChromiumSession {
    async fn prepare(&mut self, user_agent: &str, blocked: &[String]) -> Result<(), TransportError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| TransportError::Render("browser already closed".to_string()))?;

        let page = browser.new_page("about:blank").await.map_err(render_error)?;
        self.page = Some(page.clone());

        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(render_error)?;

        page.execute(EnableParams::default())
            .await
            .map_err(render_error)?;

        if !blocked.is_empty() {
            page.execute(SetBlockedUrLsParams::new(blocked.to_vec()))
                .await
                .map_err(render_error)?;
        }

        Ok(())
    }

    fn page(&self) -> Result<&Page, TransportError> {
        self.page
            .as_ref()
            .ok_or_else(|| TransportError::Render("page already closed".to_string()))
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<Option<u16>, TransportError> {
        let page = self.page()?;

        // Listeners go in before the navigation so no event is missed
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(render_error)?;
        let mut dom_loaded = page
            .event_listener::<EventDomContentEventFired>()
            .await
            .map_err(render_error)?;

        let load = async {
            let navigation = page
                .execute(NavigateParams::new(url))
                .await
                .map_err(render_error)?;
            if let Some(error) = &navigation.result.error_text {
                return Err(TransportError::Render(format!(
                    "navigation to {} failed: {}",
                    url, error
                )));
            }
            let frame = navigation.result.frame_id.clone();

            let mut status = None;
            while let Some(event) = responses.next().await {
                if event.r#type == ResourceType::Document && event.frame_id.as_ref() == Some(&frame)
                {
                    status = u16::try_from(event.response.status).ok();
                    break;
                }
            }

            if dom_loaded.next().await.is_none() {
                return Err(TransportError::Render(
                    "page closed before DOM content loaded".to_string(),
                ));
            }
            Ok(status)
        };

        match tokio::time::timeout(timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(format!(
                "navigation to {} exceeded {:?}",
                url, timeout
            ))),
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, TransportError> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;

        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn content(&mut self) -> Result<String, TransportError> {
        self.page()?.content().await.map_err(render_error)
    }

    async fn screenshot(&mut self, path: &Path) -> Result<(), TransportError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page()?
            .save_screenshot(params, path)
            .await
            .map_err(render_error)?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::debug!("Failed to close page: {}", e);
            }
        }

        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("Failed to reap browser process: {}", e);
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }

        tracing::debug!("Browser session closed");
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        let page = self.page.take();
        let browser = self.browser.take();
        let handler = self.handler.take();

        if page.is_none() && browser.is_none() {
            if let Some(handler) = handler {
                handler.abort();
            }
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Browser session dropped outside a runtime; process may linger");
            return;
        };

        runtime.spawn(async move {
            if let Some(page) = page {
                let _ = page.close().await;
            }
            if let Some(mut browser) = browser {
                let _ = browser.close().await;
                let _ = browser.wait().await;
            }
            if let Some(handler) = handler {
                handler.abort();
            }
        });
    }
}

fn render_error(error: impl std::fmt::Display) -> TransportError {
    TransportError::Render(error.to_string())
}
