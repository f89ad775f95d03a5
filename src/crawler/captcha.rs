//! Anti-automation challenge detection
//!
//! A rendered page is treated as a challenge when its visible text or the
//! accessible names of its elements contain one of the configured keywords.

use crate::config::KeywordConfig;
use crate::crawler::keywords::KeywordMatcher;
use scraper::Html;

/// Pure classifier over page markup
#[derive(Debug, Clone)]
pub struct CaptchaDetector {
    matcher: KeywordMatcher,
}

impl CaptchaDetector {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            matcher: KeywordMatcher::new(keywords),
        }
    }

    pub fn from_config(config: &KeywordConfig) -> Self {
        Self::new(&config.captcha)
    }

    /// Returns true if `markup` looks like a challenge page
    pub fn detect(&self, markup: &str) -> bool {
        self.matched_keyword(markup).is_some()
    }

    /// Returns the keyword that triggered detection, for logging
    pub fn matched_keyword(&self, markup: &str) -> Option<String> {
        let document = Html::parse_document(markup);
        self.matcher
            .find_in_element(document.root_element())
            .map(str::to_string)
    }
}
