//! Review extraction from page markup
//!
//! This module turns a review page into an ordered list of candidates:
//! - The review list is located with an ordered chain of list selectors
//! - Content, rating and date each have their own ordered field chain
//! - Receipt/verified-visit reviews are classified by keyword
//!
//! Page order is preserved. Sources list reviews newest first, and the
//! incremental stop policy depends on that order surviving extraction.

use crate::config::{KeywordConfig, SelectorConfig};
use crate::crawler::keywords::{visible_text, KeywordMatcher};
use crate::ConfigError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::sync::OnceLock;

/// A review found on a page
///
/// Only the extractor creates candidates; fields are read through accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCandidate {
    content: String,
    rating: Option<i32>,
    date_text: Option<String>,
    is_receipt: bool,
    raw_markup: String,
}

impl ReviewCandidate {
    pub(crate) fn new(
        content: String,
        rating: Option<i32>,
        date_text: Option<String>,
        is_receipt: bool,
        raw_markup: String,
    ) -> Self {
        debug_assert!(!content.trim().is_empty(), "candidate content must be non-empty");
        Self {
            content,
            rating,
            date_text,
            is_receipt,
            raw_markup,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Star rating, if one could be read
    pub fn rating(&self) -> Option<i32> {
        self.rating
    }

    /// Date exactly as printed on the page
    pub fn date_text(&self) -> Option<&str> {
        self.date_text.as_deref()
    }

    pub fn is_receipt(&self) -> bool {
        self.is_receipt
    }

    /// Outer HTML of the list element the candidate came from
    pub fn raw_markup(&self) -> &str {
        &self.raw_markup
    }
}

/// Why a list element produced no candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No content selector yielded text
    MissingContent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingContent => write!(f, "no review content"),
        }
    }
}

/// Result of parsing one list element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Parsed(ReviewCandidate),
    Skipped(SkipReason),
}

/// Everything one extraction pass observed
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    /// Candidates in page order
    pub candidates: Vec<ReviewCandidate>,

    /// List elements looked at (bounded by the cap)
    pub examined: usize,

    /// Examined elements that produced no candidate
    pub skipped: usize,

    /// The list selector that matched, if any
    pub list_selector: Option<String>,
}

type ParseFn<T> = fn(&str) -> Option<T>;

/// One step of a field chain: where to look and how to read it
struct FieldStrategy<T> {
    selector: Selector,
    parse: ParseFn<T>,
}

/// Ordered fallback strategies for one field; the first non-empty value wins
struct FieldChain<T> {
    strategies: Vec<FieldStrategy<T>>,
}

impl<T> FieldChain<T> {
    fn build(selectors: &[String], parse: ParseFn<T>) -> Result<Self, ConfigError> {
        let strategies = selectors
            .iter()
            .map(|s| {
                Ok(FieldStrategy {
                    selector: compile(s)?,
                    parse,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { strategies })
    }

    fn first_value(&self, element: ElementRef<'_>) -> Option<T> {
        self.strategies.iter().find_map(|strategy| {
            let found = element.select(&strategy.selector).next()?;
            (strategy.parse)(&visible_text(found))
        })
    }
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn parse_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads the first run of digits in `text` as the rating
///
/// ASCII and fullwidth digits are accepted. No digits, or a number that does
/// not fit, leaves the rating unknown.
fn parse_rating(text: &str) -> Option<i32> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let digits = DIGITS.get_or_init(|| Regex::new(r"[0-9０-９]+").expect("static regex"));

    let found = digits.find(text)?.as_str();
    let ascii: String = found
        .chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            _ => c,
        })
        .collect();

    match ascii.parse::<i32>() {
        Ok(rating) => Some(rating),
        Err(e) => {
            tracing::debug!("Ignoring unreadable rating '{}': {}", found, e);
            None
        }
    }
}

/// Parses review pages into ordered candidates
pub struct ReviewExtractor {
    list_selectors: Vec<(String, Selector)>,
    content: FieldChain<String>,
    rating: FieldChain<i32>,
    date: FieldChain<String>,
    receipt: KeywordMatcher,
}

impl ReviewExtractor {
    /// Builds an extractor from selector chains and the receipt keyword list
    ///
    /// # Returns
    ///
    /// * `Ok(ReviewExtractor)` - All selectors compiled
    /// * `Err(ConfigError::InvalidSelector)` - A selector failed to parse
    pub fn new(selectors: &SelectorConfig, keywords: &KeywordConfig) -> Result<Self, ConfigError> {
        let list_selectors = selectors
            .list
            .iter()
            .map(|s| Ok((s.clone(), compile(s)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            list_selectors,
            content: FieldChain::build(&selectors.content, parse_text)?,
            rating: FieldChain::build(&selectors.rating, parse_rating)?,
            date: FieldChain::build(&selectors.date, parse_text)?,
            receipt: KeywordMatcher::new(&keywords.receipt),
        })
    }

    /// Extracts review candidates in page order
    ///
    /// `cap` bounds the number of list elements examined, not the number of
    /// candidates returned. A page where no list selector matches yields an
    /// empty list.
    pub fn extract(&self, markup: &str, cap: Option<usize>) -> Vec<ReviewCandidate> {
        self.extract_report(markup, cap).candidates
    }

    /// Like [`extract`](Self::extract), with counters for logging
    pub fn extract_report(&self, markup: &str, cap: Option<usize>) -> ExtractionReport {
        let document = Html::parse_document(markup);
        let mut report = ExtractionReport::default();

        let Some((selector_text, elements)) = self.locate_list(&document) else {
            tracing::warn!("No review elements found with any list selector");
            return report;
        };

        tracing::debug!(
            "Found {} review elements with selector: {}",
            elements.len(),
            selector_text
        );
        report.list_selector = Some(selector_text.to_string());

        let limit = cap.unwrap_or(usize::MAX);
        for (index, element) in elements.into_iter().take(limit).enumerate() {
            report.examined += 1;
            match self.parse_item(element) {
                ItemOutcome::Parsed(candidate) => report.candidates.push(candidate),
                ItemOutcome::Skipped(reason) => {
                    report.skipped += 1;
                    tracing::debug!("Skipping review element {}: {}", index, reason);
                }
            }
        }

        tracing::info!(
            "Parsed {} reviews ({} examined, {} skipped)",
            report.candidates.len(),
            report.examined,
            report.skipped
        );

        report
    }

    /// Tries list selectors in priority order; the first with any match wins
    fn locate_list<'a>(&'a self, document: &'a Html) -> Option<(&'a str, Vec<ElementRef<'a>>)> {
        self.list_selectors.iter().find_map(|(text, selector)| {
            let elements: Vec<_> = document.select(selector).collect();
            (!elements.is_empty()).then_some((text.as_str(), elements))
        })
    }

    /// Parses a single list element
    pub fn parse_item(&self, element: ElementRef<'_>) -> ItemOutcome {
        let Some(content) = self.content.first_value(element) else {
            return ItemOutcome::Skipped(SkipReason::MissingContent);
        };
        let rating = self.rating.first_value(element);
        let date_text = self.date.first_value(element);

        let is_receipt = self.receipt.find_in_text(&content).is_some()
            || self.receipt.find_in_attributes(element).is_some();

        ItemOutcome::Parsed(ReviewCandidate::new(
            content,
            rating,
            date_text,
            is_receipt,
            element.html(),
        ))
    }
}
