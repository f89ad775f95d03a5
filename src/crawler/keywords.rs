//! Case-insensitive keyword scanning over markup
//!
//! Both the challenge detector and the receipt classifier look for a
//! configured keyword list in two places: the visible text of an element and
//! the accessible-name attributes (`aria-label`, `alt`, `title`) of the element
//! and its descendants.

use scraper::{ElementRef, Node};

/// Attributes that carry an element's accessible name or alt text
const NAME_ATTRIBUTES: [&str; 3] = ["aria-label", "alt", "title"];

/// Elements whose text is never rendered
const INVISIBLE_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// A list of lowercase keywords matched by substring
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    /// Builds a matcher; keywords are lowercased and blank entries dropped
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Returns the first keyword contained in `text`
    pub fn find_in_text(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
            .map(String::as_str)
    }

    /// Returns the first keyword found in a name attribute of `element` or its descendants
    pub fn find_in_attributes(&self, element: ElementRef<'_>) -> Option<&str> {
        element
            .descendants()
            .filter_map(ElementRef::wrap)
            .flat_map(|el| {
                NAME_ATTRIBUTES
                    .iter()
                    .filter_map(move |name| el.value().attr(name))
            })
            .find_map(|value| self.find_in_text(value))
    }

    /// Returns the first keyword found in the visible text or name attributes of `element`
    pub fn find_in_element(&self, element: ElementRef<'_>) -> Option<&str> {
        self.find_in_text(&visible_text(element))
            .or_else(|| self.find_in_attributes(element))
    }
}

/// Collects the rendered text of `element`, skipping script and style content
///
/// Text nodes are trimmed and joined with single spaces.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();

    for node in element.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| INVISIBLE_ELEMENTS.contains(&el.value().name()));
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join(" ")
}
