/// Failure and transport definitions for fetch outcomes
///
/// This module defines the ways a single fetch can end without usable markup,
/// and which transport produced the markup when it succeeds.
use std::fmt;

/// Which transport produced a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Plain HTTP request, no rendering
    Http,

    /// Headless browser render
    Browser,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Browser => "browser",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents why a fetch produced no content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    // ===== Retryable on the lightweight transport =====
    /// A request or render exceeded its timeout
    TransportTimeout,

    /// HTTP 429 or 403 from the source
    RateLimited,

    /// HTTP 5xx from the source
    ServerError,

    /// Connection refused, DNS failure, TLS error, body read failure
    Network,

    // ===== Immediate =====
    /// Any other non-200 status (404, 410, ...)
    NonRetryableStatus,

    // ===== Browser transport =====
    /// The rendered page is an anti-automation challenge
    ChallengeDetected,

    /// The browser could not be launched, navigate, or read the page
    RenderFailed,
}

impl FailureKind {
    /// Returns true if the lightweight transport may retry after this failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportTimeout | Self::RateLimited | Self::ServerError | Self::Network
        )
    }

    /// Stable snake_case name, used in crawl results and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransportTimeout => "transport_timeout",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Network => "network",
            Self::NonRetryableStatus => "non_retryable_status",
            Self::ChallengeDetected => "challenge_detected",
            Self::RenderFailed => "render_failed",
        }
    }

    /// Classifies an HTTP status code that is not a success
    ///
    /// Returns None for 200, which is the only status treated as content.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200 => None,
            403 | 429 => Some(Self::RateLimited),
            s if s >= 500 => Some(Self::ServerError),
            _ => Some(Self::NonRetryableStatus),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of fetching one URL through any transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Markup was retrieved
    Content {
        html: String,
        transport: TransportKind,
    },

    /// No markup; `detail` is a human-readable description for logs
    Failure { kind: FailureKind, detail: String },
}

impl FetchOutcome {
    pub fn content(html: impl Into<String>, transport: TransportKind) -> Self {
        Self::Content {
            html: html.into(),
            transport,
        }
    }

    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content { .. })
    }

    /// The failure kind, if this outcome is a failure
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            Self::Content { .. } => None,
        }
    }
}
