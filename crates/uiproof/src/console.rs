//! Browser console output and uncaught page errors.
//!
//! The driver feeds a [`ConsoleLog`] for the lifetime of the session. The
//! runner attaches whatever a failing step produced to that step's result
//! and the whole log to the run record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Entries kept per session; later ones are counted but dropped
pub const MAX_CONSOLE_ENTRIES: usize = 1_000;

/// Severity of a console entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleLevel {
    /// `console.debug`
    Debug,
    /// `console.log` and anything unclassified
    Log,
    /// `console.info`
    Info,
    /// `console.warn`
    Warning,
    /// `console.error` and failed `console.assert`
    Error,
    /// Uncaught exception or unhandled rejection
    PageError,
}

impl ConsoleLevel {
    /// Map a console API call type (`log`, `warning`, `error`, ...)
    #[must_use]
    pub fn from_api_type(kind: &str) -> Self {
        match kind {
            "debug" | "trace" => Self::Debug,
            "info" => Self::Info,
            "warning" | "warn" => Self::Warning,
            "error" | "assert" => Self::Error,
            _ => Self::Log,
        }
    }

    /// Error or page error
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::PageError)
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Debug => "debug",
            Self::Log => "log",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::PageError => "pageerror",
        };
        f.write_str(text)
    }
}

/// One console message or page error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Severity
    pub level: ConsoleLevel,
    /// Message text
    pub text: String,
    /// Script URL, when the browser reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// When it was recorded
    pub timestamp: DateTime<Utc>,
}

impl ConsoleEntry {
    /// Entry stamped now
    #[must_use]
    pub fn new(level: ConsoleLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            url: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the source URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl fmt::Display for ConsoleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)?;
        if let Some(url) = &self.url {
            write!(f, " ({url})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<ConsoleEntry>,
    dropped: usize,
}

/// Shared, append-only console record.
///
/// Clones share storage, like [`crate::network::InterceptionLog`].
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    inner: Arc<Mutex<Inner>>,
}

impl ConsoleLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&self, entry: ConsoleEntry) {
        if entry.level == ConsoleLevel::PageError {
            tracing::warn!(text = %entry.text, "page error");
        } else {
            tracing::debug!(level = %entry.level, text = %entry.text, "console");
        }
        if let Ok(mut inner) = self.inner.lock() {
            if inner.entries.len() < MAX_CONSOLE_ENTRIES {
                inner.entries.push(entry);
            } else {
                inner.dropped += 1;
            }
        }
    }

    /// Snapshot of all entries
    #[must_use]
    pub fn entries(&self) -> Vec<ConsoleEntry> {
        self.inner.lock().map(|i| i.entries.clone()).unwrap_or_default()
    }

    /// Entries recorded after the first `mark`
    #[must_use]
    pub fn since(&self, mark: usize) -> Vec<ConsoleEntry> {
        self.inner
            .lock()
            .map(|i| i.entries.iter().skip(mark).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of kept entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or_default()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries past the cap
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.inner.lock().map(|i| i.dropped).unwrap_or_default()
    }

    /// Errors and page errors only
    #[must_use]
    pub fn errors(&self) -> Vec<ConsoleEntry> {
        self.entries().into_iter().filter(|e| e.level.is_error()).collect()
    }
}
