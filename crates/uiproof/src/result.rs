//! Result and error types for uiproof.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for uiproof operations
pub type ProofResult<T> = Result<T, ProofError>;

/// Why an element could not be acted upon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotInteractableReason {
    /// No element matched the selector within the step timeout
    NotFound,
    /// The element's bounding box has zero width or height
    ZeroArea,
    /// The element was removed from the document after it was located
    Detached,
    /// The element is present but rendered invisible
    Hidden,
}

impl fmt::Display for NotInteractableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotFound => "element not found",
            Self::ZeroArea => "element has zero area",
            Self::Detached => "element detached from document",
            Self::Hidden => "element is hidden",
        };
        f.write_str(text)
    }
}

/// Which end of the session lifecycle failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Launching the browser, creating the page, installing interception
    Open,
    /// Releasing the browser
    Close,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Close => f.write_str("close"),
        }
    }
}

/// Coarse classification of errors, carried into run records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid scenario, mock pattern, selector or viewport
    Configuration,
    /// Navigation did not become ready in time
    Navigation,
    /// An element could not be interacted with
    Interaction,
    /// An assertion never held within its timeout
    Assertion,
    /// Browser could not be opened or closed
    SessionLifecycle,
    /// A step exceeded its overall timeout
    Timeout,
    /// A browser protocol call failed
    Driver,
    /// Evidence could not be captured or written
    Evidence,
    /// Filesystem or serialization failure
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Configuration => "configuration",
            Self::Navigation => "navigation",
            Self::Interaction => "interaction",
            Self::Assertion => "assertion",
            Self::SessionLifecycle => "session_lifecycle",
            Self::Timeout => "timeout",
            Self::Driver => "driver",
            Self::Evidence => "evidence",
            Self::Io => "io",
        };
        f.write_str(text)
    }
}

/// Errors that can occur while running a scenario
#[derive(Debug, Error)]
pub enum ProofError {
    /// Bad mock pattern, selector, viewport or scenario file
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Navigation did not reach its ready condition in time
    #[error(
        "Navigation to {url} not ready ({condition}) within {timeout_ms}ms; last url {last_url}, last status {}",
        display_status(.last_status)
    )]
    NavigationTimeout {
        /// Requested URL
        url: String,
        /// Last URL the page reported
        last_url: String,
        /// Last HTTP status observed for the document, if any
        last_status: Option<u16>,
        /// Ready condition that was being waited for
        condition: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Element absent, detached or without area
    #[error("Element not interactable: {selector} ({reason})")]
    ElementNotInteractable {
        /// Selector that was targeted
        selector: String,
        /// Why the interaction was refused
        reason: NotInteractableReason,
    },

    /// Polled condition never held
    #[error(
        "Assertion timed out after {timeout_ms}ms: {selector} expected {expected}, last observed {last_observed}"
    )]
    AssertionTimeout {
        /// Selector under test
        selector: String,
        /// Expected condition
        expected: String,
        /// Last observed state
        last_observed: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Browser resource could not be opened or released
    #[error("Session {phase} failed: {message}")]
    SessionLifecycle {
        /// Lifecycle phase
        phase: LifecyclePhase,
        /// Error message
        message: String,
    },

    /// Step exceeded its overall timeout
    #[error("Step '{step}' exceeded {timeout_ms}ms")]
    StepTimeout {
        /// Step description
        step: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Browser protocol call failed
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Screenshot or record could not be produced
    #[error("Evidence error at {}: {message}", .path.display())]
    Evidence {
        /// Target path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl ProofError {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a session lifecycle error
    #[must_use]
    pub fn lifecycle(phase: LifecyclePhase, message: impl Into<String>) -> Self {
        Self::SessionLifecycle {
            phase,
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } | Self::Yaml(_) => ErrorKind::Configuration,
            Self::NavigationTimeout { .. } => ErrorKind::Navigation,
            Self::ElementNotInteractable { .. } => ErrorKind::Interaction,
            Self::AssertionTimeout { .. } => ErrorKind::Assertion,
            Self::SessionLifecycle { .. } => ErrorKind::SessionLifecycle,
            Self::StepTimeout { .. } => ErrorKind::Timeout,
            Self::Driver { .. } => ErrorKind::Driver,
            Self::Evidence { .. } => ErrorKind::Evidence,
            Self::Io(_) | Self::Json(_) => ErrorKind::Io,
        }
    }

    /// Whether a poll loop may retry after this error
    ///
    /// Protocol errors are common while a document is being replaced
    /// (execution context destroyed, node gone); everything else is final.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Driver { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod display_tests {
        use super::*;

        #[test]
        fn test_navigation_timeout_names_url_and_status() {
            let err = ProofError::NavigationTimeout {
                url: "http://localhost:3000/schedule".to_string(),
                last_url: "about:blank".to_string(),
                last_status: Some(502),
                condition: "network idle (500ms quiet)".to_string(),
                timeout_ms: 5000,
            };
            let msg = err.to_string();
            assert!(msg.contains("/schedule"));
            assert!(msg.contains("about:blank"));
            assert!(msg.contains("502"));
        }

        #[test]
        fn test_navigation_timeout_without_status() {
            let err = ProofError::NavigationTimeout {
                url: "u".to_string(),
                last_url: "u".to_string(),
                last_status: None,
                condition: "immediate".to_string(),
                timeout_ms: 1,
            };
            assert!(err.to_string().contains("last status none"));
        }

        #[test]
        fn test_not_interactable_message() {
            let err = ProofError::ElementNotInteractable {
                selector: "button:has-text('Sol')".to_string(),
                reason: NotInteractableReason::NotFound,
            };
            assert_eq!(
                err.to_string(),
                "Element not interactable: button:has-text('Sol') (element not found)"
            );
        }

        #[test]
        fn test_assertion_timeout_message() {
            let err = ProofError::AssertionTimeout {
                selector: "[role=dialog]".to_string(),
                expected: "visible".to_string(),
                last_observed: "absent".to_string(),
                timeout_ms: 100,
            };
            let msg = err.to_string();
            assert!(msg.contains("[role=dialog]"));
            assert!(msg.contains("last observed absent"));
        }
    }

    mod kind_tests {
        use super::*;

        #[test]
        fn test_kinds() {
            assert_eq!(
                ProofError::configuration("x").kind(),
                ErrorKind::Configuration
            );
            assert_eq!(ProofError::driver("x").kind(), ErrorKind::Driver);
            assert_eq!(
                ProofError::lifecycle(LifecyclePhase::Close, "x").kind(),
                ErrorKind::SessionLifecycle
            );
            let io = ProofError::from(std::io::Error::other("disk"));
            assert_eq!(io.kind(), ErrorKind::Io);
        }

        #[test]
        fn test_only_driver_errors_are_transient() {
            assert!(ProofError::driver("context destroyed").is_transient());
            assert!(!ProofError::configuration("bad").is_transient());
            assert!(!ProofError::StepTimeout {
                step: "click".to_string(),
                timeout_ms: 1
            }
            .is_transient());
        }

        #[test]
        fn test_kind_serializes_snake_case() {
            let json = serde_json::to_string(&ErrorKind::SessionLifecycle).unwrap();
            assert_eq!(json, "\"session_lifecycle\"");
        }
    }
}
