//! The browser capability contract.
//!
//! Everything above this module talks to a page through [`PageDriver`] and
//! obtains one through [`BrowserLauncher`]. Two implementations ship with the
//! crate: the Chromium binding `CdpDriver` (feature `browser`) and
//! the scripted fake in [`crate::mock`].

use crate::config::{SessionConfig, Viewport};
use crate::console::ConsoleLog;
use crate::locator::{BoundingBox, Point, Selector};
use crate::network::{InterceptionLog, MockRegistry};
use crate::result::ProofResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of a located element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identity, stable while the element stays attached
    pub id: String,
    /// Selector that found it
    pub selector: String,
    /// Lower-case tag name
    pub tag: String,
    /// Whitespace-normalised text content at query time
    pub text: String,
    /// Rendered and not hidden by style at query time
    pub visible: bool,
    /// Layout box at query time
    pub bounding_box: Option<BoundingBox>,
}

impl ElementHandle {
    /// Create a handle with no layout information
    #[must_use]
    pub fn new(id: impl Into<String>, selector: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            selector: selector.into(),
            tag: tag.into(),
            text: String::new(),
            visible: false,
            bounding_box: None,
        }
    }

    /// Set text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set layout box and mark visible
    #[must_use]
    pub const fn with_box(mut self, bounding_box: BoundingBox) -> Self {
        self.visible = true;
        self.bounding_box = Some(bounding_box);
        self
    }
}

/// What a committed navigation reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationOutcome {
    /// Document response status, if known
    pub status: Option<u16>,
    /// URL after redirects
    pub url: String,
}

/// Current network state of the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkActivity {
    /// Requests started but not finished
    pub in_flight: usize,
    /// Time since the last request started or finished
    pub idle_for: Duration,
}

impl NetworkActivity {
    /// No requests in flight for at least `quiet`
    #[must_use]
    pub fn is_idle(&self, quiet: Duration) -> bool {
        self.in_flight == 0 && self.idle_for >= quiet
    }
}

/// One browser page.
///
/// Read-only queries take `&self` so they can run inside poll loops;
/// anything that changes page state takes `&mut self`.
#[async_trait]
pub trait PageDriver: Send + Sync + std::fmt::Debug {
    /// Navigate and wait for the document to commit
    async fn navigate(&mut self, url: &str) -> ProofResult<NavigationOutcome>;

    /// Current page URL
    async fn current_url(&self) -> ProofResult<String>;

    /// Network state, for idle detection
    async fn network_activity(&self) -> ProofResult<NetworkActivity>;

    /// Elements matching `selector`, in document order
    async fn query(&self, selector: &Selector) -> ProofResult<Vec<ElementHandle>>;

    /// Scroll the element into view and return its box; `None` once detached
    async fn bounding_box(&self, element: &ElementHandle) -> ProofResult<Option<BoundingBox>>;

    /// Whether the element is still attached and rendered
    async fn is_visible(&self, element: &ElementHandle) -> ProofResult<bool>;

    /// Attribute value; `None` if absent or detached
    async fn attribute(&self, element: &ElementHandle, name: &str) -> ProofResult<Option<String>>;

    /// Move the pointer
    async fn mouse_move(&mut self, point: Point) -> ProofResult<()>;

    /// Press the primary button at `point`
    async fn mouse_down(&mut self, point: Point) -> ProofResult<()>;

    /// Release the primary button at `point`
    async fn mouse_up(&mut self, point: Point) -> ProofResult<()>;

    /// Scroll with the wheel at `point`
    async fn wheel(&mut self, point: Point, delta_x: f32, delta_y: f32) -> ProofResult<()>;

    /// Type text into the focused element
    async fn insert_text(&mut self, text: &str) -> ProofResult<()>;

    /// Press and release a named key (`Enter`, `Escape`, `Tab`, ...)
    async fn press_key(&mut self, key: &str) -> ProofResult<()>;

    /// Resize the viewport
    async fn set_viewport(&mut self, viewport: Viewport) -> ProofResult<()>;

    /// Current viewport size
    fn viewport(&self) -> Viewport;

    /// PNG screenshot of the viewport or the whole page
    async fn screenshot(&self, full_page: bool) -> ProofResult<Vec<u8>>;

    /// Route every request through `registry`, recording decisions in `log`
    async fn install_interception(
        &mut self,
        registry: Arc<MockRegistry>,
        log: InterceptionLog,
    ) -> ProofResult<()>;

    /// Record console messages and uncaught page errors into `log`
    async fn capture_console(&mut self, log: ConsoleLog) -> ProofResult<()>;

    /// Release the page and its browser
    async fn close(&mut self) -> ProofResult<()>;
}

/// Produces pages
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a browser and open one page.
    ///
    /// Implementations release anything they already acquired before
    /// returning an error.
    async fn launch(&self, config: &SessionConfig) -> ProofResult<Box<dyn PageDriver>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod element_handle_tests {
        use super::*;

        #[test]
        fn test_builder() {
            let handle = ElementHandle::new("n3", "button", "button")
                .with_text("Sol")
                .with_box(BoundingBox::new(0.0, 0.0, 80.0, 30.0));
            assert!(handle.visible);
            assert_eq!(handle.text, "Sol");
            assert_eq!(handle.bounding_box.unwrap().width, 80.0);
        }

        #[test]
        fn test_new_is_invisible() {
            let handle = ElementHandle::new("n1", "div", "div");
            assert!(!handle.visible);
            assert!(handle.bounding_box.is_none());
        }
    }

    mod network_activity_tests {
        use super::*;

        #[test]
        fn test_is_idle() {
            let quiet = Duration::from_millis(500);
            let idle = NetworkActivity {
                in_flight: 0,
                idle_for: Duration::from_millis(600),
            };
            assert!(idle.is_idle(quiet));

            let busy = NetworkActivity {
                in_flight: 1,
                idle_for: Duration::from_secs(5),
            };
            assert!(!busy.is_idle(quiet));

            let recent = NetworkActivity {
                in_flight: 0,
                idle_for: Duration::from_millis(100),
            };
            assert!(!recent.is_idle(quiet));
        }
    }
}
