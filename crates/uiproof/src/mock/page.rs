//! Declarative description of the fake site.

use crate::console::ConsoleLevel;
use crate::network::HttpMethod;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Response to one of a page's load-time requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// HTTP status
    pub status: u16,
    /// Body as served
    pub body: String,
    /// Whether a mock rule served it
    pub mocked: bool,
}

/// Load-time responses, keyed by the path the page requested
#[derive(Debug, Clone, Default)]
pub struct FetchResults {
    results: HashMap<String, FetchResult>,
}

impl FetchResults {
    pub(crate) fn insert(&mut self, path: impl Into<String>, result: FetchResult) {
        let _ = self.results.insert(path.into(), result);
    }

    /// Raw result for `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FetchResult> {
        self.results.get(path)
    }

    /// Parsed JSON body for a 2xx response
    #[must_use]
    pub fn json(&self, path: &str) -> Option<serde_json::Value> {
        self.get(path)
            .filter(|r| (200..300).contains(&r.status))
            .and_then(|r| serde_json::from_str(&r.body).ok())
    }
}

/// What fires a reaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Pointer pressed and released on the node
    Click,
    /// Key pressed while the node has focus
    Key(String),
}

/// Page change caused by user input
#[derive(Debug, Clone)]
pub enum Reaction {
    /// Append nodes to the page after a delay
    Reveal {
        /// Nodes to add
        nodes: Vec<MockNode>,
        /// Delay before they appear
        after: Duration,
    },
    /// Detach nodes matching a CSS selector after a delay
    Remove {
        /// CSS selector
        css: String,
        /// Delay before removal
        after: Duration,
    },
    /// Issue a request through the interception layer
    Request {
        /// Method
        method: HttpMethod,
        /// Path, resolved against the page origin
        path: String,
    },
    /// Write to the console, or throw when `level` is `PageError`
    Console {
        /// Severity
        level: ConsoleLevel,
        /// Message text
        text: String,
    },
}

/// One element of the fake DOM
#[derive(Debug, Clone, Default)]
pub struct MockNode {
    pub(crate) tag: String,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) text: String,
    pub(crate) size: Option<(f32, f32)>,
    pub(crate) hidden: bool,
    pub(crate) appears_after: Duration,
    pub(crate) removed_after: Option<Duration>,
    pub(crate) children: Vec<MockNode>,
    pub(crate) reactions: Vec<(Trigger, Reaction)>,
}

impl MockNode {
    /// Element with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Set the id
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a class
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Fix the layout size; `(0.0, 0.0)` makes the node unclickable
    #[must_use]
    pub const fn size(mut self, width: f32, height: f32) -> Self {
        self.size = Some((width, height));
        self
    }

    /// Present but styled invisible
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Appear this long after the page's data has loaded
    #[must_use]
    pub const fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_after = delay;
        self
    }

    /// Detach this long after the page's data has loaded
    #[must_use]
    pub const fn removed_after(mut self, delay: Duration) -> Self {
        self.removed_after = Some(delay);
        self
    }

    /// Add a child
    #[must_use]
    pub fn child(mut self, child: MockNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add children
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = MockNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// React to a click
    #[must_use]
    pub fn on_click(mut self, reaction: Reaction) -> Self {
        self.reactions.push((Trigger::Click, reaction));
        self
    }

    /// React to a key press while focused
    #[must_use]
    pub fn on_key(mut self, key: impl Into<String>, reaction: Reaction) -> Self {
        self.reactions.push((Trigger::Key(key.into()), reaction));
        self
    }
}

type Render = Arc<dyn Fn(&FetchResults) -> Vec<MockNode> + Send + Sync>;

/// A route of the fake site
#[derive(Clone)]
pub struct MockPage {
    pub(crate) status: u16,
    pub(crate) fetches: Vec<(HttpMethod, String)>,
    pub(crate) network_delay: Duration,
    pub(crate) long_poll: bool,
    pub(crate) console: Vec<(ConsoleLevel, String)>,
    pub(crate) render: Render,
}

impl std::fmt::Debug for MockPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPage")
            .field("status", &self.status)
            .field("fetches", &self.fetches)
            .field("network_delay", &self.network_delay)
            .field("long_poll", &self.long_poll)
            .field("console", &self.console)
            .finish_non_exhaustive()
    }
}

impl MockPage {
    /// Page whose DOM is built from its fetched data
    #[must_use]
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&FetchResults) -> Vec<MockNode> + Send + Sync + 'static,
    {
        Self {
            status: 200,
            fetches: Vec::new(),
            network_delay: Duration::from_millis(50),
            long_poll: false,
            console: Vec::new(),
            render: Arc::new(render),
        }
    }

    /// Page with fixed content
    #[must_use]
    pub fn fixed(nodes: Vec<MockNode>) -> Self {
        Self::new(move |_| nodes.clone())
    }

    /// GET `path` on load
    #[must_use]
    pub fn fetch(mut self, path: impl Into<String>) -> Self {
        self.fetches.push((HttpMethod::Get, path.into()));
        self
    }

    /// How long load-time requests stay in flight
    #[must_use]
    pub const fn network_delay(mut self, delay: Duration) -> Self {
        self.network_delay = delay;
        self
    }

    /// Keep one request open forever, so the network never goes idle
    #[must_use]
    pub const fn long_poll(mut self) -> Self {
        self.long_poll = true;
        self
    }

    /// Emit a console message while loading
    #[must_use]
    pub fn console(mut self, level: ConsoleLevel, text: impl Into<String>) -> Self {
        self.console.push((level, text.into()));
        self
    }

    /// Throw an uncaught error while loading
    #[must_use]
    pub fn page_error(self, text: impl Into<String>) -> Self {
        self.console(ConsoleLevel::PageError, text)
    }

    /// Document status
    #[must_use]
    pub const fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// Routes of the fake site, keyed by path
#[derive(Debug, Clone, Default)]
pub struct MockSite {
    pages: HashMap<String, MockPage>,
}

impl MockSite {
    /// Empty site; every path is a 404
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route
    #[must_use]
    pub fn page(mut self, path: impl Into<String>, page: MockPage) -> Self {
        let _ = self.pages.insert(path.into(), page);
        self
    }

    pub(crate) fn get(&self, path: &str) -> Option<&MockPage> {
        self.pages.get(path)
    }
}
