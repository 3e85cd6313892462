//! Scripted fake browser.
//!
//! [`MockLauncher`] hands out [`MockDriver`] pages that implement the full
//! [`PageDriver`] contract without Chromium. A page's load-time requests go
//! through the installed [`MockRegistry`] exactly as a real browser's would,
//! and its DOM is rendered from whatever those requests returned. Timing
//! (request latency, delayed reveals, removals) runs on tokio's clock, so
//! tests can pause it.
//!
//! ```rust,ignore
//! let site = MockSite::new().page(
//!     "/schedule",
//!     MockPage::new(|data| render_schedule(data.json("/api/schedule")))
//!         .fetch("/api/schedule"),
//! );
//! let launcher = MockLauncher::new(site);
//! ```

mod css;
mod page;

pub use page::{FetchResult, FetchResults, MockNode, MockPage, MockSite, Reaction, Trigger};

use self::css::{CssNode, CssSelector};
use crate::config::{SessionConfig, Viewport, MAX_VIEWPORT_DIMENSION};
use crate::console::{ConsoleEntry, ConsoleLevel, ConsoleLog};
use crate::driver::{BrowserLauncher, ElementHandle, NavigationOutcome, NetworkActivity, PageDriver};
use crate::locator::{normalize_whitespace, BoundingBox, Point, Selector};
use crate::network::{url_path, HttpMethod, InterceptionLog, MockRegistry};
use crate::result::{LifecyclePhase, ProofError, ProofResult};
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const ROW_HEIGHT: f32 = 48.0;
const MARGIN: f32 = 16.0;
const INDENT: f32 = 12.0;
const DEFAULT_SIZE: (f32, f32) = (240.0, 40.0);

// =============================================================================
// LAUNCHER
// =============================================================================

/// Kind of pointer input the fake page received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// Pointer moved
    Move,
    /// Primary button pressed
    Down,
    /// Primary button released
    Up,
    /// Wheel scrolled
    Wheel,
}

/// One pointer input, with the element under the pointer
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    /// Input kind
    pub kind: PointerKind,
    /// Viewport position
    pub point: Point,
    /// Element id under the pointer, if any
    pub target: Option<String>,
}

#[derive(Debug, Default)]
struct Shared {
    launched: AtomicUsize,
    closed: AtomicUsize,
    history: Mutex<Vec<String>>,
    pointer: Mutex<Vec<PointerEvent>>,
}

impl Shared {
    fn record(&self, call: impl Into<String>) {
        if let Ok(mut history) = self.history.lock() {
            history.push(call.into());
        }
    }

    fn record_pointer(&self, event: PointerEvent) {
        if let Ok(mut pointer) = self.pointer.lock() {
            pointer.push(event);
        }
    }
}

/// Launches fake pages over a [`MockSite`]
#[derive(Debug, Clone)]
pub struct MockLauncher {
    site: Arc<MockSite>,
    shared: Arc<Shared>,
    fail_launch: Option<String>,
    fail_close: bool,
    fail_screenshots: bool,
}

impl MockLauncher {
    /// Launcher serving `site`
    #[must_use]
    pub fn new(site: MockSite) -> Self {
        Self {
            site: Arc::new(site),
            shared: Arc::new(Shared::default()),
            fail_launch: None,
            fail_close: false,
            fail_screenshots: false,
        }
    }

    /// Make every launch fail
    #[must_use]
    pub fn with_launch_failure(mut self, message: impl Into<String>) -> Self {
        self.fail_launch = Some(message.into());
        self
    }

    /// Make every close report an error (resources are still released)
    #[must_use]
    pub const fn with_close_failure(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Make every screenshot fail
    #[must_use]
    pub const fn with_screenshot_failure(mut self) -> Self {
        self.fail_screenshots = true;
        self
    }

    /// Pages launched so far
    #[must_use]
    pub fn launched(&self) -> usize {
        self.shared.launched.load(Ordering::SeqCst)
    }

    /// Pages closed so far
    #[must_use]
    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Pages launched but not closed
    #[must_use]
    pub fn open_pages(&self) -> usize {
        self.launched().saturating_sub(self.closed())
    }

    /// Driver calls across all launched pages
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.shared.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.history().iter().any(|call| call.starts_with(prefix))
    }

    /// Pointer input across all launched pages
    #[must_use]
    pub fn pointer_events(&self) -> Vec<PointerEvent> {
        self.shared.pointer.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, config: &SessionConfig) -> ProofResult<Box<dyn PageDriver>> {
        if let Some(message) = &self.fail_launch {
            return Err(ProofError::lifecycle(LifecyclePhase::Open, message.clone()));
        }
        let _ = self.shared.launched.fetch_add(1, Ordering::SeqCst);
        self.shared.record(format!(
            "launch:{}:{}",
            config.viewport,
            config.user_agent.as_deref().unwrap_or("default")
        ));
        Ok(Box::new(MockDriver {
            site: Arc::clone(&self.site),
            shared: Arc::clone(&self.shared),
            viewport: config.viewport,
            fail_close: self.fail_close,
            fail_screenshots: self.fail_screenshots,
            closed: false,
            url: "about:blank".to_string(),
            origin: String::new(),
            loaded_at: Instant::now(),
            network_delay: Duration::ZERO,
            nodes: Vec::new(),
            requests: Vec::new(),
            long_poll: false,
            next_uid: 0,
            scroll: (0.0, 0.0),
            hovered: None,
            pressed: None,
            focused: None,
            interception: None,
            console: None,
        }))
    }
}

// =============================================================================
// LIVE DOM
// =============================================================================

#[derive(Debug, Clone)]
struct LiveNode {
    uid: u64,
    parent: Option<usize>,
    depth: usize,
    row: usize,
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: BTreeMap<String, String>,
    text: String,
    size: (f32, f32),
    hidden: bool,
    value: String,
    present_at: Instant,
    removed_at: Option<Instant>,
    reactions: Vec<(Trigger, Reaction)>,
}

impl CssNode for LiveNode {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    fn attr(&self, name: &str) -> Option<&str> {
        match name {
            "id" => self.id.as_deref(),
            _ => self.attrs.get(name).map(String::as_str),
        }
    }
}

#[derive(Clone)]
struct Ancestors<'a> {
    nodes: &'a [LiveNode],
    next: Option<usize>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a LiveNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.next?)?;
        self.next = node.parent;
        Some(node)
    }
}

fn node_id(uid: u64) -> String {
    format!("node-{uid}")
}

// =============================================================================
// DRIVER
// =============================================================================

/// A fake page
#[derive(Debug)]
pub struct MockDriver {
    site: Arc<MockSite>,
    shared: Arc<Shared>,
    viewport: Viewport,
    fail_close: bool,
    fail_screenshots: bool,
    closed: bool,
    url: String,
    origin: String,
    loaded_at: Instant,
    network_delay: Duration,
    nodes: Vec<LiveNode>,
    requests: Vec<Instant>,
    long_poll: bool,
    next_uid: u64,
    scroll: (f32, f32),
    hovered: Option<u64>,
    pressed: Option<u64>,
    focused: Option<u64>,
    interception: Option<(Arc<MockRegistry>, InterceptionLog)>,
    console: Option<ConsoleLog>,
}

impl MockDriver {
    fn ensure_open(&self) -> ProofResult<()> {
        if self.closed {
            Err(ProofError::driver("page is closed"))
        } else {
            Ok(())
        }
    }

    fn ancestors(&self, idx: usize) -> Ancestors<'_> {
        Ancestors {
            nodes: &self.nodes,
            next: self.nodes.get(idx).and_then(|n| n.parent),
        }
    }

    fn is_attached(&self, idx: usize, now: Instant) -> bool {
        let own = |n: &LiveNode| n.present_at <= now && n.removed_at.map_or(true, |t| now < t);
        self.nodes.get(idx).is_some_and(own) && self.ancestors(idx).all(own)
    }

    fn is_rendered(&self, idx: usize, now: Instant) -> bool {
        self.is_attached(idx, now)
            && !self.nodes[idx].hidden
            && self.ancestors(idx).all(|n| !n.hidden)
    }

    fn index_of(&self, element: &ElementHandle) -> Option<usize> {
        self.nodes.iter().position(|n| node_id(n.uid) == element.id)
    }

    fn layout(&self, idx: usize) -> BoundingBox {
        let node = &self.nodes[idx];
        BoundingBox::new(
            MARGIN + node.depth as f32 * INDENT - self.scroll.0,
            MARGIN + node.row as f32 * ROW_HEIGHT - self.scroll.1,
            node.size.0,
            node.size.1,
        )
    }

    fn text_of(&self, idx: usize, now: Instant) -> String {
        let mut parts = vec![self.nodes[idx].text.clone()];
        for (child, node) in self.nodes.iter().enumerate() {
            if node.parent == Some(idx) && self.is_attached(child, now) {
                parts.push(self.text_of(child, now));
            }
        }
        normalize_whitespace(&parts.join(" "))
    }

    fn handle(&self, idx: usize, selector: &Selector, now: Instant) -> ElementHandle {
        let node = &self.nodes[idx];
        let bbox = self.layout(idx);
        let visible = self.is_rendered(idx, now) && !bbox.is_zero_area();
        ElementHandle {
            id: node_id(node.uid),
            selector: selector.as_str().to_string(),
            tag: node.tag.clone(),
            text: self.text_of(idx, now),
            visible,
            bounding_box: visible.then_some(bbox),
        }
    }

    fn hit_test(&self, point: Point, now: Instant) -> Option<usize> {
        (0..self.nodes.len()).rev().find(|&idx| {
            let bbox = self.layout(idx);
            self.is_rendered(idx, now) && !bbox.is_zero_area() && bbox.contains(&point)
        })
    }

    fn append(&mut self, nodes: &[MockNode], parent: Option<usize>, depth: usize, base: Instant) {
        for node in nodes {
            let uid = self.next_uid;
            self.next_uid += 1;
            let idx = self.nodes.len();
            self.nodes.push(LiveNode {
                uid,
                parent,
                depth,
                row: idx,
                tag: node.tag.clone(),
                id: node.id.clone(),
                classes: node.classes.clone(),
                attrs: node.attrs.clone(),
                text: node.text.clone(),
                size: node.size.unwrap_or(DEFAULT_SIZE),
                hidden: node.hidden,
                value: node.attrs.get("value").cloned().unwrap_or_default(),
                present_at: base + node.appears_after,
                removed_at: node.removed_after.map(|d| base + d),
                reactions: node.reactions.clone(),
            });
            self.append(&node.children, Some(idx), depth + 1, base);
        }
    }

    fn request(&mut self, method: HttpMethod, path: &str) -> FetchResult {
        let url = format!("{}{path}", self.origin);
        self.requests.push(Instant::now() + self.network_delay);
        let rule = self
            .interception
            .as_ref()
            .and_then(|(registry, log)| registry.intercept(method, &url, log).cloned());
        match rule {
            Some(rule) => FetchResult {
                status: rule.status,
                body: rule.body,
                mocked: true,
            },
            // nothing listens behind the fake site
            None => FetchResult {
                status: 503,
                body: String::new(),
                mocked: false,
            },
        }
    }

    fn emit(&self, level: ConsoleLevel, text: &str) {
        if let Some(log) = &self.console {
            let entry = ConsoleEntry::new(level, text);
            log.record(if level == ConsoleLevel::PageError {
                entry.with_url(self.url.clone())
            } else {
                entry
            });
        }
    }

    fn apply(&mut self, reaction: &Reaction, now: Instant) {
        match reaction {
            Reaction::Reveal { nodes, after } => self.append(nodes, None, 0, now + *after),
            Reaction::Remove { css, after } => match CssSelector::parse(css) {
                Ok(selector) => {
                    let targets: Vec<usize> = (0..self.nodes.len())
                        .filter(|&idx| {
                            self.is_attached(idx, now)
                                && selector.matches(&self.nodes[idx], self.ancestors(idx))
                        })
                        .collect();
                    for idx in targets {
                        let at = now + *after;
                        let node = &mut self.nodes[idx];
                        node.removed_at = Some(node.removed_at.map_or(at, |t| t.min(at)));
                    }
                }
                Err(err) => tracing::warn!(%err, "ignoring removal with unsupported selector"),
            },
            Reaction::Request { method, path } => {
                let _ = self.request(*method, path);
            }
            Reaction::Console { level, text } => self.emit(*level, text),
        }
    }

    fn trigger(&mut self, uid: u64, trigger: &Trigger) {
        let now = Instant::now();
        let reactions: Vec<Reaction> = self
            .nodes
            .iter()
            .find(|n| n.uid == uid)
            .map(|n| {
                n.reactions
                    .iter()
                    .filter(|(t, _)| t == trigger)
                    .map(|(_, r)| r.clone())
                    .collect()
            })
            .unwrap_or_default();
        for reaction in &reactions {
            self.apply(reaction, now);
        }
    }

    fn pointer(&self, kind: PointerKind, point: Point, target: Option<usize>) {
        self.shared.record_pointer(PointerEvent {
            kind,
            point,
            target: target.map(|idx| node_id(self.nodes[idx].uid)),
        });
    }

    fn render_png(&self, full_page: bool) -> ProofResult<Vec<u8>> {
        let now = Instant::now();
        let width = self.viewport.width;
        let mut height = self.viewport.height;
        let offset = if full_page { (0.0, 0.0) } else { self.scroll };
        if full_page {
            let bottom = (0..self.nodes.len())
                .filter(|&idx| self.is_rendered(idx, now))
                .map(|idx| MARGIN * 2.0 + self.nodes[idx].row as f32 * ROW_HEIGHT + self.nodes[idx].size.1)
                .fold(0.0_f32, f32::max);
            height = height.max(bottom.ceil() as u32).min(MAX_VIEWPORT_DIMENSION);
        }

        let mut img = RgbImage::from_pixel(width, height, Rgb([246, 247, 249]));
        for idx in (0..self.nodes.len()).filter(|&idx| self.is_rendered(idx, now)) {
            let node = &self.nodes[idx];
            let x0 = MARGIN + node.depth as f32 * INDENT - offset.0;
            let y0 = MARGIN + node.row as f32 * ROW_HEIGHT - offset.1;
            let shade = 220_u8.saturating_sub((node.depth as u8).saturating_mul(24));
            let color = Rgb([shade, shade.saturating_add(10), 240]);
            let xs = x0.max(0.0) as u32..((x0 + node.size.0).max(0.0) as u32).min(width);
            let ys = y0.max(0.0) as u32..((y0 + node.size.1).max(0.0) as u32).min(height);
            for y in ys {
                for x in xs.clone() {
                    img.put_pixel(x, y, color);
                }
            }
        }

        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| ProofError::driver(format!("PNG encoding failed: {e}")))?;
        Ok(bytes)
    }
}

fn origin_of(url: &str) -> String {
    match url.find("://") {
        Some(idx) => {
            let host_end = url[idx + 3..]
                .find(['/', '?', '#'])
                .map_or(url.len(), |p| p + idx + 3);
            url[..host_end].to_string()
        }
        None => String::new(),
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> ProofResult<NavigationOutcome> {
        self.ensure_open()?;
        self.shared.record(format!("navigate:{url}"));

        let now = Instant::now();
        self.url = url.to_string();
        self.origin = origin_of(url);
        self.loaded_at = now;
        self.nodes.clear();
        self.requests.clear();
        self.scroll = (0.0, 0.0);
        self.hovered = None;
        self.pressed = None;
        self.focused = None;

        let document_rule = self
            .interception
            .as_ref()
            .and_then(|(registry, log)| registry.intercept(HttpMethod::Get, url, log).cloned());
        if let Some(rule) = document_rule {
            self.long_poll = false;
            return Ok(NavigationOutcome {
                status: Some(rule.status),
                url: url.to_string(),
            });
        }

        let Some(page) = self.site.get(url_path(url)).cloned() else {
            self.long_poll = false;
            return Ok(NavigationOutcome {
                status: Some(404),
                url: url.to_string(),
            });
        };

        self.network_delay = page.network_delay;
        self.long_poll = page.long_poll;
        let mut results = FetchResults::default();
        for (method, path) in &page.fetches {
            let result = self.request(*method, path);
            results.insert(path.clone(), result);
        }
        let nodes = (page.render)(&results);
        self.append(&nodes, None, 0, now + page.network_delay);
        for (level, text) in &page.console {
            self.emit(*level, text);
        }

        Ok(NavigationOutcome {
            status: Some(page.status),
            url: url.to_string(),
        })
    }

    async fn current_url(&self) -> ProofResult<String> {
        self.ensure_open()?;
        Ok(self.url.clone())
    }

    async fn network_activity(&self) -> ProofResult<NetworkActivity> {
        self.ensure_open()?;
        let now = Instant::now();
        let pending = self.requests.iter().filter(|done| **done > now).count();
        let last = self
            .requests
            .iter()
            .copied()
            .filter(|done| *done <= now)
            .fold(self.loaded_at, Instant::max);
        Ok(NetworkActivity {
            in_flight: pending + usize::from(self.long_poll),
            idle_for: now - last,
        })
    }

    async fn query(&self, selector: &Selector) -> ProofResult<Vec<ElementHandle>> {
        self.ensure_open()?;
        let css = CssSelector::parse(selector.css())?;
        let now = Instant::now();
        let candidates: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| {
                self.is_attached(idx, now)
                    && css.matches(&self.nodes[idx], self.ancestors(idx))
                    && selector.text_matches(&self.text_of(idx, now))
            })
            .collect();
        let chosen = candidates.iter().copied().filter(|&idx| {
            !selector.prefers_innermost()
                || !candidates.iter().any(|&other| {
                    other != idx && self.ancestors(other).any(|a| a.uid == self.nodes[idx].uid)
                })
        });
        Ok(chosen.map(|idx| self.handle(idx, selector, now)).collect())
    }

    async fn bounding_box(&self, element: &ElementHandle) -> ProofResult<Option<BoundingBox>> {
        self.ensure_open()?;
        let now = Instant::now();
        Ok(self
            .index_of(element)
            .filter(|&idx| self.is_attached(idx, now))
            .map(|idx| self.layout(idx)))
    }

    async fn is_visible(&self, element: &ElementHandle) -> ProofResult<bool> {
        self.ensure_open()?;
        let now = Instant::now();
        Ok(self
            .index_of(element)
            .is_some_and(|idx| self.is_rendered(idx, now) && !self.layout(idx).is_zero_area()))
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> ProofResult<Option<String>> {
        self.ensure_open()?;
        let now = Instant::now();
        let Some(idx) = self.index_of(element).filter(|&idx| self.is_attached(idx, now)) else {
            return Ok(None);
        };
        let node = &self.nodes[idx];
        let flag = |state: Option<u64>| (state == Some(node.uid)).then(|| "true".to_string());
        Ok(match name {
            "data-hovered" => flag(self.hovered),
            "data-pressed" => flag(self.pressed),
            "data-focused" => flag(self.focused),
            "value" if matches!(node.tag.as_str(), "input" | "textarea") => Some(node.value.clone()),
            _ => node.attr(name).map(str::to_string),
        })
    }

    async fn mouse_move(&mut self, point: Point) -> ProofResult<()> {
        self.ensure_open()?;
        self.shared.record(format!("mouse_move:{},{}", point.x, point.y));
        let target = self.hit_test(point, Instant::now());
        self.hovered = target.map(|idx| self.nodes[idx].uid);
        self.pointer(PointerKind::Move, point, target);
        Ok(())
    }

    async fn mouse_down(&mut self, point: Point) -> ProofResult<()> {
        self.ensure_open()?;
        self.shared.record(format!("mouse_down:{},{}", point.x, point.y));
        let target = self.hit_test(point, Instant::now());
        self.pressed = target.map(|idx| self.nodes[idx].uid);
        self.focused = self.pressed;
        self.pointer(PointerKind::Down, point, target);
        Ok(())
    }

    async fn mouse_up(&mut self, point: Point) -> ProofResult<()> {
        self.ensure_open()?;
        self.shared.record(format!("mouse_up:{},{}", point.x, point.y));
        let target = self.hit_test(point, Instant::now());
        self.pointer(PointerKind::Up, point, target);
        let released_on = target.map(|idx| self.nodes[idx].uid);
        if let (Some(pressed), Some(released)) = (self.pressed.take(), released_on) {
            if pressed == released {
                self.trigger(pressed, &Trigger::Click);
            }
        }
        Ok(())
    }

    async fn wheel(&mut self, point: Point, delta_x: f32, delta_y: f32) -> ProofResult<()> {
        self.ensure_open()?;
        self.shared.record(format!("wheel:{delta_x},{delta_y}"));
        self.scroll.0 = (self.scroll.0 + delta_x).max(0.0);
        self.scroll.1 = (self.scroll.1 + delta_y).max(0.0);
        self.pointer(PointerKind::Wheel, point, None);
        Ok(())
    }

    async fn insert_text(&mut self, text: &str) -> ProofResult<()> {
        self.ensure_open()?;
        self.shared.record(format!("insert_text:{text}"));
        if let Some(uid) = self.focused {
            if let Some(node) = self.nodes.iter_mut().find(|n| n.uid == uid) {
                node.value.push_str(text);
            }
        }
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> ProofResult<()> {
        self.ensure_open()?;
        self.shared.record(format!("press_key:{key}"));
        if let Some(uid) = self.focused {
            self.trigger(uid, &Trigger::Key(key.to_string()));
        }
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> ProofResult<()> {
        self.ensure_open()?;
        viewport.validate()?;
        self.shared.record(format!("set_viewport:{viewport}"));
        self.viewport = viewport;
        Ok(())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn screenshot(&self, full_page: bool) -> ProofResult<Vec<u8>> {
        self.ensure_open()?;
        self.shared.record(format!("screenshot:full_page={full_page}"));
        if self.fail_screenshots {
            return Err(ProofError::driver("screenshot failed: compositor unavailable"));
        }
        self.render_png(full_page)
    }

    async fn install_interception(
        &mut self,
        registry: Arc<MockRegistry>,
        log: InterceptionLog,
    ) -> ProofResult<()> {
        self.ensure_open()?;
        self.shared.record(format!("install_interception:{}", registry.len()));
        self.interception = Some((registry, log));
        Ok(())
    }

    async fn capture_console(&mut self, log: ConsoleLog) -> ProofResult<()> {
        self.ensure_open()?;
        self.shared.record("capture_console");
        self.console = Some(log);
        Ok(())
    }

    async fn close(&mut self) -> ProofResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.shared.closed.fetch_add(1, Ordering::SeqCst);
        self.shared.record("close");
        if self.fail_close {
            return Err(ProofError::lifecycle(
                LifecyclePhase::Close,
                "browser process did not exit cleanly",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::network::MockRule;
    use serde_json::json;

    fn site() -> MockSite {
        MockSite::new().page(
            "/live",
            MockPage::new(|data| {
                let live = data.json("/api/live").and_then(|v| v["live"].as_bool()).unwrap_or(false);
                vec![MockNode::new("main").child(
                    MockNode::new("span")
                        .class("badge")
                        .text(if live { "LIVE" } else { "offline" }),
                )]
            })
            .fetch("/api/live")
            .network_delay(Duration::from_millis(100)),
        )
    }

    async fn open(launcher: &MockLauncher, rules: Vec<MockRule>) -> (Box<dyn PageDriver>, InterceptionLog) {
        let mut driver = launcher.launch(&SessionConfig::new().with_viewport(320, 240)).await.unwrap();
        let log = InterceptionLog::new();
        let registry = Arc::new(MockRegistry::from_rules(rules).unwrap());
        driver.install_interception(registry, log.clone()).await.unwrap();
        (driver, log)
    }

    mod launcher_tests {
        use super::*;

        #[tokio::test]
        async fn test_launch_failure() {
            let launcher = MockLauncher::new(MockSite::new()).with_launch_failure("no chromium");
            let err = launcher.launch(&SessionConfig::default()).await.unwrap_err();
            assert!(matches!(err, ProofError::SessionLifecycle { phase: LifecyclePhase::Open, .. }));
            assert_eq!(launcher.launched(), 0);
        }

        #[tokio::test]
        async fn test_close_is_counted_once() {
            let launcher = MockLauncher::new(MockSite::new());
            let mut driver = launcher.launch(&SessionConfig::default()).await.unwrap();
            assert_eq!(launcher.open_pages(), 1);
            driver.close().await.unwrap();
            driver.close().await.unwrap();
            assert_eq!(launcher.closed(), 1);
            assert_eq!(launcher.open_pages(), 0);
            assert!(driver.current_url().await.is_err());
        }
    }

    mod page_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_content_rendered_from_mocked_data() {
            let launcher = MockLauncher::new(site());
            let (mut driver, log) =
                open(&launcher, vec![MockRule::json("/api/live", &json!({"live": true}))]).await;
            let outcome = driver.navigate("http://app.test/live").await.unwrap();
            assert_eq!(outcome.status, Some(200));

            let badge = Selector::parse(".badge").unwrap();
            assert!(driver.query(&badge).await.unwrap().is_empty());
            assert_eq!(driver.network_activity().await.unwrap().in_flight, 1);

            tokio::time::sleep(Duration::from_millis(100)).await;
            let found = driver.query(&badge).await.unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].text, "LIVE");
            assert!(found[0].visible);

            let entries = log.entries();
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[1].url, "http://app.test/api/live");
            assert_eq!(entries[1].matched.as_deref(), Some("/api/live"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_unmatched_fetch_passes_through() {
            let launcher = MockLauncher::new(site());
            let (mut driver, log) = open(&launcher, vec![]).await;
            driver.navigate("http://app.test/live").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            let found = driver.query(&Selector::parse("text=offline").unwrap()).await.unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].tag, "span");
            assert!(log.mocked().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn test_unknown_path_is_404() {
            let launcher = MockLauncher::new(site());
            let (mut driver, _) = open(&launcher, vec![]).await;
            let outcome = driver.navigate("http://app.test/missing").await.unwrap();
            assert_eq!(outcome.status, Some(404));
        }

        #[tokio::test(start_paused = true)]
        async fn test_screenshot_is_png_of_viewport() {
            let launcher = MockLauncher::new(site());
            let (mut driver, _) = open(&launcher, vec![]).await;
            driver.navigate("http://app.test/live").await.unwrap();
            let png = driver.screenshot(false).await.unwrap();
            let dims = image::ImageReader::new(Cursor::new(png))
                .with_guessed_format()
                .unwrap()
                .into_dimensions()
                .unwrap();
            assert_eq!(dims, (320, 240));
        }
    }

    mod pointer_tests {
        use super::*;

        fn button_site() -> MockSite {
            MockSite::new().page(
                "/",
                MockPage::fixed(vec![
                    MockNode::new("button").id("open").text("Open").on_click(Reaction::Reveal {
                        nodes: vec![MockNode::new("div").attr("role", "dialog").text("Details")],
                        after: Duration::from_millis(150),
                    }),
                ])
                .network_delay(Duration::ZERO),
            )
        }

        #[tokio::test(start_paused = true)]
        async fn test_press_and_release_triggers_click() {
            let launcher = MockLauncher::new(button_site());
            let (mut driver, _) = open(&launcher, vec![]).await;
            driver.navigate("/").await.unwrap();
            let button = driver.query(&Selector::parse("#open").unwrap()).await.unwrap().remove(0);
            let center = button.bounding_box.unwrap().center();

            driver.mouse_move(center).await.unwrap();
            driver.mouse_down(center).await.unwrap();
            assert_eq!(driver.attribute(&button, "data-pressed").await.unwrap().as_deref(), Some("true"));
            driver.mouse_up(center).await.unwrap();
            assert_eq!(driver.attribute(&button, "data-pressed").await.unwrap(), None);
            assert_eq!(driver.attribute(&button, "data-hovered").await.unwrap().as_deref(), Some("true"));

            let dialog = Selector::parse("[role=dialog]").unwrap();
            assert!(driver.query(&dialog).await.unwrap().is_empty());
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert_eq!(driver.query(&dialog).await.unwrap().len(), 1);

            let kinds: Vec<PointerKind> = launcher.pointer_events().iter().map(|e| e.kind).collect();
            assert_eq!(kinds, vec![PointerKind::Move, PointerKind::Down, PointerKind::Up]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_scripted_console_reaches_log() {
            let site = MockSite::new().page(
                "/",
                MockPage::fixed(vec![MockNode::new("button").id("save").text("Save").on_click(
                    Reaction::Console {
                        level: ConsoleLevel::PageError,
                        text: "TypeError: save is not a function".into(),
                    },
                )])
                .console(ConsoleLevel::Warning, "deprecated API")
                .network_delay(Duration::ZERO),
            );
            let launcher = MockLauncher::new(site);
            let (mut driver, _) = open(&launcher, vec![]).await;
            let console = ConsoleLog::new();
            driver.capture_console(console.clone()).await.unwrap();

            driver.navigate("http://app.test/").await.unwrap();
            assert_eq!(console.len(), 1);
            assert_eq!(console.entries()[0].level, ConsoleLevel::Warning);

            let save = driver.query(&Selector::parse("#save").unwrap()).await.unwrap().remove(0);
            let center = save.bounding_box.unwrap().center();
            driver.mouse_down(center).await.unwrap();
            driver.mouse_up(center).await.unwrap();

            let errors = console.errors();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].text, "TypeError: save is not a function");
            assert_eq!(errors[0].url.as_deref(), Some("http://app.test/"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_console_dropped_without_capture() {
            let site = MockSite::new().page("/", MockPage::fixed(vec![]).page_error("boom"));
            let launcher = MockLauncher::new(site);
            let (mut driver, _) = open(&launcher, vec![]).await;
            driver.navigate("/").await.unwrap();
            assert!(!launcher.was_called("capture_console"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_navigation_detaches_old_handles() {
            let launcher = MockLauncher::new(button_site());
            let (mut driver, _) = open(&launcher, vec![]).await;
            driver.navigate("/").await.unwrap();
            let button = driver.query(&Selector::parse("button").unwrap()).await.unwrap().remove(0);
            driver.navigate("/").await.unwrap();
            assert!(driver.bounding_box(&button).await.unwrap().is_none());
            assert!(!driver.is_visible(&button).await.unwrap());
        }
    }
}
