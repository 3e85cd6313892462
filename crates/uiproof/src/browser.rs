//! Chromium over CDP.
//!
//! [`CdpLauncher`] starts a Chromium process through chromiumoxide and hands
//! out one [`CdpDriver`] page per session. The page's traffic is paused in
//! the CDP Fetch domain and either fulfilled from the [`MockRegistry`] or let
//! through; Network domain events feed idle detection and Runtime domain
//! events feed the console log. Element queries run
//! one injected script per call and tag matches with `data-uiproof-id` so
//! later calls can find the same node.

use crate::config::{SessionConfig, Viewport};
use crate::console::{ConsoleEntry, ConsoleLevel, ConsoleLog};
use crate::driver::{BrowserLauncher, ElementHandle, NavigationOutcome, NetworkActivity, PageDriver};
use crate::locator::{BoundingBox, Point, Selector};
use crate::network::{HttpMethod, InterceptionLog, MockRegistry};
use crate::result::{LifecyclePhase, ProofError, ProofResult};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::Rect;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams as FetchEnableParams, EventRequestPaused,
    FulfillRequestParams, HeaderEntry,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent, EventResponseReceived, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, GetLayoutMetricsParams,
    Viewport as ClipViewport,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    EnableParams as RuntimeEnableParams, EventConsoleApiCalled, EventExceptionThrown,
    RemoteObject,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const ID_ATTRIBUTE: &str = "data-uiproof-id";

/// How long a browser gets to exit after a clean close before it is killed
const EXIT_GRACE: Duration = Duration::from_secs(5);

fn cdp_err(err: impl std::fmt::Display) -> ProofError {
    ProofError::driver(err.to_string())
}

// =============================================================================
// LAUNCHER
// =============================================================================

/// Launches Chromium
#[derive(Debug, Clone, Copy, Default)]
pub struct CdpLauncher;

impl CdpLauncher {
    /// Create a launcher
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for CdpLauncher {
    async fn launch(&self, config: &SessionConfig) -> ProofResult<Box<dyn PageDriver>> {
        let open_err = |e: &dyn std::fmt::Display| ProofError::lifecycle(LifecyclePhase::Open, e.to_string());

        let mut builder = BrowserConfig::builder()
            .window_size(config.viewport.width, config.viewport.height)
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder.build().map_err(|e| open_err(&e))?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| open_err(&e))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match prepare_page(&browser, config).await {
            Ok(page) => page,
            Err(err) => {
                if let Err(close_err) = browser.close().await {
                    tracing::warn!(error = %close_err, "browser close after failed launch");
                }
                handler_task.abort();
                return Err(open_err(&err));
            }
        };

        tracing::info!(viewport = %config.viewport, headless = config.headless, "chromium launched");
        Ok(Box::new(CdpDriver {
            browser: Some(browser),
            page,
            viewport: config.viewport,
            network: Arc::new(Mutex::new(NetworkState::new())),
            tasks: vec![handler_task],
        }))
    }
}

async fn prepare_page(browser: &Browser, config: &SessionConfig) -> ProofResult<Page> {
    let page = browser.new_page("about:blank").await.map_err(cdp_err)?;
    page.execute(device_metrics(config.viewport))
        .await
        .map_err(cdp_err)?;
    if let Some(user_agent) = &config.user_agent {
        page.execute(SetUserAgentOverrideParams::new(user_agent.clone()))
            .await
            .map_err(cdp_err)?;
    }
    Ok(page)
}

fn device_metrics(viewport: Viewport) -> SetDeviceMetricsOverrideParams {
    SetDeviceMetricsOverrideParams::new(
        i64::from(viewport.width),
        i64::from(viewport.height),
        1.0,
        false,
    )
}

// =============================================================================
// NETWORK STATE
// =============================================================================

#[derive(Debug)]
struct NetworkState {
    in_flight: HashSet<String>,
    last_change: Instant,
    document_status: Option<u16>,
}

impl NetworkState {
    fn new() -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: Instant::now(),
            document_status: None,
        }
    }

    fn started(&mut self, id: &str) {
        self.in_flight.insert(id.to_string());
        self.last_change = Instant::now();
    }

    fn finished(&mut self, id: &str) {
        if self.in_flight.remove(id) {
            self.last_change = Instant::now();
        }
    }
}

fn with_state(state: &Mutex<NetworkState>, f: impl FnOnce(&mut NetworkState)) {
    if let Ok(mut state) = state.lock() {
        f(&mut state);
    }
}

// =============================================================================
// DRIVER
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawElement {
    id: String,
    tag: String,
    text: String,
    visible: bool,
    #[serde(rename = "box")]
    bounding_box: Option<BoundingBox>,
}

/// One Chromium page
pub struct CdpDriver {
    browser: Option<Browser>,
    page: Page,
    viewport: Viewport,
    network: Arc<Mutex<NetworkState>>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for CdpDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpDriver")
            .field("open", &self.browser.is_some())
            .field("viewport", &self.viewport)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl CdpDriver {
    fn ensure_open(&self) -> ProofResult<()> {
        if self.browser.is_some() {
            Ok(())
        } else {
            Err(ProofError::driver("page is closed"))
        }
    }

    /// Evaluate `expr` in the page and decode its JSON-serialised value
    async fn eval_json<T: DeserializeOwned>(&self, expr: &str) -> ProofResult<T> {
        self.ensure_open()?;
        let raw: String = self
            .page
            .evaluate(format!("JSON.stringify(({expr}) ?? null)"))
            .await
            .map_err(cdp_err)?
            .into_value()
            .map_err(cdp_err)?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn mouse(&self, kind: DispatchMouseEventType, point: Point) -> ProofResult<()> {
        self.ensure_open()?;
        let mut params = DispatchMouseEventParams::builder()
            .r#type(kind.clone())
            .x(f64::from(point.x))
            .y(f64::from(point.y));
        if matches!(
            kind,
            DispatchMouseEventType::MousePressed | DispatchMouseEventType::MouseReleased
        ) {
            params = params.button(MouseButton::Left).click_count(1);
        }
        let params = params.build().map_err(cdp_err)?;
        self.page.execute(params).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn key_event(&self, kind: DispatchKeyEventType, key: &str) -> ProofResult<()> {
        let (code, virtual_key, text) = key_definition(key);
        let mut params = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(key)
            .code(code);
        if let Some(virtual_key) = virtual_key {
            params = params.windows_virtual_key_code(virtual_key);
        }
        if let (DispatchKeyEventType::KeyDown, Some(text)) = (kind, text) {
            params = params.text(text);
        }
        let params = params.build().map_err(cdp_err)?;
        self.page.execute(params).await.map_err(cdp_err)?;
        Ok(())
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(task));
    }

    async fn track_network(&mut self) -> ProofResult<()> {
        self.page
            .execute(NetworkEnableParams::default())
            .await
            .map_err(cdp_err)?;

        let mut sent = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(cdp_err)?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(cdp_err)?;
        let mut failed = self
            .page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(cdp_err)?;
        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(cdp_err)?;

        let state = Arc::clone(&self.network);
        self.spawn(async move {
            while let Some(event) = sent.next().await {
                with_state(&state, |s| s.started(event.request_id.inner()));
            }
        });
        let state = Arc::clone(&self.network);
        self.spawn(async move {
            while let Some(event) = finished.next().await {
                with_state(&state, |s| s.finished(event.request_id.inner()));
            }
        });
        let state = Arc::clone(&self.network);
        self.spawn(async move {
            while let Some(event) = failed.next().await {
                with_state(&state, |s| s.finished(event.request_id.inner()));
            }
        });
        let state = Arc::clone(&self.network);
        self.spawn(async move {
            while let Some(event) = responses.next().await {
                if event.r#type == ResourceType::Document {
                    let status = u16::try_from(event.response.status).ok();
                    with_state(&state, |s| s.document_status = status);
                }
            }
        });
        Ok(())
    }
}

/// Await process exit for at most `grace`
async fn wait_for_exit<F, T, E>(wait: F, grace: Duration) -> Result<(), String>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(grace, wait).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err(format!("browser did not exit within {}s", grace.as_secs())),
    }
}

/// Render console arguments the way devtools prints them, space separated
fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| match (&arg.value, &arg.description) {
            (Some(serde_json::Value::String(text)), _) => text.clone(),
            (Some(value), _) => value.to_string(),
            (None, Some(description)) => description.clone(),
            (None, None) => arg
                .unserializable_value
                .as_ref()
                .map_or_else(|| "undefined".to_string(), |v| v.inner().clone()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn element_js(handle: &ElementHandle) -> String {
    let css = format!("[{ID_ATTRIBUTE}=\"{}\"]", handle.id);
    format!(
        "document.querySelector({})",
        serde_json::Value::String(css)
    )
}

const VISIBLE_JS: &str = "(el) => { const r = el.getBoundingClientRect(); \
    const s = getComputedStyle(el); \
    return el.isConnected && r.width > 0 && r.height > 0 && s.display !== 'none' \
    && s.visibility !== 'hidden' && Number(s.opacity) !== 0; }";

/// CDP key code, Windows virtual key and produced text for common keys
fn key_definition(key: &str) -> (String, Option<i64>, Option<String>) {
    match key {
        "Enter" => ("Enter".into(), Some(13), Some("\r".into())),
        "Tab" => ("Tab".into(), Some(9), None),
        "Escape" => ("Escape".into(), Some(27), None),
        "Backspace" => ("Backspace".into(), Some(8), None),
        "Delete" => ("Delete".into(), Some(46), None),
        "Space" | " " => ("Space".into(), Some(32), Some(" ".into())),
        "ArrowLeft" => ("ArrowLeft".into(), Some(37), None),
        "ArrowUp" => ("ArrowUp".into(), Some(38), None),
        "ArrowRight" => ("ArrowRight".into(), Some(39), None),
        "ArrowDown" => ("ArrowDown".into(), Some(40), None),
        "Home" => ("Home".into(), Some(36), None),
        "End" => ("End".into(), Some(35), None),
        "PageUp" => ("PageUp".into(), Some(33), None),
        "PageDown" => ("PageDown".into(), Some(34), None),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => (
                    format!("Key{}", c.to_ascii_uppercase()),
                    Some(i64::from(c.to_ascii_uppercase() as u8)),
                    Some(other.to_string()),
                ),
                (Some(c), None) if c.is_ascii_digit() => (
                    format!("Digit{c}"),
                    Some(i64::from(c as u8)),
                    Some(other.to_string()),
                ),
                _ => (other.to_string(), None, None),
            }
        }
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn navigate(&mut self, url: &str) -> ProofResult<NavigationOutcome> {
        self.ensure_open()?;
        with_state(&self.network, |s| s.document_status = None);
        self.page.goto(url).await.map_err(cdp_err)?;
        let final_url = self.current_url().await?;
        let status = self.network.lock().map(|s| s.document_status).unwrap_or_default();
        Ok(NavigationOutcome {
            status,
            url: final_url,
        })
    }

    async fn current_url(&self) -> ProofResult<String> {
        self.ensure_open()?;
        Ok(self.page.url().await.map_err(cdp_err)?.unwrap_or_default())
    }

    async fn network_activity(&self) -> ProofResult<NetworkActivity> {
        self.ensure_open()?;
        let state = self
            .network
            .lock()
            .map_err(|_| ProofError::driver("network state poisoned"))?;
        Ok(NetworkActivity {
            in_flight: state.in_flight.len(),
            idle_for: state.last_change.elapsed(),
        })
    }

    async fn query(&self, selector: &Selector) -> ProofResult<Vec<ElementHandle>> {
        let script = format!(
            "(() => {{ const visible = {VISIBLE_JS}; \
             window.__uiproofSeq = window.__uiproofSeq || 0; \
             return ({candidates}).map((el) => {{ \
               if (!el.hasAttribute('{ID_ATTRIBUTE}')) {{ el.setAttribute('{ID_ATTRIBUTE}', String(++window.__uiproofSeq)); }} \
               const r = el.getBoundingClientRect(); const v = visible(el); \
               return {{ id: el.getAttribute('{ID_ATTRIBUTE}'), tag: el.tagName.toLowerCase(), \
                 text: (el.innerText ?? el.textContent ?? '').replace(/\\s+/g, ' ').trim(), visible: v, \
                 box: v ? {{ x: r.x, y: r.y, width: r.width, height: r.height }} : null }}; \
             }}); }})()",
            candidates = selector.to_candidates_js(),
        );
        let raw: Vec<RawElement> = self.eval_json(&script).await?;
        Ok(raw
            .into_iter()
            .map(|el| ElementHandle {
                id: el.id,
                selector: selector.as_str().to_string(),
                tag: el.tag,
                text: el.text,
                visible: el.visible,
                bounding_box: el.bounding_box,
            })
            .collect())
    }

    async fn bounding_box(&self, element: &ElementHandle) -> ProofResult<Option<BoundingBox>> {
        let script = format!(
            "(() => {{ const el = {}; if (!el || !el.isConnected) return null; \
             el.scrollIntoView({{ block: 'center', inline: 'center' }}); \
             const r = el.getBoundingClientRect(); \
             return {{ x: r.x, y: r.y, width: r.width, height: r.height }}; }})()",
            element_js(element)
        );
        self.eval_json(&script).await
    }

    async fn is_visible(&self, element: &ElementHandle) -> ProofResult<bool> {
        let script = format!(
            "(() => {{ const el = {}; return !!el && ({VISIBLE_JS})(el); }})()",
            element_js(element)
        );
        self.eval_json(&script).await
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> ProofResult<Option<String>> {
        let name = serde_json::Value::String(name.to_string());
        let script = format!(
            "(() => {{ const el = {}; if (!el || !el.isConnected) return null; \
             const name = {name}; \
             if (name === 'value' && 'value' in el) return String(el.value); \
             return el.getAttribute(name); }})()",
            element_js(element)
        );
        self.eval_json(&script).await
    }

    async fn mouse_move(&mut self, point: Point) -> ProofResult<()> {
        self.mouse(DispatchMouseEventType::MouseMoved, point).await
    }

    async fn mouse_down(&mut self, point: Point) -> ProofResult<()> {
        self.mouse(DispatchMouseEventType::MousePressed, point).await
    }

    async fn mouse_up(&mut self, point: Point) -> ProofResult<()> {
        self.mouse(DispatchMouseEventType::MouseReleased, point).await
    }

    async fn wheel(&mut self, point: Point, delta_x: f32, delta_y: f32) -> ProofResult<()> {
        self.ensure_open()?;
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(f64::from(point.x))
            .y(f64::from(point.y))
            .delta_x(f64::from(delta_x))
            .delta_y(f64::from(delta_y))
            .build()
            .map_err(cdp_err)?;
        self.page.execute(params).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn insert_text(&mut self, text: &str) -> ProofResult<()> {
        self.ensure_open()?;
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(cdp_err)?;
        Ok(())
    }

    async fn press_key(&mut self, key: &str) -> ProofResult<()> {
        self.ensure_open()?;
        self.key_event(DispatchKeyEventType::KeyDown, key).await?;
        self.key_event(DispatchKeyEventType::KeyUp, key).await
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> ProofResult<()> {
        self.ensure_open()?;
        self.page
            .execute(device_metrics(viewport))
            .await
            .map_err(cdp_err)?;
        self.viewport = viewport;
        Ok(())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn screenshot(&self, full_page: bool) -> ProofResult<Vec<u8>> {
        self.ensure_open()?;
        let mut params = CaptureScreenshotParams::builder().format(CaptureScreenshotFormat::Png);
        if full_page {
            let metrics = self
                .page
                .execute(GetLayoutMetricsParams::default())
                .await
                .map_err(cdp_err)?;
            let Rect { width, height, .. } = metrics.css_content_size.clone();
            let clip = ClipViewport::builder()
                .x(0.0)
                .y(0.0)
                .width(width)
                .height(height)
                .scale(1.0)
                .build()
                .map_err(cdp_err)?;
            params = params.capture_beyond_viewport(true).clip(clip);
        }
        let shot = self.page.execute(params.build()).await.map_err(cdp_err)?;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(cdp_err)
    }

    async fn install_interception(
        &mut self,
        registry: Arc<MockRegistry>,
        log: InterceptionLog,
    ) -> ProofResult<()> {
        self.ensure_open()?;
        self.track_network().await?;

        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(cdp_err)?;
        self.page
            .execute(FetchEnableParams::default())
            .await
            .map_err(cdp_err)?;

        let page = self.page.clone();
        self.spawn(async move {
            while let Some(event) = paused.next().await {
                let method = HttpMethod::parse(&event.request.method);
                let outcome = match registry.intercept(method, &event.request.url, &log) {
                    Some(rule) => {
                        let headers = rule
                            .response_headers()
                            .into_iter()
                            .map(|(name, value)| HeaderEntry::new(name, value))
                            .collect::<Vec<_>>();
                        let body = base64::engine::general_purpose::STANDARD.encode(&rule.body);
                        match FulfillRequestParams::builder()
                            .request_id(event.request_id.clone())
                            .response_code(i64::from(rule.status))
                            .response_headers(headers)
                            .body(body)
                            .build()
                        {
                            Ok(params) => page.execute(params).await.map(|_| ()),
                            Err(err) => {
                                tracing::warn!(error = %err, "invalid fulfil params");
                                page.execute(ContinueRequestParams::new(event.request_id.clone()))
                                    .await
                                    .map(|_| ())
                            }
                        }
                    }
                    None => page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ()),
                };
                if let Err(err) = outcome {
                    tracing::debug!(error = %err, url = %event.request.url, "paused request not resumed");
                }
            }
        });
        tracing::debug!(tasks = self.tasks.len(), "request interception installed");
        Ok(())
    }

    async fn capture_console(&mut self, log: ConsoleLog) -> ProofResult<()> {
        self.ensure_open()?;
        let mut calls = self
            .page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(cdp_err)?;
        let mut exceptions = self
            .page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(cdp_err)?;
        self.page
            .execute(RuntimeEnableParams::default())
            .await
            .map_err(cdp_err)?;

        let console = log.clone();
        self.spawn(async move {
            while let Some(event) = calls.next().await {
                let level = ConsoleLevel::from_api_type(event.r#type.as_ref());
                console.record(ConsoleEntry::new(level, console_text(&event.args)));
            }
        });
        self.spawn(async move {
            while let Some(event) = exceptions.next().await {
                let details = &event.exception_details;
                let text = details
                    .exception
                    .as_ref()
                    .and_then(|e| e.description.clone())
                    .unwrap_or_else(|| details.text.clone());
                let mut entry = ConsoleEntry::new(ConsoleLevel::PageError, text);
                if let Some(url) = &details.url {
                    entry = entry.with_url(url.clone());
                }
                log.record(entry);
            }
        });
        tracing::debug!("console capture installed");
        Ok(())
    }

    async fn close(&mut self) -> ProofResult<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        let closed = browser.close().await.map(|_| ());
        // a failed close usually means the connection is gone and the
        // process will never exit on its own
        let exited = match &closed {
            Ok(()) => wait_for_exit(browser.wait(), EXIT_GRACE).await,
            Err(_) => Err(String::new()),
        };
        if exited.is_err() {
            match browser.kill().await {
                Some(Err(err)) => tracing::warn!(error = %err, "killing browser failed"),
                _ => tracing::debug!("browser killed"),
            }
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        closed.map_err(|e| ProofError::lifecycle(LifecyclePhase::Close, e.to_string()))?;
        exited.map_err(|message| ProofError::lifecycle(LifecyclePhase::Close, message))
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod key_tests {
        use super::*;

        #[test]
        fn test_named_keys() {
            assert_eq!(key_definition("Enter"), ("Enter".into(), Some(13), Some("\r".into())));
            assert_eq!(key_definition("Escape").1, Some(27));
        }

        #[test]
        fn test_printable_keys() {
            assert_eq!(key_definition("a"), ("KeyA".into(), Some(65), Some("a".into())));
            assert_eq!(key_definition("7"), ("Digit7".into(), Some(55), Some("7".into())));
            assert_eq!(key_definition("F5"), ("F5".into(), None, None));
        }
    }

    mod network_state_tests {
        use super::*;

        #[test]
        fn test_in_flight_tracking() {
            let mut state = NetworkState::new();
            state.started("1");
            state.started("1");
            state.started("2");
            assert_eq!(state.in_flight.len(), 2);
            state.finished("1");
            state.finished("unknown");
            assert_eq!(state.in_flight.len(), 1);
        }
    }

    mod close_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_exit_wait_is_bounded() {
            let hung = std::future::pending::<Result<(), std::io::Error>>();
            let err = wait_for_exit(hung, EXIT_GRACE).await.unwrap_err();
            assert!(err.contains("did not exit within 5s"));
        }

        #[tokio::test]
        async fn test_exit_wait_reports_wait_error() {
            let failed = async { Err::<(), _>(std::io::Error::other("no such process")) };
            assert_eq!(wait_for_exit(failed, EXIT_GRACE).await.unwrap_err(), "no such process");
            assert!(wait_for_exit(async { Ok::<_, std::io::Error>(7) }, EXIT_GRACE).await.is_ok());
        }
    }

    mod console_tests {
        use super::*;

        fn arg(json: serde_json::Value) -> RemoteObject {
            serde_json::from_value(json).unwrap()
        }

        #[test]
        fn test_console_text_joins_arguments() {
            let args = vec![
                arg(serde_json::json!({ "type": "string", "value": "loaded" })),
                arg(serde_json::json!({ "type": "number", "value": 3 })),
                arg(serde_json::json!({ "type": "object", "description": "Array(2)" })),
            ];
            assert_eq!(console_text(&args), "loaded 3 Array(2)");
        }
    }

    #[test]
    fn test_element_lookup_script() {
        let handle = ElementHandle::new("7", ".a", "div");
        assert_eq!(
            element_js(&handle),
            r#"document.querySelector("[data-uiproof-id=\"7\"]")"#
        );
    }
}
