//! Harness and session configuration.

use crate::result::{ProofError, ProofResult};
use crate::scenario::{Step, StepKind};
use crate::wait::ReadyCondition;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default per-step timeout (5 seconds)
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 5_000;

/// Default assertion polling interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// How long `locate` looks for an element before reporting it absent
pub const DEFAULT_EXISTENCE_CHECK_MS: u64 = 250;

/// Upper bound for a navigation's ready wait
pub const DEFAULT_NAVIGATION_CAP_MS: u64 = 30_000;

/// Largest accepted viewport edge in pixels
pub const MAX_VIEWPORT_DIMENSION: u32 = 10_000;

// =============================================================================
// VIEWPORT
// =============================================================================

/// Browser viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Reject zero or oversized dimensions
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending size.
    pub fn validate(&self) -> ProofResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ProofError::configuration(format!(
                "viewport {self} has a zero dimension"
            )));
        }
        if self.width > MAX_VIEWPORT_DIMENSION || self.height > MAX_VIEWPORT_DIMENSION {
            return Err(ProofError::configuration(format!(
                "viewport {self} exceeds {MAX_VIEWPORT_DIMENSION}px"
            )));
        }
        Ok(())
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Viewport {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ProofError::configuration(format!("invalid viewport '{s}', expected WxH"));
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(bad)?;
        let width = w.trim().parse::<u32>().map_err(|_| bad())?;
        let height = h.trim().parse::<u32>().map_err(|_| bad())?;
        let viewport = Self::new(width, height);
        viewport.validate()?;
        Ok(viewport)
    }
}

// =============================================================================
// SESSION CONFIG
// =============================================================================

/// How a browser session is launched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Viewport size
    pub viewport: Viewport,
    /// User agent override
    pub user_agent: Option<String>,
    /// Run without a visible window
    pub headless: bool,
    /// Explicit Chromium executable
    pub chromium_path: Option<PathBuf>,
    /// Keep the Chromium sandbox on (disable inside some containers)
    pub sandbox: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            user_agent: None,
            headless: true,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl SessionConfig {
    /// Create a default session config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set viewport
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport::new(width, height);
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set Chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Enable or disable the sandbox
    #[must_use]
    pub const fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Check the config before anything is launched
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid viewport or an empty user agent.
    pub fn validate(&self) -> ProofResult<()> {
        self.viewport.validate()?;
        if matches!(&self.user_agent, Some(ua) if ua.trim().is_empty()) {
            return Err(ProofError::configuration("user agent must not be empty"));
        }
        Ok(())
    }
}

// =============================================================================
// HARNESS CONFIG
// =============================================================================

/// Run-wide settings shared by every step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Timeout for steps without their own
    pub default_step_timeout_ms: u64,
    /// Polling interval for assertions and waits
    pub poll_interval_ms: u64,
    /// Short existence check used by `locate`
    pub existence_check_ms: u64,
    /// Ready condition for navigations without their own
    pub default_ready: ReadyCondition,
    /// Timeout for navigations without their own
    pub navigation_cap_ms: u64,
    /// Base URL for relative navigation targets
    pub base_url: Option<String>,
    /// Where evidence is written
    pub output_dir: PathBuf,
    /// Capture full-page screenshots by default
    pub full_page_screenshots: bool,
    /// Write `run_result.json` next to the screenshots
    pub write_run_record: bool,
    /// Browser session settings
    pub session: SessionConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            default_step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            existence_check_ms: DEFAULT_EXISTENCE_CHECK_MS,
            default_ready: ReadyCondition::default(),
            navigation_cap_ms: DEFAULT_NAVIGATION_CAP_MS,
            base_url: None,
            output_dir: PathBuf::from("./evidence"),
            full_page_screenshots: false,
            write_run_record: true,
            session: SessionConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Create a default harness config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default step timeout
    #[must_use]
    pub const fn with_step_timeout(mut self, timeout_ms: u64) -> Self {
        self.default_step_timeout_ms = timeout_ms;
        self
    }

    /// Set the polling interval
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set the existence-check window
    #[must_use]
    pub const fn with_existence_check(mut self, existence_check_ms: u64) -> Self {
        self.existence_check_ms = existence_check_ms;
        self
    }

    /// Set the default ready condition
    #[must_use]
    pub fn with_default_ready(mut self, ready: ReadyCondition) -> Self {
        self.default_ready = ready;
        self
    }

    /// Set the navigation timeout cap
    #[must_use]
    pub const fn with_navigation_cap(mut self, cap_ms: u64) -> Self {
        self.navigation_cap_ms = cap_ms;
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Capture full-page screenshots by default
    #[must_use]
    pub const fn with_full_page(mut self, full_page: bool) -> Self {
        self.full_page_screenshots = full_page;
        self
    }

    /// Toggle writing `run_result.json`
    #[must_use]
    pub const fn with_run_record(mut self, write: bool) -> Self {
        self.write_run_record = write;
        self
    }

    /// Set the session config
    #[must_use]
    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Polling interval as a Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Existence-check window as a Duration
    #[must_use]
    pub const fn existence_check(&self) -> Duration {
        Duration::from_millis(self.existence_check_ms)
    }

    /// Effective timeout for a step
    ///
    /// A step's own `timeout_ms` wins. Otherwise navigations get the
    /// navigation cap and everything else the default step timeout.
    #[must_use]
    pub fn timeout_for(&self, step: &Step) -> Duration {
        let fallback = match step.kind {
            StepKind::Navigate { .. } => self.navigation_cap_ms,
            _ => self.default_step_timeout_ms,
        };
        Duration::from_millis(step.timeout_ms.unwrap_or(fallback))
    }

    /// Resolve a navigation target against `base_url`
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("about:") || url.starts_with("data:") {
            return url.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }

    /// Check the config before anything is launched
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a zero poll interval or an invalid session.
    pub fn validate(&self) -> ProofResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(ProofError::configuration("poll interval must be positive"));
        }
        self.session.validate()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod viewport_tests {
        use super::*;

        #[test]
        fn test_parse() {
            assert_eq!("1920x1080".parse::<Viewport>().unwrap(), Viewport::new(1920, 1080));
            assert_eq!(" 375X812 ".parse::<Viewport>().unwrap(), Viewport::new(375, 812));
        }

        #[test]
        fn test_parse_rejects_garbage() {
            for input in ["", "1920", "x1080", "1920x", "axb", "-1x10", "1920*1080"] {
                assert!(input.parse::<Viewport>().is_err(), "{input} should fail");
            }
        }

        #[test]
        fn test_zero_and_oversized_rejected() {
            assert!(Viewport::new(0, 720).validate().is_err());
            assert!(Viewport::new(1280, 0).validate().is_err());
            assert!(Viewport::new(10_001, 720).validate().is_err());
            assert!(Viewport::new(10_000, 10_000).validate().is_ok());
            assert!("0x720".parse::<Viewport>().is_err());
        }

        #[test]
        fn test_display_round_trips() {
            let vp = Viewport::new(1366, 768);
            assert_eq!(vp.to_string().parse::<Viewport>().unwrap(), vp);
        }
    }

    mod session_config_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = SessionConfig::default();
            assert!(config.headless);
            assert!(config.sandbox);
            assert_eq!(config.viewport, Viewport::new(1280, 720));
        }

        #[test]
        fn test_builder() {
            let config = SessionConfig::new()
                .with_viewport(390, 844)
                .with_user_agent("Mozilla/5.0 (iPhone)")
                .with_headless(false)
                .with_sandbox(false);
            assert_eq!(config.viewport.width, 390);
            assert_eq!(config.user_agent.as_deref(), Some("Mozilla/5.0 (iPhone)"));
            assert!(!config.headless);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_blank_user_agent_rejected() {
            assert!(SessionConfig::new().with_user_agent("  ").validate().is_err());
        }
    }

    mod harness_config_tests {
        use super::*;

        #[test]
        fn test_timeout_for() {
            let config = HarnessConfig::new().with_step_timeout(2_000);
            assert_eq!(
                config.timeout_for(&Step::click("#go")),
                Duration::from_millis(2_000)
            );
            assert_eq!(
                config.timeout_for(&Step::navigate("/")),
                Duration::from_millis(DEFAULT_NAVIGATION_CAP_MS)
            );
            assert_eq!(
                config.timeout_for(&Step::click("#go").with_timeout(300)),
                Duration::from_millis(300)
            );
        }

        #[test]
        fn test_resolve_url() {
            let config = HarnessConfig::new().with_base_url("http://localhost:3000/");
            assert_eq!(config.resolve_url("/schedule"), "http://localhost:3000/schedule");
            assert_eq!(config.resolve_url("results"), "http://localhost:3000/results");
            assert_eq!(config.resolve_url("https://example.com/x"), "https://example.com/x");
            assert_eq!(HarnessConfig::new().resolve_url("/schedule"), "/schedule");
        }

        #[test]
        fn test_partial_yaml_uses_defaults() {
            let config: HarnessConfig = serde_yaml_ng::from_str(
                "default_step_timeout_ms: 1500\nsession:\n  viewport: { width: 800, height: 600 }\n",
            )
            .unwrap();
            assert_eq!(config.default_step_timeout_ms, 1500);
            assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
            assert_eq!(config.session.viewport, Viewport::new(800, 600));
            assert!(config.session.headless);
        }

        #[test]
        fn test_zero_poll_interval_rejected() {
            assert!(HarnessConfig::new().with_poll_interval(0).validate().is_err());
        }
    }
}
