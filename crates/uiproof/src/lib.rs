//! uiproof: scenario runner for headless-browser UI verification
//!
//! A scenario is an ordered list of steps (navigate, click, assert, capture)
//! plus mock rules that answer the page's backend requests. The runner opens
//! one browser session, executes the steps with bounded waits, captures
//! screenshot evidence and the page's console output, and always tears the
//! session down.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         ScenarioRunner                           │
//! │   Idle → SessionOpening → Running → Finalizing → Done            │
//! ├──────────────┬───────────────────┬───────────────┬───────────────┤
//! │  Navigator   │ InteractionDriver │ AssertionEngine│ EvidenceCapture│
//! ├──────────────┴───────────────────┴───────────────┴───────────────┤
//! │            Session (one page, scoped lifecycle)                  │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  PageDriver: CdpDriver (chromium) │ MockDriver (scripted fake)    │
//! │            every request → MockRegistry                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use uiproof::prelude::*;
//!
//! let scenario = Scenario::builder("schedule filter")
//!     .mock(MockRule::json("**/api/schedule", &serde_json::json!([{ "apparatus": "Sol" }])))
//!     .step(Step::navigate("/schedule"))
//!     .step(Step::click("button:has-text('Sol')"))
//!     .step(Step::assert_visible("[role=dialog]"))
//!     .step(Step::capture("filtered"))
//!     .build();
//!
//! let config = HarnessConfig::new().with_base_url("http://localhost:5173");
//! let result = ScenarioRunner::new(CdpLauncher::new(), config).run(&scenario).await;
//! assert!(result.passed());
//! ```

#![warn(missing_docs)]

mod assertion;
#[cfg(feature = "browser")]
mod browser;
mod config;
mod console;
mod driver;
mod evidence;
mod interaction;
mod locator;
mod navigator;
mod reporter;
mod result;
mod runner;
mod scenario;
mod session;

/// Scripted fake browser for tests and dry runs
pub mod mock;

/// URL patterns, mock rules and the interception log
pub mod network;

/// Ready conditions and the polling primitive
pub mod wait;

pub use assertion::{AssertionEngine, TextMatch};
#[cfg(feature = "browser")]
pub use browser::{CdpDriver, CdpLauncher};
pub use config::{
    HarnessConfig, SessionConfig, Viewport, DEFAULT_EXISTENCE_CHECK_MS, DEFAULT_NAVIGATION_CAP_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_STEP_TIMEOUT_MS, MAX_VIEWPORT_DIMENSION,
};
pub use console::{ConsoleEntry, ConsoleLevel, ConsoleLog, MAX_CONSOLE_ENTRIES};
pub use driver::{BrowserLauncher, ElementHandle, NavigationOutcome, NetworkActivity, PageDriver};
pub use evidence::{sanitize_label, EvidenceArtifact, EvidenceCapture, FAILURE_LABEL, RUN_RECORD_FILE};
pub use interaction::InteractionDriver;
pub use locator::{normalize_whitespace, BoundingBox, Point, Selector, TextFilter};
pub use navigator::{NavigationResult, Navigator};
pub use network::{HttpMethod, InterceptedRequest, InterceptionLog, MockRegistry, MockRule, UrlPattern};
pub use reporter::{
    RunCause, RunResult, StepOutcome, StepResult, Verdict, EXIT_FAILED, EXIT_PASSED,
    EXIT_SETUP_ERROR,
};
pub use result::{ErrorKind, LifecyclePhase, NotInteractableReason, ProofError, ProofResult};
pub use runner::{run_scenario, RunnerState, ScenarioRunner, STEP_TIMEOUT_GRACE};
pub use scenario::{Scenario, ScenarioBuilder, Step, StepKind};
pub use session::Session;
pub use wait::{poll_until, PollTimeout, Polled, Check, ReadyCondition, NETWORK_IDLE_THRESHOLD_MS};

/// Everything a scenario author needs
pub mod prelude {
    #[cfg(feature = "browser")]
    pub use super::browser::CdpLauncher;
    pub use super::mock::{MockLauncher, MockNode, MockPage, MockSite, Reaction};
    pub use super::{
        ConsoleLevel, HarnessConfig, HttpMethod, MockRule, ReadyCondition, RunResult, Scenario,
        ScenarioRunner, SessionConfig, Step, StepOutcome, TextMatch, Verdict, Viewport,
    };
}
