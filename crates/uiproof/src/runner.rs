//! Scenario execution.
//!
//! ```text
//!   Idle ──run()──▶ SessionOpening ──open ok──▶ Running ──▶ Finalizing ──▶ Done
//!                         │                                    ▲
//!                         └──────── invalid / open failed ─────┘
//! ```
//!
//! Steps run strictly in order. The first hard failure captures failure
//! evidence, along with the console output the step produced, and skips
//! everything after it. The session is closed in
//! `Finalizing` on every path, and every outcome, including setup and
//! teardown failures, ends up in the returned [`RunResult`].

use crate::assertion::AssertionEngine;
use crate::config::{HarnessConfig, Viewport};
use crate::driver::BrowserLauncher;
use crate::evidence::{EvidenceArtifact, EvidenceCapture};
use crate::interaction::InteractionDriver;
use crate::locator::Selector;
use crate::navigator::Navigator;
use crate::reporter::{RunCause, RunResult, StepResult, Verdict};
use crate::result::{ProofError, ProofResult};
use crate::scenario::{Scenario, Step, StepKind};
use crate::session::Session;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Extra time a step gets beyond its own timeout before it is cancelled
pub const STEP_TIMEOUT_GRACE: Duration = Duration::from_secs(1);

/// Where a runner is in its single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunnerState {
    /// Not started
    #[default]
    Idle,
    /// Validating and launching the browser
    SessionOpening,
    /// Executing steps
    Running,
    /// Closing the session and assembling the result
    Finalizing,
    /// Finished; terminal
    Done,
}

impl RunnerState {
    /// Whether `next` is a legal successor
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::SessionOpening)
                | (Self::SessionOpening, Self::Running | Self::Finalizing)
                | (Self::Running, Self::Finalizing)
                | (Self::Finalizing, Self::Done)
        )
    }

    /// Check if the state is terminal
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::SessionOpening => write!(f, "SessionOpening"),
            Self::Running => write!(f, "Running"),
            Self::Finalizing => write!(f, "Finalizing"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Runs one scenario against browsers from `L`
///
/// # Example
///
/// ```ignore
/// let mut runner = ScenarioRunner::new(launcher, HarnessConfig::new().with_output_dir("out"));
/// let result = runner.run(&scenario).await;
/// std::process::exit(result.exit_code().into());
/// ```
#[derive(Debug)]
pub struct ScenarioRunner<L> {
    launcher: L,
    config: HarnessConfig,
    state: RunnerState,
    history: Vec<RunnerState>,
}

impl<L: BrowserLauncher> ScenarioRunner<L> {
    /// Runner using `config` for every step
    #[must_use]
    pub fn new(launcher: L, config: HarnessConfig) -> Self {
        Self {
            launcher,
            config,
            state: RunnerState::Idle,
            history: Vec::new(),
        }
    }

    /// Runner using the scenario's embedded config, or defaults
    #[must_use]
    pub fn for_scenario(launcher: L, scenario: &Scenario) -> Self {
        Self::new(launcher, scenario.config.clone().unwrap_or_default())
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> RunnerState {
        self.state
    }

    /// States passed through so far, excluding the current one
    #[must_use]
    pub fn state_history(&self) -> &[RunnerState] {
        &self.history
    }

    /// Effective config
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The launcher
    #[must_use]
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }

    fn transition(&mut self, next: RunnerState) {
        debug_assert!(self.state.can_transition_to(next), "{} -> {next}", self.state);
        tracing::debug!(from = %self.state, to = %next, "runner state");
        self.history.push(self.state);
        self.state = next;
    }

    /// Execute `scenario` and report what happened.
    ///
    /// Never fails: configuration, launch, step and teardown errors are all
    /// recorded in the result. A runner executes one scenario; calling this
    /// again returns a configuration failure without launching anything.
    pub async fn run(&mut self, scenario: &Scenario) -> RunResult {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("scenario", name = %scenario.name, %run_id);
        self.execute(run_id, scenario).instrument(span).await
    }

    async fn execute(&mut self, run_id: Uuid, scenario: &Scenario) -> RunResult {
        let started_at = Utc::now();
        if self.state != RunnerState::Idle {
            let err = ProofError::configuration("runner has already executed a scenario");
            tracing::error!(error = %err, "refusing second run");
            return RunResult {
                run_id,
                scenario: scenario.name.clone(),
                started_at,
                finished_at: Utc::now(),
                verdict: Verdict::Failed,
                steps: skip_all(scenario),
                cause: Some(RunCause::from(&err)),
                intercepted: Vec::new(),
                console: Vec::new(),
            };
        }

        tracing::info!(steps = scenario.steps.len(), mocks = scenario.mocks.len(), "scenario started");
        self.transition(RunnerState::SessionOpening);

        let opened = self.open_session(scenario).await;
        let (steps, cause, intercepted, console) = match opened {
            Err(err) => {
                tracing::error!(error = %err, kind = %err.kind(), "scenario setup failed");
                self.transition(RunnerState::Finalizing);
                (skip_all(scenario), Some(RunCause::from(&err)), Vec::new(), Vec::new())
            }
            Ok(mut session) => {
                self.transition(RunnerState::Running);
                let evidence = EvidenceCapture::new(
                    &self.config.output_dir,
                    self.config.full_page_screenshots,
                );
                let mut steps = Vec::with_capacity(scenario.steps.len());
                let mut cause = self.run_steps(&mut session, scenario, &evidence, &mut steps).await;

                self.transition(RunnerState::Finalizing);
                let intercepted = session.interception_log().entries();
                if let Err(err) = session.close().await {
                    tracing::error!(error = %err, "session teardown failed");
                    cause.get_or_insert_with(|| RunCause::from(&err));
                }
                let console = session.console_log();
                if console.dropped() > 0 {
                    tracing::warn!(dropped = console.dropped(), "console output truncated");
                }
                (steps, cause, intercepted, console.entries())
            }
        };

        let failed = cause.is_some() || steps.iter().any(|s| s.outcome.is_failed());
        let result = RunResult {
            run_id,
            scenario: scenario.name.clone(),
            started_at,
            finished_at: Utc::now(),
            verdict: if failed { Verdict::Failed } else { Verdict::Passed },
            steps,
            cause,
            intercepted,
            console,
        };

        if self.config.write_run_record {
            let evidence = EvidenceCapture::new(&self.config.output_dir, false);
            if let Err(err) = evidence.write_run_record(&result) {
                tracing::warn!(error = %err, "run record not written");
            }
        }

        self.transition(RunnerState::Done);
        tracing::info!(
            verdict = ?result.verdict,
            passed = result.passed_count(),
            failed = result.failed_count(),
            skipped = result.skipped_count(),
            "scenario finished"
        );
        result
    }

    async fn open_session(&self, scenario: &Scenario) -> ProofResult<Session> {
        self.config.validate()?;
        scenario.validate_steps()?;
        let registry = scenario.registry()?;
        tracing::debug!(rules = registry.len(), "mock registry frozen");
        EvidenceCapture::new(&self.config.output_dir, false)
            .clear_previous()
            .map_err(|e| ProofError::configuration(format!("preparing output directory: {e}")))?;
        Session::open(&self.launcher, &self.config.session, Arc::new(registry)).await
    }

    /// Runs steps until the first hard failure; returns that failure.
    async fn run_steps(
        &self,
        session: &mut Session,
        scenario: &Scenario,
        evidence: &EvidenceCapture,
        results: &mut Vec<StepResult>,
    ) -> Option<RunCause> {
        let mut failure = None;
        for (index, step) in scenario.steps.iter().enumerate() {
            if failure.is_some() {
                results.push(StepResult::skipped(index, step.clone()));
                continue;
            }
            let span = tracing::info_span!("step", index, action = step.kind.action());
            let (result, hard_failure) = self
                .execute_step(session, evidence, index, step)
                .instrument(span)
                .await;
            results.push(result);
            failure = hard_failure;
        }
        failure
    }

    async fn execute_step(
        &self,
        session: &mut Session,
        evidence: &EvidenceCapture,
        index: usize,
        step: &Step,
    ) -> (StepResult, Option<RunCause>) {
        let started = Instant::now();
        let console_mark = session.console_log().len();
        let outcome = self.run_step(session, evidence, index, step).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(artifact) => {
                tracing::info!(duration_ms, "step passed");
                let mut result = StepResult::passed(index, step.clone(), duration_ms);
                if let Some(artifact) = artifact {
                    result = result.with_artifact(artifact);
                }
                (result, None)
            }
            Err(err) if step.optional => {
                tracing::warn!(error = %err, "optional step failed, continuing");
                (StepResult::soft_skipped(index, step.clone(), &err, duration_ms), None)
            }
            Err(err) => {
                tracing::error!(error = %err, kind = %err.kind(), "step failed");
                let console = session.console_log().since(console_mark);
                if !console.is_empty() {
                    tracing::info!(entries = console.len(), "console output during failed step");
                }
                let mut result =
                    StepResult::failed(index, step.clone(), &err, duration_ms).with_console(console);
                if let Some(artifact) = evidence.capture_failure(session, index).await {
                    result = result.with_artifact(artifact);
                }
                (result, Some(RunCause::from(&err)))
            }
        }
    }

    async fn run_step(
        &self,
        session: &mut Session,
        evidence: &EvidenceCapture,
        index: usize,
        step: &Step,
    ) -> ProofResult<Option<EvidenceArtifact>> {
        let timeout = self.config.timeout_for(step);
        tracing::info!(step = %step.describe(), timeout_ms = timeout.as_millis(), "step started");
        let dispatch = self.dispatch(session, evidence, index, step, timeout);
        match tokio::time::timeout(timeout + STEP_TIMEOUT_GRACE, dispatch).await {
            Ok(result) => result,
            Err(_) => Err(ProofError::StepTimeout {
                step: step.describe(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        evidence: &EvidenceCapture,
        index: usize,
        step: &Step,
        timeout: Duration,
    ) -> ProofResult<Option<EvidenceArtifact>> {
        let config = &self.config;
        let interact = InteractionDriver::new(config);
        let assert = AssertionEngine::new(config);

        match &step.kind {
            StepKind::Navigate { url, ready } => {
                let nav = Navigator::new(config)
                    .goto(session, url, ready.as_ref(), timeout)
                    .await?;
                tracing::debug!(status = ?nav.status, url = %nav.final_url, "navigated");
            }
            StepKind::WaitForSelector { selector } => {
                assert
                    .wait_for_selector(session, &Selector::parse(selector)?, timeout)
                    .await?;
            }
            StepKind::Click { selector } => {
                let handle = interact
                    .locate_within(session, &Selector::parse(selector)?, timeout)
                    .await?;
                interact.click(session, &handle).await?;
            }
            StepKind::Hover { selector } => {
                let handle = interact
                    .locate_within(session, &Selector::parse(selector)?, timeout)
                    .await?;
                interact.hover(session, &handle).await?;
            }
            StepKind::SetPointerState { selector, down } => {
                let handle = interact
                    .locate_within(session, &Selector::parse(selector)?, timeout)
                    .await?;
                interact.set_pointer_state(session, &handle, *down).await?;
            }
            StepKind::TypeText { selector, text } => {
                let handle = interact
                    .locate_within(session, &Selector::parse(selector)?, timeout)
                    .await?;
                interact.type_text(session, &handle, text).await?;
            }
            StepKind::PressKey { key } => interact.press_key(session, key).await?,
            StepKind::Scroll { dx, dy } => interact.scroll(session, *dx, *dy).await?,
            StepKind::SetViewport { width, height } => {
                interact
                    .set_viewport(session, Viewport::new(*width, *height))
                    .await?;
            }
            StepKind::AssertVisible { selector } => {
                assert
                    .assert_visible(session, &Selector::parse(selector)?, timeout)
                    .await?;
            }
            StepKind::AssertHidden { selector } => {
                assert
                    .assert_hidden(session, &Selector::parse(selector)?, timeout)
                    .await?;
            }
            StepKind::AssertText {
                selector,
                expected,
                mode,
            } => {
                assert
                    .assert_text(session, &Selector::parse(selector)?, expected, *mode, timeout)
                    .await?;
            }
            StepKind::AssertAttribute {
                selector,
                attr,
                expected,
            } => {
                assert
                    .assert_attribute(session, &Selector::parse(selector)?, attr, expected, timeout)
                    .await?;
            }
            StepKind::Capture { label, full_page } => {
                let artifact = evidence.capture(session, index, label, *full_page).await?;
                return Ok(Some(artifact));
            }
        }
        Ok(None)
    }
}

fn skip_all(scenario: &Scenario) -> Vec<StepResult> {
    scenario
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| StepResult::skipped(index, step.clone()))
        .collect()
}

/// Run `scenario` with its embedded config (or defaults)
pub async fn run_scenario<L: BrowserLauncher>(launcher: L, scenario: &Scenario) -> RunResult {
    ScenarioRunner::for_scenario(launcher, scenario)
        .run(scenario)
        .await
}
