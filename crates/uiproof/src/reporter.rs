//! Run results.
//!
//! A [`RunResult`] holds one [`StepResult`] per step in scenario order, the
//! overall verdict and, when the run could not proceed normally, the
//! terminal cause, plus the browser console output seen along the way. It
//! is the machine-readable record of a run and is
//! written as `run_result.json` next to the screenshots.

use crate::console::ConsoleEntry;
use crate::evidence::EvidenceArtifact;
use crate::network::InterceptedRequest;
use crate::result::{ErrorKind, ProofError};
use crate::scenario::Step;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Process exit code for a passed run
pub const EXIT_PASSED: u8 = 0;
/// Process exit code for a failed run
pub const EXIT_FAILED: u8 = 1;
/// Process exit code when setup failed before any step ran
pub const EXIT_SETUP_ERROR: u8 = 2;

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Success criterion met
    Passed,
    /// Failed; the run stopped here
    Failed,
    /// Not run, or an optional step that failed
    Skipped,
}

impl StepOutcome {
    /// Check if the step passed
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if the step failed
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check if the step was skipped
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every step passed (or was optional) and teardown succeeded
    Passed,
    /// Anything else
    Failed,
}

/// Result of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Position in the scenario
    pub index: usize,
    /// The step as written
    pub step: Step,
    /// What happened
    pub outcome: StepOutcome,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Screenshots written by this step
    #[serde(default)]
    pub artifacts: Vec<EvidenceArtifact>,
    /// Console output recorded while a failing step ran
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub console: Vec<ConsoleEntry>,
    /// Wall time spent on the step
    pub duration_ms: u64,
}

impl StepResult {
    /// A passing step
    #[must_use]
    pub fn passed(index: usize, step: Step, duration_ms: u64) -> Self {
        Self {
            index,
            step,
            outcome: StepOutcome::Passed,
            error: None,
            error_kind: None,
            artifacts: Vec::new(),
            console: Vec::new(),
            duration_ms,
        }
    }

    /// A failing step
    #[must_use]
    pub fn failed(index: usize, step: Step, error: &ProofError, duration_ms: u64) -> Self {
        Self {
            index,
            step,
            outcome: StepOutcome::Failed,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            artifacts: Vec::new(),
            console: Vec::new(),
            duration_ms,
        }
    }

    /// A step that never ran
    #[must_use]
    pub fn skipped(index: usize, step: Step) -> Self {
        Self {
            index,
            step,
            outcome: StepOutcome::Skipped,
            error: None,
            error_kind: None,
            artifacts: Vec::new(),
            console: Vec::new(),
            duration_ms: 0,
        }
    }

    /// An optional step that failed; the error is kept
    #[must_use]
    pub fn soft_skipped(index: usize, step: Step, error: &ProofError, duration_ms: u64) -> Self {
        Self {
            outcome: StepOutcome::Skipped,
            ..Self::failed(index, step, error, duration_ms)
        }
    }

    /// Attach an artifact
    #[must_use]
    pub fn with_artifact(mut self, artifact: EvidenceArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Attach console output
    #[must_use]
    pub fn with_console(mut self, entries: Vec<ConsoleEntry>) -> Self {
        self.console = entries;
        self
    }

    /// Paths of this step's artifacts
    #[must_use]
    pub fn artifact_paths(&self) -> Vec<&Path> {
        self.artifacts.iter().map(|a| a.path.as_path()).collect()
    }

    /// Whether the step was attempted at all
    #[must_use]
    pub const fn was_executed(&self) -> bool {
        !self.outcome.is_skipped() || self.error.is_some()
    }
}

/// Why a run ended outside the normal step flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCause {
    /// Classification
    pub kind: ErrorKind,
    /// Message
    pub message: String,
}

impl From<&ProofError> for RunCause {
    fn from(err: &ProofError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Scenario name
    pub scenario: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the session was torn down
    pub finished_at: DateTime<Utc>,
    /// Overall verdict
    pub verdict: Verdict,
    /// One entry per step, in order
    pub steps: Vec<StepResult>,
    /// Terminal cause: setup failure, teardown failure or the failing step's error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<RunCause>,
    /// Requests seen by the interception layer
    #[serde(default)]
    pub intercepted: Vec<InterceptedRequest>,
    /// Console messages and page errors, in arrival order
    #[serde(default)]
    pub console: Vec<ConsoleEntry>,
}

impl RunResult {
    /// Check if the run passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    /// Number of passed steps
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_passed()).count()
    }

    /// Number of failed steps
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_failed()).count()
    }

    /// Number of skipped steps
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_skipped()).count()
    }

    /// The step that failed the run, if one did
    #[must_use]
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.outcome.is_failed())
    }

    /// Every artifact, in step order
    #[must_use]
    pub fn artifacts(&self) -> Vec<&EvidenceArtifact> {
        self.steps.iter().flat_map(|s| s.artifacts.iter()).collect()
    }

    /// Console errors and uncaught page errors
    #[must_use]
    pub fn console_errors(&self) -> Vec<&ConsoleEntry> {
        self.console.iter().filter(|e| e.level.is_error()).collect()
    }

    /// Total wall time across steps
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_ms).sum()
    }

    /// Whether setup failed before any step ran
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        let setup_kind = matches!(
            self.cause.as_ref().map(|c| c.kind),
            Some(ErrorKind::Configuration | ErrorKind::SessionLifecycle)
        );
        setup_kind && !self.steps.iter().any(StepResult::was_executed)
    }

    /// Process exit code: 0 passed, 1 failed, 2 setup error
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        if self.passed() {
            EXIT_PASSED
        } else if self.is_setup_error() {
            EXIT_SETUP_ERROR
        } else {
            EXIT_FAILED
        }
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        let verdict = match self.verdict {
            Verdict::Passed => "PASSED",
            Verdict::Failed => "FAILED",
        };
        format!(
            "{}: {verdict} ({} passed, {} failed, {} skipped)",
            self.scenario,
            self.passed_count(),
            self.failed_count(),
            self.skipped_count()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::result::NotInteractableReason;
    use std::path::PathBuf;

    fn result(steps: Vec<StepResult>, cause: Option<RunCause>) -> RunResult {
        let verdict = if cause.is_none() && !steps.iter().any(|s| s.outcome.is_failed()) {
            Verdict::Passed
        } else {
            Verdict::Failed
        };
        RunResult {
            run_id: Uuid::new_v4(),
            scenario: "demo".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            verdict,
            steps,
            cause,
            intercepted: Vec::new(),
            console: Vec::new(),
        }
    }

    fn not_found() -> ProofError {
        ProofError::ElementNotInteractable {
            selector: "button".to_string(),
            reason: NotInteractableReason::NotFound,
        }
    }

    mod step_result_tests {
        use super::*;

        #[test]
        fn test_failed_carries_kind() {
            let step = StepResult::failed(2, Step::click("button"), &not_found(), 40);
            assert!(step.outcome.is_failed());
            assert_eq!(step.error_kind, Some(ErrorKind::Interaction));
            assert!(step.error.as_deref().unwrap().contains("element not found"));
        }

        #[test]
        fn test_soft_skip_keeps_error() {
            let step = StepResult::soft_skipped(1, Step::click("button").optional(), &not_found(), 5);
            assert!(step.outcome.is_skipped());
            assert!(step.error.is_some());
            assert!(step.was_executed());
            assert!(!StepResult::skipped(1, Step::click("x")).was_executed());
        }

        #[test]
        fn test_artifact_paths() {
            let artifact = EvidenceArtifact {
                path: PathBuf::from("out/004_filtered.png"),
                step_index: 4,
                timestamp: Utc::now(),
                width: 1,
                height: 1,
                sha256: String::new(),
            };
            let step = StepResult::passed(4, Step::capture("filtered"), 3).with_artifact(artifact);
            assert_eq!(step.artifact_paths(), vec![Path::new("out/004_filtered.png")]);
        }

        #[test]
        fn test_console_serialized_only_when_present() {
            use crate::console::ConsoleLevel;

            let quiet = serde_json::to_value(StepResult::passed(0, Step::navigate("/"), 1)).unwrap();
            assert!(quiet.get("console").is_none());

            let noisy = StepResult::failed(1, Step::click("button"), &not_found(), 1)
                .with_console(vec![ConsoleEntry::new(ConsoleLevel::PageError, "boom")]);
            let value = serde_json::to_value(&noisy).unwrap();
            assert_eq!(value["console"][0]["text"], "boom");
        }
    }

    mod exit_code_tests {
        use super::*;

        #[test]
        fn test_passed() {
            let run = result(vec![StepResult::passed(0, Step::navigate("/"), 1)], None);
            assert_eq!(run.exit_code(), EXIT_PASSED);
            assert_eq!(run.summary(), "demo: PASSED (1 passed, 0 failed, 0 skipped)");
        }

        #[test]
        fn test_step_failure() {
            let run = result(
                vec![
                    StepResult::failed(0, Step::click("button"), &not_found(), 1),
                    StepResult::skipped(1, Step::capture("x")),
                ],
                Some(RunCause::from(&not_found())),
            );
            assert_eq!(run.exit_code(), EXIT_FAILED);
            assert_eq!(run.failed_step().unwrap().index, 0);
        }

        #[test]
        fn test_setup_errors() {
            let cause = RunCause::from(&ProofError::configuration("bad viewport"));
            let run = result(vec![StepResult::skipped(0, Step::navigate("/"))], Some(cause));
            assert_eq!(run.exit_code(), EXIT_SETUP_ERROR);

            let cause = RunCause::from(&ProofError::lifecycle(
                crate::result::LifecyclePhase::Open,
                "no chromium",
            ));
            assert_eq!(result(Vec::new(), Some(cause)).exit_code(), EXIT_SETUP_ERROR);
        }

        #[test]
        fn test_close_failure_after_steps_is_plain_failure() {
            let cause = RunCause::from(&ProofError::lifecycle(
                crate::result::LifecyclePhase::Close,
                "browser hung",
            ));
            let run = result(vec![StepResult::passed(0, Step::navigate("/"), 1)], Some(cause));
            assert_eq!(run.verdict, Verdict::Failed);
            assert_eq!(run.exit_code(), EXIT_FAILED);
        }
    }

    #[test]
    fn test_json_shape() {
        let run = result(vec![StepResult::passed(0, Step::navigate("/"), 1)], None);
        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["verdict"], "passed");
        assert_eq!(value["steps"][0]["outcome"], "passed");
        assert_eq!(value["steps"][0]["step"]["action"], "navigate");
        assert!(value.get("cause").is_none());
        assert_eq!(value["console"], serde_json::json!([]));
    }

    #[test]
    fn test_console_errors_filter() {
        use crate::console::ConsoleLevel;

        let mut run = result(Vec::new(), None);
        run.console = vec![
            ConsoleEntry::new(ConsoleLevel::Log, "hello"),
            ConsoleEntry::new(ConsoleLevel::Error, "fetch failed"),
            ConsoleEntry::new(ConsoleLevel::PageError, "boom"),
        ];
        let texts: Vec<&str> = run.console_errors().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["fetch failed", "boom"]);
    }
}
