//! Output formatting and progress reporting

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use uiproof::{RunResult, StepOutcome, StepResult};

/// Progress reporter for scenario execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    spinner: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            spinner: None,
            use_color,
            quiet,
        }
    }

    /// Show a spinner while the scenario runs
    pub fn start(&mut self, message: &str) {
        if self.quiet || !self.term.is_term() {
            return;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(spinner);
    }

    /// Remove the spinner
    pub fn finish(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // failures print even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line(&styled);
    }

    /// One line for a step
    #[must_use]
    pub fn step_line(&self, step: &StepResult) -> String {
        let (mark, color) = match step.outcome {
            StepOutcome::Passed => ("PASS", Style::new().green()),
            StepOutcome::Failed => ("FAIL", Style::new().red().bold()),
            StepOutcome::Skipped => ("SKIP", Style::new().yellow()),
        };
        let mark = if self.use_color {
            color.apply_to(mark).to_string()
        } else {
            mark.to_string()
        };

        let mut line = format!(
            "{mark} {:>3} {} ({}ms)",
            step.index,
            step.step.describe(),
            step.duration_ms
        );
        if let Some(error) = &step.error {
            line.push_str(&format!("\n         {error}"));
        }
        for path in step.artifact_paths() {
            line.push_str(&format!("\n         evidence: {}", path.display()));
        }
        for entry in &step.console {
            line.push_str(&format!("\n         console: {entry}"));
        }
        line
    }

    /// Print every step and the verdict
    pub fn report(&self, result: &RunResult) {
        self.header(&result.scenario);
        for step in &result.steps {
            if self.quiet && !step.outcome.is_failed() {
                continue;
            }
            let _ = self.term.write_line(&self.step_line(step));
        }
        if let Some(cause) = &result.cause {
            if result.failed_step().is_none() {
                self.failure(&format!("{}: {}", cause.kind, cause.message));
            }
        }
        let errors = result.console_errors();
        if !errors.is_empty() && !self.quiet {
            let _ = self
                .term
                .write_line(&format!("{} console error(s) during the run:", errors.len()));
            for entry in errors {
                let _ = self.term.write_line(&format!("         {entry}"));
            }
        }
        self.summary(result);
    }

    /// Print the verdict line
    pub fn summary(&self, result: &RunResult) {
        let secs = Duration::from_millis(result.duration_ms()).as_secs_f64();
        let text = format!("{} in {secs:.2}s", result.summary());
        if result.passed() {
            self.success(&text);
        } else {
            self.failure(&text);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use uiproof::{ConsoleEntry, ConsoleLevel, ProofError, Step};

    mod progress_reporter_tests {
        use super::*;

        #[test]
        fn test_new_reporter() {
            let reporter = ProgressReporter::new(true, false);
            assert!(reporter.use_color);
            assert!(!reporter.quiet);
        }

        #[test]
        fn test_quiet_reporter_has_no_spinner() {
            let mut reporter = ProgressReporter::new(false, true);
            reporter.start("running");
            assert!(reporter.spinner.is_none());
            reporter.finish();
        }

        #[test]
        fn test_messages_do_not_panic() {
            let reporter = ProgressReporter::new(false, false);
            reporter.success("ok");
            reporter.failure("bad");
            reporter.header("title");
        }
    }

    mod step_line_tests {
        use super::*;

        #[test]
        fn test_passed_step_line() {
            let reporter = ProgressReporter::new(false, false);
            let line = reporter.step_line(&StepResult::passed(0, Step::navigate("/schedule"), 42));
            assert!(line.starts_with("PASS"));
            assert!(line.contains("navigate /schedule"));
            assert!(line.contains("(42ms)"));
        }

        #[test]
        fn test_failed_step_line_carries_error() {
            let reporter = ProgressReporter::new(false, false);
            let err = ProofError::configuration("boom");
            let line = reporter.step_line(&StepResult::failed(2, Step::click("#go"), &err, 7));
            assert!(line.starts_with("FAIL"));
            assert!(line.contains("boom"));
        }

        #[test]
        fn test_failed_step_line_lists_console() {
            let reporter = ProgressReporter::new(false, false);
            let err = ProofError::configuration("boom");
            let step = StepResult::failed(0, Step::navigate("/"), &err, 7).with_console(vec![
                ConsoleEntry::new(ConsoleLevel::PageError, "ChunkLoadError").with_url("/app.js"),
            ]);
            let line = reporter.step_line(&step);
            assert!(line.contains("console: [pageerror] ChunkLoadError (/app.js)"));
        }

        #[test]
        fn test_skipped_step_line() {
            let reporter = ProgressReporter::new(false, false);
            let line = reporter.step_line(&StepResult::skipped(3, Step::capture("x")));
            assert!(line.starts_with("SKIP"));
        }
    }
}
