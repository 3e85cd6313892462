//! Command handlers

use crate::commands::{RunArgs, ValidateArgs};
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use std::path::Path;
use uiproof::{HarnessConfig, Scenario, EXIT_PASSED};

/// Load a scenario file and check its mocks and steps.
///
/// The embedded `config:` is checked by the caller: `validate` checks it as
/// written, `run` only after flags are layered over it.
///
/// # Errors
///
/// Returns the read, parse or validation error.
pub fn load_scenario(path: &Path) -> CliResult<Scenario> {
    let scenario = Scenario::from_yaml_file(path)?;
    scenario.validate_steps()?;
    tracing::debug!(
        path = %path.display(),
        steps = scenario.steps.len(),
        mocks = scenario.mocks.len(),
        "scenario loaded"
    );
    Ok(scenario)
}

/// Effective harness config: file values under explicit flags
///
/// # Errors
///
/// Returns a configuration error if the merged config is invalid.
pub fn effective_config(scenario: &Scenario, args: &RunArgs) -> CliResult<HarnessConfig> {
    let config = args.apply(scenario.config.clone().unwrap_or_default());
    config.validate()?;
    Ok(config)
}

/// `uiproof validate`
///
/// # Errors
///
/// Returns the first problem found in the scenario file.
pub fn validate_command(config: &CliConfig, args: &ValidateArgs) -> CliResult<u8> {
    let scenario = load_scenario(&args.scenario)?;
    scenario.validate()?;
    let reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.success(&format!(
        "{}: {} steps, {} mocks",
        scenario.name,
        scenario.steps.len(),
        scenario.mocks.len()
    ));
    if config.verbosity.is_verbose() {
        for (index, step) in scenario.steps.iter().enumerate() {
            reporter.success(&format!("{index:>3} {}", step.describe()));
        }
    }
    Ok(EXIT_PASSED)
}

/// `uiproof run`
///
/// # Errors
///
/// Returns setup errors that happen before the browser is launched.
#[cfg(feature = "browser")]
pub fn run_command(config: &CliConfig, args: &RunArgs) -> CliResult<u8> {
    use uiproof::{CdpLauncher, ScenarioRunner};

    let scenario = load_scenario(&args.scenario)?;
    let harness = effective_config(&scenario, args)?;
    tracing::info!(
        scenario = %scenario.name,
        output_dir = %harness.output_dir.display(),
        viewport = %harness.session.viewport,
        "starting run"
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let mut reporter =
        ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.start(&format!("running {}", scenario.name));
    let result = runtime.block_on(async {
        ScenarioRunner::new(CdpLauncher::new(), harness)
            .run(&scenario)
            .await
    });
    reporter.finish();
    reporter.report(&result);

    Ok(result.exit_code())
}

/// `uiproof run` without browser support
///
/// # Errors
///
/// Always fails once the scenario checks out: there is nothing to launch.
#[cfg(not(feature = "browser"))]
pub fn run_command(_config: &CliConfig, args: &RunArgs) -> CliResult<u8> {
    let scenario = load_scenario(&args.scenario)?;
    let _ = effective_config(&scenario, args)?;
    Err(crate::error::CliError::config(
        "uiproof was built without the `browser` feature; rebuild with --features browser",
    ))
}
