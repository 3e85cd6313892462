//! uiproof: run browser verification scenarios
//!
//! Exit codes: 0 passed, 1 a step or teardown failed, 2 the run could not
//! be set up (bad scenario file, bad flags, browser unavailable).

use clap::Parser;
use std::process::ExitCode;
use uiproof_cli::{logging, run_command, validate_command, Cli, CliConfig, CliResult, Commands, Verbosity};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(config.verbosity, config.log_format);

    match run(&config, &cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, "uiproof failed");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(config: &CliConfig, command: &Commands) -> CliResult<u8> {
    match command {
        Commands::Run(args) => run_command(config, args),
        Commands::Validate(args) => validate_command(config, args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color = cli.color.clone().into();
    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_log_format(cli.log_format.into())
}
