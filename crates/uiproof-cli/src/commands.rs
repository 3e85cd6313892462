//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uiproof::{HarnessConfig, Viewport};

/// uiproof: run browser verification scenarios against mocked backends
#[derive(Parser, Debug)]
#[command(name = "uiproof")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario in a headless browser
    Run(RunArgs),

    /// Parse and validate a scenario without launching a browser
    Validate(ValidateArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario file (YAML)
    pub scenario: PathBuf,

    /// Directory for screenshots and run_result.json
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Run the browser headless
    #[arg(long, num_args = 0..=1, default_missing_value = "true", require_equals = true)]
    pub headless: Option<bool>,

    /// Viewport as WxH, e.g. 1280x720
    #[arg(long)]
    pub viewport: Option<Viewport>,

    /// Default per-step timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Base URL for relative navigation targets
    #[arg(long)]
    pub base_url: Option<String>,

    /// Capture full-page screenshots
    #[arg(long)]
    pub full_page: bool,

    /// Chromium executable to launch
    #[arg(long, env = "UIPROOF_CHROMIUM")]
    pub chromium: Option<PathBuf>,

    /// Disable the Chromium sandbox (needed in some containers)
    #[arg(long)]
    pub no_sandbox: bool,
}

impl RunArgs {
    /// Layer explicit flags over a base config
    #[must_use]
    pub fn apply(&self, base: HarnessConfig) -> HarnessConfig {
        let mut config = base;
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(headless) = self.headless {
            config.session.headless = headless;
        }
        if let Some(viewport) = self.viewport {
            config.session.viewport = viewport;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.default_step_timeout_ms = timeout_ms;
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
        }
        if self.full_page {
            config.full_page_screenshots = true;
        }
        if let Some(path) = &self.chromium {
            config.session.chromium_path = Some(path.clone());
        }
        if self.no_sandbox {
            config.session.sandbox = false;
        }
        config
    }
}

/// Arguments for the validate command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Scenario file (YAML)
    pub scenario: PathBuf,
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument for CLI
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl From<LogFormatArg> for crate::config::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}
