use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the letter generator binary.
#[derive(Debug, Parser)]
#[command(
    name = "letter-generator",
    version,
    about = "Typeset formal German letters with pdflatex"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "LETTER_GENERATOR_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Render a single letter from a TOML file and write the PDF to disk.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RenderOverrides,

    /// TOML file holding the letter fields (same keys as the web form).
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Where to write the generated PDF.
    #[arg(
        long,
        value_name = "FILE",
        value_hint = ValueHint::FilePath,
        default_value = "letter.pdf"
    )]
    pub output: PathBuf,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the LaTeX compiler executable.
    #[arg(long = "render-compiler-path", value_name = "PATH")]
    pub compiler_path: Option<PathBuf>,

    /// Override the per-pass compiler timeout.
    #[arg(long = "render-compiler-timeout-seconds", value_name = "SECONDS")]
    pub compiler_timeout_seconds: Option<u64>,

    /// Override the directory holding the letter and error templates.
    #[arg(long = "render-templates-dir", value_name = "PATH")]
    pub templates_dir: Option<PathBuf>,

    /// Override the root directory for per-request workspaces.
    #[arg(long = "render-workspace-dir", value_name = "PATH")]
    pub workspace_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Serve Prometheus metrics on this port (same host); off when unset.
    #[arg(long = "server-metrics-port", value_name = "PORT")]
    pub server_metrics_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
