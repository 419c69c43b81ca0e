//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{CliArgs, Command, RenderArgs, RenderOverrides, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "letter-generator";
const ENV_PREFIX: &str = "LETTER_GENERATOR";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_COMPILER_PATH: &str = "pdflatex";
pub(crate) const DEFAULT_COMPILER_TIMEOUT_SECS: u64 = 60;
pub(crate) const DEFAULT_TEMPLATES_DIR: &str = "templates";
const WORKSPACE_DIR_NAME: &str = "letter-generator";

/// Root for per-request workspaces when none is configured.
pub(crate) fn default_workspace_dir() -> PathBuf {
    tempfile::env::temp_dir().join(WORKSPACE_DIR_NAME)
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    /// Prometheus listener; `None` keeps the exporter off.
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub compiler_path: PathBuf,
    pub compiler_timeout: Duration,
    pub templates_dir: PathBuf,
    pub workspace_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_render_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(port) = overrides.server_metrics_port {
            self.server.metrics_port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_render_overrides(&overrides.render);
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(path) = overrides.compiler_path.as_ref() {
            self.render.compiler_path = Some(path.clone());
        }
        if let Some(seconds) = overrides.compiler_timeout_seconds {
            self.render.compiler_timeout_seconds = Some(seconds);
        }
        if let Some(dir) = overrides.templates_dir.as_ref() {
            self.render.templates_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.workspace_dir.as_ref() {
            self.render.workspace_dir = Some(dir.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            render,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let render = build_render_settings(render)?;

        Ok(Self {
            server,
            logging,
            render,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let metrics_addr = match server.metrics_port {
        None => None,
        Some(0) => {
            return Err(LoadError::invalid(
                "server.metrics_port",
                "port must be greater than zero",
            ));
        }
        Some(metrics_port) if metrics_port == port => {
            return Err(LoadError::invalid(
                "server.metrics_port",
                "must differ from server.port",
            ));
        }
        Some(metrics_port) => Some(SocketAddr::new(addr.ip(), metrics_port)),
    };

    Ok(ServerSettings { addr, metrics_addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let compiler_path = non_empty_path(
        render.compiler_path,
        DEFAULT_COMPILER_PATH,
        "render.compiler_path",
    )?;
    let templates_dir = non_empty_path(
        render.templates_dir,
        DEFAULT_TEMPLATES_DIR,
        "render.templates_dir",
    )?;

    let workspace_dir = render
        .workspace_dir
        .unwrap_or_else(default_workspace_dir);
    if workspace_dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "render.workspace_dir",
            "path must not be empty",
        ));
    }

    let timeout_secs = render
        .compiler_timeout_seconds
        .unwrap_or(DEFAULT_COMPILER_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "render.compiler_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RenderSettings {
        compiler_path,
        compiler_timeout: Duration::from_secs(timeout_secs),
        templates_dir,
        workspace_dir,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    compiler_path: Option<PathBuf>,
    compiler_timeout_seconds: Option<u64>,
    templates_dir: Option<PathBuf>,
    workspace_dir: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty_path(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let path = value.unwrap_or_else(|| PathBuf::from(default));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(path)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
