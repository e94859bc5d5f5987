//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "mdpreview";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DOCUMENT_ROOT: &str = ".";
const DEFAULT_DOCUMENT_EXTENSION: &str = "md";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SESSION_COOKIE: &str = "mdpreview_session";
const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 1440;
pub const DEFAULT_API_URL: &str = "https://api.github.com/markdown/raw";
pub const DEFAULT_USER_AGENT: &str = concat!("mdpreview/", env!("CARGO_PKG_VERSION"));

/// Command-line arguments for the mdpreview binary.
#[derive(Debug, Parser)]
#[command(
    name = "mdpreview",
    version,
    about = "Preview local Markdown through the GitHub Markdown API"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MDPREVIEW_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the preview HTTP server.
    Serve(Box<ServeArgs>),
    /// Render a single Markdown file and print the HTML.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RemoteOverrides {
    /// Override the remote Markdown API endpoint.
    #[arg(long = "remote-api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Override the username sent with basic authentication.
    #[arg(long = "remote-username", value_name = "USER")]
    pub username: Option<String>,

    /// Override the API token.
    #[arg(long = "remote-token", env = "MDPREVIEW_REMOTE_TOKEN", value_name = "TOKEN")]
    pub token: Option<String>,

    /// Override the remote call timeout.
    #[arg(long = "remote-timeout-seconds", value_name = "SECONDS")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub remote: RemoteOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the directory Markdown documents are served from.
    #[arg(long = "document-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub document_root: Option<PathBuf>,

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

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub remote: RemoteOverrides,

    /// Emit a complete HTML page instead of the bare rendered body.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub page: bool,

    /// Markdown file to render.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub documents: DocumentSettings,
    pub remote: RemoteSettings,
    pub session: SessionSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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
pub struct DocumentSettings {
    pub root: PathBuf,
    pub extension: String,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub api_url: Url,
    pub user_agent: String,
    pub username: Option<String>,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub idle_ttl: Duration,
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

    builder = builder.add_source(Environment::with_prefix("MDPREVIEW").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_remote_overrides(&args.remote),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    documents: RawDocumentSettings,
    remote: RawRemoteSettings,
    session: RawSessionSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(root) = overrides.document_root.as_ref() {
            self.documents.root = Some(root.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_remote_overrides(&overrides.remote);
    }

    fn apply_remote_overrides(&mut self, overrides: &RemoteOverrides) {
        if let Some(url) = overrides.api_url.as_ref() {
            self.remote.api_url = Some(url.clone());
        }
        if let Some(username) = overrides.username.as_ref() {
            self.remote.username = Some(username.clone());
        }
        if let Some(token) = overrides.token.as_ref() {
            self.remote.token = Some(token.clone());
        }
        if let Some(seconds) = overrides.timeout_seconds {
            self.remote.timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            documents,
            remote,
            session,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            documents: build_document_settings(documents)?,
            remote: build_remote_settings(remote)?,
            session: build_session_settings(session)?,
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

    Ok(ServerSettings { addr })
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

fn build_document_settings(documents: RawDocumentSettings) -> Result<DocumentSettings, LoadError> {
    let root = documents
        .root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENT_ROOT));
    if root.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "documents.root",
            "path must not be empty",
        ));
    }

    let extension = documents
        .extension
        .unwrap_or_else(|| DEFAULT_DOCUMENT_EXTENSION.to_string());
    let extension = extension.trim().trim_start_matches('.').to_string();
    if extension.is_empty() || extension.contains('/') {
        return Err(LoadError::invalid(
            "documents.extension",
            "must be a non-empty file extension",
        ));
    }

    Ok(DocumentSettings { root, extension })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let api_url = remote
        .api_url
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_url = Url::parse(api_url.trim())
        .map_err(|err| LoadError::invalid("remote.api_url", format!("failed to parse: {err}")))?;
    if !matches!(api_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "remote.api_url",
            "scheme must be http or https",
        ));
    }

    let user_agent = remote
        .user_agent
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    let username = non_empty(remote.username);
    let token = non_empty(remote.token);
    if username.is_some() && token.is_none() {
        return Err(LoadError::invalid(
            "remote.token",
            "a token is required when a username is configured",
        ));
    }

    let timeout_secs = remote
        .timeout_seconds
        .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "remote.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RemoteSettings {
        api_url,
        user_agent,
        username,
        token,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_session_settings(session: RawSessionSettings) -> Result<SessionSettings, LoadError> {
    let cookie_name = session
        .cookie_name
        .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string());
    let valid = !cookie_name.is_empty()
        && cookie_name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.'));
    if !valid {
        return Err(LoadError::invalid(
            "session.cookie_name",
            "must be a non-empty token of letters, digits, `_`, `-` or `.`",
        ));
    }

    let idle_ttl_secs = session
        .idle_ttl_seconds
        .unwrap_or(DEFAULT_SESSION_IDLE_TTL_SECS);
    if idle_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "session.idle_ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SessionSettings {
        cookie_name,
        idle_ttl: Duration::from_secs(idle_ttl_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDocumentSettings {
    root: Option<PathBuf>,
    extension: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    api_url: Option<String>,
    user_agent: Option<String>,
    username: Option<String>,
    token: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    cookie_name: Option<String>,
    idle_ttl_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
