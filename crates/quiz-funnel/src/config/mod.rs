use crate::funnel::flow::{FlowSettings, DEFAULT_FALLBACK_OUTCOME};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_FIXTURE_DIR: &str = "public/json";
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub source: SourceConfig,
    pub flow: FlowSettings,
    /// How long a quiz session is kept after it started.
    pub session_ttl: Duration,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let session_ttl = match env::var("FUNNEL_SESSION_TTL_SECS") {
            Ok(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidSessionTtl)?,
            Err(_) => DEFAULT_SESSION_TTL_SECS,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            source: SourceConfig::from_env()?,
            flow: flow_settings_from_env()?,
            session_ttl: Duration::from_secs(session_ttl),
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where quiz, conditions, and blog data come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// Local `quiz.json`, `conditions.json`, and `blogs.json` files, for debugging.
    Fixture { dir: PathBuf },
    /// The live backend serving `/api/quiz`, `/api/conditions`, and `/api/blogs`.
    Backend { base_url: String, timeout: Duration },
}

impl SourceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let debug = env::var("FUNNEL_DEBUG")
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if debug {
            let dir = env::var("FUNNEL_FIXTURE_DIR").unwrap_or_else(|_| DEFAULT_FIXTURE_DIR.into());
            return Ok(Self::Fixture {
                dir: PathBuf::from(dir),
            });
        }

        let base_url = env::var("FUNNEL_BACKEND_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingBackendUrl)?;
        let timeout = env::var("FUNNEL_FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        Ok(Self::Backend {
            base_url,
            timeout: Duration::from_secs(timeout),
        })
    }
}

fn flow_settings_from_env() -> Result<FlowSettings, ConfigError> {
    let delay_ms = env::var("FUNNEL_TRANSITION_DELAY_MS")
        .unwrap_or_else(|_| "300".to_string())
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidDelay)?;
    let fallback_outcome = env::var("FUNNEL_FALLBACK_OUTCOME")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FALLBACK_OUTCOME.to_string());

    Ok(FlowSettings {
        transition_delay: Duration::from_millis(delay_ms),
        fallback_outcome,
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDelay,
    InvalidTimeout,
    InvalidSessionTtl,
    MissingBackendUrl,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDelay => {
                write!(f, "FUNNEL_TRANSITION_DELAY_MS must be a whole number of milliseconds")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "FUNNEL_FETCH_TIMEOUT_SECS must be a whole number of seconds")
            }
            ConfigError::InvalidSessionTtl => {
                write!(f, "FUNNEL_SESSION_TTL_SECS must be a positive number of seconds")
            }
            ConfigError::MissingBackendUrl => write!(
                f,
                "FUNNEL_BACKEND_URL is required unless FUNNEL_DEBUG=true selects fixtures"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
