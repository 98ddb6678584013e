//! Configuration management for the notification service.
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present) with sensible defaults. A missing credential or an unparseable
//! number is a [`ConfigError`].

use notifier_core::AUTH_EVENTS_TOPIC;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable was absent or empty.
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable was present but could not be parsed.
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },
}

/// Log verbosity accepted in `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Treated as `error`; tracing has no fatal level
    Fatal,
    /// Errors only
    Error,
    /// Warnings and above
    Warn,
    /// Informational and above
    #[default]
    Info,
    /// Debug and above
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Fatal | Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!(
                "expected one of fatal, error, warn, info, debug, trace; got '{other}'"
            )),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Process and HTTP settings
    pub server: ServerConfig,
    /// Broker connection settings
    pub kafka: KafkaConfig,
    /// SMTP relay settings
    pub smtp: SmtpConfig,
    /// Product strings for email templates
    pub branding: BrandingConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Service name attached to startup logs
    pub service_name: String,
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Default log verbosity when `RUST_LOG` is unset
    pub log_level: LogLevel,
}

impl ServerConfig {
    /// `host:port` for the HTTP listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Kafka configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// Consumer group
    pub group_id: String,
    /// Client id
    pub client_id: String,
    /// Topic carrying auth events
    pub topic: String,
    /// Connect and initial metadata timeout
    pub connection_timeout: Duration,
    /// Request and admin operation timeout
    pub request_timeout: Duration,
    /// Group session timeout
    pub session_timeout: Duration,
    /// Group heartbeat interval
    pub heartbeat_interval: Duration,
}

/// SMTP configuration
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// Relay host
    pub host: String,
    /// Relay port
    pub port: u16,
    /// Implicit TLS; only the literal `true` enables it
    pub secure: bool,
    /// Authentication username
    pub user: String,
    /// Authentication password
    pub password: String,
    /// Sender address
    pub from: String,
    /// Per-command timeout
    pub timeout: Duration,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Branding configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandingConfig {
    /// Product name used in subjects and bodies
    pub brand_name: String,
    /// Support address shown in the HTML body
    pub support_email: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present;
    /// variables already set in the environment win.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal in containers
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        Ok(Self {
            server: ServerConfig {
                service_name: vars.string_or("SERVICE_NAME", "notification-service"),
                host: vars.string_or("HOST", "0.0.0.0"),
                port: vars.parse_or("PORT", 3005)?,
                log_level: vars.parse_or("LOG_LEVEL", LogLevel::Info)?,
            },
            kafka: KafkaConfig {
                brokers: vars.string_or(
                    "KAFKA_BROKER",
                    "kafka.infrastructure.svc.cluster.local:9092",
                ),
                group_id: vars.string_or("KAFKA_GROUP_ID", "notification-service-group"),
                client_id: vars.string_or("KAFKA_CLIENT_ID", "notification-service"),
                topic: vars.string_or("KAFKA_TOPIC", AUTH_EVENTS_TOPIC),
                connection_timeout: Duration::from_millis(
                    vars.parse_or("KAFKA_CONNECTION_TIMEOUT_MS", 10_000)?,
                ),
                request_timeout: Duration::from_millis(
                    vars.parse_or("KAFKA_REQUEST_TIMEOUT_MS", 30_000)?,
                ),
                session_timeout: Duration::from_millis(
                    vars.parse_or("KAFKA_SESSION_TIMEOUT_MS", 30_000)?,
                ),
                heartbeat_interval: Duration::from_millis(
                    vars.parse_or("KAFKA_HEARTBEAT_INTERVAL_MS", 3_000)?,
                ),
            },
            smtp: SmtpConfig {
                host: vars.string_or("SMTP_HOST", "smtp.gmail.com"),
                port: vars.parse_or("SMTP_PORT", 587)?,
                secure: vars.get("SMTP_SECURE").is_some_and(|v| v == "true"),
                user: vars.required("SMTP_USER")?,
                password: vars.required("SMTP_PASSWORD")?,
                from: vars.required("EMAIL_FROM")?,
                timeout: Duration::from_secs(vars.parse_or("SMTP_TIMEOUT_SECS", 30)?),
            },
            branding: BrandingConfig {
                brand_name: vars.string_or("BRAND_NAME", "FleetOS"),
                support_email: vars.string_or("SUPPORT_EMAIL", "support@fleetos.com"),
            },
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Present and non-blank.
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn string_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var: name,
                reason: e.to_string(),
                value,
            }),
        }
    }
}
