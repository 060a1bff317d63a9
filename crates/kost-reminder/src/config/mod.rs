use chrono::{FixedOffset, NaiveTime};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

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

/// Top-level configuration for the notifier.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub database: DatabaseConfig,
    pub reminder: ReminderConfig,
    pub channel: ChannelConfig,
}

impl AppConfig {
    /// Load from the process environment, honouring a `.env` file when present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let environment = AppEnvironment::from_str(&var("APP_ENV", "development"));

        let host = var("APP_HOST", "127.0.0.1");
        let port = var("APP_PORT", "5555")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var("APP_LOG_LEVEL", "info");

        let database = DatabaseConfig {
            url: var("DATABASE_URL", "sqlite://data/kost.db"),
        };

        let reminder = ReminderConfig {
            offset_days: parse_number("REMINDER_OFFSET_DAYS", &var("REMINDER_OFFSET_DAYS", "3"))?,
            fire_at: parse_fire_at(&var("REMINDER_FIRE_AT", "18:52"))?,
            utc_offset: parse_utc_offset(&var("REMINDER_UTC_OFFSET", "+07:00"))?,
        };

        let token = lookup("CHANNEL_GATEWAY_TOKEN").filter(|value| !value.trim().is_empty());
        let send_attempts: u32 =
            parse_number("CHANNEL_SEND_ATTEMPTS", &var("CHANNEL_SEND_ATTEMPTS", "1"))?;
        if send_attempts == 0 {
            return Err(ConfigError::Invalid(
                "CHANNEL_SEND_ATTEMPTS must be at least 1",
            ));
        }

        let channel = ChannelConfig {
            gateway_url: var("CHANNEL_GATEWAY_URL", "http://127.0.0.1:3001/"),
            token,
            session: var("CHANNEL_SESSION", "default"),
            status_poll: Duration::from_millis(parse_number(
                "CHANNEL_STATUS_POLL_MS",
                &var("CHANNEL_STATUS_POLL_MS", "5000"),
            )?),
            send_timeout: Duration::from_millis(parse_number(
                "CHANNEL_SEND_TIMEOUT_MS",
                &var("CHANNEL_SEND_TIMEOUT_MS", "15000"),
            )?),
            send_attempts,
            retry_backoff: Duration::from_millis(parse_number(
                "CHANNEL_RETRY_BACKOFF_MS",
                &var("CHANNEL_RETRY_BACKOFF_MS", "500"),
            )?),
        };

        if channel.session.trim().is_empty() {
            return Err(ConfigError::Invalid("CHANNEL_SESSION must be non-empty"));
        }
        if channel.status_poll.is_zero() {
            return Err(ConfigError::Invalid("CHANNEL_STATUS_POLL_MS must be > 0"));
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            database,
            reminder,
            channel,
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

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// When and how far ahead tenants are reminded.
#[derive(Debug, Clone, Copy)]
pub struct ReminderConfig {
    /// Days before the rent date the reminder goes out.
    pub offset_days: u32,
    /// Local wall-clock time of the daily run.
    pub fire_at: NaiveTime,
    /// Fixed timezone every calendar-day comparison is made in.
    pub utc_offset: FixedOffset,
}

/// Messaging gateway connection and delivery settings.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub gateway_url: String,
    pub token: Option<String>,
    pub session: String,
    pub status_poll: Duration,
    pub send_timeout: Duration,
    pub send_attempts: u32,
    pub retry_backoff: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidFireAt { value: String },
    InvalidUtcOffset { value: String },
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer (got '{value}')")
            }
            ConfigError::InvalidFireAt { value } => {
                write!(f, "REMINDER_FIRE_AT must be HH:MM or HH:MM:SS (got '{value}')")
            }
            ConfigError::InvalidUtcOffset { value } => {
                write!(f, "REMINDER_UTC_OFFSET must look like +07:00 (got '{value}')")
            }
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
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

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

fn parse_fire_at(raw: &str) -> Result<NaiveTime, ConfigError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| ConfigError::InvalidFireAt {
            value: raw.to_string(),
        })
}

/// Parses `+HH:MM`, `-HH:MM`, `+HHMM` or `+HH`.
fn parse_utc_offset(raw: &str) -> Result<FixedOffset, ConfigError> {
    let invalid = || ConfigError::InvalidUtcOffset {
        value: raw.to_string(),
    };
    let trimmed = raw.trim();
    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        4 => (
            digits[..2].parse::<i32>().map_err(|_| invalid())?,
            digits[2..].parse::<i32>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };
    if minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
