use crate::config::TelemetryConfig;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("log filter '{directives}' is not a valid tracing directive list")]
    InvalidFilter {
        directives: String,
        #[source]
        source: ParseError,
    },
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// `RUST_LOG` wins; otherwise the configured level applies.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => {
            EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::InvalidFilter {
                directives: config.log_level.clone(),
                source,
            })
        }
    }
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = env_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_filter_from_directives() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "kost_reminder=debug,info".to_string(),
        };
        let filter = env_filter(&config).expect("valid directives");
        assert!(filter.to_string().contains("kost_reminder=debug"));
    }

    #[test]
    fn rejects_malformed_directives() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "kost_reminder=loud".to_string(),
        };
        match env_filter(&config) {
            Err(err @ TelemetryError::InvalidFilter { .. }) => {
                assert!(err.to_string().contains("'kost_reminder=loud'"));
                assert!(std::error::Error::source(&err).is_some());
            }
            other => panic!("expected filter error, got {other:?}"),
        }
    }

    #[test]
    fn second_install_reports_existing_subscriber() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "warn".to_string(),
        };
        // The first call may lose to a subscriber installed by another test.
        let _ = init(&config);
        match init(&config) {
            Err(err @ TelemetryError::AlreadyInstalled(_)) => {
                assert_eq!(err.to_string(), "a global tracing subscriber is already installed");
            }
            other => panic!("expected install error, got {other:?}"),
        }
    }
}
