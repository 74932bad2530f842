//! Runtime configuration.
//!
//! Built by the CLI from flags and environment variables, or constructed
//! directly by library users and tests.

use crate::cables::DEFAULT_TOLERANCE_KM;
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

pub const DEFAULT_DATASET_PATH: &str = "./cable-geo.json";
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_HOPS: u32 = 50;

/// Log verbosity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("max concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("max concurrency must be at most {max} (got {got})")]
    ConcurrencyTooHigh { got: usize, max: usize },

    #[error("cable tolerance must be a finite, non-negative number of km (got {0})")]
    InvalidTolerance(f64),

    #[error("hop limit must be between 1 and 255 (got {0})")]
    InvalidHops(u32),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// GeoJSON cable dataset, loaded once at startup
    pub dataset_path: PathBuf,
    /// PeeringDB API key; anonymous access when unset
    pub peeringdb_api_key: Option<String>,
    /// Upper bound on in-flight provider requests
    pub max_concurrency: usize,
    /// Cable acceptance radius, km
    pub cable_tolerance_km: f64,
    pub provider_timeout: Duration,
    pub host: String,
    pub port: u16,
    /// Prefix traceroute with `sudo` (tcptraceroute needs raw sockets)
    pub trace_use_sudo: bool,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            peeringdb_api_key: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            cable_tolerance_km: DEFAULT_TOLERANCE_KM,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            host: "127.0.0.1".into(),
            port: 8000,
            trace_use_sudo: cfg!(unix),
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(ConfigError::ConcurrencyTooHigh {
                got: self.max_concurrency,
                max: Semaphore::MAX_PERMITS,
            });
        }
        if !self.cable_tolerance_km.is_finite() || self.cable_tolerance_km < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.cable_tolerance_km));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Check a traceroute hop limit.
pub fn validate_hops(hops: u32) -> Result<u32, ConfigError> {
    if (1..=255).contains(&hops) {
        Ok(hops)
    } else {
        Err(ConfigError::InvalidHops(hops))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cable_tolerance_km, 30.0);
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
    }

    #[test]
    fn test_zero_concurrency() {
        let config = Config { max_concurrency: 0, ..Config::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroConcurrency));
    }

    #[test]
    fn test_concurrency_above_permit_limit() {
        let config = Config { max_concurrency: usize::MAX, ..Config::default() };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ConcurrencyTooHigh { got: usize::MAX, max: Semaphore::MAX_PERMITS })
        );

        let at_limit = Config { max_concurrency: Semaphore::MAX_PERMITS, ..Config::default() };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_bad_tolerance() {
        for tol in [-1.0, f64::INFINITY] {
            let config = Config { cable_tolerance_km: tol, ..Config::default() };
            assert!(matches!(config.validate(), Err(ConfigError::InvalidTolerance(_))));
        }
        let nan = Config { cable_tolerance_km: f64::NAN, ..Config::default() };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_hops() {
        assert_eq!(validate_hops(30), Ok(30));
        assert_eq!(validate_hops(0), Err(ConfigError::InvalidHops(0)));
        assert!(validate_hops(256).is_err());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(log::LevelFilter::from(LogLevel::Warn), log::LevelFilter::Warn);
    }
}
