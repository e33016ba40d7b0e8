use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::dispatcher::DispatchConfig;
use crate::error::{EnvVarError, Error};
use crate::gate::RateLimit;

pub const DEFAULT_BASE_URL: &str = "https://api.rocketleaguestats.com";
pub const DEFAULT_API_VERSION: &str = "v1";

pub const API_KEY_VAR: &str = "RLSTATS_API_KEY";
const API_VERSION_VAR: &str = "RLSTATS_API_VERSION";
const BASE_URL_VAR: &str = "RLSTATS_BASE_URL";
const TIMEOUT_VAR: &str = "RLSTATS_TIMEOUT_SECS";
const RATE_LIMIT_VAR: &str = "RLSTATS_RATE_LIMIT";
const RATE_INTERVAL_VAR: &str = "RLSTATS_RATE_INTERVAL_MS";
const MAX_IN_FLIGHT_VAR: &str = "RLSTATS_MAX_IN_FLIGHT";
const QUEUE_CAPACITY_VAR: &str = "RLSTATS_QUEUE_CAPACITY";

/// Everything a [`RlStatsClient`](crate::RlStatsClient) needs.
///
/// The rate limit defaults to 2 requests per second, the documented limit of
/// the public API; override it if your key has a different quota.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub api_version: String,
    pub base_url: String,
    pub timeout: Duration,
    pub dispatch: DispatchConfig,
}

impl Config {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(30),
            dispatch: DispatchConfig::default(),
        }
    }

    // requires RLSTATS_API_KEY env var, everything else is optional
    // can use dotenv
    pub fn from_env() -> Result<Self, Error> {
        let api_key = env::var(API_KEY_VAR).map_err(|e| EnvVarError::new(API_KEY_VAR, e))?;
        let mut config = Self::new(api_key);

        if let Some(version) = optional(API_VERSION_VAR) {
            config.api_version = version;
        }
        if let Some(url) = optional(BASE_URL_VAR) {
            config.base_url = url;
        }
        if let Some(secs) = parsed::<u64>(TIMEOUT_VAR)? {
            config.timeout = Duration::from_secs(secs);
        }

        let requests = parsed::<u32>(RATE_LIMIT_VAR)?;
        let interval = parsed::<u64>(RATE_INTERVAL_VAR)?;
        if requests.is_some() || interval.is_some() {
            let current = config.dispatch.rate_limit;
            config.dispatch.rate_limit = RateLimit::new(
                requests.unwrap_or(current.requests),
                interval.map_or(current.per, Duration::from_millis),
            );
        }

        if let Some(max) = parsed::<usize>(MAX_IN_FLIGHT_VAR)? {
            config.dispatch.max_in_flight = max.max(1);
        }
        if let Some(capacity) = parsed::<usize>(QUEUE_CAPACITY_VAR)? {
            config.dispatch.queue_capacity = Some(capacity);
        }

        Ok(config)
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.dispatch.rate_limit = rate_limit;
        self
    }

    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.dispatch.max_in_flight = max.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.dispatch.queue_capacity = Some(capacity);
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch.drain_timeout = timeout;
        self
    }
}

fn optional(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(var: &str) -> Result<Option<T>, EnvVarError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(var)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| EnvVarError::invalid(var, &raw, e))
        })
        .transpose()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("asdf1234");
        assert_eq!(config.api_key, "asdf1234");
        assert_eq!(config.api_version, "v1");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.dispatch.rate_limit, RateLimit::per_second(2));
        assert_eq!(config.dispatch.queue_capacity, None);
    }

    #[test]
    fn test_builder() {
        let config = Config::new("k")
            .with_api_version("v2")
            .with_base_url("http://localhost:1234")
            .with_rate_limit(RateLimit::new(10, Duration::from_secs(60)))
            .with_max_in_flight(0)
            .with_queue_capacity(100);

        assert_eq!(config.api_version, "v2");
        assert_eq!(config.base_url, "http://localhost:1234");
        assert_eq!(config.dispatch.rate_limit.requests, 10);
        assert_eq!(config.dispatch.max_in_flight, 1);
        assert_eq!(config.dispatch.queue_capacity, Some(100));
    }

    // the only test in the crate that touches the process environment, so
    // the variables are not raced by parallel tests
    #[test]
    fn test_from_env() {
        env::remove_var(API_KEY_VAR);
        assert!(matches!(Config::from_env(), Err(Error::EnvVar(_))));

        env::set_var(API_KEY_VAR, "asdf1234");
        env::set_var(RATE_LIMIT_VAR, "5");
        env::set_var(RATE_INTERVAL_VAR, "2000");
        env::set_var(QUEUE_CAPACITY_VAR, "64");
        let config = Config::from_env().unwrap();
        assert_eq!(config.api_key, "asdf1234");
        assert_eq!(
            config.dispatch.rate_limit,
            RateLimit::new(5, Duration::from_millis(2000))
        );
        assert_eq!(config.dispatch.queue_capacity, Some(64));

        env::set_var(MAX_IN_FLIGHT_VAR, "lots");
        match Config::from_env() {
            Err(Error::EnvVar(e)) => assert_eq!(e.var(), MAX_IN_FLIGHT_VAR),
            other => panic!("expected env var error, got {other:?}"),
        }

        for var in [
            API_KEY_VAR,
            RATE_LIMIT_VAR,
            RATE_INTERVAL_VAR,
            QUEUE_CAPACITY_VAR,
            MAX_IN_FLIGHT_VAR,
        ] {
            env::remove_var(var);
        }
    }
}
