use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StorageError};
use crate::storage::remote::RetryPolicy;

/// Remote endpoint settings. Present only when both URL and key are set.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub url: String,
    /// Anonymous/service key sent as `apikey` and bearer token.
    pub api_key: String,
    pub request_timeout: Duration,
    pub probe_timeout: Duration,
    /// How often reachability is re-checked in the background. `None`
    /// disables the watcher.
    pub connectivity_interval: Option<Duration>,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            connectivity_interval: Some(Duration::from_millis(DEFAULT_CONNECTIVITY_INTERVAL_MS)),
        }
    }

    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.base_url())
    }

    /// Endpoints tried, in order, before committing to the remote backend.
    pub fn candidate_endpoints(&self) -> Vec<String> {
        vec![
            format!("{}/", self.rest_url()),
            format!("{}/auth/v1/health", self.base_url()),
            self.base_url().to_string(),
        ]
    }
}

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub remote: Option<RemoteConfig>,
    pub retry: RetryPolicy,
}

const DEFAULT_DB_PATH: &str = "chainwatch.db";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_CONNECTIVITY_INTERVAL_MS: u64 = 30_000;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_UNIT_MS: u64 = 1_000;

impl StoreConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                               | Default               |
    /// |---------------------------------------|-----------------------|
    /// | `CHAINWATCH_DB_PATH`                  | `chainwatch.db`       |
    /// | `CHAINWATCH_REMOTE_URL`               | unset                 |
    /// | `CHAINWATCH_REMOTE_KEY`               | unset                 |
    /// | `CHAINWATCH_REQUEST_TIMEOUT_MS`       | `10000`               |
    /// | `CHAINWATCH_PROBE_TIMEOUT_MS`         | `3000`                |
    /// | `CHAINWATCH_CONNECTIVITY_INTERVAL_MS` | `30000`, `0` disables |
    /// | `CHAINWATCH_RETRY_ATTEMPTS`           | `3`                   |
    /// | `CHAINWATCH_RETRY_UNIT_MS`            | `1000`                |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db_path = var("CHAINWATCH_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.into());

        let request_timeout_ms: u64 = parse_or(
            &var,
            "CHAINWATCH_REQUEST_TIMEOUT_MS",
            DEFAULT_REQUEST_TIMEOUT_MS,
        )?;
        let probe_timeout_ms: u64 =
            parse_or(&var, "CHAINWATCH_PROBE_TIMEOUT_MS", DEFAULT_PROBE_TIMEOUT_MS)?;
        let connectivity_interval_ms: u64 = parse_or(
            &var,
            "CHAINWATCH_CONNECTIVITY_INTERVAL_MS",
            DEFAULT_CONNECTIVITY_INTERVAL_MS,
        )?;
        let retry_attempts: u32 =
            parse_or(&var, "CHAINWATCH_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS)?;
        let retry_unit_ms: u64 = parse_or(&var, "CHAINWATCH_RETRY_UNIT_MS", DEFAULT_RETRY_UNIT_MS)?;

        if retry_attempts == 0 {
            return Err(StorageError::InvalidConfig(
                "CHAINWATCH_RETRY_ATTEMPTS must be at least 1".into(),
            ));
        }

        let remote = match (var("CHAINWATCH_REMOTE_URL"), var("CHAINWATCH_REMOTE_KEY")) {
            (Some(url), Some(api_key)) => Some(RemoteConfig {
                url,
                api_key,
                request_timeout: Duration::from_millis(request_timeout_ms),
                probe_timeout: Duration::from_millis(probe_timeout_ms),
                connectivity_interval: (connectivity_interval_ms > 0)
                    .then(|| Duration::from_millis(connectivity_interval_ms)),
            }),
            (Some(_), None) => {
                return Err(StorageError::InvalidConfig(
                    "CHAINWATCH_REMOTE_URL is set but CHAINWATCH_REMOTE_KEY is missing".into(),
                ))
            }
            _ => None,
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            remote,
            retry: RetryPolicy {
                max_attempts: retry_attempts,
                unit: Duration::from_millis(retry_unit_ms),
            },
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        self.remote
            .as_ref()
            .map(|r| r.probe_timeout)
            .unwrap_or(Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS))
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match var(key) {
        Some(raw) => raw.parse().map_err(|_| {
            StorageError::InvalidConfig(format!("{key} must be a number, got \"{raw}\""))
        }),
        None => Ok(default),
    }
}
