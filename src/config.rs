use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::pipeline::reasoning::Provider;

/// Application-level constants
pub const APP_NAME: &str = "clinical-risk-worker";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of every worker setting in the environment.
const ENV_PREFIX: &str = "RISK_WORKER_";

/// Fallback chain used when `RISK_WORKER_BACKENDS` is unset.
pub const DEFAULT_BACKENDS: &str = "groq:llama-3.3-70b-versatile,groq:llama-3.1-70b-versatile";

/// Tracing filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "clinical_risk_worker=info"
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown reasoning provider: {0}")]
    UnknownProvider(String),

    #[error("Malformed backend entry {0:?} (expected provider:model)")]
    MalformedBackend(String),

    #[error("No reasoning backends configured")]
    EmptyChain,

    #[error("{provider} is in the backend chain but {variable} is not set")]
    MissingCredential {
        provider: &'static str,
        variable: &'static str,
    },
}

/// One entry of the fallback chain.
#[derive(Clone)]
pub struct BackendSpec {
    pub provider: Provider,
    pub model: String,
    pub credential: Option<Zeroizing<String>>,
    pub base_url: Option<String>,
}

impl BackendSpec {
    /// `provider/model`, as written to logs.
    pub fn label(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl std::fmt::Debug for BackendSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSpec")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 2000,
        }
    }
}

/// Everything the worker needs to run, resolved once at start-up.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_path: PathBuf,
    /// Maximum candidates analysed per cycle.
    pub batch_size: u32,
    /// Sleep between two cycles.
    pub cycle_interval: Duration,
    /// Age after which an analysis is re-run, and after which an analysis of a
    /// discharged patient is archived.
    pub validity_window: chrono::Duration,
    /// Re-analyse as soon as the tracked clinical fields change.
    pub fingerprint_staleness: bool,
    /// 0 runs until interrupted.
    pub max_cycles: u32,
    pub call_timeout: Duration,
    /// Minimum gap between two outbound reasoning calls.
    pub pacing_delay: Duration,
    /// Sleep after a cycle failed as a whole.
    pub fatal_cooldown: Duration,
    pub generation: GenerationParams,
    pub backends: Vec<BackendSpec>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("risk_analysis.db"),
            batch_size: 30,
            cycle_interval: Duration::from_secs(300),
            validity_window: chrono::Duration::hours(24),
            fingerprint_staleness: true,
            max_cycles: 0,
            call_timeout: Duration::from_secs(30),
            pacing_delay: Duration::from_millis(2000),
            fatal_cooldown: Duration::from_secs(60),
            generation: GenerationParams::default(),
            backends: Vec::new(),
        }
    }
}

impl WorkerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let setting = |name: &str| get(&format!("{ENV_PREFIX}{name}"));
        let defaults = Self::default();

        let database_path = setting("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let batch_size: u32 = parse_setting(&setting, "BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 {
            return Err(invalid("BATCH_SIZE", "0", "must be at least 1"));
        }

        let interval_secs: u64 = parse_setting(&setting, "CYCLE_INTERVAL_SECS", 300)?;

        let validity_hours: u32 = parse_setting(&setting, "VALIDITY_HOURS", 24)?;
        if validity_hours == 0 {
            return Err(invalid("VALIDITY_HOURS", "0", "must be at least 1"));
        }

        let fingerprint_staleness = match setting("FINGERPRINT_STALENESS") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| invalid("FINGERPRINT_STALENESS", &raw, "expected true or false"))?,
            None => defaults.fingerprint_staleness,
        };

        let max_cycles: u32 = parse_setting(&setting, "MAX_CYCLES", defaults.max_cycles)?;

        let timeout_secs: u64 = parse_setting(&setting, "CALL_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(invalid("CALL_TIMEOUT_SECS", "0", "must be at least 1"));
        }

        let pacing_ms: u64 = parse_setting(&setting, "PACING_MS", 2000)?;
        let cooldown_secs: u64 = parse_setting(&setting, "COOLDOWN_SECS", 60)?;

        let temperature: f32 =
            parse_setting(&setting, "TEMPERATURE", defaults.generation.temperature)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(invalid("TEMPERATURE", &temperature.to_string(), "must be within 0.0..=2.0"));
        }
        let max_tokens: u32 = parse_setting(&setting, "MAX_TOKENS", defaults.generation.max_tokens)?;
        if max_tokens == 0 {
            return Err(invalid("MAX_TOKENS", "0", "must be at least 1"));
        }

        let chain = setting("BACKENDS").unwrap_or_else(|| DEFAULT_BACKENDS.to_string());
        let backends = parse_backend_chain(&chain, &get)?;

        Ok(Self {
            database_path,
            batch_size,
            cycle_interval: Duration::from_secs(interval_secs),
            validity_window: chrono::Duration::hours(i64::from(validity_hours)),
            fingerprint_staleness,
            max_cycles,
            call_timeout: Duration::from_secs(timeout_secs),
            pacing_delay: Duration::from_millis(pacing_ms),
            fatal_cooldown: Duration::from_secs(cooldown_secs),
            generation: GenerationParams {
                temperature,
                max_tokens,
            },
            backends,
        })
    }

    /// Human-readable chain, e.g. `groq/llama-3.3-70b-versatile -> openai/gpt-4o-mini`.
    pub fn chain_description(&self) -> String {
        self.backends
            .iter()
            .map(BackendSpec::label)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Parse `provider:model[,provider:model…]`, resolving credentials and
/// endpoint overrides for each provider.
fn parse_backend_chain<G>(chain: &str, get: &G) -> Result<Vec<BackendSpec>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let mut backends = Vec::new();

    for entry in chain.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (provider_raw, model) = entry
            .split_once(':')
            .ok_or_else(|| ConfigError::MalformedBackend(entry.to_string()))?;
        let model = model.trim();
        if model.is_empty() {
            return Err(ConfigError::MalformedBackend(entry.to_string()));
        }

        let provider = Provider::from_str(provider_raw)
            .ok_or_else(|| ConfigError::UnknownProvider(provider_raw.trim().to_string()))?;

        let credential = match provider.credential_env() {
            Some(variable) => {
                let key = get(variable).ok_or(ConfigError::MissingCredential {
                    provider: provider.as_str(),
                    variable,
                })?;
                Some(Zeroizing::new(key.trim().to_string()))
            }
            None => None,
        };

        backends.push(BackendSpec {
            provider,
            model: model.to_string(),
            credential,
            base_url: get(provider.base_url_env()),
        });
    }

    if backends.is_empty() {
        return Err(ConfigError::EmptyChain);
    }
    Ok(backends)
}

fn parse_setting<T, S>(setting: &S, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    S: Fn(&str) -> Option<String>,
{
    match setting(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(name, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: format!("{ENV_PREFIX}{name}"),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
