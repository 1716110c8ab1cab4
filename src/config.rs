//! Environment configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file by the binaries.

use crate::error::AnalysisError;
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PORT: u16 = 8080;

/// Settings for the Gemini endpoint.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Empty when no credential is configured
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Timing of the analysis flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowConfig {
    pub progress_tick: Duration,
    pub progress_step: u8,
    pub progress_cap: u8,
    /// `None` leaves the model call unbounded
    pub analysis_timeout: Option<Duration>,
}

impl FlowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.progress_tick.is_zero() {
            return Err(AnalysisError::Config("progress tick must be greater than 0".into()));
        }
        if self.progress_step == 0 {
            return Err(AnalysisError::Config("progress step must be greater than 0".into()));
        }
        if self.progress_cap >= 100 {
            return Err(AnalysisError::Config("progress cap must be below 100".into()));
        }
        Ok(())
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            progress_tick: Duration::from_millis(50),
            progress_step: 2,
            progress_cap: 98,
            analysis_timeout: Some(Duration::from_secs(120)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub flow: FlowConfig,
    pub port: u16,
    pub profile_store_path: Option<PathBuf>,
}

impl AppConfig {
    /// Read configuration from the environment.
    ///
    /// A missing API key is not an error here; the analysis client reports
    /// it per attempt so the session can show it.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("API_KEY"))
            .unwrap_or_default();

        let gemini = GeminiConfig {
            api_key,
            model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_empty("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };

        let defaults = FlowConfig::default();
        let analysis_timeout = match parse_var::<u64>(&non_empty, "ANALYSIS_TIMEOUT_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.analysis_timeout,
        };

        let flow = FlowConfig {
            progress_tick: parse_var::<u64>(&non_empty, "PROGRESS_TICK_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.progress_tick),
            progress_step: parse_var(&non_empty, "PROGRESS_STEP")?.unwrap_or(defaults.progress_step),
            progress_cap: parse_var(&non_empty, "PROGRESS_CAP")?.unwrap_or(defaults.progress_cap),
            analysis_timeout,
        };
        flow.validate()?;

        let port = match parse_var(&non_empty, "PORT")? {
            Some(port) => port,
            None => parse_var(&non_empty, "API_PORT")?.unwrap_or(DEFAULT_PORT),
        };

        Ok(Self {
            gemini,
            flow,
            port,
            profile_store_path: non_empty("PROFILE_STORE_PATH").map(PathBuf::from),
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AnalysisError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(!config.gemini.has_credential());
        assert_eq!(config.gemini.model, DEFAULT_MODEL);
        assert_eq!(config.flow, FlowConfig::default());
        assert_eq!(config.port, 8080);
        assert!(config.profile_store_path.is_none());
    }

    #[test]
    fn test_api_key_fallback_and_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("API_KEY", "secret"),
            ("GEMINI_BASE_URL", "http://localhost:9000/"),
            ("ANALYSIS_TIMEOUT_SECS", "0"),
            ("PROGRESS_TICK_MS", "10"),
            ("API_PORT", "9090"),
        ]))
        .unwrap();

        assert_eq!(config.gemini.api_key, "secret");
        assert_eq!(config.gemini.base_url, "http://localhost:9000");
        assert_eq!(config.flow.analysis_timeout, None);
        assert_eq!(config.flow.progress_tick, Duration::from_millis(10));
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));

        let err = AppConfig::from_lookup(lookup_from(&[("PROGRESS_CAP", "100")])).unwrap_err();
        assert!(err.to_string().contains("cap"));

        let err = AppConfig::from_lookup(lookup_from(&[("PROGRESS_STEP", "0")])).unwrap_err();
        assert!(err.to_string().contains("step"));
    }
}
