use std::env;
use std::str::FromStr;
use std::time::Duration;

use switchboard_core::{Language, DEFAULT_CLARIFY_THRESHOLD, DEFAULT_LLM_TIMEOUT};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub history_cap: usize,
    pub memory_cap: usize,
    pub clarify_threshold: f32,
    pub llm_timeout: Duration,
    pub action_timeout: Duration,
    pub max_call_targets: usize,
    pub offer_validity_days: i64,
    pub default_language: Language,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            history_cap: 200,
            memory_cap: 200,
            clarify_threshold: DEFAULT_CLARIFY_THRESHOLD,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
            action_timeout: Duration::from_secs(5),
            max_call_targets: 25,
            offer_validity_days: 14,
            default_language: Language::En,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overridden by `SWITCHBOARD_*` variables. Unparseable values
    /// are skipped with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            history_cap: env_parse("SWITCHBOARD_HISTORY_CAP")
                .filter(|cap: &usize| *cap > 0)
                .unwrap_or(defaults.history_cap),
            memory_cap: env_parse("SWITCHBOARD_MEMORY_CAP")
                .filter(|cap: &usize| *cap > 0)
                .unwrap_or(defaults.memory_cap),
            clarify_threshold: env_parse("SWITCHBOARD_CLARIFY_THRESHOLD")
                .filter(|value: &f32| (0.0..=1.0).contains(value))
                .unwrap_or(defaults.clarify_threshold),
            llm_timeout: env_parse("SWITCHBOARD_LLM_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.llm_timeout),
            action_timeout: env_parse("SWITCHBOARD_ACTION_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.action_timeout),
            max_call_targets: env_parse("SWITCHBOARD_MAX_CALL_TARGETS")
                .unwrap_or(defaults.max_call_targets),
            offer_validity_days: env_parse("SWITCHBOARD_OFFER_VALIDITY_DAYS")
                .filter(|days: &i64| *days > 0)
                .unwrap_or(defaults.offer_validity_days),
            default_language: env::var("SWITCHBOARD_DEFAULT_LANGUAGE")
                .ok()
                .and_then(|value| Language::from_optional_str(Some(&value)))
                .unwrap_or(defaults.default_language),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring invalid configuration value");
            None
        }
    }
}
