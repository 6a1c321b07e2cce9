use crate::pipeline::fetch::DEFAULT_SEARCH_URL;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;
use url::Url;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_STORE_PATH: &str = "_factagent/checks.wal";
pub const DEFAULT_BRG_ADDR: &str = "127.0.0.1:8787";

/// Runtime settings, read once from the environment and passed down explicitly.
#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub model: String,
    pub api_base: Option<String>,
    pub tavily_api_key: Option<String>,
    pub search_url: Url,
    pub max_results: usize,
    pub excerpt_chars: usize,
    pub max_retries: usize,
    pub max_tokens: u32,
    pub store_path: PathBuf,
    pub max_checks_per_session: u32,
    pub min_seconds_between_checks: u64,
    pub brg_addr: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let search_url = match text("FACTAGENT_SEARCH_URL") {
            Some(raw) => match Url::parse(&raw) {
                Ok(url) => url,
                Err(e) => {
                    warn!(value = %raw, error = %e, "invalid FACTAGENT_SEARCH_URL, using default");
                    Url::parse(DEFAULT_SEARCH_URL)?
                }
            },
            None => Url::parse(DEFAULT_SEARCH_URL)?,
        };

        Ok(Self {
            openai_api_key: text("OPENAI_API_KEY").filter(|k| valid_api_key(k)),
            model: text("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: text("OPENAI_API_BASE"),
            tavily_api_key: text("TAVILY_API_KEY").filter(|k| valid_api_key(k)),
            search_url,
            max_results: number(&lookup, "FACTAGENT_MAX_RESULTS", 5),
            excerpt_chars: number(&lookup, "FACTAGENT_EXCERPT_CHARS", 500),
            max_retries: number(&lookup, "FACTAGENT_MAX_RETRIES", 2),
            max_tokens: number(&lookup, "FACTAGENT_MAX_TOKENS", 4096),
            store_path: text("FACTAGENT_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            max_checks_per_session: number(&lookup, "FACTAGENT_MAX_CHECKS_PER_SESSION", 10),
            min_seconds_between_checks: number(&lookup, "FACTAGENT_MIN_SECONDS_BETWEEN_CHECKS", 30),
            brg_addr: text("FACTAGENT_BRG_ADDR").unwrap_or_else(|| DEFAULT_BRG_ADDR.to_string()),
        })
    }

    pub fn require_openai_key(&self) -> anyhow::Result<&str> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is missing or a placeholder"))
    }

    pub fn require_tavily_key(&self) -> anyhow::Result<&str> {
        self.tavily_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("TAVILY_API_KEY is missing or a placeholder"))
    }
}

fn number<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "malformed number, using default");
            default
        }),
    }
}

/// Rejects empty keys and `sk-...` style placeholders.
pub fn valid_api_key(key: &str) -> bool {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.contains("...") {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn defaults_apply_on_empty_environment() {
        let cfg = config(&[]);
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.search_url.as_str(), "https://api.tavily.com/search");
        assert_eq!(cfg.max_results, 5);
        assert_eq!(cfg.excerpt_chars, 500);
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.max_tokens, 4096);
        assert_eq!(cfg.store_path, PathBuf::from("_factagent/checks.wal"));
        assert_eq!(cfg.max_checks_per_session, 10);
        assert_eq!(cfg.min_seconds_between_checks, 30);
        assert!(cfg.require_openai_key().is_err());
    }

    #[test]
    fn placeholder_keys_are_dropped() {
        let cfg = config(&[("OPENAI_API_KEY", "sk-..."), ("TAVILY_API_KEY", "tvly-real")]);
        assert!(cfg.openai_api_key.is_none());
        assert_eq!(cfg.require_tavily_key().unwrap(), "tvly-real");
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = config(&[
            ("FACTAGENT_MAX_RESULTS", "many"),
            ("FACTAGENT_MAX_RETRIES", " 4 "),
            ("FACTAGENT_SEARCH_URL", "not a url"),
        ]);
        assert_eq!(cfg.max_results, 5);
        assert_eq!(cfg.max_retries, 4);
        assert_eq!(cfg.search_url.as_str(), DEFAULT_SEARCH_URL);
    }

    #[test]
    fn api_key_validation() {
        assert!(valid_api_key("sk-abc"));
        assert!(!valid_api_key("   "));
        assert!(!valid_api_key("sk-...xyz"));
    }
}
