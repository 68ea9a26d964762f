use anyhow::{bail, Context, Result};

use crate::errors::AppError;
use crate::llm_client::Provider;

const DEFAULT_SCORING_CONCURRENCY: usize = 4;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Application configuration loaded from environment variables.
/// API keys are optional here; a run that needs one asks for it via
/// [`Config::api_key`].
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub scoring_concurrency: usize,
    pub llm_timeout_secs: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let scoring_concurrency =
            parse_env("CVGEN_SCORING_CONCURRENCY", DEFAULT_SCORING_CONCURRENCY)?;
        if scoring_concurrency == 0 {
            bail!("CVGEN_SCORING_CONCURRENCY must be at least 1");
        }

        Ok(Config {
            openai_api_key: optional_env("OPENAI_API_KEY"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            scoring_concurrency,
            llm_timeout_secs: parse_env("CVGEN_LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn api_key(&self, provider: Provider) -> Result<String, AppError> {
        let key = match provider {
            Provider::OpenAi => &self.openai_api_key,
            Provider::Claude => &self.anthropic_api_key,
        };
        key.clone().ok_or_else(|| {
            AppError::Config(format!(
                "Required environment variable '{}' is not set (or use --scorer keyword)",
                provider.api_key_var()
            ))
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            openai_api_key: Some("sk-test".to_string()),
            anthropic_api_key: None,
            scoring_concurrency: 4,
            llm_timeout_secs: 60,
            rust_log: "info".to_string(),
        }
    }

    #[test]
    fn test_api_key_present() {
        assert_eq!(config().api_key(Provider::OpenAi).unwrap(), "sk-test");
    }

    #[test]
    fn test_api_key_missing_names_variable() {
        let err = config().api_key(Provider::Claude).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_parse_env_default_when_unset() {
        let value: u64 = parse_env("CVGEN_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
