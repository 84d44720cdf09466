use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_TOKENS: i32 = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub context: ContextConfig,
    pub generator: GeneratorConfig,
    pub otlp_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    /// Empty disables record lookups entirely.
    pub uri: String,
    pub database: String,
    /// `users` for the profile store, `patients` for the clinical store.
    pub records_collection: String,
}

impl MongoConfig {
    pub fn is_enabled(&self) -> bool {
        !self.uri.trim().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    pub lookup_timeout_ms: u64,
    /// Number of text-search hits added as related records. 0 disables search.
    pub related_records_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key: String,
    /// Generation endpoint URL for the Hugging Face provider.
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_tokens: i32,
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which text generation backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// No model: every answer comes from the keyword fallback.
    None,
    Gemini,
    HuggingFace,
    Mock,
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(ProviderKind::None),
            "gemini" => Ok(ProviderKind::Gemini),
            "huggingface" | "hf" => Ok(ProviderKind::HuggingFace),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown GENERATOR_PROVIDER '{}' (expected none, gemini, huggingface or mock)",
                other
            ))),
        }
    }
}

impl AssistantConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let provider: ProviderKind = get_env("GENERATOR_PROVIDER", Some("none"), is_prod)?.parse()?;

        let generator = GeneratorConfig {
            provider,
            model: optional_env("GENERATOR_MODEL", default_model(provider)),
            api_key: optional_env("GENERATOR_API_KEY", ""),
            endpoint: optional_env("GENERATOR_ENDPOINT", ""),
            timeout_secs: parse_env(
                "GENERATOR_TIMEOUT_SECS",
                DEFAULT_GENERATOR_TIMEOUT_SECS,
                is_prod,
            )?,
            max_tokens: parse_env("GENERATOR_MAX_TOKENS", DEFAULT_MAX_TOKENS, is_prod)?,
        };
        generator.validate();

        Ok(AssistantConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some(""), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("medwallet"), is_prod)?,
                records_collection: get_env("RECORDS_COLLECTION", Some("users"), is_prod)?,
            },
            context: ContextConfig {
                lookup_timeout_ms: parse_env(
                    "CONTEXT_LOOKUP_TIMEOUT_MS",
                    DEFAULT_LOOKUP_TIMEOUT_MS,
                    is_prod,
                )?,
                related_records_limit: parse_env("RELATED_RECORDS_LIMIT", 0, is_prod)?,
            },
            generator,
            otlp_endpoint: optional_env("OTLP_ENDPOINT", "http://tempo:4317"),
        })
    }
}

impl GeneratorConfig {
    /// Warn about provider selections that cannot work. Startup continues and
    /// answers come from the fallback table. Returns whether the settings look usable.
    pub fn validate(&self) -> bool {
        let missing = match self.provider {
            ProviderKind::Gemini if self.api_key.trim().is_empty() => Some("GENERATOR_API_KEY"),
            ProviderKind::HuggingFace if self.endpoint.trim().is_empty() => {
                Some("GENERATOR_ENDPOINT")
            }
            _ => None,
        };

        match missing {
            Some(key) => {
                tracing::warn!(
                    provider = ?self.provider,
                    "{} is not set, text generation is disabled",
                    key
                );
                false
            }
            None => true,
        }
    }
}

fn default_model(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Gemini => "gemini-2.0-flash",
        ProviderKind::HuggingFace => "microsoft/DialoGPT-medium",
        ProviderKind::None | ProviderKind::Mock => "",
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Provider-specific settings are never required by environment alone.
fn optional_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr + ToString,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(&default.to_string()), is_prod)?
        .trim()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_known_names() {
        assert_eq!("".parse::<ProviderKind>().unwrap(), ProviderKind::None);
        assert_eq!("Gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("hf".parse::<ProviderKind>().unwrap(), ProviderKind::HuggingFace);
        assert_eq!(" mock ".parse::<ProviderKind>().unwrap(), ProviderKind::Mock);
        assert!("openai".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn generator_validation_flags_missing_provider_settings() {
        let mut generator = GeneratorConfig {
            provider: ProviderKind::Gemini,
            model: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
            endpoint: String::new(),
            timeout_secs: 30,
            max_tokens: 200,
        };
        assert!(!generator.validate());

        generator.api_key = "key".to_string();
        assert!(generator.validate());

        generator.provider = ProviderKind::HuggingFace;
        assert!(!generator.validate());

        generator.provider = ProviderKind::None;
        assert!(generator.validate());
    }

    #[test]
    fn blank_mongo_uri_disables_lookups() {
        let mongo = MongoConfig {
            uri: "  ".to_string(),
            database: "medwallet".to_string(),
            records_collection: "users".to_string(),
        };
        assert!(!mongo.is_enabled());
    }
}
