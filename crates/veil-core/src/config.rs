//! Runtime configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::severity::Severity;

/// Mapping records live for 24 hours unless configured otherwise.
pub const DEFAULT_MAPPING_TTL_SECS: u64 = 86_400;
pub const DEFAULT_DETECTOR_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_VAULT_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-20241022";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Hosted model provider backing the semantic detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAI,
    Anthropic,
    Groq,
}

impl ModelProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            ModelProvider::OpenAI => DEFAULT_OPENAI_MODEL,
            ModelProvider::Anthropic => DEFAULT_ANTHROPIC_MODEL,
            ModelProvider::Groq => DEFAULT_GROQ_MODEL,
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            ModelProvider::OpenAI => "https://api.openai.com/v1/chat/completions",
            ModelProvider::Anthropic => "https://api.anthropic.com/v1/messages",
            ModelProvider::Groq => "https://api.groq.com/openai/v1/chat/completions",
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelProvider::OpenAI => write!(f, "openai"),
            ModelProvider::Anthropic => write!(f, "anthropic"),
            ModelProvider::Groq => write!(f, "groq"),
        }
    }
}

/// Connection settings for the semantic detector's model.
#[derive(Clone)]
pub struct SemanticModelConfig {
    pub provider: ModelProvider,
    pub model: String,
    pub api_key: String,
    /// Overrides the provider's default URL (proxies, self-hosted gateways).
    pub endpoint: Option<String>,
}

impl SemanticModelConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
    }
}

impl std::fmt::Debug for SemanticModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"***")
            .field("endpoint", &self.endpoint())
            .finish()
    }
}

/// Which detectors run and how they are scoped.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub enable_pattern: bool,
    pub enable_semantic: bool,
    pub severity: Severity,
    /// Upper bound on a single detector call.
    pub timeout: Duration,
    pub semantic: Option<SemanticModelConfig>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            enable_pattern: true,
            enable_semantic: false,
            severity: Severity::default(),
            timeout: Duration::from_millis(DEFAULT_DETECTOR_TIMEOUT_MS),
            semantic: None,
        }
    }
}

/// Top-level Veil configuration.
#[derive(Clone)]
pub struct VeilConfig {
    pub redis_url: String,
    /// Base64-encoded 32-byte master key. Supplied externally, never generated here.
    pub master_key: Option<String>,
    pub mapping_ttl: Duration,
    /// Upper bound on a single vault store round trip.
    pub vault_timeout: Duration,
    pub detectors: DetectorConfig,
}

impl std::fmt::Debug for VeilConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VeilConfig")
            .field("redis_url", &self.redis_url)
            .field("master_key", &self.master_key.as_ref().map(|_| "***"))
            .field("mapping_ttl", &self.mapping_ttl)
            .field("vault_timeout", &self.vault_timeout)
            .field("detectors", &self.detectors)
            .finish()
    }
}

impl VeilConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let redis_url = lookup("REDIS_URL").unwrap_or_else(|| {
            let host = lookup("REDIS_HOST").unwrap_or_else(|| "localhost".into());
            let port = lookup("REDIS_PORT").unwrap_or_else(|| "6379".into());
            format!("redis://{}:{}", host, port)
        });

        let mapping_ttl = Duration::from_secs(
            parse_var(&lookup, "VEIL_MAPPING_TTL_SECS")?.unwrap_or(DEFAULT_MAPPING_TTL_SECS),
        );
        let vault_timeout = Duration::from_millis(
            parse_var(&lookup, "VEIL_VAULT_TIMEOUT_MS")?.unwrap_or(DEFAULT_VAULT_TIMEOUT_MS),
        );
        let detector_timeout = Duration::from_millis(
            parse_var(&lookup, "VEIL_DETECTOR_TIMEOUT_MS")?.unwrap_or(DEFAULT_DETECTOR_TIMEOUT_MS),
        );

        let severity = match parse_var::<u8, _>(&lookup, "VEIL_SEVERITY")? {
            Some(level) => Severity::from_level(level)?,
            None => Severity::default(),
        };

        let enable_pattern = parse_bool(&lookup, "VEIL_PATTERN_DETECTOR")?.unwrap_or(true);
        let semantic = resolve_semantic_model(&lookup)?;
        let enable_semantic = match parse_bool(&lookup, "VEIL_SEMANTIC_DETECTOR")? {
            Some(true) if semantic.is_none() => {
                return Err(Error::Config(
                    "VEIL_SEMANTIC_DETECTOR is enabled but no model provider API key is set"
                        .into(),
                ))
            }
            Some(flag) => flag,
            None => semantic.is_some(),
        };

        Ok(Self {
            redis_url,
            master_key: lookup("VEIL_MASTER_KEY").filter(|k| !k.trim().is_empty()),
            mapping_ttl,
            vault_timeout,
            detectors: DetectorConfig {
                enable_pattern,
                enable_semantic,
                severity,
                timeout: detector_timeout,
                semantic,
            },
        })
    }
}

/// Resolve provider, model and key. Auto mode prefers Anthropic > Groq > OpenAI.
fn resolve_semantic_model<F>(lookup: &F) -> Result<Option<SemanticModelConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let key_for = |provider: ModelProvider| {
        let var = match provider {
            ModelProvider::OpenAI => "OPENAI_API_KEY",
            ModelProvider::Anthropic => "ANTHROPIC_API_KEY",
            ModelProvider::Groq => "GROQ_API_KEY",
        };
        lookup(var).filter(|k| !k.trim().is_empty())
    };

    let preferred = lookup("VEIL_SEMANTIC_PROVIDER").unwrap_or_else(|| "auto".into());
    let resolved = match preferred.to_ascii_lowercase().as_str() {
        "auto" => [ModelProvider::Anthropic, ModelProvider::Groq, ModelProvider::OpenAI]
            .into_iter()
            .find_map(|p| key_for(p).map(|k| (p, k))),
        "openai" => key_for(ModelProvider::OpenAI).map(|k| (ModelProvider::OpenAI, k)),
        "anthropic" => key_for(ModelProvider::Anthropic).map(|k| (ModelProvider::Anthropic, k)),
        "groq" => key_for(ModelProvider::Groq).map(|k| (ModelProvider::Groq, k)),
        other => {
            return Err(Error::Config(format!(
                "Unknown semantic provider: {}",
                other
            )))
        }
    };

    Ok(resolved.map(|(provider, api_key)| SemanticModelConfig {
        provider,
        model: lookup("VEIL_SEMANTIC_MODEL").unwrap_or_else(|| provider.default_model().into()),
        api_key,
        endpoint: lookup("VEIL_SEMANTIC_ENDPOINT"),
    }))
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("Invalid value for {}: {}", name, raw))),
        None => Ok(None),
    }
}

fn parse_bool<F>(lookup: &F, name: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::Config(format!("Invalid boolean for {}: {}", name, raw))),
        },
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<VeilConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VeilConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.mapping_ttl, Duration::from_secs(86_400));
        assert!(config.master_key.is_none());
        assert!(config.detectors.enable_pattern);
        assert!(!config.detectors.enable_semantic);
        assert_eq!(config.detectors.severity, Severity::Maximum);
    }

    #[test]
    fn test_redis_host_and_port() {
        let config = config_from(&[("REDIS_HOST", "cache"), ("REDIS_PORT", "6380")]).unwrap();
        assert_eq!(config.redis_url, "redis://cache:6380");
    }

    #[test]
    fn test_auto_provider_prefers_anthropic() {
        let config = config_from(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ])
        .unwrap();
        let semantic = config.detectors.semantic.unwrap();
        assert_eq!(semantic.provider, ModelProvider::Anthropic);
        assert_eq!(semantic.model, DEFAULT_ANTHROPIC_MODEL);
        assert!(config.detectors.enable_semantic);
    }

    #[test]
    fn test_semantic_enabled_without_key_is_error() {
        let err = config_from(&[("VEIL_SEMANTIC_DETECTOR", "true")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_severity() {
        assert!(matches!(
            config_from(&[("VEIL_SEVERITY", "55")]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_from(&[("VEIL_SEVERITY", "high")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let config = config_from(&[
            ("GROQ_API_KEY", "gsk-secret"),
            ("VEIL_MASTER_KEY", "c2VjcmV0"),
        ])
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("gsk-secret"));
        assert!(!rendered.contains("c2VjcmV0"));
    }
}
