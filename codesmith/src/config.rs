use crate::db::models::payment_methods::PaymentMethodConfig;
use anyhow::{bail, Context};
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Credit-metered code generation service")]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short = 'f', long, env = "CODESMITH_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate the configuration and exit
    #[arg(long)]
    pub validate: bool,
}

/// Service configuration.
///
/// Layered as: built-in defaults, then the YAML file, then `CODESMITH_` environment variables
/// (`__` separates nested keys, e.g. `CODESMITH_AUTH__JWT_SECRET`), then `DATABASE_URL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Used to derive the key that encrypts stored secrets
    pub secret_key: Option<String>,
    pub auth: AuthConfig,
    pub completion: CompletionConfig,
    pub credits: CreditsConfig,
    /// Payment methods inserted on first startup only
    pub payment_methods: Vec<PaymentMethodSeed>,
    pub cors: CorsConfig,
    pub enable_metrics: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
    /// Expected `aud` claim, if the identity provider sets one
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub api_url: Url,
    /// Fallback key, used until an admin stores one through the API
    pub api_key: Option<String>,
    pub model: String,
    pub sampling: SamplingConfig,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditsConfig {
    /// Credits granted to a newly provisioned user
    pub initial_grant: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodSeed {
    pub name: String,
    pub display_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub config: PaymentMethodConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<CorsOrigin>,
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds
    pub max_age: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CorsOrigin {
    Wildcard,
    Url(Url),
}

impl TryFrom<String> for CorsOrigin {
    type Error = url::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "*" {
            Ok(CorsOrigin::Wildcard)
        } else {
            Url::parse(&value).map(CorsOrigin::Url)
        }
    }
}

impl From<CorsOrigin> for String {
    fn from(origin: CorsOrigin) -> Self {
        match origin {
            CorsOrigin::Wildcard => "*".to_string(),
            // Url serializes with a trailing slash that browsers never send in Origin
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_url: "postgres://localhost:5432/codesmith".to_string(),
            secret_key: None,
            auth: AuthConfig::default(),
            completion: CompletionConfig::default(),
            credits: CreditsConfig::default(),
            payment_methods: Vec::new(),
            cors: CorsConfig::default(),
            enable_metrics: false,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse("https://generativelanguage.googleapis.com").expect("static URL is valid"),
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            sampling: SamplingConfig::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
        }
    }
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self { initial_grant: 50 }
    }
}

impl Config {
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut config: Config = Self::figment(args)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", args.config))?;

        // Conventional override used by sqlx tooling and most hosting platforms
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    fn figment(args: &Args) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("CODESMITH_").ignore(&["config"]).split("__"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret must be set");
        }
        if self.secret_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            bail!("secret_key must be set");
        }
        if self.credits.initial_grant < 0 {
            bail!("credits.initial_grant must not be negative");
        }
        if self.completion.timeout.is_zero() {
            bail!("completion.timeout must be greater than zero");
        }
        if self.cors.allow_credentials && self.cors.allowed_origins.contains(&CorsOrigin::Wildcard) {
            bail!("cors.allow_credentials cannot be combined with a wildcard origin");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args() -> Args {
        Args {
            config: "test.yaml".to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_yaml_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 8080
secret_key: "yaml-secret"
auth:
  jwt_secret: "from-yaml"
completion:
  model: "gemini-pro"
  timeout: "30s"
credits:
  initial_grant: 25
payment_methods:
  - name: bank_transfer
    display_name: Bank Transfer
    config:
      kind: bank_transfer
      bank_name: First Bank
      account_name: Codesmith
      account_number: "0001"
cors:
  allowed_origins: ["*", "https://app.example.com"]
"#,
            )?;
            jail.set_env("CODESMITH_AUTH__JWT_SECRET", "from-env");
            jail.set_env("CODESMITH_COMPLETION__SAMPLING__TOP_K", "10");
            jail.set_env("DATABASE_URL", "postgres://override/db");

            let config = Config::load(&args()).map_err(|e| e.to_string())?;

            assert_eq!(config.port, 8080);
            assert_eq!(config.host, "0.0.0.0");
            assert_eq!(config.auth.jwt_secret, "from-env");
            assert_eq!(config.completion.model, "gemini-pro");
            assert_eq!(config.completion.timeout, Duration::from_secs(30));
            assert_eq!(config.completion.sampling.top_k, 10);
            assert_eq!(config.credits.initial_grant, 25);
            assert_eq!(config.database_url, "postgres://override/db");
            assert_eq!(config.payment_methods.len(), 1);
            assert!(config.payment_methods[0].enabled);
            assert!(config.payment_methods[0].config.is_manual());
            assert_eq!(config.cors.allowed_origins[0], CorsOrigin::Wildcard);
            assert_eq!(
                config.cors.allowed_origins[1],
                CorsOrigin::Url(Url::parse("https://app.example.com").unwrap())
            );
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("CODESMITH_AUTH__JWT_SECRET", "secret");
            jail.set_env("CODESMITH_SECRET_KEY", "key");
            jail.set_env("CODESMITH_CONFIG", "ignored.yaml");

            let config = Config::load(&args()).map_err(|e| e.to_string())?;
            assert_eq!(config.port, 3001);
            assert_eq!(config.credits.initial_grant, 50);
            assert_eq!(config.completion.timeout, Duration::from_secs(60));
            assert!(config.completion.api_key.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_validation_requires_secrets() {
        Jail::expect_with(|_jail| {
            let err = Config::load(&args()).unwrap_err();
            assert!(err.to_string().contains("jwt_secret"));
            Ok(())
        });
    }

    #[test]
    fn test_negative_initial_grant_rejected() {
        let mut config = Config::default();
        config.auth.jwt_secret = "s".to_string();
        config.secret_key = Some("k".to_string());
        assert!(config.validate().is_ok());

        config.credits.initial_grant = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wildcard_origin_with_credentials_rejected() {
        let mut config = Config::default();
        config.auth.jwt_secret = "s".to_string();
        config.secret_key = Some("k".to_string());
        config.cors.allowed_origins = vec![CorsOrigin::Wildcard];
        config.cors.allow_credentials = false;
        assert!(config.validate().is_ok());

        config.cors.allow_credentials = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("wildcard"));

        config.cors.allowed_origins = vec![CorsOrigin::Url(Url::parse("https://app.example.com").unwrap())];
        assert!(config.validate().is_ok());
    }
}
