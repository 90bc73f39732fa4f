use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[auth].secret_key`.
pub const SECRET_KEY_ENV: &str = "VITISCRAP_SECRET_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_token_expire_minutes")]
    pub token_expire_minutes: i64,
}

/// One year.
pub const MAX_TOKEN_EXPIRE_MINUTES: i64 = 365 * 24 * 60;

fn default_token_expire_minutes() -> i64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://vitibrasil.cnpuv.embrapa.br/index.php".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Configuration for tests and one-off tooling: in-memory paths,
    /// fixed secret, default lifetimes.
    pub fn for_tests(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            server: ServerConfig {
                bind: default_bind(),
            },
            auth: AuthConfig {
                secret_key: "test-secret".to_string(),
                token_expire_minutes: default_token_expire_minutes(),
            },
            scrape: ScrapeConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.auth.secret_key.is_empty() {
            anyhow::bail!(
                "auth.secret_key must be set (in the config file or via {})",
                SECRET_KEY_ENV
            );
        }
        if !(1..=MAX_TOKEN_EXPIRE_MINUTES).contains(&self.auth.token_expire_minutes) {
            anyhow::bail!(
                "auth.token_expire_minutes must be between 1 and {}",
                MAX_TOKEN_EXPIRE_MINUTES
            );
        }
        if self.scrape.timeout_secs == 0 {
            anyhow::bail!("scrape.timeout_secs must be > 0");
        }
        if self.scrape.base_url.is_empty() {
            anyhow::bail!("scrape.base_url must not be empty");
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if let Ok(secret) = std::env::var(SECRET_KEY_ENV) {
        if !secret.is_empty() {
            config.auth.secret_key = secret;
        }
    }

    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
