use anyhow::{anyhow, Context, Result};
use common_auth::{ensure_hmac, Algorithm, JwtConfig, DEFAULT_LEEWAY_SECONDS, DEFAULT_USER_CLAIM};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

pub const CONFIG_PATH_ENV: &str = "EJABBERD_EXTERNAL_AUTH_JWT_CONFIG_PATH";

/// On-disk configuration. The file is TOML; key names match the YAML files
/// earlier deployments used, so those convert key for key.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub jwt_secret: Option<String>,
    pub jwt_secret_old: Option<String>,
    #[serde(default = "default_algorithm")]
    pub jwt_algorithm: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    #[serde(default = "default_user_claim")]
    pub user_claim: String,
    pub jwt_expiration: Option<u64>,
    #[serde(default = "default_leeway")]
    pub leeway: u64,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_user_claim() -> String {
    DEFAULT_USER_CLAIM.to_string()
}

fn default_leeway() -> u64 {
    DEFAULT_LEEWAY_SECONDS
}

impl FileConfig {
    pub fn into_jwt_config(self) -> Result<JwtConfig> {
        let algorithm = Algorithm::from_str(self.jwt_algorithm.trim())
            .map_err(|err| anyhow!("Invalid jwt_algorithm '{}': {err}", self.jwt_algorithm))?;
        ensure_hmac(algorithm)?;

        let secret = self.jwt_secret.and_then(|value| normalize_optional(&value));
        if secret.is_none() {
            warn!("jwt_secret is not configured, every auth request will be rejected");
        }

        Ok(JwtConfig {
            secret,
            secret_old: self
                .jwt_secret_old
                .and_then(|value| normalize_optional(&value)),
            algorithm,
            issuer: self.issuer.and_then(|value| normalize_optional(&value)),
            audience: self.audience.and_then(|value| normalize_optional(&value)),
            user_claim: self.user_claim,
            expiration_seconds: self.jwt_expiration,
            leeway_seconds: self.leeway,
        })
    }
}

/// `--config` wins over the environment variable.
pub fn resolve_config_path(cli: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli {
        return Ok(path);
    }
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("No configuration given: pass --config or set {CONFIG_PATH_ENV}"))
}

pub fn parse_config(contents: &str) -> Result<JwtConfig> {
    let file: FileConfig = toml::from_str(contents).context("Failed to parse configuration")?;
    file.into_jwt_config()
}

pub fn load_config(path: &Path) -> Result<JwtConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Invalid configuration in {}", path.display()))
}

fn normalize_optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
