//! Configuration loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::schema::RebroadcastConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::solana::{LedgerError, SigningIdentity};

/// Authority ("old owner") key pair, JSON byte array.
pub const AUTHORITY_KEY_ENV: &str = "OLD_OWNER_SECRET_KEY";
/// Fee payer ("new owner") key pair, JSON byte array.
pub const FEE_PAYER_KEY_ENV: &str = "NEW_OWNER_SECRET_KEY";
/// RPC endpoint URL, overrides `rpc.url`.
pub const RPC_URL_ENV: &str = "CUSTOM_RPC_URL";
/// Base64 transaction template.
pub const TEMPLATE_ENV: &str = "BASE_64_TX";
/// Optional tick interval override in seconds.
pub const INTERVAL_ENV: &str = "REBROADCAST_INTERVAL_SECS";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingEnv(Vec<&'static str>),

    #[error("Invalid value for {name}: {reason}")]
    InvalidEnv { name: &'static str, reason: String },

    #[error("Invalid key in {name}: {source}")]
    Key {
        name: &'static str,
        #[source]
        source: LedgerError,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration, reading overrides from the process
/// environment.
pub fn load_config(path: Option<&Path>) -> Result<RebroadcastConfig, ConfigError> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Load and validate configuration with an explicit variable lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<RebroadcastConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content)?
        }
        None => RebroadcastConfig::default(),
    };

    apply_env_overrides(&mut config, &lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn apply_env_overrides<F>(config: &mut RebroadcastConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(RPC_URL_ENV).filter(|v| !v.trim().is_empty()) {
        config.rpc.url = url.trim().to_string();
    }
    if let Some(raw) = lookup(INTERVAL_ENV) {
        config.schedule.interval_secs =
            raw.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                name: INTERVAL_ENV,
                reason: format!("{}", e),
            })?;
    }
    Ok(())
}

/// Secret inputs, read from the environment only.
pub struct Secrets {
    pub authority_key: Zeroizing<String>,
    pub fee_payer_key: Zeroizing<String>,
    pub template_base64: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read all secrets, reporting every missing variable at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut fetch = |name: &'static str| {
            let value = lookup(name).filter(|v| !v.trim().is_empty());
            if value.is_none() {
                missing.push(name);
            }
            value.unwrap_or_default()
        };

        let authority_key = Zeroizing::new(fetch(AUTHORITY_KEY_ENV));
        let fee_payer_key = Zeroizing::new(fetch(FEE_PAYER_KEY_ENV));
        let template_base64 = fetch(TEMPLATE_ENV);

        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv(missing));
        }

        Ok(Self {
            authority_key,
            fee_payer_key,
            template_base64,
        })
    }

    pub fn authority(&self) -> Result<SigningIdentity, ConfigError> {
        SigningIdentity::from_json_bytes(&self.authority_key).map_err(|source| ConfigError::Key {
            name: AUTHORITY_KEY_ENV,
            source,
        })
    }

    pub fn fee_payer(&self) -> Result<SigningIdentity, ConfigError> {
        SigningIdentity::from_json_bytes(&self.fee_payer_key).map_err(|source| ConfigError::Key {
            name: FEE_PAYER_KEY_ENV,
            source,
        })
    }

    /// Decoded template bytes.
    pub fn template_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        BASE64
            .decode(self.template_base64.trim())
            .map_err(|e| ConfigError::InvalidEnv {
                name: TEMPLATE_ENV,
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("template_len", &self.template_base64.len())
            .finish_non_exhaustive()
    }
}
