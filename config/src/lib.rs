//! Configuration loading for Lockstone.
//!
//! Settings come from a TOML file layered under environment overrides, are
//! validated once, and are passed into the driver at construction. Nothing
//! downstream reads ambient state mid-pipeline: if it isn't in [`Settings`],
//! the pipeline doesn't know it.
//!
//! # Sources
//!
//! 1. `$LOCKSTONE_CONFIG`, or `~/.lockstone/config.toml` if unset.
//! 2. Environment overrides: `LOCKSTONE_REGISTRY_ENDPOINT`,
//!    `LOCKSTONE_GOVERNANCE_ENDPOINT`, `LOCKSTONE_STORAGE_ENDPOINT`,
//!    `LOCKSTONE_PARENT_NAME`, `LOCKSTONE_GOVERNANCE_ACCOUNT`, and
//!    `LOCKSTONE_SIGNER_TOKEN` (the credential should live in the
//!    environment, not on disk).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use lockstone_types::{Address, DEFAULT_MAX_VERSION_SCAN, Name};

/// Default per-request timeout for registry/governance/storage calls.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default retry budget for retryable failures (attempts = retries + 1).
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Signer credential for the governance backend and registry writes.
///
/// `Debug` is manually implemented to redact the token, preventing
/// accidental logging.
#[derive(Clone, PartialEq, Eq)]
pub struct SignerToken(String);

impl SignerToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SignerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignerToken(<redacted>)")
    }
}

/// Validated runtime settings, constructed once per invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Naming registry JSON-RPC endpoint.
    pub registry_endpoint: Url,
    /// Threshold-approval governance backend.
    pub governance_endpoint: Url,
    /// Content-addressed storage node (add endpoint).
    pub storage_endpoint: Url,
    /// The parent name versions are published under (`demo.site`).
    pub parent_name: Name,
    /// The governance account expected to own published nodes.
    pub governance_account: Address,
    /// Credential of the submitting approver.
    pub signer_token: SignerToken,
    /// Ceiling on the version-slot linear probe.
    pub max_version_scan: u32,
    /// Per-request transport timeout, made explicit rather than inherited
    /// silently from the HTTP client.
    pub request_timeout_secs: u64,
    /// Bounded retry budget for retryable failures.
    pub max_retries: u32,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing required setting {key:?}: set it in the config file or as {env}")]
    Missing { key: &'static str, env: &'static str },
    #[error("invalid value for {key:?}: {detail}")]
    Invalid { key: &'static str, detail: String },
}

/// Raw file shape: everything optional, validation happens in [`Settings`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    registry_endpoint: Option<String>,
    governance_endpoint: Option<String>,
    storage_endpoint: Option<String>,
    parent_name: Option<String>,
    governance_account: Option<String>,
    signer_token: Option<String>,
    max_version_scan: Option<u32>,
    request_timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

/// Config file location: `$LOCKSTONE_CONFIG` override, else
/// `~/.lockstone/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("LOCKSTONE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".lockstone").join("config.toml"))
}

impl Settings {
    /// Load and validate settings from the default file location plus the
    /// process environment.
    pub fn load() -> Result<Self, SettingsError> {
        let file = match config_path() {
            Some(path) if path.is_file() => read_file(&path)?,
            Some(path) => {
                tracing::debug!(path = %path.display(), "no config file; environment only");
                FileSettings::default()
            }
            None => FileSettings::default(),
        };
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::from_sources(file, &env)
    }

    /// Load from an explicit file path plus the given environment map.
    pub fn load_from(path: &Path, env: &HashMap<String, String>) -> Result<Self, SettingsError> {
        Self::from_sources(read_file(path)?, env)
    }

    fn from_sources(
        file: FileSettings,
        env: &HashMap<String, String>,
    ) -> Result<Self, SettingsError> {
        let registry_endpoint = parse_url(
            "registry_endpoint",
            pick(env, "LOCKSTONE_REGISTRY_ENDPOINT", file.registry_endpoint)?,
        )?;
        let governance_endpoint = parse_url(
            "governance_endpoint",
            pick(
                env,
                "LOCKSTONE_GOVERNANCE_ENDPOINT",
                file.governance_endpoint,
            )?,
        )?;
        let storage_endpoint = parse_url(
            "storage_endpoint",
            pick(env, "LOCKSTONE_STORAGE_ENDPOINT", file.storage_endpoint)?,
        )?;

        let parent_name = pick(env, "LOCKSTONE_PARENT_NAME", file.parent_name)?;
        let parent_name = Name::parse(&parent_name).map_err(|e| SettingsError::Invalid {
            key: "parent_name",
            detail: e.to_string(),
        })?;

        let governance_account = pick(env, "LOCKSTONE_GOVERNANCE_ACCOUNT", file.governance_account)?;
        let governance_account =
            Address::parse(&governance_account).map_err(|e| SettingsError::Invalid {
                key: "governance_account",
                detail: e.to_string(),
            })?;

        let signer_token = pick(env, "LOCKSTONE_SIGNER_TOKEN", file.signer_token)?;
        if signer_token.trim().is_empty() {
            return Err(SettingsError::Invalid {
                key: "signer_token",
                detail: "credential must not be empty".to_string(),
            });
        }

        let max_version_scan = file.max_version_scan.unwrap_or(DEFAULT_MAX_VERSION_SCAN);
        if max_version_scan == 0 {
            return Err(SettingsError::Invalid {
                key: "max_version_scan",
                detail: "probe ceiling must be at least 1".to_string(),
            });
        }

        Ok(Self {
            registry_endpoint,
            governance_endpoint,
            storage_endpoint,
            parent_name,
            governance_account,
            signer_token: SignerToken::new(signer_token),
            max_version_scan,
            request_timeout_secs: file
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: file.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }
}

fn read_file(path: &Path) -> Result<FileSettings, SettingsError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Environment wins over file; absence of both is an error naming both
/// places the value can come from.
fn pick(
    env: &HashMap<String, String>,
    env_key: &'static str,
    file_value: Option<String>,
) -> Result<String, SettingsError> {
    if let Some(value) = env.get(env_key)
        && !value.trim().is_empty()
    {
        return Ok(value.clone());
    }
    file_value.ok_or(SettingsError::Missing {
        key: strip_env_prefix(env_key),
        env: env_key,
    })
}

// "LOCKSTONE_REGISTRY_ENDPOINT" -> file key is the lowercase suffix; the
// static mapping keeps error paths allocation-free.
fn strip_env_prefix(env_key: &'static str) -> &'static str {
    match env_key {
        "LOCKSTONE_REGISTRY_ENDPOINT" => "registry_endpoint",
        "LOCKSTONE_GOVERNANCE_ENDPOINT" => "governance_endpoint",
        "LOCKSTONE_STORAGE_ENDPOINT" => "storage_endpoint",
        "LOCKSTONE_PARENT_NAME" => "parent_name",
        "LOCKSTONE_GOVERNANCE_ACCOUNT" => "governance_account",
        "LOCKSTONE_SIGNER_TOKEN" => "signer_token",
        _ => "unknown",
    }
}

fn parse_url(key: &'static str, value: String) -> Result<Url, SettingsError> {
    Url::parse(&value).map_err(|e| SettingsError::Invalid {
        key,
        detail: format!("{e}: {value}"),
    })
}
