//! Reporter configuration
//!
//! Handles:
//! - Chef/compliance server location and endpoint construction
//! - Credentials (token optionally kept in the OS keyring)
//! - Pass/fail policy flags
//! - Profiles to report on

use crate::error::ConfigError;
use crate::profile::ComplianceProfile;
use crate::transport::Credentials;
use keyring::Entry;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const KEYRING_SERVICE: &str = "compliance-report";
const KEYRING_USER: &str = "api-token";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "COMPLIANCE_REPORT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Chef server URL; its last path segment is the organization.
    pub chef_server_url: String,
    /// Standalone compliance server used instead of the chef server host.
    pub server: Option<String>,
    /// Port for the standalone compliance server.
    pub port: Option<u16>,
    pub verify_tls: bool,
    pub timeout_secs: u64,
    pub results_dir: PathBuf,
    /// Node name reported instead of the hostname.
    pub node: Option<String>,
    /// Environment reported instead of the host's.
    pub environment: Option<String>,
    pub auth: AuthConfig,
    pub policy: PolicyConfig,
    pub profiles: Vec<ProfileEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing)] // kept out of saved files
    pub token: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Read the token from the OS keyring.
    pub store_token: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Abort when the report cannot be saved.
    pub raise_if_unreachable: bool,
    /// Abort when any audit failed.
    pub fail_if_any_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            chef_server_url: String::new(),
            server: None,
            port: None,
            verify_tls: false,
            timeout_secs: 30,
            results_dir: std::env::temp_dir().join("compliance"),
            node: None,
            environment: None,
            auth: AuthConfig::default(),
            policy: PolicyConfig::default(),
            profiles: Vec::new(),
        }
    }
}

impl ReporterConfig {
    /// Load config from `explicit`, `$COMPLIANCE_REPORT_CONFIG`, or the
    /// OS-specific location, then apply environment overrides.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path).await?,
            None => match Self::config_file_path() {
                Ok(path) if path.exists() => Self::from_file(&path).await?,
                Ok(path) => {
                    debug!("No config at {}, using defaults", path.display());
                    Self::default()
                }
                Err(e) => {
                    warn!("{}, using defaults", e);
                    Self::default()
                }
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());

        if config.auth.store_token && config.auth.token.is_none() {
            config.auth.token = Some(Self::load_token()?);
        }

        Ok(config)
    }

    /// Parse a TOML config file.
    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `COMPLIANCE_*` overrides looked up through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("COMPLIANCE_SERVER_URL").filter(|v| !v.is_empty()) {
            self.chef_server_url = url;
        }
        if let Some(token) = lookup("COMPLIANCE_TOKEN").filter(|v| !v.is_empty()) {
            self.auth.token = Some(token);
        }
        if let Some(env) = lookup("COMPLIANCE_ENVIRONMENT").filter(|v| !v.is_empty()) {
            self.environment = Some(env);
        }
    }

    /// OS-specific config file path.
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;

        path.push("compliance-report");
        path.push("config.toml");
        Ok(path)
    }

    /// Organization id: last path segment of the chef server URL.
    pub fn org(&self) -> Result<String, ConfigError> {
        self.chef_server_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::InvalidUrl {
                url: self.chef_server_url.clone(),
                reason: "no organization segment".to_string(),
            })
    }

    /// `{server}/organizations/{org}/inspec`.
    ///
    /// The server is the standalone compliance server when configured (with
    /// its optional port), the chef server host otherwise. Any path on the
    /// server URL is replaced.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let org = self.org()?;
        let base = self.server.as_deref().unwrap_or(&self.chef_server_url);

        let invalid = |reason: String| ConfigError::InvalidUrl {
            url: base.to_string(),
            reason,
        };

        let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid("not a base URL".to_string()));
        }

        if self.server.is_some() {
            if let Some(port) = self.port {
                url.set_port(Some(port))
                    .map_err(|_| invalid(format!("cannot set port {port}")))?;
            }
        }

        url.set_path(&format!("/organizations/{org}/inspec"));
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// Credentials for the transport: token first, then basic auth.
    pub fn credentials(&self) -> Credentials {
        if let Some(token) = &self.auth.token {
            Credentials::Token(token.clone())
        } else if let Some(username) = &self.auth.username {
            Credentials::Basic {
                username: username.clone(),
                password: self.auth.password.clone(),
            }
        } else {
            Credentials::Anonymous
        }
    }

    /// Profiles to aggregate, resolved against `results_dir`.
    pub fn profile_refs(&self) -> Vec<ComplianceProfile> {
        self.profiles
            .iter()
            .map(|entry| {
                let profile = ComplianceProfile::new(&entry.name, entry.owner.clone(), &self.results_dir);
                match &entry.path {
                    Some(path) => profile.with_report_path(path),
                    None => profile,
                }
            })
            .collect()
    }

    /// Load the API token from the OS keyring.
    fn load_token() -> Result<String, ConfigError> {
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        entry.get_password().map_err(Into::into)
    }

    /// Save the API token to the OS keyring.
    pub fn save_token(token: &str) -> Result<(), ConfigError> {
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        entry.set_password(token).map_err(Into::into)
    }
}
