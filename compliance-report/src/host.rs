//! Host identification for compliance reports
//!
//! Provides the node name, OS family and release, and the environment label
//! the report is filed under.

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::info;

/// Environment label used when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "_default";

/// Source of host facts for the report payload.
pub trait HostContext {
    fn name(&self) -> &str;
    fn platform(&self) -> &str;
    fn platform_version(&self) -> &str;
    fn environment(&self) -> &str;
}

/// Host facts discovered from the running system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHost {
    pub hostname: String,
    pub platform: String,
    pub platform_version: String,
    pub environment: String,
}

impl SystemHost {
    /// Discover the local host. `environment` is the label reported when the
    /// run does not override it.
    pub fn discover(environment: Option<String>) -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().to_string();
        let platform = System::distribution_id();
        let platform_version = System::os_version().unwrap_or_else(|| "unknown".to_string());
        let environment = environment
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        info!(
            "Host discovered - Hostname: {}, Platform: {} {}, Environment: {}",
            hostname, platform, platform_version, environment
        );

        Self {
            hostname,
            platform,
            platform_version,
            environment,
        }
    }
}

impl HostContext for SystemHost {
    fn name(&self) -> &str {
        &self.hostname
    }

    fn platform(&self) -> &str {
        &self.platform
    }

    fn platform_version(&self) -> &str {
        &self.platform_version
    }

    fn environment(&self) -> &str {
        &self.environment
    }
}

/// OS section of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub release: String,
    pub family: String,
}

/// Host section of the payload, computed once per execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostMetadata {
    pub node: String,
    pub os: OsInfo,
    pub environment: String,
}

impl HostMetadata {
    /// Snapshot `host`, applying the run's node and environment overrides.
    pub fn collect<H: HostContext + ?Sized>(
        host: &H,
        node: Option<&str>,
        environment: Option<&str>,
    ) -> Self {
        Self {
            node: node.unwrap_or_else(|| host.name()).to_string(),
            os: OsInfo {
                release: host.platform_version().to_string(),
                family: host.platform().to_string(),
            },
            environment: environment.unwrap_or_else(|| host.environment()).to_string(),
        }
    }
}
