//! Profile references handed to the aggregator
//!
//! A profile is identified by its normalized name and owned by an entity.
//! Its serialized result lives at a path the reference knows about; the file
//! may not exist if the profile never ran.

use std::path::{Path, PathBuf};

/// Owner used when a profile names none.
pub const DEFAULT_OWNER: &str = "base";

/// Anything that can point the aggregator at a profile result.
pub trait ProfileSource {
    /// Location of the serialized result document.
    fn report_path(&self) -> &Path;

    /// Returns `(owner, identity)`.
    fn normalize_owner_profile(&self) -> (String, String);
}

impl<T: ProfileSource + ?Sized> ProfileSource for &T {
    fn report_path(&self) -> &Path {
        (**self).report_path()
    }

    fn normalize_owner_profile(&self) -> (String, String) {
        (**self).normalize_owner_profile()
    }
}

/// Profile declared in configuration or on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceProfile {
    name: String,
    owner: Option<String>,
    report_path: PathBuf,
}

impl ComplianceProfile {
    /// Profile whose result sits at `{results_dir}/{owner}_{identity}.json`.
    pub fn new<S: Into<String>>(name: S, owner: Option<String>, results_dir: &Path) -> Self {
        let name = name.into();
        let (o, p) = split_owner(&name, owner.as_deref());
        let report_path = results_dir.join(format!("{o}_{p}.json"));

        Self {
            name,
            owner,
            report_path,
        }
    }

    /// Override the result location.
    pub fn with_report_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.report_path = path.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ProfileSource for ComplianceProfile {
    fn report_path(&self) -> &Path {
        &self.report_path
    }

    fn normalize_owner_profile(&self) -> (String, String) {
        split_owner(&self.name, self.owner.as_deref())
    }
}

/// `owner/profile` wins over the configured owner; a bare name falls back to
/// the configured owner, then to [`DEFAULT_OWNER`].
fn split_owner(name: &str, owner: Option<&str>) -> (String, String) {
    match name.split_once('/') {
        Some((o, p)) if !o.is_empty() && !p.is_empty() => (o.to_string(), p.to_string()),
        _ => {
            let owner = owner.filter(|o| !o.is_empty()).unwrap_or(DEFAULT_OWNER);
            (owner.to_string(), name.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_prefix_in_name() {
        let p = ComplianceProfile::new("admin/ssh-hardening", None, Path::new("/cache"));
        assert_eq!(
            p.normalize_owner_profile(),
            ("admin".to_string(), "ssh-hardening".to_string())
        );
        assert_eq!(p.report_path(), Path::new("/cache/admin_ssh-hardening.json"));
    }

    #[test]
    fn test_configured_owner_and_default() {
        let p = ComplianceProfile::new("linux", Some("ops".into()), Path::new("/cache"));
        assert_eq!(p.normalize_owner_profile(), ("ops".to_string(), "linux".to_string()));

        let p = ComplianceProfile::new("linux", None, Path::new("/cache"));
        assert_eq!(p.normalize_owner_profile(), ("base".to_string(), "linux".to_string()));

        let p = ComplianceProfile::new("linux", Some(String::new()), Path::new("/cache"));
        assert_eq!(p.normalize_owner_profile().0, "base");
    }

    #[test]
    fn test_prefix_overrides_configured_owner() {
        let p = ComplianceProfile::new("admin/linux", Some("ops".into()), Path::new("/c"));
        assert_eq!(p.normalize_owner_profile().0, "admin");
    }

    #[test]
    fn test_degenerate_slashes_are_kept_in_identity() {
        let p = ComplianceProfile::new("/linux", None, Path::new("/c"));
        assert_eq!(p.normalize_owner_profile(), ("base".to_string(), "/linux".to_string()));
    }

    #[test]
    fn test_explicit_report_path() {
        let p = ComplianceProfile::new("linux", None, Path::new("/c"))
            .with_report_path("/tmp/linux.json");
        assert_eq!(p.report_path(), Path::new("/tmp/linux.json"));
        assert_eq!(p.name(), "linux");
    }
}
