//! Aggregation of profile results into one report
//!
//! Reads the result document of every profile that produced one and indexes
//! it by profile identity, together with the profile owner. The only I/O is
//! reading local result files.

use crate::error::ReportError;
use crate::profile::ProfileSource;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::fs;
use tracing::{debug, warn};

/// Profile results of one execution, keyed by profile identity.
///
/// `reports` and `profiles` always share the same key set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateReport {
    reports: BTreeMap<String, Value>,
    profiles: BTreeMap<String, String>,
}

impl AggregateReport {
    /// Record a profile result. Returns `true` if an earlier result with the
    /// same identity was replaced.
    pub fn insert(&mut self, identity: String, owner: String, document: Value) -> bool {
        let replaced = self.reports.insert(identity.clone(), document).is_some();
        self.profiles.insert(identity, owner);
        replaced
    }

    pub fn reports(&self) -> &BTreeMap<String, Value> {
        &self.reports
    }

    pub fn profiles(&self) -> &BTreeMap<String, String> {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Total failed checks across all included reports.
    pub fn total_failed(&self) -> i64 {
        total_failed(&self.reports)
    }

    pub fn into_parts(self) -> (BTreeMap<String, Value>, BTreeMap<String, String>) {
        (self.reports, self.profiles)
    }
}

/// Collect the results of `profiles`, in order.
///
/// Profiles without a result file are skipped. A result file that cannot be
/// read or parsed aborts the aggregation. When two profiles normalize to the
/// same identity the later one wins.
pub async fn compound_report<P: ProfileSource>(profiles: &[P]) -> Result<AggregateReport, ReportError> {
    let mut aggregate = AggregateReport::default();

    for profile in profiles {
        let path = profile.report_path();
        let malformed = |reason: String| ReportError::MalformedResult {
            path: path.to_path_buf(),
            reason,
        };

        // Only a definite "not found" means the profile did not run.
        if !fs::try_exists(path).await.map_err(|e| malformed(e.to_string()))? {
            debug!("No result at {}, skipping profile", path.display());
            continue;
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| malformed(e.to_string()))?;

        let document: Value =
            serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;

        let (owner, identity) = profile.normalize_owner_profile();
        debug!("Loaded result for {}/{} from {}", owner, identity, path.display());

        if aggregate.insert(identity.clone(), owner, document) {
            warn!(
                "Profile identity '{}' reported twice, keeping result from {}",
                identity,
                path.display()
            );
        }
    }

    debug!("Aggregated {} profile result(s)", aggregate.len());
    Ok(aggregate)
}

/// Sum of `summary.failure_count` over `reports`.
pub fn total_failed(reports: &BTreeMap<String, Value>) -> i64 {
    reports
        .values()
        .map(failure_count)
        .fold(0i64, |acc, n| acc.saturating_add(n))
}

/// Integer coercion of `summary.failure_count`; absent or non-numeric is 0.
fn failure_count(document: &Value) -> i64 {
    match document.pointer("/summary/failure_count") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ComplianceProfile;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_result(dir: &Path, owner: &str, name: &str, body: &str) -> ComplianceProfile {
        let profile = ComplianceProfile::new(name, Some(owner.to_string()), dir);
        std::fs::write(profile.report_path(), body).unwrap();
        profile
    }

    fn summary(failures: i64) -> String {
        json!({ "summary": { "failure_count": failures, "example_count": 10 } }).to_string()
    }

    #[tokio::test]
    async fn test_missing_results_are_skipped() {
        let dir = TempDir::new().unwrap();
        let present = write_result(dir.path(), "admin", "ssh", &summary(1));
        let absent = ComplianceProfile::new("linux", None, dir.path());

        let aggregate = compound_report(&[absent, present]).await.unwrap();

        assert_eq!(aggregate.len(), 1);
        assert!(aggregate.reports().contains_key("ssh"));
        assert_eq!(aggregate.profiles().get("ssh").map(String::as_str), Some("admin"));
    }

    #[tokio::test]
    async fn test_reports_and_profiles_share_keys() {
        let dir = TempDir::new().unwrap();
        let profiles = vec![
            write_result(dir.path(), "admin", "ssh", &summary(1)),
            write_result(dir.path(), "base", "linux", &summary(0)),
            write_result(dir.path(), "ops", "nginx", &summary(4)),
        ];

        let aggregate = compound_report(&profiles).await.unwrap();

        let report_keys: Vec<_> = aggregate.reports().keys().collect();
        let profile_keys: Vec<_> = aggregate.profiles().keys().collect();
        assert_eq!(report_keys, profile_keys);
        assert_eq!(aggregate.total_failed(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_identity_last_wins() {
        let dir = TempDir::new().unwrap();
        let first = write_result(dir.path(), "admin", "ssh", &summary(1));
        let second = write_result(dir.path(), "ops", "ssh", &summary(7));

        let aggregate = compound_report(&[first, second]).await.unwrap();

        assert_eq!(aggregate.len(), 1);
        assert_eq!(aggregate.profiles()["ssh"], "ops");
        assert_eq!(aggregate.reports()["ssh"]["summary"]["failure_count"], 7);
    }

    #[tokio::test]
    async fn test_malformed_result_is_propagated() {
        let dir = TempDir::new().unwrap();
        let good = write_result(dir.path(), "admin", "ssh", &summary(0));
        let bad = write_result(dir.path(), "admin", "broken", "{ not json");

        let err = compound_report(&[good, bad]).await.unwrap_err();

        match err {
            ReportError::MalformedResult { path, .. } => {
                assert!(path.ends_with("admin_broken.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_result_behind_unsearchable_dir_is_malformed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        let profile = write_result(&locked, "admin", "ssh", &summary(5));
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not bind root.
        if std::fs::metadata(profile.report_path()).is_ok() {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = compound_report(&[profile]).await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        match result {
            Err(ReportError::MalformedResult { path, .. }) => {
                assert!(path.ends_with("admin_ssh.json"));
            }
            other => panic!("existing result must not be skipped: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_documents_are_kept_verbatim() {
        let dir = TempDir::new().unwrap();
        let doc = json!({
            "version": "1.2.0",
            "profiles": [{ "name": "ssh", "controls": [{ "id": "ssh-01", "status": "failed" }] }],
            "summary": { "failure_count": 1 }
        });
        let profile = write_result(dir.path(), "admin", "ssh", &doc.to_string());

        let aggregate = compound_report(&[profile]).await.unwrap();

        assert_eq!(aggregate.reports()["ssh"], doc);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let profiles: Vec<ComplianceProfile> = Vec::new();
        let aggregate = compound_report(&profiles).await.unwrap();
        assert!(aggregate.is_empty());
        assert_eq!(aggregate.total_failed(), 0);
    }

    #[test]
    fn test_total_failed_coercion() {
        let mut reports = BTreeMap::new();
        reports.insert("a".to_string(), json!({ "summary": { "failure_count": 2 } }));
        reports.insert("b".to_string(), json!({ "summary": { "failure_count": "3" } }));
        reports.insert("c".to_string(), json!({ "summary": { "failure_count": 1.9 } }));
        reports.insert("d".to_string(), json!({ "summary": { "failure_count": "many" } }));
        reports.insert("e".to_string(), json!({ "summary": {} }));
        reports.insert("f".to_string(), json!({ "controls": [] }));
        reports.insert("g".to_string(), json!({ "summary": { "failure_count": null } }));
        reports.insert("h".to_string(), json!([1, 2, 3]));

        assert_eq!(total_failed(&reports), 6);
    }
}
