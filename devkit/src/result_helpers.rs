/*!
Helpers to build profile result documents and lay them out on disk

- `ResultDocument`: inspec-style result JSON with a `summary` block
- `ResultFixture`: temporary results directory handing out `ComplianceProfile`s
*/

use anyhow::Result;
use compliance_report::ComplianceProfile;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;

/// Builder for a profile result document
#[derive(Debug, Clone)]
pub struct ResultDocument {
    profile: String,
    controls: Vec<Value>,
    failure_count: Option<Value>,
    skip_count: u64,
}

impl ResultDocument {
    pub fn new<S: Into<String>>(profile: S) -> Self {
        Self {
            profile: profile.into(),
            controls: Vec::new(),
            failure_count: None,
            skip_count: 0,
        }
    }

    /// Add a control with the given status (`passed`, `failed`, `skipped`).
    pub fn control<S: Into<String>>(mut self, id: S, status: &str) -> Self {
        if status == "skipped" {
            self.skip_count += 1;
        }
        self.controls.push(json!({
            "id": id.into(),
            "status": status,
            "code_desc": "",
        }));
        self
    }

    /// Force `summary.failure_count` to an arbitrary JSON value.
    pub fn failure_count_raw(mut self, value: Value) -> Self {
        self.failure_count = Some(value);
        self
    }

    pub fn failures(self, count: u64) -> Self {
        self.failure_count_raw(json!(count))
    }

    pub fn build(&self) -> Value {
        let failed = self
            .controls
            .iter()
            .filter(|c| c["status"] == "failed")
            .count();

        json!({
            "version": "1.0.0",
            "profiles": [{ "name": self.profile, "controls": self.controls }],
            "summary": {
                "duration": 0.25,
                "example_count": self.controls.len(),
                "failure_count": self.failure_count.clone().unwrap_or_else(|| json!(failed)),
                "skip_count": self.skip_count,
            }
        })
    }

    /// Same document without any `summary` block.
    pub fn build_without_summary(&self) -> Value {
        let mut doc = self.build();
        if let Some(obj) = doc.as_object_mut() {
            obj.remove("summary");
        }
        doc
    }
}

/// Temporary results directory
pub struct ResultFixture {
    dir: TempDir,
}

impl ResultFixture {
    pub fn new() -> Result<Self> {
        Ok(Self { dir: TempDir::new()? })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Profile reference without a result file.
    pub fn profile(&self, name: &str, owner: Option<&str>) -> ComplianceProfile {
        ComplianceProfile::new(name, owner.map(str::to_string), self.dir.path())
    }

    /// Write `document` as the result of `name` and return its reference.
    pub fn write(&self, name: &str, owner: Option<&str>, document: &Value) -> Result<ComplianceProfile> {
        self.write_raw(name, owner, &serde_json::to_string_pretty(document)?)
    }

    /// Write arbitrary bytes as the result of `name`.
    pub fn write_raw(&self, name: &str, owner: Option<&str>, content: &str) -> Result<ComplianceProfile> {
        use compliance_report::ProfileSource;

        let profile = self.profile(name, owner);
        std::fs::write(profile.report_path(), content)?;
        tracing::debug!("Wrote fixture {}", profile.report_path().display());
        Ok(profile)
    }

    /// Shortcut: result with `failures` failed checks.
    pub fn write_failures(&self, name: &str, owner: Option<&str>, failures: u64) -> Result<ComplianceProfile> {
        let document = ResultDocument::new(name).failures(failures).build();
        self.write(name, owner, &document)
    }
}
