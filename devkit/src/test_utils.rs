/*!
Test harness for report runs

Wires a `ResultFixture`, a `StubTransport` and a `StaticHost` to a
`Reporter`, and offers assertions on the submitted payload.
*/

use crate::result_helpers::ResultFixture;
use crate::transport_stub::StubTransport;
use anyhow::Result;
use compliance_report::{
    ComplianceProfile, HostContext, PolicyConfig, ReportError, Reporter, ReporterConfig, RunSummary,
};
use serde_json::Value;

pub const TEST_SERVER_URL: &str = "https://chef.test/organizations/acme";

/// Host context with fixed values
#[derive(Debug, Clone)]
pub struct StaticHost {
    pub name: String,
    pub platform: String,
    pub platform_version: String,
    pub environment: String,
}

impl StaticHost {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            platform: "ubuntu".to_string(),
            platform_version: "22.04".to_string(),
            environment: "_default".to_string(),
        }
    }

    pub fn with_environment<S: Into<String>>(mut self, environment: S) -> Self {
        self.environment = environment.into();
        self
    }
}

impl HostContext for StaticHost {
    fn name(&self) -> &str {
        &self.name
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

/// Complete harness for report execution tests
pub struct TestHarness {
    pub fixture: ResultFixture,
    pub transport: StubTransport,
    pub host: StaticHost,
    pub config: ReporterConfig,
    profiles: Vec<ComplianceProfile>,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();

        Ok(Self {
            fixture: ResultFixture::new()?,
            transport: StubTransport::new(),
            host: StaticHost::new("test-node"),
            config: ReporterConfig {
                chef_server_url: TEST_SERVER_URL.to_string(),
                ..Default::default()
            },
            profiles: Vec::new(),
        })
    }

    pub fn with_transport(mut self, transport: StubTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.config.policy = policy;
        self
    }

    /// Add a profile whose result reports `failures` failed checks.
    pub fn profile_with_failures(&mut self, name: &str, owner: Option<&str>, failures: u64) -> Result<&mut Self> {
        let profile = self.fixture.write_failures(name, owner, failures)?;
        self.profiles.push(profile);
        Ok(self)
    }

    /// Add a profile that produced no result file.
    pub fn profile_without_result(&mut self, name: &str, owner: Option<&str>) -> &mut Self {
        let profile = self.fixture.profile(name, owner);
        self.profiles.push(profile);
        self
    }

    /// Add a profile whose result file holds `content` verbatim.
    pub fn profile_with_raw(&mut self, name: &str, owner: Option<&str>, content: &str) -> Result<&mut Self> {
        let profile = self.fixture.write_raw(name, owner, content)?;
        self.profiles.push(profile);
        Ok(self)
    }

    pub fn profiles(&self) -> &[ComplianceProfile] {
        &self.profiles
    }

    /// Run one report execution against the stub transport.
    pub async fn run(&self) -> std::result::Result<RunSummary, ReportError> {
        let reporter = Reporter::new(self.config.clone(), self.transport.clone())
            .expect("harness config must yield an endpoint");
        reporter.execute(&self.profiles, &self.host).await
    }

    /// Last submitted payload.
    pub fn last_payload(&self) -> Option<Value> {
        self.transport.last_body()
    }

    /// Assert a field exists in the last payload
    pub fn assert_field_exists(&self, field_path: &str) -> Result<()> {
        if let Some(payload) = self.last_payload() {
            if get_nested_field(&payload, field_path).is_some() {
                return Ok(());
            }
        }

        anyhow::bail!("Field '{}' not found in last payload", field_path);
    }

    /// Assert a field of the last payload has a specific value
    pub fn assert_field_equals(&self, field_path: &str, expected: &Value) -> Result<()> {
        if let Some(payload) = self.last_payload() {
            if let Some(actual) = get_nested_field(&payload, field_path) {
                if actual == expected {
                    return Ok(());
                }
                anyhow::bail!(
                    "Field '{}' mismatch: expected {:?}, got {:?}",
                    field_path,
                    expected,
                    actual
                );
            }
        }

        anyhow::bail!("Field '{}' not found for comparison in last payload", field_path);
    }
}

fn get_nested_field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in path.split('.') {
        match current {
            Value::Object(obj) => {
                current = obj.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}
