//! Report submission and pass/fail policy
//!
//! One execution walks `Idle → Aggregating → Submitting → PolicyCheck` and
//! ends in `Done` or `Aborted`. There is no retry: a failed submission is
//! logged and either swallowed or propagated depending on policy, and the
//! failure policy is evaluated whatever the submission outcome was.

use crate::aggregator::{compound_report, AggregateReport};
use crate::config::{PolicyConfig, ReporterConfig};
use crate::error::{ConfigError, ReportError, SubmissionError};
use crate::host::{HostContext, HostMetadata};
use crate::profile::ProfileSource;
use crate::transport::{Transport, TransportFailure};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info};

/// Wire document posted to the reporting endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPayload {
    #[serde(flatten)]
    pub host: HostMetadata,
    pub reports: BTreeMap<String, Value>,
    pub profiles: BTreeMap<String, String>,
}

/// Merge host metadata with the aggregate. The failure total stays local.
pub fn build_payload(aggregate: &AggregateReport, host: HostMetadata) -> ReportPayload {
    ReportPayload {
        host,
        reports: aggregate.reports().clone(),
        profiles: aggregate.profiles().clone(),
    }
}

impl From<TransportFailure> for SubmissionError {
    fn from(failure: TransportFailure) -> Self {
        match failure.status {
            Some(401) => SubmissionError::Authentication {
                message: failure.message,
            },
            Some(403) => SubmissionError::Authorization {
                message: failure.message,
            },
            status => SubmissionError::Transport {
                status,
                message: failure.message,
            },
        }
    }
}

/// POST `payload` to `endpoint` and classify any failure.
///
/// Credentials are carried by the transport. Every failure is logged before
/// it is returned; whether it aborts the run is the caller's decision.
pub async fn submit<T>(transport: &T, endpoint: &str, payload: &ReportPayload) -> Result<(), SubmissionError>
where
    T: Transport + ?Sized,
{
    let body = serde_json::to_value(payload).map_err(|e| SubmissionError::Transport {
        status: None,
        message: format!("failed to serialize report: {e}"),
    })?;

    match transport.post(endpoint, &body).await {
        Ok(()) => Ok(()),
        Err(failure) => {
            let err = SubmissionError::from(failure);
            error!("{}", err);
            error!("Report NOT saved to server.");
            Err(err)
        }
    }
}

/// Fail the run when audits failed and the policy asks for it.
pub fn apply_policy(total_failed: i64, fail_if_any_failed: bool) -> Result<(), ReportError> {
    if total_failed > 0 && fail_if_any_failed {
        return Err(ReportError::PolicyViolation {
            failed: total_failed,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Aggregating,
    Submitting,
    PolicyCheck,
    Done,
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Aggregating => "aggregating",
            Phase::Submitting => "submitting",
            Phase::PolicyCheck => "policy-check",
            Phase::Done => "done",
            Phase::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of an execution that did not abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total_failed: i64,
    pub profiles_reported: usize,
    /// Submission failure swallowed because `raise_if_unreachable` is off.
    pub submission_error: Option<SubmissionError>,
}

impl RunSummary {
    pub fn saved(&self) -> bool {
        self.submission_error.is_none()
    }
}

/// Aggregates profile results and files them with the reporting server.
pub struct Reporter<T: Transport> {
    config: ReporterConfig,
    endpoint: String,
    transport: T,
}

impl<T: Transport> Reporter<T> {
    /// Fails when no endpoint can be built from `config`.
    pub fn new(config: ReporterConfig, transport: T) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint()?.to_string();
        Ok(Self {
            config,
            endpoint,
            transport,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.config.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one report: aggregate, submit, apply policy.
    pub async fn execute<P, H>(&self, profiles: &[P], host: &H) -> Result<RunSummary, ReportError>
    where
        P: ProfileSource,
        H: HostContext + ?Sized,
    {
        enter(Phase::Idle, Phase::Aggregating);
        let aggregate = compound_report(profiles).await.inspect_err(|_| {
            enter(Phase::Aggregating, Phase::Aborted);
        })?;
        let total_failed = aggregate.total_failed();

        enter(Phase::Aggregating, Phase::Submitting);
        let metadata = HostMetadata::collect(
            host,
            self.config.node.as_deref(),
            self.config.environment.as_deref(),
        );
        let payload = build_payload(&aggregate, metadata);
        info!(
            "Submitting {} profile report(s) for node {} to {}",
            aggregate.len(),
            payload.host.node,
            self.endpoint
        );

        let submission_error = match submit(&self.transport, &self.endpoint, &payload).await {
            Ok(()) => {
                info!("Report saved to server");
                None
            }
            Err(err) if self.config.policy.raise_if_unreachable => {
                enter(Phase::Submitting, Phase::Aborted);
                return Err(err.into());
            }
            Err(err) => Some(err),
        };

        enter(Phase::Submitting, Phase::PolicyCheck);
        apply_policy(total_failed, self.config.policy.fail_if_any_failed).inspect_err(|_| {
            enter(Phase::PolicyCheck, Phase::Aborted);
        })?;

        enter(Phase::PolicyCheck, Phase::Done);
        Ok(RunSummary {
            total_failed,
            profiles_reported: aggregate.len(),
            submission_error,
        })
    }
}

fn enter(from: Phase, to: Phase) {
    debug!("Report run: {} -> {}", from, to);
}
