//! Compliance report aggregation and submission
//!
//! Collects the results of already-executed compliance profiles, files them
//! as one report with the reporting server, and applies the pass/fail policy:
//! - [`aggregator`]: profile results → one aggregate keyed by identity
//! - [`reporter`]: host metadata, submission, failure classification, policy
//! - [`transport`]: the HTTP seam and its reqwest implementation
//! - [`config`]: TOML/env/keyring configuration and endpoint construction

pub mod aggregator;
pub mod config;
pub mod error;
pub mod host;
pub mod profile;
pub mod reporter;
pub mod transport;

pub use aggregator::{compound_report, total_failed, AggregateReport};
pub use config::{PolicyConfig, ReporterConfig};
pub use error::{ConfigError, ReportError, SubmissionError};
pub use host::{HostContext, HostMetadata, SystemHost};
pub use profile::{ComplianceProfile, ProfileSource};
pub use reporter::{apply_policy, build_payload, submit, Reporter, ReportPayload, RunSummary};
pub use transport::{Credentials, HttpTransport, Transport, TransportFailure};
