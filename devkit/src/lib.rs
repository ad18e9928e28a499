/*!
# Compliance DevKit - Stubs and helpers for testing report runs

Lets tests drive a full report execution without a reporting server:
- Scripted transport that records every POST
- Static host context
- Result-file fixtures and result document builder
- Test harness wiring them to a `Reporter`
*/

pub mod result_helpers;
pub mod test_utils;
pub mod transport_stub;

pub use result_helpers::{ResultDocument, ResultFixture};
pub use test_utils::{StaticHost, TestHarness};
pub use transport_stub::{RecordedPost, StubTransport};
