/*!
Stub transport for report runs without a server

Records every POST and answers from a script; once the script runs out the
fallback answer is used.
*/

use async_trait::async_trait;
use compliance_report::{Transport, TransportFailure};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub url: String,
    pub body: Value,
}

/// Stub implementing `compliance_report::Transport`
#[derive(Clone)]
pub struct StubTransport {
    posts: Arc<Mutex<Vec<RecordedPost>>>,
    script: Arc<Mutex<VecDeque<Result<(), TransportFailure>>>>,
    fallback: Result<(), TransportFailure>,
}

impl StubTransport {
    /// Accepts every report.
    pub fn new() -> Self {
        Self {
            posts: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Ok(()),
        }
    }

    /// Answers every POST with `status`.
    pub fn responding(status: u16) -> Self {
        let mut stub = Self::new();
        if !(200..300).contains(&status) {
            stub.fallback = Err(TransportFailure::status(status, format!("{status} from stub")));
        }
        stub
    }

    /// Fails every POST without a response, like a refused connection.
    pub fn unreachable() -> Self {
        let mut stub = Self::new();
        stub.fallback = Err(TransportFailure::unreachable("connection refused (stub)"));
        stub
    }

    /// Queue an answer for the next POST.
    pub fn push_response(&self, response: Result<(), TransportFailure>) -> &Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    /// All POSTs received so far (for test assertions)
    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> Option<Value> {
        self.posts.lock().unwrap().last().map(|p| p.body.clone())
    }

    /// Reset recorded POSTs and pending answers
    pub fn clear(&self) {
        self.posts.lock().unwrap().clear();
        self.script.lock().unwrap().clear();
    }
}

impl Default for StubTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn post(&self, url: &str, body: &Value) -> Result<(), TransportFailure> {
        self.posts.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            body: body.clone(),
        });

        let scripted = self.script.lock().unwrap().pop_front();
        tracing::debug!("[STUB] POST {} ({} bytes)", url, body.to_string().len());
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_posts() {
        let stub = StubTransport::new();

        stub.post("https://x/a", &json!({ "n": 1 })).await.unwrap();
        stub.post("https://x/b", &json!({ "n": 2 })).await.unwrap();

        let posts = stub.posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].url, "https://x/a");
        assert_eq!(stub.last_body().unwrap()["n"], 2);

        stub.clear();
        assert!(stub.posts().is_empty());
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let stub = StubTransport::responding(200);
        stub.push_response(Err(TransportFailure::status(401, "401 Unauthorized")));

        let first = stub.post("u", &json!({})).await.unwrap_err();
        assert_eq!(first.status, Some(401));
        assert!(stub.post("u", &json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_failing_stubs() {
        let forbidden = StubTransport::responding(403);
        assert_eq!(forbidden.post("u", &json!({})).await.unwrap_err().status, Some(403));

        let down = StubTransport::unreachable();
        assert_eq!(down.post("u", &json!({})).await.unwrap_err().status, None);
    }
}
