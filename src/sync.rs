//! Fire-and-forget replication of a chat to the save endpoint
//!
//! Each dispatch spawns its own task. Failures reach the failure handler
//! and go nowhere else: no retry, no user-visible error, no waiting.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::{ChatError, ChatResult};
use crate::models::Message;

const SAVE_PATH: &str = "/save_chat";

/// Payload replicated after each save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSnapshot {
    pub id: String,
    pub messages: Vec<Message>,
}

/// Destination for chat snapshots
#[async_trait]
pub trait SyncSink: Send + Sync {
    async fn push(&self, snapshot: &ChatSnapshot) -> ChatResult<()>;
}

/// Called with the session id and error of every failed push
pub type FailureHandler = Arc<dyn Fn(&str, &ChatError) + Send + Sync>;

/// POSTs snapshots to `{endpoint}/save_chat`
#[derive(Debug, Clone)]
pub struct HttpSync {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSync {
    pub fn new(endpoint: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}{}", endpoint.trim_end_matches('/'), SAVE_PATH),
            timeout,
        }
    }
}

#[async_trait]
impl SyncSink for HttpSync {
    async fn push(&self, snapshot: &ChatSnapshot) -> ChatResult<()> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChatError::Transport(format!("save failed with {}", response.status())));
        }
        Ok(())
    }
}

fn log_failure(id: &str, error: &ChatError) {
    tracing::warn!(session = id, error = %error, "auto-save failed");
}

/// Dispatches snapshots without blocking the caller
#[derive(Clone)]
pub struct SyncClient {
    sink: Option<Arc<dyn SyncSink>>,
    on_failure: FailureHandler,
}

impl SyncClient {
    pub fn new(sink: Arc<dyn SyncSink>) -> Self {
        Self {
            sink: Some(sink),
            on_failure: Arc::new(log_failure),
        }
    }

    /// A client that never sends anything
    pub fn disabled() -> Self {
        Self {
            sink: None,
            on_failure: Arc::new(log_failure),
        }
    }

    pub fn with_failure_handler(mut self, handler: FailureHandler) -> Self {
        self.on_failure = handler;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Spawn a push of `messages` for session `id`.
    ///
    /// Returns the task handle so callers that care (tests) can wait on it.
    /// Outside a tokio runtime the push is skipped.
    pub fn dispatch(&self, id: &str, messages: Vec<Message>) -> Option<JoinHandle<()>> {
        let sink = self.sink.clone()?;
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!(session = id, "no runtime, skipping auto-save");
                return None;
            }
        };

        let snapshot = ChatSnapshot {
            id: id.to_string(),
            messages,
        };
        let on_failure = self.on_failure.clone();

        Some(handle.spawn(async move {
            if let Err(e) = sink.push(&snapshot).await {
                on_failure(&snapshot.id, &e);
            }
        }))
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<ChatSnapshot>>);

    #[async_trait]
    impl SyncSink for Recorder {
        async fn push(&self, snapshot: &ChatSnapshot) -> ChatResult<()> {
            self.0.lock().unwrap().push(snapshot.clone());
            Ok(())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl SyncSink for Unreachable {
        async fn push(&self, _snapshot: &ChatSnapshot) -> ChatResult<()> {
            Err(ChatError::Transport("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_pushes_snapshot() {
        let recorder = Arc::new(Recorder(Mutex::new(vec![])));
        let client = SyncClient::new(recorder.clone());

        let handle = client.dispatch("42", vec![Message::user("hi")]).unwrap();
        handle.await.unwrap();

        let pushed = recorder.0.lock().unwrap();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].id, "42");
        assert_eq!(pushed[0].messages[0].content, "hi");
    }

    #[tokio::test]
    async fn test_failures_go_to_handler() {
        let failures = Arc::new(Mutex::new(Vec::<String>::new()));
        let seen = failures.clone();
        let client = SyncClient::new(Arc::new(Unreachable)).with_failure_handler(Arc::new(
            move |id: &str, _e: &ChatError| seen.lock().unwrap().push(id.to_string()),
        ));

        client.dispatch("7", vec![]).unwrap().await.unwrap();
        assert_eq!(*failures.lock().unwrap(), vec!["7".to_string()]);
    }

    #[test]
    fn test_disabled_and_runtime_free_dispatch() {
        assert!(SyncClient::disabled().dispatch("1", vec![]).is_none());

        let client = SyncClient::new(Arc::new(Unreachable));
        assert!(client.dispatch("1", vec![]).is_none());
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let snap = ChatSnapshot {
            id: "1".into(),
            messages: vec![Message::assistant("hello")],
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["messages"][0]["role"], "assistant");
    }
}
