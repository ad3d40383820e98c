use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};

/// Instruction prefixed to every generate call, streamed or not.
pub const SYSTEM_INSTRUCTION: &str = "You are a professional AI assistant. \
Provide helpful, concise, and accurate responses. Format code blocks clearly.";

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Identifier for one generation session.
///
/// This must change on every submit so stale chunks can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    /// Creates a typed stream session identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub model_id: String,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        model_id: Option<String>,
    ) -> Self {
        let model_id = model_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            model_id,
        }
    }
}

/// One generate call: the latest user prompt only, no prior turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub session_id: StreamSessionId,
    pub prompt: String,
}

impl GenerateRequest {
    pub fn new(session_id: StreamSessionId, prompt: impl Into<String>) -> Self {
        Self {
            session_id,
            prompt: prompt.into(),
        }
    }
}

/// Provider-agnostic stream payload mapped into chat domain language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    Delta(String),
    Done,
    Error(String),
}

/// One mapped event of a streaming generate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub session_id: StreamSessionId,
    pub payload: StreamEventPayload,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("generate request for session {session_id:?} has an empty prompt"))]
    EmptyPrompt {
        stage: &'static str,
        session_id: StreamSessionId,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("completion response contained no text content"))]
    EmptyCompletion { stage: &'static str },
}

/// Receiver half of a streaming generate call.
///
/// Dropping the stream signals cancellation to the provider worker.
pub struct ProviderEventStream {
    session_id: StreamSessionId,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub worker: ProviderWorker,
}

impl ProviderEventStream {
    pub(crate) fn new(
        session_id: StreamSessionId,
        events: mpsc::UnboundedReceiver<StreamEvent>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            session_id,
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn session_id(&self) -> StreamSessionId {
        self.session_id
    }

    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.events.try_recv().ok()
    }

    pub fn cancel(&mut self) -> bool {
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for ProviderEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

pub trait GenerativeProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn model_id(&self) -> &str;
    /// Single-shot content generation from one prompt.
    fn generate<'a>(&'a self, request: GenerateRequest) -> BoxFuture<'a, ProviderResult<String>>;
    /// Streaming content generation; the handle's worker must be driven on tokio.
    fn stream_generate(&self, request: GenerateRequest) -> ProviderResult<ProviderStreamHandle>;
}

pub(crate) fn make_event_stream(
    session_id: StreamSessionId,
) -> (
    mpsc::UnboundedSender<StreamEvent>,
    ProviderEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        ProviderEventStream::new(session_id, event_rx, cancel_tx),
        cancel_rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_model_when_unset() {
        let config = ProviderConfig::new("gemini", "key", None);
        assert_eq!(config.model_id, DEFAULT_GEMINI_MODEL);

        let config = ProviderConfig::new("gemini", "key", Some("  ".to_string()));
        assert_eq!(config.model_id, DEFAULT_GEMINI_MODEL);

        let config = ProviderConfig::new("gemini", "key", Some("gemini-1.5-pro".to_string()));
        assert_eq!(config.model_id, "gemini-1.5-pro");
    }

    #[tokio::test]
    async fn event_stream_delivers_in_order() {
        let session_id = StreamSessionId::new(7);
        let (event_tx, mut stream, _cancel_rx) = make_event_stream(session_id);

        event_tx
            .send(StreamEvent {
                session_id,
                payload: StreamEventPayload::Delta("Hel".to_string()),
            })
            .unwrap();
        event_tx
            .send(StreamEvent {
                session_id,
                payload: StreamEventPayload::Done,
            })
            .unwrap();

        assert_eq!(
            stream.recv().await.map(|event| event.payload),
            Some(StreamEventPayload::Delta("Hel".to_string()))
        );
        assert_eq!(
            stream.recv().await.map(|event| event.payload),
            Some(StreamEventPayload::Done)
        );
    }

    #[tokio::test]
    async fn dropping_the_stream_fires_cancellation() {
        let (_event_tx, stream, mut cancel_rx) = make_event_stream(StreamSessionId::new(1));
        assert!(cancel_rx.try_recv().is_err());

        drop(stream);
        assert!(cancel_rx.await.is_ok());
    }

    #[tokio::test]
    async fn explicit_cancel_fires_once() {
        let (_event_tx, mut stream, mut cancel_rx) = make_event_stream(StreamSessionId::new(2));
        assert!(stream.cancel());
        assert!(!stream.cancel());
        assert!(cancel_rx.try_recv().is_ok());
    }
}
