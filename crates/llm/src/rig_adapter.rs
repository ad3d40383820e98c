use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::message::AssistantContent;
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};
use tokio::sync::{mpsc, oneshot};

use super::provider::{
    CompletionsFailedSnafu, EmptyCompletionSnafu, EmptyPromptSnafu, GenerateRequest,
    GenerativeProvider, HttpClientSnafu, MissingApiKeySnafu, ProviderConfig, ProviderError,
    ProviderResult, ProviderStreamHandle, ProviderWorker, SYSTEM_INSTRUCTION, StreamEvent,
    StreamEventPayload, StreamSessionId, make_event_stream,
};
use super::provider::BoxFuture;

pub const RIG_GEMINI_PROVIDER_ID: &str = "gemini";

type RigStreamingResponse =
    rig::streaming::StreamingCompletionResponse<gemini::streaming::StreamingCompletionResponse>;

pub struct RigGeminiAdapter {
    config: ProviderConfig,
}

impl RigGeminiAdapter {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self { config })
    }

    fn build_client(config: &ProviderConfig) -> ProviderResult<gemini::Client> {
        gemini::Client::builder()
            .api_key(config.api_key.as_str())
            .build()
            .context(HttpClientSnafu {
                stage: "build-client",
            })
    }

    async fn request_completion(
        config: &ProviderConfig,
        request: &GenerateRequest,
    ) -> ProviderResult<String> {
        let client = Self::build_client(config)?;
        let model = client.completion_model(config.model_id.clone());

        let response = model
            .completion_request(RigMessage::user(request.prompt.clone()))
            .preamble(SYSTEM_INSTRUCTION.to_string())
            .send()
            .await
            .context(CompletionsFailedSnafu {
                stage: "generate-send",
            })?;

        let text = response
            .choice
            .into_iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        ensure!(
            !text.is_empty(),
            EmptyCompletionSnafu {
                stage: "generate-collect",
            }
        );

        Ok(text)
    }

    async fn open_stream(
        config: &ProviderConfig,
        request: &GenerateRequest,
    ) -> ProviderResult<RigStreamingResponse> {
        let client = Self::build_client(config)?;
        let model = client.completion_model(config.model_id.clone());

        model
            .completion_request(RigMessage::user(request.prompt.clone()))
            .preamble(SYSTEM_INSTRUCTION.to_string())
            .stream()
            .await
            .context(CompletionsFailedSnafu {
                stage: "open-stream",
            })
    }

    fn emit_error_event(
        event_tx: &mpsc::UnboundedSender<StreamEvent>,
        session_id: StreamSessionId,
        error: ProviderError,
    ) {
        let _ = event_tx.send(StreamEvent {
            session_id,
            payload: StreamEventPayload::Error(error.to_string()),
        });
    }

    fn map_stream_item<R>(
        session_id: StreamSessionId,
        item: StreamedAssistantContent<R>,
    ) -> Option<StreamEvent>
    where
        R: Clone + Unpin,
    {
        let payload = match item {
            StreamedAssistantContent::Text(text) => StreamEventPayload::Delta(text.text),
            // Reasoning fragments and tool calls have no place in a plain
            // chat bubble; only text deltas flow through.
            StreamedAssistantContent::Reasoning(_)
            | StreamedAssistantContent::ReasoningDelta { .. }
            | StreamedAssistantContent::ToolCall { .. }
            | StreamedAssistantContent::ToolCallDelta { .. }
            | StreamedAssistantContent::Final(_) => return None,
        };

        Some(StreamEvent {
            session_id,
            payload,
        })
    }

    async fn run_stream_worker(
        config: ProviderConfig,
        request: GenerateRequest,
        event_tx: mpsc::UnboundedSender<StreamEvent>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let session_id = request.session_id;
        let mut stream = match Self::open_stream(&config, &request).await {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(
                    session_id = ?session_id,
                    model_id = %config.model_id,
                    error = %error,
                    "failed to open model stream"
                );
                Self::emit_error_event(&event_tx, session_id, error);
                return;
            }
        };

        let mut cancelled = false;
        let mut stream_failed = false;

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    cancelled = true;
                    // Cancel the upstream rig stream so provider IO stops promptly.
                    tracing::debug!(session_id = ?session_id, "model stream cancelled");
                    stream.cancel();
                    break;
                }
                next_item = stream.next() => {
                    match next_item {
                        Some(Ok(item)) => {
                            if let Some(mapped) = Self::map_stream_item(session_id, item)
                                && event_tx.send(mapped).is_err()
                            {
                                return;
                            }
                        }
                        Some(Err(source)) => {
                            stream_failed = true;
                            tracing::warn!(
                                session_id = ?session_id,
                                error = %source,
                                "model stream emitted an error chunk"
                            );
                            let error = ProviderError::CompletionsFailed {
                                stage: "stream-chunk",
                                source,
                            };
                            Self::emit_error_event(&event_tx, session_id, error);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        if !cancelled && !stream_failed {
            let _ = event_tx.send(StreamEvent {
                session_id,
                payload: StreamEventPayload::Done,
            });
        }
    }
}

impl GenerativeProvider for RigGeminiAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        "Rig Gemini"
    }

    fn model_id(&self) -> &str {
        &self.config.model_id
    }

    fn generate<'a>(&'a self, request: GenerateRequest) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            ensure!(
                !request.prompt.trim().is_empty(),
                EmptyPromptSnafu {
                    stage: "generate",
                    session_id: request.session_id,
                }
            );

            Self::request_completion(&self.config, &request).await
        })
    }

    fn stream_generate(&self, request: GenerateRequest) -> ProviderResult<ProviderStreamHandle> {
        ensure!(
            !request.prompt.trim().is_empty(),
            EmptyPromptSnafu {
                stage: "stream-generate",
                session_id: request.session_id,
            }
        );

        let (event_tx, stream, cancel_rx) = make_event_stream(request.session_id);
        let worker: ProviderWorker = Box::pin(Self::run_stream_worker(
            self.config.clone(),
            request,
            event_tx,
            cancel_rx,
        ));

        Ok(ProviderStreamHandle { stream, worker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_requires_an_api_key() {
        let error =
            RigGeminiAdapter::new(ProviderConfig::new("gemini", "", None)).err().unwrap();
        assert!(matches!(error, ProviderError::MissingApiKey { .. }));
    }

    #[test]
    fn stream_generate_rejects_blank_prompts_before_any_io() {
        let adapter = RigGeminiAdapter::new(ProviderConfig::new("gemini", "key", None)).unwrap();
        let request = GenerateRequest::new(StreamSessionId::new(1), "   \n");
        let error = adapter.stream_generate(request).err().unwrap();
        assert!(matches!(error, ProviderError::EmptyPrompt { .. }));
    }

    #[tokio::test]
    async fn generate_rejects_blank_prompts_before_any_io() {
        let adapter = RigGeminiAdapter::new(ProviderConfig::new("gemini", "key", None)).unwrap();
        let request = GenerateRequest::new(StreamSessionId::new(2), "");
        let error = adapter.generate(request).await.unwrap_err();
        assert!(matches!(error, ProviderError::EmptyPrompt { .. }));
    }
}
