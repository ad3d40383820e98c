use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

use super::changes::{
    ChangeFeed, ChangeHub, ChangeNotice, StoreTable, conversations_fingerprint,
};
use super::error::{
    BackendResult, BuildHttpClientSnafu, DecodePayloadSnafu, EmptyInsertReturnSnafu,
    InvalidTimestampSnafu, RequestFailedSnafu, UnexpectedStatusSnafu,
};
use super::ids::{ConversationId, MessageId};
use super::types::{
    ConversationRecord, DEFAULT_CONVERSATION_TITLE, MessageRecord, MessageRole, NewConversation,
    NewMessage,
};
use super::{BoxFuture, ChangeSource, ConversationStore, MessageStore, PollWorker};

/// Hosted-store connection parameters: the project base URL plus the service
/// key sent as both `apikey` and bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub service_key: String,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            service_key: service_key.into().trim().to_string(),
        }
    }
}

/// Client for the hosted relational store's REST surface.
///
/// The store owns the schema (`conversations`, `messages`) and mints row ids
/// and timestamps; this client only issues the four row operations the chat
/// surface needs plus a listing per table.
#[derive(Debug, Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    config: BackendConfig,
    hub: ChangeHub,
}

impl RestBackend {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context(BuildHttpClientSnafu {
                stage: "build-http-client",
            })?;

        Ok(Self {
            http,
            config,
            hub: ChangeHub::new(),
        })
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    async fn require_success(
        response: reqwest::Response,
        stage: &'static str,
    ) -> BackendResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        UnexpectedStatusSnafu {
            stage,
            status: status.as_u16(),
            body,
        }
        .fail()
    }

    async fn fetch_conversations(&self) -> BackendResult<Vec<ConversationRecord>> {
        let response = self
            .authorize(self.http.get(self.endpoint("conversations")))
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await
            .context(RequestFailedSnafu {
                stage: "conversation-list-send",
            })?;
        let response = Self::require_success(response, "conversation-list-status").await?;

        let rows: Vec<ConversationRow> = response.json().await.context(DecodePayloadSnafu {
            stage: "conversation-list-decode",
        })?;

        rows.into_iter().map(conversation_row_to_record).collect()
    }

    async fn create_conversation_row(
        &self,
        input: NewConversation,
    ) -> BackendResult<ConversationRecord> {
        let response = self
            .authorize(self.http.post(self.endpoint("conversations")))
            .header("Prefer", "return=representation")
            .json(&NewConversationRow {
                title: &input.title,
            })
            .send()
            .await
            .context(RequestFailedSnafu {
                stage: "conversation-create-send",
            })?;
        let response = Self::require_success(response, "conversation-create-status").await?;

        let rows: Vec<ConversationRow> = response.json().await.context(DecodePayloadSnafu {
            stage: "conversation-create-decode",
        })?;
        let row = rows.into_iter().next().context(EmptyInsertReturnSnafu {
            stage: "conversation-create-empty",
            entity: "conversations",
        })?;

        let record = conversation_row_to_record(row)?;
        self.hub.publish(ChangeNotice::new(StoreTable::Conversations));
        Ok(record)
    }

    async fn delete_conversation_row(&self, conversation_id: ConversationId) -> BackendResult<()> {
        let response = self
            .authorize(self.http.delete(self.endpoint("conversations")))
            .query(&[("id", format!("eq.{conversation_id}"))])
            .send()
            .await
            .context(RequestFailedSnafu {
                stage: "conversation-delete-send",
            })?;
        Self::require_success(response, "conversation-delete-status").await?;

        // The hosted schema cascades message rows with the conversation.
        self.hub.publish(ChangeNotice::new(StoreTable::Conversations));
        Ok(())
    }

    async fn insert_message_row(&self, input: NewMessage) -> BackendResult<MessageRecord> {
        let response = self
            .authorize(self.http.post(self.endpoint("messages")))
            .header("Prefer", "return=representation")
            .json(&NewMessageRow {
                conversation_id: input.conversation_id.to_string(),
                role: input.role.as_str(),
                content: &input.content,
            })
            .send()
            .await
            .context(RequestFailedSnafu {
                stage: "message-insert-send",
            })?;
        let response = Self::require_success(response, "message-insert-status").await?;

        let rows: Vec<MessageRow> = response.json().await.context(DecodePayloadSnafu {
            stage: "message-insert-decode",
        })?;
        let row = rows.into_iter().next().context(EmptyInsertReturnSnafu {
            stage: "message-insert-empty",
            entity: "messages",
        })?;

        let record = message_row_to_record(row)?;
        self.hub.publish(ChangeNotice::new(StoreTable::Messages));
        Ok(record)
    }

    async fn fetch_messages(
        &self,
        conversation_id: ConversationId,
    ) -> BackendResult<Vec<MessageRecord>> {
        let response = self
            .authorize(self.http.get(self.endpoint("messages")))
            .query(&[
                ("select", "*".to_string()),
                ("conversation_id", format!("eq.{conversation_id}")),
                ("order", "created_at.asc".to_string()),
            ])
            .send()
            .await
            .context(RequestFailedSnafu {
                stage: "message-list-send",
            })?;
        let response = Self::require_success(response, "message-list-status").await?;

        let rows: Vec<MessageRow> = response.json().await.context(DecodePayloadSnafu {
            stage: "message-list-decode",
        })?;

        rows.into_iter().map(message_row_to_record).collect()
    }

    /// Returns a worker future that approximates the hosted store's change
    /// channel by polling the conversation listing and publishing a notice
    /// whenever its fingerprint moves. The caller drives it on tokio.
    pub fn change_poller(&self, period: Duration) -> PollWorker {
        let backend = self.clone();
        Box::pin(async move {
            let mut last_fingerprint: Option<u64> = None;
            loop {
                tokio::time::sleep(period).await;
                match backend.fetch_conversations().await {
                    Ok(records) => {
                        let fingerprint = conversations_fingerprint(&records);
                        if last_fingerprint.is_some_and(|previous| previous != fingerprint) {
                            backend
                                .hub
                                .publish(ChangeNotice::new(StoreTable::Conversations));
                        }
                        last_fingerprint = Some(fingerprint);
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "conversation change poll failed");
                    }
                }
            }
        })
    }
}

impl ConversationStore for RestBackend {
    fn create_conversation<'a>(
        &'a self,
        input: NewConversation,
    ) -> BoxFuture<'a, BackendResult<ConversationRecord>> {
        Box::pin(self.create_conversation_row(input))
    }

    fn list_conversations<'a>(&'a self) -> BoxFuture<'a, BackendResult<Vec<ConversationRecord>>> {
        Box::pin(self.fetch_conversations())
    }

    fn delete_conversation<'a>(
        &'a self,
        conversation_id: ConversationId,
    ) -> BoxFuture<'a, BackendResult<()>> {
        Box::pin(self.delete_conversation_row(conversation_id))
    }
}

impl MessageStore for RestBackend {
    fn insert_message<'a>(
        &'a self,
        input: NewMessage,
    ) -> BoxFuture<'a, BackendResult<MessageRecord>> {
        Box::pin(self.insert_message_row(input))
    }

    fn list_messages<'a>(
        &'a self,
        conversation_id: ConversationId,
    ) -> BoxFuture<'a, BackendResult<Vec<MessageRecord>>> {
        Box::pin(self.fetch_messages(conversation_id))
    }
}

impl ChangeSource for RestBackend {
    fn subscribe_changes(&self) -> ChangeFeed {
        self.hub.subscribe()
    }
}

#[derive(Debug, Deserialize)]
struct ConversationRow {
    id: String,
    title: Option<String>,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct NewConversationRow<'a> {
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct NewMessageRow<'a> {
    conversation_id: String,
    role: &'static str,
    content: &'a str,
}

fn conversation_row_to_record(row: ConversationRow) -> BackendResult<ConversationRecord> {
    Ok(ConversationRecord {
        id: ConversationId::parse(&row.id)?,
        title: row
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string()),
        created_at_unix_seconds: parse_created_at(&row.created_at, "conversation-created-at")?,
    })
}

fn message_row_to_record(row: MessageRow) -> BackendResult<MessageRecord> {
    Ok(MessageRecord {
        id: MessageId::parse(&row.id)?,
        conversation_id: ConversationId::parse(&row.conversation_id)?,
        role: MessageRole::parse(&row.role)?,
        content: row.content,
        created_at_unix_seconds: parse_created_at(&row.created_at, "message-created-at")?,
    })
}

fn parse_created_at(raw: &str, stage: &'static str) -> BackendResult<u64> {
    let parsed = chrono::DateTime::parse_from_rfc3339(raw).context(InvalidTimestampSnafu {
        stage,
        raw: raw.to_string(),
    })?;
    Ok(parsed.timestamp().max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use mockito::Matcher;

    fn backend_for(server: &mockito::Server) -> RestBackend {
        RestBackend::new(BackendConfig::new(server.url(), "service-key")).unwrap()
    }

    #[test]
    fn config_normalizes_trailing_slash() {
        let config = BackendConfig::new("https://example.supabase.co/", " key ");
        assert_eq!(config.base_url, "https://example.supabase.co");
        assert_eq!(config.service_key, "key");
    }

    #[tokio::test]
    async fn create_conversation_posts_representation_request() {
        let mut server = mockito::Server::new_async().await;
        let id = ConversationId::mint();
        let mock = server
            .mock("POST", "/rest/v1/conversations")
            .match_header("apikey", "service-key")
            .match_header("authorization", "Bearer service-key")
            .match_header("prefer", "return=representation")
            .match_body(Matcher::Json(serde_json::json!({ "title": "Hello there" })))
            .with_status(201)
            .with_body(format!(
                r#"[{{"id":"{id}","title":"Hello there","created_at":"2024-05-01T10:00:00+00:00"}}]"#
            ))
            .create_async()
            .await;

        let backend = backend_for(&server);
        let record = backend
            .create_conversation_row(NewConversation::new("Hello there"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.id, id);
        assert_eq!(record.title, "Hello there");
        assert!(record.created_at_unix_seconds > 0);
    }

    #[tokio::test]
    async fn create_conversation_publishes_local_change_notice() {
        let mut server = mockito::Server::new_async().await;
        let id = ConversationId::mint();
        server
            .mock("POST", "/rest/v1/conversations")
            .with_status(201)
            .with_body(format!(
                r#"[{{"id":"{id}","title":"t","created_at":"2024-05-01T10:00:00+00:00"}}]"#
            ))
            .create_async()
            .await;

        let backend = backend_for(&server);
        let mut feed = backend.subscribe_changes();
        backend
            .create_conversation_row(NewConversation::new("t"))
            .await
            .unwrap();

        assert_eq!(
            feed.recv().await,
            Some(ChangeNotice::new(StoreTable::Conversations))
        );
    }

    #[tokio::test]
    async fn list_conversations_orders_newest_first_and_defaults_titles() {
        let mut server = mockito::Server::new_async().await;
        let first = ConversationId::mint();
        let second = ConversationId::mint();
        let mock = server
            .mock("GET", "/rest/v1/conversations")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
            ]))
            .with_status(200)
            .with_body(format!(
                r#"[{{"id":"{first}","title":null,"created_at":"2024-05-02T08:00:00+00:00"}},
                    {{"id":"{second}","title":"Older","created_at":"2024-05-01T08:00:00+00:00"}}]"#
            ))
            .create_async()
            .await;

        let backend = backend_for(&server);
        let records = backend.fetch_conversations().await.unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first);
        assert_eq!(records[0].title, DEFAULT_CONVERSATION_TITLE);
        assert_eq!(records[1].title, "Older");
    }

    #[tokio::test]
    async fn delete_conversation_filters_by_id() {
        let mut server = mockito::Server::new_async().await;
        let id = ConversationId::mint();
        let mock = server
            .mock("DELETE", "/rest/v1/conversations")
            .match_query(Matcher::UrlEncoded("id".into(), format!("eq.{id}")))
            .with_status(204)
            .create_async()
            .await;

        let backend = backend_for(&server);
        backend.delete_conversation_row(id).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn insert_message_sends_wire_role() {
        let mut server = mockito::Server::new_async().await;
        let conversation_id = ConversationId::mint();
        let message_id = MessageId::mint();
        let mock = server
            .mock("POST", "/rest/v1/messages")
            .match_body(Matcher::Json(serde_json::json!({
                "conversation_id": conversation_id.to_string(),
                "role": "bot",
                "content": "Hi!",
            })))
            .with_status(201)
            .with_body(format!(
                r#"[{{"id":"{message_id}","conversation_id":"{conversation_id}","role":"bot","content":"Hi!","created_at":"2024-05-01T10:00:05+00:00"}}]"#
            ))
            .create_async()
            .await;

        let backend = backend_for(&server);
        let record = backend
            .insert_message_row(NewMessage::new(conversation_id, MessageRole::Bot, "Hi!"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(record.id, message_id);
        assert_eq!(record.conversation_id, conversation_id);
        assert_eq!(record.role, MessageRole::Bot);
    }

    #[tokio::test]
    async fn list_messages_filters_by_conversation_ascending() {
        let mut server = mockito::Server::new_async().await;
        let conversation_id = ConversationId::mint();
        let message_id = MessageId::mint();
        let mock = server
            .mock("GET", "/rest/v1/messages")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("conversation_id".into(), format!("eq.{conversation_id}")),
                Matcher::UrlEncoded("order".into(), "created_at.asc".into()),
            ]))
            .with_status(200)
            .with_body(format!(
                r#"[{{"id":"{message_id}","conversation_id":"{conversation_id}","role":"user","content":"Hello","created_at":"2024-05-01T10:00:00+00:00"}}]"#
            ))
            .create_async()
            .await;

        let backend = backend_for(&server);
        let records = backend.fetch_messages(conversation_id).await.unwrap();

        mock.assert_async().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].role, MessageRole::User);
        assert_eq!(records[0].content, "Hello");
    }

    #[tokio::test]
    async fn error_status_surfaces_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/conversations")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("invalid api key")
            .create_async()
            .await;

        let backend = backend_for(&server);
        let error = backend.fetch_conversations().await.unwrap_err();

        match error {
            BackendError::UnexpectedStatus { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_timestamp_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let id = ConversationId::mint();
        server
            .mock("GET", "/rest/v1/conversations")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"[{{"id":"{id}","title":"t","created_at":"yesterday"}}]"#
            ))
            .create_async()
            .await;

        let backend = backend_for(&server);
        let error = backend.fetch_conversations().await.unwrap_err();
        assert!(matches!(error, BackendError::InvalidTimestamp { .. }));
    }
}
