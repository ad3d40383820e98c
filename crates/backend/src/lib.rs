//! Client for the hosted conversation store.
//!
//! The store itself is an externally managed relational service exposing the
//! `conversations` and `messages` tables over a PostgREST-style HTTP surface.
//! This crate wraps the handful of row operations the chat client needs and a
//! row-change notification feed; it owns no schema and no persistence.

use std::future::Future;
use std::pin::Pin;

pub mod changes;
pub mod error;
pub mod ids;
pub mod rest;
pub mod types;

pub use changes::{ChangeFeed, ChangeHub, ChangeNotice, StoreTable, conversations_fingerprint};
pub use error::{BackendError, BackendResult};
pub use ids::{ConversationId, MessageId};
pub use rest::{BackendConfig, RestBackend};
pub use types::{
    CONVERSATION_TITLE_MAX_CHARS, ConversationRecord, DEFAULT_CONVERSATION_TITLE, MessageRecord,
    MessageRole, NewConversation, NewMessage, derive_conversation_title,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Long-running worker future driven by the caller's runtime.
pub type PollWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub trait ConversationStore: Send + Sync {
    fn create_conversation<'a>(
        &'a self,
        input: NewConversation,
    ) -> BoxFuture<'a, BackendResult<ConversationRecord>>;
    fn list_conversations<'a>(&'a self) -> BoxFuture<'a, BackendResult<Vec<ConversationRecord>>>;
    fn delete_conversation<'a>(
        &'a self,
        conversation_id: ConversationId,
    ) -> BoxFuture<'a, BackendResult<()>>;
}

pub trait MessageStore: Send + Sync {
    fn insert_message<'a>(
        &'a self,
        input: NewMessage,
    ) -> BoxFuture<'a, BackendResult<MessageRecord>>;
    fn list_messages<'a>(
        &'a self,
        conversation_id: ConversationId,
    ) -> BoxFuture<'a, BackendResult<Vec<MessageRecord>>>;
}

pub trait ChangeSource: Send + Sync {
    fn subscribe_changes(&self) -> ChangeFeed;
}

pub trait Backend: ConversationStore + MessageStore + ChangeSource {}

impl<T> Backend for T where T: ConversationStore + MessageStore + ChangeSource {}
