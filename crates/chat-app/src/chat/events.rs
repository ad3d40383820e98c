use wren_backend::{ConversationId, ConversationRecord};

/// Emitted when sidebar selection changes the active conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSelected {
    pub record: ConversationRecord,
}

/// Emitted after the sidebar deleted a conversation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationDeleted {
    pub conversation_id: ConversationId,
}

/// Emitted when the user asks for a fresh draft chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NewChatRequested;

/// Emitted when the user submits a prompt to generate a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

impl Submit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Emitted when the user requests cancellation of the in-flight send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stop;
