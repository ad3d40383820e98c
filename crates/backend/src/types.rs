use super::error::{BackendResult, InvalidRoleSnafu};
use super::ids::{ConversationId, MessageId};

/// Title shown for rows the hosted service stored without one.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

/// Derived conversation titles keep at most this many characters of the prompt.
pub const CONVERSATION_TITLE_MAX_CHARS: usize = 40;

/// Store-local message role, intentionally decoupled from UI-layer role enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageRole {
    User,
    Bot,
}

impl MessageRole {
    /// Wire value used in the hosted `messages.role` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }

    pub fn parse(raw: &str) -> BackendResult<Self> {
        match raw {
            "user" => Ok(Self::User),
            "bot" => Ok(Self::Bot),
            _ => InvalidRoleSnafu {
                stage: "parse-message-role",
                raw: raw.to_string(),
            }
            .fail(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub title: String,
    pub created_at_unix_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
    pub created_at_unix_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub title: String,
}

impl NewConversation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
}

impl NewMessage {
    pub fn new(
        conversation_id: ConversationId,
        role: MessageRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id,
            role,
            content: content.into(),
        }
    }
}

/// Derives a conversation title from the first prompt of a draft chat.
///
/// Keeps the first [`CONVERSATION_TITLE_MAX_CHARS`] characters and marks
/// truncation with a trailing ellipsis. Blank prompts fall back to
/// [`DEFAULT_CONVERSATION_TITLE`].
pub fn derive_conversation_title(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return DEFAULT_CONVERSATION_TITLE.to_string();
    }

    let mut title: String = trimmed.chars().take(CONVERSATION_TITLE_MAX_CHARS).collect();
    if trimmed.chars().count() > CONVERSATION_TITLE_MAX_CHARS {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_wire_values_round_trip() {
        assert_eq!(MessageRole::parse("user").unwrap(), MessageRole::User);
        assert_eq!(MessageRole::parse("bot").unwrap(), MessageRole::Bot);
        assert_eq!(MessageRole::User.as_str(), "user");
        assert_eq!(MessageRole::Bot.as_str(), "bot");
        assert!(MessageRole::parse("assistant").is_err());
    }

    #[test]
    fn short_prompt_becomes_title_verbatim() {
        assert_eq!(derive_conversation_title("Hello there"), "Hello there");
    }

    #[test]
    fn long_prompt_is_truncated_with_ellipsis() {
        let prompt = "a".repeat(CONVERSATION_TITLE_MAX_CHARS + 5);
        let title = derive_conversation_title(&prompt);
        assert_eq!(
            title,
            format!("{}...", "a".repeat(CONVERSATION_TITLE_MAX_CHARS))
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let prompt = "é".repeat(CONVERSATION_TITLE_MAX_CHARS + 1);
        let title = derive_conversation_title(&prompt);
        assert_eq!(
            title,
            format!("{}...", "é".repeat(CONVERSATION_TITLE_MAX_CHARS))
        );
    }

    #[test]
    fn blank_prompt_uses_default_title() {
        assert_eq!(derive_conversation_title("   "), DEFAULT_CONVERSATION_TITLE);
    }

    #[test]
    fn exact_limit_prompt_is_not_marked_truncated() {
        let prompt = "b".repeat(CONVERSATION_TITLE_MAX_CHARS);
        assert_eq!(derive_conversation_title(&prompt), prompt);
    }
}
