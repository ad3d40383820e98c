/// Event contracts for chat module wiring.
pub mod events;
/// Domain entities and deterministic stream state boundaries.
pub mod message;
pub mod message_input;
pub mod message_list;
pub mod scroll;
pub mod sidebar;
pub mod view;

pub use events::{ConversationDeleted, ConversationSelected, NewChatRequested, Stop, Submit};
pub use message::{
    Message, MessageId, MessageStatus, Role, StreamState, StreamTransition,
    StreamTransitionRejection, StreamTransitionResult, WELCOME_MESSAGE,
};
pub use message_input::MessageInput;
pub use message_list::MessageList;
pub use scroll::ScrollManager;
pub use sidebar::ChatSidebar;
pub use view::ChatView;
