use std::sync::Arc;
use std::time::Duration;

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use tokio::sync::mpsc;
use wren_backend::{
    Backend, BackendResult, ConversationId, ConversationRecord, MessageRecord, MessageRole,
    NewConversation, NewMessage, RestBackend, derive_conversation_title,
};
use wren_llm::{
    GenerateRequest, GenerativeProvider, ProviderStreamHandle, StreamEventPayload,
    StreamSessionId, create_provider,
};

use crate::chat::events::{
    ConversationDeleted, ConversationSelected, NewChatRequested, Stop, Submit,
};
use crate::chat::message::{
    Message, MessageId, MessageStatus, Role, StreamState, StreamTransition, unix_now_seconds,
};
use crate::chat::{ChatSidebar, MessageInput, MessageList};
use crate::settings::{AppSettings, SettingsChanged, SettingsClose, SettingsState, SettingsView};

pub const STREAM_DEBOUNCE_MS: u64 = 50;

/// Coordinator-level send metadata kept outside the domain model.
#[derive(Debug, Clone, Copy)]
struct ActiveSend {
    session_id: StreamSessionId,
    user_message_id: MessageId,
    bot_message_id: MessageId,
}

/// Progress of one send, reported by the worker back to the view.
#[derive(Debug)]
enum SendEvent {
    ConversationReady(ConversationRecord),
    UserPersisted,
    Delta(String),
    Completed { text: String },
    Failed { message: String },
}

#[derive(Debug)]
struct SendUpdate {
    session_id: StreamSessionId,
    event: SendEvent,
}

enum SendOutcome {
    Done { text: String },
    Failed { message: String },
    Cancelled,
}

/// Parent coordinator for sidebar/message list/input/network orchestration.
///
/// A send is one pass through the four network calls: ensure the conversation
/// row exists, insert the user row, generate (streamed or single-shot), and
/// insert the bot row.
pub struct ChatView {
    sidebar: Entity<ChatSidebar>,
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    settings_state: Entity<SettingsState>,
    settings_view: Entity<SettingsView>,
    settings_open: bool,
    backend: Option<Arc<RestBackend>>,
    provider: Option<Arc<dyn GenerativeProvider>>,
    provider_error: Option<String>,
    streaming_enabled: bool,
    active_conversation: Option<ConversationRecord>,
    messages: Vec<Message>,
    history_loading: bool,
    next_message_id: u64,
    next_session_id: u64,
    stream_state: StreamState,
    active_send: Option<ActiveSend>,
    send_worker_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    send_reader_task: Option<Task<()>>,
    history_task: Option<Task<()>>,
    stream_debounce_task: Option<Task<()>>,
    pending_stream_chunk: String,
}

impl ChatView {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let settings_state = SettingsState::new(cx);
        let resolved = settings_state.read(cx).resolved_settings();
        let (backend, provider, provider_error) = Self::build_clients(&resolved);

        let sidebar = cx.new(|cx| ChatSidebar::new(backend.clone(), window, cx));
        let message_list = cx.new(MessageList::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));
        let settings_view = cx.new(|cx| SettingsView::new(&settings_state, window, cx));

        let mut this = Self {
            sidebar: sidebar.clone(),
            message_list: message_list.clone(),
            message_input: message_input.clone(),
            settings_state: settings_state.clone(),
            settings_view: settings_view.clone(),
            settings_open: false,
            backend,
            provider,
            provider_error,
            streaming_enabled: resolved.streaming,
            active_conversation: None,
            messages: Vec::new(),
            history_loading: false,
            next_message_id: 1,
            next_session_id: 1,
            stream_state: StreamState::Idle,
            active_send: None,
            send_worker_task: None,
            send_reader_task: None,
            history_task: None,
            stream_debounce_task: None,
            pending_stream_chunk: String::new(),
        };

        this.reset_to_draft(cx);

        cx.subscribe(&sidebar, |this, _, event: &ConversationSelected, cx| {
            this.handle_conversation_selected(event.clone(), cx);
        })
        .detach();

        cx.subscribe(&sidebar, |this, _, event: &ConversationDeleted, cx| {
            this.handle_conversation_deleted(*event, cx);
        })
        .detach();

        cx.subscribe(&sidebar, |this, _, _event: &NewChatRequested, cx| {
            this.reset_to_draft(cx);
        })
        .detach();

        cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
            this.handle_submit(event.clone(), cx);
        })
        .detach();

        cx.subscribe(&message_input, |this, _, _event: &Stop, cx| {
            this.handle_stop(cx);
        })
        .detach();

        cx.subscribe(&settings_state, |this, _, event: &SettingsChanged, cx| {
            this.handle_settings_changed(event, cx);
        })
        .detach();

        cx.subscribe(&settings_view, |this, _, _event: &SettingsClose, cx| {
            this.close_settings(cx);
        })
        .detach();

        this
    }

    pub fn sidebar(&self) -> &Entity<ChatSidebar> {
        &self.sidebar
    }

    /// Returns to the draft state: no conversation row, welcome bubble only.
    /// The conversation is only created once the first prompt is sent.
    pub fn reset_to_draft(&mut self, cx: &mut Context<Self>) {
        if self.active_send.is_some() {
            self.cancel_active_send(cx);
        }

        self.active_conversation = None;
        self.history_loading = false;
        self.history_task = None;

        let welcome_id = self.alloc_message_id();
        self.messages = vec![Message::welcome(welcome_id)];

        self.sidebar
            .update(cx, |sidebar, cx| sidebar.mark_selected(None, cx));
        self.sync_messages(cx, true);
        cx.notify();
    }

    fn open_settings(&mut self, cx: &mut Context<Self>) {
        if self.settings_open {
            return;
        }
        self.settings_open = true;
        cx.notify();
    }

    fn open_settings_click(
        &mut self,
        _event: &gpui::ClickEvent,
        _window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.open_settings(cx);
    }

    fn close_settings(&mut self, cx: &mut Context<Self>) {
        self.settings_open = false;
        cx.notify();
    }

    fn build_clients(
        settings: &AppSettings,
    ) -> (
        Option<Arc<RestBackend>>,
        Option<Arc<dyn GenerativeProvider>>,
        Option<String>,
    ) {
        let mut configuration_error = None;

        let backend = match settings.to_backend_config() {
            Some(config) => match RestBackend::new(config) {
                Ok(backend) => Some(Arc::new(backend)),
                Err(error) => {
                    tracing::error!(error = %error, "failed to initialize hosted-store client");
                    configuration_error = Some(format!("Backend error: {error}"));
                    None
                }
            },
            None => None,
        };

        let provider = match settings.to_provider_config() {
            Some(config) => match create_provider(config) {
                Ok(provider) => Some(provider),
                Err(error) => {
                    tracing::error!(error = %error, "failed to initialize model provider");
                    configuration_error = Some(format!("Provider error: {error}"));
                    None
                }
            },
            None => None,
        };

        (backend, provider, configuration_error)
    }

    fn handle_settings_changed(&mut self, event: &SettingsChanged, cx: &mut Context<Self>) {
        if self.active_send.is_some() {
            self.cancel_active_send(cx);
        }

        event.settings.apply_theme(None, cx);
        cx.refresh_windows();

        let resolved = self.settings_state.read(cx).resolved_settings();
        let (backend, provider, provider_error) = Self::build_clients(&resolved);
        self.backend = backend.clone();
        self.provider = provider;
        self.provider_error = provider_error;
        self.streaming_enabled = resolved.streaming;

        self.sidebar
            .update(cx, |sidebar, cx| sidebar.set_backend(backend, cx));
        self.reset_to_draft(cx);

        tracing::info!("reloaded backend and provider clients from settings");
        cx.notify();
    }

    fn handle_conversation_selected(
        &mut self,
        event: ConversationSelected,
        cx: &mut Context<Self>,
    ) {
        if self
            .active_conversation
            .as_ref()
            .is_some_and(|record| record.id == event.record.id)
        {
            return;
        }

        if self.active_send.is_some() {
            // Selecting another conversation cancels the in-flight send immediately.
            self.cancel_active_send(cx);
        }

        self.activate_conversation(event.record, cx);
    }

    fn handle_conversation_deleted(&mut self, event: ConversationDeleted, cx: &mut Context<Self>) {
        if self
            .active_conversation
            .as_ref()
            .is_some_and(|record| record.id == event.conversation_id)
        {
            self.reset_to_draft(cx);
        }
    }

    fn activate_conversation(&mut self, record: ConversationRecord, cx: &mut Context<Self>) {
        let conversation_id = record.id;
        self.active_conversation = Some(record);
        self.history_loading = true;
        self.messages.clear();
        self.sync_messages(cx, true);

        self.message_input.update(cx, |input, cx| {
            input.set_sending(false, cx);
        });

        let Some(backend) = self.backend.clone() else {
            self.history_loading = false;
            return;
        };

        let request = Tokio::spawn(cx, async move {
            backend.list_messages(conversation_id).await
        });
        self.history_task = Some(cx.spawn(async move |this, cx| {
            let result = request.await;
            let _ = this.update(cx, |this, cx| {
                this.finish_history_load(conversation_id, result, cx);
            });
        }));

        cx.notify();
    }

    fn finish_history_load(
        &mut self,
        conversation_id: ConversationId,
        result: Result<BackendResult<Vec<MessageRecord>>, gpui_tokio_bridge::JoinError>,
        cx: &mut Context<Self>,
    ) {
        if !self
            .active_conversation
            .as_ref()
            .is_some_and(|record| record.id == conversation_id)
        {
            // A stale load finishing after another selection is discarded.
            return;
        }

        self.history_loading = false;

        match result {
            Ok(Ok(records)) => {
                let mut messages = Vec::with_capacity(records.len());
                for record in records {
                    let id = self.alloc_message_id();
                    messages.push(row_to_message(id, record));
                }
                self.messages = messages;
            }
            Ok(Err(error)) => {
                tracing::error!(error = %error, "failed to load message history");
                let id = self.alloc_message_id();
                self.messages = vec![error_bubble(id, &error.to_string())];
            }
            Err(error) => {
                tracing::error!(error = %error, "message history task failed");
                let id = self.alloc_message_id();
                self.messages = vec![error_bubble(id, &error.to_string())];
            }
        }

        self.sync_messages(cx, true);
        cx.notify();
    }

    fn handle_submit(&mut self, event: Submit, cx: &mut Context<Self>) {
        let content = event.content.trim().to_string();
        if content.is_empty() {
            return;
        }

        if self.active_send.is_some() {
            // Single-send rule: ignore additional submits while one is active.
            return;
        }

        let (Some(backend), Some(provider)) = (self.backend.clone(), self.provider.clone())
        else {
            self.push_not_configured_error(cx);
            return;
        };

        let session_id = self.alloc_session_id();
        match self.stream_state.apply(StreamTransition::Start(session_id)) {
            Ok(next_state) => self.stream_state = next_state,
            Err(rejection) => {
                tracing::warn!(rejection = ?rejection, "rejected submit during active stream");
                return;
            }
        }

        let user_message_id = self.alloc_message_id();
        let bot_message_id = self.alloc_message_id();

        self.messages
            .push(Message::user_pending(user_message_id, content.clone()));
        self.messages.push(if self.streaming_enabled {
            Message::bot_streaming(bot_message_id, session_id)
        } else {
            Message::bot_pending(bot_message_id)
        });

        self.active_send = Some(ActiveSend {
            session_id,
            user_message_id,
            bot_message_id,
        });
        self.pending_stream_chunk.clear();
        self.stream_debounce_task = None;

        self.message_input.update(cx, |input, cx| {
            input.set_sending(true, cx);
        });
        self.sync_messages(cx, false);

        let (updates_tx, mut updates_rx) = mpsc::unbounded_channel::<SendUpdate>();
        let conversation = self.active_conversation.clone();
        let streaming = self.streaming_enabled;

        self.send_worker_task = Some(Tokio::spawn(
            cx,
            run_send_worker(
                backend,
                provider,
                conversation,
                content,
                session_id,
                streaming,
                updates_tx,
            ),
        ));

        self.send_reader_task = Some(cx.spawn(async move |this, cx| {
            while let Some(update) = updates_rx.recv().await {
                if this
                    .update(cx, |this, cx| this.handle_send_update(update, cx))
                    .is_err()
                {
                    return;
                }
            }

            let _ = this.update(cx, |this, cx| {
                this.handle_send_channel_closed(session_id, cx);
            });
        }));
    }

    fn handle_stop(&mut self, cx: &mut Context<Self>) {
        if self.active_send.is_none() {
            return;
        }

        self.cancel_active_send(cx);
    }

    fn handle_send_update(&mut self, update: SendUpdate, cx: &mut Context<Self>) {
        if !self.send_update_is_current(update.session_id) {
            // Strict session equality prevents stale workers from mutating newer chats.
            return;
        }

        match update.event {
            SendEvent::ConversationReady(record) => {
                let conversation_id = record.id;
                self.active_conversation = Some(record);
                self.sidebar.update(cx, |sidebar, cx| {
                    sidebar.mark_selected(Some(conversation_id), cx);
                });
                cx.notify();
            }
            SendEvent::UserPersisted => {
                if let Some(active_send) = self.active_send
                    && let Some(message) = self.find_message_mut(active_send.user_message_id)
                {
                    message.status = MessageStatus::Done;
                }
                self.sync_messages(cx, false);
            }
            SendEvent::Delta(chunk) => {
                self.pending_stream_chunk.push_str(&chunk);
                self.schedule_debounced_stream_flush(cx);
            }
            SendEvent::Completed { text } => {
                self.finalize_send(update.session_id, SendOutcome::Done { text }, cx);
            }
            SendEvent::Failed { message } => {
                self.flush_pending_stream_chunk(cx);
                self.finalize_send(update.session_id, SendOutcome::Failed { message }, cx);
            }
        }
    }

    fn handle_send_channel_closed(&mut self, session_id: StreamSessionId, cx: &mut Context<Self>) {
        self.send_worker_task = None;
        self.send_reader_task = None;

        if self.send_update_is_current(session_id) {
            self.finalize_send(
                session_id,
                SendOutcome::Failed {
                    message: "send worker ended before a terminal event".to_string(),
                },
                cx,
            );
        }
    }

    fn schedule_debounced_stream_flush(&mut self, cx: &mut Context<Self>) {
        if self.stream_debounce_task.is_some() {
            return;
        }

        self.stream_debounce_task = Some(cx.spawn(async move |this, cx| {
            // Debounce token bursts into a single UI mutation roughly every 50ms.
            cx.background_executor()
                .timer(Duration::from_millis(STREAM_DEBOUNCE_MS))
                .await;

            let _ = this.update(cx, |this, cx| {
                this.flush_pending_stream_chunk(cx);
                this.stream_debounce_task = None;
            });
        }));
    }

    fn flush_pending_stream_chunk(&mut self, cx: &mut Context<Self>) {
        if self.pending_stream_chunk.is_empty() {
            return;
        }

        let Some(active_send) = self.active_send else {
            self.pending_stream_chunk.clear();
            return;
        };

        if !self.send_update_is_current(active_send.session_id) {
            self.pending_stream_chunk.clear();
            return;
        }

        let chunk = std::mem::take(&mut self.pending_stream_chunk);
        if let Some(message) = self.find_message_mut(active_send.bot_message_id) {
            message.content.push_str(&chunk);
        }

        self.sync_messages(cx, false);
    }

    fn cancel_active_send(&mut self, cx: &mut Context<Self>) {
        let Some(active_send) = self.active_send else {
            return;
        };

        // Dropping the tasks aborts the send worker, which drops the provider
        // stream and signals cancellation upstream.
        self.send_worker_task = None;
        self.send_reader_task = None;

        self.finalize_send(active_send.session_id, SendOutcome::Cancelled, cx);
    }

    fn finalize_send(
        &mut self,
        session_id: StreamSessionId,
        outcome: SendOutcome,
        cx: &mut Context<Self>,
    ) {
        let Some(active_send) = self.active_send else {
            return;
        };

        if active_send.session_id != session_id {
            return;
        }

        self.pending_stream_chunk.clear();
        self.stream_debounce_task = None;
        self.send_worker_task = None;

        let transition = match &outcome {
            SendOutcome::Done { .. } => StreamTransition::Complete(session_id),
            SendOutcome::Failed { message } => StreamTransition::Fail {
                session_id,
                message: message.clone(),
            },
            SendOutcome::Cancelled => StreamTransition::Cancel(session_id),
        };
        match self.stream_state.apply(transition) {
            Ok(next_state) => self.stream_state = next_state,
            Err(rejection) => {
                tracing::warn!(rejection = ?rejection, "ignored illegal stream transition");
            }
        }

        if let Some(message) = self.find_message_mut(active_send.bot_message_id) {
            match outcome {
                SendOutcome::Done { text } => {
                    // The full text replaces the streamed concatenation so the
                    // bubble matches the persisted row exactly.
                    message.content = text;
                    message.status = MessageStatus::Done;
                    message.timestamp_unix_seconds = unix_now_seconds();
                }
                SendOutcome::Failed {
                    message: error_text,
                } => {
                    if message.content.is_empty() {
                        message.content = format!("Sorry, I hit an error: {error_text}");
                    }
                    message.status = MessageStatus::Error(error_text);
                }
                SendOutcome::Cancelled => {
                    message.status = MessageStatus::Cancelled;
                }
            }
        }

        self.active_send = None;
        self.message_input.update(cx, |input, cx| {
            input.set_sending(false, cx);
        });

        self.sync_messages(cx, false);
        cx.notify();
    }

    fn push_not_configured_error(&mut self, cx: &mut Context<Self>) {
        let message_id = self.alloc_message_id();
        let error_text = if let Some(ref error) = self.provider_error {
            format!("Sorry, I hit an error: {error}")
        } else {
            "Setup is incomplete. Add your backend and model API keys in Settings.".to_string()
        };

        self.messages.push(Message::new(
            message_id,
            Role::Bot,
            error_text,
            unix_now_seconds(),
            MessageStatus::Error("not configured".to_string()),
        ));

        self.sync_messages(cx, false);
        cx.notify();
    }

    fn send_update_is_current(&self, session_id: StreamSessionId) -> bool {
        self.active_send
            .is_some_and(|active_send| active_send.session_id == session_id)
            && self.stream_state.accepts_stream_event(session_id)
    }

    fn sync_messages(&mut self, cx: &mut Context<Self>, reset_scroll: bool) {
        let messages = self.messages.clone();
        self.message_list.update(cx, |list, cx| {
            if reset_scroll {
                list.reset_scroll_tracking(cx);
            }
            list.set_messages(messages, cx);
        });
    }

    fn find_message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|message| message.id == id)
    }

    fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.saturating_add(1);
        id
    }

    fn alloc_session_id(&mut self) -> StreamSessionId {
        let id = StreamSessionId::new(self.next_session_id);
        self.next_session_id = self.next_session_id.saturating_add(1);
        id
    }
}

async fn run_send_worker(
    backend: Arc<dyn Backend>,
    provider: Arc<dyn GenerativeProvider>,
    conversation: Option<ConversationRecord>,
    prompt: String,
    session_id: StreamSessionId,
    streaming: bool,
    updates: mpsc::UnboundedSender<SendUpdate>,
) {
    let send = |event: SendEvent| {
        let _ = updates.send(SendUpdate { session_id, event });
    };

    // 1. Ensure the conversation row exists; a draft chat creates it lazily
    //    with a title derived from the first prompt.
    let conversation = match conversation {
        Some(record) => record,
        None => {
            let title = derive_conversation_title(&prompt);
            match backend
                .create_conversation(NewConversation::new(title))
                .await
            {
                Ok(record) => {
                    send(SendEvent::ConversationReady(record.clone()));
                    record
                }
                Err(error) => {
                    tracing::error!(error = %error, "failed to create conversation");
                    send(SendEvent::Failed {
                        message: error.to_string(),
                    });
                    return;
                }
            }
        }
    };

    // 2. Persist the user row before generating.
    match backend
        .insert_message(NewMessage::new(
            conversation.id,
            MessageRole::User,
            prompt.clone(),
        ))
        .await
    {
        Ok(_) => send(SendEvent::UserPersisted),
        Err(error) => {
            tracing::error!(error = %error, "failed to save user message");
            send(SendEvent::Failed {
                message: error.to_string(),
            });
            return;
        }
    }

    // 3. Generate content, streamed or single-shot.
    let request = GenerateRequest::new(session_id, prompt);
    let bot_text = if streaming {
        match provider.stream_generate(request) {
            Ok(handle) => match drive_stream(handle, &send).await {
                Ok(text) => text,
                Err(message) => {
                    send(SendEvent::Failed { message });
                    return;
                }
            },
            Err(error) => {
                tracing::error!(error = %error, "failed to open model stream");
                send(SendEvent::Failed {
                    message: error.to_string(),
                });
                return;
            }
        }
    } else {
        match provider.generate(request).await {
            Ok(text) => text,
            Err(error) => {
                tracing::error!(error = %error, "model generate failed");
                send(SendEvent::Failed {
                    message: error.to_string(),
                });
                return;
            }
        }
    };

    // 4. Persist the bot row from the full text; the screen already converged.
    if let Err(error) = backend
        .insert_message(NewMessage::new(
            conversation.id,
            MessageRole::Bot,
            bot_text.clone(),
        ))
        .await
    {
        tracing::error!(error = %error, "failed to save bot message");
        send(SendEvent::Failed {
            message: error.to_string(),
        });
        return;
    }

    send(SendEvent::Completed { text: bot_text });
}

async fn drive_stream<F>(handle: ProviderStreamHandle, send: &F) -> Result<String, String>
where
    F: Fn(SendEvent),
{
    let ProviderStreamHandle { mut stream, worker } = handle;

    let reader = async move {
        let mut full_text = String::new();
        let mut outcome: Result<(), String> =
            Err("model stream ended before a terminal event".to_string());

        while let Some(event) = stream.recv().await {
            match event.payload {
                StreamEventPayload::Delta(chunk) => {
                    full_text.push_str(&chunk);
                    send(SendEvent::Delta(chunk));
                }
                StreamEventPayload::Done => {
                    outcome = Ok(());
                    break;
                }
                StreamEventPayload::Error(message) => {
                    outcome = Err(message);
                    break;
                }
            }
        }

        // Keep the stream alive until the worker settles; dropping it early
        // would race a cancellation signal against the final events.
        (full_text, outcome, stream)
    };

    let ((full_text, outcome, stream), ()) = tokio::join!(reader, worker);
    drop(stream);

    outcome.map(|_| full_text)
}

fn row_to_message(id: MessageId, record: MessageRecord) -> Message {
    let role = match record.role {
        MessageRole::User => Role::User,
        MessageRole::Bot => Role::Bot,
    };

    Message::new(
        id,
        role,
        record.content,
        record.created_at_unix_seconds,
        MessageStatus::Done,
    )
}

fn error_bubble(id: MessageId, error_text: &str) -> Message {
    Message::new(
        id,
        Role::Bot,
        format!("Sorry, I hit an error: {error_text}"),
        unix_now_seconds(),
        MessageStatus::Error(error_text.to_string()),
    )
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let title = self
            .active_conversation
            .as_ref()
            .map(|record| record.title.clone())
            .unwrap_or_else(|| "New Chat".to_string());

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                h_flex()
                    .id("chat-view-header")
                    .h(px(48.))
                    .px_4()
                    .items_center()
                    .justify_between()
                    .border_b_1()
                    .border_color(theme.border)
                    .child(
                        h_flex()
                            .gap_2()
                            .items_center()
                            .child(div().size(px(8.)).rounded_full().bg(theme.primary))
                            .child(
                                div()
                                    .text_sm()
                                    .font_weight(FontWeight::MEDIUM)
                                    .text_color(theme.foreground)
                                    .child(title),
                            ),
                    )
                    .child(
                        Button::new("chat-view-settings")
                            .ghost()
                            .small()
                            .child("Settings")
                            .on_click(cx.listener(Self::open_settings_click)),
                    ),
            )
            .child(if self.history_loading {
                v_flex()
                    .id("chat-view-history-loading")
                    .flex_1()
                    .min_h_0()
                    .items_center()
                    .justify_center()
                    .child(
                        Label::new("Loading chat...")
                            .text_sm()
                            .text_color(theme.foreground.opacity(0.55)),
                    )
                    .into_any_element()
            } else {
                div()
                    .id("chat-view-message-list")
                    .flex_1()
                    .min_h_0()
                    .child(self.message_list.clone())
                    .into_any_element()
            })
            .child(
                div()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .child(self.message_input.clone()),
            )
            .when(self.settings_open, |el| {
                el.child(
                    div()
                        .id("settings-overlay")
                        .absolute()
                        .inset_0()
                        .bg(theme.background.opacity(0.8))
                        .flex()
                        .items_center()
                        .justify_center()
                        .child(self.settings_view.clone()),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wren_backend::MessageId as RowId;

    #[test]
    fn history_rows_map_onto_done_bubbles() {
        let record = MessageRecord {
            id: RowId::mint(),
            conversation_id: ConversationId::mint(),
            role: MessageRole::Bot,
            content: "Hi!".to_string(),
            created_at_unix_seconds: 1_700_000_123,
        };

        let message = row_to_message(MessageId::new(9), record);
        assert_eq!(message.id, MessageId::new(9));
        assert_eq!(message.role, Role::Bot);
        assert_eq!(message.content, "Hi!");
        assert_eq!(message.timestamp_unix_seconds, 1_700_000_123);
        assert_eq!(message.status, MessageStatus::Done);
    }

    #[test]
    fn error_bubbles_carry_the_degraded_reply_text() {
        let message = error_bubble(MessageId::new(1), "connection refused");
        assert_eq!(message.role, Role::Bot);
        assert_eq!(message.content, "Sorry, I hit an error: connection refused");
        assert!(matches!(message.status, MessageStatus::Error(_)));
    }
}
