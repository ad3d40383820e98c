use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable, VirtualListScrollHandle,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    list::ListItem,
    v_flex, v_virtual_list,
};
use gpui_tokio_bridge::Tokio;
use wren_backend::{
    BackendResult, ChangeSource, ConversationId, ConversationRecord, ConversationStore,
    RestBackend, StoreTable,
};

use crate::chat::events::{ConversationDeleted, ConversationSelected, NewChatRequested};
use crate::chat::message::unix_now_seconds;

const GROUP_HEADER_HEIGHT: f32 = 26.0;
const CONVERSATION_ROW_HEIGHT: f32 = 40.0;
const DAY_SECONDS: u64 = 60 * 60 * 24;
/// Remote row changes are approximated by polling at this cadence.
const CHANGE_POLL_PERIOD: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConversationAgeGroup {
    Today,
    Yesterday,
    Older,
}

#[derive(Debug, Clone)]
enum SidebarListItem {
    GroupHeader(&'static str),
    Conversation(ConversationRecord),
}

pub struct ChatSidebar {
    backend: Option<Arc<RestBackend>>,
    search_input: Entity<InputState>,
    search_query: String,
    conversations: Vec<ConversationRecord>,
    selected_conversation: Option<ConversationId>,
    loading: bool,
    flat_items: Vec<SidebarListItem>,
    item_sizes: Rc<Vec<Size<Pixels>>>,
    scroll_handle: VirtualListScrollHandle,
    refresh_task: Option<Task<()>>,
    delete_task: Option<Task<()>>,
    feed_task: Option<Task<()>>,
    poller_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
}

impl EventEmitter<ConversationSelected> for ChatSidebar {}
impl EventEmitter<ConversationDeleted> for ChatSidebar {}
impl EventEmitter<NewChatRequested> for ChatSidebar {}

impl ChatSidebar {
    pub fn new(
        backend: Option<Arc<RestBackend>>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let search_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("Search conversations..."));

        cx.subscribe_in(
            &search_input,
            window,
            |this, _, _event: &InputEvent, _window, cx| {
                this.search_query = this.search_input.read(cx).value().to_string();
                this.rebuild_flat_items();
                cx.notify();
            },
        )
        .detach();

        let mut sidebar = Self {
            backend: None,
            search_input,
            search_query: String::new(),
            conversations: Vec::new(),
            selected_conversation: None,
            loading: false,
            flat_items: Vec::new(),
            item_sizes: Rc::new(Vec::new()),
            scroll_handle: VirtualListScrollHandle::new(),
            refresh_task: None,
            delete_task: None,
            feed_task: None,
            poller_task: None,
        };
        sidebar.set_backend(backend, cx);
        sidebar
    }

    /// Swaps the hosted-store handle, re-subscribing the change feed and
    /// restarting the remote poller. Used at startup and after settings edits.
    pub fn set_backend(&mut self, backend: Option<Arc<RestBackend>>, cx: &mut Context<Self>) {
        self.backend = backend;
        self.feed_task = None;
        self.poller_task = None;
        self.conversations.clear();
        self.selected_conversation = None;
        self.rebuild_flat_items();

        if self.backend.is_some() {
            self.loading = true;
            self.start_change_feed(cx);
            self.start_change_poller(cx);
            self.reload(cx);
        }

        cx.notify();
    }

    pub fn selected_conversation(&self) -> Option<ConversationId> {
        self.selected_conversation
    }

    pub fn conversations(&self) -> &[ConversationRecord] {
        &self.conversations
    }

    /// Updates selection without emitting, for selections the view already
    /// knows about (e.g. a lazily created conversation).
    pub fn mark_selected(&mut self, conversation_id: Option<ConversationId>, cx: &mut Context<Self>) {
        self.selected_conversation = conversation_id;
        cx.notify();
    }

    pub fn select_conversation(&mut self, record: ConversationRecord, cx: &mut Context<Self>) {
        self.selected_conversation = Some(record.id);
        cx.emit(ConversationSelected { record });
        cx.notify();
    }

    pub fn reload(&mut self, cx: &mut Context<Self>) {
        let Some(backend) = self.backend.clone() else {
            return;
        };

        let request = Tokio::spawn(cx, async move { backend.list_conversations().await });
        self.refresh_task = Some(cx.spawn(async move |this, cx| {
            let result = request.await;
            let _ = this.update(cx, |this, cx| {
                this.finish_reload(result, cx);
            });
        }));
    }

    fn finish_reload(
        &mut self,
        result: Result<BackendResult<Vec<ConversationRecord>>, gpui_tokio_bridge::JoinError>,
        cx: &mut Context<Self>,
    ) {
        self.loading = false;

        match result {
            Ok(Ok(records)) => {
                self.conversations = records;

                if self.selected_conversation.is_some_and(|selected| {
                    !self
                        .conversations
                        .iter()
                        .any(|conversation| conversation.id == selected)
                }) {
                    self.selected_conversation = None;
                }
            }
            Ok(Err(error)) => {
                tracing::error!(error = %error, "failed to load conversations from backend");
            }
            Err(error) => {
                tracing::error!(error = %error, "conversation listing task failed");
            }
        }

        self.rebuild_flat_items();
        cx.notify();
    }

    fn delete_conversation(&mut self, conversation_id: ConversationId, cx: &mut Context<Self>) {
        let Some(backend) = self.backend.clone() else {
            return;
        };

        let request =
            Tokio::spawn(cx, async move { backend.delete_conversation(conversation_id).await });
        self.delete_task = Some(cx.spawn(async move |this, cx| {
            let result = request.await;
            let _ = this.update(cx, |this, cx| match result {
                Ok(Ok(())) => {
                    if this.selected_conversation == Some(conversation_id) {
                        this.selected_conversation = None;
                    }
                    // The listing refreshes through the local change notice.
                    cx.emit(ConversationDeleted { conversation_id });
                    cx.notify();
                }
                Ok(Err(error)) => {
                    tracing::error!(error = %error, "failed to delete conversation");
                }
                Err(error) => {
                    tracing::error!(error = %error, "conversation delete task failed");
                }
            });
        }));
    }

    fn start_change_feed(&mut self, cx: &mut Context<Self>) {
        let Some(backend) = self.backend.clone() else {
            return;
        };

        let mut feed = backend.subscribe_changes();
        self.feed_task = Some(cx.spawn(async move |this, cx| {
            while let Some(notice) = feed.recv().await {
                if notice.table != StoreTable::Conversations {
                    continue;
                }
                if this.update(cx, |this, cx| this.reload(cx)).is_err() {
                    break;
                }
            }
        }));
    }

    fn start_change_poller(&mut self, cx: &mut Context<Self>) {
        let Some(backend) = self.backend.clone() else {
            return;
        };

        self.poller_task = Some(Tokio::spawn(cx, backend.change_poller(CHANGE_POLL_PERIOD)));
    }

    fn rebuild_flat_items(&mut self) {
        let normalized_query = self.search_query.trim().to_ascii_lowercase();
        let now_unix_seconds = unix_now_seconds();

        let mut today_items = Vec::new();
        let mut yesterday_items = Vec::new();
        let mut older_items = Vec::new();

        // Keep ordering deterministic by preserving the listing order within each group.
        for conversation in self.conversations.iter().cloned() {
            if !matches_query(&conversation, &normalized_query) {
                continue;
            }

            match classify_group(conversation.created_at_unix_seconds, now_unix_seconds) {
                ConversationAgeGroup::Today => today_items.push(conversation),
                ConversationAgeGroup::Yesterday => yesterday_items.push(conversation),
                ConversationAgeGroup::Older => older_items.push(conversation),
            }
        }

        let mut flat_items = Vec::new();
        let mut item_sizes = Vec::new();

        append_group(&mut flat_items, &mut item_sizes, "Today", today_items, px(240.));
        append_group(
            &mut flat_items,
            &mut item_sizes,
            "Yesterday",
            yesterday_items,
            px(240.),
        );
        append_group(&mut flat_items, &mut item_sizes, "Older", older_items, px(240.));

        self.flat_items = flat_items;
        self.item_sizes = Rc::new(item_sizes);
    }

    fn render_toolbar(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        h_flex()
            .w_full()
            .gap_2()
            .px_3()
            .pb_2()
            .child(Input::new(&self.search_input).w_full().small())
            .child(
                Button::new("sidebar-new-chat")
                    .small()
                    .primary()
                    .icon(IconName::Plus)
                    .child("New Chat")
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.selected_conversation = None;
                        cx.emit(NewChatRequested);
                        cx.notify();
                    })),
            )
    }

    fn render_empty_state(&mut self, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let message = if self.loading && self.conversations.is_empty() {
            "Loading..."
        } else if self.conversations.is_empty() {
            "No previous chats"
        } else {
            "No conversations match your search"
        };

        v_flex()
            .flex_1()
            .items_center()
            .justify_center()
            .px_4()
            .child(
                Label::new(message)
                    .text_sm()
                    .text_color(theme.foreground.opacity(0.55)),
            )
            .into_any_element()
    }

    fn render_history_list(&mut self, cx: &mut Context<Self>) -> AnyElement {
        if self.flat_items.is_empty() {
            return self.render_empty_state(cx);
        }

        let selected = self.selected_conversation;
        let item_sizes = self.item_sizes.clone();
        let items = self.flat_items.clone();

        v_flex()
            .flex_1()
            .min_h_0()
            .child(
                v_virtual_list(
                    cx.entity().clone(),
                    "conversation-list",
                    item_sizes,
                    move |_this, visible_range, _window, cx| {
                        let theme = cx.theme();

                        visible_range
                            .map(|index| match &items[index] {
                                SidebarListItem::GroupHeader(name) => div()
                                    .w_full()
                                    .h(px(GROUP_HEADER_HEIGHT))
                                    .px_3()
                                    .flex()
                                    .items_center()
                                    .child(
                                        Label::new(*name)
                                            .text_xs()
                                            .text_color(theme.foreground.opacity(0.5)),
                                    )
                                    .into_any_element(),
                                SidebarListItem::Conversation(conversation) => {
                                    let record = conversation.clone();
                                    let conversation_id = record.id;
                                    let title = record.title.clone();
                                    let is_selected = selected == Some(conversation_id);

                                    h_flex()
                                        .w_full()
                                        .h(px(CONVERSATION_ROW_HEIGHT))
                                        .px_2()
                                        .gap_1()
                                        .items_center()
                                        .child(
                                            ListItem::new(("conversation", index))
                                                .flex_1()
                                                .h_full()
                                                .px_3()
                                                .py_2()
                                                .rounded_md()
                                                .selected(is_selected)
                                                .on_click(cx.listener(
                                                    move |this, _event: &ClickEvent, _window, cx| {
                                                        this.select_conversation(
                                                            record.clone(),
                                                            cx,
                                                        );
                                                    },
                                                ))
                                                .child(
                                                    h_flex().w_full().items_center().child(
                                                        div().flex_1().min_w_0().truncate().child(
                                                            Label::new(title.clone()).text_sm(),
                                                        ),
                                                    ),
                                                ),
                                        )
                                        .when(is_selected, |row| {
                                            row.child(
                                                Button::new(("delete-conversation", index))
                                                    .ghost()
                                                    .small()
                                                    .icon(IconName::CircleX)
                                                    .on_click(cx.listener(
                                                        move |this, _, _window, cx| {
                                                            this.delete_conversation(
                                                                conversation_id,
                                                                cx,
                                                            );
                                                        },
                                                    )),
                                            )
                                        })
                                        .into_any_element()
                                }
                            })
                            .collect()
                    },
                )
                .w_full()
                .flex_1()
                .track_scroll(&self.scroll_handle),
            )
            .into_any_element()
    }
}

impl Render for ChatSidebar {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .size_full()
            .bg(theme.background)
            .pt(px(44.))
            .child(self.render_toolbar(cx))
            .child(self.render_history_list(cx))
    }
}

fn append_group(
    flat_items: &mut Vec<SidebarListItem>,
    item_sizes: &mut Vec<Size<Pixels>>,
    title: &'static str,
    conversations: Vec<ConversationRecord>,
    item_width: Pixels,
) {
    if conversations.is_empty() {
        return;
    }

    flat_items.push(SidebarListItem::GroupHeader(title));
    item_sizes.push(size(item_width, px(GROUP_HEADER_HEIGHT)));

    for conversation in conversations {
        flat_items.push(SidebarListItem::Conversation(conversation));
        item_sizes.push(size(item_width, px(CONVERSATION_ROW_HEIGHT)));
    }
}

fn matches_query(conversation: &ConversationRecord, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }

    conversation.title.to_ascii_lowercase().contains(query)
}

fn classify_group(created_at_unix_seconds: u64, now_unix_seconds: u64) -> ConversationAgeGroup {
    let age_seconds = now_unix_seconds.saturating_sub(created_at_unix_seconds);

    // Elapsed-time buckets avoid timezone dependencies in the grouping.
    if age_seconds < DAY_SECONDS {
        ConversationAgeGroup::Today
    } else if age_seconds < DAY_SECONDS * 2 {
        ConversationAgeGroup::Yesterday
    } else {
        ConversationAgeGroup::Older
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, created_at: u64) -> ConversationRecord {
        ConversationRecord {
            id: ConversationId::mint(),
            title: title.to_string(),
            created_at_unix_seconds: created_at,
        }
    }

    #[test]
    fn age_groups_bucket_by_elapsed_days() {
        let now = 10 * DAY_SECONDS;
        assert_eq!(classify_group(now, now), ConversationAgeGroup::Today);
        assert_eq!(
            classify_group(now - DAY_SECONDS + 1, now),
            ConversationAgeGroup::Today
        );
        assert_eq!(
            classify_group(now - DAY_SECONDS, now),
            ConversationAgeGroup::Yesterday
        );
        assert_eq!(
            classify_group(now - DAY_SECONDS * 2, now),
            ConversationAgeGroup::Older
        );
    }

    #[test]
    fn query_matching_is_case_insensitive_on_titles() {
        let conversation = record("Weekend Trip Plan", 0);
        assert!(matches_query(&conversation, ""));
        assert!(matches_query(&conversation, "weekend"));
        assert!(matches_query(&conversation, "trip plan"));
        assert!(!matches_query(&conversation, "groceries"));
    }
}
