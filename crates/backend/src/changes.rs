use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

use tokio::sync::broadcast;

use super::types::ConversationRecord;

/// Buffered notices per subscriber before older ones are dropped.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Hosted tables whose row changes are observable by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTable {
    Conversations,
    Messages,
}

/// One row-change notification. Notices carry no row payload; subscribers
/// refetch the table they care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeNotice {
    pub table: StoreTable,
}

impl ChangeNotice {
    pub const fn new(table: StoreTable) -> Self {
        Self { table }
    }
}

/// Fan-out point for row-change notices.
///
/// Local mutations publish immediately; the remote poller publishes whenever
/// the hosted table fingerprint moves.
#[derive(Debug, Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeNotice>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes a notice to all live subscribers. A hub without subscribers
    /// swallows the notice.
    pub fn publish(&self, notice: ChangeNotice) {
        let _ = self.sender.send(notice);
    }

    pub fn subscribe(&self) -> ChangeFeed {
        ChangeFeed {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's view of the change stream.
pub struct ChangeFeed {
    receiver: broadcast::Receiver<ChangeNotice>,
}

impl ChangeFeed {
    /// Receives the next notice, or `None` once the hub is gone.
    ///
    /// A lagged subscriber skips the dropped notices and resumes with the
    /// oldest retained one; since notices are refetch triggers, losing
    /// intermediate notices is harmless.
    pub async fn recv(&mut self) -> Option<ChangeNotice> {
        loop {
            match self.receiver.recv().await {
                Ok(notice) => return Some(notice),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "change feed lagged; resuming");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Stable digest of a conversation listing, used by the remote poller to
/// detect row changes without keeping the previous listing around.
pub fn conversations_fingerprint(records: &[ConversationRecord]) -> u64 {
    let mut hasher = DefaultHasher::new();
    hasher.write_usize(records.len());
    for record in records {
        hasher.write(record.id.to_string().as_bytes());
        hasher.write_u64(record.created_at_unix_seconds);
        hasher.write(record.title.as_bytes());
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ConversationId;

    fn record(title: &str, created_at: u64) -> ConversationRecord {
        ConversationRecord {
            id: ConversationId::mint(),
            title: title.to_string(),
            created_at_unix_seconds: created_at,
        }
    }

    #[test]
    fn fingerprint_is_stable_for_identical_listings() {
        let records = vec![record("one", 10), record("two", 20)];
        assert_eq!(
            conversations_fingerprint(&records),
            conversations_fingerprint(&records)
        );
    }

    #[test]
    fn fingerprint_moves_on_any_row_change() {
        let records = vec![record("one", 10), record("two", 20)];
        let base = conversations_fingerprint(&records);

        let mut renamed = records.clone();
        renamed[0].title = "renamed".to_string();
        assert_ne!(base, conversations_fingerprint(&renamed));

        let mut shorter = records.clone();
        shorter.pop();
        assert_ne!(base, conversations_fingerprint(&shorter));

        let mut touched = records;
        touched[1].created_at_unix_seconds += 1;
        assert_ne!(base, conversations_fingerprint(&touched));
    }

    #[tokio::test]
    async fn hub_delivers_notices_to_subscribers() {
        let hub = ChangeHub::new();
        let mut feed = hub.subscribe();

        hub.publish(ChangeNotice::new(StoreTable::Conversations));
        hub.publish(ChangeNotice::new(StoreTable::Messages));

        assert_eq!(
            feed.recv().await,
            Some(ChangeNotice::new(StoreTable::Conversations))
        );
        assert_eq!(
            feed.recv().await,
            Some(ChangeNotice::new(StoreTable::Messages))
        );
    }

    #[tokio::test]
    async fn feed_closes_when_hub_is_dropped() {
        let hub = ChangeHub::new();
        let mut feed = hub.subscribe();
        drop(hub);
        assert_eq!(feed.recv().await, None);
    }
}
