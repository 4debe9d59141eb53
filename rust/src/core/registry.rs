// Conversation list: loading, refresh ordering and unread totals.

use std::cmp::Reverse;

use super::*;
use crate::state::{unread_badge_label, Conversation};

/// Conversations of the signed-in user, newest activity first.
///
/// Every load is tagged with a sequence number; only the response to the most
/// recently issued load is applied.
#[derive(Debug, Default)]
pub(super) struct ConversationRegistry {
    conversations: Vec<Conversation>,
    seq: u64,
    in_flight: bool,
}

impl ConversationRegistry {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn begin_refresh(&mut self) -> u64 {
        self.seq += 1;
        self.in_flight = true;
        self.seq
    }

    pub(super) fn is_latest(&self, token: u64) -> bool {
        token == self.seq
    }

    pub(super) fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Settles the latest request. Returns false (and changes nothing) for a
    /// response to an older request.
    pub(super) fn finish(&mut self, token: u64) -> bool {
        if !self.is_latest(token) {
            return false;
        }
        self.in_flight = false;
        true
    }

    pub(super) fn replace(&mut self, mut conversations: Vec<Conversation>) {
        sort_conversations(&mut conversations);
        self.conversations = conversations;
    }

    /// Inserts or replaces a single conversation (e.g. one just created).
    pub(super) fn upsert(&mut self, conversation: Conversation) {
        match self.conversations.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => *existing = conversation,
            None => self.conversations.push(conversation),
        }
        sort_conversations(&mut self.conversations);
    }

    pub(super) fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub(super) fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub(super) fn aggregate_unread(&self) -> u32 {
        self.conversations
            .iter()
            .fold(0u32, |acc, c| acc.saturating_add(c.unread_count))
    }

    /// Forgets the list. The sequence keeps counting so responses to requests
    /// issued before the clear can never match a later one.
    pub(super) fn clear(&mut self) {
        self.conversations.clear();
        self.in_flight = false;
        self.seq += 1;
    }
}

/// Newest activity first; conversations without any message go last. The
/// sort is stable, so equal timestamps keep the gateway's order.
fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by_key(|c| Reverse(c.last_message_at));
}

impl AppCore {
    pub(super) fn refresh_conversations(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let token = self.registry.begin_refresh();
        let epoch = self.session_epoch;
        let gateway = self.gateway.clone();
        tracing::debug!(token, "registry: refresh");

        self.set_busy(|b| b.loading_conversations = true);
        self.spawn_gateway(async move {
            let result = gateway.list_conversations(&session).await;
            InternalEvent::ConversationsLoaded {
                epoch,
                token,
                result,
            }
        });
    }

    pub(super) fn on_conversations_loaded(
        &mut self,
        token: u64,
        result: Result<Vec<Conversation>, GatewayError>,
    ) {
        if !self.registry.finish(token) {
            tracing::debug!(token, "registry: dropping superseded response");
            return;
        }
        self.state.busy.loading_conversations = self.registry.is_loading();

        match result {
            Ok(conversations) => {
                tracing::debug!(token, count = conversations.len(), "registry: loaded");
                self.registry.replace(conversations);
                self.sync_registry_state();
                self.sync_conversation_view();
                self.emit_state();
            }
            Err(e) => {
                self.fail_read(e);
            }
        }
    }

    /// Copies the registry into the published state.
    pub(super) fn sync_registry_state(&mut self) {
        self.state.conversations = self.registry.conversations().to_vec();
        self.state.aggregate_unread = self.registry.aggregate_unread();
        self.state.unread_badge = unread_badge_label(self.state.aggregate_unread);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UserRef;

    fn conv(id: &str, at: Option<i64>, unread: u32) -> Conversation {
        Conversation {
            id: id.to_string(),
            other_user: UserRef {
                id: format!("u-{id}"),
                display_name: format!("User {id}"),
            },
            item: None,
            last_message: None,
            last_message_at: at,
            unread_count: unread,
        }
    }

    fn ids(registry: &ConversationRegistry) -> Vec<&str> {
        registry.conversations().iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn replace_sorts_newest_first_and_undated_last() {
        let mut registry = ConversationRegistry::new();
        registry.replace(vec![
            conv("a", Some(10), 0),
            conv("b", None, 0),
            conv("c", Some(30), 0),
            conv("d", Some(20), 0),
        ]);
        assert_eq!(ids(&registry), vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn aggregate_is_sum_of_unread_counts() {
        let mut registry = ConversationRegistry::new();
        registry.replace(vec![conv("1", Some(1), 2), conv("2", Some(2), 0)]);
        assert_eq!(registry.aggregate_unread(), 2);
        registry.replace(vec![conv("1", Some(1), 0), conv("2", Some(3), 0)]);
        assert_eq!(registry.aggregate_unread(), 0);
    }

    #[test]
    fn aggregate_saturates() {
        let mut registry = ConversationRegistry::new();
        registry.replace(vec![conv("1", None, u32::MAX), conv("2", None, 5)]);
        assert_eq!(registry.aggregate_unread(), u32::MAX);
    }

    #[test]
    fn only_latest_request_is_accepted() {
        let mut registry = ConversationRegistry::new();
        let first = registry.begin_refresh();
        let second = registry.begin_refresh();
        assert!(!registry.finish(first));
        assert!(registry.is_loading());
        assert!(registry.finish(second));
        assert!(!registry.is_loading());
    }

    #[test]
    fn clear_invalidates_outstanding_requests() {
        let mut registry = ConversationRegistry::new();
        let token = registry.begin_refresh();
        registry.replace(vec![conv("1", None, 1)]);
        registry.clear();
        assert!(registry.conversations().is_empty());
        assert!(!registry.finish(token));
    }

    #[test]
    fn upsert_replaces_by_id_and_keeps_order() {
        let mut registry = ConversationRegistry::new();
        registry.replace(vec![conv("1", Some(5), 1), conv("2", Some(3), 0)]);
        registry.upsert(conv("2", Some(9), 4));
        assert_eq!(ids(&registry), vec!["2", "1"]);
        assert_eq!(registry.get("2").map(|c| c.unread_count), Some(4));
        registry.upsert(conv("3", None, 0));
        assert_eq!(ids(&registry), vec!["2", "1", "3"]);
    }
}
