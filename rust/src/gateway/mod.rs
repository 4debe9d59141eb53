//! Access to the remote message store.
//!
//! Every remote read and write the core performs goes through a
//! [`MessagingGateway`]. The production implementation is [`HttpGateway`];
//! tests substitute in-memory fakes.

mod http;
mod wire;

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::GatewayError;
use crate::state::{Conversation, UserRef};

pub use http::{HttpGateway, UnreachableGateway};

/// Authenticated identity plus the bearer credential attached to every call.
#[derive(Clone)]
pub struct Session {
    pub user: UserRef,
    pub bearer_token: String,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

// Never print the credential.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// A message as held by the timeline. Whether it is "mine" is not stored: it
/// depends on who is signed in and is computed with [`Message::is_sent_by`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub content: String,
    pub sender_id: String,
    pub receiver_id: String,
    /// Milliseconds since the Unix epoch.
    pub sent_at: i64,
    pub item_id: Option<String>,
}

impl Message {
    pub fn is_sent_by(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

/// Sorts into display order: ascending by `sent_at`, ties by id.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(compare_messages);
}

pub(crate) fn compare_messages(a: &Message, b: &Message) -> Ordering {
    a.sent_at
        .cmp(&b.sent_at)
        .then_with(|| compare_ids(&a.id, &b.id))
}

/// Numeric ids compare as numbers and sort before non-numeric ones, which
/// compare as strings.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartConversationRequest {
    pub other_user_id: String,
    pub item_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    /// Conversation the message belongs to. Not sent on the wire (the server
    /// resolves it from receiver and item); used to complete the response.
    pub conversation_id: String,
    pub content: String,
    pub item_id: Option<String>,
    pub receiver_id: String,
}

#[async_trait]
pub trait MessagingGateway: Send + Sync + 'static {
    async fn list_conversations(&self, session: &Session)
        -> Result<Vec<Conversation>, GatewayError>;

    /// Create-or-find: the same `(other user, item)` pair always yields the
    /// same conversation.
    async fn start_conversation(
        &self,
        session: &Session,
        request: &StartConversationRequest,
    ) -> Result<Conversation, GatewayError>;

    /// Messages in any order; the timeline sorts them.
    async fn list_messages(
        &self,
        session: &Session,
        conversation: &Conversation,
    ) -> Result<Vec<Message>, GatewayError>;

    async fn send_message(
        &self,
        session: &Session,
        request: &SendMessageRequest,
    ) -> Result<Message, GatewayError>;

    async fn mark_read(&self, session: &Session, conversation_id: &str)
        -> Result<(), GatewayError>;

    async fn search_users(&self, session: &Session, query: &str)
        -> Result<Vec<UserRef>, GatewayError>;
}

pub type SharedGateway = Arc<dyn MessagingGateway>;
