use serde::Serialize;

use crate::error::MessagingError;

#[derive(uniffi::Record, Clone, Debug)]
pub struct AppState {
    pub rev: u64,
    pub auth: AuthState,
    pub busy: BusyState,
    pub conversations: Vec<Conversation>,
    pub aggregate_unread: u32,
    pub unread_badge: Option<String>,
    pub selection: SelectionState,
    pub current_conversation: Option<ConversationViewState>,
    pub user_search: UserSearchState,
    pub last_error: Option<MessagingError>,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            auth: AuthState::SignedOut,
            busy: BusyState::idle(),
            conversations: vec![],
            aggregate_unread: 0,
            unread_badge: None,
            selection: SelectionState::NoSelection,
            current_conversation: None,
            user_search: UserSearchState::empty(),
            last_error: None,
            toast: None,
        }
    }
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn { user: UserRef },
}

/// "In flight" flags for requests the UI should reflect with a spinner.
///
/// Per-conversation send state lives on `ConversationViewState::sending`,
/// search state on `UserSearchState::searching`.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub loading_conversations: bool,
    pub starting_conversation: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            loading_conversations: false,
            starting_conversation: false,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: String,
    pub display_name: String,
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ItemStatus {
    Lost,
    Found,
    Other { status: String },
}

impl ItemStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "LOST" => Self::Lost,
            "FOUND" => Self::Found,
            _ => Self::Other {
                status: raw.to_string(),
            },
        }
    }
}

/// Read-only reference to the lost/found report a conversation is anchored to.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    pub id: String,
    pub name: String,
    pub status: ItemStatus,
    pub thumbnail_url: Option<String>,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub other_user: UserRef,
    pub item: Option<ItemRef>,
    pub last_message: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub last_message_at: Option<i64>,
    pub unread_count: u32,
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq)]
pub enum SelectionState {
    NoSelection,
    Loading {
        conversation_id: String,
    },
    Ready {
        conversation_id: String,
    },
    Error {
        conversation_id: String,
        error: MessagingError,
    },
}

impl SelectionState {
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::NoSelection => None,
            Self::Loading { conversation_id }
            | Self::Ready { conversation_id }
            | Self::Error {
                conversation_id, ..
            } => Some(conversation_id),
        }
    }

    pub fn is_ready_for(&self, id: &str) -> bool {
        matches!(self, Self::Ready { conversation_id } if conversation_id == id)
    }

    pub fn is_loading_for(&self, id: &str) -> bool {
        matches!(self, Self::Loading { conversation_id } if conversation_id == id)
    }
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct ConversationViewState {
    pub conversation: Conversation,
    pub messages: Vec<ChatMessage>,
    pub sending: bool,
    /// Content of the last send that failed, handed back so it can be retried.
    pub failed_draft: Option<String>,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub sent_at: i64,
    pub item_id: Option<String>,
    pub is_mine: bool,
    pub first_in_group: bool,
    pub last_in_group: bool,
    pub show_timestamp: bool,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct UserSearchState {
    pub query: String,
    pub searching: bool,
    pub results: Vec<UserRef>,
}

impl UserSearchState {
    pub fn empty() -> Self {
        Self {
            query: String::new(),
            searching: false,
            results: vec![],
        }
    }
}

/// Badge text for an unread total: hidden at zero, capped at "99+".
pub fn unread_badge_label(total: u32) -> Option<String> {
    match total {
        0 => None,
        1..=99 => Some(total.to_string()),
        _ => Some("99+".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unread_badge_hides_zero_and_caps_large_totals() {
        assert_eq!(unread_badge_label(0), None);
        assert_eq!(unread_badge_label(1).as_deref(), Some("1"));
        assert_eq!(unread_badge_label(99).as_deref(), Some("99"));
        assert_eq!(unread_badge_label(100).as_deref(), Some("99+"));
    }

    #[test]
    fn item_status_parse_is_case_insensitive_and_keeps_unknown() {
        assert_eq!(ItemStatus::parse("LOST"), ItemStatus::Lost);
        assert_eq!(ItemStatus::parse("found"), ItemStatus::Found);
        assert_eq!(
            ItemStatus::parse("CLAIMED"),
            ItemStatus::Other {
                status: "CLAIMED".to_string()
            }
        );
    }

    #[test]
    fn selection_state_accessors() {
        let loading = SelectionState::Loading {
            conversation_id: "7".into(),
        };
        assert_eq!(loading.conversation_id(), Some("7"));
        assert!(loading.is_loading_for("7"));
        assert!(!loading.is_ready_for("7"));
        assert_eq!(SelectionState::NoSelection.conversation_id(), None);
    }
}
