use crate::error::GatewayError;
use crate::gateway::Message;
use crate::state::{AppState, Conversation, UserRef};
use crate::AppAction;

#[derive(uniffi::Enum, Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
    /// A send was refused by the gateway; `content` is the draft to restore.
    SendFailed {
        rev: u64,
        conversation_id: String,
        content: String,
    },
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
            AppUpdate::SendFailed { rev, .. } => *rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
}

/// Results of gateway calls, sent back to the actor by the task that ran them.
///
/// `epoch` is the session epoch the call was issued under; results from an
/// earlier session are dropped.
#[derive(Debug)]
pub enum InternalEvent {
    ConversationsLoaded {
        epoch: u64,
        token: u64,
        result: Result<Vec<Conversation>, GatewayError>,
    },
    TimelineLoaded {
        epoch: u64,
        token: u64,
        conversation_id: String,
        result: Result<Vec<Message>, GatewayError>,
    },
    MarkReadFinished {
        epoch: u64,
        conversation_id: String,
        result: Result<(), GatewayError>,
    },
    ConversationStarted {
        epoch: u64,
        token: u64,
        // Selection token when the start was issued.
        selection_token: u64,
        result: Result<Conversation, GatewayError>,
    },
    SendFinished {
        epoch: u64,
        conversation_id: String,
        content: String,
        result: Result<Message, GatewayError>,
    },
    UserSearchFinished {
        epoch: u64,
        token: u64,
        result: Result<Vec<UserRef>, GatewayError>,
    },
}

impl InternalEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            InternalEvent::ConversationsLoaded { epoch, .. }
            | InternalEvent::TimelineLoaded { epoch, .. }
            | InternalEvent::MarkReadFinished { epoch, .. }
            | InternalEvent::ConversationStarted { epoch, .. }
            | InternalEvent::SendFinished { epoch, .. }
            | InternalEvent::UserSearchFinished { epoch, .. } => *epoch,
        }
    }
}
