// Opening a conversation: selection, timeline fetch, read acknowledgement,
// and create-or-find for new conversations.

use super::*;
use crate::gateway::{Message, StartConversationRequest};
use crate::state::{Conversation, SelectionState};

/// `NoSelection → Loading → Ready | Error`, re-entered on every `select`.
///
/// Each selection gets a fresh token. A timeline response is only applied if
/// it carries the current token and the machine is still loading the same
/// conversation.
#[derive(Debug)]
pub(super) struct Selection {
    token: u64,
    state: SelectionState,
}

impl Selection {
    pub(super) fn new() -> Self {
        Self {
            token: 0,
            state: SelectionState::NoSelection,
        }
    }

    pub(super) fn token(&self) -> u64 {
        self.token
    }

    pub(super) fn state(&self) -> &SelectionState {
        &self.state
    }

    pub(super) fn conversation_id(&self) -> Option<&str> {
        self.state.conversation_id()
    }

    pub(super) fn select(&mut self, conversation_id: &str) -> u64 {
        self.token += 1;
        self.state = SelectionState::Loading {
            conversation_id: conversation_id.to_string(),
        };
        self.token
    }

    pub(super) fn is_current(&self, token: u64, conversation_id: &str) -> bool {
        token == self.token && self.state.is_loading_for(conversation_id)
    }

    pub(super) fn ready(&mut self) {
        if let SelectionState::Loading { conversation_id } = &self.state {
            self.state = SelectionState::Ready {
                conversation_id: conversation_id.clone(),
            };
        }
    }

    pub(super) fn fail(&mut self, error: MessagingError) {
        if let SelectionState::Loading { conversation_id } = &self.state {
            self.state = SelectionState::Error {
                conversation_id: conversation_id.clone(),
                error,
            };
        }
    }

    pub(super) fn close(&mut self) {
        self.token += 1;
        self.state = SelectionState::NoSelection;
    }
}

impl AppCore {
    pub(super) fn select_conversation(&mut self, conversation_id: String) {
        let Some(session) = self.require_session() else {
            return;
        };
        let Some(conversation) = self.registry.get(&conversation_id).cloned() else {
            self.report(MessagingError::validation(format!(
                "unknown conversation {conversation_id}"
            )));
            return;
        };
        self.open_conversation(session, conversation);
    }

    fn open_conversation(&mut self, session: Session, conversation: Conversation) {
        let token = self.selection.select(&conversation.id);
        self.timeline = None;
        self.sync_conversation_view();
        self.emit_state();

        tracing::debug!(conversation_id = %conversation.id, token, "selection: loading");
        let epoch = self.session_epoch;
        let gateway = self.gateway.clone();
        self.spawn_gateway(async move {
            let result = gateway.list_messages(&session, &conversation).await;
            InternalEvent::TimelineLoaded {
                epoch,
                token,
                conversation_id: conversation.id,
                result,
            }
        });
    }

    pub(super) fn on_timeline_loaded(
        &mut self,
        token: u64,
        conversation_id: String,
        result: Result<Vec<Message>, GatewayError>,
    ) {
        if !self.selection.is_current(token, &conversation_id) {
            tracing::debug!(%conversation_id, token, "selection: dropping stale timeline");
            return;
        }

        match result {
            Ok(messages) => {
                tracing::debug!(%conversation_id, count = messages.len(), "selection: ready");
                let mut timeline = Timeline::new(conversation_id.clone(), messages);
                for message in self
                    .confirmed_while_loading
                    .remove(&conversation_id)
                    .unwrap_or_default()
                {
                    timeline.append_confirmed(message);
                }
                self.timeline = Some(timeline);
                self.selection.ready();
                self.sync_conversation_view();
                self.emit_state();
                self.mark_read(conversation_id);
            }
            Err(e) if e.is_unauthorized() => self.expire_session(),
            Err(e) => {
                // No read acknowledgement for a timeline that never loaded.
                let err = MessagingError::from_gateway(&e);
                self.selection.fail(err.clone());
                self.sync_conversation_view();
                self.report(err);
            }
        }
    }

    fn mark_read(&mut self, conversation_id: String) {
        let Some(session) = self.session.clone() else {
            return;
        };
        let epoch = self.session_epoch;
        let gateway = self.gateway.clone();
        self.spawn_gateway(async move {
            let result = gateway.mark_read(&session, &conversation_id).await;
            InternalEvent::MarkReadFinished {
                epoch,
                conversation_id,
                result,
            }
        });
    }

    pub(super) fn on_mark_read_finished(
        &mut self,
        conversation_id: String,
        result: Result<(), GatewayError>,
    ) {
        match result {
            Ok(()) => tracing::debug!(%conversation_id, "selection: marked read"),
            Err(e) if e.is_unauthorized() => {
                self.expire_session();
                return;
            }
            // The count stays whatever the server says on the next refresh.
            Err(e) => tracing::warn!(%conversation_id, %e, "selection: mark read failed"),
        }
        self.refresh_conversations();
    }

    pub(super) fn start_conversation(&mut self, other_user_id: String, item_id: Option<String>) {
        let Some(session) = self.require_session() else {
            return;
        };
        let other_user_id = other_user_id.trim().to_string();
        if other_user_id.is_empty() {
            self.report(MessagingError::validation("choose someone to message"));
            return;
        }
        if other_user_id == session.user_id() {
            self.report(MessagingError::validation("you cannot message yourself"));
            return;
        }
        let item_id = item_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        self.start_token += 1;
        let token = self.start_token;
        let selection_token = self.selection.token();
        let epoch = self.session_epoch;
        let gateway = self.gateway.clone();
        let request = StartConversationRequest {
            other_user_id,
            item_id,
        };

        self.set_busy(|b| b.starting_conversation = true);
        self.spawn_gateway(async move {
            let result = gateway.start_conversation(&session, &request).await;
            InternalEvent::ConversationStarted {
                epoch,
                token,
                selection_token,
                result,
            }
        });
    }

    pub(super) fn on_conversation_started(
        &mut self,
        token: u64,
        selection_token: u64,
        result: Result<Conversation, GatewayError>,
    ) {
        let latest = token == self.start_token;
        if latest {
            self.state.busy.starting_conversation = false;
        }

        match result {
            Ok(conversation) => {
                // A select (or close) issued meanwhile keeps the selection; the
                // new conversation only shows up through the refresh.
                if latest && selection_token == self.selection.token() {
                    if let Some(session) = self.session.clone() {
                        tracing::info!(conversation_id = %conversation.id, "selection: conversation started");
                        self.registry.upsert(conversation.clone());
                        self.sync_registry_state();
                        self.open_conversation(session, conversation);
                    }
                } else {
                    tracing::debug!(conversation_id = %conversation.id, "selection: started conversation not opened");
                    self.emit_state();
                }
                self.refresh_conversations();
            }
            Err(e) => self.fail_read(e),
        }
    }

    pub(super) fn close_conversation(&mut self) {
        if matches!(self.selection.state(), SelectionState::NoSelection) {
            return;
        }
        self.selection.close();
        self.timeline = None;
        self.sync_conversation_view();
        self.emit_state();
    }
}
