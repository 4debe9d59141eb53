// Message timeline of the open conversation and the send pipeline.

use std::cmp::Ordering;

use super::*;
use crate::gateway::{Message, SendMessageRequest, compare_messages};
use crate::grouping::group_positions;
use crate::state::ChatMessage;

/// Messages of one conversation in display order.
///
/// Loaded in full when the conversation is opened; afterwards only grows, by
/// confirmed sends.
#[derive(Debug)]
pub(super) struct Timeline {
    conversation_id: String,
    messages: Vec<Message>,
}

impl Timeline {
    pub(super) fn new(conversation_id: String, mut messages: Vec<Message>) -> Self {
        let mut seen = HashSet::new();
        messages.retain(|m| seen.insert(m.id.clone()));
        messages.sort_by(compare_messages);
        Self {
            conversation_id,
            messages,
        }
    }

    pub(super) fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Inserts a message the gateway accepted at its sorted position. Returns
    /// false if a message with the same id is already present.
    pub(super) fn append_confirmed(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        let at = self
            .messages
            .partition_point(|m| compare_messages(m, &message) != Ordering::Greater);
        self.messages.insert(at, message);
        true
    }

    /// Display rows for `current_user_id`, with grouping applied.
    pub(super) fn project(&self, current_user_id: &str) -> Vec<ChatMessage> {
        let positions = group_positions(&self.messages, |m| m.is_sent_by(current_user_id));
        self.messages
            .iter()
            .zip(positions)
            .map(|(m, pos)| ChatMessage {
                id: m.id.clone(),
                conversation_id: m.conversation_id.clone(),
                sender_id: m.sender_id.clone(),
                receiver_id: m.receiver_id.clone(),
                content: m.content.clone(),
                sent_at: m.sent_at,
                item_id: m.item_id.clone(),
                is_mine: m.is_sent_by(current_user_id),
                first_in_group: pos.first_in_group,
                last_in_group: pos.last_in_group,
                show_timestamp: pos.shows_timestamp(),
            })
            .collect()
    }
}

impl AppCore {
    pub(super) fn send_message(&mut self, conversation_id: String, content: String) {
        let Some(session) = self.require_session() else {
            return;
        };
        let trimmed = content.trim();
        if trimmed.is_empty() {
            self.report(MessagingError::validation("message is empty"));
            return;
        }
        if self.sends_in_flight.contains(&conversation_id) {
            self.report(MessagingError::validation(
                "a message is already being sent in this conversation",
            ));
            return;
        }
        if !self.selection.state().is_ready_for(&conversation_id) {
            self.report(MessagingError::validation("conversation is not open"));
            return;
        }
        let Some(conversation) = self
            .state
            .current_conversation
            .as_ref()
            .map(|v| v.conversation.clone())
            .filter(|c| c.id == conversation_id)
        else {
            self.report(MessagingError::validation("conversation is not open"));
            return;
        };

        let request = SendMessageRequest {
            conversation_id: conversation_id.clone(),
            content: trimmed.to_string(),
            item_id: conversation.item.as_ref().map(|i| i.id.clone()),
            receiver_id: conversation.other_user.id.clone(),
        };

        self.sends_in_flight.insert(conversation_id.clone());
        self.failed_drafts.remove(&conversation_id);
        self.sync_conversation_view();
        self.emit_state();

        tracing::debug!(%conversation_id, "send: issued");
        let epoch = self.session_epoch;
        let gateway = self.gateway.clone();
        self.spawn_gateway(async move {
            let result = gateway.send_message(&session, &request).await;
            InternalEvent::SendFinished {
                epoch,
                conversation_id,
                content,
                result,
            }
        });
    }

    pub(super) fn on_send_finished(
        &mut self,
        conversation_id: String,
        content: String,
        result: Result<Message, GatewayError>,
    ) {
        self.sends_in_flight.remove(&conversation_id);

        match result {
            Ok(message) => {
                tracing::info!(%conversation_id, message_id = %message.id, "send: confirmed");
                match self
                    .timeline
                    .as_mut()
                    .filter(|t| t.conversation_id() == conversation_id)
                {
                    Some(timeline) => {
                        timeline.append_confirmed(message);
                    }
                    // A load issued before the confirmation may not contain it.
                    None if self.selection.state().is_loading_for(&conversation_id) => {
                        self.confirmed_while_loading
                            .entry(conversation_id.clone())
                            .or_default()
                            .push(message);
                    }
                    // Any later load of that conversation includes it.
                    None => {}
                }
                self.sync_conversation_view();
                self.emit_state();
                self.refresh_conversations();
            }
            Err(e) if e.is_unauthorized() => self.expire_session(),
            Err(e) => {
                tracing::warn!(%conversation_id, %e, "send: failed");
                self.failed_drafts
                    .insert(conversation_id.clone(), content.clone());
                self.sync_conversation_view();
                self.report(MessagingError::from_send(&e));
                self.emit_send_failed(conversation_id, content);
            }
        }
    }
}
