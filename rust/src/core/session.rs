// Session lifecycle: sign-in, sign-out and expiry on unauthorized answers.

use super::*;
use crate::state::{AuthState, UserRef, UserSearchState};

impl AppCore {
    pub(super) fn sign_in(&mut self, user_id: String, display_name: String, bearer_token: String) {
        let user_id = user_id.trim().to_string();
        let bearer_token = bearer_token.trim().to_string();
        if user_id.is_empty() || bearer_token.is_empty() {
            self.report(MessagingError::validation("user id and token are required"));
            return;
        }

        // Tear down any existing session first.
        self.stop_session();

        let display_name = match display_name.trim() {
            "" => user_id.clone(),
            name => name.to_string(),
        };
        let user = UserRef {
            id: user_id,
            display_name,
        };
        tracing::info!(user_id = %user.id, epoch = self.session_epoch, "start_session");

        self.session = Some(Session {
            user: user.clone(),
            bearer_token,
        });
        self.state.auth = AuthState::SignedIn { user };
        self.emit_state();

        self.refresh_conversations();
    }

    pub(super) fn sign_out(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.stop_session();
        self.emit_state();
    }

    /// The gateway refused the credential: drop the session the way a sign-out
    /// would and tell the user to sign in again.
    pub(super) fn expire_session(&mut self) {
        if self.session.is_none() {
            return;
        }
        tracing::warn!(epoch = self.session_epoch, "session expired");
        self.stop_session();
        self.report(MessagingError::auth_required("session expired, sign in again"));
    }

    /// Clears every piece of per-identity state and advances the epoch so
    /// results still in flight are dropped. Does not emit.
    pub(super) fn stop_session(&mut self) {
        self.session_epoch = self.session_epoch.wrapping_add(1);
        if self.session.take().is_some() {
            tracing::info!(epoch = self.session_epoch, "stop_session");
        }

        self.registry.clear();
        self.selection.close();
        self.timeline = None;
        self.sends_in_flight.clear();
        self.failed_drafts.clear();
        self.confirmed_while_loading.clear();
        self.supersede_user_search();

        self.state.auth = AuthState::SignedOut;
        self.state.busy = BusyState::idle();
        self.state.user_search = UserSearchState::empty();
        self.state.last_error = None;
        self.sync_registry_state();
        self.sync_conversation_view();
    }
}
