// Debounced user search for starting new conversations.

use std::sync::atomic::Ordering;

use super::*;
use crate::state::UserRef;

// The backend rejects shorter queries.
const MIN_QUERY_CHARS: usize = 2;

impl AppCore {
    /// Invalidates any pending or in-flight search.
    pub(super) fn supersede_user_search(&mut self) -> u64 {
        self.search_token += 1;
        self.search_generation
            .store(self.search_token, Ordering::SeqCst);
        self.search_token
    }

    pub(super) fn search_users(&mut self, query: String) {
        let Some(session) = self.require_session() else {
            return;
        };
        let token = self.supersede_user_search();
        let trimmed = query.trim().to_string();
        self.state.user_search.query = query;

        if trimmed.chars().count() < MIN_QUERY_CHARS {
            self.state.user_search.searching = false;
            self.state.user_search.results.clear();
            self.emit_state();
            return;
        }

        self.state.user_search.searching = true;
        self.emit_state();

        let debounce = self.config.user_search_debounce();
        let generation = self.search_generation.clone();
        let epoch = self.session_epoch;
        let gateway = self.gateway.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            if generation.load(Ordering::SeqCst) != token {
                // A newer query arrived while waiting.
                return;
            }
            let result = gateway.search_users(&session, &trimmed).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::UserSearchFinished {
                    epoch,
                    token,
                    result,
                },
            )));
        });
    }

    pub(super) fn on_user_search_finished(
        &mut self,
        token: u64,
        result: Result<Vec<UserRef>, GatewayError>,
    ) {
        if token != self.search_token {
            tracing::debug!(token, "search: dropping superseded results");
            return;
        }
        self.state.user_search.searching = false;

        match result {
            Ok(mut users) => {
                if let Some(session) = &self.session {
                    users.retain(|u| u.id != session.user_id());
                }
                tracing::debug!(count = users.len(), "search: results");
                self.state.user_search.results = users;
                self.emit_state();
            }
            Err(e) => self.fail_read(e),
        }
    }
}
