mod config;
mod registry;
mod search;
mod selection;
mod session;
mod timeline;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::AppAction;
use crate::error::{GatewayError, MessagingError};
use crate::gateway::{HttpGateway, Message, Session, SharedGateway, UnreachableGateway};
use crate::state::{AppState, BusyState, ConversationViewState};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

pub(crate) use config::default_app_config_json;
use registry::ConversationRegistry;
use selection::Selection;
use timeline::Timeline;

pub struct AppCore {
    pub state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    data_dir: String,
    config: config::AppConfig,
    runtime: tokio::runtime::Runtime,
    gateway: SharedGateway,

    session: Option<Session>,
    // Bumped on every sign-in/sign-out; results issued under an older epoch are dropped.
    session_epoch: u64,

    registry: ConversationRegistry,
    selection: Selection,
    timeline: Option<Timeline>,

    // Conversation ids with a send awaiting the gateway.
    sends_in_flight: HashSet<String>,
    // Conversation id -> content of the last send that failed there.
    failed_drafts: HashMap<String, String>,
    // Conversation id -> sends confirmed while that conversation's timeline was loading.
    confirmed_while_loading: HashMap<String, Vec<Message>>,

    start_token: u64,
    search_token: u64,
    // Mirrors `search_token` for debounce tasks, which check it before issuing a request.
    search_generation: Arc<AtomicU64>,
}

impl AppCore {
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<AppState>>,
        gateway: Option<SharedGateway>,
    ) -> Self {
        let config = config::load_app_config(&data_dir);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        let gateway = gateway.unwrap_or_else(|| {
            let base_url = config.api_base_url();
            match HttpGateway::new(&base_url, config.request_timeout()) {
                Ok(http) => {
                    tracing::info!(base_url = %http.base_url(), "gateway: http");
                    Arc::new(http) as SharedGateway
                }
                Err(e) => {
                    tracing::error!(%e, "gateway: http client unavailable");
                    Arc::new(UnreachableGateway::new(e.to_string())) as SharedGateway
                }
            }
        });

        let this = Self {
            state: AppState::empty(),
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            data_dir,
            config,
            runtime,
            gateway,
            session: None,
            session_epoch: 0,
            registry: ConversationRegistry::new(),
            selection: Selection::new(),
            timeline: None,
            sends_in_flight: HashSet::new(),
            failed_drafts: HashMap::new(),
            confirmed_while_loading: HashMap::new(),
            start_token: 0,
            search_token: 0,
            search_generation: Arc::new(AtomicU64::new(0)),
        };

        // Ensure FfiApp.state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        tracing::debug!(data_dir = %this.data_dir, "core ready");
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn emit_send_failed(&mut self, conversation_id: String, content: String) {
        let rev = self.next_rev();
        // Keep snapshot rev in sync with the update stream even though this is a side-effect update.
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::SendFailed {
            rev,
            conversation_id,
            content,
        });
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Keep toast in state until the UI explicitly clears it.
        self.state.toast = Some(msg.into());
        self.emit_state();
    }

    /// Surfaces a failure: `last_error` for the UI logic, `toast` for the user.
    fn report(&mut self, err: MessagingError) {
        tracing::warn!(kind = ?err.kind, message = %err.message, "messaging error");
        let toast = err.user_visible_message();
        self.state.last_error = Some(err);
        self.toast(toast);
    }

    /// Routes a failed read: unauthorized ends the session, anything else is reported.
    fn fail_read(&mut self, err: GatewayError) {
        if err.is_unauthorized() {
            self.expire_session();
        } else {
            self.report(MessagingError::from_gateway(&err));
        }
    }

    /// The current session, or reports `AuthRequired` and returns `None`.
    fn require_session(&mut self) -> Option<Session> {
        if let Some(session) = &self.session {
            return Some(session.clone());
        }
        self.report(MessagingError::auth_required("sign in to use messages"));
        None
    }

    fn set_busy(&mut self, f: impl FnOnce(&mut BusyState)) {
        let mut next = self.state.busy.clone();
        f(&mut next);
        if next != self.state.busy {
            self.state.busy = next;
            self.emit_state();
        }
    }

    /// Runs a gateway call on the runtime and feeds its result back to the actor.
    fn spawn_gateway<F>(&self, task: F)
    where
        F: Future<Output = InternalEvent> + Send + 'static,
    {
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let event = task.await;
            let _ = tx.send(CoreMsg::Internal(Box::new(event)));
        });
    }

    /// Rebuilds `state.selection` and `state.current_conversation` from the
    /// selection machine, the loaded timeline and the registry.
    fn sync_conversation_view(&mut self) {
        self.state.selection = self.selection.state().clone();
        let Some(conversation_id) = self.selection.conversation_id().map(str::to_string) else {
            self.state.current_conversation = None;
            return;
        };

        let conversation = self
            .registry
            .get(&conversation_id)
            .cloned()
            .or_else(|| {
                self.state
                    .current_conversation
                    .as_ref()
                    .map(|v| v.conversation.clone())
                    .filter(|c| c.id == conversation_id)
            });
        let Some(conversation) = conversation else {
            self.state.current_conversation = None;
            return;
        };

        let me = self
            .session
            .as_ref()
            .map(|s| s.user_id().to_string())
            .unwrap_or_default();
        let messages = self
            .timeline
            .as_ref()
            .filter(|t| t.conversation_id() == conversation_id)
            .map(|t| t.project(&me))
            .unwrap_or_default();

        self.state.current_conversation = Some(ConversationViewState {
            conversation,
            messages,
            sending: self.sends_in_flight.contains(&conversation_id),
            failed_draft: self.failed_drafts.get(&conversation_id).cloned(),
        });
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(ref action) => {
                // Never log `?action` directly: it can contain bearer tokens and message text.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action.clone());
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        // Ignore results from a previous session (sign-out, expiry, re-sign-in).
        if internal.epoch() != self.session_epoch {
            tracing::debug!(epoch = internal.epoch(), current = self.session_epoch, "dropping stale result");
            return;
        }

        match internal {
            InternalEvent::ConversationsLoaded { token, result, .. } => {
                self.on_conversations_loaded(token, result);
            }
            InternalEvent::TimelineLoaded {
                token,
                conversation_id,
                result,
                ..
            } => {
                self.on_timeline_loaded(token, conversation_id, result);
            }
            InternalEvent::MarkReadFinished {
                conversation_id,
                result,
                ..
            } => {
                self.on_mark_read_finished(conversation_id, result);
            }
            InternalEvent::ConversationStarted {
                token,
                selection_token,
                result,
                ..
            } => {
                self.on_conversation_started(token, selection_token, result);
            }
            InternalEvent::SendFinished {
                conversation_id,
                content,
                result,
                ..
            } => {
                self.on_send_finished(conversation_id, content, result);
            }
            InternalEvent::UserSearchFinished { token, result, .. } => {
                self.on_user_search_finished(token, result);
            }
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            // Session
            AppAction::SignIn {
                user_id,
                display_name,
                bearer_token,
            } => {
                self.sign_in(user_id, display_name, bearer_token);
            }
            AppAction::SignOut => {
                self.sign_out();
            }

            // Conversations
            AppAction::RefreshConversations => {
                if self.require_session().is_some() {
                    self.refresh_conversations();
                }
            }
            AppAction::SelectConversation { conversation_id } => {
                self.select_conversation(conversation_id);
            }
            AppAction::StartConversation {
                other_user_id,
                item_id,
            } => {
                self.start_conversation(other_user_id, item_id);
            }
            AppAction::CloseConversation => {
                self.close_conversation();
            }

            // Messages
            AppAction::SendMessage {
                conversation_id,
                content,
            } => {
                self.send_message(conversation_id, content);
            }

            // Users
            AppAction::SearchUsers { query } => {
                self.search_users(query);
            }

            // UI
            AppAction::ClearToast => {
                if self.state.toast.is_some() {
                    self.state.toast = None;
                    self.emit_state();
                }
            }
            AppAction::ClearError => {
                if self.state.last_error.is_some() {
                    self.state.last_error = None;
                    self.emit_state();
                }
            }

            // Lifecycle
            AppAction::Foregrounded => {
                if self.session.is_some() {
                    self.refresh_conversations();
                }
            }
        }
    }
}
