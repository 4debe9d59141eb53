#[derive(uniffi::Enum, Debug, Clone)]
pub enum AppAction {
    // Session
    SignIn {
        user_id: String,
        display_name: String,
        bearer_token: String,
    },
    SignOut,

    // Conversations
    RefreshConversations,
    SelectConversation {
        conversation_id: String,
    },
    StartConversation {
        other_user_id: String,
        item_id: Option<String>,
    },
    CloseConversation,

    // Messages
    SendMessage {
        conversation_id: String,
        content: String,
    },

    // Users
    SearchUsers {
        query: String,
    },

    // UI
    ClearToast,
    ClearError,

    // Lifecycle
    Foregrounded,
}

impl AppAction {
    /// Log-safe action tag (never includes bearer tokens or message content).
    pub fn tag(&self) -> &'static str {
        match self {
            // Session
            AppAction::SignIn { .. } => "SignIn",
            AppAction::SignOut => "SignOut",

            // Conversations
            AppAction::RefreshConversations => "RefreshConversations",
            AppAction::SelectConversation { .. } => "SelectConversation",
            AppAction::StartConversation { .. } => "StartConversation",
            AppAction::CloseConversation => "CloseConversation",

            // Messages
            AppAction::SendMessage { .. } => "SendMessage",

            // Users
            AppAction::SearchUsers { .. } => "SearchUsers",

            // UI
            AppAction::ClearToast => "ClearToast",
            AppAction::ClearError => "ClearError",

            // Lifecycle
            AppAction::Foregrounded => "Foregrounded",
        }
    }
}
