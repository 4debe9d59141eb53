use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use lostify_core::gateway::{
    HttpGateway, MessagingGateway, SendMessageRequest, Session, StartConversationRequest,
    sort_messages,
};
use lostify_core::{Conversation, UserRef, group_positions};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "lostify")]
#[command(about = "Lostify messaging CLI for testing against a backend")]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "LOSTIFY_API_BASE_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Bearer token of the signed-in user
    #[arg(long, env = "LOSTIFY_TOKEN", hide_env_values = true)]
    token: String,

    /// Id of the signed-in user
    #[arg(long, env = "LOSTIFY_USER_ID")]
    user_id: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List conversations, newest activity first
    Conversations,

    /// Create (or find) a conversation with a user, optionally about an item
    Start {
        /// Other user's id
        #[arg(long)]
        user: String,

        /// Item id the conversation is about
        #[arg(long)]
        item: Option<String>,
    },

    /// Fetch the messages of a conversation
    Messages {
        #[arg(long)]
        conversation: String,

        /// Include bubble grouping for each message
        #[arg(long)]
        grouped: bool,
    },

    /// Send a message in a conversation
    Send {
        #[arg(long)]
        conversation: String,

        #[arg(long)]
        content: String,
    },

    /// Mark a conversation as read
    Read {
        #[arg(long)]
        conversation: String,
    },

    /// Search users by name (at least 2 characters)
    SearchUsers {
        #[arg(long)]
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let gateway = HttpGateway::new(&cli.api_url, Duration::from_secs(cli.timeout_secs))
        .context("build http client")?;
    let session = session(&cli);
    tracing::debug!(api_url = %gateway.base_url(), user_id = %session.user.id, "lostify cli");

    let out = match &cli.cmd {
        Command::Conversations => cmd_conversations(&gateway, &session).await,
        Command::Start { user, item } => {
            cmd_start(&gateway, &session, user, item.as_deref()).await
        }
        Command::Messages {
            conversation,
            grouped,
        } => cmd_messages(&gateway, &session, conversation, *grouped).await,
        Command::Send {
            conversation,
            content,
        } => cmd_send(&gateway, &session, conversation, content).await,
        Command::Read { conversation } => cmd_read(&gateway, &session, conversation).await,
        Command::SearchUsers { query } => cmd_search_users(&gateway, &session, query).await,
    }?;
    print(out);
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn session(cli: &Cli) -> Session {
    Session {
        user: UserRef {
            id: cli.user_id.trim().to_string(),
            display_name: cli.user_id.trim().to_string(),
        },
        bearer_token: cli.token.trim().to_string(),
    }
}

async fn find_conversation(
    gateway: &HttpGateway,
    session: &Session,
    conversation_id: &str,
) -> anyhow::Result<Conversation> {
    let conversations = gateway
        .list_conversations(session)
        .await
        .context("list conversations")?;
    conversations
        .into_iter()
        .find(|c| c.id == conversation_id)
        .ok_or_else(|| anyhow!("conversation not found: {conversation_id}"))
}

fn print(v: serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(&v).expect("json encode"));
}

// ── Commands ────────────────────────────────────────────────────────────────

async fn cmd_conversations(
    gateway: &HttpGateway,
    session: &Session,
) -> anyhow::Result<serde_json::Value> {
    let conversations = gateway
        .list_conversations(session)
        .await
        .context("list conversations")?;
    let unread: u32 = conversations
        .iter()
        .fold(0u32, |acc, c| acc.saturating_add(c.unread_count));
    Ok(json!({
        "unread": unread,
        "conversations": conversations,
    }))
}

async fn cmd_start(
    gateway: &HttpGateway,
    session: &Session,
    user: &str,
    item: Option<&str>,
) -> anyhow::Result<serde_json::Value> {
    if user.trim() == session.user_id() {
        return Err(anyhow!("cannot start a conversation with yourself"));
    }
    let request = StartConversationRequest {
        other_user_id: user.trim().to_string(),
        item_id: item.map(|i| i.trim().to_string()).filter(|i| !i.is_empty()),
    };
    let conversation = gateway
        .start_conversation(session, &request)
        .await
        .context("start conversation")?;
    Ok(serde_json::to_value(conversation)?)
}

async fn cmd_messages(
    gateway: &HttpGateway,
    session: &Session,
    conversation_id: &str,
    grouped: bool,
) -> anyhow::Result<serde_json::Value> {
    let conversation = find_conversation(gateway, session, conversation_id).await?;
    let mut messages = gateway
        .list_messages(session, &conversation)
        .await
        .context("list messages")?;
    sort_messages(&mut messages);

    if !grouped {
        return Ok(json!({ "messages": messages }));
    }
    let positions = group_positions(&messages, |m| m.is_sent_by(session.user_id()));
    let rows: Vec<serde_json::Value> = messages
        .iter()
        .zip(positions)
        .map(|(m, pos)| {
            json!({
                "message": m,
                "is_mine": m.is_sent_by(session.user_id()),
                "first_in_group": pos.first_in_group,
                "last_in_group": pos.last_in_group,
            })
        })
        .collect();
    Ok(json!({ "messages": rows }))
}

async fn cmd_send(
    gateway: &HttpGateway,
    session: &Session,
    conversation_id: &str,
    content: &str,
) -> anyhow::Result<serde_json::Value> {
    let content = content.trim();
    if content.is_empty() {
        return Err(anyhow!("message is empty"));
    }
    let conversation = find_conversation(gateway, session, conversation_id).await?;
    let request = SendMessageRequest {
        conversation_id: conversation.id.clone(),
        content: content.to_string(),
        item_id: conversation.item.as_ref().map(|i| i.id.clone()),
        receiver_id: conversation.other_user.id.clone(),
    };
    let message = gateway
        .send_message(session, &request)
        .await
        .context("send message")?;
    Ok(serde_json::to_value(message)?)
}

async fn cmd_read(
    gateway: &HttpGateway,
    session: &Session,
    conversation_id: &str,
) -> anyhow::Result<serde_json::Value> {
    gateway
        .mark_read(session, conversation_id)
        .await
        .context("mark read")?;
    Ok(json!({ "conversation_id": conversation_id, "read": true }))
}

async fn cmd_search_users(
    gateway: &HttpGateway,
    session: &Session,
    query: &str,
) -> anyhow::Result<serde_json::Value> {
    let query = query.trim();
    if query.chars().count() < 2 {
        return Err(anyhow!("query must be at least 2 characters"));
    }
    let users = gateway
        .search_users(session, query)
        .await
        .context("search users")?;
    Ok(json!({ "users": users }))
}
