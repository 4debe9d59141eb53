use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::wire::{
    ConversationDto, MessageContext, MessageDto, SendMessageBody, StartConversationBody, UserDto,
    WireId,
};
use super::{Message, MessagingGateway, SendMessageRequest, Session, StartConversationRequest};
use crate::error::GatewayError;
use crate::state::{Conversation, UserRef};

/// Talks to the Lostify REST backend under `{base_url}/api`.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("http client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base_url}/api/{segments..}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GatewayError::Unavailable(format!("base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::Unavailable(format!("base url {}", self.base_url)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn authed(&self, builder: RequestBuilder, session: &Session) -> RequestBuilder {
        builder.bearer_auth(&session.bearer_token)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, GatewayError> {
        let resp = builder.send().await.map_err(transport_error)?;
        check_status(resp).await
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let resp = self.execute(builder).await?;
        let bytes = resp.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::Malformed(err.to_string())
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

async fn check_status(resp: Response) -> Result<Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(GatewayError::Unauthorized);
    }
    let body = resp.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(GatewayError::Unavailable(format!("{status}: {body}")));
    }
    Err(GatewayError::Rejected {
        status: status.as_u16(),
        message: body,
    })
}

#[async_trait]
impl MessagingGateway for HttpGateway {
    async fn list_conversations(
        &self,
        session: &Session,
    ) -> Result<Vec<Conversation>, GatewayError> {
        let req = self.authed(self.client.get(self.url(&["messages", "conversations"])?), session);
        let dtos: Vec<ConversationDto> = self.fetch_json(req).await?;
        let mut conversations: Vec<Conversation> = dtos
            .into_iter()
            .map(ConversationDto::into_conversation)
            .collect();
        conversations.sort_by_key(|c| std::cmp::Reverse(c.last_message_at));
        tracing::debug!(count = conversations.len(), "http: listed conversations");
        Ok(conversations)
    }

    async fn start_conversation(
        &self,
        session: &Session,
        request: &StartConversationRequest,
    ) -> Result<Conversation, GatewayError> {
        let body = StartConversationBody {
            other_user_id: WireId(&request.other_user_id),
            item_id: request.item_id.as_deref().map(WireId),
        };
        let req = self
            .authed(self.client.post(self.url(&["messages", "conversation"])?), session)
            .json(&body);
        let dto: ConversationDto = self.fetch_json(req).await?;
        Ok(dto.into_conversation())
    }

    async fn list_messages(
        &self,
        session: &Session,
        conversation: &Conversation,
    ) -> Result<Vec<Message>, GatewayError> {
        let url = self.url(&["messages", "conversation", conversation.id.as_str(), "messages"])?;
        let req = self.authed(self.client.get(url), session);
        let dtos: Vec<MessageDto> = self.fetch_json(req).await?;
        let ctx = MessageContext {
            conversation_id: &conversation.id,
            current_user_id: session.user_id(),
            counterpart_id: &conversation.other_user.id,
            item_id: conversation.item.as_ref().map(|i| i.id.as_str()),
        };
        dtos.into_iter().map(|dto| dto.into_message(&ctx)).collect()
    }

    async fn send_message(
        &self,
        session: &Session,
        request: &SendMessageRequest,
    ) -> Result<Message, GatewayError> {
        let body = SendMessageBody {
            content: &request.content,
            item_id: request.item_id.as_deref().map(WireId),
            receiver_id: WireId(&request.receiver_id),
        };
        let req = self
            .authed(self.client.post(self.url(&["messages", "send"])?), session)
            .json(&body);
        let dto: MessageDto = self.fetch_json(req).await?;
        let ctx = MessageContext {
            conversation_id: &request.conversation_id,
            current_user_id: session.user_id(),
            counterpart_id: &request.receiver_id,
            item_id: request.item_id.as_deref(),
        };
        dto.into_message(&ctx)
    }

    async fn mark_read(&self, session: &Session, conversation_id: &str) -> Result<(), GatewayError> {
        let url = self.url(&["messages", "conversation", conversation_id, "read"])?;
        let req = self.authed(self.client.post(url), session);
        self.execute(req).await?;
        Ok(())
    }

    async fn search_users(
        &self,
        session: &Session,
        query: &str,
    ) -> Result<Vec<UserRef>, GatewayError> {
        let req = self
            .authed(self.client.get(self.url(&["users", "search"])?), session)
            .query(&[("q", query)]);
        let dtos: Vec<UserDto> = self.fetch_json(req).await?;
        Ok(dtos
            .into_iter()
            .map(UserDto::into_user)
            .filter(|u| u.id != session.user_id())
            .collect())
    }
}

/// Stands in when the HTTP client cannot be built; every call reports the
/// gateway as unavailable instead of failing app construction.
pub struct UnreachableGateway {
    reason: String,
}

impl UnreachableGateway {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn err<T>(&self) -> Result<T, GatewayError> {
        Err(GatewayError::Unavailable(self.reason.clone()))
    }
}

#[async_trait]
impl MessagingGateway for UnreachableGateway {
    async fn list_conversations(&self, _: &Session) -> Result<Vec<Conversation>, GatewayError> {
        self.err()
    }

    async fn start_conversation(
        &self,
        _: &Session,
        _: &StartConversationRequest,
    ) -> Result<Conversation, GatewayError> {
        self.err()
    }

    async fn list_messages(&self, _: &Session, _: &Conversation) -> Result<Vec<Message>, GatewayError> {
        self.err()
    }

    async fn send_message(&self, _: &Session, _: &SendMessageRequest) -> Result<Message, GatewayError> {
        self.err()
    }

    async fn mark_read(&self, _: &Session, _: &str) -> Result<(), GatewayError> {
        self.err()
    }

    async fn search_users(&self, _: &Session, _: &str) -> Result<Vec<UserRef>, GatewayError> {
        self.err()
    }
}
