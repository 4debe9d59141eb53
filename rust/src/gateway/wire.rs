// JSON shapes of the messaging API and their mapping onto core types.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Message;
use crate::error::GatewayError;
use crate::state::{Conversation, ItemRef, ItemStatus, UserRef};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

fn opaque_id_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

/// Outgoing id. Ids that look numeric go out as JSON numbers, which is what
/// the backend's `Long` fields expect.
pub(super) struct WireId<'a>(pub &'a str);

impl Serialize for WireId<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0.parse::<i64>() {
            Ok(n) => serializer.serialize_i64(n),
            Err(_) => serializer.serialize_str(self.0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Parts(Vec<i64>),
    Text(String),
}

/// Accepts RFC 3339, zone-less ISO date-times (taken as UTC) and the
/// `[y, m, d, h, min, s, nanos]` array form.
fn timestamp_millis(raw: RawTimestamp) -> Option<i64> {
    match raw {
        RawTimestamp::Millis(ms) => Some(ms),
        RawTimestamp::Parts(parts) => {
            let part = |i: usize| parts.get(i).copied().unwrap_or(0);
            let unsigned = |i: usize| u32::try_from(part(i)).ok();
            let date = NaiveDate::from_ymd_opt(
                i32::try_from(part(0)).ok()?,
                unsigned(1)?,
                unsigned(2)?,
            )?;
            let dt = date.and_hms_nano_opt(unsigned(3)?, unsigned(4)?, unsigned(5)?, unsigned(6)?)?;
            Some(dt.and_utc().timestamp_millis())
        }
        RawTimestamp::Text(text) => parse_timestamp(&text),
    }
}

pub(crate) fn parse_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    timestamp_opt(deserializer)?.ok_or_else(|| serde::de::Error::custom("missing timestamp"))
}

fn timestamp_opt<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => timestamp_millis(raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("unrecognised timestamp")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserDto {
    #[serde(deserialize_with = "opaque_id")]
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

impl UserDto {
    pub(super) fn into_user(self) -> UserRef {
        let display_name = self
            .display_name
            .or(self.username)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.id.clone());
        UserRef {
            id: self.id,
            display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ItemDto {
    #[serde(deserialize_with = "opaque_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    photo_urls: Option<Vec<String>>,
}

impl ItemDto {
    fn into_item(self) -> ItemRef {
        let thumbnail_url = self
            .thumbnail_url
            .or(self.image_url)
            .or_else(|| self.photo_urls.and_then(|urls| urls.into_iter().next()))
            .filter(|url| !url.is_empty());
        ItemRef {
            id: self.id,
            name: self.name.unwrap_or_default(),
            status: ItemStatus::parse(self.status.as_deref().unwrap_or_default()),
            thumbnail_url,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConversationDto {
    #[serde(deserialize_with = "opaque_id")]
    id: String,
    other_user: UserDto,
    #[serde(default)]
    item: Option<ItemDto>,
    #[serde(default)]
    last_message: Option<String>,
    #[serde(default, deserialize_with = "timestamp_opt")]
    last_message_at: Option<i64>,
    #[serde(default)]
    unread_count: i64,
}

impl ConversationDto {
    pub(super) fn into_conversation(self) -> Conversation {
        Conversation {
            id: self.id,
            other_user: self.other_user.into_user(),
            item: self.item.map(ItemDto::into_item),
            // The backend reports "" for a conversation without messages.
            last_message: self.last_message.filter(|m| !m.is_empty()),
            last_message_at: self.last_message_at,
            unread_count: self.unread_count.clamp(0, u32::MAX as i64) as u32,
        }
    }
}

/// What a message needs from its surroundings when the wire omits it.
pub(super) struct MessageContext<'a> {
    pub conversation_id: &'a str,
    pub current_user_id: &'a str,
    pub counterpart_id: &'a str,
    pub item_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MessageDto {
    #[serde(deserialize_with = "opaque_id")]
    id: String,
    #[serde(default, deserialize_with = "opaque_id_opt")]
    conversation_id: Option<String>,
    content: String,
    #[serde(default, deserialize_with = "opaque_id_opt")]
    sender_id: Option<String>,
    #[serde(default)]
    sender: Option<UserDto>,
    #[serde(default, deserialize_with = "opaque_id_opt")]
    receiver_id: Option<String>,
    #[serde(deserialize_with = "timestamp")]
    sent_at: i64,
    #[serde(default, deserialize_with = "opaque_id_opt")]
    item_id: Option<String>,
}

impl MessageDto {
    pub(super) fn into_message(self, ctx: &MessageContext<'_>) -> Result<Message, GatewayError> {
        let sender_id = self
            .sender_id
            .or_else(|| self.sender.map(|s| s.id))
            .ok_or_else(|| GatewayError::Malformed(format!("message {} has no sender", self.id)))?;
        let receiver_id = self.receiver_id.unwrap_or_else(|| {
            if sender_id == ctx.current_user_id {
                ctx.counterpart_id.to_string()
            } else {
                ctx.current_user_id.to_string()
            }
        });
        Ok(Message {
            id: self.id,
            conversation_id: self
                .conversation_id
                .unwrap_or_else(|| ctx.conversation_id.to_string()),
            content: self.content,
            sender_id,
            receiver_id,
            sent_at: self.sent_at,
            item_id: self.item_id.or_else(|| ctx.item_id.map(ToString::to_string)),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct StartConversationBody<'a> {
    pub other_user_id: WireId<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<WireId<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SendMessageBody<'a> {
    pub content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<WireId<'a>>,
    pub receiver_id: WireId<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONVERSATION_JSON: &str = r#"{
        "id": 12,
        "otherUser": {"id": 4, "username": "maria", "email": "maria@uni.edu", "phoneNumber": null},
        "item": {
            "id": 31,
            "name": "Blue backpack",
            "description": "Left in the library",
            "status": "LOST",
            "imageUrl": null,
            "photoUrls": ["/uploads/a.jpg", "/uploads/b.jpg"],
            "user": {"id": 4, "username": "maria"}
        },
        "lastMessage": "",
        "lastMessageAt": "2024-03-05T14:30:00",
        "unreadCount": 3,
        "currentUserSender": false
    }"#;

    #[test]
    fn decodes_backend_conversation_shape() {
        let dto: ConversationDto = serde_json::from_str(CONVERSATION_JSON).unwrap();
        let conv = dto.into_conversation();
        assert_eq!(conv.id, "12");
        assert_eq!(conv.other_user.id, "4");
        assert_eq!(conv.other_user.display_name, "maria");
        assert_eq!(conv.last_message, None);
        assert_eq!(conv.unread_count, 3);
        assert_eq!(conv.last_message_at, parse_timestamp("2024-03-05T14:30:00Z"));

        let item = conv.item.unwrap();
        assert_eq!(item.id, "31");
        assert_eq!(item.status, ItemStatus::Lost);
        assert_eq!(item.thumbnail_url.as_deref(), Some("/uploads/a.jpg"));
    }

    #[test]
    fn conversation_without_item_and_string_ids() {
        let json = r#"{
            "id": "c-1",
            "otherUser": {"id": "u-9", "displayName": "Sam"},
            "lastMessage": "see you at 5",
            "lastMessageAt": 1700000000000,
            "unreadCount": -2
        }"#;
        let conv = serde_json::from_str::<ConversationDto>(json)
            .unwrap()
            .into_conversation();
        assert_eq!(conv.id, "c-1");
        assert!(conv.item.is_none());
        assert_eq!(conv.last_message.as_deref(), Some("see you at 5"));
        assert_eq!(conv.last_message_at, Some(1_700_000_000_000));
        assert_eq!(conv.unread_count, 0);
    }

    #[test]
    fn timestamp_forms() {
        let utc = parse_timestamp("2024-03-05T14:30:00Z").unwrap();
        assert_eq!(parse_timestamp("2024-03-05T14:30:00"), Some(utc));
        assert_eq!(parse_timestamp("2024-03-05T16:30:00+02:00"), Some(utc));
        assert_eq!(parse_timestamp("2024-03-05T14:30:00.250"), Some(utc + 250));
        assert_eq!(
            timestamp_millis(RawTimestamp::Parts(vec![2024, 3, 5, 14, 30, 0, 0])),
            Some(utc)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn out_of_range_timestamp_parts_are_rejected() {
        let month = (1i64 << 32) + 3;
        assert_eq!(
            timestamp_millis(RawTimestamp::Parts(vec![2024, month, 5, 14, 30, 0, 0])),
            None
        );
        let year = i64::from(i32::MAX) + 2025;
        assert_eq!(
            timestamp_millis(RawTimestamp::Parts(vec![year, 3, 5, 14, 30, 0, 0])),
            None
        );
        assert_eq!(
            timestamp_millis(RawTimestamp::Parts(vec![2024, 3, 5, -1, 30, 0, 0])),
            None
        );
    }

    fn ctx() -> MessageContext<'static> {
        MessageContext {
            conversation_id: "12",
            current_user_id: "1",
            counterpart_id: "4",
            item_id: Some("31"),
        }
    }

    #[test]
    fn message_sender_from_nested_user_and_receiver_derived() {
        let json = r#"{
            "id": 100,
            "content": "Is it still there?",
            "sender": {"id": 4, "username": "maria"},
            "sentAt": "2024-03-05T14:31:00",
            "isRead": false,
            "isCurrentUserSender": false
        }"#;
        let msg = serde_json::from_str::<MessageDto>(json)
            .unwrap()
            .into_message(&ctx())
            .unwrap();
        assert_eq!(msg.id, "100");
        assert_eq!(msg.conversation_id, "12");
        assert_eq!(msg.sender_id, "4");
        assert_eq!(msg.receiver_id, "1");
        assert_eq!(msg.item_id.as_deref(), Some("31"));
        assert!(!msg.is_sent_by("1"));
    }

    #[test]
    fn own_message_receiver_is_counterpart() {
        let json = r#"{"id": 101, "content": "yes", "senderId": 1, "sentAt": 5}"#;
        let msg = serde_json::from_str::<MessageDto>(json)
            .unwrap()
            .into_message(&ctx())
            .unwrap();
        assert_eq!(msg.receiver_id, "4");
        assert!(msg.is_sent_by("1"));
    }

    #[test]
    fn message_without_sender_is_malformed() {
        let json = r#"{"id": 102, "content": "?", "sentAt": 5}"#;
        let err = serde_json::from_str::<MessageDto>(json)
            .unwrap()
            .into_message(&ctx())
            .unwrap_err();
        assert!(matches!(err, GatewayError::Malformed(_)));
    }

    #[test]
    fn request_bodies_send_numeric_ids_as_numbers() {
        let body = SendMessageBody {
            content: "hi",
            item_id: None,
            receiver_id: WireId("4"),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"content": "hi", "receiverId": 4})
        );

        let body = StartConversationBody {
            other_user_id: WireId("u-9"),
            item_id: Some(WireId("31")),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"otherUserId": "u-9", "itemId": 31})
        );
    }
}
