use std::time::Duration;

use lostify_core::gateway::{
    HttpGateway, MessagingGateway, SendMessageRequest, Session, StartConversationRequest,
};
use lostify_core::{Conversation, GatewayError, ItemRef, ItemStatus, UserRef};
use lostify_test_utils::{spawn_one_shot_server, spawn_scripted_server, ScriptedResponse};

fn session() -> Session {
    Session {
        user: UserRef {
            id: "1".into(),
            display_name: "Ana".into(),
        },
        bearer_token: "token-abc".into(),
    }
}

fn gateway(url: &str) -> HttpGateway {
    HttpGateway::new(url, Duration::from_secs(5)).unwrap()
}

fn conversation_with_item() -> Conversation {
    Conversation {
        id: "12".into(),
        other_user: UserRef {
            id: "4".into(),
            display_name: "maria".into(),
        },
        item: Some(ItemRef {
            id: "31".into(),
            name: "Blue backpack".into(),
            status: ItemStatus::Lost,
            thumbnail_url: None,
        }),
        last_message: None,
        last_message_at: None,
        unread_count: 0,
    }
}

#[tokio::test]
async fn list_conversations_sends_bearer_and_sorts_newest_first() {
    let body = r#"[
        {"id": 1, "otherUser": {"id": 4, "username": "maria"}, "lastMessage": "old",
         "lastMessageAt": "2024-03-01T10:00:00", "unreadCount": 0},
        {"id": 2, "otherUser": {"id": 5, "username": "li"}, "lastMessage": "",
         "lastMessageAt": null, "unreadCount": 0},
        {"id": 3, "otherUser": {"id": 6, "username": "sam"}, "lastMessage": "new",
         "lastMessageAt": "2024-03-02T10:00:00", "unreadCount": 2}
    ]"#;
    let (url, rx) = spawn_one_shot_server("200 OK", body);

    let conversations = gateway(&url).list_conversations(&session()).await.unwrap();

    let req = rx.recv().unwrap();
    assert_eq!(req.method, "GET");
    assert_eq!(req.path, "/api/messages/conversations");
    assert_eq!(req.header("authorization"), Some("Bearer token-abc"));

    let ids: Vec<&str> = conversations.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "1", "2"]);
    assert_eq!(conversations[0].unread_count, 2);
    assert_eq!(conversations[2].last_message, None);
}

#[tokio::test]
async fn start_conversation_posts_numeric_ids() {
    let body = r#"{"id": 12, "otherUser": {"id": 4, "username": "maria"},
        "item": {"id": 31, "name": "Blue backpack", "status": "LOST"},
        "lastMessage": "", "lastMessageAt": null, "unreadCount": 0}"#;
    let (url, rx) = spawn_one_shot_server("200 OK", body);

    let conversation = gateway(&url)
        .start_conversation(
            &session(),
            &StartConversationRequest {
                other_user_id: "4".into(),
                item_id: Some("31".into()),
            },
        )
        .await
        .unwrap();

    let req = rx.recv().unwrap();
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/api/messages/conversation");
    let sent: serde_json::Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(sent, serde_json::json!({"otherUserId": 4, "itemId": 31}));

    assert_eq!(conversation.id, "12");
    assert_eq!(conversation.item.map(|i| i.status), Some(ItemStatus::Lost));
}

#[tokio::test]
async fn list_messages_fills_missing_fields_from_conversation() {
    let body = r#"[
        {"id": 8, "content": "found it?", "sender": {"id": 4, "username": "maria"},
         "sentAt": "2024-03-02T10:00:00", "isRead": true, "isCurrentUserSender": false},
        {"id": 9, "content": "yes", "sender": {"id": 1, "username": "ana"},
         "sentAt": "2024-03-02T10:01:00", "isRead": false, "isCurrentUserSender": true}
    ]"#;
    let (url, rx) = spawn_one_shot_server("200 OK", body);

    let messages = gateway(&url)
        .list_messages(&session(), &conversation_with_item())
        .await
        .unwrap();

    assert_eq!(rx.recv().unwrap().path, "/api/messages/conversation/12/messages");
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.conversation_id == "12"));
    assert_eq!(messages[0].receiver_id, "1");
    assert_eq!(messages[1].receiver_id, "4");
    assert!(messages[1].is_sent_by("1"));
    assert_eq!(messages[1].item_id.as_deref(), Some("31"));
}

#[tokio::test]
async fn send_message_posts_body_and_decodes_reply() {
    let body = r#"{"id": 40, "content": "is it still there?", "sender": {"id": 1, "username": "ana"},
        "sentAt": "2024-03-02T11:00:00", "isRead": false, "isCurrentUserSender": true}"#;
    let (url, rx) = spawn_one_shot_server("200 OK", body);

    let message = gateway(&url)
        .send_message(
            &session(),
            &SendMessageRequest {
                conversation_id: "12".into(),
                content: "is it still there?".into(),
                item_id: Some("31".into()),
                receiver_id: "4".into(),
            },
        )
        .await
        .unwrap();

    let req = rx.recv().unwrap();
    assert_eq!(req.path, "/api/messages/send");
    let sent: serde_json::Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(
        sent,
        serde_json::json!({"content": "is it still there?", "itemId": 31, "receiverId": 4})
    );
    assert_eq!(message.id, "40");
    assert_eq!(message.conversation_id, "12");
    assert_eq!(message.receiver_id, "4");
}

#[tokio::test]
async fn mark_read_accepts_empty_body() {
    let (url, rx) = spawn_one_shot_server("200 OK", "");
    gateway(&url).mark_read(&session(), "12").await.unwrap();
    let req = rx.recv().unwrap();
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/api/messages/conversation/12/read");
}

#[tokio::test]
async fn conversation_ids_are_escaped_in_paths() {
    let (url, rx) = spawn_scripted_server(vec![
        ScriptedResponse::ok(""),
        ScriptedResponse::ok("[]"),
    ]);
    let gw = gateway(&format!("{url}/"));
    gw.mark_read(&session(), "a/b?c#d").await.unwrap();
    assert_eq!(
        rx.recv().unwrap().path,
        "/api/messages/conversation/a%2Fb%3Fc%23d/read"
    );

    let mut conversation = conversation_with_item();
    conversation.id = "x y".into();
    gw.list_messages(&session(), &conversation).await.unwrap();
    assert_eq!(
        rx.recv().unwrap().path,
        "/api/messages/conversation/x%20y/messages"
    );
}

#[tokio::test]
async fn search_users_passes_query_and_drops_current_user() {
    let body = r#"[{"id": 1, "username": "ana"}, {"id": 7, "username": "anabel"}]"#;
    let (url, rx) = spawn_one_shot_server("200 OK", body);

    let users = gateway(&url).search_users(&session(), "ana").await.unwrap();

    assert_eq!(rx.recv().unwrap().path, "/api/users/search?q=ana");
    assert_eq!(
        users,
        vec![UserRef {
            id: "7".into(),
            display_name: "anabel".into()
        }]
    );
}

#[tokio::test]
async fn status_codes_map_to_gateway_errors() {
    let (url, _rx) = spawn_scripted_server(vec![
        ScriptedResponse::new("401 Unauthorized", ""),
        ScriptedResponse::new("403 Forbidden", ""),
        ScriptedResponse::new("503 Service Unavailable", "down"),
        ScriptedResponse::new("404 Not Found", "no such conversation"),
        ScriptedResponse::ok("{not json"),
    ]);
    let gw = gateway(&url);
    let s = session();

    assert_eq!(
        gw.list_conversations(&s).await.unwrap_err(),
        GatewayError::Unauthorized
    );
    assert_eq!(
        gw.list_conversations(&s).await.unwrap_err(),
        GatewayError::Unauthorized
    );
    assert!(matches!(
        gw.list_conversations(&s).await.unwrap_err(),
        GatewayError::Unavailable(_)
    ));
    assert_eq!(
        gw.mark_read(&s, "99").await.unwrap_err(),
        GatewayError::Rejected {
            status: 404,
            message: "no such conversation".into()
        }
    );
    assert!(matches!(
        gw.list_conversations(&s).await.unwrap_err(),
        GatewayError::Malformed(_)
    ));
}

#[tokio::test]
async fn connection_refused_is_unavailable() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let err = gateway(&format!("http://{addr}"))
        .list_conversations(&session())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(_)));
}
