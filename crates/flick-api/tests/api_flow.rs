use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use flick_api::router;
use flick_api::state::AppStateInner;
use flick_api::token::{TokenService, TokenSettings};
use flick_crypto::MessageCipher;
use flick_db::Database;

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();
    let tokens = TokenService::new(TokenSettings {
        secret: vec![3u8; 64],
        issuer: "api.getflick.chat".into(),
        audience: "api.getflick.chat".into(),
        ttl: chrono::Duration::hours(1),
    });
    let cipher = MessageCipher::new(&[5u8; 32]).unwrap();
    router::build(AppStateInner::new(db, tokens, cipher, Duration::from_secs(5)))
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

/// Registers `name` and returns (token, user_id).
async fn register(app: &Router, name: &str, password: &str) -> (String, i64) {
    let (status, body) = call(
        app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "display_name": name,
            "password": password,
            "first_name": format!("{name}-first"),
            "last_name": format!("{name}-last"),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["user_id"].as_i64().unwrap(),
    )
}

async fn befriend(app: &Router, a: (&str, &str), b: (&str, &str)) {
    let (status, body) = call(
        app,
        Method::POST,
        "/v1/friends/requests/send",
        Some(a.1),
        Some(json!({ "display_name": b.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let request_id = body["request_id"].as_i64().unwrap();

    let (status, _) = call(
        app,
        Method::POST,
        &format!("/v1/friends/requests/{request_id}/accept"),
        Some(b.1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn friends_chat_and_message_round_trip() {
    let app = app();
    let (alice, alice_id) = register(&app, "alice", "secret1").await;
    let (bob, bob_id) = register(&app, "bob", "secret2").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/friends/requests/send",
        Some(&alice),
        Some(json!({ "display_name": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sender_id"], alice_id);
    assert_eq!(body["receiver_id"], bob_id);
    let request_id = body["request_id"].as_i64().unwrap();

    let (status, body) = call(&app, Method::GET, "/v1/friends/requests/received", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requests"][0]["user_id"], alice_id);
    assert_eq!(body["requests"][0]["display_name"], "alice");

    let (status, body) = call(&app, Method::GET, "/v1/friends/requests/sent", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requests"][0]["user_id"], bob_id);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/v1/friends/requests/{request_id}/accept"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["friend_id"], alice_id);

    for (token, friend_id) in [(&alice, bob_id), (&bob, alice_id)] {
        let (status, body) = call(&app, Method::GET, "/v1/friends", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        let friends = body.as_array().unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0]["user_id"], friend_id);
        assert!(friends[0]["friendship_ts"].is_string());
    }

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/chats",
        Some(&alice),
        Some(json!({ "participant_id": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let chat_id = body["chat_id"].as_i64().unwrap();
    assert_eq!(chat_id, 1);

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/chats",
        Some(&bob),
        Some(json!({ "participant_id": alice_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chat_id"], chat_id);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/v1/chats/{chat_id}/messages"),
        Some(&alice),
        Some(json!({ "content": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let message_id = body.as_i64().unwrap();

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/v1/chats/{chat_id}/messages"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "hi");
    assert_eq!(messages[0]["sender_id"], alice_id);
    assert_eq!(messages[0]["message_id"], message_id);

    let (status, body) = call(&app, Method::GET, "/v1/chats", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let chat = &body["chats"][0];
    assert_eq!(chat["chat_id"], chat_id);
    assert_eq!(chat["last_message"]["message_id"], message_id);
    assert!(chat["last_message"].get("content").is_none());
    assert_eq!(chat["participants"].as_array().unwrap().len(), 2);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/v1/chats/{chat_id}/read"),
        Some(&bob),
        Some(json!({ "message_id": message_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/v1/chats/{chat_id}/typing/true"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = call(&app, Method::GET, "/v1/chats", Some(&alice), None).await;
    let participants = body["chats"][0]["participants"].as_array().unwrap();
    let alice_row = participants.iter().find(|p| p["user_id"] == alice_id).unwrap();
    let bob_row = participants.iter().find(|p| p["user_id"] == bob_id).unwrap();
    assert_eq!(alice_row["is_typing"], true);
    assert_eq!(bob_row["last_read_message_id"], message_id);
}

#[tokio::test]
async fn messages_page_newest_first() {
    let app = app();
    let (alice, _) = register(&app, "alice", "secret1").await;
    let (bob, bob_id) = register(&app, "bob", "secret2").await;
    befriend(&app, ("alice", alice.as_str()), ("bob", bob.as_str())).await;

    let (_, body) = call(&app, Method::POST, "/v1/chats", Some(&alice), Some(json!({ "participant_id": bob_id }))).await;
    let chat_id = body["chat_id"].as_i64().unwrap();

    for text in ["one", "two", "three"] {
        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/v1/chats/{chat_id}/messages"),
            Some(&alice),
            Some(json!({ "content": text })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = call(
        &app,
        Method::GET,
        &format!("/v1/chats/{chat_id}/messages?limit=2"),
        Some(&bob),
        None,
    )
    .await;
    let page: Vec<&str> = body.as_array().unwrap().iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(page, vec!["three", "two"]);

    let oldest_seen = body[1]["message_id"].as_i64().unwrap();
    let (_, body) = call(
        &app,
        Method::GET,
        &format!("/v1/chats/{chat_id}/messages?before={oldest_seen}"),
        Some(&bob),
        None,
    )
    .await;
    let page: Vec<&str> = body.as_array().unwrap().iter().map(|m| m["content"].as_str().unwrap()).collect();
    assert_eq!(page, vec!["one"]);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/v1/friends", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = call(&app, Method::GET, "/v1/chats", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = TokenService::new(TokenSettings {
        secret: vec![4u8; 64],
        issuer: "api.getflick.chat".into(),
        audience: "api.getflick.chat".into(),
        ttl: chrono::Duration::hours(1),
    });
    let forged = foreign
        .issue(&flick_api::token::TokenSubject {
            user_id: 1,
            first_name: "x",
            last_name: "y",
            pfp_url: None,
        })
        .unwrap();
    let (status, _) = call(&app, Method::GET, "/v1/chats", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_and_login_errors() {
    let app = app();
    let (_, alice_id) = register(&app, "alice", "secret1").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({ "display_name": "alice", "password": "x", "first_name": "A", "last_name": "B" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({ "display_name": "has space", "password": "x", "first_name": "A", "last_name": "B" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({ "display_name": "carol", "password": "x", "first_name": "A", "last_name": "B", "admin": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "display_name": "alice", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], alice_id);
    assert_eq!(
        body["pfp_url"],
        "https://api.dicebear.com/7.x/notionists-neutral/png?seed=alice"
    );

    for body in [
        json!({ "display_name": "", "password": "secret1" }),
        json!({ "display_name": "   ", "password": "secret1" }),
        json!({ "display_name": "alice", "password": "" }),
    ] {
        let (status, _) = call(&app, Method::POST, "/v1/auth/login", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (wrong_pw_status, wrong_pw_body) = call(
        &app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "display_name": "alice", "password": "nope" })),
    )
    .await;
    let (unknown_status, unknown_body) = call(
        &app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "display_name": "nobody", "password": "nope" })),
    )
    .await;
    assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw_body, unknown_body);
}

#[tokio::test]
async fn social_graph_rules() {
    let app = app();
    let (alice, _) = register(&app, "alice", "secret1").await;
    let (bob, bob_id) = register(&app, "bob", "secret2").await;
    let (carol, _) = register(&app, "carol", "secret3").await;

    let send = |token: String, to: &'static str| {
        let app = app.clone();
        async move {
            call(
                &app,
                Method::POST,
                "/v1/friends/requests/send",
                Some(&token),
                Some(json!({ "display_name": to })),
            )
            .await
        }
    };

    let (status, _) = send(alice.clone(), "alice").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(alice.clone(), "nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(alice.clone(), "bob").await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id = body["request_id"].as_i64().unwrap();
    let (status, _) = send(alice.clone(), "bob").await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Only the receiver may accept; outsiders may not delete.
    let accept = format!("/v1/friends/requests/{request_id}/accept");
    let (status, _) = call(&app, Method::POST, &accept, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let delete = format!("/v1/friends/requests/{request_id}/delete");
    let (status, _) = call(&app, Method::POST, &delete, Some(&carol), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&app, Method::POST, "/v1/chats", Some(&alice), Some(json!({ "participant_id": bob_id }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::POST, &delete, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request_id"], request_id);
    let (status, _) = call(&app, Method::POST, &accept, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::POST, "/v1/friends/requests/abc/accept", Some(&bob), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn outsiders_cannot_touch_a_chat() {
    let app = app();
    let (alice, _) = register(&app, "alice", "secret1").await;
    let (bob, bob_id) = register(&app, "bob", "secret2").await;
    let (carol, _) = register(&app, "carol", "secret3").await;
    befriend(&app, ("alice", alice.as_str()), ("bob", bob.as_str())).await;

    let (_, body) = call(&app, Method::POST, "/v1/chats", Some(&alice), Some(json!({ "participant_id": bob_id }))).await;
    let chat_id = body["chat_id"].as_i64().unwrap();
    let (_, body) = call(
        &app,
        Method::POST,
        &format!("/v1/chats/{chat_id}/messages"),
        Some(&alice),
        Some(json!({ "content": "secret" })),
    )
    .await;
    let message_id = body.as_i64().unwrap();

    let messages = format!("/v1/chats/{chat_id}/messages");
    let (status, _) = call(&app, Method::GET, &messages, Some(&carol), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::POST, &messages, Some(&carol), Some(json!({ "content": "x" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/v1/chats/{chat_id}/read"),
        Some(&carol),
        Some(json!({ "message_id": message_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, Method::POST, &format!("/v1/chats/{chat_id}/typing/1"), Some(&carol), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = call(&app, Method::GET, "/v1/chats", Some(&carol), None).await;
    assert!(body["chats"].as_array().unwrap().is_empty());

    let (status, _) = call(&app, Method::POST, &messages, Some(&alice), Some(json!({ "content": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(
        &app,
        Method::POST,
        &messages,
        Some(&alice),
        Some(json!({ "content": "x".repeat(4001) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_management() {
    let app = app();
    let (alice, alice_id) = register(&app, "alice", "secret1").await;
    register(&app, "bob", "secret2").await;

    let (status, body) = call(&app, Method::GET, "/v1/users/profile", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], alice_id);
    assert_eq!(body["first_name"], "alice-first");

    let (status, body) = call(
        &app,
        Method::PUT,
        "/v1/users/pfp",
        Some(&alice),
        Some(json!({ "profile_picture_url": "https://cdn.example.test/a.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pfp_url"], "https://cdn.example.test/a.png");

    let (status, _) = call(
        &app,
        Method::PUT,
        "/v1/users/display-name",
        Some(&alice),
        Some(json!({ "display_name": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &app,
        Method::PUT,
        "/v1/users/display-name",
        Some(&alice),
        Some(json!({ "display_name": "alicia" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "alicia");

    let (status, body) = call(&app, Method::PUT, "/v1/users/pfp/delete", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["pfp_url"],
        "https://api.dicebear.com/7.x/notionists-neutral/png?seed=alicia"
    );

    let (status, _) = call(
        &app,
        Method::PUT,
        "/v1/users/password",
        Some(&alice),
        Some(json!({ "current_password": "wrong", "new_password": "fresh" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        Method::PUT,
        "/v1/users/password",
        Some(&alice),
        Some(json!({ "current_password": "secret1", "new_password": "fresh" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/auth/login",
        None,
        Some(json!({ "display_name": "alicia", "password": "fresh" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
