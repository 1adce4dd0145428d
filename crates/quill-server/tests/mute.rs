//! End-to-end mute behavior: boot the router on a loopback port and drive it
//! over HTTP and the streaming socket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use quill_api::state::AppStateInner;

struct TestServer {
    base: String,
    ws_url: String,
    client: reqwest::Client,
}

struct TestUser {
    id: Uuid,
    token: String,
}

impl TestServer {
    async fn start() -> Self {
        let db = quill_db::Database::open_in_memory().unwrap();
        let state = AppStateInner::new(db, "integration-test-secret".into());
        let app = quill_server::app(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            ws_url: format!("ws://{}/streaming", addr),
            client: reqwest::Client::new(),
        }
    }

    async fn register(&self, username: &str) -> TestUser {
        let resp = self
            .client
            .post(format!("{}/auth/register", self.base))
            .json(&json!({ "username": username, "password": "correct horse" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = resp.json().await.unwrap();
        TestUser {
            id: body["user_id"].as_str().unwrap().parse().unwrap(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    async fn post(&self, user: &TestUser, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base, path))
            .bearer_auth(&user.token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, user: &TestUser, path: &str) -> Value {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .bearer_auth(&user.token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.unwrap()
    }

    async fn mute(&self, muter: &TestUser, mutee: &TestUser) {
        let resp = self
            .post(muter, "/mute/create", json!({ "user_id": mutee.id }))
            .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    async fn note(&self, author: &TestUser, body: Value) -> Uuid {
        let resp = self.post(author, "/notes/create", body).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let note: Value = resp.json().await.unwrap();
        note["id"].as_str().unwrap().parse().unwrap()
    }
}

fn note_ids(list: &Value) -> Vec<Uuid> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().parse().unwrap())
        .collect()
}

/// Next JSON text frame, or `None` if the socket stays quiet for two seconds.
async fn next_event<S>(ws: &mut S) -> Option<Value>
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .ok()??
            .ok()?;
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).ok();
        }
    }
}

#[tokio::test]
async fn mute_create_returns_no_content() {
    let server = TestServer::start().await;
    let alice = server.register("alice").await;
    let carol = server.register("carol").await;

    server.mute(&alice, &carol).await;
    // Repeating is not an error
    server.mute(&alice, &carol).await;

    let list = server.get(&alice, "/mute/list").await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["mutee_username"], "carol");
}

#[tokio::test]
async fn mute_rejects_self_and_unknown_users() {
    let server = TestServer::start().await;
    let alice = server.register("alice").await;

    let resp = server
        .post(&alice, "/mute/create", json!({ "user_id": alice.id }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = server
        .post(&alice, "/mute/create", json!({ "user_id": Uuid::new_v4() }))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mentions_from_muted_user_are_hidden() {
    let server = TestServer::start().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let carol = server.register("carol").await;

    server.mute(&alice, &carol).await;
    let muted = server.note(&carol, json!({ "text": "@alice hi" })).await;
    let visible = server.note(&bob, json!({ "text": "@alice hello" })).await;

    let mentions = note_ids(&server.get(&alice, "/notes/mentions").await);
    assert_eq!(mentions, vec![visible]);
    assert!(!mentions.contains(&muted));
}

#[tokio::test]
async fn muted_mention_leaves_unread_flag_clear() {
    let server = TestServer::start().await;
    let alice = server.register("alice").await;
    let carol = server.register("carol").await;

    server.mute(&alice, &carol).await;
    server.note(&carol, json!({ "text": "@alice hi" })).await;

    let me = server.get(&alice, "/i").await;
    assert_eq!(me["has_unread_mentions"], false);
    assert_eq!(me["has_unread_notifications"], false);
}

#[tokio::test]
async fn muted_mention_is_not_streamed() {
    let server = TestServer::start().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let carol = server.register("carol").await;
    server.mute(&alice, &carol).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(server.ws_url.as_str())
        .await
        .unwrap();
    let identify = json!({ "type": "identify", "body": { "token": alice.token } });
    ws.send(Message::Text(identify.to_string().into())).await.unwrap();
    let connect = json!({ "type": "connect", "body": { "channel": "main" } });
    ws.send(Message::Text(connect.to_string().into())).await.unwrap();

    let mut events: Vec<Value> = Vec::new();

    // Subscription is live once the ack arrives
    loop {
        let event = next_event(&mut ws).await.expect("connected ack");
        if event["type"] == "connected" {
            break;
        }
    }

    let hidden = server.note(&carol, json!({ "text": "@alice psst" })).await;
    let visible = server.note(&bob, json!({ "text": "@alice hey" })).await;

    // Events are pushed in publish order. Bob's note ends with its unread
    // notification, which bounds the window in which carol's would have arrived.
    let mut seen_bobs_mention = false;
    loop {
        let event = next_event(&mut ws).await.expect("events for bob's note");
        if event["type"] == "unreadMention" && event["body"]["note_id"] == json!(visible.to_string()) {
            seen_bobs_mention = true;
        }
        let done = seen_bobs_mention && event["type"] == "unreadNotification";
        events.push(event);
        if done {
            break;
        }
    }

    let carol_id = json!(carol.id.to_string());
    let hidden_id = json!(hidden.to_string());
    for event in &events {
        let body = &event["body"];
        let leaked = body["author_id"] == carol_id
            || body["actor_id"] == carol_id
            || body["id"] == hidden_id
            || body["note_id"] == hidden_id;
        assert!(!leaked, "muted user's event was streamed: {}", event);
    }

    let listed: Vec<Value> = server
        .get(&alice, "/i/notifications")
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].clone())
        .collect();
    assert_eq!(listed.len(), 1);
    for event in &events {
        let streamed_id = match event["type"].as_str() {
            Some("notification") => &event["body"]["id"],
            Some("unreadNotification") => &event["body"]["notification_id"],
            _ => continue,
        };
        assert!(listed.contains(streamed_id), "unlisted notification was streamed: {}", event);
    }

    let count = |kind: &str| events.iter().filter(|e| e["type"] == kind).count();
    assert_eq!(count("mention"), 1);
    assert_eq!(count("unreadMention"), 1);
    assert_eq!(count("notification"), 1);
    assert_eq!(count("unreadNotification"), 1);
}

#[tokio::test]
async fn local_timeline_excludes_muted_author_and_their_renotes() {
    let server = TestServer::start().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let carol = server.register("carol").await;

    server.mute(&alice, &carol).await;
    let carols = server.note(&carol, json!({ "text": "from carol" })).await;
    let bobs = server.note(&bob, json!({ "text": "from bob" })).await;
    let renote = server.note(&bob, json!({ "renote_id": carols })).await;

    let timeline = note_ids(&server.get(&alice, "/notes/local-timeline").await);
    assert_eq!(timeline, vec![bobs]);

    // Bob does not mute anyone and sees everything
    let timeline = note_ids(&server.get(&bob, "/notes/local-timeline").await);
    assert_eq!(timeline, vec![renote, bobs, carols]);
}

#[tokio::test]
async fn reaction_from_muted_user_is_not_notified() {
    let server = TestServer::start().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let carol = server.register("carol").await;

    server.mute(&alice, &carol).await;
    let note = server.note(&alice, json!({ "text": "react to me" })).await;

    for reactor in [&carol, &bob] {
        let resp = server
            .post(reactor, "/notes/reactions/create", json!({ "note_id": note, "reaction": "like" }))
            .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    let notifications = server.get(&alice, "/i/notifications").await;
    let actors: Vec<&str> = notifications
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["actor_id"].as_str().unwrap())
        .collect();
    assert_eq!(actors, vec![bob.id.to_string()]);

    let resp = server
        .post(&alice, "/notifications/mark-all-as-read", json!({}))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let me = server.get(&alice, "/i").await;
    assert_eq!(me["has_unread_notifications"], false);
}

#[tokio::test]
async fn unmute_restores_visibility() {
    let server = TestServer::start().await;
    let alice = server.register("alice").await;
    let carol = server.register("carol").await;

    server.mute(&alice, &carol).await;
    let note = server.note(&carol, json!({ "text": "hello" })).await;
    assert!(note_ids(&server.get(&alice, "/notes/local-timeline").await).is_empty());

    let resp = server
        .post(&alice, "/mute/delete", json!({ "user_id": carol.id }))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(note_ids(&server.get(&alice, "/notes/local-timeline").await), vec![note]);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .get(format!("{}/i", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
