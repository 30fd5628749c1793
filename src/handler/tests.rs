use super::{
    AUTHENTICATE, Authenticator, Fields, HandlerRegistry, Principal, StaticTokenAuthenticator,
    USER_OFFLINE,
};
use crate::config::{AuthSettings, TokenEntry};
use crate::presence::{PresenceStore, SledPresenceStore};
use crate::router::{CLIENT_ID, Message};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};

fn authenticator() -> StaticTokenAuthenticator {
    StaticTokenAuthenticator::new(HashMap::from([
        ("alice-token".to_string(), 17),
        ("guest-token".to_string(), 0),
    ]))
}

fn builtins() -> (HandlerRegistry, Arc<SledPresenceStore>, TempDir) {
    let dir = tempdir().unwrap();
    let presence = Arc::new(SledPresenceStore::open(dir.path()).unwrap());
    let handlers = HandlerRegistry::with_builtins(Arc::new(authenticator()), presence.clone());
    (handlers, presence, dir)
}

fn field(key: &str, value: serde_json::Value) -> Fields {
    let mut fields = Fields::new();
    fields.insert(key.into(), value);
    fields
}

#[test]
fn test_dispatch_without_handler_is_none() {
    let handlers = HandlerRegistry::new();
    assert!(!handlers.handles("chat"));
    assert!(handlers.dispatch(&Message::new("chat", "T1")).is_none());
    assert!(handlers.dispatch(&Message::default()).is_none());
}

#[test]
fn test_dispatch_merges_and_later_handler_wins() {
    let mut handlers = HandlerRegistry::new();
    handlers
        .register("ping", |_: &Message| {
            let mut fields = field("shared", json!("first"));
            fields.insert("only_first".into(), json!(1));
            fields
        })
        .register("ping", |_: &Message| field("shared", json!("second")));

    let merged = handlers.dispatch(&Message::new("ping", "T1")).unwrap();

    assert_eq!(merged["shared"], "second");
    assert_eq!(merged["only_first"], 1);
    assert_eq!(merged.len(), 2);
}

#[test]
fn test_static_authenticator_principals() {
    let auth = authenticator();
    assert_eq!(auth.authenticate("alice-token"), Principal::User(17));
    assert_eq!(auth.authenticate("guest-token"), Principal::Anonymous);
    assert_eq!(auth.authenticate("stolen"), Principal::Invalid);

    assert!(Principal::Anonymous.is_valid());
    assert!(!Principal::Invalid.is_valid());
    assert_eq!(Principal::Invalid.uid(), 0);
}

#[test]
fn test_static_authenticator_from_settings() {
    let settings = AuthSettings {
        tokens: vec![TokenEntry {
            token: "svc".into(),
            uid: 9,
        }],
    };
    let auth = StaticTokenAuthenticator::from_settings(&settings);
    assert_eq!(auth.authenticate("svc"), Principal::User(9));
    assert_eq!(auth.authenticate("other"), Principal::Invalid);
}

#[test]
fn test_authenticate_known_user_goes_online() {
    let (handlers, presence, _dir) = builtins();
    let message = Message::new(AUTHENTICATE, "alice-token")
        .with_field(CLIENT_ID, "tab-1")
        .with_field("contentTokens", json!(["c1", "c2"]));

    let reply = handlers.dispatch(&message).unwrap();

    assert_eq!(reply["authToken"], "alice-token");
    assert_eq!(reply["clientId"], "tab-1");
    assert_eq!(reply["validAuthToken"], true);
    assert_eq!(reply["uid"], 17);
    assert_eq!(reply["contentTokens"], json!(["c1", "c2"]));
    assert!(presence.is_online(17).unwrap());
}

#[test]
fn test_authenticate_anonymous_is_valid_but_not_online() {
    let (handlers, presence, _dir) = builtins();
    let message = Message::new(AUTHENTICATE, "guest-token").with_field(CLIENT_ID, "tab-2");

    let reply = handlers.dispatch(&message).unwrap();

    assert_eq!(reply["validAuthToken"], true);
    assert_eq!(reply["uid"], 0);
    assert!(!reply.contains_key("contentTokens"));
    assert!(presence.online_users().unwrap().is_empty());
}

#[test]
fn test_authenticate_unknown_token_is_invalid() {
    let (handlers, presence, _dir) = builtins();
    let message = Message::new(AUTHENTICATE, "stolen").with_field(CLIENT_ID, "tab-3");

    let reply = handlers.dispatch(&message).unwrap();

    assert_eq!(reply["validAuthToken"], false);
    assert_eq!(reply["uid"], 0);
    assert!(presence.online_users().unwrap().is_empty());
}

#[test]
fn test_user_offline_accepts_number_and_digit_string() {
    let (handlers, presence, _dir) = builtins();
    presence.set_online(17).unwrap();
    presence.set_online(18).unwrap();

    let by_number = Message::new(USER_OFFLINE, "T1").with_field("uid", 17);
    let reply = handlers.dispatch(&by_number).unwrap();
    assert_eq!(reply["message"], "User 17 set offline.");

    let by_string = Message::new(USER_OFFLINE, "T1").with_field("uid", "18");
    let reply = handlers.dispatch(&by_string).unwrap();
    assert_eq!(reply["message"], "User 18 set offline.");

    assert!(presence.online_users().unwrap().is_empty());
}

#[test]
fn test_user_offline_missing_uid() {
    let (handlers, _presence, _dir) = builtins();
    for message in [
        Message::new(USER_OFFLINE, "T1"),
        Message::new(USER_OFFLINE, "T1").with_field("uid", ""),
        Message::new(USER_OFFLINE, "T1").with_field("uid", json!(null)),
    ] {
        let reply = handlers.dispatch(&message).unwrap();
        assert_eq!(reply["error"], "Missing uid for userOffline message.");
    }
}

#[test]
fn test_user_offline_invalid_uid() {
    let (handlers, _presence, _dir) = builtins();
    for uid in [json!("abc"), json!(-3), json!(1.5), json!({"id": 1})] {
        let message = Message::new(USER_OFFLINE, "T1").with_field("uid", uid);
        let reply = handlers.dispatch(&message).unwrap();
        assert_eq!(reply["error"], "Invalid uid for userOffline message.");
    }
}
