//! Built-in handlers
//!
//! - `authenticate`: resolves the sender's token to a principal and marks
//!   known users online.
//! - `userOffline`: marks a user offline on explicit request.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::handler::auth::{Authenticator, Principal};
use crate::handler::registry::{Fields, MessageHandler};
use crate::presence::PresenceStore;
use crate::router::Message;

pub const AUTHENTICATE: &str = "authenticate";
pub const USER_OFFLINE: &str = "userOffline";

pub struct AuthenticateHandler {
    authenticator: Arc<dyn Authenticator>,
    presence: Arc<dyn PresenceStore>,
}

impl AuthenticateHandler {
    pub fn new(authenticator: Arc<dyn Authenticator>, presence: Arc<dyn PresenceStore>) -> Self {
        Self {
            authenticator,
            presence,
        }
    }
}

impl MessageHandler for AuthenticateHandler {
    fn handle(&self, message: &Message) -> Fields {
        let token = message.token().unwrap_or_default();
        let principal = self.authenticator.authenticate(token);

        let mut fields = Fields::new();
        fields.insert("authToken".into(), json!(token));
        fields.insert("clientId".into(), json!(message.client_id().unwrap_or_default()));
        fields.insert("validAuthToken".into(), json!(principal.is_valid()));
        fields.insert("uid".into(), json!(principal.uid()));
        if let Some(content_tokens) = message.fields.get("contentTokens") {
            fields.insert("contentTokens".into(), content_tokens.clone());
        }

        if let Principal::User(uid) = principal {
            match self.presence.set_online(uid) {
                Ok(()) => debug!(uid, "user marked online"),
                Err(e) => warn!(uid, error = %e, "failed to mark user online"),
            }
        }
        fields
    }
}

pub struct UserOfflineHandler {
    presence: Arc<dyn PresenceStore>,
}

impl UserOfflineHandler {
    pub fn new(presence: Arc<dyn PresenceStore>) -> Self {
        Self { presence }
    }
}

enum UidField {
    Missing,
    Invalid,
    Valid(u64),
}

fn parse_uid(value: Option<&Value>) -> UidField {
    match value {
        None | Some(Value::Null) => UidField::Missing,
        Some(Value::String(s)) if s.is_empty() => UidField::Missing,
        Some(Value::String(s)) if s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().map_or(UidField::Invalid, UidField::Valid)
        }
        Some(Value::Number(n)) => n.as_u64().map_or(UidField::Invalid, UidField::Valid),
        Some(_) => UidField::Invalid,
    }
}

fn error(message: impl Into<String>) -> Fields {
    let mut fields = Fields::new();
    fields.insert("error".into(), Value::String(message.into()));
    fields
}

impl MessageHandler for UserOfflineHandler {
    fn handle(&self, message: &Message) -> Fields {
        let uid = match parse_uid(message.fields.get("uid")) {
            UidField::Valid(uid) => uid,
            UidField::Missing => return error("Missing uid for userOffline message."),
            UidField::Invalid => return error("Invalid uid for userOffline message."),
        };

        if let Err(e) = self.presence.set_offline(uid) {
            warn!(uid, error = %e, "failed to mark user offline");
            return error(format!("Failed to set user {uid} offline."));
        }

        let mut fields = Fields::new();
        fields.insert("message".into(), json!(format!("User {uid} set offline.")));
        fields
    }
}
