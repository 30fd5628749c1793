//! Message envelope
//!
//! Every frame on either listener is a JSON object. Two keys matter to
//! routing:
//! - `Type`: the message tag. `ClientId` is reserved for token registration.
//! - `AuthToken`: the token the message is associated with.
//!
//! Every other key is carried in `fields` and forwarded untouched, in the
//! order it arrived.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tungstenite::protocol::Message as WsMessage;

/// Tag of the registration message, and the name of the optional field that
/// makes a routed message eligible for handler dispatch.
pub const CLIENT_ID: &str = "ClientId";

const TYPE_KEY: &str = "Type";
const AUTH_TOKEN_KEY: &str = "AuthToken";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Kept as raw JSON so that any value is forwarded as it arrived; only a
    /// non-empty string is matched as a tag.
    #[serde(
        rename = "Type",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<Value>,

    /// Same treatment as `kind`. A token that is not a non-empty string
    /// names no group.
    #[serde(
        rename = "AuthToken",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_token: Option<Value>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A key that is present maps to `Some`, even when its value is `null`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl Message {
    pub fn new(kind: &str, auth_token: &str) -> Self {
        Self {
            kind: Some(Value::String(kind.to_string())),
            auth_token: Some(Value::String(auth_token.to_string())),
            fields: Map::new(),
        }
    }

    /// Builder-style helper for setting an extra field.
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_frame(&self) -> Result<WsMessage, serde_json::Error> {
        self.encode().map(WsMessage::text)
    }

    /// Whether the message carries a `Type` at all. Missing, `null`, `false`,
    /// `0` and empty strings do not count.
    pub fn has_type(&self) -> bool {
        match &self.kind {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64() != Some(0.0),
            Some(_) => true,
        }
    }

    /// The message tag, if it is a non-empty string.
    pub fn message_type(&self) -> Option<&str> {
        non_empty_str(self.kind.as_ref())
    }

    /// The message token, if it is a non-empty string.
    pub fn token(&self) -> Option<&str> {
        non_empty_str(self.auth_token.as_ref())
    }

    /// The application-level client identifier carried in the `ClientId` field.
    pub fn client_id(&self) -> Option<&str> {
        non_empty_str(self.fields.get(CLIENT_ID))
    }

    pub fn is_registration(&self) -> bool {
        self.message_type() == Some(CLIENT_ID)
    }

    /// A copy of this message tagged with another token.
    pub fn with_auth_token(&self, token: &str) -> Self {
        Self {
            kind: self.kind.clone(),
            auth_token: Some(Value::String(token.to_string())),
            fields: self.fields.clone(),
        }
    }

    /// Lay `extra` over this message. Later keys win; `Type` and `AuthToken`
    /// update the envelope instead of landing in `fields`.
    pub fn merge(&mut self, extra: Map<String, Value>) {
        for (key, value) in extra {
            match key.as_str() {
                TYPE_KEY => self.kind = Some(value),
                AUTH_TOKEN_KEY => self.auth_token = Some(value),
                _ => {
                    self.fields.insert(key, value);
                }
            }
        }
    }
}
