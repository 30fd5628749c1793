use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::handler::auth::Authenticator;
use crate::handler::builtin::{AUTHENTICATE, AuthenticateHandler, USER_OFFLINE, UserOfflineHandler};
use crate::presence::PresenceStore;
use crate::router::Message;

/// Fields a handler wants merged into the reply.
pub type Fields = Map<String, Value>;

/// Something that can look at a message and contribute reply fields.
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: &Message) -> Fields;
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) -> Fields + Send + Sync,
{
    fn handle(&self, message: &Message) -> Fields {
        self(message)
    }
}

/// Message type -> handlers, in registration order.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Vec<Arc<dyn MessageHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `authenticate` and `userOffline` handlers installed.
    pub fn with_builtins(
        authenticator: Arc<dyn Authenticator>,
        presence: Arc<dyn PresenceStore>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(
            AUTHENTICATE,
            AuthenticateHandler::new(authenticator, presence.clone()),
        );
        registry.register(USER_OFFLINE, UserOfflineHandler::new(presence));
        registry
    }

    pub fn register(
        &mut self,
        message_type: &str,
        handler: impl MessageHandler + 'static,
    ) -> &mut Self {
        self.handlers
            .entry(message_type.to_string())
            .or_default()
            .push(Arc::new(handler));
        self
    }

    pub fn handles(&self, message_type: &str) -> bool {
        self.handlers
            .get(message_type)
            .is_some_and(|handlers| !handlers.is_empty())
    }

    /// Run every handler registered for the message's type and merge their
    /// fields; on a key collision the later handler wins. `None` when no
    /// handler is registered for the type.
    pub fn dispatch(&self, message: &Message) -> Option<Fields> {
        let handlers = self.handlers.get(message.message_type()?)?;
        let mut merged = Fields::new();
        for handler in handlers {
            merged.extend(handler.handle(message));
        }
        Some(merged)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("HandlerRegistry")
            .field("types", &types)
            .finish()
    }
}
