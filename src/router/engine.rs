//! Fan-out engine
//!
//! Routing rules, applied to every decoded message:
//! - no `Type`: dropped
//! - `ClientId` from a client: binds the sender to `AuthToken`, nothing is sent
//! - routed message whose token group has live members: sent to every
//!   token-bearing connection outside that group (backend messages are
//!   re-tagged with each destination's own token)
//! - routed client message whose token group is empty: every group is swept,
//!   dead members are evicted, every other member receives the message
//!
//! Writes are queued on per-connection channels and never wait on a socket.
//! A failed write only affects its own destination.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::connection::{Connection, ConnectionId};
use crate::handler::HandlerRegistry;
use crate::registry::Registry;
use crate::router::message::Message;

/// Reply error when the handlers for a type produced no fields.
pub const NOT_IMPLEMENTED: &str = "Not implemented";

/// Where a message entered the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A client connection on the WebSocket listener.
    Client(ConnectionId),
    /// The trusted backend bridge.
    Backend,
}

/// One frame queued for one destination.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub to: ConnectionId,
    pub frame: WsMessage,
}

#[derive(Clone)]
pub struct Router {
    registry: Arc<Mutex<Registry>>,
    handlers: Arc<HandlerRegistry>,
}

impl Router {
    pub fn new(registry: Arc<Mutex<Registry>>, handlers: Arc<HandlerRegistry>) -> Self {
        Self { registry, handlers }
    }

    pub fn registry(&self) -> &Arc<Mutex<Registry>> {
        &self.registry
    }

    /// Lock the registry. A poisoned lock is recovered: every registry
    /// mutation leaves both indexes usable, and stale entries are pruned.
    pub fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one message and return how many frames were queued.
    ///
    /// The registry lock is released before any handler runs.
    pub fn route(&self, origin: &Origin, message: Message) -> usize {
        let (delivered, reply_to) = {
            let mut registry = self.lock_registry();
            let deliveries = Self::plan(&mut registry, origin, &message);
            let delivered = Self::deliver(&registry, deliveries);

            let reply_to = match origin {
                Origin::Client(id) if self.wants_handlers(&message) => registry.get(id).cloned(),
                _ => None,
            };
            (delivered, reply_to)
        };

        if let Some(source) = reply_to {
            self.reply(&source, message);
        }
        delivered
    }

    /// Decide destinations and payloads for `message`, applying any registry
    /// side effects (token binding, lazy pruning) on the way.
    pub fn plan(registry: &mut Registry, origin: &Origin, message: &Message) -> Vec<Delivery> {
        if !message.has_type() {
            debug!(?origin, "dropping message without Type");
            return Vec::new();
        }

        if message.is_registration() {
            match (origin, message.token()) {
                (Origin::Client(id), Some(token)) => {
                    registry.bind_token(id, token);
                }
                (Origin::Client(id), None) => {
                    debug!(conn = %id, "ClientId without AuthToken ignored");
                }
                (Origin::Backend, _) => {
                    debug!("ClientId frame from backend ignored");
                }
            }
            return Vec::new();
        }

        let token = message.token().unwrap_or_default();
        let group_is_live = !registry.connections_for_token(token).is_empty();

        match origin {
            Origin::Client(_) if group_is_live => broadcast_outside_group(registry, token, message),
            Origin::Client(source) => fallback_sweep(registry, source, message),
            Origin::Backend if group_is_live => retag_outside_group(registry, token, message),
            Origin::Backend => {
                debug!(token, kind = ?message.kind, "backend message for unknown token group dropped");
                Vec::new()
            }
        }
    }

    /// Queue each frame on its destination. Destinations that vanished or
    /// whose writer is gone are skipped.
    pub fn deliver(registry: &Registry, deliveries: Vec<Delivery>) -> usize {
        let mut delivered = 0;
        for Delivery { to, frame } in deliveries {
            match registry.get(&to) {
                Some(connection) => match connection.send(frame) {
                    Ok(()) => delivered += 1,
                    Err(_) => debug!(conn = %to, "destination writer gone, frame dropped"),
                },
                None => debug!(conn = %to, "destination no longer registered"),
            }
        }
        delivered
    }

    fn wants_handlers(&self, message: &Message) -> bool {
        !message.is_registration()
            && message.client_id().is_some()
            && message
                .message_type()
                .is_some_and(|kind| self.handlers.handles(kind))
    }

    fn reply(&self, source: &Connection, message: Message) {
        let Some(mut fields) = self.handlers.dispatch(&message) else {
            return;
        };
        if fields.is_empty() {
            fields.insert("error".into(), Value::String(NOT_IMPLEMENTED.into()));
        }

        let mut reply = message;
        reply.merge(fields);
        match reply.to_frame() {
            Ok(frame) => {
                if source.send(frame).is_err() {
                    debug!(conn = %source.id, "source closed before handler reply");
                }
            }
            Err(e) => warn!(conn = %source.id, error = %e, "failed to encode handler reply"),
        }
    }
}

fn encode(message: &Message) -> Option<WsMessage> {
    match message.to_frame() {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "failed to encode message");
            None
        }
    }
}

/// Token-bearing connections that are not members of `token`'s group.
fn outside_group<'a>(registry: &'a Registry, token: &str) -> impl Iterator<Item = &'a Connection> {
    let group = registry.group(token);
    registry.all_connections().filter(move |connection| {
        connection.token().is_some() && !group.is_some_and(|g| g.contains(&connection.id))
    })
}

fn broadcast_outside_group(registry: &Registry, token: &str, message: &Message) -> Vec<Delivery> {
    let Some(frame) = encode(message) else {
        return Vec::new();
    };
    outside_group(registry, token)
        .map(|connection| Delivery {
            to: connection.id.clone(),
            frame: frame.clone(),
        })
        .collect()
}

fn retag_outside_group(registry: &Registry, token: &str, message: &Message) -> Vec<Delivery> {
    outside_group(registry, token)
        .filter_map(|connection| {
            let own_token = connection.token()?;
            let frame = encode(&message.with_auth_token(own_token))?;
            Some(Delivery {
                to: connection.id.clone(),
                frame,
            })
        })
        .collect()
}

/// Visit every group, evicting dead members before anything is queued for
/// them. Runs in full even when nothing ends up being sent, since it is the
/// only place groups get cleaned.
fn fallback_sweep(registry: &mut Registry, source: &ConnectionId, message: &Message) -> Vec<Delivery> {
    let frame = encode(message);
    let mut deliveries = Vec::new();

    for token in registry.tokens() {
        let evicted = registry.prune_dead_in_group(&token);
        if !evicted.is_empty() {
            debug!(token = %token, evicted = evicted.len(), "fallback sweep pruned group");
        }

        let Some(frame) = &frame else {
            continue;
        };
        deliveries.extend(
            registry
                .connections_for_token(&token)
                .into_iter()
                .filter(|connection| &connection.id != source)
                .map(|connection| Delivery {
                    to: connection.id.clone(),
                    frame: frame.clone(),
                }),
        );
    }
    deliveries
}
