//! The `handler` module is the relay's extension point for message types.
//!
//! Handlers are registered per message type when the process starts. The
//! router calls them for client messages that carry a `ClientId` field, after
//! the message has been fanned out, and sends the merged result back to the
//! sender. Handlers never influence the fan-out itself.

pub mod auth;
pub mod builtin;
pub mod registry;

pub use auth::{Authenticator, Principal, StaticTokenAuthenticator};
pub use builtin::{AUTHENTICATE, AuthenticateHandler, USER_OFFLINE, UserOfflineHandler};
pub use registry::{Fields, HandlerRegistry, MessageHandler};

#[cfg(test)]
mod tests;
