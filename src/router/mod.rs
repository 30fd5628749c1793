//! The `router` module decides where each inbound message goes.
//!
//! Both listeners hand decoded messages to a `Router` together with their
//! `Origin`. The router consults and updates the worker's registry, queues
//! the resulting frames on the destination connections and, for client
//! messages that ask for it, runs the registered message handlers.

pub mod engine;
pub mod message;

pub use engine::{Delivery, NOT_IMPLEMENTED, Origin, Router};
pub use message::{CLIENT_ID, Message};
