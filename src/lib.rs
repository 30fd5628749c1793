//! # TokenRelay
//!
//! `tokenrelay` is an in-memory, real-time message relay. Browser clients
//! connect over WebSocket and register under an auth token; every client
//! registered under the same token forms a token group. Messages are fanned
//! out to the connections *outside* the sender's group, and trusted backend
//! services can inject events over a newline-delimited JSON bridge.
//!
//! ## Core Modules
//!
//! - `connection`: one accepted client socket, its token and its status.
//! - `registry`: connection index and token groups, one per worker.
//! - `router`: message envelope and the fan-out rules.
//! - `handler`: per-type message handlers that reply to the sender.
//! - `presence`: online/offline records for authenticated users.
//! - `worker`: independent registries and round-robin assignment.
//! - `transport`: the WebSocket listener and the backend bridge.
//! - `config`: settings from a TOML file and the environment.
//! - `utils`: error type and logging setup.

pub mod config;
pub mod connection;
pub mod handler;
pub mod presence;
pub mod registry;
pub mod router;
pub mod transport;
pub mod utils;
pub mod worker;
