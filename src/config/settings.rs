use std::net::IpAddr;

use serde::Deserialize;

/// Top-level configuration settings for the relay.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub bridge: BridgeSettings,
    pub presence: PresenceSettings,
    pub auth: AuthSettings,
    pub logging: LoggingSettings,
}

/// Client-facing WebSocket listener.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Independent workers, each with its own registry.
    pub workers: usize,
    pub max_connections: usize,
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Backend bridge listener. Meant to be bound to an internal interface.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BridgeSettings {
    pub host: String,
    pub port: u16,
    pub max_frame_bytes: usize,
    /// When non-empty, only these peers may connect.
    pub allowed_peers: Vec<IpAddr>,
}

impl BridgeSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_allowed(&self, peer: IpAddr) -> bool {
        self.allowed_peers.is_empty() || self.allowed_peers.contains(&peer)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PresenceSettings {
    pub path: String,
}

/// Token table for the static authenticator.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct AuthSettings {
    pub tokens: Vec<TokenEntry>,
}

/// One `[[auth.tokens]]` entry. A uid of `0` is an anonymous session.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TokenEntry {
    pub token: String,
    pub uid: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Every value is optional; missing ones are filled from `Settings::default`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub bridge: Option<PartialBridgeSettings>,
    pub presence: Option<PartialPresenceSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub workers: Option<usize>,
    pub max_connections: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBridgeSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_frame_bytes: Option<usize>,
    pub allowed_peers: Option<Vec<IpAddr>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialPresenceSettings {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialAuthSettings {
    pub tokens: Option<Vec<TokenEntry>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                workers: 1,
                max_connections: 1000,
            },
            bridge: BridgeSettings {
                host: "127.0.0.1".to_string(),
                port: 8081,
                max_frame_bytes: 64 * 1024,
                allowed_peers: Vec::new(),
            },
            presence: PresenceSettings {
                path: "relay_presence".to_string(),
            },
            auth: AuthSettings::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Fill the gaps in `partial` with defaults.
    pub fn merge(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let server = partial.server.unwrap_or_default();
        let bridge = partial.bridge.unwrap_or_default();
        let presence = partial.presence.unwrap_or_default();
        let auth = partial.auth.unwrap_or_default();
        let logging = partial.logging.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
                workers: server.workers.unwrap_or(default.server.workers).max(1),
                max_connections: server
                    .max_connections
                    .unwrap_or(default.server.max_connections),
            },
            bridge: BridgeSettings {
                host: bridge.host.unwrap_or(default.bridge.host),
                port: bridge.port.unwrap_or(default.bridge.port),
                max_frame_bytes: bridge
                    .max_frame_bytes
                    .unwrap_or(default.bridge.max_frame_bytes),
                allowed_peers: bridge
                    .allowed_peers
                    .unwrap_or(default.bridge.allowed_peers),
            },
            presence: PresenceSettings {
                path: presence.path.unwrap_or(default.presence.path),
            },
            auth: AuthSettings {
                tokens: auth.tokens.unwrap_or(default.auth.tokens),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(default.logging.level),
            },
        }
    }
}
