//! Authentication boundary
//!
//! The relay never decides on its own who a token belongs to. An
//! `Authenticator` answers that question; the shipped implementation reads a
//! fixed token table from configuration.

use std::collections::HashMap;

use crate::config::AuthSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    User(u64),
    Anonymous,
    Invalid,
}

impl Principal {
    /// Anonymous sessions are valid; only unknown tokens are not.
    pub fn is_valid(&self) -> bool {
        !matches!(self, Principal::Invalid)
    }

    pub fn uid(&self) -> u64 {
        match self {
            Principal::User(uid) => *uid,
            Principal::Anonymous | Principal::Invalid => 0,
        }
    }
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Principal;
}

/// Token table lookup. A uid of `0` marks an anonymous session.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, u64>,
}

impl StaticTokenAuthenticator {
    pub fn new(tokens: HashMap<String, u64>) -> Self {
        Self { tokens }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            settings
                .tokens
                .iter()
                .map(|entry| (entry.token.clone(), entry.uid))
                .collect(),
        )
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Principal {
        match self.tokens.get(token) {
            Some(0) => Principal::Anonymous,
            Some(uid) => Principal::User(*uid),
            None => Principal::Invalid,
        }
    }
}
