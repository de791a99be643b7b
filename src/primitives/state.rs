//! Handshake state that outlives a single http request.
//!
//! Between redirecting the user to the provider and receiving the callback, the client must
//! remember what it sent: the unauthorized request token for OAuth 1.0a, the `state` value for
//! OAuth 2.0. A `Client` lives for one request only, so this is kept in a [`StateStore`] supplied
//! by the host, typically backed by its session.
//!
//! Reading the handshake state on callback is destructive and must be atomic. Otherwise two
//! concurrent callbacks could both consume the same request token.
//!
//! [`StateStore`]: trait.StateStore.html
use std::sync::Arc;

use dashmap::DashMap;

use super::codec::{parse_query_string, Params};
use super::token::Token;
use crate::error::{Error, Result};

/// Key-value storage scoped to the current user, for example a session.
pub trait StateStore: Send + Sync {
    /// Store a value, replacing any previous one.
    fn put(&self, key: &str, value: String);

    /// Read a value without removing it.
    fn get(&self, key: &str) -> Option<String>;

    /// Atomically read and remove a value.
    ///
    /// Of several concurrent calls for the same key at most one observes the value.
    fn take_once(&self, key: &str) -> Option<String>;

    /// Remove a value if present.
    fn remove(&self, key: &str) {
        let _ = self.take_once(key);
    }
}

/// A process local store.
///
/// Suitable for tests and for single process hosts that key the store per session themselves.
/// Clones share their contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn put(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn take_once(&self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|(_, value)| value)
    }
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn put(&self, key: &str, value: String) {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn take_once(&self, key: &str) -> Option<String> {
        (**self).take_once(key)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}

/// Compose the storage key of a value belonging to one provider.
///
/// The key combines the protocol, the configured provider name and the name of the value, so
/// that several providers can share one store.
pub fn state_key(protocol: &str, provider: &str, name: &str) -> String {
    format!("{}_{}_{}", protocol, provider, name)
}

/// What a handshake in progress needs to remember.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationState {
    /// The OAuth 1.0a request token awaiting authorization.
    RequestToken(Token),

    /// The OAuth 2.0 `state` value sent with the authorization request.
    Csrf(String),
}

impl AuthorizationState {
    /// Serialize for the store.
    pub fn encode(&self) -> String {
        match self {
            AuthorizationState::RequestToken(token) => {
                format!("kind=request_token&{}", token.to_query_string())
            }
            AuthorizationState::Csrf(state) => Params::new()
                .with("kind", "csrf")
                .with("state", state.as_str())
                .to_query_string(),
        }
    }

    /// Deserialize from the store.
    pub fn decode(encoded: &str) -> Result<Self> {
        let mut params = parse_query_string(encoded);
        match params.remove("kind").as_deref() {
            Some("request_token") => Ok(AuthorizationState::RequestToken(Token::from_params(params)?)),
            Some("csrf") => params
                .remove("state")
                .filter(|state| !state.is_empty())
                .map(AuthorizationState::Csrf)
                .ok_or_else(|| Error::handshake("stored state value is empty")),
            _ => Err(Error::handshake("stored authorization state is malformed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn take_once_consumes() {
        let store = MemoryStore::new();
        store.put("k", "v".into());
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert_eq!(store.take_once("k").as_deref(), Some("v"));
        assert_eq!(store.take_once("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_take_once_has_single_winner() {
        for _ in 0..50 {
            let store = MemoryStore::new();
            store.put("state", "token".into());
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = store.clone();
                    thread::spawn(move || store.take_once("state").is_some())
                })
                .collect();
            let winners = handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
        }
    }

    #[test]
    fn state_round_trip() {
        let request = AuthorizationState::RequestToken(Token::with_secret("rt", "r&s"));
        match AuthorizationState::decode(&request.encode()).unwrap() {
            AuthorizationState::RequestToken(token) => {
                assert_eq!(token.token(), "rt");
                assert_eq!(token.secret(), Some("r&s"));
            }
            other => panic!("unexpected state {:?}", other),
        }

        let csrf = AuthorizationState::Csrf("a b".into());
        assert_eq!(AuthorizationState::decode(&csrf.encode()).unwrap(), csrf);
    }

    #[test]
    fn malformed_state_is_rejected() {
        assert!(AuthorizationState::decode("").is_err());
        assert!(AuthorizationState::decode("kind=other").is_err());
        assert!(AuthorizationState::decode("kind=csrf&state=").is_err());
        assert!(AuthorizationState::decode("kind=request_token").is_err());
    }

    #[test]
    fn keys_are_scoped() {
        assert_eq!(state_key("oauth1", "twitter", "token"), "oauth1_twitter_token");
        assert_ne!(
            state_key("oauth1", "a", "token"),
            state_key("oauth2", "a", "token")
        );
    }
}
