//! The protocol independent client.
//!
//! A [`Client`] is constructed per incoming request of the host application. It is the only
//! thing a request handler needs to talk to: it starts the authorization, consumes the callback,
//! and performs api calls with the obtained credentials. Everything that must survive between
//! requests lives in the injected [`StateStore`]:
//!
//! ```text
//! Unauthenticated --authorize_url--> AuthorizationRequested
//!     --handle_callback--> Authenticated --(expiry)--> Expired --refresh--> Authenticated
//! ```
//!
//! Entering `AuthorizationRequested` writes the handshake state, the callback takes it out
//! again. A callback without a matching state is rejected.
//!
//! [`Client`]: struct.Client.html
//! [`StateStore`]: ../primitives/state/trait.StateStore.html
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::{ClientConfig, OAuth1Config, OAuth2Config, SignatureMethodConfig, TokenConfig};
use crate::error::{Error, Result};
use crate::primitives::codec::{parse_query_string, Params};
use crate::primitives::deferred::Deferred;
use crate::primitives::signature::SignatureMethod;
use crate::primitives::state::{state_key, AuthorizationState, StateStore};
use crate::primitives::token::Token;
use crate::protocol::{OAuth1, OAuth2, Protocol};
use crate::transport::{HttpResponse, Method, Transport};

pub mod content;

use self::content::Decoded;

/// Store key of the handshake state.
const AUTHORIZATION_KEY: &str = "authorization";

/// Store key of the access token.
const TOKEN_KEY: &str = "token";

/// An OAuth 1.0a client.
pub type Client1 = Client<OAuth1>;

/// An OAuth 2.0 client.
pub type Client2 = Client<OAuth2>;

/// Obtains and uses credentials of one provider.
pub struct Client<P: Protocol> {
    protocol: P,
    transport: Arc<dyn Transport>,
    store: Arc<dyn StateStore>,
    access_token: Option<Deferred<TokenConfig>>,
}

impl<P: Protocol> Client<P> {
    /// A client with its collaborators.
    pub fn new<T, S>(protocol: P, transport: T, store: S) -> Self
    where
        T: Transport + 'static,
        S: StateStore + 'static,
    {
        Client::with_shared(protocol, Arc::new(transport), Arc::new(store))
    }

    /// A client using shared collaborators.
    pub fn with_shared(
        protocol: P, transport: Arc<dyn Transport>, store: Arc<dyn StateStore>,
    ) -> Self {
        Client {
            protocol,
            transport,
            store,
            access_token: None,
        }
    }

    /// The protocol half.
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// The protocol half, mutably.
    pub fn protocol_mut(&mut self) -> &mut P {
        &mut self.protocol
    }

    /// The shared settings.
    pub fn config(&self) -> &ClientConfig {
        self.protocol.client_config()
    }

    /// Replace the access token, either by a token or by its configuration.
    ///
    /// A configuration is only turned into a token when it is first needed. The store is not
    /// modified.
    pub fn set_access_token<T>(&mut self, token: T)
    where
        T: Into<Deferred<TokenConfig>>,
    {
        self.access_token = Some(token.into());
    }

    /// The current access token.
    ///
    /// Resolves a configured token and, if none was set, restores one persisted by an earlier
    /// request. `None` when there is no token at all.
    pub fn access_token(&mut self) -> Result<Option<Token>> {
        if self.access_token.is_none() {
            self.access_token = self.restore_token()?.map(Deferred::Ready);
        }

        match self.access_token.as_mut() {
            Some(deferred) => Ok(Some(deferred.get()?.clone())),
            None => Ok(None),
        }
    }

    /// Forget the access token, also in the store.
    pub fn clear_access_token(&mut self) {
        self.access_token = None;
        let key = self.key(TOKEN_KEY);
        self.store.remove(&key);
    }

    /// Start the handshake and return the url to redirect the user to.
    ///
    /// The handshake state is written to the store, replacing any handshake in progress.
    pub fn authorize_url(&mut self) -> Result<String> {
        let (url, state) = self.protocol.start_authorization(&*self.transport)?;
        let key = self.key(AUTHORIZATION_KEY);
        self.store.put(&key, state.encode());
        info!(provider = %self.config().name, "authorization requested");
        Ok(url)
    }

    /// Complete the handshake with the query string of the callback request.
    pub fn handle_callback_query(&mut self, query: &str) -> Result<Token> {
        self.handle_callback(&parse_query_string(query))
    }

    /// Complete the handshake with the parameters of the callback request.
    ///
    /// Takes the handshake state out of the store, so a callback can be processed only once.
    /// The issued access token becomes the current one and is persisted.
    pub fn handle_callback(&mut self, callback: &Params) -> Result<Token> {
        let key = self.key(AUTHORIZATION_KEY);
        let stored = match self.store.take_once(&key) {
            Some(stored) => stored,
            None => {
                warn!(provider = %self.config().name, "callback without authorization in progress");
                return Err(Error::handshake("no authorization in progress"));
            }
        };
        let state = AuthorizationState::decode(&stored)?;

        let token = self.protocol.exchange_token(&*self.transport, state, callback)?;
        info!(provider = %self.config().name, "callback accepted");
        self.install_token(token.clone());
        Ok(token)
    }

    /// Replace the current access token by a refreshed one.
    pub fn refresh_access_token(&mut self) -> Result<Token> {
        let token = self.access_token()?.ok_or(Error::InvalidToken)?;
        let refreshed = self.protocol.refresh_token(&*self.transport, &token)?;
        self.install_token(refreshed.clone());
        Ok(refreshed)
    }

    /// Resolve an api url against the configured base.
    ///
    /// Urls starting with `http://` or `https://` are used as they are. Others are joined to the
    /// base url with exactly one `/`.
    pub fn api_url(&self, sub_url: &str) -> String {
        if is_absolute(sub_url) {
            return sub_url.to_string();
        }

        let base = self.config().api_base_url.trim_end_matches('/');
        let path = sub_url.trim_start_matches('/');
        match (base.is_empty(), path.is_empty()) {
            (true, _) => sub_url.to_string(),
            (false, true) => base.to_string(),
            (false, false) => format!("{}/{}", base, path),
        }
    }

    /// Call the provider api with the current access token.
    ///
    /// An expired token is refreshed first, if `auto_refresh` is set and the protocol supports
    /// it. When the provider answers `401` and the token can be refreshed, the token is refreshed
    /// and the call repeated once. Replies outside of `2xx` are errors, the body of successful
    /// replies is decoded by its content type.
    #[instrument(level = "debug", skip(self, params))]
    pub fn api(&mut self, sub_url: &str, method: Method, params: Params) -> Result<Decoded> {
        let url = self.api_url(sub_url);
        let mut token = self
            .access_token()?
            .filter(|token| !token.token().is_empty())
            .ok_or(Error::InvalidToken)?;

        let mut refreshed = false;
        if token.is_expired() {
            if !self.can_refresh(&token) {
                return Err(Error::TokenExpired);
            }
            debug!("access token expired, refreshing");
            token = self.refresh_access_token()?;
            refreshed = true;
        }

        let mut response = self.dispatch(method, &url, params.clone(), &token)?;
        if response.status == 401 && !refreshed && self.can_refresh(&token) {
            info!(provider = %self.config().name, "access token rejected, refreshing");
            token = self.refresh_access_token()?;
            response = self.dispatch(method, &url, params, &token)?;
        }

        if !response.is_success() {
            warn!(status = response.status, %url, "api call failed");
            return Err(Error::Status {
                status: response.status,
                url,
                body: response.text(),
            });
        }

        Ok(Decoded::from_response(&response))
    }

    fn can_refresh(&self, token: &Token) -> bool {
        self.config().auto_refresh && self.protocol.can_refresh(token)
    }

    fn dispatch(
        &mut self, method: Method, url: &str, params: Params, token: &Token,
    ) -> Result<HttpResponse> {
        let request = self.protocol.authorize_request(method, url, params, token)?;
        debug!(method = %request.method, url = %request.url, "api request");
        let response = self.transport.send(request)?;
        debug!(status = response.status, "api response");
        Ok(response)
    }

    fn install_token(&mut self, token: Token) {
        let key = self.key(TOKEN_KEY);
        self.store.put(&key, token.to_query_string());
        self.access_token = Some(Deferred::Ready(token));
    }

    fn restore_token(&self) -> Result<Option<Token>> {
        let key = self.key(TOKEN_KEY);
        match self.store.get(&key) {
            Some(stored) => {
                debug!(provider = %self.config().name, "restoring persisted access token");
                Ok(Some(Token::from_query_string(&stored)?))
            }
            None => Ok(None),
        }
    }

    fn key(&self, name: &str) -> String {
        state_key(self.protocol.name(), &self.config().name, name)
    }
}

impl Client<OAuth1> {
    /// An OAuth 1.0a client for the configuration.
    pub fn oauth1<T, S>(config: OAuth1Config, transport: T, store: S) -> Self
    where
        T: Transport + 'static,
        S: StateStore + 'static,
    {
        Client::new(OAuth1::new(config), transport, store)
    }

    /// Replace the signature method, either by an instance or by its configuration.
    pub fn set_signature_method<M>(&mut self, method: M)
    where
        M: Into<Deferred<SignatureMethodConfig>>,
    {
        self.protocol.set_signature_method(method)
    }

    /// The signature method, constructing it if necessary.
    pub fn signature_method(&mut self) -> Result<Arc<dyn SignatureMethod>> {
        self.protocol.signature_method()
    }

    /// Sign parameters of a request with the current access token.
    pub fn sign_request(&mut self, method: Method, url: &str, params: Params) -> Result<Params> {
        let token = self.access_token()?;
        self.protocol.sign_request(method, url, params, token.as_ref())
    }
}

impl Client<OAuth2> {
    /// An OAuth 2.0 client for the configuration.
    pub fn oauth2<T, S>(config: OAuth2Config, transport: T, store: S) -> Self
    where
        T: Transport + 'static,
        S: StateStore + 'static,
    {
        Client::new(OAuth2::new(config), transport, store)
    }
}

fn is_absolute(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BearerPlacement;
    use crate::primitives::state::MemoryStore;
    use crate::transport::MemoryTransport;

    fn client(base: &str) -> Client2 {
        let config = OAuth2Config {
            client: ClientConfig {
                name: "example".into(),
                api_base_url: base.into(),
                return_url: None,
                auto_refresh: true,
            },
            client_id: "cid".into(),
            client_secret: "secret".into(),
            authorize_url: "http://auth".into(),
            token_url: "http://token".into(),
            scope: None,
            bearer: BearerPlacement::Query,
        };
        Client::oauth2(config, MemoryTransport::new(), MemoryStore::new())
    }

    #[test]
    fn api_url_joins_with_single_slash() {
        assert_eq!(client("http://api/v1").api_url("me"), "http://api/v1/me");
        assert_eq!(client("http://api/v1/").api_url("/me"), "http://api/v1/me");
        assert_eq!(client("http://api/v1/").api_url("me"), "http://api/v1/me");
        assert_eq!(client("http://api/v1").api_url("/me"), "http://api/v1/me");
        assert_eq!(client("http://api").api_url("https://other/x"), "https://other/x");
        assert_eq!(client("http://api").api_url("HTTP://other/x"), "HTTP://other/x");
        assert_eq!(client("").api_url("me"), "me");
        assert_eq!(client("http://api/").api_url("//me"), "http://api/me");
        assert_eq!(client("http://api//").api_url("me/"), "http://api/me/");
        assert_eq!(client("http://api/").api_url("/"), "http://api");
    }

    #[test]
    fn api_without_token_fails() {
        let mut client = client("http://api");
        assert!(matches!(
            client.api("me", Method::Get, Params::new()),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn token_configuration_resolves_on_use() {
        let mut client = client("http://api");
        client.set_access_token(TokenConfig {
            token: "t".into(),
            ..TokenConfig::default()
        });
        assert_eq!(client.access_token().unwrap().unwrap().token(), "t");

        client.set_access_token(TokenConfig::default());
        assert!(client.access_token().is_err());
    }
}
