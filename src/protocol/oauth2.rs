//! OAuth 2.0 authorization code grant as described in [RFC 6749][rfc].
//!
//! The user is sent to the authorization endpoint with a random `state` and returns with a code,
//! which is exchanged for a bearer token at the token endpoint. Bearer tokens are not signed,
//! they are attached to each api call as the `access_token` parameter or as an
//! `Authorization: Bearer` header.
//!
//! [rfc]: https://tools.ietf.org/html/rfc6749
use ring::constant_time::verify_slices_are_equal;
use tracing::{info, instrument, warn};

use super::{compose_url, fetch_token, request_with_params, Protocol};
use crate::config::{BearerPlacement, ClientConfig, OAuth2Config};
use crate::error::{Error, Result};
use crate::primitives::codec::Params;
use crate::primitives::generator::RandomGenerator;
use crate::primitives::state::AuthorizationState;
use crate::primitives::token::Token;
use crate::transport::{HttpRequest, Method, Transport};

/// The OAuth 2.0 half of a client.
#[derive(Debug)]
pub struct OAuth2 {
    config: OAuth2Config,
    states: RandomGenerator,
}

impl OAuth2 {
    /// A client for the configured provider.
    pub fn new(config: OAuth2Config) -> Self {
        OAuth2 {
            config,
            states: RandomGenerator::default(),
        }
    }

    /// The provider configuration.
    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// The url of the authorization endpoint with the request parameters.
    ///
    /// Carries `client_id`, `redirect_uri` (if a return url is configured), `response_type=code`
    /// and the optional `scope` and `state`. Extra parameters are appended last.
    pub fn build_auth_url(&self, state: Option<&str>, extra: &Params) -> String {
        let mut params = Params::new().with("client_id", self.config.client_id.as_str());
        if let Some(return_url) = &self.config.client.return_url {
            params.insert("redirect_uri", return_url.as_str());
        }
        params.insert("response_type", "code");
        if let Some(scope) = &self.config.scope {
            params.insert("scope", scope.as_str());
        }
        if let Some(state) = state {
            params.insert("state", state);
        }
        params.extend(extra.iter());
        compose_url(&self.config.authorize_url, &params)
    }

    /// Exchange an authorization code for an access token.
    #[instrument(level = "debug", skip_all)]
    pub fn fetch_access_token(&self, transport: &dyn Transport, code: &str) -> Result<Token> {
        let mut params = Params::new()
            .with("grant_type", "authorization_code")
            .with("code", code)
            .with("client_id", self.config.client_id.as_str())
            .with("client_secret", self.config.client_secret.as_str());
        if let Some(return_url) = &self.config.client.return_url {
            params.insert("redirect_uri", return_url.as_str());
        }

        let request = request_with_params(Method::Post, &self.config.token_url, &params);
        let token = fetch_token(transport, request)?;
        info!(provider = %self.config.client.name, "access token issued");
        Ok(token)
    }

    /// Obtain a new access token with a refresh token.
    ///
    /// Providers may omit the refresh token from the reply, in which case the previous one stays
    /// valid and is carried over.
    #[instrument(level = "debug", skip_all)]
    pub fn refresh_access_token(&self, transport: &dyn Transport, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token().ok_or(Error::TokenExpired)?;
        let params = Params::new()
            .with("grant_type", "refresh_token")
            .with("refresh_token", refresh_token)
            .with("client_id", self.config.client_id.as_str())
            .with("client_secret", self.config.client_secret.as_str());

        let request = request_with_params(Method::Post, &self.config.token_url, &params);
        let refreshed = match fetch_token(transport, request) {
            Ok(refreshed) => refreshed,
            Err(err) => {
                warn!(provider = %self.config.client.name, %err, "token refresh failed");
                return Err(err);
            }
        };
        info!(provider = %self.config.client.name, "access token refreshed");

        if refreshed.refresh_token().is_none() {
            Ok(refreshed.refreshable_with(refresh_token))
        } else {
            Ok(refreshed)
        }
    }
}

impl Protocol for OAuth2 {
    fn name(&self) -> &'static str {
        "oauth2"
    }

    fn client_config(&self) -> &ClientConfig {
        &self.config.client
    }

    fn start_authorization(
        &mut self, _transport: &dyn Transport,
    ) -> Result<(String, AuthorizationState)> {
        let state = self.states.generate()?;
        let url = self.build_auth_url(Some(state.as_str()), &Params::new());
        Ok((url, AuthorizationState::Csrf(state)))
    }

    fn exchange_token(
        &mut self, transport: &dyn Transport, state: AuthorizationState, callback: &Params,
    ) -> Result<Token> {
        let expected = match state {
            AuthorizationState::Csrf(expected) => expected,
            AuthorizationState::RequestToken(_) => {
                return Err(Error::handshake("stored state is not an OAuth 2.0 state"))
            }
        };
        let returned = callback.get("state").unwrap_or("");
        if verify_slices_are_equal(returned.as_bytes(), expected.as_bytes()).is_err() {
            warn!(provider = %self.config.client.name, "callback state does not match");
            return Err(Error::handshake("state parameter does not match"));
        }

        if let Some(error) = callback.get("error") {
            warn!(provider = %self.config.client.name, error, "authorization denied");
            return Err(Error::Provider {
                error: error.to_string(),
                description: callback.get("error_description").map(str::to_string),
            });
        }

        let code = callback
            .get("code")
            .filter(|code| !code.is_empty())
            .ok_or_else(|| Error::handshake("callback carries no authorization code"))?;
        self.fetch_access_token(transport, code)
    }

    fn can_refresh(&self, token: &Token) -> bool {
        token.refresh_token().is_some()
    }

    fn refresh_token(&mut self, transport: &dyn Transport, token: &Token) -> Result<Token> {
        self.refresh_access_token(transport, token)
    }

    fn authorize_request(
        &mut self, method: Method, url: &str, mut params: Params, token: &Token,
    ) -> Result<HttpRequest> {
        match self.config.bearer {
            BearerPlacement::Query => {
                params.insert("access_token", token.token());
                Ok(request_with_params(method, url, &params))
            }
            BearerPlacement::Header => Ok(request_with_params(method, url, &params)
                .header("Authorization", format!("Bearer {}", token.token()))),
        }
    }
}
