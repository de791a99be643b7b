//! Provider configuration.
//!
//! All types here are plain data and deserialize with `serde`, so that a host can keep them in
//! whatever configuration format it already uses. Secrets are redacted from `Debug` output.
//!
//! ```
//! # use oxide_auth_client::config::OAuth2Config;
//! let config = OAuth2Config::from_json(r#"{
//!     "client": { "name": "example", "api_base_url": "https://api.example.com/v1" },
//!     "client_id": "cid",
//!     "client_secret": "secret",
//!     "authorize_url": "https://example.com/oauth/authorize",
//!     "token_url": "https://example.com/oauth/token",
//!     "scope": "profile"
//! }"#).unwrap();
//! assert_eq!(config.client.name, "example");
//! ```
use std::fmt;
use std::fs;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use serde_derive::Deserialize;

use crate::error::{Error, Result};
use crate::primitives::deferred::Resolve;
use crate::primitives::token::Token;
use crate::transport::Method;

/// Settings shared by both protocol versions.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// Distinguishes providers of the same protocol in the state store.
    pub name: String,

    /// Prefix for relative `api` urls.
    #[serde(default)]
    pub api_base_url: String,

    /// Where the provider sends the user back to after authorization.
    #[serde(default)]
    pub return_url: Option<String>,

    /// Refresh expired access tokens before an api call.
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
}

/// OAuth 1.0a provider endpoints and consumer credentials.
#[derive(Clone, Deserialize)]
pub struct OAuth1Config {
    /// Shared settings.
    pub client: ClientConfig,

    /// Identifies the application to the provider.
    pub consumer_key: String,

    /// Signs requests together with the token secret.
    pub consumer_secret: String,

    /// Endpoint issuing unauthorized request tokens.
    pub request_token_url: String,

    /// Method used at the request token endpoint.
    #[serde(default)]
    pub request_token_method: Method,

    /// Endpoint exchanging authorized request tokens for access tokens.
    pub access_token_url: String,

    /// Method used at the access token endpoint.
    #[serde(default)]
    pub access_token_method: Method,

    /// Page where the user authorizes the request token.
    pub authorize_url: String,

    /// Optional `realm` of the `Authorization` header.
    #[serde(default)]
    pub realm: Option<String>,

    /// Optional scope, sent with the request token request.
    #[serde(default)]
    pub scope: Option<String>,

    /// How requests are signed.
    #[serde(default)]
    pub signature_method: SignatureMethodConfig,
}

/// OAuth 2.0 provider endpoints and client credentials.
#[derive(Clone, Deserialize)]
pub struct OAuth2Config {
    /// Shared settings.
    pub client: ClientConfig,

    /// The registered client identifier.
    pub client_id: String,

    /// The registered client secret.
    pub client_secret: String,

    /// Page where the user authorizes the client.
    pub authorize_url: String,

    /// Endpoint for the code exchange and refreshes.
    pub token_url: String,

    /// Scope requested by default.
    #[serde(default)]
    pub scope: Option<String>,

    /// How the bearer token is attached to api calls.
    #[serde(default)]
    pub bearer: BearerPlacement,
}

/// Where an OAuth 2.0 bearer token is attached to a request.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BearerPlacement {
    /// As the `access_token` request parameter.
    Query,

    /// As an `Authorization: Bearer` header.
    Header,
}

impl Default for BearerPlacement {
    fn default() -> Self {
        BearerPlacement::Query
    }
}

/// Choice of the OAuth 1.0a signature method.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum SignatureMethodConfig {
    /// `PLAINTEXT`, only safe over TLS.
    #[serde(rename = "PLAINTEXT")]
    PlainText,

    /// `HMAC-SHA1`, the common choice.
    #[serde(rename = "HMAC-SHA1")]
    HmacSha1,

    /// `RSA-SHA1` with the given key material.
    #[serde(rename = "RSA-SHA1")]
    RsaSha1 {
        /// Signs outgoing requests.
        #[serde(default)]
        private_key: Option<KeySource>,
        /// Verifies signatures.
        #[serde(default)]
        public_key: Option<KeySource>,
    },
}

impl Default for SignatureMethodConfig {
    fn default() -> Self {
        SignatureMethodConfig::HmacSha1
    }
}

/// Where PEM encoded key material comes from.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// The PEM text itself.
    Inline(String),

    /// A file containing the PEM text.
    File(PathBuf),
}

impl KeySource {
    /// Get the PEM text, reading the file if necessary.
    pub fn read(&self) -> Result<String> {
        match self {
            KeySource::Inline(pem) => Ok(pem.clone()),
            KeySource::File(path) => fs::read_to_string(path)
                .map_err(|err| Error::Key(format!("{}: {}", path.display(), err))),
        }
    }

    /// A description safe for logging.
    pub fn describe(&self) -> String {
        match self {
            KeySource::Inline(_) => "inline".to_string(),
            KeySource::File(path) => path.display().to_string(),
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KeySource::Inline(_) => f.write_str("Inline(<redacted>)"),
            KeySource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// A stored credential, turned into a [`Token`] on first use.
///
/// [`Token`]: ../primitives/token/struct.Token.html
#[derive(Clone, Default, Deserialize)]
pub struct TokenConfig {
    /// The token string.
    pub token: String,

    /// The OAuth 1.0a token secret.
    #[serde(default)]
    pub secret: Option<String>,

    /// The OAuth 2.0 refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Absolute expiry in unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,

    /// Relative lifetime in seconds, counted from resolution.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl Resolve for TokenConfig {
    type Output = Token;

    fn resolve(&self) -> Result<Token> {
        if self.token.is_empty() {
            return Err(Error::Config("token must not be empty".into()));
        }

        let mut token = match &self.secret {
            Some(secret) => Token::with_secret(self.token.as_str(), secret.as_str()),
            None => Token::new(self.token.as_str()),
        };

        if let Some(refresh) = &self.refresh_token {
            token = token.refreshable_with(refresh.as_str());
        }

        if let Some(seconds) = self.expires_at {
            let until = Utc
                .timestamp_opt(seconds, 0)
                .single()
                .ok_or_else(|| Error::Config(format!("expires_at out of range: {}", seconds)))?;
            token = token.expiring_at(until);
        } else if let Some(seconds) = self.expires_in {
            token = token
                .expiring_after(seconds)
                .ok_or_else(|| Error::Config(format!("expires_in out of range: {}", seconds)))?;
        }

        Ok(token)
    }
}

fn default_true() -> bool {
    true
}

impl OAuth1Config {
    /// Parse from a json document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl OAuth2Config {
    /// Parse from a json document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Debug for OAuth1Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OAuth1Config")
            .field("client", &self.client)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("request_token_url", &self.request_token_url)
            .field("access_token_url", &self.access_token_url)
            .field("authorize_url", &self.authorize_url)
            .field("realm", &self.realm)
            .field("signature_method", &self.signature_method)
            .finish()
    }
}

impl fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client", &self.client)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("scope", &self.scope)
            .field("bearer", &self.bearer)
            .finish()
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("token", &self.token)
            .field("expires_at", &self.expires_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
