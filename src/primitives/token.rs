//! Credentials issued by a provider.
//!
//! A single type covers the OAuth 1.0a token pair (token and token secret) as well as the OAuth
//! 2.0 bearer token with its optional refresh token. Tokens are values: a refresh produces a new
//! `Token` instead of modifying the old one, so clones shared between concurrent requests never
//! observe a half updated credential.
use std::fmt;

use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;

use super::codec::{parse_query_string, Params};
use super::Time;
use crate::error::{Error, Result};

/// Keys recognized for the token string, in order of preference.
const TOKEN_KEYS: &[&str] = &["token", "oauth_token", "access_token"];

/// Keys recognized for the token secret.
const SECRET_KEYS: &[&str] = &["token_secret", "oauth_token_secret"];

/// Keys recognized for the lifetime in seconds.
const EXPIRES_KEYS: &[&str] = &["expires_in", "expires"];

/// An access, refresh or request credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    token: String,
    secret: Option<String>,
    refresh_token: Option<String>,
    created_at: Time,
    expires_at: Option<Time>,
    params: Params,
}

impl Token {
    /// A bearer style token without a secret or expiry.
    pub fn new<S: Into<String>>(token: S) -> Self {
        Token {
            token: token.into(),
            secret: None,
            refresh_token: None,
            created_at: Utc::now(),
            expires_at: None,
            params: Params::new(),
        }
    }

    /// An OAuth 1.0a token pair.
    pub fn with_secret<S: Into<String>, T: Into<String>>(token: S, secret: T) -> Self {
        Token {
            secret: Some(secret.into()),
            ..Token::new(token)
        }
    }

    /// A copy of the token expiring at the given instant.
    pub fn expiring_at(self, until: Time) -> Self {
        Token {
            expires_at: Some(until),
            ..self
        }
    }

    /// A copy of the token expiring after the given duration, counted from its creation.
    ///
    /// # Panics
    ///
    /// When the expiry instant is not representable. Use [`expiring_after`] for lifetimes
    /// received from a provider.
    ///
    /// [`expiring_after`]: #method.expiring_after
    pub fn expiring_in(self, duration: Duration) -> Self {
        let until = self.created_at + duration;
        self.expiring_at(until)
    }

    /// A copy of the token expiring `seconds` after its creation.
    ///
    /// `None` if the lifetime does not fit into a timestamp.
    pub fn expiring_after(self, seconds: i64) -> Option<Self> {
        let until = self.created_at.checked_add_signed(Duration::try_seconds(seconds)?)?;
        Some(self.expiring_at(until))
    }

    /// A copy of the token carrying a refresh token.
    pub fn refreshable_with<S: Into<String>>(self, refresh_token: S) -> Self {
        Token {
            refresh_token: Some(refresh_token.into()),
            ..self
        }
    }

    /// A copy of the token with an additional provider parameter.
    pub fn with_param<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key, value);
        self
    }

    /// The token string.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The token secret, only present for OAuth 1.0a credentials.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    /// The refresh token, if the provider issued one.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// When the token was received.
    pub fn created_at(&self) -> Time {
        self.created_at
    }

    /// When the token stops being accepted, if known.
    pub fn expires_at(&self) -> Option<Time> {
        self.expires_at
    }

    /// Additional parameters of the provider response, such as a user id.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// All additional parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Whether the expiry is known and has passed.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the token is expired at a specific instant.
    pub fn is_expired_at(&self, now: Time) -> bool {
        match self.expires_at {
            Some(until) => now >= until,
            None => false,
        }
    }

    /// A token is usable if it is non-empty and not expired.
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && !self.is_expired()
    }

    /// Encode as a query string.
    ///
    /// The form is `token=..&token_secret=..` followed by `refresh_token`, `expires_at` (unix
    /// seconds) and the additional parameters. Absent fields are omitted.
    pub fn to_query_string(&self) -> String {
        let mut params = Params::new().with("token", self.token.as_str());
        if let Some(secret) = &self.secret {
            params.insert("token_secret", secret.as_str());
        }
        if let Some(refresh) = &self.refresh_token {
            params.insert("refresh_token", refresh.as_str());
        }
        if let Some(until) = self.expires_at {
            params.insert("expires_at", until.timestamp().to_string());
        }
        params.insert("created_at", self.created_at.timestamp().to_string());
        for (key, value) in self.params.iter() {
            if !params.contains_key(key) {
                params.insert(key, value);
            }
        }
        params.to_query_string()
    }

    /// Decode a query string.
    ///
    /// Accepts both the form written by [`to_query_string`] and the OAuth 1.0a provider reply
    /// form `oauth_token=..&oauth_token_secret=..`. A relative `expires_in` (or `expires`) is
    /// counted from now. Unknown keys are kept as additional parameters.
    ///
    /// [`to_query_string`]: #method.to_query_string
    pub fn from_query_string(query: &str) -> Result<Self> {
        Token::from_params(parse_query_string(query))
    }

    /// Build a token from already decoded parameters.
    pub fn from_params(mut params: Params) -> Result<Self> {
        let token = take_first(&mut params, TOKEN_KEYS)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Response("token parameter missing".into()))?;
        let mut result = Token::new(token);
        result.secret = take_first(&mut params, SECRET_KEYS);
        result.refresh_token = params.remove("refresh_token");

        if let Some(created) = params.remove("created_at") {
            result.created_at = parse_timestamp(&created)?;
        }

        if let Some(until) = params.remove("expires_at") {
            result.expires_at = Some(parse_timestamp(&until)?);
        } else if let Some(seconds) = take_first(&mut params, EXPIRES_KEYS) {
            let seconds: i64 = seconds
                .trim()
                .parse()
                .map_err(|_| Error::Response(format!("invalid lifetime `{}`", seconds)))?;
            result = result
                .expiring_after(seconds)
                .ok_or_else(|| Error::Response(format!("lifetime out of range `{}`", seconds)))?;
        }

        result.params = params;
        Ok(result)
    }

    /// Decode an OAuth 2.0 token response body.
    ///
    /// Reads `access_token`, `refresh_token` and `expires_in`. Every other scalar member, for
    /// example `token_type` or `scope`, is kept as an additional parameter.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::Response("token response is not an object".into()))?;
        let mut params = Params::new();
        for (key, value) in object {
            match value {
                Value::String(string) => {
                    params.insert(key.as_str(), string.as_str());
                }
                Value::Number(number) => {
                    params.insert(key.as_str(), number.to_string());
                }
                Value::Bool(flag) => {
                    params.insert(key.as_str(), flag.to_string());
                }
                _ => (),
            }
        }
        Token::from_params(params)
    }
}

fn take_first(params: &mut Params, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| params.remove(key))
}

fn parse_timestamp(value: &str) -> Result<Time> {
    let seconds: i64 = value
        .trim()
        .parse()
        .map_err(|_| Error::Response(format!("invalid timestamp `{}`", value)))?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| Error::Response(format!("timestamp out of range `{}`", value)))
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Token")
            .field("token", &self.token)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("params", &self.params)
            .finish()
    }
}
