//! Errors surfaced by the client engine.
//!
//! Signature verification is not an error: [`SignatureMethod::verify`] answers with a plain
//! `bool` that the caller has to inspect. Likewise a response body whose format can not be
//! determined is handed out as raw text instead of failing the call.
//!
//! [`SignatureMethod::verify`]: ../primitives/signature/trait.SignatureMethod.html#method.verify
use std::io;

use thiserror::Error;

use crate::transport::TransportError;

/// Result type of all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All the ways in which obtaining or using credentials can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// A cryptographic primitive was requested that this build does not provide.
    ///
    /// Enable the corresponding cargo feature (`hmac-sha1` or `rsa-sha1`).
    #[error("{0} support is not available in this build")]
    Environment(&'static str),

    /// Key material could not be loaded or parsed.
    #[error("invalid key material: {0}")]
    Key(String),

    /// The persisted handshake state is missing or does not match the callback.
    ///
    /// Either the session was lost between redirect and callback or the callback was forged or
    /// replayed. The request must not continue.
    #[error("authorization state rejected: {0}")]
    HandshakeState(String),

    /// The transport could not deliver the request.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The provider answered with a status outside of `2xx`.
    #[error("request to {url} failed with status {status}")]
    Status {
        /// The http status code.
        status: u16,
        /// Target of the failed request.
        url: String,
        /// Raw response body, for diagnostics.
        body: String,
    },

    /// The provider reported an OAuth error, for example `invalid_grant`.
    #[error("provider returned {error}{}", describe(.description))]
    Provider {
        /// The `error` code.
        error: String,
        /// The optional `error_description`.
        description: Option<String>,
    },

    /// No access token is held, or the held one is empty.
    #[error("no valid access token")]
    InvalidToken,

    /// The access token expired and can not be refreshed.
    #[error("access token expired")]
    TokenExpired,

    /// The provider answered but the expected fields are missing.
    #[error("malformed provider response: {0}")]
    Response(String),

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An url could not be parsed.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Json (de)serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Reading key files failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn describe(description: &Option<String>) -> String {
    match description {
        Some(description) => format!(": {}", description),
        None => String::new(),
    }
}

impl Error {
    /// Shorthand for a rejected handshake.
    pub(crate) fn handshake<S: Into<String>>(reason: S) -> Self {
        Error::HandshakeState(reason.into())
    }

    /// Whether the error means the current credentials are unusable.
    ///
    /// Hosts typically restart the authorization flow in this case.
    pub fn requires_authorization(&self) -> bool {
        match self {
            Error::InvalidToken | Error::TokenExpired | Error::HandshakeState(_) => true,
            Error::Status { status, .. } => *status == 401,
            _ => false,
        }
    }
}
