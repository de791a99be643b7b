//! # oxide-auth-client
//!
//! An OAuth client library, obtaining and using credentials of third party providers with either
//! OAuth 1.0a or OAuth 2.0.
//!
//! ## About
//!
//! The library is the engine of a *consumer*: it sends users to a provider for authorization,
//! turns their return into an access token, and attaches that token to subsequent api calls,
//! signing them where OAuth 1.0a demands it. It neither opens connections nor keeps sessions on
//! its own. Both are traits in the other direction, so that the library fits into whatever web
//! server and http client the host already uses:
//!
//! * A [`Transport`] performs the http requests. [`MemoryTransport`] answers from a script and is
//!   used throughout the tests; the `reqwest-transport` feature adds a blocking transport.
//! * A [`StateStore`] keeps the handshake state between the redirect to the provider and the
//!   callback, and the access token between requests. [`MemoryStore`] keeps them in process.
//!
//! ## Obtaining a token
//!
//! Configure the provider with [`OAuth1Config`] or [`OAuth2Config`], usually deserialized from
//! the configuration of the host, and create a [`Client`] in each request handler that needs it.
//! Redirect the user to [`Client::authorize_url`]; when they come back, hand the query of the
//! callback to [`Client::handle_callback_query`]. From then on [`Client::api`] performs calls,
//! refreshing an expired OAuth 2.0 token when possible.
//!
//! Responses of providers are decoded by their content type into a [`Decoded`] body. Bodies of an
//! unknown format are handed out as text instead of failing.
//!
//! ## Cryptography
//!
//! OAuth 1.0a requests are signed with one of the [`SignatureMethod`]s `PLAINTEXT`, `HMAC-SHA1`
//! and `RSA-SHA1`. The latter two can be compiled out with the `hmac-sha1` and `rsa-sha1`
//! features, in which case configuring them fails with [`Error::Environment`].
//!
//! [`Transport`]: transport/trait.Transport.html
//! [`MemoryTransport`]: transport/memory/struct.MemoryTransport.html
//! [`StateStore`]: primitives/state/trait.StateStore.html
//! [`MemoryStore`]: primitives/state/struct.MemoryStore.html
//! [`OAuth1Config`]: config/struct.OAuth1Config.html
//! [`OAuth2Config`]: config/struct.OAuth2Config.html
//! [`Client`]: client/struct.Client.html
//! [`Client::authorize_url`]: client/struct.Client.html#method.authorize_url
//! [`Client::handle_callback_query`]: client/struct.Client.html#method.handle_callback_query
//! [`Client::api`]: client/struct.Client.html#method.api
//! [`Decoded`]: client/content/enum.Decoded.html
//! [`SignatureMethod`]: primitives/signature/trait.SignatureMethod.html
//! [`Error::Environment`]: error/enum.Error.html#variant.Environment
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod primitives;
pub mod protocol;
pub mod transport;

pub use crate::client::content::{ContentType, Decoded};
pub use crate::client::{Client, Client1, Client2};
pub use crate::error::{Error, Result};
pub use crate::primitives::codec::Params;
pub use crate::primitives::token::Token;
pub use crate::transport::Method;
