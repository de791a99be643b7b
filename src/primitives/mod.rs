//! A collection of primitives shared by both protocol versions.
//!
//! None of these perform network requests. They encode parameters, hold credentials, sign base
//! strings and remember handshake state, and the `Client` combines them into the actual flows.
use chrono::DateTime;
use chrono::Utc;

pub mod codec;
pub mod deferred;
pub mod generator;
pub mod signature;
pub mod state;
pub mod token;

/// Instants as used for token creation and expiry.
pub type Time = DateTime<Utc>;

/// Commonly used primitives for clients and hosts.
pub mod prelude {
    pub use super::codec::{build_query_string, parse_query_string, url_decode, url_encode, Params};
    pub use super::deferred::{Deferred, Resolve};
    pub use super::generator::RandomGenerator;
    pub use super::signature::{PlainText, SignatureMethod};
    #[cfg(feature = "hmac-sha1")]
    pub use super::signature::HmacSha1;
    #[cfg(feature = "rsa-sha1")]
    pub use super::signature::RsaSha1;
    pub use super::state::{AuthorizationState, MemoryStore, StateStore};
    pub use super::token::Token;
}
