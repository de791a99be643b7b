//! The protocol specific halves of a client.
//!
//! A [`Client`] drives the handshake and api calls the same way for both protocol versions. What
//! differs is collected in the [`Protocol`] trait: how the user is sent to the provider, how the
//! callback is turned into an access token, whether tokens can be refreshed and how credentials
//! are attached to a request.
//!
//! [`Client`]: ../client/struct.Client.html
//! [`Protocol`]: trait.Protocol.html
use tracing::warn;

use crate::client::content::Decoded;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::primitives::codec::Params;
use crate::primitives::state::AuthorizationState;
use crate::primitives::token::Token;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

pub mod oauth1;
pub mod oauth2;

pub use self::oauth1::OAuth1;
pub use self::oauth2::OAuth2;

/// Everything a `Client` delegates to the protocol version.
pub trait Protocol {
    /// Short name used to scope stored state, for example `oauth2`.
    fn name(&self) -> &'static str;

    /// The settings shared with the `Client`.
    fn client_config(&self) -> &ClientConfig;

    /// Prepare the redirect of the user to the provider.
    ///
    /// Returns the url to redirect to and the state which must be remembered until the callback.
    /// OAuth 1.0a obtains a request token from the provider at this point.
    fn start_authorization(
        &mut self, transport: &dyn Transport,
    ) -> Result<(String, AuthorizationState)>;

    /// Turn the parameters of the provider's callback into an access token.
    ///
    /// The `state` is the value remembered by `start_authorization`, already removed from the
    /// store. Callbacks that do not match it must be rejected with `Error::HandshakeState`.
    fn exchange_token(
        &mut self, transport: &dyn Transport, state: AuthorizationState, callback: &Params,
    ) -> Result<Token>;

    /// Whether `refresh_token` can succeed for this token.
    fn can_refresh(&self, _token: &Token) -> bool {
        false
    }

    /// Obtain a new access token in place of an expired one.
    fn refresh_token(&mut self, _transport: &dyn Transport, _token: &Token) -> Result<Token> {
        Err(Error::TokenExpired)
    }

    /// Build the request of an api call, authorized with the token.
    ///
    /// OAuth 1.0a signs the request, OAuth 2.0 attaches the bearer token.
    fn authorize_request(
        &mut self, method: Method, url: &str, params: Params, token: &Token,
    ) -> Result<HttpRequest>;
}

/// Append parameters to an url.
///
/// The parameters are joined with `&` when the url already carries a query and with `?`
/// otherwise. Existing query parameters are kept. An empty parameter list leaves the url as is.
///
/// ```
/// # use oxide_auth_client::primitives::codec::Params;
/// # use oxide_auth_client::protocol::compose_url;
/// let params = Params::new().with("a", "1").with("b", "2");
/// assert_eq!(compose_url("http://x", &params), "http://x?a=1&b=2");
/// assert_eq!(compose_url("http://x?c=3", &Params::new().with("a", "1")), "http://x?c=3&a=1");
/// ```
pub fn compose_url(url: &str, params: &Params) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let separator = if !url.contains('?') {
        "?"
    } else if url.ends_with('?') || url.ends_with('&') {
        ""
    } else {
        "&"
    };
    format!("{}{}{}", url, separator, params.to_query_string())
}

/// A request carrying its parameters in the query or, for methods with a body, as a form.
pub(crate) fn request_with_params(method: Method, url: &str, params: &Params) -> HttpRequest {
    if method.has_body() {
        HttpRequest::new(method, url).form(params.to_query_string())
    } else {
        HttpRequest::new(method, compose_url(url, params))
    }
}

/// Send a request to a token endpoint and read the issued token.
///
/// Replies outside of `2xx` are mapped to `Error::Provider` when they carry an OAuth error and
/// to `Error::Status` otherwise.
pub(crate) fn fetch_token(transport: &dyn Transport, request: HttpRequest) -> Result<Token> {
    let url = request.url.clone();
    let response = transport.send(request)?;
    read_token(&url, &response)
}

fn read_token(url: &str, response: &HttpResponse) -> Result<Token> {
    let decoded = Decoded::from_response(response);
    if !response.is_success() {
        warn!(status = response.status, url, "token endpoint rejected the request");
        return Err(decoded.provider_error().unwrap_or_else(|| Error::Status {
            status: response.status,
            url: url.to_string(),
            body: response.text(),
        }));
    }

    if let Some(error) = decoded.provider_error() {
        warn!(url, "token endpoint reported an error");
        return Err(error);
    }

    decoded.into_token()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn compose_url_separators() {
        let params = Params::new().with("a", "1");
        assert_eq!(compose_url("http://x", &params), "http://x?a=1");
        assert_eq!(compose_url("http://x?", &params), "http://x?a=1");
        assert_eq!(compose_url("http://x?c=3&", &params), "http://x?c=3&a=1");
        assert_eq!(compose_url("http://x?c=3", &Params::new()), "http://x?c=3");
        assert_eq!(
            compose_url("http://x", &Params::new().with("q", "a b&c")),
            "http://x?q=a%20b%26c"
        );
    }

    #[test]
    fn params_follow_the_method() {
        let params = Params::new().with("status", "hello world");
        let get = request_with_params(Method::Get, "http://x/s", &params);
        assert_eq!(get.url, "http://x/s?status=hello%20world");
        assert_eq!(get.body, None);

        let post = request_with_params(Method::Post, "http://x/s", &params);
        assert_eq!(post.url, "http://x/s");
        assert_eq!(post.body_text(), Some("status=hello%20world"));
    }

    #[test]
    fn token_endpoint_errors() {
        let transport = MemoryTransport::new();
        transport
            .respond("http://t/a", HttpResponse::new(400, r#"{"error":"invalid_grant"}"#))
            .respond("http://t/b", HttpResponse::new(500, "oops"))
            .respond("http://t/c", HttpResponse::json(r#"{"error":"access_denied"}"#))
            .respond("http://t/d", HttpResponse::json(r#"{"access_token":"at"}"#));

        let send = |url: &str| fetch_token(&transport, HttpRequest::new(Method::Post, url));
        assert!(matches!(send("http://t/a"), Err(Error::Provider { ref error, .. }) if error == "invalid_grant"));
        assert!(matches!(send("http://t/b"), Err(Error::Status { status: 500, .. })));
        assert!(matches!(send("http://t/c"), Err(Error::Provider { .. })));
        assert_eq!(send("http://t/d").unwrap().token(), "at");
    }
}
