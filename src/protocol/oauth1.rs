//! OAuth 1.0a as described in [RFC 5849][rfc].
//!
//! Every request to the provider, including the token requests of the handshake, is signed. The
//! signature covers the method, the normalized url and all parameters, so both sides must encode
//! and order them identically:
//!
//! 1. The method in upper case.
//! 2. The url without query or fragment, scheme and host in lower case and default ports removed.
//! 3. All protocol, query and body parameters, each name and value percent-encoded, sorted by
//!    name and then by value and joined as `name=value` with `&`.
//!
//! The three parts are percent-encoded once more and joined with `&`.
//!
//! Protocol parameters (those starting with `oauth_`) are transmitted in the `Authorization`
//! header, all others in the query or the form body.
//!
//! [rfc]: https://tools.ietf.org/html/rfc5849
use std::sync::Arc;

use chrono::Utc;
use ring::constant_time::verify_slices_are_equal;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{compose_url, fetch_token, request_with_params, Protocol};
use crate::config::{ClientConfig, OAuth1Config, SignatureMethodConfig};
use crate::error::{Error, Result};
use crate::primitives::codec::{url_encode, Params};
use crate::primitives::deferred::Deferred;
use crate::primitives::generator::RandomGenerator;
use crate::primitives::signature::SignatureMethod;
use crate::primitives::state::AuthorizationState;
use crate::primitives::token::Token;
use crate::transport::{HttpRequest, Method, Transport};

/// The OAuth 1.0a half of a client.
#[derive(Debug)]
pub struct OAuth1 {
    config: OAuth1Config,
    signature_method: Deferred<SignatureMethodConfig>,
    nonces: RandomGenerator,
}

impl OAuth1 {
    /// Use the configured signature method, constructed on first use.
    pub fn new(config: OAuth1Config) -> Self {
        let signature_method = Deferred::Config(config.signature_method.clone());
        OAuth1 {
            config,
            signature_method,
            nonces: RandomGenerator::default(),
        }
    }

    /// The provider configuration.
    pub fn config(&self) -> &OAuth1Config {
        &self.config
    }

    /// Replace the signature method, either by an instance or by its configuration.
    pub fn set_signature_method<M>(&mut self, method: M)
    where
        M: Into<Deferred<SignatureMethodConfig>>,
    {
        self.signature_method = method.into();
    }

    /// The signature method, constructing it if necessary.
    ///
    /// Fails with `Error::Environment` when the configured method was compiled out.
    pub fn signature_method(&mut self) -> Result<Arc<dyn SignatureMethod>> {
        Ok(self.signature_method.get()?.clone())
    }

    /// The url to send the user to for authorizing the request token.
    pub fn build_auth_url(&self, request_token: &Token) -> String {
        let params = Params::new().with("oauth_token", request_token.token());
        compose_url(&self.config.authorize_url, &params)
    }

    /// Add the protocol parameters and the signature to the parameters of a request.
    ///
    /// Missing `oauth_version`, `oauth_nonce`, `oauth_timestamp`, `oauth_consumer_key`,
    /// `oauth_signature_method` and, if a token is given, `oauth_token` are filled in. Values
    /// supplied by the caller are kept. The key is the consumer secret and the token secret, both
    /// percent-encoded and joined by `&`.
    pub fn sign_request(
        &mut self, method: Method, url: &str, params: Params, token: Option<&Token>,
    ) -> Result<Params> {
        let signer = self.signature_method()?;
        let mut signed = self.common_params(signer.name())?;
        signed.extend(params);
        if let Some(token) = token {
            if !signed.contains_key("oauth_token") {
                signed.insert("oauth_token", token.token());
            }
        }
        signed.remove("oauth_signature");

        let base_string = signature_base_string(method, url, &signed)?;
        debug!(%base_string, "signing request");
        let key = signing_key(&self.config.consumer_secret, token.and_then(Token::secret));
        let signature = signer.generate_signature(&base_string, &key)?;
        signed.insert("oauth_signature", signature);
        Ok(signed)
    }

    /// Obtain an unauthorized request token.
    ///
    /// The configured return url is sent as `oauth_callback`, or `oob` when there is none.
    #[instrument(level = "debug", skip_all)]
    pub fn fetch_request_token(&mut self, transport: &dyn Transport) -> Result<Token> {
        let mut params = Params::new().with(
            "oauth_callback",
            self.config.client.return_url.as_deref().unwrap_or("oob"),
        );
        if let Some(scope) = &self.config.scope {
            params.insert("scope", scope.as_str());
        }

        let method = self.config.request_token_method;
        let url = self.config.request_token_url.clone();
        let signed = self.sign_request(method, &url, params, None)?;
        let token = fetch_token(transport, self.build_request(method, &url, &signed))?;
        info!(provider = %self.config.client.name, "request token issued");
        Ok(token)
    }

    /// Exchange an authorized request token for an access token.
    #[instrument(level = "debug", skip_all)]
    pub fn fetch_access_token(
        &mut self, transport: &dyn Transport, request_token: &Token, verifier: Option<&str>,
    ) -> Result<Token> {
        let mut params = Params::new().with("oauth_token", request_token.token());
        if let Some(verifier) = verifier {
            params.insert("oauth_verifier", verifier);
        }

        let method = self.config.access_token_method;
        let url = self.config.access_token_url.clone();
        let signed = self.sign_request(method, &url, params, Some(request_token))?;
        let token = fetch_token(transport, self.build_request(method, &url, &signed))?;
        info!(provider = %self.config.client.name, "access token issued");
        Ok(token)
    }

    /// Distribute signed parameters over the `Authorization` header and the query or body.
    pub fn build_request(&self, method: Method, url: &str, signed: &Params) -> HttpRequest {
        let (oauth, rest) = signed.partition(|key| key.starts_with("oauth_"));
        let realm = self.config.realm.as_deref().unwrap_or("");
        request_with_params(method, url, &rest)
            .header("Authorization", authorization_header_value(&oauth, realm))
    }

    fn common_params(&self, signature_method: &str) -> Result<Params> {
        Ok(Params::new()
            .with("oauth_version", "1.0")
            .with("oauth_nonce", self.nonces.generate()?)
            .with("oauth_timestamp", Utc::now().timestamp().to_string())
            .with("oauth_consumer_key", self.config.consumer_key.as_str())
            .with("oauth_signature_method", signature_method))
    }
}

impl Protocol for OAuth1 {
    fn name(&self) -> &'static str {
        "oauth1"
    }

    fn client_config(&self) -> &ClientConfig {
        &self.config.client
    }

    fn start_authorization(
        &mut self, transport: &dyn Transport,
    ) -> Result<(String, AuthorizationState)> {
        let request_token = self.fetch_request_token(transport)?;
        let url = self.build_auth_url(&request_token);
        Ok((url, AuthorizationState::RequestToken(request_token)))
    }

    fn exchange_token(
        &mut self, transport: &dyn Transport, state: AuthorizationState, callback: &Params,
    ) -> Result<Token> {
        let request_token = match state {
            AuthorizationState::RequestToken(token) => token,
            AuthorizationState::Csrf(_) => {
                return Err(Error::handshake("stored state is not a request token"))
            }
        };

        let returned = callback.get("oauth_token").unwrap_or("");
        if verify_slices_are_equal(returned.as_bytes(), request_token.token().as_bytes()).is_err() {
            warn!(provider = %self.config.client.name, "callback token does not match the request token");
            return Err(Error::handshake("oauth_token does not match the pending request token"));
        }

        self.fetch_access_token(transport, &request_token, callback.get("oauth_verifier"))
    }

    fn authorize_request(
        &mut self, method: Method, url: &str, params: Params, token: &Token,
    ) -> Result<HttpRequest> {
        let signed = self.sign_request(method, url, params, Some(token))?;
        Ok(self.build_request(method, url, &signed))
    }
}

/// The key for signature methods based on shared secrets.
pub fn signing_key(consumer_secret: &str, token_secret: Option<&str>) -> String {
    format!(
        "{}&{}",
        url_encode(consumer_secret),
        url_encode(token_secret.unwrap_or(""))
    )
}

/// Normalize an url for the signature base string.
///
/// Drops query and fragment, lower cases scheme and host and removes the default port of the
/// scheme.
pub fn normalize_url(url: &str) -> Result<String> {
    normalize_parsed(&Url::parse(url)?)
}

fn normalize_parsed(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Config(format!("url `{}` has no host", url)))?;
    let mut normalized = format!("{}://{}", url.scheme(), host.to_ascii_lowercase());
    if let Some(port) = url.port() {
        normalized.push_str(&format!(":{}", port));
    }
    normalized.push_str(url.path());
    Ok(normalized)
}

/// Compute the signature base string of a request.
///
/// Parameters already present in the query of `url` are included. An `oauth_signature`
/// parameter is excluded.
pub fn signature_base_string(method: Method, url: &str, params: &Params) -> Result<String> {
    let parsed = Url::parse(url)?;
    let base_url = normalize_parsed(&parsed)?;

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(key, value)| (url_encode(&key), url_encode(&value)))
        .collect();
    pairs.extend(
        params
            .iter()
            .filter(|(key, _)| *key != "oauth_signature")
            .map(|(key, value)| (url_encode(key), url_encode(value))),
    );
    pairs.sort();

    let normalized = pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.as_str(),
        url_encode(&base_url),
        url_encode(&normalized)
    ))
}

/// The value of the `Authorization` header, starting with `OAuth`.
///
/// Only parameters whose name starts with `oauth_` are included, in the order given. A non-empty
/// realm comes first and is written as a quoted string, not percent-encoded.
pub fn authorization_header_value(params: &Params, realm: &str) -> String {
    let mut parts = Vec::new();
    if !realm.is_empty() {
        parts.push(format!("realm=\"{}\"", realm.replace('\\', "\\\\").replace('"', "\\\"")));
    }
    parts.extend(
        params
            .iter()
            .filter(|(key, _)| key.starts_with("oauth_"))
            .map(|(key, value)| format!("{}=\"{}\"", url_encode(key), url_encode(value))),
    );

    if parts.is_empty() {
        "OAuth".to_string()
    } else {
        format!("OAuth {}", parts.join(", "))
    }
}

/// The complete `Authorization` header line.
///
/// ```
/// # use oxide_auth_client::primitives::codec::Params;
/// # use oxide_auth_client::protocol::oauth1::compose_authorization_header;
/// let params = Params::new().with("oauth_a", "1").with("status", "x").with("oauth_b", "2");
/// assert_eq!(
///     compose_authorization_header(&params, "realm1"),
///     r#"Authorization: OAuth realm="realm1", oauth_a="1", oauth_b="2""#,
/// );
/// ```
pub fn compose_authorization_header(params: &Params, realm: &str) -> String {
    format!("Authorization: {}", authorization_header_value(params, realm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::signature::PlainText;
    use crate::transport::{HttpResponse, MemoryTransport};

    fn config(signature_method: SignatureMethodConfig) -> OAuth1Config {
        OAuth1Config {
            client: ClientConfig {
                name: "photos".into(),
                api_base_url: "http://photos.example.net".into(),
                return_url: Some("http://printer.example.com/ready".into()),
                auto_refresh: true,
            },
            consumer_key: "dpf43f3p2l4k3l03".into(),
            consumer_secret: "kd94hf93k423kf44".into(),
            request_token_url: "https://photos.example.net/request_token".into(),
            request_token_method: Method::Post,
            access_token_url: "https://photos.example.net/access_token".into(),
            access_token_method: Method::Post,
            authorize_url: "http://photos.example.net/authorize".into(),
            realm: None,
            scope: None,
            signature_method,
        }
    }

    #[test]
    fn normalizes_urls() {
        assert_eq!(
            normalize_url("HTTP://Example.COM:80/r%20v/X?id=123#frag").unwrap(),
            "http://example.com/r%20v/X"
        );
        assert_eq!(
            normalize_url("https://www.example.net:8080/?q=1").unwrap(),
            "https://www.example.net:8080/"
        );
        assert_eq!(normalize_url("https://example.com:443").unwrap(), "https://example.com/");
        assert!(normalize_url("not an url").is_err());
    }

    #[test]
    fn base_string_sorts_encoded_parameters() {
        let params = Params::new()
            .with("oauth_consumer_key", "dpf43f3p2l4k3l03")
            .with("oauth_token", "nnch734d00sl2jdk")
            .with("oauth_signature_method", "HMAC-SHA1")
            .with("oauth_timestamp", "1191242096")
            .with("oauth_nonce", "kllo9940pd9333jh")
            .with("oauth_version", "1.0")
            .with("oauth_signature", "ignored");
        let base = signature_base_string(
            Method::Get,
            "http://photos.example.net/photos?file=vacation.jpg&size=original",
            &params,
        )
        .unwrap();
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg%26\
             oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh%26\
             oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096%26\
             oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );
    }

    #[test]
    fn duplicate_names_sort_by_value() {
        let params = Params::new().with("a", "2");
        let base = signature_base_string(Method::Post, "http://x/?a=1&a=3", &params).unwrap();
        assert_eq!(base, "POST&http%3A%2F%2Fx%2F&a%3D1%26a%3D2%26a%3D3");
    }

    #[cfg(feature = "hmac-sha1")]
    #[test]
    fn signs_the_photos_request() {
        let mut oauth = OAuth1::new(config(SignatureMethodConfig::HmacSha1));
        let token = Token::with_secret("nnch734d00sl2jdk", "pfkkdhi9sl3r4s00");
        let params = Params::new()
            .with("file", "vacation.jpg")
            .with("size", "original")
            .with("oauth_nonce", "kllo9940pd9333jh")
            .with("oauth_timestamp", "1191242096");
        let signed = oauth
            .sign_request(Method::Get, "http://photos.example.net/photos", params, Some(&token))
            .unwrap();
        assert_eq!(signed.get("oauth_signature"), Some("tR3+Ty81lMeYAr/Fid0kMTYa/WM="));
        assert_eq!(signed.get("file"), Some("vacation.jpg"));
        assert_eq!(signed.get("oauth_token"), Some("nnch734d00sl2jdk"));
    }

    #[test]
    fn plaintext_signature_is_the_key() {
        let mut oauth = OAuth1::new(config(SignatureMethodConfig::PlainText));
        oauth.config.consumer_secret = "cs".into();
        let token = Token::with_secret("rt", "rts");
        let signed = oauth
            .sign_request(Method::Post, "http://x/api", Params::new().with("q", "1"), Some(&token))
            .unwrap();
        assert_eq!(signed.get("oauth_signature"), Some("cs&rts"));
        assert_eq!(signed.get("oauth_signature_method"), Some("PLAINTEXT"));
        assert_eq!(signed.get("oauth_version"), Some("1.0"));
        assert!(signed.get("oauth_nonce").map_or(false, |nonce| !nonce.is_empty()));
    }

    #[test]
    fn header_keeps_order_and_skips_other_params() {
        let params = Params::new()
            .with("oauth_b", "2")
            .with("other", "x")
            .with("oauth_a", "a b");
        assert_eq!(
            compose_authorization_header(&params, ""),
            r#"Authorization: OAuth oauth_b="2", oauth_a="a%20b""#
        );
        assert_eq!(compose_authorization_header(&Params::new(), ""), "Authorization: OAuth");
        assert_eq!(
            authorization_header_value(&Params::new(), "say \"hi\""),
            r#"OAuth realm="say \"hi\"""#
        );
    }

    #[test]
    fn request_parameters_leave_the_header() {
        let mut oauth = OAuth1::new(config(SignatureMethodConfig::PlainText));
        oauth.config.realm = Some("Photos".into());
        let token = Token::with_secret("t", "s");

        let get = oauth
            .authorize_request(Method::Get, "http://x/feed", Params::new().with("page", "2"), &token)
            .unwrap();
        assert_eq!(get.url, "http://x/feed?page=2");
        let header = get.header_value("Authorization").unwrap();
        assert!(header.starts_with(r#"OAuth realm="Photos", oauth_version="1.0""#));
        assert!(header.contains(r#"oauth_token="t""#));
        assert!(!header.contains("page"));

        let post = oauth
            .authorize_request(Method::Post, "http://x/s", Params::new().with("status", "hi"), &token)
            .unwrap();
        assert_eq!(post.url, "http://x/s");
        assert_eq!(post.body_text(), Some("status=hi"));
    }

    #[test]
    fn auth_url_carries_request_token() {
        let oauth = OAuth1::new(config(SignatureMethodConfig::PlainText));
        assert_eq!(
            oauth.build_auth_url(&Token::with_secret("hh5s93j4hdidpola", "x")),
            "http://photos.example.net/authorize?oauth_token=hh5s93j4hdidpola"
        );
    }

    #[test]
    fn request_token_handshake() {
        let transport = MemoryTransport::new();
        transport.respond(
            "https://photos.example.net/request_token",
            HttpResponse::form("oauth_token=hh5s93j4hdidpola&oauth_token_secret=hdhd0244k9j7ao03&oauth_callback_confirmed=true"),
        );
        let mut oauth = OAuth1::new(config(SignatureMethodConfig::PlainText));
        let (url, state) = oauth.start_authorization(&transport).unwrap();
        assert_eq!(url, "http://photos.example.net/authorize?oauth_token=hh5s93j4hdidpola");

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, Method::Post);
        let header = request.header_value("Authorization").unwrap();
        assert!(header.contains(r#"oauth_callback="http%3A%2F%2Fprinter.example.com%2Fready""#));
        assert!(header.contains(r#"oauth_signature="kd94hf93k423kf44%26""#));

        match state {
            AuthorizationState::RequestToken(token) => {
                assert_eq!(token.secret(), Some("hdhd0244k9j7ao03"))
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn callback_must_match_request_token() {
        let transport = MemoryTransport::new();
        let mut oauth = OAuth1::new(config(SignatureMethodConfig::PlainText));
        let state = AuthorizationState::RequestToken(Token::with_secret("rt", "rts"));
        let callback = Params::new().with("oauth_token", "forged").with("oauth_verifier", "v");
        let result = oauth.exchange_token(&transport, state, &callback);
        assert!(matches!(result, Err(Error::HandshakeState(_))));
        assert!(transport.requests().is_empty());

        let state = AuthorizationState::Csrf("x".into());
        let result = oauth.exchange_token(&transport, state, &callback);
        assert!(matches!(result, Err(Error::HandshakeState(_))));
    }

    #[test]
    fn explicit_signature_method_replaces_configured_one() {
        let mut oauth = OAuth1::new(config(SignatureMethodConfig::HmacSha1));
        let method: Arc<dyn SignatureMethod> = Arc::new(PlainText);
        oauth.set_signature_method(method);
        assert_eq!(oauth.signature_method().unwrap().name(), "PLAINTEXT");
    }
}
