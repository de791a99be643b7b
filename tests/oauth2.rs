use chrono::{Duration, Utc};

use oxide_auth_client::config::{BearerPlacement, ClientConfig, OAuth2Config};
use oxide_auth_client::primitives::codec::parse_query_string;
use oxide_auth_client::primitives::state::{MemoryStore, StateStore};
use oxide_auth_client::transport::{HttpResponse, MemoryTransport};
use oxide_auth_client::{Client, Client2, Error, Method, Params, Token};

const TOKEN_URL: &str = "http://token";
const API_URL: &str = "http://api/v2/me";

fn config() -> OAuth2Config {
    OAuth2Config {
        client: ClientConfig {
            name: "example".into(),
            api_base_url: "http://api/v2".into(),
            return_url: Some("http://cb".into()),
            auto_refresh: true,
        },
        client_id: "cid".into(),
        client_secret: "secret".into(),
        authorize_url: "http://auth".into(),
        token_url: TOKEN_URL.into(),
        scope: Some("profile".into()),
        bearer: BearerPlacement::Query,
    }
}

fn client(transport: &MemoryTransport, store: &MemoryStore) -> Client2 {
    Client::oauth2(config(), transport.clone(), store.clone())
}

fn state_of(url: &str) -> String {
    let query = &url[url.find('?').unwrap() + 1..];
    parse_query_string(query).get("state").unwrap().to_string()
}

fn api_tokens(transport: &MemoryTransport) -> Vec<String> {
    transport
        .requests()
        .iter()
        .filter(|request| request.url.starts_with(API_URL))
        .map(|request| {
            let query = &request.url[API_URL.len() + 1..];
            parse_query_string(query).get("access_token").unwrap().to_string()
        })
        .collect()
}

fn token_requests(transport: &MemoryTransport) -> usize {
    transport
        .requests()
        .iter()
        .filter(|request| request.url == TOKEN_URL)
        .count()
}

#[test]
fn authorization_url() {
    let transport = MemoryTransport::new();
    let url = client(&transport, &MemoryStore::new()).authorize_url().unwrap();
    assert!(url.starts_with("http://auth?"));
    assert!(url.contains("client_id=cid"));
    assert!(url.contains("redirect_uri=http%3A%2F%2Fcb"));
    assert!(url.contains("response_type=code"));
    assert!(url.contains("scope=profile"));
    assert!(!state_of(&url).is_empty());
}

#[test]
fn code_grant_handshake() {
    let transport = MemoryTransport::new();
    let store = MemoryStore::new();
    transport
        .respond(TOKEN_URL, HttpResponse::json(r#"{"access_token":"at","token_type":"bearer","expires_in":3600,"refresh_token":"rt"}"#))
        .respond(API_URL, HttpResponse::json(r#"{"name":"someone"}"#));

    let url = client(&transport, &store).authorize_url().unwrap();
    let callback = Params::new()
        .with("code", "splxlOBeZQQYbYS6WxSbIA")
        .with("state", state_of(&url));

    let token = client(&transport, &store).handle_callback(&callback).unwrap();
    assert_eq!(token.token(), "at");
    assert_eq!(token.refresh_token(), Some("rt"));
    assert_eq!(token.param("token_type"), Some("bearer"));

    let decoded = client(&transport, &store).api("me", Method::Get, Params::new()).unwrap();
    assert_eq!(decoded.field("name").as_deref(), Some("someone"));
    assert_eq!(api_tokens(&transport), vec!["at"]);
}

#[test]
fn forged_state_is_rejected_and_consumes_the_handshake() {
    let transport = MemoryTransport::new();
    let store = MemoryStore::new();
    let url = client(&transport, &store).authorize_url().unwrap();

    let forged = Params::new().with("code", "c").with("state", "guess");
    let result = client(&transport, &store).handle_callback(&forged);
    assert!(matches!(result, Err(Error::HandshakeState(_))));

    let genuine = Params::new().with("code", "c").with("state", state_of(&url));
    let result = client(&transport, &store).handle_callback(&genuine);
    assert!(matches!(result, Err(Error::HandshakeState(_))));
    assert!(transport.requests().is_empty());
}

#[test]
fn denied_authorization_surfaces_provider_error() {
    let transport = MemoryTransport::new();
    let store = MemoryStore::new();
    let url = client(&transport, &store).authorize_url().unwrap();

    let result = client(&transport, &store).handle_callback_query(&format!(
        "error=access_denied&error_description=The+user+declined&state={}",
        state_of(&url)
    ));
    match result {
        Err(Error::Provider { error, description }) => {
            assert_eq!(error, "access_denied");
            assert_eq!(description.as_deref(), Some("The user declined"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn denial_without_state_is_a_handshake_error() {
    let transport = MemoryTransport::new();
    let store = MemoryStore::new();
    client(&transport, &store).authorize_url().unwrap();

    let result = client(&transport, &store).handle_callback_query("error=access_denied");
    assert!(matches!(result, Err(Error::HandshakeState(_))));
    assert!(transport.requests().is_empty());
}

#[test]
fn rejected_code_exchange() {
    let transport = MemoryTransport::new();
    let store = MemoryStore::new();
    transport.respond(
        TOKEN_URL,
        HttpResponse::new(400, r#"{"error":"invalid_grant","error_description":"code expired"}"#),
    );
    let url = client(&transport, &store).authorize_url().unwrap();
    let callback = Params::new().with("code", "old").with("state", state_of(&url));
    let result = client(&transport, &store).handle_callback(&callback);
    assert!(matches!(result, Err(Error::Provider { ref error, .. }) if error == "invalid_grant"));
    assert!(store.get("oauth2_example_token").is_none());
}

#[test]
fn unrepresentable_lifetime_fails_the_exchange() {
    let transport = MemoryTransport::new();
    let store = MemoryStore::new();
    transport.respond(
        TOKEN_URL,
        HttpResponse::json(r#"{"access_token":"at","expires_in":99999999999999999}"#),
    );
    let url = client(&transport, &store).authorize_url().unwrap();
    let callback = Params::new().with("code", "c").with("state", state_of(&url));
    let result = client(&transport, &store).handle_callback(&callback);
    assert!(matches!(result, Err(Error::Response(_))));
    assert!(store.get("oauth2_example_token").is_none());
}

#[test]
fn expired_token_is_refreshed_before_the_call() {
    let transport = MemoryTransport::new();
    let store = MemoryStore::new();
    transport
        .respond(TOKEN_URL, HttpResponse::json(r#"{"access_token":"fresh","expires_in":3600}"#))
        .respond(API_URL, HttpResponse::json("{}"));

    let mut client = client(&transport, &store);
    client.set_access_token(
        Token::new("stale")
            .refreshable_with("rt")
            .expiring_at(Utc::now() - Duration::seconds(1)),
    );
    client.api("/me", Method::Get, Params::new()).unwrap();

    assert_eq!(api_tokens(&transport), vec!["fresh"]);
    assert_eq!(token_requests(&transport), 1);
    let persisted = Token::from_query_string(&store.get("oauth2_example_token").unwrap()).unwrap();
    assert_eq!(persisted.token(), "fresh");
    assert_eq!(persisted.refresh_token(), Some("rt"));
}

#[test]
fn unauthorized_reply_triggers_one_refresh_and_retry() {
    let transport = MemoryTransport::new();
    transport
        .respond(TOKEN_URL, HttpResponse::json(r#"{"access_token":"fresh","refresh_token":"rt2"}"#))
        .respond(API_URL, HttpResponse::new(401, ""))
        .respond(API_URL, HttpResponse::json(r#"{"ok":true}"#));

    let mut client = client(&transport, &MemoryStore::new());
    client.set_access_token(Token::new("revoked").refreshable_with("rt"));
    let decoded = client.api("me", Method::Get, Params::new()).unwrap();

    assert_eq!(decoded.field("ok").as_deref(), Some("true"));
    assert_eq!(api_tokens(&transport), vec!["revoked", "fresh"]);
    assert_eq!(token_requests(&transport), 1);
    assert_eq!(client.access_token().unwrap().unwrap().refresh_token(), Some("rt2"));
}

#[test]
fn persistent_rejection_is_not_retried_twice() {
    let transport = MemoryTransport::new();
    transport
        .respond(TOKEN_URL, HttpResponse::json(r#"{"access_token":"fresh"}"#))
        .respond(API_URL, HttpResponse::new(401, "denied"));

    let mut client = client(&transport, &MemoryStore::new());
    client.set_access_token(Token::new("revoked").refreshable_with("rt"));
    let result = client.api("me", Method::Get, Params::new());

    match result {
        Err(err @ Error::Status { .. }) => assert!(err.requires_authorization()),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(api_tokens(&transport), vec!["revoked", "fresh"]);
    assert_eq!(token_requests(&transport), 1);
}

#[test]
fn expired_without_refresh_token() {
    let transport = MemoryTransport::with_fallback(HttpResponse::json("{}"));
    let mut client = client(&transport, &MemoryStore::new());
    client.set_access_token(Token::new("at").expiring_at(Utc::now() - Duration::seconds(1)));
    assert!(matches!(
        client.api("me", Method::Get, Params::new()),
        Err(Error::TokenExpired)
    ));
    assert!(transport.requests().is_empty());
}

#[test]
fn auto_refresh_can_be_disabled() {
    let transport = MemoryTransport::with_fallback(HttpResponse::json("{}"));
    let mut config = config();
    config.client.auto_refresh = false;
    let mut client = Client::oauth2(config, transport.clone(), MemoryStore::new());
    client.set_access_token(
        Token::new("at")
            .refreshable_with("rt")
            .expiring_at(Utc::now() - Duration::seconds(1)),
    );
    assert!(matches!(
        client.api("me", Method::Get, Params::new()),
        Err(Error::TokenExpired)
    ));

    // An explicit refresh still reaches the token endpoint, which answers without a token here.
    let refreshed = client.refresh_access_token();
    assert!(matches!(refreshed, Err(Error::Response(_))));
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn server_errors_are_not_retried() {
    let transport = MemoryTransport::new();
    transport.respond(API_URL, HttpResponse::new(503, "maintenance"));
    let mut client = client(&transport, &MemoryStore::new());
    client.set_access_token(Token::new("at").refreshable_with("rt"));

    match client.api("http://api/v2/me", Method::Get, Params::new()) {
        Err(Error::Status { status, body, .. }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(transport.requests().len(), 1);
}

#[test]
fn bearer_header_placement() {
    let transport = MemoryTransport::new();
    transport.respond(API_URL, HttpResponse::json("[]"));
    let mut config = config();
    config.bearer = BearerPlacement::Header;
    let mut client = Client::oauth2(config, transport.clone(), MemoryStore::new());
    client.set_access_token(Token::new("at"));

    client.api("me", Method::Delete, Params::new().with("id", "7")).unwrap();
    let request = transport.last_request().unwrap();
    assert_eq!(request.url, "http://api/v2/me?id=7");
    assert_eq!(request.header_value("authorization"), Some("Bearer at"));
}
