//! The network seam of the client.
//!
//! The engine never opens connections itself. It describes each call as an [`HttpRequest`] and
//! hands it to a [`Transport`], which is expected to return the status, headers and body of the
//! response. Timeouts, proxies, connection reuse and retries are the business of the transport;
//! any error it returns is final for that call.
//!
//! Two implementations are provided: [`MemoryTransport`] answers from scripted responses and
//! records what was sent, and, with the `reqwest-transport` feature, [`ReqwestTransport`] performs
//! real blocking requests.
//!
//! [`HttpRequest`]: struct.HttpRequest.html
//! [`Transport`]: trait.Transport.html
//! [`MemoryTransport`]: memory/struct.MemoryTransport.html
//! [`ReqwestTransport`]: blocking/struct.ReqwestTransport.html
use std::fmt;
use std::str;

use serde_derive::Deserialize;
use thiserror::Error;

pub mod memory;
#[cfg(feature = "reqwest-transport")]
pub mod blocking;

pub use self::memory::MemoryTransport;
#[cfg(feature = "reqwest-transport")]
pub use self::blocking::ReqwestTransport;

/// The http methods used by OAuth exchanges and api calls.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
}

impl Method {
    /// The upper case method token.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    /// Whether request parameters travel in the body rather than the query.
    pub fn has_body(self) -> bool {
        match self {
            Method::Post | Method::Put | Method::Patch => true,
            Method::Get | Method::Delete | Method::Head => false,
        }
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::Get
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl str::FromStr for Method {
    type Err = TransportError;

    fn from_str(method: &str) -> Result<Self, Self::Err> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            other => Err(TransportError::new(format!("unsupported method `{}`", other))),
        }
    }
}

/// A fully prepared request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    /// The http method.
    pub method: Method,
    /// Absolute target url, including any query.
    pub url: String,
    /// Header name and value pairs.
    pub headers: Vec<(String, String)>,
    /// The body, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// A request without headers or body.
    pub fn new<U: Into<String>>(method: Method, url: U) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header.
    pub fn header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set a `application/x-www-form-urlencoded` body.
    pub fn form(mut self, body: String) -> Self {
        self.headers.push((
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ));
        self.body = Some(body.into_bytes());
        self
    }

    /// Look up a header by case insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The body as text, if it is valid utf-8.
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_ref().and_then(|body| str::from_utf8(body).ok())
    }
}

/// The answer to an `HttpRequest`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// The http status code.
    pub status: u16,
    /// Header name and value pairs.
    pub headers: Vec<(String, String)>,
    /// The raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A response with the given status and body and no headers.
    pub fn new<B: Into<Vec<u8>>>(status: u16, body: B) -> Self {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A `200` response with a json body.
    pub fn json<B: Into<Vec<u8>>>(body: B) -> Self {
        HttpResponse::new(200, body).header("Content-Type", "application/json")
    }

    /// A `200` response with a form encoded body.
    pub fn form<B: Into<Vec<u8>>>(body: B) -> Self {
        HttpResponse::new(200, body).header("Content-Type", "application/x-www-form-urlencoded")
    }

    /// Add a header.
    pub fn header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Whether the status is in the `2xx` range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header by case insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The body decoded as utf-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// A request could not be delivered or its response not be read.
#[derive(Debug, Error)]
#[error("transport failure: {message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Describe a failure.
    pub fn new<M: Into<String>>(message: M) -> Self {
        TransportError {
            message: message.into(),
        }
    }

    /// The description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Executes http requests.
///
/// Calls are blocking. Implementations must be usable from several threads if the client is
/// shared, which is why the method takes `&self`.
pub trait Transport: Send + Sync {
    /// Send the request and return the complete response.
    ///
    /// Any status code, including errors, is a successful delivery and must be returned as a
    /// response. Only failures to deliver are errors.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<'a, T: Transport + ?Sized> Transport for &'a T {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}
