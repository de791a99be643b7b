//! Blocking transport on top of `reqwest`.
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::{HttpRequest, HttpResponse, Method, Transport, TransportError};

/// Sends requests with a blocking `reqwest` client.
///
/// Redirects are not followed, token endpoints answer directly and a redirect there usually
/// points at a login page rather than at data.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// A transport with the given overall request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| TransportError::new(err.to_string()))?;
        Ok(ReqwestTransport { client })
    }

    /// Use an already configured client.
    pub fn from_client(client: Client) -> Self {
        ReqwestTransport { client }
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let mut builder = self.client.request(method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .map_err(|err| TransportError::new(err.to_string()))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|err| TransportError::new(err.to_string()))?
            .to_vec();
        debug!(status, "received response");

        Ok(HttpResponse { status, headers, body })
    }
}
