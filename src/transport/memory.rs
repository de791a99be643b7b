//! A scripted transport without network access.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use super::{HttpRequest, HttpResponse, Transport, TransportError};

/// Answers requests from queued responses and records every request.
///
/// Responses are queued per url, where the url is compared without its query string. Each
/// request consumes the next queued response for its url; once the queue holds only one response
/// that response is repeated. Requests to urls without responses fail with a `TransportError`,
/// unless a fallback was set.
///
/// Clones share their script and their request log.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    responses: Arc<DashMap<String, VecDeque<HttpResponse>>>,
    fallback: Option<HttpResponse>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MemoryTransport {
    /// A transport with an empty script.
    pub fn new() -> Self {
        MemoryTransport::default()
    }

    /// A transport answering unknown urls with the given response.
    pub fn with_fallback(response: HttpResponse) -> Self {
        MemoryTransport {
            fallback: Some(response),
            ..MemoryTransport::default()
        }
    }

    /// Queue a response for the url.
    pub fn respond<U: AsRef<str>>(&self, url: U, response: HttpResponse) -> &Self {
        self.responses
            .entry(strip_query(url.as_ref()).to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// All requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests().pop()
    }

    fn record(&self, request: HttpRequest) {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request),
            Err(poisoned) => poisoned.into_inner().push(request),
        }
    }

    fn next_response(&self, url: &str) -> Option<HttpResponse> {
        let mut queue = self.responses.get_mut(strip_query(url))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn strip_query(url: &str) -> &str {
    match url.find(|c| c == '?' || c == '#') {
        Some(idx) => &url[..idx],
        None => url,
    }
}

impl Transport for MemoryTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .next_response(&request.url)
            .or_else(|| self.fallback.clone());
        let url = request.url.clone();
        self.record(request);
        response.ok_or_else(|| TransportError::new(format!("no response scripted for {}", url)))
    }
}
