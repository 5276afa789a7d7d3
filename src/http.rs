//! The thin layer between this crate and the network.
//!
//! Everything that talks HTTP goes through [`Transport`], so the retry loop,
//! the image download and the notifier can be driven by a scripted fake in
//! tests. [`MinreqTransport`] is the real thing.

use std::io;

use crate::error::Failure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Seconds.
    pub timeout: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: u64) -> Self {
        HttpRequest {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn post(url: impl Into<String>, timeout: u64) -> Self {
        HttpRequest { method: Method::Post, ..HttpRequest::get(url, timeout) }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Value of the first query parameter named `key`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Value of the first header named `key`, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: i32,
    pub reason: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The response as a [`Failure`], for statuses outside 2xx.
    pub fn status_failure(&self) -> Failure {
        Failure::Status { code: self.status, reason: self.reason.clone() }
    }
}

/// Errors raised before any HTTP status was seen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for Failure {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(m) => Failure::Timeout(m),
            TransportError::Connection(m) => Failure::Connection(m),
            TransportError::Other(m) => Failure::Other(m),
        }
    }
}

pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

/// Blocking transport backed by `minreq`.
#[derive(Debug, Clone, Default)]
pub struct MinreqTransport {
    user_agent: Option<String>,
}

impl MinreqTransport {
    pub fn new() -> Self {
        MinreqTransport::default()
    }

    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        MinreqTransport { user_agent: Some(user_agent.into()) }
    }
}

impl Transport for MinreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => minreq::Method::Get,
            Method::Post => minreq::Method::Post,
        };
        let mut r = minreq::Request::new(method, request.url.as_str()).with_timeout(request.timeout);
        for (k, v) in &request.query {
            r = r.with_param(k.as_str(), v.as_str());
        }
        if let Some(ua) = &self.user_agent {
            r = r.with_header("User-Agent", ua.as_str());
        }
        for (k, v) in &request.headers {
            r = r.with_header(k.as_str(), v.as_str());
        }
        if let Some(body) = &request.body {
            r = r.with_body(body.clone());
        }

        let resp = r.send().map_err(classify)?;
        Ok(HttpResponse {
            status: resp.status_code,
            reason: resp.reason_phrase.clone(),
            body: resp.into_bytes(),
        })
    }
}

fn classify(e: minreq::Error) -> TransportError {
    match e {
        minreq::Error::IoError(io) => match io.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                TransportError::Timeout(io.to_string())
            }
            _ => TransportError::Connection(io.to_string()),
        },
        err @ minreq::Error::AddressNotFound => TransportError::Connection(err.to_string()),
        other => TransportError::Other(other.to_string()),
    }
}
