//! Transport abstraction for physically issuing requests.
//!
//! The dispatcher, cache and enrichment pipeline only see [`Transport`].
//! [`HttpTransport`] talks to a real server. `FakeTransport` (feature
//! `test-util`) replays scripted responses for tests.
//!
//! CHANGELOG:
//! - 10/18/2026 - Resets and dropped connections map to Connect
//! - 10/18/2026 - FakeTransport behind the `test-util` feature
//! - 10/18/2026 - Added FakeTransport for tests
//! - 10/18/2026 - Initial implementation

use serde_json::Value;
#[cfg(any(test, feature = "test-util"))]
use std::collections::VecDeque;
use std::error::Error as StdError;
use std::io;
#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::dispatch::Method;

/// A fully resolved request, ready to send.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute URL (base URL + resolved endpoint)
    pub url: String,
    /// Resolved endpoint path, kept for diagnostics
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures below the HTTP layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

/// Something that can carry an [`ApiRequest`] to the remote API.
pub trait Transport: Send + Sync {
    /// Send the request and block until a response or a transport failure.
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

/// Real transport using a blocking reqwest client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(map_reqwest_error)?;

        Ok(RawResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        return TransportError::Timeout;
    }

    match io_error_kind(&e) {
        Some(io::ErrorKind::TimedOut) => return TransportError::Timeout,
        Some(
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof,
        ) => return TransportError::Connect(e.to_string()),
        _ => {}
    }

    // `is_request` covers the peer closing the connection before a
    // complete response arrived
    if e.is_connect() || e.is_request() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// First `io::Error` kind in the source chain, if any.
fn io_error_kind(e: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = err.source();
    }
    None
}

/// Scripted transport for tests.
///
/// Responses are routed by endpoint substring; each route replays its queue
/// in order and repeats the last entry once the queue is down to one.
/// Every request is recorded.
#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<(String, VecDeque<Result<RawResponse, TransportError>>)>>,
    calls: Mutex<Vec<ApiRequest>>,
    delay: Option<Duration>,
}

#[cfg(any(test, feature = "test-util"))]
impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every `send` (for concurrency tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a response for requests whose endpoint contains `endpoint`.
    pub fn respond(&self, endpoint: &str, response: Result<RawResponse, TransportError>) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        match routes.iter_mut().find(|(route, _)| route == endpoint) {
            Some((_, queue)) => queue.push_back(response),
            None => routes.push((endpoint.to_string(), VecDeque::from([response]))),
        }
    }

    /// Queue a 200 JSON response.
    pub fn respond_json(&self, endpoint: &str, value: Value) {
        self.respond(endpoint, Ok(RawResponse::json(200, &value)));
    }

    /// All recorded requests.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of recorded requests whose endpoint contains `endpoint`.
    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.endpoint.contains(endpoint))
            .count()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Transport for FakeTransport {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        let queue = routes
            .iter_mut()
            .find(|(route, _)| request.endpoint.contains(route.as_str()))
            .map(|(_, queue)| queue);

        match queue {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("empty route".to_string()))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(TransportError::Other("empty route".to_string()))),
            None => Ok(RawResponse::new(404, "no scripted response")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;
    use std::net::TcpListener;

    fn request(endpoint: &str) -> ApiRequest {
        ApiRequest {
            method: Method::Post,
            url: format!("http://localhost{}", endpoint),
            endpoint: endpoint.to_string(),
            headers: Vec::new(),
            body: None,
            query: Vec::new(),
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_fake_replays_in_order_then_repeats_last() {
        let fake = FakeTransport::new();
        fake.respond_json("/chat/findContacts", json!([1]));
        fake.respond_json("/chat/findContacts", json!([2]));

        let req = request("/chat/findContacts/main");
        assert_eq!(fake.send(&req).unwrap().body, "[1]");
        assert_eq!(fake.send(&req).unwrap().body, "[2]");
        assert_eq!(fake.send(&req).unwrap().body, "[2]");
        assert_eq!(fake.call_count("/chat/findContacts"), 3);
    }

    #[test]
    fn test_fake_unrouted_is_404() {
        let fake = FakeTransport::new();
        let resp = fake.send(&request("/nowhere")).unwrap();
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_raw_response_success_range() {
        assert!(RawResponse::new(200, "").is_success());
        assert!(RawResponse::new(201, "").is_success());
        assert!(!RawResponse::new(301, "").is_success());
        assert!(!RawResponse::new(500, "").is_success());
    }

    #[test]
    fn test_peer_dropping_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            // Dropped without writing a response
        });

        let transport = HttpTransport::new().unwrap();
        let mut req = request("/instance/connectionState/main");
        req.method = Method::Get;
        req.url = format!("http://{}{}", addr, req.endpoint);

        let err = transport.send(&req).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, TransportError::Connect(_)), "got {:?}", err);
    }

    #[test]
    fn test_refused_connection_is_connect_error() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let transport = HttpTransport::new().unwrap();
        let mut req = request("/instance/connectionState/main");
        req.url = format!("http://{}{}", addr, req.endpoint);

        let err = transport.send(&req).unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "got {:?}", err);
    }
}
