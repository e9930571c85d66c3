//! Daemon protocol types for NDJSON communication over UNIX socket.
//!
//! Request:  `{"id": "uuid", "v": 1, "method": "...", "params": {...}}`
//! Response: `{"id": "uuid", "ok": true, "result": ..., "error": null, "meta": {...}}`
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial implementation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// NDJSON request from client to daemon.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    /// Unique request ID (UUID)
    pub id: String,
    /// Protocol version (currently 1)
    #[serde(default = "default_version")]
    pub v: u8,
    /// Method name (e.g., "health", "list_chats", "send_text")
    pub method: String,
    /// Method parameters (flexible key-value map)
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

fn default_version() -> u8 {
    PROTOCOL_VERSION
}

/// NDJSON response from daemon to client.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    /// Request ID (matches request)
    pub id: String,
    /// Success flag
    pub ok: bool,
    /// Result data (if successful)
    pub result: Option<Value>,
    /// Error information (if failed)
    pub error: Option<ErrorInfo>,
    /// Response metadata
    pub meta: ResponseMeta,
}

/// Error details in response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code (e.g., "NOT_FOUND", "INVALID_PARAMS")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Additional error details (optional)
    pub details: Option<Value>,
}

/// Response metadata.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Server execution time in milliseconds
    pub server_ms: f64,
    /// Protocol version
    pub protocol_v: u8,
}

impl Request {
    /// Build a request with a fresh id.
    pub fn new(method: impl Into<String>, params: HashMap<String, Value>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            v: PROTOCOL_VERSION,
            method: method.into(),
            params,
        }
    }

    /// Parse request from NDJSON line.
    pub fn from_ndjson_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).context("Failed to parse request JSON")
    }

    /// Serialize request to NDJSON line.
    pub fn to_ndjson_line(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

impl Response {
    /// Create a success response.
    pub fn success(id: String, result: Value, server_ms: f64) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
            meta: ResponseMeta {
                server_ms,
                protocol_v: PROTOCOL_VERSION,
            },
        }
    }

    /// Create an error response.
    pub fn error(id: String, error: ErrorInfo, server_ms: f64) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(error),
            meta: ResponseMeta {
                server_ms,
                protocol_v: PROTOCOL_VERSION,
            },
        }
    }

    /// Parse response from NDJSON line.
    pub fn from_ndjson_line(line: &str) -> Result<Self> {
        serde_json::from_str(line).context("Failed to parse response JSON")
    }

    /// Serialize response to NDJSON line.
    pub fn to_ndjson_line(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let req = Request::from_ndjson_line(r#"{"id":"1","method":"health"}"#).unwrap();
        assert_eq!(req.v, 1);
        assert!(req.params.is_empty());
    }

    #[test]
    fn test_response_line_is_single_line() {
        let resp = Response::success("1".into(), json!({"a": [1, 2]}), 0.5);
        let line = resp.to_ndjson_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let back = Response::from_ndjson_line(&line).unwrap();
        assert!(back.ok);
        assert_eq!(back.id, "1");
    }
}
