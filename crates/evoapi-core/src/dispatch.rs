//! Request dispatcher: endpoint resolution, auth header, error mapping.
//!
//! One attempt per call. No retry, no backoff.
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial implementation

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{EvolutionError, Result};
use crate::transport::{ApiRequest, Transport, TransportError};

/// Placeholder substituted with the configured instance name.
pub const INSTANCE_PLACEHOLDER: &str = "{instanceId}";

pub const FIND_CHATS: &str = "/chat/findChats/{instanceId}";
pub const FIND_MESSAGES: &str = "/chat/findMessages/{instanceId}";
pub const FIND_CONTACTS: &str = "/chat/findContacts/{instanceId}";
pub const SEND_TEXT: &str = "/message/sendText/{instanceId}";
pub const SEND_MEDIA: &str = "/message/sendMedia/{instanceId}";
pub const CONNECTION_STATE: &str = "/instance/connectionState/{instanceId}";
pub const PRESENCE_UPDATE: &str = "/chat/presenceUpdate/{instanceId}";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// Issues requests for one configured instance.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: String,
    instance_id: String,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        instance_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            instance_id: instance_id.into(),
            timeout,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Substitute the instance name into an endpoint template.
    pub fn resolve_endpoint(&self, template: &str) -> String {
        template.replace(INSTANCE_PLACEHOLDER, &self.instance_id)
    }

    /// Execute a request and map the outcome into the error taxonomy.
    ///
    /// A 2xx body that is not JSON comes back as
    /// `{"status": "success", "data": <raw text>}`.
    pub fn execute(
        &self,
        method: Method,
        template: &str,
        body: Option<Value>,
        query: &[(&str, &str)],
    ) -> Result<Value> {
        let endpoint = self.resolve_endpoint(template);
        let request = ApiRequest {
            method,
            url: format!("{}{}", self.base_url, endpoint),
            endpoint: endpoint.clone(),
            headers: vec![
                ("apikey".to_string(), self.api_key.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body,
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            timeout: self.timeout,
        };

        tracing::info!(%method, endpoint = %endpoint, "dispatching request");

        let response = self.transport.send(&request).map_err(|e| {
            let err = match e {
                TransportError::Timeout => EvolutionError::Timeout {
                    method: method.to_string(),
                    endpoint: endpoint.clone(),
                },
                TransportError::Connect(msg) => EvolutionError::Connection(msg),
                TransportError::Other(msg) => EvolutionError::Api {
                    status: None,
                    body: format!("{} {}: {}", method, endpoint, msg),
                },
            };
            tracing::error!(%method, endpoint = %endpoint, error = %err, "request failed");
            err
        })?;

        if !response.is_success() {
            tracing::error!(
                %method,
                endpoint = %endpoint,
                status = response.status,
                body = %response.body,
                "request failed"
            );
            return Err(match response.status {
                401 => EvolutionError::Authentication(
                    "check EVOLUTION_API_TOKEN".to_string(),
                ),
                404 => EvolutionError::NotFound { endpoint },
                status => EvolutionError::Api {
                    status: Some(status),
                    body: response.body,
                },
            });
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(value) => Ok(value),
            Err(_) => Ok(json!({
                "status": "success",
                "data": response.body,
            })),
        }
    }
}
