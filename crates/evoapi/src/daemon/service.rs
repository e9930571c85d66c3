//! Daemon service - dispatches requests to client operations.
//!
//! Holds one EvolutionClient, so the contact cache stays hot across requests
//! from every connected caller.
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial implementation

use evoapi_core::client::DEFAULT_MESSAGE_LIMIT;
use evoapi_core::{EvolutionClient, EvolutionError, MediaType, PresenceStatus};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::daemon::protocol::ErrorInfo;

type Params = HashMap<String, Value>;
type HandlerResult = std::result::Result<Value, ErrorInfo>;

/// Daemon service with a hot client.
pub struct DaemonService {
    client: EvolutionClient,
    started_at: String, // ISO timestamp
}

impl DaemonService {
    pub fn new(client: EvolutionClient) -> Self {
        Self {
            client,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Dispatch request to appropriate handler.
    pub fn dispatch(&self, method: &str, params: Params) -> HandlerResult {
        match method {
            "health" => Ok(self.health()),
            "resolve_name" => self.resolve_name(&params),
            "list_chats" => self.list_chats(&params),
            "clear_cache" => {
                self.client.clear_cache();
                Ok(json!({ "status": "success", "message": "contact cache cleared" }))
            }
            "fetch_contacts" => self.fetch_contacts(&params),
            "find_messages" => self.find_messages(&params),
            "messages_by_number" => self.messages_by_number(&params),
            "send_text" => self.send_text(&params),
            "send_media" => self.send_media(&params),
            "connection_state" => self.client.connection_state().map_err(core_error),
            "instance_info" => self.client.instance_info().map_err(core_error),
            "set_presence" => self.set_presence(&params),
            _ => Err(ErrorInfo::new(
                "UNKNOWN_METHOD",
                format!("Unknown method: {}", method),
            )),
        }
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    fn health(&self) -> Value {
        json!({
            "pid": std::process::id(),
            "started_at": self.started_at,
            "version": "v1",
            "instance": self.client.instance_name(),
            "contact_cache": self.client.cache_stats(),
        })
    }

    // ========================================================================
    // Contact names and chats
    // ========================================================================

    /// Params: number (required), use_cache (default true)
    fn resolve_name(&self, params: &Params) -> HandlerResult {
        let number = required_str(params, "number")?;
        let use_cache = bool_param(params, "use_cache", true)?;

        let name = self
            .client
            .resolve_name(number, use_cache)
            .map_err(core_error)?;
        Ok(json!({ "number": number, "name": name }))
    }

    /// Params: enrich_names (default true)
    fn list_chats(&self, params: &Params) -> HandlerResult {
        let enrich = bool_param(params, "enrich_names", true)?;
        let chats = self.client.list_chats(enrich).map_err(core_error)?;
        Ok(json!(chats))
    }

    /// Params: contact_id (optional jid)
    fn fetch_contacts(&self, params: &Params) -> HandlerResult {
        let contact_id = optional_str(params, "contact_id")?;
        let contacts = self
            .client
            .fetch_contacts(contact_id)
            .map_err(core_error)?;
        Ok(json!(contacts))
    }

    /// Params: query, chat_id (optional), limit (default 50)
    fn find_messages(&self, params: &Params) -> HandlerResult {
        let query = optional_str(params, "query")?;
        let chat_id = optional_str(params, "chat_id")?;
        let limit = u32_param(params, "limit", DEFAULT_MESSAGE_LIMIT)?;
        self.client
            .find_messages(query, chat_id, limit)
            .map_err(core_error)
    }

    /// Params: number (required), limit (default 50)
    fn messages_by_number(&self, params: &Params) -> HandlerResult {
        let number = required_str(params, "number")?;
        let limit = u32_param(params, "limit", DEFAULT_MESSAGE_LIMIT)?;
        self.client
            .messages_by_number(number, limit)
            .map_err(core_error)
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Params: number, text (required), link_preview (default true)
    fn send_text(&self, params: &Params) -> HandlerResult {
        let number = required_str(params, "number")?;
        let text = required_str(params, "text")?;
        let link_preview = bool_param(params, "link_preview", true)?;
        self.client
            .send_text(number, text, link_preview)
            .map_err(core_error)
    }

    /// Params: number, media_url, media_type (required), caption, filename
    fn send_media(&self, params: &Params) -> HandlerResult {
        let number = required_str(params, "number")?;
        let media_url = required_str(params, "media_url")?;
        let media_type: MediaType = required_str(params, "media_type")?
            .parse()
            .map_err(core_error)?;
        let caption = optional_str(params, "caption")?;
        let filename = optional_str(params, "filename")?;
        self.client
            .send_media(number, media_url, media_type, caption, filename)
            .map_err(core_error)
    }

    /// Params: status (required), number (optional)
    fn set_presence(&self, params: &Params) -> HandlerResult {
        let status: PresenceStatus = required_str(params, "status")?
            .parse()
            .map_err(core_error)?;
        let number = optional_str(params, "number")?;
        self.client
            .set_presence(status, number)
            .map_err(core_error)
    }
}

/// Map a core error onto the wire error shape.
fn core_error(err: EvolutionError) -> ErrorInfo {
    let info = ErrorInfo::new(err.code(), err.to_string());
    match err.status() {
        Some(status) => info.with_details(json!({ "status": status })),
        None => info,
    }
}

fn invalid_param(name: &str, expected: &str) -> ErrorInfo {
    ErrorInfo::new(
        "INVALID_PARAMS",
        format!("Parameter '{}' must be {}", name, expected),
    )
}

fn required_str<'a>(params: &'a Params, name: &str) -> std::result::Result<&'a str, ErrorInfo> {
    optional_str(params, name)?.ok_or_else(|| {
        ErrorInfo::new(
            "INVALID_PARAMS",
            format!("Missing required parameter '{}'", name),
        )
    })
}

fn optional_str<'a>(
    params: &'a Params,
    name: &str,
) -> std::result::Result<Option<&'a str>, ErrorInfo> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(invalid_param(name, "a string")),
    }
}

fn bool_param(params: &Params, name: &str, default: bool) -> std::result::Result<bool, ErrorInfo> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(invalid_param(name, "a boolean")),
    }
}

fn u32_param(params: &Params, name: &str, default: u32) -> std::result::Result<u32, ErrorInfo> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| invalid_param(name, "a non-negative integer")),
    }
}
