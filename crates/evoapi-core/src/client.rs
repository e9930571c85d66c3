//! EvolutionClient - the handle every front end calls.
//!
//! Built once per instance and passed around; each handle owns its own
//! contact cache, so independent handles never share state.
//!
//! CHANGELOG:
//! - 10/18/2026 - Added media, presence and instance operations
//! - 10/18/2026 - Initial implementation

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStats, Clock, ContactCache, SystemClock};
use crate::config::EvolutionConfig;
use crate::dispatch::{
    Dispatcher, Method, CONNECTION_STATE, FIND_CHATS, FIND_CONTACTS, FIND_MESSAGES,
    PRESENCE_UPDATE, SEND_MEDIA, SEND_TEXT,
};
use crate::enrich::{self, Enriched};
use crate::error::{EvolutionError, Result};
use crate::models::{ChatSummary, ContactRecord};
use crate::transport::{HttpTransport, Transport};
use crate::validate::{self, MediaType, PresenceStatus, MAX_CAPTION_LENGTH, MAX_TEXT_LENGTH};

/// Default page size for message searches.
pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;

/// Client for one Evolution API instance.
pub struct EvolutionClient {
    dispatcher: Dispatcher,
    cache: ContactCache,
}

impl EvolutionClient {
    /// Build a client talking HTTP to the configured server.
    pub fn from_config(config: &EvolutionConfig) -> Result<Self> {
        let transport = HttpTransport::new().map_err(|e| EvolutionError::Api {
            status: None,
            body: e.to_string(),
        })?;
        Ok(Self::with_transport(
            Arc::new(transport),
            &config.base_url,
            &config.api_token,
            &config.instance_name,
            config.timeout,
        ))
    }

    /// Build a client on top of any transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        base_url: &str,
        api_key: &str,
        instance_name: &str,
        timeout: Duration,
    ) -> Self {
        Self::with_transport_and_clock(
            transport,
            base_url,
            api_key,
            instance_name,
            timeout,
            Arc::new(SystemClock),
        )
    }

    pub fn with_transport_and_clock(
        transport: Arc<dyn Transport>,
        base_url: &str,
        api_key: &str,
        instance_name: &str,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dispatcher = Dispatcher::new(transport, base_url, api_key, instance_name, timeout);
        let cache = ContactCache::with_clock(dispatcher.clone(), clock);
        tracing::info!(instance = instance_name, "client initialized");
        Self { dispatcher, cache }
    }

    pub fn instance_name(&self) -> &str {
        self.dispatcher.instance_id()
    }

    pub fn cache(&self) -> &ContactCache {
        &self.cache
    }

    // =========================================================================
    // CONTACT NAMES
    // =========================================================================

    /// Resolve a phone number to its contact name.
    pub fn resolve_name(&self, number: &str, use_cache: bool) -> Result<Option<String>> {
        let id = validate::normalize(number)?;
        self.cache.lookup_one(&id, use_cache)
    }

    /// Discard cached contact names.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // =========================================================================
    // CHATS, CONTACTS, MESSAGES
    // =========================================================================

    /// List chats, optionally filling missing names from contacts.
    ///
    /// Enrichment failures never fail the listing.
    pub fn list_chats(&self, enrich_names: bool) -> Result<Vec<ChatSummary>> {
        let value = self
            .dispatcher
            .execute(Method::Post, FIND_CHATS, Some(json!({})), &[])?;

        if !value.is_array() {
            tracing::warn!("findChats did not return a list");
            return Err(EvolutionError::Api {
                status: None,
                body: format!("unexpected findChats payload: {}", value),
            });
        }

        let chats: Vec<ChatSummary> =
            serde_json::from_value(value).map_err(|e| EvolutionError::Api {
                status: None,
                body: format!("unexpected findChats payload: {}", e),
            })?;

        if !enrich_names {
            return Ok(chats);
        }

        let Enriched { chats, .. } = enrich::enrich(&self.cache, chats);
        Ok(chats)
    }

    /// Fetch contacts, all of them or one jid.
    pub fn fetch_contacts(&self, contact_id: Option<&str>) -> Result<Vec<ContactRecord>> {
        let mut payload = Map::new();
        if let Some(id) = contact_id {
            payload.insert("where".to_string(), json!({ "id": id }));
        }

        let value = self.dispatcher.execute(
            Method::Post,
            FIND_CONTACTS,
            Some(Value::Object(payload)),
            &[],
        )?;
        Ok(ContactRecord::list_from_value(value))
    }

    /// Search messages by text and/or chat.
    pub fn find_messages(
        &self,
        query: Option<&str>,
        chat_id: Option<&str>,
        limit: u32,
    ) -> Result<Value> {
        let mut payload = Map::new();
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            payload.insert("query".to_string(), json!(q));
        }
        if let Some(chat) = chat_id.filter(|c| !c.is_empty()) {
            payload.insert("chatId".to_string(), json!(chat));
        }
        if limit > 0 {
            payload.insert("limit".to_string(), json!(limit));
        }

        self.dispatcher
            .execute(Method::Post, FIND_MESSAGES, Some(Value::Object(payload)), &[])
    }

    /// Messages of the conversation with `number`.
    pub fn messages_by_number(&self, number: &str, limit: u32) -> Result<Value> {
        let id = validate::normalize(number)?;
        let chat_id = validate::to_chat_identifier(&id);
        self.find_messages(None, Some(&chat_id), limit)
    }

    // =========================================================================
    // SENDING
    // =========================================================================

    pub fn send_text(&self, number: &str, text: &str, link_preview: bool) -> Result<Value> {
        let id = validate::normalize(number)?;
        validate::validate_text_length(text, MAX_TEXT_LENGTH, "text")?;

        tracing::info!(number = %id, "sending text message");
        self.dispatcher.execute(
            Method::Post,
            SEND_TEXT,
            Some(json!({
                "number": id,
                "text": text,
                "linkPreview": link_preview,
            })),
            &[],
        )
    }

    pub fn send_media(
        &self,
        number: &str,
        media_url: &str,
        media_type: MediaType,
        caption: Option<&str>,
        filename: Option<&str>,
    ) -> Result<Value> {
        let id = validate::normalize(number)?;
        validate::validate_url(media_url, "media_url")?;
        let caption = caption.filter(|c| !c.is_empty());
        if let Some(c) = caption {
            validate::validate_text_length(c, MAX_CAPTION_LENGTH, "caption")?;
        }

        let mut payload = Map::new();
        payload.insert("number".to_string(), json!(id));
        payload.insert("mediatype".to_string(), json!(media_type));
        payload.insert("media".to_string(), json!(media_url));
        if let Some(c) = caption {
            payload.insert("caption".to_string(), json!(c));
        }
        if let Some(name) = filename.filter(|f| !f.is_empty()) {
            payload.insert("fileName".to_string(), json!(name));
        }

        tracing::info!(number = %id, media_type = %media_type, "sending media");
        self.dispatcher
            .execute(Method::Post, SEND_MEDIA, Some(Value::Object(payload)), &[])
    }

    // =========================================================================
    // INSTANCE
    // =========================================================================

    pub fn connection_state(&self) -> Result<Value> {
        let response = self
            .dispatcher
            .execute(Method::Get, CONNECTION_STATE, None, &[])?;
        tracing::info!(state = %connection_status(&response), "connection state");
        Ok(response)
    }

    /// Instance name plus its connection state.
    pub fn instance_info(&self) -> Result<Value> {
        let response = self.connection_state()?;
        Ok(json!({
            "instance_name": self.instance_name(),
            "status": connection_status(&response),
            "info": response,
        }))
    }

    pub fn set_presence(&self, status: PresenceStatus, number: Option<&str>) -> Result<Value> {
        let mut payload = Map::new();
        payload.insert("presence".to_string(), json!(status));
        if let Some(n) = number {
            let id = validate::normalize(n)?;
            payload.insert("number".to_string(), json!(id));
        }

        tracing::info!(presence = %status, "setting presence");
        self.dispatcher
            .execute(Method::Post, PRESENCE_UPDATE, Some(Value::Object(payload)), &[])
    }
}

/// `state` of a connectionState response (top level or under `instance`).
fn connection_status(response: &Value) -> String {
    response
        .get("state")
        .or_else(|| response.get("instance").and_then(|i| i.get("state")))
        .and_then(|s| s.as_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FakeTransport;

    fn client(fake: Arc<FakeTransport>) -> EvolutionClient {
        EvolutionClient::with_transport(
            fake,
            "http://evo.local",
            "secret",
            "main",
            Duration::from_secs(30),
        )
    }

    #[test]
    fn test_send_text_payload() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json("/message/sendText", json!({"key": {"id": "ABC"}}));
        let c = client(fake.clone());

        let resp = c.send_text("+55 (11) 99999-9999", "Olá!", true).unwrap();
        assert_eq!(resp["key"]["id"], "ABC");

        let calls = fake.calls();
        assert_eq!(calls[0].endpoint, "/message/sendText/main");
        assert_eq!(
            calls[0].body,
            Some(json!({"number": "5511999999999", "text": "Olá!", "linkPreview": true}))
        );
    }

    #[test]
    fn test_validation_happens_before_dispatch() {
        let fake = Arc::new(FakeTransport::new());
        let c = client(fake.clone());

        assert!(c.send_text("123", "hi", true).unwrap_err().is_validation());
        let long = "x".repeat(MAX_TEXT_LENGTH + 1);
        assert!(c.send_text("5511999999999", &long, true).is_err());
        assert!(c
            .send_media("5511999999999", "ftp://x", MediaType::Image, None, None)
            .is_err());
        let caption = "c".repeat(MAX_CAPTION_LENGTH + 1);
        assert!(c
            .send_media(
                "5511999999999",
                "https://x/y.png",
                MediaType::Image,
                Some(&caption),
                None
            )
            .is_err());
        assert!(c.resolve_name("12", true).is_err());
        assert!(c.messages_by_number("abc", 10).is_err());
        assert!(c.set_presence(PresenceStatus::Available, Some("1")).is_err());

        assert!(fake.calls().is_empty());
    }

    #[test]
    fn test_send_media_payload() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json("/message/sendMedia", json!({"status": "PENDING"}));
        let c = client(fake.clone());

        c.send_media(
            "5511999999999",
            "https://example.com/report.pdf",
            MediaType::Document,
            Some("Segue o relatório"),
            Some("report.pdf"),
        )
        .unwrap();

        assert_eq!(
            fake.calls()[0].body,
            Some(json!({
                "number": "5511999999999",
                "mediatype": "document",
                "media": "https://example.com/report.pdf",
                "caption": "Segue o relatório",
                "fileName": "report.pdf"
            }))
        );
    }

    #[test]
    fn test_list_chats_enriches_and_forwards_fields() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "/chat/findChats",
            json!([
                {"remoteJid": "5511999999999@s.whatsapp.net", "pushName": null, "unreadCount": 2},
                {"remoteJid": "123456@g.us", "pushName": null}
            ]),
        );
        fake.respond_json(
            "/chat/findContacts",
            json!([{"remoteJid": "5511999999999@s.whatsapp.net", "pushName": "João Silva"}]),
        );
        let c = client(fake.clone());

        let chats = c.list_chats(true).unwrap();
        assert_eq!(chats[0].push_name.as_deref(), Some("João Silva"));
        assert!(chats[0].enriched);
        assert_eq!(chats[0].extra["unreadCount"], 2);
        assert!(!chats[1].enriched);

        let plain = c.list_chats(false).unwrap();
        assert_eq!(plain[0].push_name, None);
        assert_eq!(fake.call_count("/chat/findContacts"), 1);
    }

    #[test]
    fn test_list_chats_survives_contact_failure() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "/chat/findChats",
            json!([{"remoteJid": "5511999999999@s.whatsapp.net"}]),
        );
        fake.respond(
            "/chat/findContacts",
            Err(crate::transport::TransportError::Timeout),
        );
        let c = client(fake);

        let chats = c.list_chats(true).unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].push_name, None);
    }

    #[test]
    fn test_list_chats_propagates_primary_failure() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            "/chat/findChats",
            Ok(crate::transport::RawResponse::new(401, "")),
        );
        let c = client(fake);

        assert!(matches!(
            c.list_chats(true),
            Err(EvolutionError::Authentication(_))
        ));
    }

    #[test]
    fn test_fetch_contacts_filter() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json("/chat/findContacts", json!([]));
        let c = client(fake.clone());

        c.fetch_contacts(None).unwrap();
        c.fetch_contacts(Some("5511999999999@s.whatsapp.net")).unwrap();

        let calls = fake.calls();
        assert_eq!(calls[0].body, Some(json!({})));
        assert_eq!(
            calls[1].body,
            Some(json!({"where": {"id": "5511999999999@s.whatsapp.net"}}))
        );
    }

    #[test]
    fn test_messages_by_number_uses_chat_jid() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json("/chat/findMessages", json!({"messages": []}));
        let c = client(fake.clone());

        c.messages_by_number("5511999999999", DEFAULT_MESSAGE_LIMIT)
            .unwrap();
        assert_eq!(
            fake.calls()[0].body,
            Some(json!({"chatId": "5511999999999@s.whatsapp.net", "limit": 50}))
        );
    }

    #[test]
    fn test_instance_info() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "/instance/connectionState",
            json!({"instance": {"instanceName": "main", "state": "open"}}),
        );
        let c = client(fake.clone());

        let info = c.instance_info().unwrap();
        assert_eq!(info["instance_name"], "main");
        assert_eq!(info["status"], "open");
        assert_eq!(fake.calls()[0].method, Method::Get);
    }

    #[test]
    fn test_set_presence_payload() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json("/chat/presenceUpdate", json!({}));
        let c = client(fake.clone());

        c.set_presence(PresenceStatus::Composing, Some("5511999999999"))
            .unwrap();
        assert_eq!(
            fake.calls()[0].body,
            Some(json!({"presence": "composing", "number": "5511999999999"}))
        );
    }
}
