//! Chat enrichment: fill missing `pushName`s from the contact cache.
//!
//! One snapshot serves the whole batch, so N chats against M contacts cost
//! at most one contact listing plus O(N + M) local work.
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial implementation

use crate::cache::{ContactCache, RebuildOutcome};
use crate::error::EvolutionError;
use crate::models::ChatSummary;
use crate::validate;

/// Outcome of an enrichment pass.
#[derive(Debug, Clone)]
pub struct Enriched {
    pub chats: Vec<ChatSummary>,
    /// Number of chats that received a name
    pub enriched_count: usize,
    /// Set when the contact listing failed and chats were returned untouched
    pub degraded: Option<EvolutionError>,
}

/// Fill missing names in `chats`.
///
/// Chats that already have a name, group chats and chats without a usable
/// jid pass through unchanged. A failed contact listing is logged and the
/// input comes back as-is.
pub fn enrich(cache: &ContactCache, mut chats: Vec<ChatSummary>) -> Enriched {
    if !chats.iter().any(is_candidate) {
        return Enriched {
            chats,
            enriched_count: 0,
            degraded: None,
        };
    }

    let entries = match cache.ensure_fresh() {
        RebuildOutcome::Retained { error, .. } => {
            tracing::warn!(error = %error, "contact lookup failed, returning chats without names");
            return Enriched {
                chats,
                enriched_count: 0,
                degraded: Some(error),
            };
        }
        outcome => outcome.into_entries(),
    };

    let mut enriched_count = 0;
    for chat in chats.iter_mut().filter(|c| is_candidate(c)) {
        let Some(jid) = chat.remote_jid.as_deref() else {
            continue;
        };
        let Ok(id) = validate::identifier_from_jid(jid) else {
            continue;
        };
        if let Some(Some(name)) = entries.get(&id) {
            chat.push_name = Some(name.clone());
            chat.enriched = true;
            enriched_count += 1;
        }
    }

    tracing::info!(
        chats = chats.len(),
        enriched = enriched_count,
        "enriched chats with contact names"
    );

    Enriched {
        chats,
        enriched_count,
        degraded: None,
    }
}

fn is_candidate(chat: &ChatSummary) -> bool {
    chat.needs_name()
        && chat
            .remote_jid
            .as_deref()
            .map(|jid| !jid.is_empty())
            .unwrap_or(false)
        && !chat.is_group()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::dispatch::Dispatcher;
    use crate::transport::{FakeTransport, TransportError};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn cache_with(fake: Arc<FakeTransport>) -> ContactCache {
        let dispatcher = Dispatcher::new(
            fake,
            "http://evo.local",
            "secret",
            "main",
            Duration::from_secs(30),
        );
        ContactCache::with_clock(dispatcher, Arc::new(ManualClock::default()))
    }

    #[test]
    fn test_enrich_individual_leaves_group() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "/chat/findContacts",
            json!([{"remoteJid": "5511999999999@s.whatsapp.net", "pushName": "João Silva"}]),
        );
        let cache = cache_with(fake);

        let chats = vec![
            ChatSummary::new("5511999999999@s.whatsapp.net", None),
            ChatSummary::new("123456@g.us", None),
        ];
        let result = enrich(&cache, chats);

        assert_eq!(result.enriched_count, 1);
        assert!(result.degraded.is_none());
        assert_eq!(result.chats[0].push_name.as_deref(), Some("João Silva"));
        assert!(result.chats[0].enriched);
        assert_eq!(result.chats[1], ChatSummary::new("123456@g.us", None));
    }

    #[test]
    fn test_enrich_never_overwrites_existing_name() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "/chat/findContacts",
            json!([{"remoteJid": "5511999999999@s.whatsapp.net", "pushName": "João Silva"}]),
        );
        let cache = cache_with(fake.clone());

        let chats = vec![ChatSummary::new("5511999999999@s.whatsapp.net", Some("Joãozinho"))];
        let result = enrich(&cache, chats);

        assert_eq!(result.chats[0].push_name.as_deref(), Some("Joãozinho"));
        assert!(!result.chats[0].enriched);
        // Nothing to fill, so nothing fetched
        assert_eq!(fake.call_count("/chat/findContacts"), 0);
    }

    #[test]
    fn test_enrich_unknown_and_unparseable_pass_through() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json("/chat/findContacts", json!([]));
        let cache = cache_with(fake);

        let mut no_jid = ChatSummary::new("", None);
        no_jid.remote_jid = None;
        let chats = vec![
            ChatSummary::new("5511000000000@s.whatsapp.net", None),
            ChatSummary::new("status@broadcast", None),
            no_jid.clone(),
        ];
        let result = enrich(&cache, chats.clone());

        assert_eq!(result.enriched_count, 0);
        assert_eq!(result.chats, chats);
    }

    #[test]
    fn test_enrich_degrades_on_failure() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond(
            "/chat/findContacts",
            Err(TransportError::Connect("connection reset".into())),
        );
        let cache = cache_with(fake);

        let chats = vec![ChatSummary::new("5511999999999@s.whatsapp.net", None)];
        let result = enrich(&cache, chats.clone());

        assert_eq!(result.chats, chats);
        assert_eq!(
            result.degraded,
            Some(EvolutionError::Connection("connection reset".into()))
        );
    }

    #[test]
    fn test_enrich_batch_uses_one_listing() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            "/chat/findContacts",
            json!([{"remoteJid": "5511999999999@s.whatsapp.net", "pushName": "João Silva"}]),
        );
        let cache = cache_with(fake.clone());

        let chats: Vec<ChatSummary> = (0..1000)
            .map(|i| ChatSummary::new(format!("55119{:08}@s.whatsapp.net", i), None))
            .collect();
        let result = enrich(&cache, chats);

        assert_eq!(fake.calls().len(), 1);
        assert_eq!(result.chats.len(), 1000);

        // Within the TTL a second batch fetches nothing
        enrich(&cache, result.chats);
        assert_eq!(fake.calls().len(), 1);
    }
}
