//! End-to-end behaviour of name resolution and chat listing through the
//! public client handle, against a scripted transport.

use chrono::Duration;
use evoapi_core::{EvolutionClient, EvolutionError, FakeTransport, ManualClock};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn client(fake: &Arc<FakeTransport>, clock: &Arc<ManualClock>) -> EvolutionClient {
    EvolutionClient::with_transport_and_clock(
        fake.clone(),
        "http://evo.local",
        "secret",
        "main",
        StdDuration::from_secs(30),
        clock.clone(),
    )
}

fn chats() -> serde_json::Value {
    json!([
        {"remoteJid": "5511999999999@s.whatsapp.net", "pushName": null},
        {"remoteJid": "123456@g.us", "pushName": null}
    ])
}

fn contacts() -> serde_json::Value {
    json!([
        {"remoteJid": "5511999999999@s.whatsapp.net", "pushName": "João Silva"}
    ])
}

#[test]
fn test_listing_scenario() {
    let fake = Arc::new(FakeTransport::new());
    fake.respond_json("/chat/findChats", chats());
    fake.respond_json("/chat/findContacts", contacts());
    let clock = Arc::new(ManualClock::default());
    let c = client(&fake, &clock);

    let listed = serde_json::to_value(c.list_chats(true).unwrap()).unwrap();
    assert_eq!(
        listed,
        json!([
            {"remoteJid": "5511999999999@s.whatsapp.net", "pushName": "João Silva", "_enriched": true},
            {"remoteJid": "123456@g.us", "pushName": null}
        ])
    );
}

#[test]
fn test_ttl_expiry_triggers_one_new_listing() {
    let fake = Arc::new(FakeTransport::new());
    fake.respond_json("/chat/findChats", chats());
    fake.respond_json("/chat/findContacts", contacts());
    let clock = Arc::new(ManualClock::default());
    let c = client(&fake, &clock);

    c.list_chats(true).unwrap();
    clock.advance(Duration::minutes(4));
    c.list_chats(true).unwrap();
    assert_eq!(fake.call_count("/chat/findContacts"), 1);

    clock.advance(Duration::minutes(2));
    c.list_chats(true).unwrap();
    c.list_chats(true).unwrap();
    assert_eq!(fake.call_count("/chat/findContacts"), 2);
}

#[test]
fn test_clear_cache_forces_rebuild_within_ttl() {
    let fake = Arc::new(FakeTransport::new());
    fake.respond_json("/chat/findChats", chats());
    fake.respond_json("/chat/findContacts", contacts());
    let clock = Arc::new(ManualClock::default());
    let c = client(&fake, &clock);

    c.list_chats(true).unwrap();
    c.clear_cache();
    assert!(c.cache_stats().stale);
    c.list_chats(true).unwrap();
    assert_eq!(fake.call_count("/chat/findContacts"), 2);
}

#[test]
fn test_resolve_name_after_listing_is_local() {
    let fake = Arc::new(FakeTransport::new());
    fake.respond_json("/chat/findChats", chats());
    fake.respond_json("/chat/findContacts", contacts());
    let clock = Arc::new(ManualClock::default());
    let c = client(&fake, &clock);

    c.list_chats(true).unwrap();
    let name = c.resolve_name("+55 11 99999-9999", true).unwrap();
    assert_eq!(name.as_deref(), Some("João Silva"));
    assert_eq!(fake.call_count("/chat/findContacts"), 1);
}

#[test]
fn test_resolve_name_rejects_bad_number_without_traffic() {
    let fake = Arc::new(FakeTransport::new());
    let clock = Arc::new(ManualClock::default());
    let c = client(&fake, &clock);

    let err = c.resolve_name("12-34", true).unwrap_err();
    assert!(matches!(err, EvolutionError::InvalidInput(_)));
    assert!(fake.calls().is_empty());
}

#[test]
fn test_independent_clients_do_not_share_cache() {
    let fake = Arc::new(FakeTransport::new());
    fake.respond_json("/chat/findChats", chats());
    fake.respond_json("/chat/findContacts", contacts());
    let clock = Arc::new(ManualClock::default());
    let first = client(&fake, &clock);
    let second = client(&fake, &clock);

    first.list_chats(true).unwrap();
    assert!(!first.cache_stats().stale);
    assert!(second.cache_stats().stale);
}
