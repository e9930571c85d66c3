//! Contact name cache with a fixed 5 minute freshness window.
//!
//! The whole mapping shares one `built_at` timestamp. Readers always get an
//! `Arc` snapshot, so a rebuild swaps the map by reference and nobody sees a
//! half-built one. Bulk rebuilds are serialized by `rebuild_lock`; callers
//! that queued behind a running rebuild reuse its result.
//!
//! CHANGELOG:
//! - 10/18/2026 - clear() discards a rebuild already in flight
//! - 10/18/2026 - Re-apply point writes that land during a rebuild
//! - 10/18/2026 - Initial implementation

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dispatch::{Dispatcher, Method, FIND_CONTACTS};
use crate::error::{EvolutionError, Result};
use crate::models::ContactRecord;
use crate::validate::{self, NormalizedIdentifier};

/// Freshness window for the whole mapping.
pub const CACHE_TTL_SECS: i64 = 5 * 60;

/// Identifier -> display name (`None` = known contact without a name).
pub type NameMap = HashMap<NormalizedIdentifier, Option<String>>;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Result of making the mapping available.
#[derive(Debug, Clone)]
pub enum RebuildOutcome {
    /// Mapping was fresh, nothing fetched
    Cached(Arc<NameMap>),
    /// A bulk fetch succeeded and replaced the mapping
    Rebuilt(Arc<NameMap>),
    /// The bulk fetch failed; the previous mapping is kept
    Retained {
        entries: Arc<NameMap>,
        error: EvolutionError,
    },
}

impl RebuildOutcome {
    pub fn entries(&self) -> &Arc<NameMap> {
        match self {
            RebuildOutcome::Cached(entries)
            | RebuildOutcome::Rebuilt(entries)
            | RebuildOutcome::Retained { entries, .. } => entries,
        }
    }

    pub fn into_entries(self) -> Arc<NameMap> {
        match self {
            RebuildOutcome::Cached(entries)
            | RebuildOutcome::Rebuilt(entries)
            | RebuildOutcome::Retained { entries, .. } => entries,
        }
    }

    /// The soft failure, if the rebuild fell back to the previous mapping.
    pub fn error(&self) -> Option<&EvolutionError> {
        match self {
            RebuildOutcome::Retained { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Cache summary for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub built_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

#[derive(Default)]
struct CacheState {
    entries: Arc<NameMap>,
    built_at: Option<DateTime<Utc>>,
    /// A bulk fetch is in flight
    rebuilding: bool,
    /// Point writes made while `rebuilding`, replayed onto the new map
    pending: NameMap,
    /// Bumped by `clear`; a rebuild started under an older value is discarded
    generation: u64,
}

/// TTL-bounded contact name cache.
pub struct ContactCache {
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: RwLock<CacheState>,
    rebuild_lock: Mutex<()>,
}

impl ContactCache {
    /// Create an empty cache (stale until first use).
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_clock(dispatcher, Arc::new(SystemClock))
    }

    pub fn with_clock(dispatcher: Dispatcher, clock: Arc<dyn Clock>) -> Self {
        Self {
            dispatcher,
            clock,
            ttl: Duration::seconds(CACHE_TTL_SECS),
            state: RwLock::new(CacheState::default()),
            rebuild_lock: Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn stale_at(&self, built_at: Option<DateTime<Utc>>) -> bool {
        match built_at {
            None => true,
            Some(at) => self.clock.now() - at > self.ttl,
        }
    }

    /// True if never built, cleared, or older than the TTL.
    pub fn is_stale(&self) -> bool {
        let built_at = self.read().built_at;
        self.stale_at(built_at)
    }

    /// Current mapping, whatever its age.
    pub fn snapshot(&self) -> Arc<NameMap> {
        Arc::clone(&self.read().entries)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.read();
        CacheStats {
            entries: state.entries.len(),
            built_at: state.built_at,
            stale: self.stale_at(state.built_at),
        }
    }

    /// Drop the mapping and the build marker.
    pub fn clear(&self) {
        let mut state = self.write();
        state.entries = Arc::new(NameMap::new());
        state.built_at = None;
        state.pending.clear();
        state.generation += 1;
        tracing::info!("contact cache cleared");
    }

    /// Rebuild from a bulk contact listing, unconditionally.
    ///
    /// Never fails: on a dispatcher error the previous mapping is returned
    /// inside [`RebuildOutcome::Retained`].
    pub fn rebuild(&self) -> RebuildOutcome {
        let _guard = self.rebuild_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.rebuild_locked()
    }

    /// Return a fresh mapping, rebuilding at most once if stale.
    ///
    /// Concurrent callers coalesce onto a single rebuild.
    pub fn ensure_fresh(&self) -> RebuildOutcome {
        if !self.is_stale() {
            tracing::debug!("using cached contacts");
            return RebuildOutcome::Cached(self.snapshot());
        }

        let _guard = self.rebuild_lock.lock().unwrap_or_else(|e| e.into_inner());

        // Someone else may have rebuilt while we waited
        if !self.is_stale() {
            tracing::debug!("contacts rebuilt by a concurrent caller");
            return RebuildOutcome::Cached(self.snapshot());
        }

        self.rebuild_locked()
    }

    fn rebuild_locked(&self) -> RebuildOutcome {
        let generation = {
            let mut state = self.write();
            state.rebuilding = true;
            state.pending.clear();
            state.generation
        };

        tracing::info!("rebuilding contact cache");
        let fetched = self
            .dispatcher
            .execute(Method::Post, FIND_CONTACTS, Some(json!({})), &[]);

        let mut state = self.write();
        state.rebuilding = false;
        let pending = std::mem::take(&mut state.pending);

        if state.generation != generation {
            // Cleared mid-fetch: the caller gets the listing, the cache stays cleared
            tracing::info!("contact cache cleared during rebuild, discarding listing");
            return match fetched {
                Ok(value) => RebuildOutcome::Rebuilt(Arc::new(build_name_map(
                    ContactRecord::list_from_value(value),
                ))),
                Err(error) => RebuildOutcome::Retained {
                    entries: Arc::clone(&state.entries),
                    error,
                },
            };
        }

        state.built_at = Some(self.clock.now());

        match fetched {
            Ok(value) => {
                let mut entries = build_name_map(ContactRecord::list_from_value(value));
                // Point writes newer than the bulk listing win
                entries.extend(pending);
                let entries = Arc::new(entries);
                tracing::info!(contacts = entries.len(), "contact cache updated");
                state.entries = Arc::clone(&entries);
                RebuildOutcome::Rebuilt(entries)
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to rebuild contact cache, keeping previous");
                RebuildOutcome::Retained {
                    entries: Arc::clone(&state.entries),
                    error,
                }
            }
        }
    }

    /// Look up one contact name.
    ///
    /// Served from the cache when `use_cache` is set and the mapping is fresh
    /// and holds the identifier. Otherwise a filtered fetch is issued and its
    /// result written back as a point update.
    pub fn lookup_one(
        &self,
        id: &NormalizedIdentifier,
        use_cache: bool,
    ) -> Result<Option<String>> {
        if use_cache {
            let state = self.read();
            if !self.stale_at(state.built_at) {
                if let Some(name) = state.entries.get(id) {
                    tracing::debug!(number = %id, "contact cache hit");
                    return Ok(name.clone());
                }
            }
        }

        let jid = validate::to_chat_identifier(id);
        let value = self.dispatcher.execute(
            Method::Post,
            FIND_CONTACTS,
            Some(json!({ "where": { "id": jid } })),
            &[],
        )?;

        let contacts = ContactRecord::list_from_value(value);
        let name = pick_contact(&contacts, id).and_then(|c| c.display_name().map(String::from));

        self.record(id.clone(), name.clone());
        Ok(name)
    }

    fn record(&self, id: NormalizedIdentifier, name: Option<String>) {
        let now = self.clock.now();
        let mut state = self.write();
        if state.rebuilding {
            state.pending.insert(id.clone(), name.clone());
        }
        Arc::make_mut(&mut state.entries).insert(id, name);
        // A single lookup makes an empty cache fresh but partial
        if state.built_at.is_none() {
            state.built_at = Some(now);
        }
    }
}

/// Build the identifier -> name map, skipping groups and unparseable jids.
fn build_name_map(contacts: Vec<ContactRecord>) -> NameMap {
    let mut entries = NameMap::with_capacity(contacts.len());
    for contact in contacts {
        if contact.is_group() {
            continue;
        }
        match contact.identifier() {
            Ok(id) => {
                let name = contact.display_name().map(String::from);
                entries.insert(id, name);
            }
            Err(_) => {
                tracing::debug!(jid = %contact.remote_jid, "skipping contact without a phone identifier");
            }
        }
    }
    entries
}

/// Prefer the record matching `id`; a lone record is taken as the answer.
fn pick_contact<'a>(
    contacts: &'a [ContactRecord],
    id: &NormalizedIdentifier,
) -> Option<&'a ContactRecord> {
    contacts
        .iter()
        .find(|c| c.identifier().map(|found| &found == id).unwrap_or(false))
        .or(match contacts {
            [only] if !only.is_group() => Some(only),
            _ => None,
        })
}
