use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Last question asked per sender, used as a one-hop fallback context.
pub trait SessionStore: Send + Sync {
    fn last_question(&self, sender_id: u64) -> Option<String>;
    fn remember_question(&self, sender_id: u64, question: &str);
}

#[derive(Debug, Clone)]
struct SessionEntry {
    question: String,
    updated_at: Instant,
}

/// In-process store with optional expiry and a hard capacity.
///
/// Expired entries are dropped lazily on read and on insert. When the store
/// is full the least recently updated sender is evicted.
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<u64, SessionEntry>>,
    ttl: Option<Duration>,
    max_entries: usize,
}

impl InMemorySessionStore {
    pub fn new(ttl: Option<Duration>, max_entries: usize) -> Self {
        InMemorySessionStore {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(entry.updated_at) >= ttl,
            None => false,
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn last_question(&self, sender_id: u64) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired = match entries.get(&sender_id) {
            Some(entry) if self.is_expired(entry, now) => true,
            Some(entry) => return Some(entry.question.clone()),
            None => return None,
        };
        if expired {
            entries.remove(&sender_id);
            debug!(sender_id, "Session entry expired");
        }
        None
    }

    fn remember_question(&self, sender_id: u64, question: &str) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if self.ttl.is_some() {
            entries.retain(|_, entry| !self.is_expired(entry, now));
        }

        if !entries.contains_key(&sender_id) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.updated_at)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(evicted_sender_id = oldest, "Session store full; evicted oldest entry");
            }
        }

        entries.insert(
            sender_id,
            SessionEntry {
                question: question.to_string(),
                updated_at: now,
            },
        );
    }
}
