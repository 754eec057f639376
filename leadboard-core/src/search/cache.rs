/// Remote search results keyed by `FilterState::cache_key`.
///
/// Lifetime is governed by `SearchCachePolicy`: `Session` keeps entries until
/// the process exits, `Ttl` drops entries older than the configured age.
use std::collections::HashMap;

use tokio::time::Instant;

use crate::config::SearchCachePolicy;
use crate::types::Board;

struct CacheEntry {
    board: Board,
    stored_at: Instant,
}

pub struct SearchCache {
    policy: SearchCachePolicy,
    entries: HashMap<String, CacheEntry>,
}

impl SearchCache {
    pub fn new(policy: SearchCachePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match self.policy.max_age() {
            None => true,
            Some(max_age) => entry.stored_at.elapsed() < max_age,
        }
    }

    pub fn get(&self, key: &str) -> Option<Board> {
        self.entries
            .get(key)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.board.clone())
    }

    pub fn insert(&mut self, key: String, board: Board) {
        self.entries.insert(
            key,
            CacheEntry {
                board,
                stored_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries. A no-op under the session policy.
    pub fn purge_expired(&mut self) {
        if let Some(max_age) = self.policy.max_age() {
            self.entries.retain(|_, e| e.stored_at.elapsed() < max_age);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
