/// Tuning knobs shared by the search orchestrator and the activity cache.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long remote search results stay usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchCachePolicy {
    /// Keep results for the lifetime of the process.
    Session,
    /// Expire results after a fixed age.
    Ttl { seconds: u64 },
}

impl Default for SearchCachePolicy {
    fn default() -> Self {
        SearchCachePolicy::Session
    }
}

impl SearchCachePolicy {
    pub fn max_age(&self) -> Option<Duration> {
        match self {
            SearchCachePolicy::Session => None,
            SearchCachePolicy::Ttl { seconds } => Some(Duration::from_secs(*seconds)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search text shorter than this (in chars, after trimming) is ignored.
    #[serde(default = "default_min_search_length")]
    pub min_search_length: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Debounce used when only the sort key differs from its default.
    #[serde(default = "default_sort_debounce_ms")]
    pub sort_debounce_ms: u64,
    #[serde(default)]
    pub cache_policy: SearchCachePolicy,
}

fn default_min_search_length() -> usize {
    2
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_sort_debounce_ms() -> u64 {
    50
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_search_length: default_min_search_length(),
            debounce_ms: default_debounce_ms(),
            sort_debounce_ms: default_sort_debounce_ms(),
            cache_policy: SearchCachePolicy::default(),
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self, sort_only: bool) -> Duration {
        if sort_only {
            Duration::from_millis(self.sort_debounce_ms)
        } else {
            Duration::from_millis(self.debounce_ms)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityCacheConfig {
    #[serde(default = "default_activity_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_activity_ttl_secs() -> u64 {
    30
}

impl Default for ActivityCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_activity_ttl_secs(),
        }
    }
}

impl ActivityCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
