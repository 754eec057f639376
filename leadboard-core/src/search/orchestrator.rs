/// Hybrid local/remote board search.
///
/// Each submitted filter state is answered twice: synchronously by the local
/// pass over the current board, and later by a debounced server search.
/// Only the latest submission may touch shared state. Submitting again
/// cancels the pending remote task, and a task whose token is cancelled
/// exits without writing to the cache or the presentation.
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use super::cache::SearchCache;
use super::filter::{FilterClass, FilterState, SearchRequest, SortKey};
use super::local::LocalFilter;
use crate::api::LeadApi;
use crate::cancel::{CancelToken, TaskSlot};
use crate::config::SearchConfig;
use crate::store::BoardStore;
use crate::types::Board;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// No filter active; the board as the store holds it.
    Unfiltered,
    Local,
    Remote,
}

/// What the board view should show right now.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub board: Board,
    pub source: ResultSource,
    /// A remote search is scheduled or in flight.
    pub searching: bool,
}

struct SearchState {
    filter: FilterState,
    class: FilterClass,
    generation: u64,
    /// Local result, or a remote result that replaced it.
    current: Option<(Board, ResultSource)>,
    /// Remote result for the active filter.
    remote: Option<Board>,
    searching: bool,
    cache: SearchCache,
    remote_requests: u64,
}

struct Shared {
    api: Arc<dyn LeadApi>,
    store: Arc<BoardStore>,
    config: SearchConfig,
    state: Mutex<SearchState>,
    presentation_tx: watch::Sender<Presentation>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn present(&self, state: &SearchState) -> Presentation {
        let unfiltered = || Presentation {
            board: self.store.snapshot(),
            source: ResultSource::Unfiltered,
            searching: state.searching,
        };
        if !state.class.is_active() {
            return unfiltered();
        }
        if state.filter.sort != SortKey::default() {
            if let Some(remote) = &state.remote {
                return Presentation {
                    board: remote.clone(),
                    source: ResultSource::Remote,
                    searching: state.searching,
                };
            }
        }
        match &state.current {
            Some((board, source)) => Presentation {
                board: board.clone(),
                source: *source,
                searching: state.searching,
            },
            None => unfiltered(),
        }
    }

    fn publish(&self, state: &SearchState) {
        self.presentation_tx.send_replace(self.present(state));
    }

    fn run_local(&self, state: &mut SearchState) {
        let today = Utc::now().date_naive();
        let local = LocalFilter::compile(&state.filter, self.config.min_search_length, today);
        let result = self.store.with_board_ref(|board| local.apply(board));
        state.current = Some((result, ResultSource::Local));
    }
}

/// An empty remote board never replaces a populated local result, neither
/// as the current result nor as the sorted result preferred by `present`.
fn accept_remote(state: &mut SearchState, board: Board) {
    if board.is_empty() && state.current.is_some() {
        return;
    }
    state.current = Some((board.clone(), ResultSource::Remote));
    state.remote = Some(board);
}

pub struct SearchOrchestrator {
    shared: Arc<Shared>,
    task: Mutex<TaskSlot>,
}

impl SearchOrchestrator {
    pub fn new(api: Arc<dyn LeadApi>, store: Arc<BoardStore>, config: SearchConfig) -> Self {
        let initial = Presentation {
            board: store.snapshot(),
            source: ResultSource::Unfiltered,
            searching: false,
        };
        let (presentation_tx, _) = watch::channel(initial);
        let state = SearchState {
            filter: FilterState::default(),
            class: FilterClass::default(),
            generation: 0,
            current: None,
            remote: None,
            searching: false,
            cache: SearchCache::new(config.cache_policy),
            remote_requests: 0,
        };
        Self {
            shared: Arc::new(Shared {
                api,
                store,
                config,
                state: Mutex::new(state),
                presentation_tx,
            }),
            task: Mutex::new(TaskSlot::new()),
        }
    }

    fn task_slot(&self) -> MutexGuard<'_, TaskSlot> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a search cycle for `filter`. Must run inside a tokio runtime.
    pub fn submit(&self, filter: FilterState) {
        let shared = &self.shared;
        let min_len = shared.config.min_search_length;
        let class = filter.classify(min_len);
        let mut slot = self.task_slot();
        if slot.cancel() {
            log::debug!(target: "leadboard.search", "Superseded in-flight search");
        }

        let (generation, key, request) = {
            let mut state = shared.lock();
            state.generation += 1;
            state.filter = filter;
            state.class = class;
            state.remote = None;
            state.searching = false;

            if !class.is_active() {
                state.current = None;
                shared.publish(&state);
                return;
            }

            shared.run_local(&mut state);

            let key = state.filter.cache_key();
            if let Some(board) = state.cache.get(&key) {
                log::debug!(target: "leadboard.search", "Search cache hit {}", &key[..12]);
                accept_remote(&mut state, board);
                shared.publish(&state);
                return;
            }

            state.searching = true;
            shared.publish(&state);
            (state.generation, key, state.filter.to_request(min_len))
        };

        let delay = shared.config.debounce(class.sort_only);
        let task_shared = shared.clone();
        slot.replace(move |token| run_remote(task_shared, generation, key, request, delay, token));
    }

    /// Drop all filters and show the board as is.
    pub fn clear(&self) {
        self.submit(FilterState::default());
    }

    /// Re-run the local pass against the latest board, e.g. after a drag or
    /// a refresh. A remote result already on screen is left in place.
    pub fn refresh_local(&self) {
        let shared = &self.shared;
        let mut state = shared.lock();
        let replace = state.class.is_active()
            && !matches!(state.current, Some((_, ResultSource::Remote)));
        if replace {
            shared.run_local(&mut state);
        }
        shared.publish(&state);
    }

    pub fn presentation(&self) -> Presentation {
        self.shared.presentation_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Presentation> {
        self.shared.presentation_tx.subscribe()
    }

    pub fn filter(&self) -> FilterState {
        self.shared.lock().filter.clone()
    }

    pub fn is_searching(&self) -> bool {
        self.shared.lock().searching
    }

    /// Number of remote searches actually sent to the server.
    pub fn remote_requests_sent(&self) -> u64 {
        self.shared.lock().remote_requests
    }

    pub fn cached_results(&self) -> usize {
        self.shared.lock().cache.len()
    }
}

async fn run_remote(
    shared: Arc<Shared>,
    generation: u64,
    key: String,
    request: SearchRequest,
    delay: Duration,
    token: CancelToken,
) {
    tokio::select! {
        _ = token.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }
    if token.is_cancelled() {
        return;
    }

    shared.lock().remote_requests += 1;
    let result = shared.api.search_board(&request, token.clone()).await;

    if token.is_cancelled() {
        log::debug!(target: "leadboard.search", "Discarding superseded search result");
        return;
    }
    let mut state = shared.lock();
    if state.generation != generation {
        return;
    }
    match result {
        Ok(board) => {
            state.cache.insert(key, board.clone());
            accept_remote(&mut state, board);
        }
        Err(e) if e.is_abort() => {}
        Err(e) => {
            log::warn!(target: "leadboard.search", "Remote search failed: {}", e);
        }
    }
    state.searching = false;
    shared.publish(&state);
}
