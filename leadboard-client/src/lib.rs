/// Leadboard client: HTTP transport, config loading, logging, and the
/// `Dashboard` that wires the board components together.
pub mod cli;
pub mod config;
pub mod http;
pub mod log_bridge;

use std::path::Path;
use std::sync::{Arc, Mutex};

use leadboard_core::activity::ActivityCountsCache;
use leadboard_core::api::{ApiError, LeadApi};
use leadboard_core::drag::DragReconciler;
use leadboard_core::search::SearchOrchestrator;
use leadboard_core::store::BoardStore;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::http::HttpLeadApi;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// One board screen: canonical store, drag handling, search, and activity
/// counters over a single shared HTTP client.
pub struct Dashboard {
    pub config: ClientConfig,
    pub api: Arc<HttpLeadApi>,
    pub store: Arc<BoardStore>,
    pub drag: Arc<DragReconciler>,
    pub search: Arc<SearchOrchestrator>,
    pub activity: Arc<ActivityCountsCache>,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl Dashboard {
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let api = Arc::new(HttpLeadApi::new(&config)?);
        let shared: Arc<dyn LeadApi> = api.clone();
        let store = Arc::new(BoardStore::new(shared.clone()));
        let drag = Arc::new(DragReconciler::new(store.clone()));
        let search = Arc::new(SearchOrchestrator::new(
            shared.clone(),
            store.clone(),
            config.search.clone(),
        ));
        let activity = Arc::new(ActivityCountsCache::new(shared, &config.activity));
        Ok(Self {
            config,
            api,
            store,
            drag,
            search,
            activity,
            refresher: Mutex::new(None),
        })
    }

    /// Build from the config file at `path` (defaults if it is missing).
    pub fn open(path: &Path) -> Result<Self, ClientError> {
        Self::from_config(config::load_config(path))
    }

    /// Fetch the board and start keeping the filtered view in step with it.
    /// Must run inside a tokio runtime.
    pub async fn load(&self) -> Result<u64, ClientError> {
        let version = self.store.fetch_board().await?;
        log::info!(
            target: "leadboard.client",
            "Board loaded from {} ({} leads)",
            self.api.base_url(),
            self.store.with_board_ref(|b| b.lead_count())
        );
        self.start_refresher();
        self.search.refresh_local();
        Ok(version)
    }

    fn start_refresher(&self) {
        let mut slot = self.refresher.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let mut versions = self.store.subscribe();
        let search = self.search.clone();
        *slot = Some(tokio::spawn(async move {
            while versions.changed().await.is_ok() {
                search.refresh_local();
            }
        }));
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        let slot = self.refresher.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}
