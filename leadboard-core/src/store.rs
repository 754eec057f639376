/// Canonical in-memory board.
///
/// Every mutation bumps a monotonic version counter. Server responses carry
/// the version that was current when their request was issued (the "stamp");
/// a response whose stamp is older than the version on display is discarded.
/// Local optimistic moves count as display changes, so a fetch issued before a
/// drag never reverts it.
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;

use crate::api::{ApiError, LeadApi, MoveLeadRequest};
use crate::types::{Board, MoveResponse};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoardError {
    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Board has not been loaded yet")]
    NotLoaded,
}

#[derive(Debug, Default)]
struct BoardState {
    board: Board,
    loaded: bool,
    version: u64,
}

pub struct BoardStore {
    api: Arc<dyn LeadApi>,
    state: RwLock<BoardState>,
    version_tx: watch::Sender<u64>,
}

impl BoardStore {
    pub fn new(api: Arc<dyn LeadApi>) -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            api,
            state: RwLock::new(BoardState::default()),
            version_tx,
        }
    }

    /// Store pre-seeded with a board, e.g. one restored by the embedding UI.
    pub fn with_board(api: Arc<dyn LeadApi>, board: Board) -> Self {
        let store = Self::new(api);
        {
            let mut state = store.write();
            state.board = board;
            state.loaded = true;
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, BoardState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BoardState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self, state: &mut BoardState) -> u64 {
        state.version += 1;
        self.version_tx.send_replace(state.version);
        state.version
    }

    pub fn snapshot(&self) -> Board {
        self.read().board.clone()
    }

    pub fn version(&self) -> u64 {
        self.read().version
    }

    pub fn is_loaded(&self) -> bool {
        self.read().loaded
    }

    /// Run `f` against the current board without cloning it.
    pub fn with_board_ref<R>(&self, f: impl FnOnce(&Board) -> R) -> R {
        f(&self.read().board)
    }

    /// Receives the new version after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }

    /// Bulk refresh from the server.
    pub async fn fetch_board(&self) -> Result<u64, ApiError> {
        let stamp = self.version();
        let board = self.api.fetch_board().await?;
        self.apply_server_board(board, stamp);
        Ok(self.version())
    }

    /// Replace the board with a server snapshot issued at `stamp`.
    /// Returns false when the snapshot is older than the one already shown.
    pub fn apply_server_board(&self, board: Board, stamp: u64) -> bool {
        let mut state = self.write();
        if stamp < state.version {
            log::debug!(
                target: "leadboard.store",
                "Discarding stale board snapshot (stamp {} < version {})",
                stamp,
                state.version
            );
            return false;
        }
        state.board = board;
        state.loaded = true;
        self.bump(&mut state);
        true
    }

    /// Relocate a lead locally, ahead of server confirmation.
    ///
    /// The lead is taken from whichever column currently owns it; a mismatch
    /// with `from_column` is logged but tolerated. Moving a lead onto its own
    /// slot leaves the version untouched.
    pub fn optimistic_move_lead(
        &self,
        lead_id: &str,
        from_column: &str,
        to_column: &str,
        index: usize,
    ) -> Result<u64, BoardError> {
        let mut state = self.write();
        if !state.loaded {
            return Err(BoardError::NotLoaded);
        }
        let target_ci = state
            .board
            .column_index(to_column)
            .ok_or_else(|| BoardError::ColumnNotFound(to_column.to_string()))?;
        let (ci, li) = state
            .board
            .locate_lead(lead_id)
            .ok_or_else(|| BoardError::LeadNotFound(lead_id.to_string()))?;

        if ci == target_ci {
            let last = state.board.columns[ci].leads.len() - 1;
            if li == index.min(last) {
                return Ok(state.version);
            }
        }
        if state.board.columns[ci].id != from_column {
            log::debug!(
                target: "leadboard.store",
                "Lead {} expected in {} but found in {}",
                lead_id,
                from_column,
                state.board.columns[ci].id
            );
        }

        let lead = state.board.columns[ci].leads.remove(li);
        state.board.insert_lead(to_column, index, lead);
        Ok(self.bump(&mut state))
    }

    /// Confirm a move with the server and reconcile with its answer.
    /// On failure the board is left exactly as it is.
    pub async fn move_lead(
        &self,
        lead_id: &str,
        column_id: &str,
        position: usize,
    ) -> Result<u64, ApiError> {
        let stamp = self.version();
        let request = MoveLeadRequest {
            column_id: column_id.to_string(),
            position,
        };
        let response = self.api.move_lead(lead_id, &request).await?;
        self.apply_move_response(response, stamp);
        Ok(self.version())
    }

    fn apply_move_response(&self, response: MoveResponse, stamp: u64) -> bool {
        match response {
            MoveResponse::Board { board } => self.apply_server_board(board, stamp),
            MoveResponse::Lead { lead, position } => {
                let mut state = self.write();
                if stamp < state.version {
                    log::debug!(
                        target: "leadboard.store",
                        "Discarding stale move reply for lead {}",
                        lead.id
                    );
                    return false;
                }
                let column_id = lead.column_id.clone();
                if state.board.column_index(&column_id).is_none() {
                    log::warn!(
                        target: "leadboard.store",
                        "Server placed lead {} in unknown column {}",
                        lead.id,
                        column_id
                    );
                    return false;
                }
                state.board.remove_lead(&lead.id);
                state.board.insert_lead(&column_id, position, lead);
                self.bump(&mut state);
                true
            }
        }
    }
}
