/// Server contract consumed by the board layer.
///
/// The server is an opaque collaborator. Everything the store, the search
/// orchestrator and the activity cache need from it goes through `LeadApi`;
/// `leadboard-client` provides the HTTP implementation, tests use an
/// in-memory fake.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::search::filter::SearchRequest;
use crate::types::{ActivityCounts, ActivityCountsMap, Board, ColumnId, LeadId, MoveResponse};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLeadRequest {
    pub column_id: ColumnId,
    pub position: usize,
}

#[async_trait]
pub trait LeadApi: Send + Sync {
    /// Load the full board (columns with ordered leads).
    async fn fetch_board(&self) -> Result<Board, ApiError>;

    /// Move a lead. The reply is authoritative and may place the lead
    /// somewhere other than requested.
    async fn move_lead(&self, lead_id: &str, request: &MoveLeadRequest)
        -> Result<MoveResponse, ApiError>;

    /// Filtered and sorted board. Implementations stop work and return
    /// `ApiError::Aborted` once `cancel` fires.
    async fn search_board(
        &self,
        request: &SearchRequest,
        cancel: CancelToken,
    ) -> Result<Board, ApiError>;

    async fn activity_counts(&self, lead_id: &str) -> Result<ActivityCounts, ApiError>;

    async fn activity_counts_bulk(&self, lead_ids: &[LeadId])
        -> Result<ActivityCountsMap, ApiError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    /// The request was superseded. Not a user-facing failure.
    #[error("Request aborted")]
    Aborted,

    #[error("Rejected by server ({status}): {message}")]
    Validation { status: u16, message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_abort(&self) -> bool {
        matches!(self, ApiError::Aborted)
    }

    /// Map an HTTP status plus body text to the matching variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) {
            ApiError::Validation { status, message }
        } else {
            ApiError::Server { status, message }
        }
    }
}
