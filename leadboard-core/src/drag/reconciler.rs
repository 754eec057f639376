/// Three-phase optimistic move: start, over, end.
///
/// Hovering a new column moves the lead there immediately (tail position).
/// Releasing settles the final slot locally and then confirms it with the
/// server through `BoardStore::move_lead`. The server reply wins; a failed
/// commit leaves the optimistic placement in place until the next refresh.
/// A lead whose commit is still pending cannot be picked up again.
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::ApiError;
use crate::store::{BoardError, BoardStore};
use crate::types::{Board, ColumnId, LeadId};

use super::collision::{CollisionInput, CollisionStrategy, DropTarget, TwoPassCollision};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DragError {
    #[error("No drag in progress")]
    NoActiveSession,

    #[error("Another drag is already in progress")]
    SessionActive,

    #[error("Lead {0} is still being saved")]
    LeadBusy(LeadId),

    #[error(transparent)]
    Board(#[from] BoardError),
}

/// The gesture currently in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub lead_id: LeadId,
    pub source_column: ColumnId,
    /// Column the lead sits in right now, after any hover moves.
    pub current_column: ColumnId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging(DragSession),
    /// No gesture active, but these leads are waiting on the server.
    Committing(Vec<LeadId>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// Server accepted the move; the board now reflects its answer.
    Committed { version: u64 },
    /// Server or network refused the move. The optimistic placement stays.
    Failed(ApiError),
    /// Released outside any target. Hover moves are not reverted.
    Cancelled,
}

#[derive(Default)]
struct DragInner {
    session: Option<DragSession>,
    pending: HashSet<LeadId>,
}

pub struct DragReconciler {
    store: Arc<BoardStore>,
    collision: Box<dyn CollisionStrategy>,
    inner: Mutex<DragInner>,
}

/// Clears the pending flag even if the commit future is dropped midway.
struct PendingGuard<'a> {
    reconciler: &'a DragReconciler,
    lead_id: LeadId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.reconciler.lock().pending.remove(&self.lead_id);
    }
}

impl DragReconciler {
    pub fn new(store: Arc<BoardStore>) -> Self {
        Self::with_collision(store, Box::new(TwoPassCollision::default()))
    }

    pub fn with_collision(store: Arc<BoardStore>, collision: Box<dyn CollisionStrategy>) -> Self {
        Self {
            store,
            collision,
            inner: Mutex::new(DragInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DragInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> DragState {
        let inner = self.lock();
        match &inner.session {
            Some(session) => DragState::Dragging(session.clone()),
            None if !inner.pending.is_empty() => {
                let mut ids: Vec<LeadId> = inner.pending.iter().cloned().collect();
                ids.sort();
                DragState::Committing(ids)
            }
            None => DragState::Idle,
        }
    }

    pub fn is_pending(&self, lead_id: &str) -> bool {
        self.lock().pending.contains(lead_id)
    }

    pub fn drag_start(&self, lead_id: &str) -> Result<(), DragError> {
        let mut inner = self.lock();
        if inner.pending.contains(lead_id) {
            return Err(DragError::LeadBusy(lead_id.to_string()));
        }
        if inner.session.is_some() {
            return Err(DragError::SessionActive);
        }
        let source_column = self
            .store
            .with_board_ref(|board| {
                board
                    .locate_lead(lead_id)
                    .map(|(ci, _)| board.columns[ci].id.clone())
            })
            .ok_or_else(|| BoardError::LeadNotFound(lead_id.to_string()))?;

        log::debug!(
            target: "leadboard.drag",
            "Drag start: lead {} from {}",
            lead_id,
            source_column
        );
        inner.session = Some(DragSession {
            lead_id: lead_id.to_string(),
            current_column: source_column.clone(),
            source_column,
        });
        Ok(())
    }

    /// Handle a collision change. Returns true when the lead was moved into
    /// a new column; hovering the column it already sits in does nothing.
    pub fn drag_over(&self, target: Option<&DropTarget>) -> Result<bool, DragError> {
        let mut inner = self.lock();
        let session = inner.session.as_mut().ok_or(DragError::NoActiveSession)?;
        let Some(target) = target else {
            return Ok(false);
        };

        let column = self
            .store
            .with_board_ref(|board| resolve_column(board, target))?;
        if column == session.current_column {
            return Ok(false);
        }

        self.store.optimistic_move_lead(
            &session.lead_id,
            &session.current_column,
            &column,
            usize::MAX,
        )?;
        log::debug!(
            target: "leadboard.drag",
            "Lead {} hovered into {}",
            session.lead_id,
            column
        );
        session.current_column = column;
        Ok(true)
    }

    /// Run collision detection on one frame, then `drag_over` the result.
    pub fn drag_over_at(&self, input: &CollisionInput) -> Result<bool, DragError> {
        let target = self.collision.detect(input).map(|d| d.target.clone());
        self.drag_over(target.as_ref())
    }

    /// Released outside any target.
    pub fn drag_cancel(&self) -> Result<(), DragError> {
        let session = self
            .lock()
            .session
            .take()
            .ok_or(DragError::NoActiveSession)?;
        log::debug!(
            target: "leadboard.drag",
            "Drag cancelled for lead {}",
            session.lead_id
        );
        Ok(())
    }

    /// Finish the gesture and confirm the placement with the server.
    pub async fn drag_end(&self, target: Option<&DropTarget>) -> Result<DragOutcome, DragError> {
        let Some(target) = target else {
            self.drag_cancel()?;
            return Ok(DragOutcome::Cancelled);
        };

        let (lead_id, column, index) = {
            let mut inner = self.lock();
            let session = inner.session.take().ok_or(DragError::NoActiveSession)?;
            let (column, index) = self
                .store
                .with_board_ref(|board| resolve_drop(board, target, &session.lead_id))?;
            self.store.optimistic_move_lead(
                &session.lead_id,
                &session.current_column,
                &column,
                index,
            )?;
            inner.pending.insert(session.lead_id.clone());
            (session.lead_id, column, index)
        };

        let _guard = PendingGuard {
            reconciler: self,
            lead_id: lead_id.clone(),
        };
        match self.store.move_lead(&lead_id, &column, index).await {
            Ok(version) => {
                log::info!(
                    target: "leadboard.drag",
                    "Lead {} moved to {} at {}",
                    lead_id,
                    column,
                    index
                );
                Ok(DragOutcome::Committed { version })
            }
            Err(e) => {
                log::warn!(
                    target: "leadboard.drag",
                    "Move of lead {} to {} failed: {}",
                    lead_id,
                    column,
                    e
                );
                Ok(DragOutcome::Failed(e))
            }
        }
    }
}

/// Column a target belongs to. A lead target resolves to its owner.
fn resolve_column(board: &Board, target: &DropTarget) -> Result<ColumnId, BoardError> {
    match target {
        DropTarget::Column(id) => board
            .column(id)
            .map(|c| c.id.clone())
            .ok_or_else(|| BoardError::ColumnNotFound(id.clone())),
        DropTarget::Lead(id) => board
            .locate_lead(id)
            .map(|(ci, _)| board.columns[ci].id.clone())
            .ok_or_else(|| BoardError::LeadNotFound(id.clone())),
    }
}

/// Final (column, index) for a drop, with indices counted as if the dragged
/// lead were already removed from the board.
fn resolve_drop(
    board: &Board,
    target: &DropTarget,
    active: &str,
) -> Result<(ColumnId, usize), BoardError> {
    let column_id = resolve_column(board, target)?;
    let column = board
        .column(&column_id)
        .ok_or_else(|| BoardError::ColumnNotFound(column_id.clone()))?;
    let mut others = column.leads.iter().filter(|l| l.id != active);
    let index = match target {
        DropTarget::Column(_) => others.count(),
        DropTarget::Lead(id) if id == active => column
            .leads
            .iter()
            .position(|l| l.id == active)
            .unwrap_or(0),
        DropTarget::Lead(id) => others.position(|l| &l.id == id).unwrap_or(0),
    };
    Ok((column_id, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::drag::collision::{Droppable, Point, Rect};
    use crate::types::fixtures::*;
    use crate::types::MoveResponse;
    use std::time::Duration;

    fn setup(api: Arc<FakeApi>) -> (Arc<BoardStore>, DragReconciler) {
        let store = Arc::new(BoardStore::with_board(api, two_stage_board()));
        let reconciler = DragReconciler::new(store.clone());
        (store, reconciler)
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn won() -> DropTarget {
        DropTarget::Column("won".into())
    }

    #[test]
    fn test_repeated_hover_moves_once() {
        let (store, drag) = setup(Arc::new(FakeApi::default()));
        drag.drag_start("L1").unwrap();
        assert!(drag.drag_over(Some(&won())).unwrap());
        let version = store.version();
        for _ in 0..5 {
            assert!(!drag.drag_over(Some(&won())).unwrap());
        }
        assert_eq!(store.version(), version);

        // Hovering a lead that lives in the same column is the same column.
        assert!(!drag.drag_over(Some(&DropTarget::Lead("L1".into()))).unwrap());
        // Back to the source column counts as a new column entry.
        assert!(drag.drag_over(Some(&DropTarget::Lead("L2".into()))).unwrap());
        assert_eq!(store.snapshot().arrangement()[0].1, ids(&["L2", "L1"]));
    }

    #[tokio::test]
    async fn test_scenario_confirmed_move() {
        let api = Arc::new(FakeApi::default());
        let mut confirmed = two_stage_board();
        let (_, l1) = confirmed.remove_lead("L1").unwrap();
        confirmed.insert_lead("won", 0, l1);
        api.push_move_reply(Ok(MoveResponse::Board {
            board: confirmed.clone(),
        }));
        let (store, drag) = setup(api.clone());

        drag.drag_start("L1").unwrap();
        drag.drag_over(Some(&won())).unwrap();
        assert_eq!(
            store.snapshot().arrangement(),
            vec![("new".into(), ids(&["L2"])), ("won".into(), ids(&["L1"]))]
        );

        let outcome = drag.drag_end(Some(&won())).await.unwrap();
        assert!(matches!(outcome, DragOutcome::Committed { .. }));
        assert_eq!(store.snapshot(), confirmed);

        let calls = api.move_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "L1");
        assert_eq!(calls[0].1.column_id, "won");
        assert_eq!(calls[0].1.position, 0);
        assert_eq!(drag.state(), DragState::Idle);
    }

    #[tokio::test]
    async fn test_scenario_rejected_move_keeps_optimistic_board() {
        let api = Arc::new(FakeApi::default());
        api.push_move_reply(Err(ApiError::from_status(422, "stage locked")));
        let (store, drag) = setup(api);

        drag.drag_start("L1").unwrap();
        drag.drag_over(Some(&won())).unwrap();
        let outcome = drag.drag_end(Some(&won())).await.unwrap();

        assert!(matches!(
            outcome,
            DragOutcome::Failed(ApiError::Validation { status: 422, .. })
        ));
        assert_eq!(
            store.snapshot().arrangement(),
            vec![("new".into(), ids(&["L2"])), ("won".into(), ids(&["L1"]))]
        );
        assert!(!drag.is_pending("L1"));
    }

    #[tokio::test]
    async fn test_server_answer_overrides_guess() {
        let api = Arc::new(FakeApi::default());
        // Server keeps L1 in "new", but after L2.
        let mut server = two_stage_board();
        let (_, l1) = server.remove_lead("L1").unwrap();
        server.insert_lead("new", 1, l1);
        api.push_move_reply(Ok(MoveResponse::Board {
            board: server.clone(),
        }));
        let (store, drag) = setup(api);

        drag.drag_start("L1").unwrap();
        drag.drag_over(Some(&won())).unwrap();
        drag.drag_end(Some(&won())).await.unwrap();
        assert_eq!(store.snapshot(), server);
    }

    #[tokio::test]
    async fn test_drop_on_lead_takes_its_slot() {
        let api = Arc::new(FakeApi::default());
        api.push_move_reply(Err(ApiError::Network("offline".into())));
        let store = Arc::new(BoardStore::with_board(
            api.clone(),
            crate::types::Board {
                columns: vec![
                    column("new", vec![lead("L1", "a")]),
                    column("won", vec![lead("W1", "b"), lead("W2", "c")]),
                ],
                account: None,
            },
        ));
        let drag = DragReconciler::new(store.clone());

        drag.drag_start("L1").unwrap();
        drag.drag_over(Some(&DropTarget::Lead("W2".into()))).unwrap();
        drag.drag_end(Some(&DropTarget::Lead("W2".into()))).await.unwrap();

        assert_eq!(store.snapshot().arrangement()[1].1, ids(&["W1", "L1", "W2"]));
        let calls = api.move_calls.lock().unwrap();
        assert_eq!(calls[0].1.position, 1);
    }

    #[tokio::test]
    async fn test_cancel_keeps_hover_moves_and_skips_server() {
        let api = Arc::new(FakeApi::default());
        let (store, drag) = setup(api.clone());

        drag.drag_start("L1").unwrap();
        drag.drag_over(Some(&won())).unwrap();
        let outcome = drag.drag_end(None).await.unwrap();

        assert_eq!(outcome, DragOutcome::Cancelled);
        assert_eq!(store.snapshot().arrangement()[1].1, ids(&["L1"]));
        assert!(api.move_calls.lock().unwrap().is_empty());
        assert_eq!(drag.drag_cancel(), Err(DragError::NoActiveSession));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_lead_cannot_be_dragged_again() {
        let api = Arc::new(FakeApi::default());
        *api.move_delay.lock().unwrap() = Duration::from_millis(200);
        api.push_move_reply(Err(ApiError::Network("timeout".into())));
        let (_, drag) = setup(api);
        let drag = Arc::new(drag);

        drag.drag_start("L1").unwrap();
        drag.drag_over(Some(&won())).unwrap();
        let committing = {
            let drag = drag.clone();
            tokio::spawn(async move { drag.drag_end(Some(&won())).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(drag.is_pending("L1"));
        assert_eq!(drag.state(), DragState::Committing(vec!["L1".into()]));
        assert_eq!(drag.drag_start("L1"), Err(DragError::LeadBusy("L1".into())));
        // A different lead is free to move meanwhile.
        drag.drag_start("L2").unwrap();
        drag.drag_cancel().unwrap();

        committing.await.unwrap().unwrap();
        assert!(!drag.is_pending("L1"));
        drag.drag_start("L1").unwrap();
    }

    #[test]
    fn test_pointer_frame_drives_hover() {
        let (store, drag) = setup(Arc::new(FakeApi::default()));
        drag.drag_start("L1").unwrap();
        let frame = CollisionInput {
            pointer: Some(Point { x: 150.0, y: 20.0 }),
            active: Rect::new(120.0, 0.0, 80.0, 40.0),
            droppables: vec![
                Droppable {
                    target: DropTarget::Column("new".into()),
                    rect: Rect::new(0.0, 0.0, 100.0, 400.0),
                },
                Droppable {
                    target: won(),
                    rect: Rect::new(110.0, 0.0, 100.0, 400.0),
                },
            ],
        };
        assert!(drag.drag_over_at(&frame).unwrap());
        assert_eq!(store.snapshot().arrangement()[1].1, ids(&["L1"]));
        assert!(!drag.drag_over_at(&frame).unwrap());
    }

    #[test]
    fn test_second_gesture_rejected_while_dragging() {
        let (_, drag) = setup(Arc::new(FakeApi::default()));
        drag.drag_start("L1").unwrap();
        assert_eq!(drag.drag_start("L2"), Err(DragError::SessionActive));
        assert_eq!(
            DragReconciler::new(Arc::new(BoardStore::with_board(
                Arc::new(FakeApi::default()),
                two_stage_board()
            )))
            .drag_start("L9"),
            Err(DragError::Board(BoardError::LeadNotFound("L9".into())))
        );
    }
}
