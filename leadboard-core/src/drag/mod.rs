pub mod collision;
pub mod reconciler;

pub use collision::{
    CollisionInput, CollisionStrategy, DropTarget, Droppable, Point, PointerWithin, Rect,
    RectIntersection, TwoPassCollision,
};
pub use reconciler::{DragError, DragOutcome, DragReconciler, DragSession, DragState};
