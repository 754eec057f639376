/// Collision detection for drag gestures.
///
/// Two strategies, tried in a fixed order by `TwoPassCollision`:
/// - `PointerWithin`: the first droppable (in traversal order) whose rect
///   contains the pointer.
/// - `RectIntersection`: the droppable whose rect overlaps the dragged rect
///   the most, measured as intersection over union. Ties keep the earlier
///   droppable; zero overlap never matches.
use serde::{Deserialize, Serialize};

use crate::types::{ColumnId, LeadId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Edges are inclusive.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right() && p.y >= self.top && p.y <= self.bottom()
    }

    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let w = self.right().min(other.right()) - self.left.max(other.left);
        let h = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Intersection over union, in [0, 1].
    pub fn intersection_ratio(&self, other: &Rect) -> f64 {
        let inter = self.intersection_area(other);
        if inter == 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Something a lead can be dropped on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DropTarget {
    /// Empty column space: the lead goes to the tail.
    Column(ColumnId),
    /// Another lead: the dragged lead takes that lead's slot.
    Lead(LeadId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Droppable {
    pub target: DropTarget,
    pub rect: Rect,
}

/// Geometry of one drag-over frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionInput {
    /// Pointer position, absent for keyboard-driven drags.
    pub pointer: Option<Point>,
    /// Current rect of the dragged item.
    pub active: Rect,
    /// Droppables in traversal order.
    pub droppables: Vec<Droppable>,
}

pub trait CollisionStrategy: Send + Sync {
    fn detect<'a>(&self, input: &'a CollisionInput) -> Option<&'a Droppable>;
}

pub struct PointerWithin;

impl CollisionStrategy for PointerWithin {
    fn detect<'a>(&self, input: &'a CollisionInput) -> Option<&'a Droppable> {
        let pointer = input.pointer?;
        input.droppables.iter().find(|d| d.rect.contains(pointer))
    }
}

pub struct RectIntersection;

impl CollisionStrategy for RectIntersection {
    fn detect<'a>(&self, input: &'a CollisionInput) -> Option<&'a Droppable> {
        let mut best: Option<(&Droppable, f64)> = None;
        for droppable in &input.droppables {
            let ratio = input.active.intersection_ratio(&droppable.rect);
            if ratio <= 0.0 {
                continue;
            }
            match best {
                Some((_, best_ratio)) if ratio <= best_ratio => {}
                _ => best = Some((droppable, ratio)),
            }
        }
        best.map(|(d, _)| d)
    }
}

/// Exact pointer hit first, overlap fallback second.
pub struct TwoPassCollision {
    passes: Vec<Box<dyn CollisionStrategy>>,
}

impl Default for TwoPassCollision {
    fn default() -> Self {
        Self {
            passes: vec![Box::new(PointerWithin), Box::new(RectIntersection)],
        }
    }
}

impl CollisionStrategy for TwoPassCollision {
    fn detect<'a>(&self, input: &'a CollisionInput) -> Option<&'a Droppable> {
        self.passes.iter().find_map(|pass| pass.detect(input))
    }
}
