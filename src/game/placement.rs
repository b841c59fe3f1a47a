//! Collision resolution for a proposed entity position
//!
//! Evaluation is a pure function of the mover, the candidate position, the
//! arena and the live scene. It never mutates anything; the session applies
//! the outcome.

use std::ops::RangeInclusive;

use super::entity::{Dynamics, Entity};
use super::geometry::{Bounds, Orientation, Position, Size};
use crate::util::EntityId;

/// Horizontal range accepted for operator-injected entities
pub const INJECTION_X: RangeInclusive<i32> = 0..=240;
/// Vertical range accepted for operator-injected entities
pub const INJECTION_Y: RangeInclusive<i32> = 25..=175;

/// Playing field walls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arena {
    pub size: Size,
    /// Also test the top and bottom walls
    pub vertical_bounds: bool,
}

impl Arena {
    pub fn new(size: Size, vertical_bounds: bool) -> Self {
        Self {
            size,
            vertical_bounds,
        }
    }

    fn wall_hit(&self, candidate: &Bounds) -> Option<Orientation> {
        let field = Bounds::new(Position::new(0, 0), self.size);

        if self.vertical_bounds
            && (candidate.top() < field.top() || candidate.bottom() > field.bottom())
        {
            return Some(Orientation::Vertical);
        }
        if candidate.left() < field.left() || candidate.right() > field.right() {
            return Some(Orientation::Horizontal);
        }
        None
    }
}

/// Result of testing a candidate position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    /// Wall struck, vertical taking precedence
    pub hit: Option<Orientation>,
    /// Entity the mover interacts with
    pub target: Option<EntityId>,
}

struct Ranked {
    id: EntityId,
    dangerous: bool,
    distance: u128,
}

impl Ranked {
    /// Dangerous first, then nearest; later entries win ties
    fn beats(&self, best: &Ranked) -> bool {
        match (self.dangerous, best.dangerous) {
            (true, false) => true,
            (false, true) => false,
            _ => self.distance <= best.distance,
        }
    }
}

/// Evaluate `mover` at `candidate` against the walls and every other entity in `scene`
pub fn evaluate<'a, I>(mover: &Entity, candidate: Position, arena: &Arena, scene: I) -> Placement
where
    I: IntoIterator<Item = &'a Entity>,
{
    let bounds = mover.bounds_at(candidate);
    let hit = arena.wall_hit(&bounds);

    if mover.dynamics() == Dynamics::Floating {
        return Placement { hit, target: None };
    }

    let mut rigid = None;
    let mut interactive: Option<Ranked> = None;

    for other in scene {
        if other.id == mover.id || !bounds.overlaps(&other.bounds()) {
            continue;
        }

        match other.dynamics() {
            Dynamics::Rigid => rigid = Some(other.id),
            Dynamics::Interactive => {
                let ranked = Ranked {
                    id: other.id,
                    dangerous: other.is_dangerous(),
                    distance: other.position.distance_squared(candidate),
                };
                if interactive.as_ref().map_or(true, |best| ranked.beats(best)) {
                    interactive = Some(ranked);
                }
            }
            Dynamics::Floating => {}
        }
    }

    Placement {
        hit,
        target: rigid.or(interactive.map(|ranked| ranked.id)),
    }
}

/// Injection bounds check shared by the operator console and the session
pub fn validate_injection(position: Position) -> Result<(), PlacementError> {
    if INJECTION_X.contains(&position.x) && INJECTION_Y.contains(&position.y) {
        Ok(())
    } else {
        Err(PlacementError::OutOfBounds {
            x: position.x,
            y: position.y,
        })
    }
}

/// Placement errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("position ({x}, {y}) is outside the valid bounds (x=[0,240], y=[25,175])")]
    OutOfBounds { x: i32, y: i32 },
}
