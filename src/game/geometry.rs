//! Integer geometry shared by the placement engine and the modes

use std::fmt;

/// Position in arena pixels (origin top-left, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position shifted by the given deltas, clamped to the coordinate range
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }

    /// Squared euclidean distance, exact for any pair of positions
    pub fn distance_squared(self, other: Position) -> u128 {
        let dx = u128::from((i64::from(other.x) - i64::from(self.x)).unsigned_abs());
        let dy = u128::from((i64::from(other.y) - i64::from(self.y)).unsigned_abs());
        dx * dx + dy * dy
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned box. Right and bottom edges are exclusive.
///
/// Edge math is done in `i64` so boxes anywhere in the `i32` plane compare
/// without overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub origin: Position,
    pub size: Size,
}

impl Bounds {
    pub const fn new(origin: Position, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn left(&self) -> i64 {
        i64::from(self.origin.x)
    }

    pub fn top(&self) -> i64 {
        i64::from(self.origin.y)
    }

    pub fn right(&self) -> i64 {
        self.left() + i64::from(self.size.width)
    }

    pub fn bottom(&self) -> i64 {
        self.top() + i64::from(self.size.height)
    }

    pub fn left_of(&self, reference: &Bounds) -> bool {
        self.right() <= reference.left()
    }

    pub fn right_of(&self, reference: &Bounds) -> bool {
        self.left() >= reference.right()
    }

    pub fn above(&self, reference: &Bounds) -> bool {
        self.bottom() <= reference.top()
    }

    pub fn below(&self, reference: &Bounds) -> bool {
        self.top() >= reference.bottom()
    }

    /// True when the two boxes share at least one pixel
    pub fn overlaps(&self, other: &Bounds) -> bool {
        !self.left_of(other) && !self.right_of(other) && !self.above(other) && !self.below(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalDirection {
    Left,
    Right,
}

impl HorizontalDirection {
    pub fn invert(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalDirection {
    Up,
    Down,
}

/// Axis along which a wall was struck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}
