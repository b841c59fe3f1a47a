//! Exact fractional velocities
//!
//! Clients advance an entity by `numerator` pixels every `denominator` ticks,
//! so motion is identical on every observer regardless of platform.

/// One-axis velocity as displacement over tick count. `0/0` means stationary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpeedRatio {
    pub numerator: i32,
    pub denominator: i32,
}

impl SpeedRatio {
    pub const STATIONARY: SpeedRatio = SpeedRatio {
        numerator: 0,
        denominator: 0,
    };

    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Same magnitude, opposite direction
    pub const fn negate(self) -> Self {
        Self {
            numerator: -self.numerator,
            denominator: self.denominator,
        }
    }
}

/// Two-axis velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Speed {
    pub x: SpeedRatio,
    pub y: SpeedRatio,
}

impl Speed {
    pub const fn stationary() -> Self {
        Self {
            x: SpeedRatio::STATIONARY,
            y: SpeedRatio::STATIONARY,
        }
    }

    pub const fn horizontal(x: SpeedRatio) -> Self {
        Self {
            x,
            y: SpeedRatio::STATIONARY,
        }
    }

    pub const fn vertical(y: SpeedRatio) -> Self {
        Self {
            x: SpeedRatio::STATIONARY,
            y,
        }
    }
}
