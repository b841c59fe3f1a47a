//! Behavior values ("modes") governing entity motion and reactions
//!
//! A mode never mutates itself. Every hook returns a [`Reaction`] (or a
//! [`Control`] for player input) and the session applies it, replacing the
//! entity's mode wholesale when the reaction carries a new value.

use std::fmt;
use std::str::FromStr;

use super::geometry::{HorizontalDirection, Orientation, Position, VerticalDirection};
use super::speed::{Speed, SpeedRatio};
use super::sprite::{Sequence, Sprite};

/// Relocations a patrol makes before turning on its own
pub const PATROL_TURN_AFTER: u32 = 33;
/// Pixels a patrol steps down when it turns
pub const PATROL_DESCENT: i32 = 10;

const PATROL_NUMERATOR: i32 = 7;
const PATROL_LINE_NUMERATOR: i32 = 2;
const SHOT_NUMERATOR: i32 = 4;
const SWEEP_NUMERATOR: i32 = 4;
const PLAYER_SPEED: SpeedRatio = SpeedRatio::new(6, 3);

/// Player shots vanish above this row
pub const PLAYER_SHOT_CEILING: i32 = -20;
/// Enemy shots vanish below this row
pub const ENEMY_SHOT_FLOOR: i32 = 260;
/// Horizontal extent outside which a sweeping saucer vanishes
pub const SWEEP_MIN_X: i32 = -20;
pub const SWEEP_MAX_X: i32 = 260;

/// Ticks per step for a given difficulty, never below one
pub fn speed_denominator(difficulty: i32) -> i32 {
    (3 - difficulty).max(1)
}

/// Patrol denominator for an enemy currently at row `y`; lower rows move faster
fn row_denominator(y: i32) -> i32 {
    (10 - y / 32).max(1)
}

/// Enemy kinds sharing the patrol algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnemyKind {
    Squid,
    Crab,
    Octopus,
}

impl EnemyKind {
    pub fn sequence(self) -> Sequence {
        match self {
            EnemyKind::Squid => Sequence::SQUID,
            EnemyKind::Crab => Sequence::CRAB,
            EnemyKind::Octopus => Sequence::OCTOPUS,
        }
    }

    /// Points awarded for destroying one
    pub fn score(self) -> u32 {
        match self {
            EnemyKind::Squid => 10,
            EnemyKind::Crab => 20,
            EnemyKind::Octopus => 40,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EnemyKind::Squid => "squid",
            EnemyKind::Crab => "crab",
            EnemyKind::Octopus => "octopus",
        }
    }
}

impl fmt::Display for EnemyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnemyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "squid" => Ok(EnemyKind::Squid),
            "crab" => Ok(EnemyKind::Crab),
            "octopus" => Ok(EnemyKind::Octopus),
            other => Err(format!("unknown enemy kind '{other}'")),
        }
    }
}

/// Side-to-side march with periodic descent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patrol {
    pub kind: EnemyKind,
    pub facing: HorizontalDirection,
    pub moves: u32,
    pub denominator: i32,
    /// Spawned as part of a formation line; lines march slower
    pub in_line: bool,
}

impl Patrol {
    pub fn new(kind: EnemyKind, difficulty: i32, in_line: bool) -> Self {
        Self {
            kind,
            facing: HorizontalDirection::Left,
            moves: 0,
            denominator: speed_denominator(difficulty),
            in_line,
        }
    }

    fn speed(&self) -> Speed {
        let numerator = if self.in_line {
            PATROL_LINE_NUMERATOR
        } else {
            PATROL_NUMERATOR
        };
        let ratio = SpeedRatio::new(numerator, self.denominator);
        match self.facing {
            HorizontalDirection::Left => Speed::horizontal(ratio.negate()),
            HorizontalDirection::Right => Speed::horizontal(ratio),
        }
    }

    /// Turn around and step down from row `at`
    fn turn(&self, at: Position) -> Reaction {
        Reaction::Descend {
            to: at.offset(0, PATROL_DESCENT),
            mode: Mode::Patrol(Patrol {
                facing: self.facing.invert(),
                moves: 0,
                denominator: row_denominator(at.y),
                ..*self
            }),
        }
    }
}

/// Straight vertical flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projectile {
    pub heading: VerticalDirection,
    pub denominator: i32,
    pub sprite: Sprite,
}

impl Projectile {
    /// Shot fired by the player, travelling up
    pub fn upward(difficulty: i32) -> Self {
        Self {
            heading: VerticalDirection::Up,
            denominator: speed_denominator(difficulty),
            sprite: Sprite::Shot1,
        }
    }

    /// Shot fired by an enemy, travelling down
    pub fn downward(difficulty: i32, sprite: Sprite) -> Self {
        Self {
            heading: VerticalDirection::Down,
            denominator: speed_denominator(difficulty),
            sprite,
        }
    }

    fn out_of_play(&self, at: Position) -> bool {
        match self.heading {
            VerticalDirection::Up => at.y < PLAYER_SHOT_CEILING,
            VerticalDirection::Down => at.y > ENEMY_SHOT_FLOOR,
        }
    }
}

/// One-way horizontal crossing (flying saucer)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sweep {
    pub direction: HorizontalDirection,
    pub denominator: i32,
}

impl Sweep {
    pub fn new(direction: HorizontalDirection, difficulty: i32) -> Self {
        Self {
            direction,
            denominator: speed_denominator(difficulty),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No motion; also used to freeze an entity in place
    Static { sprite: Sprite },
    Patrol(Patrol),
    Projectile(Projectile),
    Standing { facing: HorizontalDirection },
    Moving { facing: HorizontalDirection },
    Sweep(Sweep),
}

/// What a mode asks the session to do after a relocation or a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Keep,
    /// Replace the mode without notifying clients (counter bookkeeping)
    Advance(Mode),
    /// Announced transition
    Switch(Mode),
    /// Move to `to` and switch to `mode`
    Descend { to: Position, mode: Mode },
    /// The wall does not apply to this mode; relocate as if nothing was hit
    Proceed,
    Delete,
}

/// What a controllable mode asks the session to do for a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Ignored,
    Switch(Mode),
    /// Fire a player shot from `origin`, then optionally announce `then`
    Shoot {
        origin: Position,
        then: Option<Mode>,
    },
}

impl Mode {
    /// Initial mode of a freshly spawned player
    pub fn player_initial() -> Self {
        Mode::Standing {
            facing: HorizontalDirection::Right,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Static { .. } => "Static",
            Mode::Patrol(_) => "Patrol",
            Mode::Projectile(_) => "Projectile",
            Mode::Standing { .. } => "Standing",
            Mode::Moving { .. } => "Moving",
            Mode::Sweep(_) => "Sweep",
        }
    }

    pub fn speed(&self) -> Speed {
        match self {
            Mode::Static { .. } | Mode::Standing { .. } => Speed::stationary(),
            Mode::Patrol(patrol) => patrol.speed(),
            Mode::Projectile(shot) => {
                let ratio = SpeedRatio::new(SHOT_NUMERATOR, shot.denominator);
                match shot.heading {
                    VerticalDirection::Up => Speed::vertical(ratio.negate()),
                    VerticalDirection::Down => Speed::vertical(ratio),
                }
            }
            Mode::Moving { facing } => match facing {
                HorizontalDirection::Left => Speed::horizontal(PLAYER_SPEED.negate()),
                HorizontalDirection::Right => Speed::horizontal(PLAYER_SPEED),
            },
            Mode::Sweep(sweep) => {
                let ratio = SpeedRatio::new(SWEEP_NUMERATOR, sweep.denominator);
                match sweep.direction {
                    HorizontalDirection::Left => Speed::horizontal(ratio.negate()),
                    HorizontalDirection::Right => Speed::horizontal(ratio),
                }
            }
        }
    }

    pub fn sequence(&self) -> Sequence {
        match self {
            Mode::Static { sprite } => sprite.sequence(),
            Mode::Patrol(patrol) => patrol.kind.sequence(),
            Mode::Projectile(shot) => shot.sprite.sequence(),
            Mode::Standing { .. } | Mode::Moving { .. } => Sprite::Spacecraft.sequence(),
            Mode::Sweep(_) => Sprite::FlyingSaucer.sequence(),
        }
    }

    /// Motionless copy showing the current first frame
    pub fn frozen(&self) -> Mode {
        Mode::Static {
            sprite: self.sequence().first(),
        }
    }

    /// Hook run after the entity has been moved to `at`
    pub fn on_relocate(&self, at: Position) -> Reaction {
        match self {
            Mode::Patrol(patrol) => {
                if patrol.moves == PATROL_TURN_AFTER {
                    patrol.turn(at)
                } else {
                    Reaction::Advance(Mode::Patrol(Patrol {
                        moves: patrol.moves + 1,
                        ..*patrol
                    }))
                }
            }
            Mode::Projectile(shot) if shot.out_of_play(at) => Reaction::Delete,
            Mode::Sweep(_) if at.x < SWEEP_MIN_X || at.x > SWEEP_MAX_X => Reaction::Delete,
            _ => Reaction::Keep,
        }
    }

    /// Hook run instead of relocating when the candidate position hit a wall.
    /// `at` is the entity's current (uncorrected) position.
    pub fn on_hit(&self, at: Position, _orientation: Orientation) -> Reaction {
        match self {
            Mode::Patrol(patrol) => patrol.turn(at),
            Mode::Projectile(_) | Mode::Sweep(_) => Reaction::Proceed,
            // Re-announcing the player at its server position corrects the client
            Mode::Standing { facing } | Mode::Moving { facing } => {
                Reaction::Switch(Mode::Standing { facing: *facing })
            }
            Mode::Static { .. } => Reaction::Keep,
        }
    }

    /// Whether this mode accepts player key events
    pub fn is_controllable(&self) -> bool {
        matches!(self, Mode::Standing { .. } | Mode::Moving { .. })
    }

    pub fn on_move_left(&self) -> Control {
        self.steer(HorizontalDirection::Left)
    }

    pub fn on_move_right(&self) -> Control {
        self.steer(HorizontalDirection::Right)
    }

    fn steer(&self, facing: HorizontalDirection) -> Control {
        if self.is_controllable() {
            Control::Switch(Mode::Moving { facing })
        } else {
            Control::Ignored
        }
    }

    /// `at` is the player's current position
    pub fn on_shoot(&self, at: Position) -> Control {
        match self {
            Mode::Standing { .. } => Control::Shoot {
                origin: at.offset(4, -4),
                then: None,
            },
            Mode::Moving { .. } => Control::Shoot {
                origin: at.offset(3, -4),
                then: Some(*self),
            },
            _ => Control::Ignored,
        }
    }

    pub fn on_release(&self) -> Control {
        match self {
            Mode::Moving { facing } => Control::Switch(Mode::Standing { facing: *facing }),
            _ => Control::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relocate_n(mut mode: Mode, mut at: Position, n: u32) -> (Mode, Position, Vec<Reaction>) {
        let mut seen = Vec::new();
        for _ in 0..n {
            at = at.offset(-1, 0);
            let reaction = mode.on_relocate(at);
            match reaction {
                Reaction::Advance(next) | Reaction::Switch(next) => mode = next,
                Reaction::Descend { to, mode: next } => {
                    at = to;
                    mode = next;
                }
                _ => {}
            }
            seen.push(reaction);
        }
        (mode, at, seen)
    }

    #[test]
    fn patrol_turns_by_itself_after_threshold() {
        let start = Mode::Patrol(Patrol::new(EnemyKind::Crab, -6, false));
        let origin = Position::new(120, 70);

        let (mode, at, seen) = relocate_n(start, origin, PATROL_TURN_AFTER);
        assert!(seen.iter().all(|r| matches!(r, Reaction::Advance(_))));
        assert_eq!(at.y, 70);
        assert!(matches!(mode, Mode::Patrol(Patrol { moves: 33, .. })));

        let (mode, at, seen) = relocate_n(mode, at, 1);
        assert!(matches!(seen[0], Reaction::Descend { .. }));
        assert_eq!(at.y, 70 + PATROL_DESCENT);
        match mode {
            Mode::Patrol(patrol) => {
                assert_eq!(patrol.facing, HorizontalDirection::Right);
                assert_eq!(patrol.moves, 0);
                assert_eq!(patrol.denominator, 10 - 70 / 32);
            }
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn patrol_turns_immediately_on_hit() {
        let patrol = Patrol {
            moves: 5,
            ..Patrol::new(EnemyKind::Squid, 0, true)
        };
        let reaction = Mode::Patrol(patrol).on_hit(Position::new(2, 200), Orientation::Horizontal);
        match reaction {
            Reaction::Descend {
                to,
                mode: Mode::Patrol(next),
            } => {
                assert_eq!(to, Position::new(2, 210));
                assert_eq!(next.facing, HorizontalDirection::Right);
                assert_eq!(next.moves, 0);
                assert_eq!(next.denominator, 10 - 200 / 32);
                assert_eq!(next.speed().x, SpeedRatio::new(2, 4));
            }
            other => panic!("unexpected reaction {other:?}"),
        }
    }

    #[test]
    fn deep_rows_never_reach_zero_denominator() {
        assert_eq!(row_denominator(400), 1);
        assert_eq!(speed_denominator(7), 1);
        assert_eq!(speed_denominator(-6), 9);
    }

    #[test]
    fn patrol_speed_sign_follows_facing() {
        let left = Patrol::new(EnemyKind::Octopus, 0, false);
        assert_eq!(Mode::Patrol(left).speed().x, SpeedRatio::new(-7, 3));
        let right = Patrol {
            facing: HorizontalDirection::Right,
            ..left
        };
        assert_eq!(Mode::Patrol(right).speed().x, SpeedRatio::new(7, 3));
    }

    #[test]
    fn projectiles_self_delete_past_their_boundary() {
        let up = Mode::Projectile(Projectile::upward(0));
        assert_eq!(up.on_relocate(Position::new(10, -20)), Reaction::Keep);
        assert_eq!(up.on_relocate(Position::new(10, -21)), Reaction::Delete);

        let down = Mode::Projectile(Projectile::downward(0, Sprite::Shot2));
        assert_eq!(down.on_relocate(Position::new(10, 260)), Reaction::Keep);
        assert_eq!(down.on_relocate(Position::new(10, 261)), Reaction::Delete);
        assert_eq!(down.speed().y, SpeedRatio::new(4, 3));
    }

    #[test]
    fn sweep_leaves_the_arena_and_ignores_walls() {
        let sweep = Mode::Sweep(Sweep::new(HorizontalDirection::Left, 0));
        assert_eq!(
            sweep.on_hit(Position::new(250, 50), Orientation::Horizontal),
            Reaction::Proceed
        );
        assert_eq!(sweep.on_relocate(Position::new(-21, 50)), Reaction::Delete);
        assert_eq!(sweep.on_relocate(Position::new(100, 50)), Reaction::Keep);
    }

    #[test]
    fn player_controls() {
        let standing = Mode::player_initial();
        assert_eq!(
            standing.on_move_left(),
            Control::Switch(Mode::Moving {
                facing: HorizontalDirection::Left
            })
        );
        assert_eq!(standing.on_release(), Control::Ignored);
        assert_eq!(
            standing.on_shoot(Position::new(100, 200)),
            Control::Shoot {
                origin: Position::new(104, 196),
                then: None
            }
        );

        let moving = Mode::Moving {
            facing: HorizontalDirection::Left,
        };
        assert_eq!(moving.speed().x, SpeedRatio::new(-6, 3));
        assert_eq!(
            moving.on_release(),
            Control::Switch(Mode::Standing {
                facing: HorizontalDirection::Left
            })
        );
        assert_eq!(
            moving.on_shoot(Position::new(100, 200)),
            Control::Shoot {
                origin: Position::new(103, 196),
                then: Some(moving)
            }
        );

        let patrol = Mode::Patrol(Patrol::new(EnemyKind::Squid, 0, false));
        assert!(!patrol.is_controllable());
        assert_eq!(patrol.on_move_right(), Control::Ignored);
    }

    #[test]
    fn player_hitting_a_wall_is_reannounced_standing() {
        let moving = Mode::Moving {
            facing: HorizontalDirection::Right,
        };
        assert_eq!(
            moving.on_hit(Position::new(240, 222), Orientation::Horizontal),
            Reaction::Switch(Mode::Standing {
                facing: HorizontalDirection::Right
            })
        );
    }

    #[test]
    fn frozen_mode_is_motionless_first_frame() {
        let frozen = Mode::Patrol(Patrol::new(EnemyKind::Crab, 0, false)).frozen();
        assert_eq!(frozen, Mode::Static { sprite: Sprite::Crab1 });
        assert_eq!(frozen.speed(), Speed::stationary());
    }

    #[test]
    fn enemy_kind_parses_console_names() {
        assert_eq!("octopus".parse::<EnemyKind>(), Ok(EnemyKind::Octopus));
        assert!("ufo".parse::<EnemyKind>().is_err());
        assert_eq!(EnemyKind::Crab.score(), 20);
    }
}
