//! Entities living inside a game session

use std::fmt;

use super::geometry::{Bounds, Position};
use super::mode::{EnemyKind, Mode};
use crate::net::protocol::Command;
use crate::util::EntityId;

/// Collision participation class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dynamics {
    /// Destroys whatever runs into it
    Rigid,
    Interactive,
    /// Takes no part in collisions
    Floating,
}

/// What an entity is, independent of how it currently behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Bunker,
    Enemy { kind: EnemyKind },
    Saucer { score: u32 },
    PlayerShot,
    EnemyShot,
    Player { lost: bool },
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Bunker => "Bunker",
            Role::Enemy {
                kind: EnemyKind::Squid,
            } => "Squid",
            Role::Enemy {
                kind: EnemyKind::Crab,
            } => "Crab",
            Role::Enemy {
                kind: EnemyKind::Octopus,
            } => "Octopus",
            Role::Saucer { .. } => "Saucer",
            Role::PlayerShot => "PlayerShot",
            Role::EnemyShot => "EnemyShot",
            Role::Player { .. } => "Player",
        }
    }

    /// Points for destroying this entity with a player shot
    pub fn score(&self) -> Option<u32> {
        match self {
            Role::Enemy { kind } => Some(kind.score()),
            Role::Saucer { score } => Some(*score),
            _ => None,
        }
    }

    /// Eligible to fire enemy shots
    pub fn is_shooter(&self) -> bool {
        matches!(self, Role::Enemy { .. })
    }
}

/// Positioned simulation object. Owned exclusively by its session.
#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub position: Position,
    pub mode: Mode,
    pub role: Role,
}

impl Entity {
    /// Create an entity with a freshly allocated id
    pub fn new(role: Role, position: Position, mode: Mode) -> Self {
        Self {
            id: EntityId::next(),
            position,
            mode,
            role,
        }
    }

    pub fn dynamics(&self) -> Dynamics {
        match self.role {
            Role::Bunker => Dynamics::Rigid,
            Role::Player { lost: true } => Dynamics::Floating,
            _ => Dynamics::Interactive,
        }
    }

    /// Dangerous entities win interaction ranking regardless of distance
    pub fn is_dangerous(&self) -> bool {
        matches!(self.role, Role::PlayerShot | Role::EnemyShot)
    }

    /// Draw order
    pub fn z(&self) -> i32 {
        match self.role {
            Role::Enemy { .. } | Role::Saucer { .. } | Role::PlayerShot | Role::EnemyShot => 2,
            Role::Bunker | Role::Player { .. } => 0,
        }
    }

    /// Collision box at `origin`, sized by the current animation
    pub fn bounds_at(&self, origin: Position) -> Bounds {
        Bounds::new(origin, self.mode.sequence().size())
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds_at(self.position)
    }

    pub fn put_command(&self) -> Command {
        Command::Put {
            id: self.id,
            x: self.position.x,
            y: self.position.y,
            z: self.z(),
            speed: self.mode.speed(),
            seq: self.mode.sequence().frame_ids(),
        }
    }

    pub fn delete_command(&self) -> Command {
        Command::Delete { id: self.id }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {} [{}]",
            self.role.label(),
            self.id,
            self.position,
            self.mode.name()
        )
    }
}
