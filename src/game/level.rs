//! Level layouts

use super::entity::{Entity, Role};
use super::geometry::{Position, Size};
use super::mode::Mode;
use super::sprite::Sprite;
use crate::util::EntityId;

/// Mutable view of a session handed to a level during setup
pub trait World {
    /// Insert an entity, announcing it to every attached client
    fn spawn(&mut self, entity: Entity) -> EntityId;

    fn set_score(&mut self, score: u32);
}

/// Static terrain and player spawn for a session
pub trait Level: Send + Sync {
    fn name(&self) -> &'static str;

    fn game_area_size(&self) -> Size;

    /// Populate `world` and return the id of the freshly spawned player
    fn setup(&self, world: &mut dyn World, starting_score: u32) -> EntityId;
}

/// Block offsets of one bunker relative to its top-left block
const BUNKER_BLOCKS: [(i32, i32); 24] = [
    (0, 0),
    (4, 0),
    (8, 0),
    (-4, 2),
    (0, 2),
    (4, 2),
    (8, 2),
    (12, 2),
    (-6, 6),
    (-2, 6),
    (2, 6),
    (6, 6),
    (10, 6),
    (14, 6),
    (2, 8),
    (6, 8),
    (-6, 10),
    (-2, 10),
    (10, 10),
    (14, 10),
    (-6, 14),
    (-2, 14),
    (10, 14),
    (14, 14),
];

const FIRST_BUNKER: Position = Position::new(34, 190);
const BUNKER_SPACING: i32 = 59;
const BUNKER_COUNT: i32 = 4;

const PLAYER_X: i32 = 123;
const PLAYER_FLOOR: i32 = 230;

/// Native NES resolution with four bunkers and a lone spacecraft
pub struct Level1;

impl Level for Level1 {
    fn name(&self) -> &'static str {
        "level-1"
    }

    fn game_area_size(&self) -> Size {
        Size::new(256, 240)
    }

    fn setup(&self, world: &mut dyn World, starting_score: u32) -> EntityId {
        for bunker in 0..BUNKER_COUNT {
            let origin = FIRST_BUNKER.offset(bunker * BUNKER_SPACING, 0);
            for (dx, dy) in BUNKER_BLOCKS {
                world.spawn(Entity::new(
                    Role::Bunker,
                    origin.offset(dx, dy),
                    Mode::Static {
                        sprite: Sprite::Bunker,
                    },
                ));
            }
        }

        world.set_score(starting_score);

        let spawn = Position::new(PLAYER_X, PLAYER_FLOOR - Sprite::Spacecraft.size().height);
        world.spawn(Entity::new(
            Role::Player { lost: false },
            spawn,
            Mode::player_initial(),
        ))
    }
}
