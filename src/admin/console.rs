//! Operator console read from stdin
//!
//! One command per line. Output goes back to stdout; failures never touch
//! session state.

use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::game::entity::{Entity, Role};
use crate::game::geometry::{HorizontalDirection, Position};
use crate::game::mode::{EnemyKind, Mode, Patrol, Sweep};
use crate::game::placement::{self, PlacementError};
use crate::game::{GameSession, SessionError, SessionRegistry};
use crate::util::ClientId;

/// Difficulty given to operator-spawned enemies
const INJECTED_DIFFICULTY: i32 = -6;
const LINE_START_X: i32 = 74;
const LINE_SPACING: i32 = 20;
const LINE_LENGTH: i32 = 9;
const SAUCER_ROW: i32 = 50;
const SAUCER_RIGHT_ENTRY: i32 = 256;

const HELP: &str = "\
=== Available commands ===
help: Show command help
game-list: Show running games
object-list <game>: Show all entities in a running game
add-enemy <game> <x> <y> [squid|crab|octopus]: Add an enemy
add-enemy-line <game> <y> [squid|crab|octopus]: Add an enemy line
add-saucer <game> <score>: Add a flying saucer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Help,
    GameList,
    ObjectList {
        game: ClientId,
    },
    AddEnemy {
        game: ClientId,
        position: Position,
        kind: EnemyKind,
    },
    AddEnemyLine {
        game: ClientId,
        y: i32,
        kind: EnemyKind,
    },
    AddSaucer {
        game: ClientId,
        score: u32,
    },
}

impl FromStr for AdminCommand {
    type Err = AdminError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut args = line.split_whitespace();
        let name = args.next().ok_or(AdminError::Empty)?;

        let command = match name {
            "help" => AdminCommand::Help,
            "game-list" => AdminCommand::GameList,
            "object-list" => AdminCommand::ObjectList {
                game: ClientId(number(&mut args)?),
            },
            "add-enemy" => AdminCommand::AddEnemy {
                game: ClientId(number(&mut args)?),
                position: Position::new(number(&mut args)?, number(&mut args)?),
                kind: kind(&mut args)?,
            },
            "add-enemy-line" => AdminCommand::AddEnemyLine {
                game: ClientId(number(&mut args)?),
                y: number(&mut args)?,
                kind: kind(&mut args)?,
            },
            "add-saucer" => AdminCommand::AddSaucer {
                game: ClientId(number(&mut args)?),
                score: number(&mut args)?,
            },
            other => return Err(AdminError::UnknownCommand(other.to_string())),
        };

        match args.next() {
            Some(extra) => Err(AdminError::BadUsage(format!("unexpected argument '{extra}'"))),
            None => Ok(command),
        }
    }
}

fn argument<'a>(args: &mut impl Iterator<Item = &'a str>) -> Result<&'a str, AdminError> {
    args.next()
        .ok_or_else(|| AdminError::BadUsage("missing argument".to_string()))
}

fn number<'a, T: FromStr>(args: &mut impl Iterator<Item = &'a str>) -> Result<T, AdminError> {
    let raw = argument(args)?;
    raw.parse()
        .map_err(|_| AdminError::BadUsage(format!("'{raw}' is not a valid number")))
}

fn kind<'a>(args: &mut impl Iterator<Item = &'a str>) -> Result<EnemyKind, AdminError> {
    argument(args)?.parse().map_err(AdminError::BadUsage)
}

fn expect_game(registry: &SessionRegistry, id: ClientId) -> Result<Arc<GameSession>, AdminError> {
    registry.get(id).ok_or(AdminError::NoSuchGame(id))
}

fn enemy(kind: EnemyKind, position: Position, in_line: bool) -> Entity {
    Entity::new(
        Role::Enemy { kind },
        position,
        Mode::Patrol(Patrol::new(kind, INJECTED_DIFFICULTY, in_line)),
    )
}

/// Run one command, returning the text to show the operator
pub fn execute(
    registry: &SessionRegistry,
    command: AdminCommand,
    rng: &mut impl Rng,
) -> Result<String, AdminError> {
    match command {
        AdminCommand::Help => Ok(HELP.to_string()),

        AdminCommand::GameList => {
            let ids = registry.session_ids();
            if ids.is_empty() {
                return Ok("No games are running".to_string());
            }
            let lines: Vec<String> = ids
                .into_iter()
                .filter_map(|id| registry.get(id))
                .map(|session| {
                    let stats = session.stats();
                    format!(
                        "Game {}: {} clients, {} objects, lives {}, score {}",
                        session.id(),
                        session.client_count(),
                        session.entity_count(),
                        stats.lives,
                        stats.score
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }

        AdminCommand::ObjectList { game } => {
            let session = expect_game(registry, game)?;
            let mut lines = session.entity_summaries();
            lines.push(format!("Total: {}", lines.len()));
            Ok(lines.join("\n"))
        }

        AdminCommand::AddEnemy {
            game,
            position,
            kind,
        } => {
            let session = expect_game(registry, game)?;
            let entity = enemy(kind, position, false);
            let created = format!("Created enemy {entity}");
            session.inject(entity)?;
            session.enemies_start_shooting();
            Ok(created)
        }

        AdminCommand::AddEnemyLine { game, y, kind } => {
            let session = expect_game(registry, game)?;
            placement::validate_injection(Position::new(LINE_START_X, y))?;

            let mut created = Vec::new();
            for slot in 0..LINE_LENGTH {
                let entity = enemy(kind, Position::new(LINE_START_X + slot * LINE_SPACING, y), true);
                created.push(format!("Created enemy {entity}"));
                session.inject(entity)?;
            }
            session.enemies_start_shooting();
            Ok(created.join("\n"))
        }

        AdminCommand::AddSaucer { game, score } => {
            let session = expect_game(registry, game)?;
            let (direction, x) = if rng.gen_bool(0.5) {
                (HorizontalDirection::Left, SAUCER_RIGHT_ENTRY)
            } else {
                (HorizontalDirection::Right, 0)
            };
            let saucer = Entity::new(
                Role::Saucer { score },
                Position::new(x, SAUCER_ROW),
                Mode::Sweep(Sweep::new(direction, 0)),
            );
            let created = format!("Created flying saucer {saucer}");
            session.spawn(saucer)?;
            Ok(created)
        }
    }
}

/// Read commands from stdin until it closes
pub async fn run(registry: Arc<SessionRegistry>, mut rng: ChaCha8Rng) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    info!("Admin console ready, type 'help' for commands");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Admin console read failed");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let output = match line
            .parse::<AdminCommand>()
            .and_then(|command| execute(&registry, command, &mut rng))
        {
            Ok(output) => output,
            Err(e) => {
                debug!(command = line, error = %e, "Admin command failed");
                format!("Error: {e}")
            }
        };

        if let Err(e) = stdout.write_all(format!("{output}\n").as_bytes()).await {
            warn!(error = %e, "Admin console write failed");
            break;
        }
        let _ = stdout.flush().await;
    }

    debug!("Admin console closed");
}

/// Admin console errors
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'. Type 'help' for more information.")]
    UnknownCommand(String),

    #[error("bad usage: {0}. Type 'help' for more information.")]
    BadUsage(String),

    #[error("no game has ID {0}")]
    NoSuchGame(ClientId),

    #[error("can't generate object: {0}")]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::Level1;
    use crate::game::SessionRules;
    use crate::net::client::testing::RecordingClient;
    use crate::net::client::ClientSink;
    use rand::SeedableRng;

    fn setup() -> (SessionRegistry, ClientId, ChaCha8Rng) {
        let registry = SessionRegistry::new(2, Arc::new(Level1), SessionRules::default(), Some(5));
        let player = RecordingClient::new();
        let id = player.client_id();
        registry.create_session(player).unwrap();
        (registry, id, ChaCha8Rng::seed_from_u64(5))
    }

    fn enemies(registry: &SessionRegistry, game: ClientId) -> usize {
        registry
            .get(game)
            .unwrap()
            .find_entities(|e| matches!(e.role, Role::Enemy { .. }))
            .len()
    }

    #[test]
    fn parses_every_command() {
        assert_eq!("help".parse::<AdminCommand>().unwrap(), AdminCommand::Help);
        assert_eq!(
            "add-enemy 3 100 40 crab".parse::<AdminCommand>().unwrap(),
            AdminCommand::AddEnemy {
                game: ClientId(3),
                position: Position::new(100, 40),
                kind: EnemyKind::Crab
            }
        );
        assert_eq!(
            "  add-enemy-line 3   60 squid ".parse::<AdminCommand>().unwrap(),
            AdminCommand::AddEnemyLine {
                game: ClientId(3),
                y: 60,
                kind: EnemyKind::Squid
            }
        );
        assert_eq!(
            "add-saucer 1 150".parse::<AdminCommand>().unwrap(),
            AdminCommand::AddSaucer {
                game: ClientId(1),
                score: 150
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            "launch".parse::<AdminCommand>(),
            Err(AdminError::UnknownCommand(_))
        ));
        assert!(matches!(
            "add-enemy 1 x 40 crab".parse::<AdminCommand>(),
            Err(AdminError::BadUsage(_))
        ));
        assert!(matches!(
            "add-enemy 1 10 40 ufo".parse::<AdminCommand>(),
            Err(AdminError::BadUsage(_))
        ));
        assert!(matches!(
            "object-list".parse::<AdminCommand>(),
            Err(AdminError::BadUsage(_))
        ));
        assert!(matches!(
            "game-list now".parse::<AdminCommand>(),
            Err(AdminError::BadUsage(_))
        ));
    }

    #[test]
    fn game_list_and_object_list() {
        let (registry, game, mut rng) = setup();
        let list = execute(&registry, AdminCommand::GameList, &mut rng).unwrap();
        assert!(list.starts_with(&format!("Game {game}: 1 clients, 97 objects")));

        let objects = execute(&registry, AdminCommand::ObjectList { game }, &mut rng).unwrap();
        assert!(objects.ends_with("Total: 97"));

        let missing = execute(
            &registry,
            AdminCommand::ObjectList {
                game: ClientId(u32::MAX),
            },
            &mut rng,
        );
        assert!(matches!(missing, Err(AdminError::NoSuchGame(_))));
    }

    #[tokio::test]
    async fn add_enemy_validates_bounds() {
        let (registry, game, mut rng) = setup();

        let rejected = execute(
            &registry,
            AdminCommand::AddEnemy {
                game,
                position: Position::new(100, 200),
                kind: EnemyKind::Octopus,
            },
            &mut rng,
        );
        assert!(matches!(
            rejected,
            Err(AdminError::Session(SessionError::Placement(_)))
        ));
        assert_eq!(enemies(&registry, game), 0);

        let created = execute(
            &registry,
            AdminCommand::AddEnemy {
                game,
                position: Position::new(100, 40),
                kind: EnemyKind::Octopus,
            },
            &mut rng,
        )
        .unwrap();
        assert!(created.starts_with("Created enemy Octopus"));
        assert_eq!(enemies(&registry, game), 1);
    }

    #[tokio::test]
    async fn add_enemy_line_spawns_nine() {
        let (registry, game, mut rng) = setup();

        let rejected = execute(
            &registry,
            AdminCommand::AddEnemyLine {
                game,
                y: 10,
                kind: EnemyKind::Squid,
            },
            &mut rng,
        );
        assert!(matches!(rejected, Err(AdminError::Placement(_))));

        execute(
            &registry,
            AdminCommand::AddEnemyLine {
                game,
                y: 60,
                kind: EnemyKind::Squid,
            },
            &mut rng,
        )
        .unwrap();
        assert_eq!(enemies(&registry, game), LINE_LENGTH as usize);

        let session = registry.get(game).unwrap();
        let rightmost = Position::new(LINE_START_X + 8 * LINE_SPACING, 60);
        assert_eq!(session.find_entities(|e| e.position == rightmost).len(), 1);
    }

    #[test]
    fn saucer_enters_from_either_side() {
        let (registry, game, mut rng) = setup();
        for _ in 0..8 {
            execute(&registry, AdminCommand::AddSaucer { game, score: 300 }, &mut rng).unwrap();
        }

        let session = registry.get(game).unwrap();
        let saucers = session.find_entities(|e| matches!(e.role, Role::Saucer { score: 300 }));
        assert_eq!(saucers.len(), 8);
        for id in saucers {
            let (position, mode) = session.with_entity(id, |e| (e.position, e.mode)).unwrap();
            match mode {
                Mode::Sweep(Sweep {
                    direction: HorizontalDirection::Left,
                    ..
                }) => assert_eq!(position, Position::new(256, 50)),
                Mode::Sweep(Sweep {
                    direction: HorizontalDirection::Right,
                    ..
                }) => assert_eq!(position, Position::new(0, 50)),
                other => panic!("unexpected mode {other:?}"),
            }
        }
    }
}
