//! Game session: authoritative state for one match
//!
//! Every operation takes the session lock, runs to completion, and ends with a
//! commit that hands the queued deltas to every attached client as one batch.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::entity::{Dynamics, Entity, Role};
use super::geometry::Position;
use super::level::{Level, World};
use super::mode::{Control, Mode, Projectile, Reaction};
use super::placement::{self, Arena, PlacementError};
use super::sprite::Sprite;
use crate::net::client::ClientSink;
use crate::net::protocol::{Command, CommandBatch, Key};
use crate::util::{ClientId, EntityId};

/// Attach capacity before the player has joined
const CAPACITY_WITHOUT_PLAYER: usize = 2;
/// Attach capacity once the player is attached: the player plus two spectators
const CAPACITY_WITH_PLAYER: usize = 3;

const SHOT_PACE_FEW: Duration = Duration::from_millis(2500);
const SHOT_PACE_SOME: Duration = Duration::from_millis(2000);
const SHOT_PACE_MANY: Duration = Duration::from_millis(1500);
const SHOT_PACE_IDLE: Duration = Duration::from_millis(1000);

/// Tunables shared by every session in the process
#[derive(Debug, Clone)]
pub struct SessionRules {
    pub starting_lives: u32,
    pub shot_reload: Duration,
    pub vertical_bounds: bool,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            starting_lives: 3,
            shot_reload: Duration::from_millis(1000),
            vertical_bounds: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub lives: u32,
    pub score: u32,
    pub difficulty: i32,
}

impl Stats {
    fn command(&self) -> Command {
        Command::Stats {
            lives: self.lives,
            score: self.score,
        }
    }
}

/// Outcome of removing a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// No clients remain; the session is terminated
    Emptied,
    /// The player left while spectators remain; the scene is frozen
    PlayerLeft,
    SpectatorLeft,
}

enum Interaction {
    /// Both entities are destroyed
    Destroy,
    /// Both destroyed and the points awarded
    Score(u32),
    /// The given enemy shot is destroyed and the player loses a life
    Wound(EntityId),
    Ignore,
}

fn classify(mover: &Entity, target: &Entity) -> Interaction {
    if mover.dynamics() == Dynamics::Rigid || target.dynamics() == Dynamics::Rigid {
        return Interaction::Destroy;
    }

    match (mover.role, target.role) {
        (Role::PlayerShot, Role::EnemyShot) | (Role::EnemyShot, Role::PlayerShot) => {
            Interaction::Destroy
        }
        (Role::PlayerShot, other) | (other, Role::PlayerShot) => {
            other.score().map_or(Interaction::Ignore, Interaction::Score)
        }
        (Role::EnemyShot, Role::Player { lost: false }) => Interaction::Wound(mover.id),
        (Role::Player { lost: false }, Role::EnemyShot) => Interaction::Wound(target.id),
        _ => Interaction::Ignore,
    }
}

struct SessionState {
    id: ClientId,
    level: Arc<dyn Level>,
    rules: SessionRules,
    arena: Arena,
    entities: BTreeMap<EntityId, Entity>,
    player: Option<EntityId>,
    player_client: Option<ClientId>,
    clients: BTreeMap<ClientId, Arc<dyn ClientSink>>,
    stats: Stats,
    pending: CommandBatch,
    shooting_started: bool,
    frozen: bool,
    terminated: bool,
    reload_ready_at: Option<Instant>,
    rng: ChaCha8Rng,
}

impl SessionState {
    /// Deliver the pending batch to every client. Nothing happens when it is empty.
    fn commit(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        for client in self.clients.values() {
            client.send_batch(&self.pending);
        }
        self.pending.clear();
    }

    fn capacity(&self) -> usize {
        if self.player_client.is_some() {
            CAPACITY_WITH_PLAYER
        } else {
            CAPACITY_WITHOUT_PLAYER
        }
    }

    fn attach(&mut self, client: Arc<dyn ClientSink>) -> Result<(), SessionError> {
        if self.terminated {
            client.send_error(&SessionError::Terminated.to_string());
            return Err(SessionError::Terminated);
        }

        let limit = self.capacity();
        if self.clients.len() >= limit {
            let err = SessionError::Capacity { limit };
            client.send_error(&err.to_string());
            return Err(err);
        }

        self.commit();

        let mut catch_up = CommandBatch::new();
        catch_up.push(Command::Arena {
            width: self.arena.size.width,
            height: self.arena.size.height,
        });
        catch_up.extend(self.entities.values().map(Entity::put_command));
        client.send_batch(&catch_up);

        let client_id = client.client_id();
        self.clients.insert(client_id, client);
        info!(
            session_id = %self.id,
            client_id = %client_id,
            clients = self.clients.len(),
            "Client attached"
        );
        Ok(())
    }

    fn enqueue_stats(&mut self) {
        let stats = self.stats.command();
        self.pending.push(stats);
    }

    fn delete(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.remove(&id) {
            self.pending.push(entity.delete_command());
            if self.player == Some(id) {
                self.player = None;
            }
            debug!(session_id = %self.id, entity = %entity, "Deleted");
        }
    }

    fn apply(&mut self, id: EntityId, reaction: Reaction) {
        match reaction {
            Reaction::Keep | Reaction::Proceed => {}
            Reaction::Advance(mode) => {
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.mode = mode;
                }
            }
            Reaction::Switch(mode) => {
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.mode = mode;
                    self.pending.push(entity.put_command());
                }
            }
            Reaction::Descend { to, mode } => {
                if let Some(entity) = self.entities.get_mut(&id) {
                    entity.position = to;
                    entity.mode = mode;
                    self.pending.push(entity.put_command());
                }
            }
            Reaction::Delete => self.delete(id),
        }
    }

    fn relocate(&mut self, id: EntityId, to: Position) {
        let reaction = match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.position = to;
                entity.mode.on_relocate(to)
            }
            None => return,
        };
        self.apply(id, reaction);
    }

    fn move_entity(&mut self, id: EntityId, candidate: Position) {
        let Some(entity) = self.entities.get(&id) else {
            debug!(session_id = %self.id, entity_id = %id, "Move for a deleted entity ignored");
            return;
        };

        let outcome = placement::evaluate(entity, candidate, &self.arena, self.entities.values());
        match outcome.hit {
            Some(orientation) => match entity.mode.on_hit(entity.position, orientation) {
                Reaction::Proceed => self.relocate(id, candidate),
                reaction => self.apply(id, reaction),
            },
            None => self.relocate(id, candidate),
        }

        if let Some(target) = outcome.target {
            self.interact(id, target);
        }
        self.commit();
    }

    fn interact(&mut self, mover: EntityId, target: EntityId) {
        let interaction = match (self.entities.get(&mover), self.entities.get(&target)) {
            (Some(mover), Some(target)) => classify(mover, target),
            _ => return,
        };

        match interaction {
            Interaction::Destroy => {
                self.delete(mover);
                self.delete(target);
            }
            Interaction::Score(points) => {
                self.delete(mover);
                self.delete(target);
                self.stats.score = self.stats.score.saturating_add(points);
                self.enqueue_stats();
                debug!(session_id = %self.id, points, score = self.stats.score, "Scored");
            }
            Interaction::Wound(shot) => {
                self.delete(shot);
                self.wound_player();
            }
            Interaction::Ignore => {}
        }
    }

    fn wound_player(&mut self) {
        self.stats.lives = self.stats.lives.saturating_sub(1);
        self.enqueue_stats();
        info!(session_id = %self.id, lives = self.stats.lives, "Player hit");

        if self.stats.lives == 0 {
            self.reset();
        }
    }

    /// Wipe the scene and rebuild it from the level
    fn reset(&mut self) {
        let doomed: Vec<_> = self.entities.values().map(Entity::delete_command).collect();
        self.pending.extend(doomed);
        self.entities.clear();
        self.player = None;
        self.reload_ready_at = None;
        self.stats = Stats {
            lives: self.rules.starting_lives,
            score: 0,
            difficulty: 0,
        };
        self.enqueue_stats();
        self.commit();

        let level = Arc::clone(&self.level);
        let player = level.setup(self, 0);
        self.player = Some(player);
        self.commit();

        info!(session_id = %self.id, level = level.name(), "Session reset");
    }

    /// Player entity, unless it has lost or is gone
    fn active_player(&self) -> Option<&Entity> {
        let entity = self.entities.get(&self.player?)?;
        match entity.role {
            Role::Player { lost: false } => Some(entity),
            _ => None,
        }
    }

    fn control(&mut self, control: impl FnOnce(&Entity) -> Control) {
        let Some(player) = self.active_player() else {
            return;
        };
        let id = player.id;
        let control = control(player);

        match control {
            Control::Ignored => return,
            Control::Switch(mode) => self.apply(id, Reaction::Switch(mode)),
            Control::Shoot { origin, then } => {
                self.fire_player_shot(origin);
                if let Some(mode) = then {
                    self.apply(id, Reaction::Switch(mode));
                }
            }
        }
        self.commit();
    }

    fn fire_player_shot(&mut self, origin: Position) {
        let now = Instant::now();
        if self.reload_ready_at.is_some_and(|ready| now < ready) {
            debug!(session_id = %self.id, "Shot ignored while reloading");
            return;
        }
        self.reload_ready_at = Some(now + self.rules.shot_reload);

        let shot = Mode::Projectile(Projectile::upward(self.stats.difficulty));
        self.spawn(Entity::new(Role::PlayerShot, origin, shot));
    }

    /// Pick a random shooter and fire; returns the pause before the next shot
    fn fire_enemy_shot(&mut self) -> Duration {
        let shooters: Vec<Position> = self
            .entities
            .values()
            .filter(|entity| entity.role.is_shooter())
            .map(|entity| entity.position)
            .collect();

        if shooters.is_empty() {
            return SHOT_PACE_IDLE;
        }

        let origin = shooters[self.rng.gen_range(0..shooters.len())].offset(2, 2);
        let sprite = if self.rng.gen_ratio(1, 3) {
            Sprite::Shot2
        } else {
            Sprite::Shot3
        };
        let shot = Mode::Projectile(Projectile::downward(self.stats.difficulty, sprite));
        self.spawn(Entity::new(Role::EnemyShot, origin, shot));

        match shooters.len() {
            0..=9 => SHOT_PACE_FEW,
            10..=18 => SHOT_PACE_SOME,
            _ => SHOT_PACE_MANY,
        }
    }

    /// Stop everything in place: no motion, no input, no shooting
    fn freeze(&mut self) {
        self.frozen = true;
        for entity in self.entities.values_mut() {
            entity.mode = entity.mode.frozen();
            if let Role::Player { .. } = entity.role {
                entity.role = Role::Player { lost: true };
            }
            self.pending.push(entity.put_command());
        }
        self.commit();
        info!(session_id = %self.id, "Session frozen");
    }
}

impl World for SessionState {
    fn spawn(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.pending.push(entity.put_command());
        if self.player.is_some() {
            info!(session_id = %self.id, entity = %entity, "Spawned");
        }
        self.entities.insert(id, entity);
        self.commit();
        id
    }

    fn set_score(&mut self, score: u32) {
        self.stats.score = score;
        self.enqueue_stats();
    }
}

/// One running match, hosted by a player and optionally watched by spectators
pub struct GameSession {
    id: ClientId,
    state: Mutex<SessionState>,
    cancel: watch::Sender<bool>,
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl GameSession {
    /// Create a session hosted by `player`, send it the initial scene, and set up the level
    pub fn new(
        player: Arc<dyn ClientSink>,
        level: Arc<dyn Level>,
        rules: SessionRules,
        rng: ChaCha8Rng,
    ) -> Result<Arc<Self>, SessionError> {
        let id = player.client_id();
        let arena = Arena::new(level.game_area_size(), rules.vertical_bounds);
        let (cancel, _) = watch::channel(false);

        let mut state = SessionState {
            id,
            stats: Stats {
                lives: rules.starting_lives,
                score: 0,
                difficulty: 0,
            },
            level,
            rules,
            arena,
            entities: BTreeMap::new(),
            player: None,
            player_client: None,
            clients: BTreeMap::new(),
            pending: CommandBatch::new(),
            shooting_started: false,
            frozen: false,
            terminated: false,
            reload_ready_at: None,
            rng,
        };

        state.attach(player)?;
        state.player_client = Some(id);
        state.reset();

        info!(session_id = %id, "Session created");

        Ok(Arc::new(Self {
            id,
            state: Mutex::new(state),
            cancel,
        }))
    }

    /// Session id, equal to the hosting player's client id
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Attach a spectator. Rejected clients receive an error record.
    pub fn attach_client(&self, client: Arc<dyn ClientSink>) -> Result<(), SessionError> {
        self.state.lock().attach(client)
    }

    /// Remove a client; `None` when it was not attached
    pub fn detach_client(&self, client_id: ClientId) -> Option<Detached> {
        let mut state = self.state.lock();
        state.clients.remove(&client_id)?;

        info!(
            session_id = %self.id,
            client_id = %client_id,
            clients = state.clients.len(),
            "Client detached"
        );

        if state.clients.is_empty() {
            state.terminated = true;
            self.cancel.send_replace(true);
            return Some(Detached::Emptied);
        }

        if state.player_client == Some(client_id) {
            state.player_client = None;
            state.freeze();
            self.cancel.send_replace(true);
            return Some(Detached::PlayerLeft);
        }

        Some(Detached::SpectatorLeft)
    }

    pub fn on_press(&self, key: Key) {
        let mut state = self.state.lock();
        if state.terminated {
            return;
        }
        state.control(|player| match key {
            Key::Left => player.mode.on_move_left(),
            Key::Right => player.mode.on_move_right(),
            Key::Shoot => player.mode.on_shoot(player.position),
        });
    }

    pub fn on_release(&self) {
        let mut state = self.state.lock();
        if state.terminated {
            return;
        }
        state.control(|player| player.mode.on_release());
    }

    /// Validate a client-proposed position for entity `id`
    pub fn on_move(&self, id: EntityId, candidate: Position) {
        let mut state = self.state.lock();
        if state.terminated || state.frozen {
            return;
        }
        state.move_entity(id, candidate);
    }

    pub fn spawn(&self, entity: Entity) -> Result<EntityId, SessionError> {
        let mut state = self.state.lock();
        if state.terminated {
            return Err(SessionError::Terminated);
        }
        Ok(state.spawn(entity))
    }

    /// Spawn an operator-supplied entity after checking the injection bounds
    pub fn inject(&self, entity: Entity) -> Result<EntityId, SessionError> {
        placement::validate_injection(entity.position)?;
        self.spawn(entity)
    }

    /// Start the background enemy-shooting loop. Later calls do nothing.
    pub fn enemies_start_shooting(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.shooting_started || state.terminated || state.frozen {
                return;
            }
            state.shooting_started = true;
        }

        let session: Weak<Self> = Arc::downgrade(self);
        let mut cancel = self.cancel.subscribe();
        let id = self.id;

        tokio::spawn(async move {
            info!(session_id = %id, "Enemies started shooting");
            loop {
                if *cancel.borrow() {
                    break;
                }
                let Some(strong) = session.upgrade() else {
                    break;
                };
                let pause = strong.state.lock().fire_enemy_shot();
                drop(strong);

                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    changed = cancel.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(session_id = %id, "Enemy shooting stopped");
        });
    }

    /// Terminate without waiting for clients to leave
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if !state.terminated {
            state.terminated = true;
            warn!(session_id = %self.id, clients = state.clients.len(), "Session shut down");
        }
        self.cancel.send_replace(true);
    }

    pub fn stats(&self) -> Stats {
        self.state.lock().stats
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().clients.len()
    }

    pub fn entity_count(&self) -> usize {
        self.state.lock().entities.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    pub fn player_entity(&self) -> Option<EntityId> {
        self.state.lock().player
    }

    /// One line per entity, ordered by id
    pub fn entity_summaries(&self) -> Vec<String> {
        self.state
            .lock()
            .entities
            .values()
            .map(ToString::to_string)
            .collect()
    }

    /// Run `f` against a live entity
    pub fn with_entity<R>(&self, id: EntityId, f: impl FnOnce(&Entity) -> R) -> Option<R> {
        self.state.lock().entities.get(&id).map(f)
    }

    /// Ids of live entities matching `filter`, ordered by id
    pub fn find_entities(&self, filter: impl Fn(&Entity) -> bool) -> Vec<EntityId> {
        self.state
            .lock()
            .entities
            .values()
            .filter(|entity| filter(entity))
            .map(|entity| entity.id)
            .collect()
    }
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no more spectators are allowed for this game")]
    Capacity { limit: usize },

    #[error("this game has already ended")]
    Terminated,

    #[error(transparent)]
    Placement(#[from] PlacementError),
}
