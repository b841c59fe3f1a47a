//! Directory of active sessions keyed by hosting player

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use super::level::Level;
use super::session::{Detached, GameSession, SessionError, SessionRules};
use crate::net::client::ClientSink;
use crate::util::ClientId;

/// Registry of all active sessions
pub struct SessionRegistry {
    sessions: DashMap<ClientId, Arc<GameSession>>,
    max_sessions: usize,
    level: Arc<dyn Level>,
    rules: SessionRules,
    /// Serializes admission and seeds each session's rng
    admission: Mutex<ChaCha8Rng>,
}

impl SessionRegistry {
    pub fn new(
        max_sessions: usize,
        level: Arc<dyn Level>,
        rules: SessionRules,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            sessions: DashMap::new(),
            max_sessions,
            level,
            rules,
            admission: Mutex::new(rng),
        }
    }

    /// Create a session hosted by `player`, unless the cap is reached
    pub fn create_session(
        &self,
        player: Arc<dyn ClientSink>,
    ) -> Result<Arc<GameSession>, RegistryError> {
        let mut rng = self.admission.lock();
        let id = player.client_id();

        if self.sessions.len() >= self.max_sessions {
            warn!(client_id = %id, limit = self.max_sessions, "Session limit reached");
            return Err(RegistryError::SessionLimit {
                limit: self.max_sessions,
            });
        }
        if self.sessions.contains_key(&id) {
            return Err(RegistryError::AlreadyHosting(id));
        }

        let session = GameSession::new(
            player,
            Arc::clone(&self.level),
            self.rules.clone(),
            ChaCha8Rng::seed_from_u64(rng.gen()),
        )?;
        self.sessions.insert(id, Arc::clone(&session));

        info!(session_id = %id, active = self.sessions.len(), "Session registered");
        Ok(session)
    }

    pub fn get(&self, id: ClientId) -> Option<Arc<GameSession>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Detach a client, deregistering the session once it is empty
    pub fn detach(&self, session: &GameSession, client_id: ClientId) -> Option<Detached> {
        let outcome = session.detach_client(client_id);
        if outcome == Some(Detached::Emptied) {
            self.remove(session.id());
        }
        outcome
    }

    pub fn remove(&self, id: ClientId) -> Option<Arc<GameSession>> {
        let (_, session) = self.sessions.remove(&id)?;
        session.shutdown();
        info!(session_id = %id, active = self.sessions.len(), "Session deregistered");
        Some(session)
    }

    /// Ids of every joinable session, ascending
    pub fn session_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<_> = self.sessions.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Terminate every session
    pub fn shutdown_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().shutdown();
        }
        self.sessions.clear();
    }
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("the maximum number of active games has been reached")]
    SessionLimit { limit: usize },

    #[error("client {0} already hosts a game")]
    AlreadyHosting(ClientId),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::Level1;
    use crate::net::client::testing::RecordingClient;
    use tokio_test::{assert_err, assert_ok};

    fn registry() -> SessionRegistry {
        SessionRegistry::new(2, Arc::new(Level1), SessionRules::default(), Some(1))
    }

    #[test]
    fn cap_rejects_without_mutation() {
        let registry = registry();
        assert_ok!(registry.create_session(RecordingClient::new()));
        assert_ok!(registry.create_session(RecordingClient::new()));
        let before = registry.session_ids();

        let err = assert_err!(registry.create_session(RecordingClient::new()));
        assert!(matches!(err, RegistryError::SessionLimit { limit: 2 }));
        assert_eq!(
            err.to_string(),
            "the maximum number of active games has been reached"
        );
        assert_eq!(registry.session_ids(), before);
    }

    #[test]
    fn session_ids_are_sorted_player_ids() {
        let registry = registry();
        let first = RecordingClient::new();
        let second = RecordingClient::new();
        registry.create_session(second.clone()).unwrap();
        registry.create_session(first.clone()).unwrap();

        let mut expected = vec![first.client_id(), second.client_id()];
        expected.sort();
        assert_eq!(registry.session_ids(), expected);
    }

    #[test]
    fn last_detach_deregisters() {
        let registry = registry();
        let player = RecordingClient::new();
        let session = registry.create_session(player.clone()).unwrap();
        let spectator = RecordingClient::new();
        session.attach_client(spectator.clone()).unwrap();

        assert_eq!(
            registry.detach(&session, player.client_id()),
            Some(Detached::PlayerLeft)
        );
        assert!(registry.get(player.client_id()).is_some());

        assert_eq!(
            registry.detach(&session, spectator.client_id()),
            Some(Detached::Emptied)
        );
        assert!(registry.get(player.client_id()).is_none());
        assert!(registry.is_empty());
        assert!(session.is_terminated());
    }

    #[test]
    fn freed_slot_admits_a_new_session() {
        let registry = registry();
        let a = RecordingClient::new();
        let session = registry.create_session(a.clone()).unwrap();
        registry.create_session(RecordingClient::new()).unwrap();

        registry.detach(&session, a.client_id());
        assert_eq!(registry.len(), 1);
        assert!(registry.create_session(RecordingClient::new()).is_ok());
    }
}
