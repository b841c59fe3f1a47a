//! Per-connection handshake and op dispatch

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader, Lines};
use tracing::{debug, info, warn};

use super::client::{ClientHandle, ClientSink};
use super::protocol::{ClientOp, Command, Handshake, Key};
use crate::game::geometry::Position;
use crate::game::{GameSession, SessionRegistry};
use crate::util::ClientId;

/// Error text for a spectator naming an unknown session
pub const INVALID_GAME: &str = "invalid game ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Player,
    Spectator,
}

/// Drive one client connection from greeting to close
pub async fn handle_connection<S>(stream: S, registry: Arc<SessionRegistry>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let client_id = ClientId::next();
    let (reader, writer) = tokio::io::split(stream);
    let (handle, writer_task) = ClientHandle::spawn(client_id, writer);
    let mut lines = BufReader::new(reader).lines();

    handle.send_single(&Command::Start {
        whoami: client_id,
        games: registry.session_ids(),
    });

    if let Some((session, membership)) = join(&handle, &mut lines, &registry).await {
        info!(
            client_id = %client_id,
            session_id = %session.id(),
            membership = ?membership,
            "Client joined"
        );

        let attached = Attached {
            registry: &registry,
            session: &session,
            client_id,
        };
        run_session(&handle, &mut lines, &session, membership).await;
        drop(attached);
    }

    handle.close();
    if let Err(e) = writer_task.await {
        debug!(client_id = %client_id, error = %e, "Writer task ended abnormally");
    }
    info!(client_id = %client_id, "Connection closed");
}

/// Detaches its client when dropped, including while unwinding
struct Attached<'a> {
    registry: &'a SessionRegistry,
    session: &'a GameSession,
    client_id: ClientId,
}

impl Drop for Attached<'_> {
    fn drop(&mut self) {
        self.registry.detach(self.session, self.client_id);
    }
}

/// Read the handshake and host or join the requested session
async fn join<R>(
    handle: &ClientHandle,
    lines: &mut Lines<R>,
    registry: &SessionRegistry,
) -> Option<(Arc<GameSession>, Membership)>
where
    R: AsyncBufRead + Unpin,
{
    let client_id = handle.client_id();
    let line = match lines.next_line().await {
        Ok(Some(line)) => line,
        Ok(None) => return None,
        Err(e) => {
            debug!(client_id = %client_id, error = %e, "Read failed during handshake");
            return None;
        }
    };

    let handshake = match Handshake::from_line(&line) {
        Ok(handshake) => handshake,
        Err(e) => {
            warn!(client_id = %client_id, error = %e, "Bad handshake");
            handle.send_error(&e.to_string());
            return None;
        }
    };

    let sink: Arc<dyn ClientSink> = Arc::new(handle.clone());

    if handshake.init == client_id {
        match registry.create_session(sink) {
            Ok(session) => Some((session, Membership::Player)),
            Err(e) => {
                handle.send_error(&e.to_string());
                None
            }
        }
    } else {
        let Some(session) = registry.get(handshake.init) else {
            handle.send_error(INVALID_GAME);
            return None;
        };
        // Rejections are reported to the client by the session
        session.attach_client(sink).ok()?;
        Some((session, Membership::Spectator))
    }
}

async fn run_session<R>(
    handle: &ClientHandle,
    lines: &mut Lines<R>,
    session: &GameSession,
    membership: Membership,
) where
    R: AsyncBufRead + Unpin,
{
    let client_id = handle.client_id();
    let mut last_pressed: Option<Key> = None;

    loop {
        let read = tokio::select! {
            read = lines.next_line() => read,
            _ = handle.closed() => {
                debug!(client_id = %client_id, "Writer stopped, leaving session");
                break;
            }
        };
        let line = match read {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "Read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let op = match ClientOp::from_line(&line) {
            Ok(op) => op,
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "Protocol error");
                handle.send_error(&e.to_string());
                break;
            }
        };

        match (membership, op) {
            (_, ClientOp::Bye) => break,
            (Membership::Spectator, _) => {}
            (Membership::Player, ClientOp::Press { key }) => {
                last_pressed = Some(key);
                session.on_press(key);
            }
            (Membership::Player, ClientOp::Release { key }) => {
                if last_pressed == Some(key) {
                    last_pressed = None;
                    session.on_release();
                }
            }
            (Membership::Player, ClientOp::Move { id, x, y }) => {
                session.on_move(id, Position::new(x, y));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::level::Level1;
    use crate::game::sprite::Sprite;
    use crate::game::SessionRules;
    use crate::net::client::testing::RecordingClient;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream};
    use tokio::time::timeout;

    struct Peer {
        lines: Lines<BufReader<tokio::io::ReadHalf<DuplexStream>>>,
        writer: tokio::io::WriteHalf<DuplexStream>,
    }

    impl Peer {
        fn connect(registry: &Arc<SessionRegistry>) -> Self {
            let (server, client) = tokio::io::duplex(64 * 1024);
            tokio::spawn(handle_connection(server, Arc::clone(registry)));
            let (reader, writer) = tokio::io::split(client);
            Self {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn next(&mut self) -> Option<Command> {
            let line = timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .unwrap()
                .unwrap()?;
            Some(Command::from_line(&line).unwrap())
        }

        async fn whoami(&mut self) -> ClientId {
            match self.next().await {
                Some(Command::Start { whoami, .. }) => whoami,
                other => panic!("expected start, got {other:?}"),
            }
        }

        /// Everything until the server closes the stream
        async fn drain(&mut self) -> Vec<Command> {
            let mut out = Vec::new();
            while let Some(command) = self.next().await {
                out.push(command);
            }
            out
        }
    }

    fn registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(
            1,
            Arc::new(Level1),
            SessionRules::default(),
            Some(3),
        ))
    }

    #[tokio::test]
    async fn unknown_game_is_rejected() {
        let registry = registry();
        let mut peer = Peer::connect(&registry);
        peer.whoami().await;
        peer.send(r#"{"init": 999999}"#).await;

        assert_eq!(
            peer.drain().await,
            vec![Command::Error {
                message: INVALID_GAME.to_string()
            }]
        );
    }

    #[tokio::test]
    async fn session_cap_is_reported() {
        let registry = registry();
        let mut host = Peer::connect(&registry);
        let host_id = host.whoami().await;
        host.send(&format!(r#"{{"init": {}}}"#, host_id.0)).await;
        assert!(matches!(host.next().await, Some(Command::Arena { .. })));

        let mut late = Peer::connect(&registry);
        let late_id = late.whoami().await;
        late.send(&format!(r#"{{"init": {}}}"#, late_id.0)).await;
        assert_eq!(
            late.drain().await,
            vec![Command::Error {
                message: "the maximum number of active games has been reached".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn spectator_is_offered_the_game_and_ignored() {
        let registry = registry();
        let mut host = Peer::connect(&registry);
        let host_id = host.whoami().await;
        host.send(&format!(r#"{{"init": {}}}"#, host_id.0)).await;
        assert!(matches!(host.next().await, Some(Command::Arena { .. })));

        let mut spectator = Peer::connect(&registry);
        match spectator.next().await {
            Some(Command::Start { games, .. }) => assert_eq!(games, vec![host_id]),
            other => panic!("expected start, got {other:?}"),
        }
        spectator
            .send(&format!(r#"{{"init": {}}}"#, host_id.0))
            .await;
        assert!(matches!(spectator.next().await, Some(Command::Arena { .. })));

        let session = registry.get(host_id).unwrap();
        let player = session.player_entity().unwrap();
        spectator.send(r#"{"op":"press","key":"left"}"#).await;
        spectator.send(r#"{"op":"bye"}"#).await;
        spectator.drain().await;

        assert_eq!(session.client_count(), 1);
        assert!(matches!(
            session.with_entity(player, |e| e.mode),
            Some(crate::game::mode::Mode::Standing { .. })
        ));
    }

    #[tokio::test]
    async fn release_must_match_last_press() {
        let registry = registry();
        let mut host = Peer::connect(&registry);
        let host_id = host.whoami().await;
        host.send(&format!(r#"{{"init": {}}}"#, host_id.0)).await;

        let spacecraft = vec![Sprite::Spacecraft.id()];
        let player = loop {
            match host.next().await {
                Some(Command::Put { id, seq, .. }) if seq == spacecraft => break id,
                Some(_) => continue,
                None => panic!("closed before the player spawned"),
            }
        };

        host.send(r#"{"op":"press","key":"left"}"#).await;
        assert!(matches!(
            host.next().await,
            Some(Command::Put { id, speed, .. }) if id == player && speed.x.numerator == -6
        ));

        // Mismatched release is dropped, so shooting still re-announces a moving player
        host.send(r#"{"op":"release","key":"right"}"#).await;
        host.send(r#"{"op":"press","key":"shoot"}"#).await;
        assert!(matches!(
            host.next().await,
            Some(Command::Put { seq, .. }) if seq == vec![Sprite::Shot1.id()]
        ));
        assert!(matches!(
            host.next().await,
            Some(Command::Put { id, speed, .. }) if id == player && speed.x.numerator == -6
        ));

        host.send(r#"{"op":"bye"}"#).await;
        host.drain().await;
        assert!(registry.get(host_id).is_none());
    }

    #[tokio::test]
    async fn far_off_move_is_walled_and_session_ends_cleanly() {
        let registry = registry();
        let mut host = Peer::connect(&registry);
        let host_id = host.whoami().await;
        host.send(&format!(r#"{{"init": {}}}"#, host_id.0)).await;

        let spacecraft = vec![Sprite::Spacecraft.id()];
        let (player, start) = loop {
            match host.next().await {
                Some(Command::Put { id, x, y, seq, .. }) if seq == spacecraft => break (id, (x, y)),
                Some(_) => continue,
                None => panic!("closed before the player spawned"),
            }
        };

        host.send(&format!(
            r#"{{"op":"move","id":{},"x":2147483647,"y":{}}}"#,
            player.0, start.1
        ))
        .await;
        host.send(r#"{"op":"press","key":"left"}"#).await;
        assert!(matches!(
            host.next().await,
            Some(Command::Put { id, x, y, .. }) if id == player && (x, y) == start
        ));

        host.send(r#"{"op":"bye"}"#).await;
        host.drain().await;
        assert!(registry.is_empty());
    }

    #[test]
    fn unwinding_connection_still_detaches() {
        let registry = registry();
        let player = RecordingClient::new();
        let session = registry.create_session(player.clone()).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _attached = Attached {
                registry: &registry,
                session: &session,
                client_id: player.client_id(),
            };
            panic!("connection task failed");
        }));

        assert!(outcome.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn malformed_op_closes_with_error() {
        let registry = registry();
        let mut host = Peer::connect(&registry);
        let host_id = host.whoami().await;
        host.send(&format!(r#"{{"init": {}}}"#, host_id.0)).await;
        host.send(r#"{"op":"dance"}"#).await;

        let tail = host.drain().await;
        assert_eq!(
            tail.last(),
            Some(&Command::Error {
                message: r#"invalid operation: {"op":"dance"}"#.to_string()
            })
        );
        assert!(registry.is_empty());
    }
}
