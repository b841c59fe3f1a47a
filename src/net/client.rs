//! Outbound side of a client connection

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::protocol::{Command, CommandBatch};
use crate::util::ClientId;

/// Records a client may have queued before it is considered stalled
pub const OUTBOUND_CAPACITY: usize = 256;

/// Anything a session can deliver records to
pub trait ClientSink: Send + Sync {
    fn client_id(&self) -> ClientId;

    fn send_single(&self, command: &Command);

    /// Deliver a whole batch as one write
    fn send_batch(&self, batch: &CommandBatch);

    fn send_error(&self, message: &str) {
        self.send_single(&Command::Error {
            message: message.to_string(),
        });
    }
}

enum Outbound {
    Wire(String),
    Close,
}

/// Cheap handle feeding a connection's writer task
#[derive(Clone)]
pub struct ClientHandle {
    id: ClientId,
    tx: mpsc::Sender<Outbound>,
    stalled: Arc<Notify>,
}

impl ClientHandle {
    /// Spawn the writer task draining into `writer`
    ///
    /// Deltas cannot be skipped, so a client whose queue fills up is cut off
    /// instead of lagging behind.
    pub fn spawn<W>(id: ClientId, mut writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let stalled = Arc::new(Notify::new());
        let cut_off = Arc::clone(&stalled);

        let task = tokio::spawn(async move {
            let drain = async {
                while let Some(outbound) = rx.recv().await {
                    match outbound {
                        Outbound::Wire(wire) => {
                            let result = async {
                                writer.write_all(wire.as_bytes()).await?;
                                writer.flush().await
                            }
                            .await;
                            if let Err(e) = result {
                                debug!(client_id = %id, error = %e, "Client write failed");
                                break;
                            }
                        }
                        Outbound::Close => break,
                    }
                }
            };

            tokio::select! {
                _ = drain => {}
                _ = cut_off.notified() => {
                    warn!(client_id = %id, "Client stopped reading, closing connection");
                }
            }
            let _ = writer.shutdown().await;
        });

        (Self { id, tx, stalled }, task)
    }

    /// Flush what is queued, then close the write half
    pub fn close(&self) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(Outbound::Close) {
            self.stalled.notify_one();
        }
    }

    /// Resolves once the writer task has stopped
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    fn enqueue(&self, wire: String) {
        match self.tx.try_send(Outbound::Wire(wire)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(client_id = %self.id, capacity = OUTBOUND_CAPACITY, "Outbound queue full");
                self.stalled.notify_one();
            }
            Err(TrySendError::Closed(_)) => {
                debug!(client_id = %self.id, "Writer already gone, dropping output");
            }
        }
    }
}

impl ClientSink for ClientHandle {
    fn client_id(&self) -> ClientId {
        self.id
    }

    fn send_single(&self, command: &Command) {
        match command.to_line() {
            Ok(mut line) => {
                line.push('\n');
                self.enqueue(line);
            }
            Err(e) => warn!(client_id = %self.id, error = %e, "Dropping unencodable record"),
        }
    }

    fn send_batch(&self, batch: &CommandBatch) {
        match batch.to_wire() {
            Ok(wire) => self.enqueue(wire.to_string()),
            Err(e) => warn!(client_id = %self.id, error = %e, "Dropping unencodable batch"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::EntityId;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::time::timeout;

    #[tokio::test]
    async fn handle_writes_lines_then_closes() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let (handle, task) = ClientHandle::spawn(ClientId(77), local);

        let mut batch = CommandBatch::new();
        batch.push(Command::Stats { lives: 3, score: 0 });
        batch.push(Command::Delete { id: EntityId(5) });

        handle.send_error("invalid game ID");
        handle.send_batch(&batch);
        handle.close();
        task.await.unwrap();

        let mut out = String::new();
        remote.read_to_string(&mut out).await.unwrap();
        assert_eq!(
            out,
            "{\"error\":\"invalid game ID\"}\n\
             {\"op\":\"stats\",\"lives\":3,\"score\":0}\n\
             {\"op\":\"delete\",\"id\":5}\n"
        );
    }

    #[tokio::test]
    async fn stalled_reader_is_cut_off() {
        let (local, _remote) = tokio::io::duplex(64);
        let (handle, task) = ClientHandle::spawn(ClientId(78), local);

        for _ in 0..OUTBOUND_CAPACITY + 8 {
            handle.send_single(&Command::Stats { lives: 3, score: 0 });
        }

        timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        timeout(Duration::from_secs(5), handle.closed()).await.unwrap();

        // Later output is dropped without blocking the session
        handle.send_error("too late");
        handle.close();
    }
}
