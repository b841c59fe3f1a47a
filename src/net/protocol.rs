//! Wire records exchanged with game clients
//!
//! Every message is one JSON object terminated by `\n`. Server deltas carry an
//! `op` tag; the handshake, arena and error records are bare objects.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::game::speed::{Speed, SpeedRatio};
use crate::util::{ClientId, EntityId};

/// Server-to-client record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireCommand", from = "WireCommand")]
pub enum Command {
    /// Handshake greeting: the recipient's id and the sessions it may join
    Start {
        whoami: ClientId,
        games: Vec<ClientId>,
    },
    /// Arena dimensions, first record of every catch-up
    Arena { width: i32, height: i32 },
    Stats { lives: u32, score: u32 },
    /// Create or replace an entity on the client
    Put {
        id: EntityId,
        x: i32,
        y: i32,
        z: i32,
        speed: Speed,
        seq: Vec<u32>,
    },
    Delete { id: EntityId },
    Error { message: String },
}

impl Command {
    /// Single-line JSON form, without the trailing newline
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line).map_err(|_| ProtocolError::InvalidOperation(line.to_string()))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireCommand {
    Delta(Delta),
    Start {
        whoami: ClientId,
        games: Vec<ClientId>,
    },
    Arena {
        width: i32,
        height: i32,
    },
    Error {
        error: String,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Delta {
    Stats {
        lives: u32,
        score: u32,
    },
    Put {
        id: EntityId,
        x: i32,
        y: i32,
        z: i32,
        num_x: i32,
        num_y: i32,
        denom_x: i32,
        denom_y: i32,
        seq: Vec<u32>,
    },
    Delete {
        id: EntityId,
    },
}

impl From<Command> for WireCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::Start { whoami, games } => WireCommand::Start { whoami, games },
            Command::Arena { width, height } => WireCommand::Arena { width, height },
            Command::Stats { lives, score } => WireCommand::Delta(Delta::Stats { lives, score }),
            Command::Put {
                id,
                x,
                y,
                z,
                speed,
                seq,
            } => WireCommand::Delta(Delta::Put {
                id,
                x,
                y,
                z,
                num_x: speed.x.numerator,
                num_y: speed.y.numerator,
                denom_x: speed.x.denominator,
                denom_y: speed.y.denominator,
                seq,
            }),
            Command::Delete { id } => WireCommand::Delta(Delta::Delete { id }),
            Command::Error { message } => WireCommand::Error { error: message },
        }
    }
}

impl From<WireCommand> for Command {
    fn from(wire: WireCommand) -> Self {
        match wire {
            WireCommand::Start { whoami, games } => Command::Start { whoami, games },
            WireCommand::Arena { width, height } => Command::Arena { width, height },
            WireCommand::Error { error } => Command::Error { message: error },
            WireCommand::Delta(Delta::Stats { lives, score }) => Command::Stats { lives, score },
            WireCommand::Delta(Delta::Put {
                id,
                x,
                y,
                z,
                num_x,
                num_y,
                denom_x,
                denom_y,
                seq,
            }) => Command::Put {
                id,
                x,
                y,
                z,
                speed: Speed {
                    x: SpeedRatio::new(num_x, denom_x),
                    y: SpeedRatio::new(num_y, denom_y),
                },
                seq,
            },
            WireCommand::Delta(Delta::Delete { id }) => Command::Delete { id },
        }
    }
}

/// Ordered queue of records delivered as one unit
#[derive(Debug, Default)]
pub struct CommandBatch {
    commands: Vec<Command>,
    wire: OnceLock<String>,
}

impl CommandBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
        self.wire.take();
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.wire.take();
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Concatenated line form of every record, cached until the next mutation
    pub fn to_wire(&self) -> Result<&str, ProtocolError> {
        if let Some(wire) = self.wire.get() {
            return Ok(wire);
        }

        let mut wire = String::new();
        for command in &self.commands {
            wire.push_str(&command.to_line()?);
            wire.push('\n');
        }
        Ok(self.wire.get_or_init(|| wire))
    }
}

impl Extend<Command> for CommandBatch {
    fn extend<T: IntoIterator<Item = Command>>(&mut self, iter: T) {
        self.commands.extend(iter);
        self.wire.take();
    }
}

/// Player keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Left,
    Right,
    Shoot,
}

/// Client-to-server operation after the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientOp {
    Press { key: Key },
    Release { key: Key },
    /// Client-side speculative position for one of the session's entities
    Move { id: EntityId, x: i32, y: i32 },
    Bye,
}

impl ClientOp {
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line).map_err(|_| ProtocolError::InvalidOperation(line.to_string()))
    }
}

/// Client reply to `start`: its own id to host, any other to spectate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub init: ClientId,
}

impl Handshake {
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line).map_err(|_| ProtocolError::InvalidHandshake(line.to_string()))
    }
}

/// Protocol errors
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
}
