//! Game simulation modules

pub mod entity;
pub mod geometry;
pub mod level;
pub mod mode;
pub mod placement;
pub mod registry;
pub mod session;
pub mod speed;
pub mod sprite;

pub use registry::{RegistryError, SessionRegistry};
pub use session::{Detached, GameSession, SessionError, SessionRules};
