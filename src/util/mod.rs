//! Shared utilities

pub mod ids;

pub use ids::{ClientId, EntityId};
