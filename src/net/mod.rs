//! Client networking: line-delimited JSON over TCP

pub mod client;
pub mod handler;
pub mod protocol;
pub mod server;
