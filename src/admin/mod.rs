//! Operator tooling

pub mod console;
