//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::game::SessionRules;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Maximum number of concurrently active sessions
    pub max_sessions: usize,
    /// Test the top and bottom arena walls as well
    pub vertical_bounds: bool,
    /// Cooldown between player shots
    pub shot_reload: Duration,
    /// Lives granted on every level (re)start
    pub starting_lives: u32,
    /// Fixed seed for reproducible sessions
    pub rng_seed: Option<u64>,
    /// Read operator commands from stdin
    pub admin_console: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins when the platform provides one
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            max_sessions: parse_var("MAX_SESSIONS", 2)?,
            vertical_bounds: parse_var("VERTICAL_BOUNDS", false)?,
            shot_reload: Duration::from_millis(parse_var("SHOT_RELOAD_MS", 1000)?),
            starting_lives: parse_var("STARTING_LIVES", 3)?,
            rng_seed: match env::var("RNG_SEED") {
                Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid("RNG_SEED"))?),
                Err(_) => None,
            },
            admin_console: parse_var("ADMIN_CONSOLE", true)?,
        })
    }

    pub fn session_rules(&self) -> SessionRules {
        SessionRules {
            starting_lives: self.starting_lives,
            shot_reload: self.shot_reload,
            vertical_bounds: self.vertical_bounds,
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
