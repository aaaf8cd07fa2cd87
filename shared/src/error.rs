//! Error types for the game lifecycle and its replication

use crate::state::{GameState, Transition};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// Operation requested in a state that forbids it. The game stays where it was.
    #[error("cannot {operation} the game while it is {state}")]
    InvalidTransition {
        operation: Transition,
        state: GameState,
    },

    /// Confirmation from a connection that is not in the roster.
    #[error("confirmation from unknown connection {0}")]
    UnknownConnection(u32),

    /// Confirmation addressed to a game instance that has since been replaced.
    #[error("stale confirmation for game {received}, current game is {expected}")]
    StaleConfirmation { expected: u32, received: u32 },

    /// No game mode could be found for the given name.
    #[error("no game mode registered as '{0}'")]
    MissingStrategy(String),

    #[error("game manager is not initialized")]
    NotInitialized,
}

/// Boxed error used by the network plumbing.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, GameError>;
