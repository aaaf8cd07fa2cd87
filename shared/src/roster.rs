//! Server-side record of what each live connection last confirmed

use crate::error::{GameError, Result};
use crate::state::GameState;
use std::collections::HashMap;

/// Connection id → last confirmed state.
///
/// Entries follow connect/disconnect events, so the roster holds exactly the
/// live connections. A new connection starts at `GameState::None`.
#[derive(Debug, Default, Clone)]
pub struct ConnectionRoster {
    entries: HashMap<u32, GameState>,
}

impl ConnectionRoster {
    /// Creates an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection that has not confirmed anything yet.
    ///
    /// A reused id starts over at `None`.
    pub fn on_connect(&mut self, connection_id: u32) {
        self.entries.insert(connection_id, GameState::None);
    }

    /// Removes a connection.
    ///
    /// Returns false if it was not in the roster, so a disconnect that was
    /// already handled (for instance a timeout racing a `Disconnect` packet)
    /// is not processed twice.
    pub fn on_disconnect(&mut self, connection_id: u32) -> bool {
        self.entries.remove(&connection_id).is_some()
    }

    /// Records a confirmation from a known connection.
    ///
    /// Overwrites whatever the connection confirmed before. Fails with
    /// [`GameError::UnknownConnection`] for ids not in the roster; those are
    /// never added here, membership only follows connect events.
    pub fn confirm(&mut self, connection_id: u32, state: GameState) -> Result<()> {
        match self.entries.get_mut(&connection_id) {
            Some(confirmed) => {
                *confirmed = state;
                Ok(())
            }
            None => Err(GameError::UnknownConnection(connection_id)),
        }
    }

    /// Last state confirmed by a connection.
    ///
    /// `Some(GameState::None)` means it has not confirmed anything in the
    /// current game; `None` means it is not in the roster.
    pub fn get(&self, connection_id: u32) -> Option<GameState> {
        self.entries.get(&connection_id).copied()
    }

    pub fn contains(&self, connection_id: u32) -> bool {
        self.entries.contains_key(&connection_id)
    }

    /// Number of connections in the roster.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True iff the roster is non-empty, its size equals `live_connections`,
    /// and every connection has confirmed `state`.
    ///
    /// The size check guards against a connection dropping while others are
    /// still confirming.
    pub fn all_equal(&self, state: GameState, live_connections: usize) -> bool {
        !self.entries.is_empty()
            && self.entries.len() == live_connections
            && self.entries.values().all(|confirmed| *confirmed == state)
    }

    /// Forgets every confirmation while keeping the membership.
    ///
    /// Used when a new game instance starts: confirmations of the previous
    /// game say nothing about the new one.
    pub fn reset_confirmations(&mut self) {
        for confirmed in self.entries.values_mut() {
            *confirmed = GameState::None;
        }
    }

    /// Connections whose last confirmation differs from `state`, sorted by id.
    ///
    /// These are the connections the current state is sent to again.
    pub fn lagging(&self, state: GameState) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, confirmed)| **confirmed != state)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
