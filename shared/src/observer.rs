use crate::game::{GameObserver, GameSnapshot};
use crate::state::GameState;
use log::info;

/// Logs every lifecycle notification, prefixed with a role label.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    role: String,
}

impl LoggingObserver {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

impl GameObserver for LoggingObserver {
    fn on_ready(&mut self, game: &GameSnapshot<'_>) {
        info!("[{}] Game {} ({}) is ready", self.role, game.epoch, game.game_mode);
    }

    fn on_begin(&mut self, game: &GameSnapshot<'_>) {
        info!("[{}] Game {} began", self.role, game.epoch);
    }

    fn on_end(&mut self, game: &GameSnapshot<'_>, _play_end_sequence: bool) {
        info!("[{}] Game {} ended", self.role, game.epoch);
    }

    fn on_complete(&mut self, game: &GameSnapshot<'_>) {
        info!("[{}] Game {} completed", self.role, game.epoch);
    }

    fn on_reset(&mut self, game: &GameSnapshot<'_>) {
        info!("[{}] Game {} reset", self.role, game.epoch);
    }

    fn on_initialized(&mut self) {
        info!("[{}] Game manager initialized", self.role);
    }

    fn on_game_created(&mut self, game: &GameSnapshot<'_>) {
        info!("[{}] Created game {} running '{}'", self.role, game.epoch, game.game_mode);
    }

    fn on_game_destroyed(&mut self, game: &GameSnapshot<'_>) {
        info!("[{}] Destroyed game {}", self.role, game.epoch);
    }

    fn on_quorum_confirmed(&mut self, game: &GameSnapshot<'_>, state: GameState) {
        info!("[{}] All clients confirmed {} for game {}", self.role, state, game.epoch);
    }
}
