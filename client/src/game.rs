//! Client-side mirror of the server's game
//!
//! The client never decides lifecycle changes on its own behalf for the
//! server. It follows every `GameState` broadcast: a broadcast for a new game
//! instance replaces the local game, then the local game is reconciled to
//! the broadcast state through its legal operations and the result is
//! confirmed back to the server.

use log::{debug, info};
use shared::error::Result;
use shared::{reconcile, Game, GameModeCatalog, GameObserver, GameState, Packet, StateBroadcast};

pub struct ClientGame {
    catalog: GameModeCatalog,
    game: Option<Game>,
    /// Observers waiting for the first broadcast
    observers: Vec<Box<dyn GameObserver>>,
}

impl ClientGame {
    pub fn new(catalog: GameModeCatalog) -> Self {
        Self {
            catalog,
            game: None,
            observers: Vec::new(),
        }
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn state(&self) -> GameState {
        self.game.as_ref().map_or(GameState::None, Game::state)
    }

    pub fn add_observer(&mut self, mut observer: Box<dyn GameObserver>) {
        match &mut self.game {
            Some(game) => {
                observer.catch_up(&game.snapshot());
                game.add_observer(observer);
            }
            None => self.observers.push(observer),
        }
    }

    /// Runs one tick of the local game.
    ///
    /// Changes the local mode makes on its own, such as a timed round
    /// running out, are not confirmed. The server counts confirmations per
    /// state, so a confirmation sent ahead of the server's own change would
    /// add to a quorum for a state the server has not reached. The client
    /// confirms the change once the server broadcasts it.
    pub fn execute(&mut self) {
        if let Some(game) = &mut self.game {
            game.execute();
            game.take_state_changes();
        }
    }

    /// Follows a broadcast and returns the confirmation to send back.
    ///
    /// Returns `Ok(None)` for a broadcast that carries no lifecycle state.
    /// Fails only when the broadcast names a mode this client does not know.
    pub fn apply_server_state(&mut self, broadcast: &StateBroadcast) -> Result<Option<Packet>> {
        if broadcast.state == GameState::None {
            debug!("Ignoring broadcast without a state for game {}", broadcast.epoch);
            return Ok(None);
        }

        let game = match self.game.take() {
            Some(game) if game.epoch() == broadcast.epoch => game,
            previous => self.replace_game(previous, broadcast)?,
        };
        let game = self.game.insert(game);

        let applied = reconcile(game, broadcast.state, broadcast.completed);
        game.take_state_changes();
        if !applied.is_empty() {
            debug!(
                "Game {}: reconciled to {} via {:?}",
                game.epoch(),
                broadcast.state,
                applied
            );
        }

        Ok(Some(Packet::ConfirmGameState {
            epoch: game.epoch(),
            state: game.state(),
        }))
    }

    /// Ends the local game when the client shuts down.
    pub fn exit(&mut self) {
        if let Some(game) = &mut self.game {
            game.exit();
        }
    }

    fn replace_game(&mut self, previous: Option<Game>, broadcast: &StateBroadcast) -> Result<Game> {
        let mode = match self.catalog.create(&broadcast.game_mode) {
            Ok(mode) => mode,
            Err(err) => {
                self.game = previous;
                return Err(err);
            }
        };

        let observers = match previous {
            Some(mut game) => {
                game.exit();
                game.notify_observers(|observer, snapshot| observer.on_game_destroyed(snapshot));
                game.into_observers()
            }
            None => std::mem::take(&mut self.observers),
        };

        info!(
            "Following server game {} running '{}'",
            broadcast.epoch, broadcast.game_mode
        );
        let mut game = Game::new(broadcast.epoch, mode, observers);
        game.notify_observers(|observer, snapshot| observer.on_game_created(snapshot));
        Ok(game)
    }
}
