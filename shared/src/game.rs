//! The game lifecycle state machine
//!
//! A [`Game`] moves between `Ready`, `Active` and `Stopped` only through its
//! public operations. Each operation runs the mode hook and notifies the
//! observers synchronously, in a fixed order, and records every state change
//! in an outbox the owner drains to feed replication.

use crate::error::{GameError, Result};
use crate::mode::{GameMode, GameModeCatalog, ModeCommand};
use crate::replication::StateBroadcast;
use crate::state::{GameState, Transition};
use log::{debug, error};

/// Read-only view of a game handed to modes and observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSnapshot<'a> {
    pub epoch: u32,
    pub game_mode: &'a str,
    pub state: GameState,
    pub completed: bool,
}

/// Lifecycle notifications. Every method defaults to doing nothing.
///
/// The manager-level hooks (`on_initialized` and below) are raised by the
/// game's owner, not by the game itself.
#[allow(unused_variables)]
pub trait GameObserver: Send + Sync {
    fn on_ready(&mut self, game: &GameSnapshot<'_>) {}

    fn on_begin(&mut self, game: &GameSnapshot<'_>) {}

    fn on_end(&mut self, game: &GameSnapshot<'_>, play_end_sequence: bool) {}

    fn on_complete(&mut self, game: &GameSnapshot<'_>) {}

    fn on_reset(&mut self, game: &GameSnapshot<'_>) {}

    fn on_state_changed(&mut self, state: GameState) {}

    fn on_initialized(&mut self) {}

    fn on_game_created(&mut self, game: &GameSnapshot<'_>) {}

    fn on_game_destroyed(&mut self, game: &GameSnapshot<'_>) {}

    /// Every live connection has confirmed `state`. Server only.
    fn on_quorum_confirmed(&mut self, game: &GameSnapshot<'_>, state: GameState) {}

    /// Replays the hook of the phase `game` is in, for observers that
    /// subscribe after the game was created.
    fn catch_up(&mut self, game: &GameSnapshot<'_>) {
        match game.state {
            GameState::Ready => self.on_ready(game),
            GameState::Active => self.on_begin(game),
            GameState::Stopped if game.completed => self.on_complete(game),
            GameState::Stopped => self.on_end(game, false),
            GameState::None => {}
        }
    }
}

/// Fields a snapshot is built from, kept apart from the mode and observers so
/// both can be borrowed mutably while a snapshot is alive.
#[derive(Debug)]
struct GameStatus {
    epoch: u32,
    game_mode: String,
    state: GameState,
    completed: bool,
}

impl GameStatus {
    fn snapshot(&self) -> GameSnapshot<'_> {
        GameSnapshot {
            epoch: self.epoch,
            game_mode: &self.game_mode,
            state: self.state,
            completed: self.completed,
        }
    }

    fn broadcast(&self) -> StateBroadcast {
        StateBroadcast {
            epoch: self.epoch,
            game_mode: self.game_mode.clone(),
            state: self.state,
            completed: self.completed,
        }
    }
}

pub struct Game {
    status: GameStatus,
    mode: Box<dyn GameMode>,
    observers: Vec<Box<dyn GameObserver>>,
    state_changes: Vec<StateBroadcast>,
}

impl Game {
    /// Creates a game in the `Ready` state.
    ///
    /// Runs the mode's `create` hook, then fires `on_ready` and
    /// `on_state_changed(Ready)`.
    pub fn new(epoch: u32, mode: Box<dyn GameMode>, observers: Vec<Box<dyn GameObserver>>) -> Self {
        let mut game = Self {
            status: GameStatus {
                epoch,
                game_mode: mode.name().to_string(),
                state: GameState::Ready,
                completed: false,
            },
            mode,
            observers,
            state_changes: Vec::new(),
        };

        game.mode.create(&game.status.snapshot());

        let snapshot = game.status.snapshot();
        for observer in &mut game.observers {
            observer.on_ready(&snapshot);
        }
        game.state_changed();

        game
    }

    /// Creates a game running the mode registered as `mode_name`.
    pub fn from_catalog(
        catalog: &GameModeCatalog,
        mode_name: &str,
        epoch: u32,
        observers: Vec<Box<dyn GameObserver>>,
    ) -> Result<Self> {
        let mode = catalog.create(mode_name)?;
        Ok(Self::new(epoch, mode, observers))
    }

    pub fn state(&self) -> GameState {
        self.status.state
    }

    pub fn completed(&self) -> bool {
        self.status.completed
    }

    pub fn epoch(&self) -> u32 {
        self.status.epoch
    }

    pub fn game_mode(&self) -> &str {
        &self.status.game_mode
    }

    pub fn snapshot(&self) -> GameSnapshot<'_> {
        self.status.snapshot()
    }

    pub fn add_observer(&mut self, observer: Box<dyn GameObserver>) {
        self.observers.push(observer);
    }

    pub fn observers_mut(&mut self) -> &mut [Box<dyn GameObserver>] {
        &mut self.observers
    }

    /// Calls `f` on every observer with a snapshot of the game.
    pub fn notify_observers<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut dyn GameObserver, &GameSnapshot<'_>),
    {
        let snapshot = self.status.snapshot();
        for observer in &mut self.observers {
            f(observer.as_mut(), &snapshot);
        }
    }

    /// Tears the game down, handing its observers to whoever replaces it.
    pub fn into_observers(self) -> Vec<Box<dyn GameObserver>> {
        self.observers
    }

    /// Drains the state changes recorded since the last call, oldest first.
    pub fn take_state_changes(&mut self) -> Vec<StateBroadcast> {
        std::mem::take(&mut self.state_changes)
    }

    /// Runs the mode's per-tick logic. Does nothing unless the game is active.
    pub fn execute(&mut self) {
        if self.status.state != GameState::Active {
            return;
        }

        let command = self.mode.execute(&self.status.snapshot());
        match command {
            ModeCommand::Continue => {}
            ModeCommand::End => self.end_game(true),
            ModeCommand::Complete => self.complete_game(),
        }
    }

    /// Owner teardown: ends the game if it is still running.
    pub fn exit(&mut self) {
        self.end_game(true);
    }

    /// Moves a ready game to `Active`.
    pub fn begin_game(&mut self) -> Result<()> {
        if self.status.state != GameState::Ready {
            let err = GameError::InvalidTransition {
                operation: Transition::Begin,
                state: self.status.state,
            };
            error!("Game {}: could not begin: {}", self.status.epoch, err);
            return Err(err);
        }

        self.status.state = GameState::Active;
        self.state_changed();

        let snapshot = self.status.snapshot();
        for observer in &mut self.observers {
            observer.on_begin(&snapshot);
        }

        self.mode.enter(&self.status.snapshot());
        Ok(())
    }

    /// Ends the game, marking it as an unsuccessful completion.
    ///
    /// A game that never began goes straight to `Stopped` without running the
    /// mode's exit hook or `on_end`. A stopped game is left alone.
    pub fn end_game(&mut self, play_end_sequence: bool) {
        if self.status.state == GameState::Ready {
            self.status.state = GameState::Stopped;
            self.state_changed();
        }

        if self.status.state != GameState::Active {
            return;
        }

        self.mode.exit(&self.status.snapshot());

        self.status.state = GameState::Stopped;

        let snapshot = self.status.snapshot();
        for observer in &mut self.observers {
            observer.on_end(&snapshot, play_end_sequence);
            if snapshot.completed {
                observer.on_complete(&snapshot);
            }
        }

        self.state_changed();
    }

    /// Ends the game, marking it as a successful completion.
    pub fn complete_game(&mut self) {
        self.status.completed = true;
        self.end_game(true);
    }

    /// Ends the game if needed and puts it back to `Ready`.
    pub fn reset_game(&mut self) {
        self.end_game(true);

        self.mode.reset_game(&self.status.snapshot());

        self.status.completed = false;
        self.status.state = GameState::Ready;

        let snapshot = self.status.snapshot();
        for observer in &mut self.observers {
            observer.on_reset(&snapshot);
        }

        self.state_changed();
    }

    /// Applies one transition through the matching public operation.
    pub fn apply(&mut self, transition: Transition) -> Result<()> {
        match transition {
            Transition::Begin => return self.begin_game(),
            Transition::End => self.end_game(true),
            Transition::Complete => self.complete_game(),
            Transition::Reset => self.reset_game(),
        }
        Ok(())
    }

    fn state_changed(&mut self) {
        let state = self.status.state;
        debug!("Game {}: state changed to {}", self.status.epoch, state);

        for observer in &mut self.observers {
            observer.on_state_changed(state);
        }
        self.state_changes.push(self.status.broadcast());
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("epoch", &self.status.epoch)
            .field("game_mode", &self.status.game_mode)
            .field("state", &self.status.state)
            .field("completed", &self.status.completed)
            .field("observers", &self.observers.len())
            .finish()
    }
}
