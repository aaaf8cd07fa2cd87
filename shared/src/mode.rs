//! Game mode strategies and the catalog they are created from
//!
//! A game mode is the pluggable behaviour a [`Game`](crate::game::Game) runs.
//! The game calls into it at fixed points of its lifecycle:
//!
//! - `create` once, when the game is constructed
//! - `enter` every time the game begins
//! - `execute` every tick while the game is active
//! - `exit` every time an active game ends
//! - `reset_game` every time the game is reset back to ready
//!
//! Modes are looked up by name through a [`GameModeCatalog`], so a server and
//! its clients can agree on a mode by sending its name over the wire.

use crate::error::{GameError, Result};
use crate::game::GameSnapshot;
use log::debug;
use std::collections::HashMap;

/// What the game should do after a mode's tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeCommand {
    #[default]
    Continue,
    /// End the game unsuccessfully
    End,
    /// End the game as a successful completion
    Complete,
}

/// Behaviour invoked at each lifecycle transition of a game.
pub trait GameMode: Send + Sync {
    /// Name used to look the mode up in a catalog. Server and clients must agree on it.
    fn name(&self) -> &str;

    fn create(&mut self, _game: &GameSnapshot<'_>) {}

    fn enter(&mut self, _game: &GameSnapshot<'_>) {}

    fn execute(&mut self, _game: &GameSnapshot<'_>) -> ModeCommand {
        ModeCommand::Continue
    }

    fn exit(&mut self, _game: &GameSnapshot<'_>) {}

    fn reset_game(&mut self, _game: &GameSnapshot<'_>) {}
}

/// Open-ended mode: the game only ends when something outside asks it to.
#[derive(Debug, Default)]
pub struct SandboxMode;

impl GameMode for SandboxMode {
    fn name(&self) -> &str {
        SandboxMode::NAME
    }
}

impl SandboxMode {
    pub const NAME: &'static str = "sandbox";
}

/// Completes the game after a fixed number of active ticks.
#[derive(Debug)]
pub struct TimedMode {
    round_ticks: u32,
    elapsed_ticks: u32,
}

impl TimedMode {
    pub const NAME: &'static str = "timed";

    pub fn new(round_ticks: u32) -> Self {
        Self {
            round_ticks: round_ticks.max(1),
            elapsed_ticks: 0,
        }
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    pub fn round_ticks(&self) -> u32 {
        self.round_ticks
    }
}

impl GameMode for TimedMode {
    fn name(&self) -> &str {
        TimedMode::NAME
    }

    fn enter(&mut self, game: &GameSnapshot<'_>) {
        self.elapsed_ticks = 0;
        debug!(
            "Game {}: round started, {} ticks to go",
            game.epoch, self.round_ticks
        );
    }

    fn execute(&mut self, _game: &GameSnapshot<'_>) -> ModeCommand {
        self.elapsed_ticks += 1;
        if self.elapsed_ticks >= self.round_ticks {
            ModeCommand::Complete
        } else {
            ModeCommand::Continue
        }
    }

    fn reset_game(&mut self, _game: &GameSnapshot<'_>) {
        self.elapsed_ticks = 0;
    }
}

type ModeFactory = Box<dyn Fn() -> Box<dyn GameMode> + Send + Sync>;

/// Registry of game modes by name.
#[derive(Default)]
pub struct GameModeCatalog {
    factories: HashMap<String, ModeFactory>,
}

impl GameModeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding `sandbox` and `timed` (with the given round length).
    pub fn with_builtin_modes(round_ticks: u32) -> Self {
        let mut catalog = Self::new();
        catalog.register(SandboxMode::NAME, || Box::new(SandboxMode));
        catalog.register(TimedMode::NAME, move || Box::new(TimedMode::new(round_ticks)));
        catalog
    }

    /// Registers a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn GameMode> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Instantiates a fresh mode. Fails with `MissingStrategy` for unknown names.
    pub fn create(&self, name: &str) -> Result<Box<dyn GameMode>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| GameError::MissingStrategy(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
