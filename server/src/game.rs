//! Server-side ownership of the live game
//!
//! The [`GameManager`] holds at most one [`Game`] at a time. Rebooting tears
//! the current game down and replaces it with a fresh instance under a new
//! epoch, moving the observers across. Once replication reports that every
//! client agrees on a state, the manager applies its [`LifecyclePolicy`].

use log::{debug, info, warn};
use shared::error::Result;
use shared::{Game, GameError, GameModeCatalog, GameObserver, GameState, StateBroadcast};

/// What the server does on its own once all clients agree on a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Begin the game once every client confirmed `Ready`.
    pub auto_begin: bool,
    /// Reset the game once every client confirmed `Stopped`.
    pub auto_reset: bool,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            auto_begin: true,
            auto_reset: false,
        }
    }
}

pub struct GameManager {
    catalog: GameModeCatalog,
    starting_mode: Option<String>,
    game: Option<Game>,
    /// Observers waiting for the first game to be created
    observers: Vec<Box<dyn GameObserver>>,
    initialized: bool,
    next_epoch: u32,
    policy: LifecyclePolicy,
}

impl GameManager {
    pub fn new(
        catalog: GameModeCatalog,
        starting_mode: Option<String>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            catalog,
            starting_mode,
            game: None,
            observers: Vec::new(),
            initialized: false,
            next_epoch: 1,
            policy,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn policy(&self) -> LifecyclePolicy {
        self.policy
    }

    pub fn game(&self) -> Option<&Game> {
        self.game.as_ref()
    }

    pub fn game_mut(&mut self) -> Option<&mut Game> {
        self.game.as_mut()
    }

    /// Marks the manager ready and starts the configured starting mode.
    ///
    /// Calling it again does nothing.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            debug!("Game manager already initialized");
            return Ok(());
        }

        self.initialized = true;
        info!("Game manager initialized");
        for observer in self.observers_mut() {
            observer.on_initialized();
        }

        match self.starting_mode.clone() {
            Some(mode) => self.reboot_with(&mode),
            None => Ok(()),
        }
    }

    /// Replaces the current game with a fresh one running the same mode.
    pub fn reboot(&mut self) -> Result<()> {
        let mode = match (&self.game, &self.starting_mode) {
            (Some(game), _) => game.game_mode().to_string(),
            (None, Some(mode)) => mode.clone(),
            (None, None) => return Err(GameError::MissingStrategy(String::new())),
        };
        self.reboot_with(&mode)
    }

    /// Replaces the current game with a fresh one running `mode`.
    ///
    /// The mode is looked up before anything is torn down, so an unknown name
    /// leaves the current game running.
    pub fn reboot_with(&mut self, mode: &str) -> Result<()> {
        if !self.initialized {
            return Err(GameError::NotInitialized);
        }

        let mode = self.catalog.create(mode)?;

        let observers = match self.game.take() {
            Some(mut game) => {
                game.exit();
                game.notify_observers(|observer, snapshot| observer.on_game_destroyed(snapshot));
                let discarded = game.take_state_changes();
                debug!(
                    "Game {} destroyed, {} pending state changes discarded",
                    game.epoch(),
                    discarded.len()
                );
                game.into_observers()
            }
            None => std::mem::take(&mut self.observers),
        };

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let mut game = Game::new(epoch, mode, observers);
        info!("Game {} created running '{}'", epoch, game.game_mode());
        game.notify_observers(|observer, snapshot| observer.on_game_created(snapshot));
        self.game = Some(game);

        Ok(())
    }

    /// Runs one tick of the live game.
    pub fn execute(&mut self) {
        if let Some(game) = &mut self.game {
            game.execute();
        }
    }

    /// Ends the live game, if any, before the server goes away.
    pub fn shutdown(&mut self) {
        if let Some(game) = &mut self.game {
            game.exit();
        }
    }

    /// Registers an observer and tells it which phase the live game is in.
    pub fn add_observer(&mut self, mut observer: Box<dyn GameObserver>) {
        match &mut self.game {
            Some(game) => {
                observer.catch_up(&game.snapshot());
                game.add_observer(observer);
            }
            None => self.observers.push(observer),
        }
    }

    /// Drains the state changes the live game recorded since the last call.
    pub fn take_state_changes(&mut self) -> Vec<StateBroadcast> {
        self.game
            .as_mut()
            .map(Game::take_state_changes)
            .unwrap_or_default()
    }

    /// Every connected client confirmed `state`.
    pub fn on_quorum_confirmed(&mut self, state: GameState) {
        let policy = self.policy;
        let Some(game) = &mut self.game else {
            return;
        };

        game.notify_observers(|observer, snapshot| observer.on_quorum_confirmed(snapshot, state));

        if game.state() != state {
            debug!(
                "Game {} moved on to {} before quorum on {} arrived",
                game.epoch(),
                game.state(),
                state
            );
            return;
        }

        match state {
            GameState::Ready if policy.auto_begin => {
                if let Err(err) = game.begin_game() {
                    warn!("Auto begin failed: {}", err);
                }
            }
            GameState::Stopped if policy.auto_reset => game.reset_game(),
            _ => {}
        }
    }

    fn observers_mut(&mut self) -> &mut [Box<dyn GameObserver>] {
        match &mut self.game {
            Some(game) => game.observers_mut(),
            None => &mut self.observers,
        }
    }
}
