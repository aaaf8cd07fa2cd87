//! Server → client state replication with per-connection acknowledgement
//!
//! The server broadcasts every lifecycle change of its game and keeps the
//! latest broadcast for connections that join later. Clients reconcile their
//! own game to the broadcast state and confirm it. The server records each
//! confirmation in a [`ConnectionRoster`] and reports quorum once every live
//! connection has confirmed the same state. A quorum may arrive for a state
//! the server has already left; the owner decides whether it still matters.
//!
//! Nothing here does IO. The server and client network loops feed events in
//! and send whatever packets come out.

use crate::error::GameError;
use crate::game::Game;
use crate::packet::Packet;
use crate::roster::ConnectionRoster;
use crate::state::{reconciliation_plan, GameState, Transition};
use log::{debug, info, warn};

/// One lifecycle change as seen by replication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBroadcast {
    pub epoch: u32,
    pub game_mode: String,
    pub state: GameState,
    pub completed: bool,
}

/// Result of handling a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Roster updated, no new quorum.
    Recorded,
    /// Every live connection now agrees on this state.
    QuorumReached(GameState),
    /// Ignored. Stale or unknown confirmations are expected network noise.
    Dropped(GameError),
}

#[derive(Debug, Default)]
pub struct ServerReplicator {
    roster: ConnectionRoster,
    retained: Option<StateBroadcast>,
    /// State quorum was last reported for; cleared whenever quorum breaks.
    quorum: Option<GameState>,
}

impl ServerReplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roster(&self) -> &ConnectionRoster {
        &self.roster
    }

    /// Latest broadcast, handed to late joiners.
    pub fn retained(&self) -> Option<&StateBroadcast> {
        self.retained.as_ref()
    }

    /// Records a state change of the server's game and returns the packet to
    /// send to every connected client.
    ///
    /// A broadcast from a new game instance wipes all confirmations so nothing
    /// carries over from the previous game.
    pub fn on_local_state_changed(&mut self, broadcast: StateBroadcast) -> Packet {
        let new_game = self
            .retained
            .as_ref()
            .map_or(true, |retained| retained.epoch != broadcast.epoch);

        if new_game {
            debug!(
                "Replication: game {} started, clearing {} confirmations",
                broadcast.epoch,
                self.roster.len()
            );
            self.roster.reset_confirmations();
        }

        self.quorum = None;
        self.retained = Some(broadcast.clone());
        Packet::from(broadcast)
    }

    /// Adds a connection and returns the retained broadcast it should receive.
    pub fn on_connect(&mut self, connection_id: u32) -> Option<Packet> {
        self.roster.on_connect(connection_id);
        self.quorum = None;
        self.retained.clone().map(Packet::from)
    }

    /// Removes a connection. Its departure may complete a quorum the others
    /// had already reached.
    pub fn on_disconnect(&mut self, connection_id: u32, live_connections: usize) -> Option<GameState> {
        if !self.roster.on_disconnect(connection_id) {
            return None;
        }

        let target = self.retained.as_ref()?.state;
        self.evaluate(target, live_connections)
    }

    /// Records a confirmation and evaluates quorum for the confirmed state.
    ///
    /// Confirmations for another game instance or from connections not in
    /// the roster are dropped.
    pub fn on_client_confirm(
        &mut self,
        connection_id: u32,
        epoch: u32,
        state: GameState,
        live_connections: usize,
    ) -> ConfirmOutcome {
        if let Some(retained) = &self.retained {
            if retained.epoch != epoch {
                let err = GameError::StaleConfirmation {
                    expected: retained.epoch,
                    received: epoch,
                };
                debug!("Replication: dropping confirmation from {}: {}", connection_id, err);
                return ConfirmOutcome::Dropped(err);
            }
        }

        if let Err(err) = self.roster.confirm(connection_id, state) {
            debug!("Replication: dropping confirmation: {}", err);
            return ConfirmOutcome::Dropped(err);
        }

        debug!("Replication: client {} confirmed {}", connection_id, state);

        match self.evaluate(state, live_connections) {
            Some(state) => ConfirmOutcome::QuorumReached(state),
            None => ConfirmOutcome::Recorded,
        }
    }

    /// Retained packet and the connections that have not confirmed it yet.
    pub fn resend_targets(&self) -> Option<(Packet, Vec<u32>)> {
        let retained = self.retained.as_ref()?;
        let lagging = self.roster.lagging(retained.state);
        if lagging.is_empty() {
            return None;
        }
        Some((Packet::from(retained.clone()), lagging))
    }

    /// Reports quorum on the edge where it becomes true for `target`.
    fn evaluate(&mut self, target: GameState, live_connections: usize) -> Option<GameState> {
        if !self.roster.all_equal(target, live_connections) {
            self.quorum = None;
            return None;
        }

        if self.quorum == Some(target) {
            return None;
        }

        info!("Replication: all {} clients confirmed {}", live_connections, target);
        self.quorum = Some(target);
        Some(target)
    }
}

/// Brings a client's game to `target` through legal operations.
///
/// Follows [`reconciliation_plan`] with one addition to the table: when the
/// server's game completed, an `End` on the way to `Stopped` is applied as
/// `Complete`, so the client raises `on_complete` and reports the same
/// `completed` flag. Returns the steps applied.
pub fn reconcile(game: &mut Game, target: GameState, completed: bool) -> Vec<Transition> {
    let plan = reconciliation_plan(game.state(), target);
    let mut applied = Vec::with_capacity(plan.len());

    for step in plan {
        let step = match step {
            Transition::End if completed && target == GameState::Stopped => Transition::Complete,
            other => *other,
        };

        if let Err(err) = game.apply(step) {
            warn!("Reconcile: {} failed on the way to {}: {}", step, target, err);
            break;
        }
        applied.push(step);
    }

    applied
}
