//! # Shared Game Lifecycle Library
//!
//! Everything the server and the client must agree on: the lifecycle states,
//! the game state machine, the game mode strategies, the wire protocol and the
//! replication bookkeeping.
//!
//! ## Lifecycle
//!
//! A [`Game`] starts `Ready`, moves to `Active` when it begins and to
//! `Stopped` when it ends or completes. Resetting a stopped game puts it back
//! to `Ready`. State is only ever changed through these operations, never
//! assigned, and every change is recorded so the owner can replicate it.
//!
//! ## Replication
//!
//! The server broadcasts each change of its game. Clients reconcile their own
//! game to the broadcast state with [`reconcile`] and confirm it. The
//! [`ServerReplicator`] tracks confirmations per connection and reports
//! quorum once every live connection agrees on the current state.
//!
//! None of this does IO; the network loops in the `server` and `client`
//! crates drive it.

pub mod error;
pub mod game;
pub mod mode;
pub mod observer;
pub mod packet;
pub mod replication;
pub mod roster;
pub mod state;

pub use error::{BoxError, GameError};
pub use game::{Game, GameObserver, GameSnapshot};
pub use mode::{GameMode, GameModeCatalog, ModeCommand, SandboxMode, TimedMode};
pub use observer::LoggingObserver;
pub use packet::{Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
pub use replication::{reconcile, ConfirmOutcome, ServerReplicator, StateBroadcast};
pub use roster::ConnectionRoster;
pub use state::{reconciliation_plan, GameState, Transition};
