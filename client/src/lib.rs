//! # Game Lifecycle Client Library
//!
//! The client follows the server's game. It keeps a local copy of the game,
//! applies every lifecycle broadcast to it through the game's own legal
//! operations and confirms the resulting state, so the server knows when all
//! clients have caught up.
//!
//! ## Following the Server
//!
//! Each `GameState` packet names the game instance (its epoch), the game mode
//! and the lifecycle state. A new epoch replaces the local game with a fresh
//! one created from the client's [`GameModeCatalog`](shared::GameModeCatalog).
//! The local game is then reconciled step by step, so observers on the client
//! see the same begin, end, complete and reset notifications as the server's.
//!
//! Confirmations are sent for every broadcast, repeated ones included. The
//! server resends state to clients that have not confirmed it, which makes
//! the exchange safe over UDP.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! [`ClientGame`](game::ClientGame) owns the local game and turns broadcasts
//! into confirmations.
//!
//! ### Network Module (`network`)
//! [`Client`](network::Client) owns the UDP socket and runs the event loop:
//! - Connection establishment, retried until the server answers
//! - Broadcast handling and confirmation
//! - Local game ticks
//! - Heartbeats that keep the connection from timing out
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientConfig};
//! use shared::{GameModeCatalog, LoggingObserver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), shared::BoxError> {
//!     let catalog = GameModeCatalog::with_builtin_modes(300);
//!     let mut client = Client::new("127.0.0.1:8080", ClientConfig::default(), catalog).await?;
//!     client.add_observer(Box::new(LoggingObserver::new("client")));
//!
//!     // Runs until the server disconnects us
//!     client.run().await?;
//!     client.disconnect().await;
//!
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
