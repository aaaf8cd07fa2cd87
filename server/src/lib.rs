//! # Game Lifecycle Server Library
//!
//! This library provides the authoritative side of the game lifecycle. The
//! server owns the one live game, broadcasts every change of its state to the
//! connected clients and tracks which clients have confirmed it.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Lifecycle
//! Only the server decides when a game begins, ends, completes or resets.
//! Clients mirror these decisions and report back.
//!
//! ### Client Management
//! Handles the complete lifecycle of client connections including:
//! - Connection establishment and ID assignment
//! - Protocol version checks and capacity limits
//! - Disconnection and timeout handling
//!
//! ### Quorum
//! Once every connected client has confirmed the current state, the server
//! notifies its observers and applies its lifecycle policy, for example
//! beginning the game as soon as everyone is ready.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All network events, ticks and replication bookkeeping are processed
//! sequentially by one loop. Socket IO and timeout checks run in their own
//! tasks and talk to the loop through channels.
//!
//! ### At-Least-Once State Delivery
//! State packets travel over UDP and may be lost. The server keeps the latest
//! broadcast, hands it to clients that join late and resends it to clients
//! that have not confirmed it yet.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, ID assignment and timeout detection.
//!
//! ### Game Module (`game`)
//! [`GameManager`](game::GameManager): owns the live game, reboots it under a
//! new epoch and applies the [`LifecyclePolicy`](game::LifecyclePolicy).
//!
//! ### Host Module (`host`)
//! [`HostReadiness`](host::HostReadiness): holds back initialization until an
//! in-process client is connected.
//!
//! ### Network Module (`network`)
//! UDP socket management, packet handling and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use shared::{GameModeCatalog, LoggingObserver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), shared::BoxError> {
//!     let catalog = GameModeCatalog::with_builtin_modes(300);
//!     let mut server = Server::new("127.0.0.1:8080", ServerConfig::default(), catalog).await?;
//!     server.add_observer(Box::new(LoggingObserver::new("server")));
//!
//!     // Runs the main loop which:
//!     // - Accepts clients and answers with the current game state
//!     // - Ticks the game and broadcasts every state change
//!     // - Collects confirmations and begins the game once all clients are ready
//!     // - Drops clients that went silent
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod host;
pub mod network;
