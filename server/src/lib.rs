//! # Lockstep Coordinator Library
//!
//! The coordinator owns the clock of every match. It gathers the commands
//! participants send, folds them into one step per interval and broadcasts
//! each committed step to everyone in the room. It never simulates the game
//! itself: every participant runs the same deterministic simulation over the
//! same ordered steps.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! Tracks who is in a room:
//! - Participant identity to connection mapping
//! - Reconnect detection and kicking of stale connections
//! - Online counting and full-room rejection
//!
//! ### Aggregator Module (`aggregator`)
//! Builds steps from pending commands on a fixed interval and keeps the
//! full committed history for late joiners.
//!
//! ### Admission Module (`admission`)
//! Drops command batches whose declared frame lags too far behind.
//!
//! ### Game Module (`game`)
//! One match per room, moving between `Wait` and `Start`. All match logic
//! is synchronous and returns the packets to send as [`game::Outbound`]
//! actions.
//!
//! ### Manager Module (`manager`)
//! Routes connections to rooms and creates or drops matches.
//!
//! ### Network Module (`network`)
//! TCP listener and per-connection tasks feeding one main loop, which is
//! the only place match state is touched.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use shared::SystemClock;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:3000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::bind(config, Arc::new(SystemClock)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod aggregator;
pub mod config;
pub mod game;
pub mod manager;
pub mod network;
pub mod session;
