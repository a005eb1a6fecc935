//! # Lockstep Participant Library
//!
//! A participant never decides the outcome of a frame on its own. It sends
//! its commands to the coordinator, receives every committed step back and
//! applies those steps to a local copy of the shared deterministic
//! simulation. Two participants that applied the same steps hold the same
//! state.
//!
//! ## Module Organization
//!
//! ### Sync Module (`sync`)
//! Step buffering on the participant side:
//! - Received steps are queued in arrival order and drained at a fixed rate
//! - The local frame counts applied steps and tags outgoing commands
//! - Input is blocked while the local frame lags the server frame
//!
//! ### Game Module (`game`)
//! The `Init`, `Wait` and `Start` phases, the local simulation, catch-up
//! after a history replay, display smoothing and the status feed.
//!
//! ### Input Module (`input`)
//! A random bot standing in for a keyboard in headless runs.
//!
//! ### Network Module (`network`)
//! TCP connection with a reader and a writer task around one cooperative
//! client loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig {
//!         account_id: "alice".to_string(),
//!         bot_rate: 2.0,
//!         ..ClientConfig::default()
//!     };
//!     let mut client = Client::connect(config).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod game;
pub mod input;
pub mod network;
pub mod sync;
