//! # Jetpack Race Server Library
//!
//! Authoritative server for a side-scrolling jetpack race. Every connected
//! client occupies a fixed slot; the server owns the map and every player's
//! state, advances the simulation on a fixed tick and sends each client one
//! packet per tick describing the whole session.
//!
//! ## Architecture Design
//!
//! ### Single Owner
//! One task (the reactor in [`network`]) owns the [`session::Session`] and the
//! [`registry::ConnectionRegistry`]. Socket tasks never touch game state;
//! they forward decoded packets over a channel and drain a per-connection
//! queue of encoded packets. No locks guard the game.
//!
//! ### Fixed-Size TCP Packets
//! Both directions exchange one packet shape of a constant byte size (see
//! `shared::protocol`). A read that does not yield a whole packet, or a
//! packet that fails to decode, closes that connection only.
//!
//! ### Tick Pipeline
//! Each tick releases idle clients, runs the session state machine and the
//! physics step for every racing slot, then broadcasts a snapshot per slot.
//!
//! ## Module Organization
//!
//! - `config`: validated server settings and the map source
//! - `mapgen`: seeded default level
//! - `network`: TCP reactor, socket tasks and the tick loop
//! - `physics`: one-tick advance of a player against the map
//! - `player`: per-slot player state and input
//! - `registry`: slot table of live connections
//! - `session`: round state machine, winner rules and snapshots
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::{BoxError, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BoxError> {
//!     let mut server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod config;
pub mod mapgen;
pub mod network;
pub mod physics;
pub mod player;
pub mod registry;
pub mod session;
