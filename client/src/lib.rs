//! # Jetpack Race Client Library
//!
//! Headless reference client for the jetpack race server. It shows the whole
//! client side of the protocol without a window: connect, read the welcome
//! packet and its map, then exchange one fixed-size packet per tick in each
//! direction.
//!
//! ## Authority
//!
//! The server owns the simulation. The client performs no physics of its own:
//! every position, score and phase shown by [`game::ClientView`] is copied from
//! the latest server packet. The one local change is clearing a collected coin
//! from the map copy so a renderer would stop drawing it.
//!
//! ## Module Organization
//!
//! - `game`: the authoritative view rebuilt from server packets
//! - `network`: TCP connection, packet reads and the input loop
//! - `pilot`: input sources producing the jetpack intent
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientError};
//! use client::pilot::Autopilot;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ClientError> {
//!     let mut client = Client::connect(
//!         "127.0.0.1:4242",
//!         Box::new(Autopilot),
//!         Duration::from_millis(16),
//!     )
//!     .await?;
//!     let outcome = client.play_round().await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
pub mod pilot;
