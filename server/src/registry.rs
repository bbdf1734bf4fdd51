//! Connection registry mapping live connections to player slots
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Slot assignment (first free index) and release
//! - Connection generations so late events from a released slot are ignored
//! - The latest input each slot declared, consumed by the next tick
//! - Idle detection for clients that stopped sending packets
//!
//! The registry is owned by the reactor and never shared; it holds the
//! outbound queue of every connection so broadcasts can be routed by slot.

use crate::player::PlayerInput;
use log::info;
use shared::MAX_CLIENTS;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Unique id of an accepted connection, never reused.
pub type ConnectionId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("all {} slots are occupied", MAX_CLIENTS)]
    ServerFull,
}

/// A connected client seated in a slot
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    /// Encoded packets waiting for the connection's writer task
    pub outbound: mpsc::Sender<Vec<u8>>,
    /// Last time a packet arrived from this client
    pub last_seen: Instant,
    /// Intent applied on the next tick
    pub input: PlayerInput,
    /// Reader and writer tasks serving the socket
    tasks: Vec<AbortHandle>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, outbound: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            id,
            addr,
            outbound,
            last_seen: Instant::now(),
            input: PlayerInput::default(),
            tasks: Vec::new(),
        }
    }

    pub fn attach(&mut self, task: AbortHandle) {
        self.tasks.push(task);
    }

    /// Checks if the client has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Dropping a connection stops its socket tasks, which closes the socket.
impl Drop for Connection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Fixed table of player slots
pub struct ConnectionRegistry {
    slots: [Option<Connection>; MAX_CLIENTS],
    next_connection_id: ConnectionId,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            next_connection_id: 1,
        }
    }

    /// Allocates a connection id for a freshly accepted socket.
    pub fn next_id(&mut self) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }

    /// Seats a connection in the lowest free slot.
    ///
    /// Keeping indices low matters because the slot index also selects the
    /// player's start position.
    pub fn accept(&mut self, connection: Connection) -> Result<usize, RegistryError> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RegistryError::ServerFull)?;

        info!(
            "Connection {} from {} assigned slot {}",
            connection.id, connection.addr, slot
        );
        self.slots[slot] = Some(connection);
        Ok(slot)
    }

    /// Frees a slot, returning the connection that held it.
    pub fn release(&mut self, slot: usize) -> Option<Connection> {
        assert!(slot < MAX_CLIENTS, "slot {} out of range", slot);
        let connection = self.slots[slot].take();
        if let Some(connection) = &connection {
            info!("Connection {} released slot {}", connection.id, slot);
        }
        connection
    }

    /// Resolves a connection id to the slot it currently holds.
    pub fn slot_of(&self, id: ConnectionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|c| c.as_ref().is_some_and(|c| c.id == id))
    }

    pub fn get(&self, slot: usize) -> Option<&Connection> {
        self.slots[slot].as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Connection> {
        self.slots[slot].as_mut()
    }

    /// Records the latest input of a slot and refreshes its activity time.
    pub fn record_input(&mut self, slot: usize, input: PlayerInput) {
        if let Some(connection) = self.slots[slot].as_mut() {
            connection.input = input;
            connection.last_seen = Instant::now();
        }
    }

    /// Current intent of every slot; vacant slots are idle.
    pub fn inputs(&self) -> [PlayerInput; MAX_CLIENTS] {
        let mut inputs = [PlayerInput::default(); MAX_CLIENTS];
        for (slot, connection) in self.slots.iter().enumerate() {
            if let Some(connection) = connection {
                inputs[slot] = connection.input;
            }
        }
        inputs
    }

    /// Slots whose clients have been silent for longer than `timeout`
    pub fn timed_out(&self, timeout: Duration) -> Vec<usize> {
        self.occupied()
            .filter(|(_, c)| c.is_timed_out(timeout))
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Iterates over occupied slots in index order
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &Connection)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, c)| c.as_ref().map(|c| (slot, c)))
    }

    /// Empties every slot, for shutdown.
    pub fn drain(&mut self) -> Vec<Connection> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    /// Returns the number of occupied slots
    pub fn len(&self) -> usize {
        self.occupied().count()
    }

    /// Returns true if no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
