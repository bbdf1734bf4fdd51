//! Server network layer: TCP accept loop, per-connection socket tasks and the
//! fixed-interval game tick

use crate::config::ServerConfig;
use crate::player::PlayerInput;
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};
use crate::session::Session;
use log::{debug, error, info, warn};
use shared::{Packet, TileMap, PACKET_SIZE};
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval, MissedTickBehavior};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Packets a slow client may have queued before newer ones are skipped.
const OUTBOUND_QUEUE: usize = 8;

/// Messages sent from socket tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        conn_id: ConnectionId,
        packet: Packet,
    },
    ConnectionLost {
        conn_id: ConnectionId,
        reason: String,
    },
}

/// Main server owning the session and every connection
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    session: Session,
    registry: ConnectionRegistry,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Validates `config`, loads its map and binds the listening socket.
    /// A map that fails to load is fatal: nothing is bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, BoxError> {
        config.validate()?;
        let map = config.map.load()?;
        Self::with_map(config, map).await
    }

    /// Binds with an already loaded map, ignoring `config.map`.
    pub async fn with_map(config: ServerConfig, map: TileMap) -> Result<Self, BoxError> {
        config.validate()?;
        let listener = TcpListener::bind(&config.address).await?;
        info!(
            "Server listening on {} with a {}x{} map, tick {:?}",
            listener.local_addr()?,
            map.width(),
            map.height(),
            config.tick_interval
        );

        let session =
            Session::new(map, config.min_players).with_auto_reset(config.restart_after_ticks());
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            config,
            session,
            registry: ConnectionRegistry::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs until Ctrl-C.
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Main server loop; returns once `shutdown` completes, closing every
    /// connection without a farewell packet.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), BoxError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut tick_interval = interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let dt = self.config.tick_interval.as_secs_f32();

        info!("Server started successfully");

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }

                // Inputs received before a tick fires are applied by that tick
                message = self.server_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => break,
                    }
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.handle_accept(stream, addr),
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                _ = tick_interval.tick() => self.tick(dt),
            }
        }

        let connections = self.registry.drain();
        info!("Closing {} connections", connections.len());
        drop(connections);
        Ok(())
    }

    /// Seats a new connection and queues its welcome packet. When every slot
    /// is taken the stream is dropped, which closes it after the handshake.
    fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        let conn_id = self.registry.next_id();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);

        let slot = match self.registry.accept(Connection::new(conn_id, addr, outbound_tx)) {
            Ok(slot) => slot,
            Err(e) => {
                warn!("Rejecting {}: {}", addr, e);
                return;
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }
        let (reader, writer) = stream.into_split();
        let read_task = tokio::spawn(read_packets(conn_id, reader, self.server_tx.clone()));
        let write_task = tokio::spawn(write_packets(
            conn_id,
            writer,
            outbound_rx,
            self.server_tx.clone(),
        ));
        if let Some(connection) = self.registry.get_mut(slot) {
            connection.attach(read_task.abort_handle());
            connection.attach(write_task.abort_handle());
        }

        self.session.join(slot);
        let welcome = self.session.welcome(slot);
        self.send(slot, &welcome);
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::PacketReceived { conn_id, packet } => {
                let Some(slot) = self.registry.slot_of(conn_id) else {
                    debug!("Dropping packet from stale connection {}", conn_id);
                    return;
                };
                let input = PlayerInput {
                    jetpack_active: packet.jetpack_intent(slot),
                };
                self.registry.record_input(slot, input);
            }
            ServerMessage::ConnectionLost { conn_id, reason } => {
                if let Some(slot) = self.registry.slot_of(conn_id) {
                    self.disconnect(slot, &reason);
                }
            }
        }
    }

    /// Releases `slot` and closes its socket. Other slots notice on the next
    /// broadcast.
    fn disconnect(&mut self, slot: usize, reason: &str) {
        if let Some(connection) = self.registry.release(slot) {
            info!(
                "Slot {} ({}) disconnected: {}",
                slot, connection.addr, reason
            );
        }
        self.session.leave(slot);
    }

    /// Idle checks, one physics step, then one packet per seated client.
    fn tick(&mut self, dt: f32) {
        for slot in self.registry.timed_out(self.config.client_timeout) {
            self.disconnect(slot, "timed out");
        }

        self.session.advance(&self.registry.inputs(), dt);

        let slots: Vec<usize> = self.registry.occupied().map(|(slot, _)| slot).collect();
        for slot in slots {
            let packet = self.session.snapshot(slot);
            self.send(slot, &packet);
        }

        let ticks_per_second = (1.0 / dt).round().max(1.0) as u64;
        if self.session.tick() % ticks_per_second == 0 && !self.registry.is_empty() {
            debug!(
                "Tick {}: {} clients, phase {:?}",
                self.session.tick(),
                self.registry.len(),
                self.session.phase()
            );
        }
    }

    /// Queues `packet` for `slot` without waiting on the socket.
    fn send(&mut self, slot: usize, packet: &Packet) {
        let bytes = match packet.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode packet for slot {}: {}", slot, e);
                return;
            }
        };

        let Some(connection) = self.registry.get(slot) else {
            return;
        };
        match connection.outbound.try_send(bytes) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("Slot {} is falling behind, skipping a packet", slot)
            }
            Err(TrySendError::Closed(_)) => self.disconnect(slot, "writer stopped"),
        }
    }
}

/// Reads whole packets until the peer goes away or breaks the protocol.
/// A short read is a protocol violation like any other.
async fn read_packets(
    conn_id: ConnectionId,
    mut reader: OwnedReadHalf,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let mut buffer = vec![0u8; PACKET_SIZE];

    let reason = loop {
        match reader.read_exact(&mut buffer).await {
            Ok(_) => match Packet::decode(&buffer) {
                Ok(packet) => {
                    if server_tx
                        .send(ServerMessage::PacketReceived { conn_id, packet })
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => {
                    warn!("Protocol violation on connection {}: {}", conn_id, e);
                    break format!("protocol violation: {}", e);
                }
            },
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                break "connection closed by peer".to_string()
            }
            Err(e) => break format!("read failed: {}", e),
        }
    };

    let _ = server_tx.send(ServerMessage::ConnectionLost { conn_id, reason });
}

/// Drains the connection's queue; `write_all` resumes partial writes so
/// packets always leave whole.
async fn write_packets(
    conn_id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    while let Some(bytes) = outbound_rx.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            let _ = server_tx.send(ServerMessage::ConnectionLost {
                conn_id,
                reason: format!("write failed: {}", e),
            });
            return;
        }
    }
}
