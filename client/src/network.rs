use crate::game::ClientView;
use crate::pilot::Pilot;
use log::{debug, info, warn};
use shared::{MapError, Packet, ProtocolError, SlotPhase, PACKET_SIZE};
use std::io::ErrorKind;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Decoded packets buffered between the reader task and the client loop.
const INCOMING_QUEUE: usize = 64;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection closed by server")]
    Closed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("welcome packet carried an unusable map: {0}")]
    Map(#[from] MapError),
}

/// Reads exactly one packet. Running out of bytes, even mid-packet, means
/// the server closed the connection.
pub async fn read_packet<R>(reader: &mut R) -> Result<Packet, ClientError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; PACKET_SIZE];
    match reader.read_exact(&mut buffer).await {
        Ok(_) => Ok(Packet::decode(&buffer)?),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(ClientError::Closed),
        Err(e) => Err(e.into()),
    }
}

pub struct Client {
    view: ClientView,
    pilot: Box<dyn Pilot + Send>,
    input_interval: Duration,
    writer: OwnedWriteHalf,
    incoming: mpsc::Receiver<Result<Packet, ClientError>>,
    reader_task: JoinHandle<()>,
}

impl Client {
    /// Connects and waits for the welcome packet.
    pub async fn connect(
        server_addr: &str,
        pilot: Box<dyn Pilot + Send>,
        input_interval: Duration,
    ) -> Result<Self, ClientError> {
        info!("Connecting to {}...", server_addr);
        let mut stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;

        let welcome = read_packet(&mut stream).await?;
        let view = ClientView::new(welcome)?;
        info!(
            "Connected! Slot {}, {} clients, {}x{} map",
            view.slot(),
            view.client_count(),
            view.map().width(),
            view.map().height()
        );

        let (mut reader, writer) = stream.into_split();
        let (incoming_tx, incoming) = mpsc::channel(INCOMING_QUEUE);
        // Reads live in their own task because `read_exact` cannot be
        // cancelled halfway without losing bytes.
        let reader_task = tokio::spawn(async move {
            loop {
                let result = read_packet(&mut reader).await;
                let failed = result.is_err();
                if incoming_tx.send(result).await.is_err() || failed {
                    break;
                }
            }
        });

        Ok(Client {
            view,
            pilot,
            input_interval,
            writer,
            incoming,
            reader_task,
        })
    }

    pub fn view(&self) -> &ClientView {
        &self.view
    }

    /// Plays until the next round this client takes part in is over and
    /// returns its final phase.
    pub async fn play_round(&mut self) -> Result<SlotPhase, ClientError> {
        let mut input_interval = interval(self.input_interval);
        input_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Outcome of a round that ended before this call.
        while self.view.round_outcome().is_some() {
            self.step(&mut input_interval).await?;
        }

        loop {
            self.step(&mut input_interval).await?;
            if let Some(outcome) = self.view.round_outcome() {
                info!("Round over: {:?} | {}", outcome, self.view.status_line());
                return Ok(outcome);
            }
        }
    }

    /// Plays round after round until the server closes the connection.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        loop {
            match self.play_round().await {
                Ok(_) => {}
                Err(ClientError::Closed) => {
                    warn!("Disconnected: server closed the connection");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn step(&mut self, input_interval: &mut Interval) -> Result<(), ClientError> {
        tokio::select! {
            received = self.incoming.recv() => {
                let packet = received.unwrap_or(Err(ClientError::Closed))?;
                self.view.apply(packet);
                if self.view.updates() % 60 == 0 {
                    debug!("{}", self.view.status_line());
                }
            }

            _ = input_interval.tick() => self.send_input().await?,
        }
        Ok(())
    }

    async fn send_input(&mut self) -> Result<(), ClientError> {
        let jetpack = self.pilot.jetpack(&self.view);
        let bytes = Packet::input(self.view.slot(), jetpack).encode()?;
        self.writer.write_all(&bytes).await?;
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
