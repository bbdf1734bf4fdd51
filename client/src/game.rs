//! Client-side picture of the session, rebuilt from every server packet.
//!
//! Nothing here simulates: positions, scores and phases are copied from the
//! latest authoritative packet. The only local mutation is clearing coins
//! from the map copy once a score increment shows someone collected them.
//! The copy goes back to the welcome map whenever a new round starts, since
//! the server restores its coins on reset.

use log::debug;
use shared::{from_fixed, CellKind, MapError, Packet, SlotPhase, TileMap, MAX_CLIENTS};
use std::fmt::Write;

#[derive(Debug, Clone)]
pub struct ClientView {
    slot: usize,
    welcome_map: TileMap,
    map: TileMap,
    latest: Packet,
    updates: u64,
}

impl ClientView {
    /// Builds the view from the welcome packet, which carries the map.
    pub fn new(welcome: Packet) -> Result<Self, MapError> {
        let map = TileMap::load_from_text(welcome.map_payload.as_str())?;
        Ok(Self {
            slot: welcome.slot(),
            welcome_map: map.clone(),
            map,
            latest: welcome,
            updates: 0,
        })
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    /// Number of broadcasts applied since the welcome packet.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn apply(&mut self, packet: Packet) {
        let round_starting = !self.latest.phases.contains(&SlotPhase::Playing)
            && packet.phases.contains(&SlotPhase::Playing);
        if round_starting && self.map != self.welcome_map {
            debug!("New round, restoring collected coins");
            self.map = self.welcome_map.clone();
        }
        for slot in 0..MAX_CLIENTS {
            if packet.scores[slot] > self.latest.scores[slot] {
                let (x, y) = Self::tile_position(&packet, slot);
                let (cell_x, cell_y) = (x.floor() as i32, y.floor() as i32);
                if self.map.cell_at(cell_x, cell_y) == CellKind::Coin {
                    self.map.consume_coin(cell_x, cell_y);
                    debug!("Slot {} took the coin at ({}, {})", slot, cell_x, cell_y);
                }
            }
        }
        self.latest = packet;
        self.updates += 1;
    }

    pub fn position(&self, slot: usize) -> (f32, f32) {
        Self::tile_position(&self.latest, slot)
    }

    pub fn phase(&self, slot: usize) -> SlotPhase {
        self.latest.phases[slot]
    }

    pub fn score(&self, slot: usize) -> i32 {
        self.latest.scores[slot]
    }

    pub fn client_count(&self) -> usize {
        self.latest.client_count as usize
    }

    /// This client's phase once the round it took part in is over: nobody is
    /// racing any more and this slot was not spectating.
    pub fn round_outcome(&self) -> Option<SlotPhase> {
        let own = self.phase(self.slot);
        let racing = self.latest.phases.contains(&SlotPhase::Playing);
        (own != SlotPhase::Waiting && !racing).then_some(own)
    }

    /// One-line summary for logs.
    pub fn status_line(&self) -> String {
        let (x, y) = self.position(self.slot);
        let mut line = format!(
            "slot {} {:?} at ({:.2}, {:.2}) score {} | {} connected",
            self.slot,
            self.phase(self.slot),
            x,
            y,
            self.score(self.slot),
            self.client_count()
        );
        for slot in (0..MAX_CLIENTS).filter(|&s| s != self.slot) {
            if matches!(self.phase(slot), SlotPhase::Playing | SlotPhase::Waiting) {
                let _ = write!(line, " | #{} x={:.1}", slot, self.position(slot).0);
            }
        }
        line
    }

    fn tile_position(packet: &Packet, slot: usize) -> (f32, f32) {
        let (x, y) = packet.positions[slot];
        (from_fixed(x), from_fixed(y))
    }
}
