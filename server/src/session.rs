//! Authoritative session: the live map, every slot's player and the round
//! state machine.
//!
//! A round moves `Waiting -> Playing -> Ended` and only goes back to
//! `Waiting` through [`Session::reset`], which restores the map from the
//! pristine copy so coins consumed in the previous round come back.

use crate::physics::{self, TileEvent};
use crate::player::{PlayerInput, PlayerPhase, PlayerState};
use log::{debug, info};
use shared::{MapPayload, Packet, SlotPhase, TileMap, MAP_PAYLOAD_SIZE, MAX_CLIENTS, MIN_PLAYERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Playing,
    Ended,
}

pub struct Session {
    pristine: TileMap,
    map: TileMap,
    players: [Option<PlayerState>; MAX_CLIENTS],
    phase: Phase,
    winner: Option<usize>,
    min_players: usize,
    reset_after_ticks: Option<u64>,
    tick: u64,
    ended_at: u64,
}

impl Session {
    pub fn new(map: TileMap, min_players: usize) -> Self {
        assert!(
            (MIN_PLAYERS..=MAX_CLIENTS).contains(&min_players),
            "min_players {} out of range",
            min_players
        );
        let map_size = map.to_text().len();
        assert!(
            map_size <= MAP_PAYLOAD_SIZE,
            "map text is {} bytes, the welcome payload holds {}",
            map_size,
            MAP_PAYLOAD_SIZE
        );
        Self {
            map: map.clone(),
            pristine: map,
            players: Default::default(),
            phase: Phase::Waiting,
            winner: None,
            min_players,
            reset_after_ticks: None,
            tick: 0,
            ended_at: 0,
        }
    }

    /// Resets an ended round automatically after `ticks` ticks.
    pub fn with_auto_reset(mut self, ticks: Option<u64>) -> Self {
        self.reset_after_ticks = ticks;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn player(&self, slot: usize) -> Option<&PlayerState> {
        self.players[slot].as_ref()
    }

    pub fn occupied_count(&self) -> usize {
        self.players.iter().flatten().count()
    }

    /// Seats a player in `slot` at the slot's start position. A player that
    /// joins mid-round waits for the next one.
    pub fn join(&mut self, slot: usize) {
        assert!(slot < MAX_CLIENTS, "slot {} out of range", slot);
        assert!(self.players[slot].is_none(), "slot {} already occupied", slot);

        let player = PlayerState::new(self.map.start_position(slot));
        debug!(
            "Slot {} spawned at ({}, {}) during {:?}",
            slot, player.x, player.y, self.phase
        );
        self.players[slot] = Some(player);
    }

    /// Frees `slot`. The end-of-round check runs on the next tick.
    pub fn leave(&mut self, slot: usize) -> Option<PlayerState> {
        assert!(slot < MAX_CLIENTS, "slot {} out of range", slot);
        self.players[slot].take()
    }

    /// Runs one tick: phase checks, physics for every active player, then the
    /// end-of-round check again so a decisive tick ends the round at once.
    pub fn advance(&mut self, inputs: &[PlayerInput; MAX_CLIENTS], dt: f32) {
        self.tick += 1;
        self.update_phase();

        if self.phase == Phase::Playing {
            for (slot, entry) in self.players.iter_mut().enumerate() {
                let Some(player) = entry else { continue };
                if player.phase != PlayerPhase::Playing {
                    continue;
                }
                match physics::advance(player, inputs[slot], &mut self.map, dt) {
                    Some(TileEvent::CoinCollected) => {
                        debug!("Slot {} collected a coin (score {})", slot, player.score)
                    }
                    Some(TileEvent::Electrocuted) => info!("Slot {} was electrocuted", slot),
                    Some(TileEvent::Finished) => {
                        info!("Slot {} finished with score {}", slot, player.score)
                    }
                    None => {}
                }
                if player.is_terminal() {
                    player.phase = PlayerPhase::Ended;
                }
            }
            self.update_phase();
        }
    }

    /// Evaluates the state machine's transition conditions once.
    pub fn update_phase(&mut self) {
        match self.phase {
            Phase::Waiting => {
                if self.occupied_count() >= self.min_players {
                    self.start_round();
                }
            }
            Phase::Playing => {
                if self.round_is_over() {
                    self.end_round();
                }
            }
            Phase::Ended => {
                let expired = self
                    .reset_after_ticks
                    .is_some_and(|ticks| self.tick.saturating_sub(self.ended_at) >= ticks);
                if self.occupied_count() == 0 || expired {
                    self.reset();
                }
            }
        }
    }

    /// Returns to `Waiting` with a fresh copy of the map and every occupied
    /// slot back at its start.
    pub fn reset(&mut self) {
        self.map = self.pristine.clone();
        for (slot, entry) in self.players.iter_mut().enumerate() {
            if entry.is_some() {
                *entry = Some(PlayerState::new(self.map.start_position(slot)));
            }
        }
        self.phase = Phase::Waiting;
        self.winner = None;
        info!("Session reset, waiting for players");
    }

    fn start_round(&mut self) {
        for (slot, entry) in self.players.iter_mut().enumerate() {
            if entry.is_some() {
                let mut player = PlayerState::new(self.map.start_position(slot));
                player.phase = PlayerPhase::Playing;
                *entry = Some(player);
            }
        }
        self.phase = Phase::Playing;
        self.winner = None;
        info!("Round started with {} players", self.occupied_count());
    }

    fn round_is_over(&self) -> bool {
        let participants: Vec<&PlayerState> = self.participants().map(|(_, p)| p).collect();
        let alive = participants.iter().filter(|p| p.alive).count();

        participants.len() < MIN_PLAYERS
            || participants.iter().all(|p| p.is_terminal())
            || alive == 1
    }

    fn end_round(&mut self) {
        self.winner = determine_winner(&self.players);
        for player in self.players.iter_mut().flatten() {
            if player.phase == PlayerPhase::Playing {
                player.phase = PlayerPhase::Ended;
            }
        }
        self.phase = Phase::Ended;
        self.ended_at = self.tick;
        match self.winner {
            Some(slot) => info!("Round over, slot {} wins", slot),
            None => info!("Round over, no winner"),
        }
    }

    /// Slots taking part in the current round.
    fn participants(&self) -> impl Iterator<Item = (usize, &PlayerState)> {
        self.players
            .iter()
            .enumerate()
            .filter_map(|(slot, p)| p.as_ref().map(|p| (slot, p)))
            .filter(|(_, p)| p.phase != PlayerPhase::Waiting)
    }

    /// Builds the per-tick broadcast packet for `recipient`.
    pub fn snapshot(&self, recipient: usize) -> Packet {
        assert!(recipient < MAX_CLIENTS, "slot {} out of range", recipient);
        let mut packet = Packet {
            client_count: self.occupied_count() as i32,
            recipient_slot: recipient as i32,
            ..Packet::default()
        };

        for (slot, entry) in self.players.iter().enumerate() {
            let Some(player) = entry else {
                packet.phases[slot] = SlotPhase::Ended;
                continue;
            };
            packet.phases[slot] = self.slot_phase(slot, player);
            packet.positions[slot] = player.fixed_position();
            packet.scores[slot] = player.score;
            packet.jetpack[slot] = player.jetpack_active;
        }
        packet
    }

    /// Snapshot plus the map text, sent once when a client is seated.
    pub fn welcome(&self, recipient: usize) -> Packet {
        let mut packet = self.snapshot(recipient);
        // Consuming coins never changes the text length checked in `new`.
        packet.map_payload = match MapPayload::new(self.map.to_text()) {
            Ok(payload) => payload,
            Err(e) => panic!("map no longer fits the welcome payload: {}", e),
        };
        packet
    }

    fn slot_phase(&self, slot: usize, player: &PlayerState) -> SlotPhase {
        match (self.phase, player.phase) {
            (_, PlayerPhase::Waiting) => SlotPhase::Waiting,
            (Phase::Playing, PlayerPhase::Playing) => SlotPhase::Playing,
            (Phase::Ended, _) => match self.winner {
                Some(winner) if winner == slot => SlotPhase::Winner,
                Some(_) => SlotPhase::Loser,
                None => SlotPhase::Ended,
            },
            (_, PlayerPhase::Ended) => SlotPhase::Ended,
            (Phase::Waiting, PlayerPhase::Playing) => SlotPhase::Waiting,
        }
    }
}

/// Picks the winner among the slots that took part in a round:
///
/// 1. exactly one alive slot wins outright;
/// 2. otherwise the finished slot with the highest score wins, ties going to
///    the lowest slot index;
/// 3. otherwise there is no winner.
pub fn determine_winner(players: &[Option<PlayerState>]) -> Option<usize> {
    let participants = || {
        players
            .iter()
            .enumerate()
            .filter_map(|(slot, p)| p.as_ref().map(|p| (slot, p)))
            .filter(|(_, p)| p.phase != PlayerPhase::Waiting)
    };

    let mut alive = participants().filter(|(_, p)| p.alive);
    if let (Some((slot, _)), None) = (alive.next(), alive.next()) {
        return Some(slot);
    }

    participants()
        .filter(|(_, p)| p.finished)
        .fold(None, |best: Option<(usize, i32)>, (slot, p)| match best {
            Some((_, score)) if score >= p.score => best,
            _ => Some((slot, p.score)),
        })
        .map(|(slot, _)| slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{from_fixed, Coord};

    const LEVEL: &str = "10 5\n\
                         ##########\n\
                         ..........\n\
                         sS...$...F\n\
                         ##########\n\
                         ..........\n";

    const DT: f32 = 0.01;
    const IDLE: [PlayerInput; MAX_CLIENTS] = [PlayerInput {
        jetpack_active: false,
    }; MAX_CLIENTS];

    fn session() -> Session {
        Session::new(TileMap::load_from_text(LEVEL).unwrap(), 2)
    }

    fn racer(phase: PlayerPhase, alive: bool, finished: bool, score: i32) -> Option<PlayerState> {
        let mut player = PlayerState::new(Coord::default());
        player.phase = phase;
        player.alive = alive;
        player.finished = finished;
        player.score = score;
        Some(player)
    }

    #[test]
    fn test_winner_is_sole_survivor() {
        let players = [
            racer(PlayerPhase::Ended, false, false, 9),
            racer(PlayerPhase::Playing, true, false, 0),
        ];
        assert_eq!(determine_winner(&players), Some(1));
    }

    #[test]
    fn test_winner_highest_finished_score() {
        let players = [
            racer(PlayerPhase::Ended, true, true, 3),
            racer(PlayerPhase::Ended, true, true, 5),
        ];
        assert_eq!(determine_winner(&players), Some(1));
    }

    #[test]
    fn test_winner_tie_goes_to_lowest_slot() {
        let players = [
            racer(PlayerPhase::Ended, true, true, 5),
            racer(PlayerPhase::Ended, true, true, 5),
        ];
        assert_eq!(determine_winner(&players), Some(0));
    }

    #[test]
    fn test_no_winner_without_finish() {
        let players = [
            racer(PlayerPhase::Playing, true, false, 5),
            racer(PlayerPhase::Playing, true, false, 2),
        ];
        assert_eq!(determine_winner(&players), None);

        let all_dead = [
            racer(PlayerPhase::Ended, false, false, 1),
            racer(PlayerPhase::Ended, false, false, 1),
        ];
        assert_eq!(determine_winner(&all_dead), None);
    }

    #[test]
    fn test_winner_ignores_spectators_and_vacant_slots() {
        let players = [
            None,
            racer(PlayerPhase::Ended, false, false, 0),
            racer(PlayerPhase::Waiting, true, false, 0),
            racer(PlayerPhase::Ended, true, true, 1),
        ];
        assert_eq!(determine_winner(&players), Some(3));
    }

    #[test]
    fn test_single_player_keeps_waiting() {
        let mut session = session();
        session.join(0);
        for _ in 0..100 {
            session.advance(&IDLE, DT);
        }
        assert_eq!(session.phase(), Phase::Waiting);
        // Nobody moves while waiting.
        assert_eq!(session.player(0).unwrap().x, 1.0);
    }

    #[test]
    fn test_second_player_starts_round() {
        let mut session = session();
        session.join(0);
        session.update_phase();
        assert_eq!(session.phase(), Phase::Waiting);

        session.join(1);
        session.update_phase();
        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.player(0).unwrap().phase, PlayerPhase::Playing);
        assert_eq!(session.player(1).unwrap().phase, PlayerPhase::Playing);
    }

    #[test]
    fn test_disconnect_ends_round_within_one_tick() {
        let mut session = session();
        session.join(0);
        session.join(1);
        session.advance(&IDLE, DT);
        assert_eq!(session.phase(), Phase::Playing);

        session.leave(1);
        session.advance(&IDLE, DT);
        assert_eq!(session.phase(), Phase::Ended);
        assert_eq!(session.winner(), Some(0));
    }

    #[test]
    fn test_vacated_session_resets() {
        let mut session = session();
        session.join(0);
        session.join(1);
        session.advance(&IDLE, DT);
        session.leave(0);
        session.leave(1);
        session.advance(&IDLE, DT);
        assert_eq!(session.phase(), Phase::Ended);
        assert_eq!(session.winner(), None);

        session.advance(&IDLE, DT);
        assert_eq!(session.phase(), Phase::Waiting);
    }

    #[test]
    fn test_round_plays_to_finish() {
        let mut session = session();
        session.join(0);
        session.join(1);

        for _ in 0..400 {
            session.advance(&IDLE, DT);
            if session.phase() == Phase::Ended {
                break;
            }
        }

        assert_eq!(session.phase(), Phase::Ended);
        let leader = session.player(0).unwrap();
        let follower = session.player(1).unwrap();
        assert!(leader.finished && follower.finished);
        assert_eq!(leader.score, 1);
        assert_eq!(follower.score, 0);
        assert_eq!(session.winner(), Some(0));

        let view = session.snapshot(1);
        assert_eq!(view.phases[0], SlotPhase::Winner);
        assert_eq!(view.phases[1], SlotPhase::Loser);
        assert_eq!(view.scores[0], 1);
    }

    #[test]
    fn test_physics_frozen_after_end() {
        let mut session = session();
        session.join(0);
        session.join(1);
        session.advance(&IDLE, DT);
        session.leave(1);
        session.advance(&IDLE, DT);
        assert_eq!(session.phase(), Phase::Ended);

        let frozen = session.player(0).unwrap().clone();
        for _ in 0..10 {
            session.advance(&IDLE, DT);
        }
        assert_eq!(session.player(0).unwrap(), &frozen);
    }

    #[test]
    fn test_reset_restores_coins() {
        let mut session = session();
        session.join(0);
        session.join(1);
        while session.phase() != Phase::Ended {
            session.advance(&IDLE, DT);
        }
        assert_eq!(session.map().cell_at(5, 2), shared::CellKind::Empty);

        session.reset();
        assert_eq!(session.phase(), Phase::Waiting);
        assert_eq!(session.map().cell_at(5, 2), shared::CellKind::Coin);
        assert_eq!(session.player(0).unwrap().score, 0);
        assert_eq!(session.player(0).unwrap().x, 1.0);
        assert_eq!(session.winner(), None);
    }

    #[test]
    fn test_auto_reset_after_delay() {
        let mut session = session().with_auto_reset(Some(5));
        session.join(0);
        session.join(1);
        session.advance(&IDLE, DT);
        session.leave(1);
        session.advance(&IDLE, DT);
        assert_eq!(session.phase(), Phase::Ended);

        for _ in 0..4 {
            session.advance(&IDLE, DT);
            assert_eq!(session.phase(), Phase::Ended);
        }
        session.advance(&IDLE, DT);
        assert_eq!(session.phase(), Phase::Waiting);
    }

    #[test]
    fn test_late_joiner_waits_for_next_round() {
        let mut session = session();
        session.join(0);
        session.join(1);
        session.advance(&IDLE, DT);

        session.join(2);
        session.advance(&IDLE, DT);
        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.player(2).unwrap().phase, PlayerPhase::Waiting);

        let view = session.snapshot(2);
        assert_eq!(view.phases[2], SlotPhase::Waiting);
        assert_eq!(view.client_count, 3);

        // The spectator does not keep the round alive.
        session.leave(1);
        session.advance(&IDLE, DT);
        assert_eq!(session.phase(), Phase::Ended);
        assert_eq!(session.winner(), Some(0));
    }

    #[test]
    fn test_snapshot_encodes_positions_and_vacancies() {
        let mut session = session();
        session.join(0);
        let view = session.snapshot(0);

        assert_eq!(view.recipient_slot, 0);
        assert_eq!(view.client_count, 1);
        assert_eq!(view.phases[0], SlotPhase::Waiting);
        assert_eq!(view.positions[0], (100, 200));
        assert_eq!(from_fixed(view.positions[0].0), 1.0);
        assert_eq!(view.phases[1], SlotPhase::Ended);
        assert_eq!(view.positions[1], (0, 0));
        assert!(view.map_payload.is_empty());
    }

    #[test]
    fn test_welcome_carries_map() {
        let mut session = session();
        session.join(0);
        let welcome = session.welcome(0);
        assert_eq!(welcome.map_payload.as_str(), LEVEL);
        let parsed = TileMap::load_from_text(welcome.map_payload.as_str()).unwrap();
        assert_eq!(&parsed, session.map());
    }

    #[test]
    fn test_welcome_carries_map_filling_the_payload() {
        let width = 996;
        let mut text = format!("{} 2\nsS{}\n", width, ".".repeat(width - 2));
        text.push_str(&".".repeat(width));
        text.push('\n');
        assert_eq!(text.len(), MAP_PAYLOAD_SIZE);

        let mut session = Session::new(TileMap::load_from_text(&text).unwrap(), 2);
        session.join(0);
        assert_eq!(session.welcome(0).map_payload.as_str(), text);
    }

    #[test]
    #[should_panic]
    fn test_join_out_of_range_slot_panics() {
        session().join(MAX_CLIENTS);
    }

    #[test]
    #[should_panic]
    fn test_join_occupied_slot_panics() {
        let mut session = session();
        session.join(0);
        session.join(0);
    }
}
