//! Performance benchmarks for the per-tick hot paths

use server::mapgen;
use server::physics;
use server::player::{PlayerInput, PlayerState};
use server::session::Session;
use shared::{MapPayload, Packet, SlotPhase, TileMap, MAX_CLIENTS, PACKET_SIZE};
use std::time::Instant;

const DT: f32 = 1.0 / 60.0;

fn full_packet() -> Packet {
    let mut packet = Packet {
        client_count: MAX_CLIENTS as i32,
        recipient_slot: 3,
        ..Packet::default()
    };
    for slot in 0..MAX_CLIENTS {
        packet.phases[slot] = SlotPhase::Playing;
        packet.positions[slot] = (slot as i32 * 137, 250);
        packet.scores[slot] = slot as i32;
        packet.jetpack[slot] = slot % 2 == 0;
    }
    packet
}

/// Benchmarks encoding a full broadcast packet
#[test]
fn benchmark_packet_encode() {
    let packet = full_packet();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes.len(), PACKET_SIZE);
    }

    let duration = start.elapsed();
    println!(
        "Packet encode: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // A tick at 60Hz broadcasts MAX_CLIENTS packets; 10k must fit in 2s
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks decoding, including the welcome packet's map payload
#[test]
fn benchmark_packet_decode() {
    let mut welcome = full_packet();
    welcome.map_payload = MapPayload::new(mapgen::generate_text(7)).unwrap();
    let bytes = welcome.encode().unwrap();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let packet = Packet::decode(&bytes).unwrap();
        assert_eq!(packet.client_count, MAX_CLIENTS as i32);
    }

    let duration = start.elapsed();
    println!(
        "Packet decode: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the physics step for a single player
#[test]
fn benchmark_physics_step() {
    let mut map = mapgen::generate(3).unwrap();
    let start_position = map.start_position(0);
    let mut player = PlayerState::new(start_position);

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        if player.is_terminal() {
            player = PlayerState::new(start_position);
        }
        let input = PlayerInput {
            jetpack_active: i % 3 == 0,
        };
        physics::advance(&mut player, input, &mut map, DT);
    }

    let duration = start.elapsed();
    println!(
        "Physics step: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks full session ticks with every slot racing
#[test]
fn benchmark_full_session_tick() {
    let map: TileMap = mapgen::generate(11).unwrap();
    let mut session = Session::new(map, 2).with_auto_reset(Some(1));
    for slot in 0..MAX_CLIENTS {
        session.join(slot);
    }

    let mut inputs = [PlayerInput::default(); MAX_CLIENTS];
    let ticks = 10_000;
    let start = Instant::now();

    for tick in 0..ticks {
        for (slot, input) in inputs.iter_mut().enumerate() {
            input.jetpack_active = (tick + slot) % 4 == 0;
        }
        session.advance(&inputs, DT);
        for slot in 0..MAX_CLIENTS {
            let _ = session.snapshot(slot).encode().unwrap();
        }
    }

    let duration = start.elapsed();
    println!(
        "Session tick + broadcast: {} ticks in {:?} ({:.2} μs/tick)",
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    assert_eq!(session.tick(), ticks as u64);
    // 10k ticks is close to three minutes of play at 60Hz
    assert!(duration.as_secs() < 10);
}
