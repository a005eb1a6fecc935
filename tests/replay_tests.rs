//! Determinism of reconnect replay, driven in-process without sockets
//!
//! A coordinator match and several participant games exchange packets
//! directly. A participant that drops out and comes back must end up with the
//! same entity positions as one that stayed connected the whole time.

use assert_approx_eq::assert_approx_eq;
use client::config::ClientConfig;
use client::game::{ClientGame, ClientPhase};
use client::input::InputManager;
use server::config::ServerConfig;
use server::game::{packets_for, Match, MatchPhase, Outbound};
use server::session::ConnectionId;
use shared::{Command, Packet, Simulation};
use std::collections::BTreeMap;
use std::time::Duration;

const STEP: Duration = Duration::from_millis(100);
const STEP_SECS: f32 = 0.1;

/// A participant game together with its current connection
struct Seat {
    conn: ConnectionId,
    game: ClientGame,
    bot: InputManager,
}

impl Seat {
    fn new(account_id: &str, conn: ConnectionId, seed: u64) -> Self {
        let config = ClientConfig {
            account_id: account_id.to_string(),
            ..ClientConfig::default()
        };
        Seat {
            conn,
            game: ClientGame::new(&config),
            bot: InputManager::seeded(seed, 5.0),
        }
    }

    fn deliver(&mut self, out: &[Outbound]) {
        for packet in packets_for(out, self.conn) {
            self.game.handle_packet(packet.clone(), 0);
        }
    }

    /// One client loop pass; returns the input packets it produced.
    ///
    /// The bot acts after the drain so its command is flushed with the next
    /// applied step.
    fn tick(&mut self, dt: f32) -> Vec<Packet> {
        let out = self.game.tick(dt);
        if let Some(command) = self.bot.update(dt) {
            let _ = self.game.queue_command(command);
        }
        out
    }
}

fn submit(game: &mut Match, seat: &mut Seat, dt: f32) {
    for packet in seat.tick(dt) {
        if let Packet::Input { frame, ctrl } = packet {
            // Stale input is legitimately dropped
            let _ = game.input(seat.conn, frame, ctrl);
        }
    }
}

fn positions(simulation: &Simulation) -> BTreeMap<String, (f32, f32)> {
    simulation
        .entities()
        .map(|e| (e.id.clone(), (e.x, e.y)))
        .collect()
}

fn new_match() -> Match {
    Match::new("lobby", &ServerConfig::default())
}

#[test]
fn reconnected_participant_converges_with_connected_one() {
    let mut game = new_match();
    let mut a = Seat::new("A", 1, 11);
    let mut b = Seat::new("B", 2, 22);

    let out = game.join(a.conn, "A");
    a.deliver(&out);
    let out = game.join(b.conn, "B");
    a.deliver(&out);
    b.deliver(&out);
    assert_eq!(game.phase(), MatchPhase::Start);
    assert_eq!(a.game.phase(), ClientPhase::Start);

    for _ in 0..30 {
        let out = game.tick(STEP);
        a.deliver(&out);
        b.deliver(&out);
        submit(&mut game, &mut a, STEP_SECS);
        submit(&mut game, &mut b, STEP_SECS);
    }

    // A drops out while the match keeps running
    let out = game.leave(a.conn);
    b.deliver(&out);
    for _ in 0..10 {
        let out = game.tick(STEP);
        b.deliver(&out);
        submit(&mut game, &mut b, STEP_SECS);
    }

    // A comes back on a new connection with a fresh game
    let mut back = Seat::new("A", 3, 33);
    let out = game.join(back.conn, "A");
    back.deliver(&out);
    b.deliver(&out);
    assert_eq!(back.game.phase(), ClientPhase::Start);
    assert!(back.game.is_catching_up());

    for _ in 0..20 {
        let out = game.tick(STEP);
        back.deliver(&out);
        b.deliver(&out);
        submit(&mut game, &mut b, STEP_SECS);
        // Several fast passes per server step while catching up
        for _ in 0..12 {
            submit(&mut game, &mut back, STEP_SECS / 12.0);
        }
    }

    // No more steps: let both drain what they hold
    for _ in 0..200 {
        back.tick(STEP_SECS);
        b.tick(STEP_SECS);
    }

    let frame = game.current_frame();
    assert_eq!(back.game.sync().local_frame(), frame);
    assert_eq!(b.game.sync().local_frame(), frame);
    assert!(!back.game.is_catching_up());
    assert_eq!(
        positions(back.game.simulation()),
        positions(b.game.simulation())
    );
}

#[test]
fn history_replay_matches_server_log() {
    let mut game = new_match();
    game.join(1, "A");
    game.join(2, "B");

    for frame in 0..12u32 {
        let command = if frame % 2 == 0 {
            Command::Right
        } else {
            Command::Down
        };
        game.input(1, frame, vec![command]).unwrap();
        game.tick(STEP);
    }

    // Replaying the server's own history gives the reference result
    let mut reference = Simulation::new(STEP_SECS);
    reference.spawn(&["A".to_string(), "B".to_string()]);
    for step in game.history() {
        reference.apply_step(&step);
    }

    let mut late = Seat::new("A", 9, 0);
    game.leave(1);
    let out = game.join(late.conn, "A");
    late.deliver(&out);

    while late.game.sync().backlog() > 0 {
        late.game.tick(1.0);
    }

    let a = late.game.simulation().entity("A").unwrap();
    let expected = reference.entity("A").unwrap();
    assert_approx_eq!(a.x, expected.x);
    assert_approx_eq!(a.y, expected.y);
    // Alternating right and down, 6 steps each at 10 units
    assert_approx_eq!(a.x, 60.0);
    assert_approx_eq!(a.y, 60.0);
}

#[test]
fn everyone_leaving_resets_the_match() {
    let mut game = new_match();
    game.join(1, "A");
    game.join(2, "B");
    game.tick(STEP);
    assert_eq!(game.current_frame(), 1);

    game.leave(1);
    let out = game.leave(2);
    assert!(out.iter().any(|o| matches!(
        o,
        Outbound::Announce { packet: Packet::System { message }, .. } if message == "game over"
    )));
    assert_eq!(game.phase(), MatchPhase::Wait);
    assert_eq!(game.current_frame(), 0);
    assert!(game.history().is_empty());

    // A new pair starts over from frame 1
    let mut a = Seat::new("A", 3, 1);
    let out = game.join(3, "A");
    a.deliver(&out);
    let out = game.join(4, "B");
    a.deliver(&out);
    let out = game.tick(STEP);
    a.deliver(&out);
    assert_eq!(a.game.sync().server_frame(), 1);
}
