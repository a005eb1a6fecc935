use crate::config::ClientConfig;
use crate::sync::{ClientSyncState, InputBlocked};
use log::{debug, info, warn};
use shared::{Command, DelayEstimator, Packet, ParticipantId, Simulation, MAX_DRAIN_HZ};
use std::collections::{BTreeMap, VecDeque};

const MAX_STATUS_LINES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    /// Connected, not yet accepted into a room
    Init,
    /// Accepted, waiting for the room to fill
    Wait,
    Start,
}

/// Smoothed position of one entity, for rendering only
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayEntity {
    pub id: ParticipantId,
    pub x: f32,
    pub y: f32,
}

/// Participant-side match state: phase machine, step draining and the
/// local copy of the simulation
pub struct ClientGame {
    account_id: String,
    room: Option<String>,
    phase: ClientPhase,
    connection_id: Option<u32>,
    step_interval_ms: u64,

    sync: ClientSyncState,
    simulation: Simulation,
    display: BTreeMap<ParticipantId, (f32, f32)>,
    delay: DelayEstimator,
    status: VecDeque<String>,

    base_drain_hz: u32,
    catch_up_threshold: usize,
    catching_up: bool,
}

impl ClientGame {
    pub fn new(config: &ClientConfig) -> Self {
        let sync = ClientSyncState::with_drain_rate(config.drain_hz);
        let base_drain_hz = sync.drain_rate();
        Self {
            account_id: config.account_id.clone(),
            room: config.room.clone(),
            phase: ClientPhase::Init,
            connection_id: None,
            step_interval_ms: 0,
            sync,
            simulation: Simulation::new(config.step_dt()),
            display: BTreeMap::new(),
            delay: DelayEstimator::default(),
            status: VecDeque::new(),
            base_drain_hz,
            catch_up_threshold: config.catch_up_threshold,
            catching_up: false,
        }
    }

    /// Handles one packet from the server; returns packets to send back
    pub fn handle_packet(&mut self, packet: Packet, now_millis: u64) -> Vec<Packet> {
        match packet {
            Packet::Open {
                connection_id,
                step_interval_ms,
            } => {
                info!(
                    "Connected as #{} (server step {}ms)",
                    connection_id, step_interval_ms
                );
                self.connection_id = Some(connection_id);
                self.step_interval_ms = step_interval_ms;
                return vec![Packet::Join {
                    account_id: self.account_id.clone(),
                    room: self.room.clone(),
                }];
            }

            Packet::JoinResult { result, message } => {
                if result {
                    if self.phase == ClientPhase::Init {
                        self.set_phase(ClientPhase::Wait);
                    }
                } else {
                    warn!("Join refused: {}", message);
                }
                self.push_status(message);
            }

            Packet::Start { players } => {
                self.start(&players);
            }

            Packet::System { message } => {
                info!("Server: {}", message);
                self.push_status(message);
            }

            Packet::Steps { steps } => {
                if self.phase != ClientPhase::Start {
                    debug!("Ignoring {} steps before match start", steps.len());
                    return Vec::new();
                }
                self.sync.on_receive(steps);
                self.update_drain_rate();
            }

            Packet::TimeSyncReply { client, .. } => {
                let sample = self.delay.record_echo(client, now_millis);
                debug!(
                    "Delay sample {}ms, average {}ms",
                    sample,
                    self.delay.average_millis()
                );
            }

            other => {
                warn!("Unexpected {} packet from server", other.kind());
            }
        }
        Vec::new()
    }

    fn start(&mut self, players: &[ParticipantId]) {
        self.sync.reset();
        self.simulation.spawn(players);
        self.display = self
            .simulation
            .entities()
            .map(|e| (e.id.clone(), (e.x, e.y)))
            .collect();
        self.catching_up = false;
        self.sync.set_drain_rate(self.base_drain_hz);
        self.set_phase(ClientPhase::Start);
        self.push_status("game start");
    }

    /// Advances the logical clock by `dt` seconds.
    ///
    /// Applies at most one step; returns the input packet flushed after it.
    pub fn tick(&mut self, dt: f32) -> Vec<Packet> {
        if self.phase != ClientPhase::Start {
            return Vec::new();
        }

        let mut out = Vec::new();
        if let Some(step) = self.sync.poll_drain(dt) {
            self.simulation.apply_step(&step);
            self.sync.advance_local_frame();
            if let Some(packet) = self.sync.flush_outgoing() {
                out.push(packet);
            }
            self.update_drain_rate();
        }
        out
    }

    /// Raises the drain rate while a backlog piles up and restores the base
    /// rate once it is drained
    fn update_drain_rate(&mut self) {
        let backlog = self.sync.backlog();
        if !self.catching_up && backlog > self.catch_up_threshold {
            info!("Catching up on {} buffered steps", backlog);
            self.catching_up = true;
            self.sync.set_drain_rate(MAX_DRAIN_HZ);
        } else if self.catching_up && backlog <= 1 {
            info!("Caught up at frame {}", self.sync.local_frame());
            self.catching_up = false;
            self.sync.set_drain_rate(self.base_drain_hz);
        }
    }

    /// Queues a command for the next flush, refusing it while the local
    /// simulation lags the server
    pub fn queue_command(&mut self, command: Command) -> Result<(), InputBlocked> {
        match self.sync.queue_command(command) {
            Ok(()) => Ok(()),
            Err(blocked) => {
                debug!("{}", blocked);
                self.push_status("input blocked");
                Err(blocked)
            }
        }
    }

    /// Moves display positions toward the logical ones by `dt * speed`,
    /// clamped to 1. Reads the simulation and never writes to it.
    pub fn update_display(&mut self, dt: f32) {
        for entity in self.simulation.entities() {
            let factor = (dt * entity.speed).clamp(0.0, 1.0);
            let (x, y) = self
                .display
                .entry(entity.id.clone())
                .or_insert((entity.x, entity.y));
            *x += (entity.x - *x) * factor;
            *y += (entity.y - *y) * factor;
        }
    }

    pub fn display_entities(&self) -> Vec<DisplayEntity> {
        self.display
            .iter()
            .map(|(id, (x, y))| DisplayEntity {
                id: id.clone(),
                x: *x,
                y: *y,
            })
            .collect()
    }

    pub fn time_sync_packet(now_millis: u64) -> Packet {
        Packet::TimeSync { client: now_millis }
    }

    fn set_phase(&mut self, phase: ClientPhase) {
        if self.phase != phase {
            info!("Phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn push_status(&mut self, line: impl Into<String>) {
        if self.status.len() == MAX_STATUS_LINES {
            self.status.pop_front();
        }
        self.status.push_back(line.into());
    }

    /// Takes all status lines recorded since the last call
    pub fn drain_status(&mut self) -> Vec<String> {
        self.status.drain(..).collect()
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn connection_id(&self) -> Option<u32> {
        self.connection_id
    }

    pub fn step_interval_ms(&self) -> u64 {
        self.step_interval_ms
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn sync(&self) -> &ClientSyncState {
        &self.sync
    }

    pub fn average_delay_ms(&self) -> u64 {
        self.delay.average_millis()
    }

    pub fn is_catching_up(&self) -> bool {
        self.catching_up
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::Step;

    fn started_game(players: &[&str]) -> ClientGame {
        let mut game = ClientGame::new(&ClientConfig {
            account_id: "A".to_string(),
            ..ClientConfig::default()
        });
        game.handle_packet(
            Packet::JoinResult {
                result: true,
                message: "matching...".to_string(),
            },
            0,
        );
        game.handle_packet(
            Packet::Start {
                players: players.iter().map(|p| p.to_string()).collect(),
            },
            0,
        );
        game
    }

    fn step(frame: u32, id: &str, commands: &[Command]) -> Step {
        let mut ctrls = BTreeMap::new();
        ctrls.insert(id.to_string(), commands.to_vec());
        Step::new(frame, ctrls)
    }

    #[test]
    fn test_open_answers_with_join() {
        let mut game = ClientGame::new(&ClientConfig {
            account_id: "A".to_string(),
            room: Some("red".to_string()),
            ..ClientConfig::default()
        });
        let out = game.handle_packet(
            Packet::Open {
                connection_id: 3,
                step_interval_ms: 100,
            },
            0,
        );
        assert_eq!(
            out,
            vec![Packet::Join {
                account_id: "A".to_string(),
                room: Some("red".to_string())
            }]
        );
        assert_eq!(game.connection_id(), Some(3));
        assert_eq!(game.phase(), ClientPhase::Init);
    }

    #[test]
    fn test_phase_transitions() {
        let mut game = ClientGame::new(&ClientConfig::default());
        game.handle_packet(
            Packet::JoinResult {
                result: false,
                message: "room is full".to_string(),
            },
            0,
        );
        assert_eq!(game.phase(), ClientPhase::Init);

        game.handle_packet(
            Packet::JoinResult {
                result: true,
                message: "matching...".to_string(),
            },
            0,
        );
        assert_eq!(game.phase(), ClientPhase::Wait);

        game.handle_packet(
            Packet::Start {
                players: vec!["A".to_string(), "B".to_string()],
            },
            0,
        );
        assert_eq!(game.phase(), ClientPhase::Start);
        assert_eq!(game.simulation().len(), 2);
        assert_eq!(
            game.drain_status(),
            vec!["room is full", "matching...", "game start"]
        );
    }

    #[test]
    fn test_steps_ignored_before_start() {
        let mut game = ClientGame::new(&ClientConfig::default());
        game.handle_packet(
            Packet::Steps {
                steps: vec![Step::empty(1)],
            },
            0,
        );
        assert_eq!(game.sync().backlog(), 0);
    }

    #[test]
    fn test_tick_applies_step_and_flushes_input() {
        let mut game = started_game(&["A", "B"]);
        game.queue_command(Command::Right).unwrap();
        game.handle_packet(
            Packet::Steps {
                steps: vec![step(1, "A", &[Command::Right])],
            },
            0,
        );
        assert!(game.queue_command(Command::Down).is_err());

        let out = game.tick(0.1);
        assert_eq!(
            out,
            vec![Packet::Input {
                frame: 1,
                ctrl: vec![Command::Right]
            }]
        );
        assert_eq!(game.sync().local_frame(), 1);
        let a = game.simulation().entity("A").unwrap();
        assert_approx_eq!(a.x, 10.0);
        assert_approx_eq!(a.y, 0.0);
    }

    #[test]
    fn test_catch_up_raises_and_restores_drain_rate() {
        let mut game = started_game(&["A"]);
        let history: Vec<Step> = (1..=10).map(Step::empty).collect();
        game.handle_packet(Packet::Steps { steps: history }, 0);

        assert!(game.is_catching_up());
        assert_eq!(game.sync().drain_rate(), MAX_DRAIN_HZ);

        let mut ticks = 0;
        while game.sync().local_frame() < 10 && ticks < 100 {
            game.tick(1.0 / MAX_DRAIN_HZ as f32 + 0.001);
            ticks += 1;
        }
        assert_eq!(game.sync().local_frame(), 10);
        assert!(!game.is_catching_up());
        assert_eq!(game.sync().drain_rate(), 10);
    }

    #[test]
    fn test_restart_resets_frames() {
        let mut game = started_game(&["A", "B"]);
        game.handle_packet(
            Packet::Steps {
                steps: vec![Step::empty(1), Step::empty(2)],
            },
            0,
        );
        game.tick(0.1);
        game.handle_packet(
            Packet::Start {
                players: vec!["A".to_string(), "B".to_string()],
            },
            0,
        );
        assert_eq!(game.sync().local_frame(), 0);
        assert_eq!(game.sync().server_frame(), 0);
        game.handle_packet(
            Packet::Steps {
                steps: vec![Step::empty(1)],
            },
            0,
        );
        assert_eq!(game.sync().backlog(), 1);
    }

    #[test]
    fn test_display_follows_without_touching_simulation() {
        let mut game = started_game(&["A"]);
        game.handle_packet(
            Packet::Steps {
                steps: vec![step(1, "A", &[Command::Down])],
            },
            0,
        );
        game.tick(0.1);
        let logical = game.simulation().entity("A").unwrap().y;
        assert_approx_eq!(logical, 10.0);

        // Speed 100: 5 ms closes half the gap
        game.update_display(0.005);
        let shown = game.display_entities();
        assert_approx_eq!(shown[0].y, 5.0);
        assert_approx_eq!(game.simulation().entity("A").unwrap().y, logical);

        // A regular 16 ms frame saturates the factor and snaps
        game.update_display(0.016);
        assert_approx_eq!(game.display_entities()[0].y, 10.0);
    }

    #[test]
    fn test_time_sync_reply_feeds_estimator() {
        let mut game = ClientGame::new(&ClientConfig::default());
        assert_eq!(
            ClientGame::time_sync_packet(1_000),
            Packet::TimeSync { client: 1_000 }
        );
        game.handle_packet(
            Packet::TimeSyncReply {
                client: 1_000,
                server: 1_020,
            },
            1_040,
        );
        game.handle_packet(
            Packet::TimeSyncReply {
                client: 1_100,
                server: 1_120,
            },
            1_160,
        );
        assert_eq!(game.average_delay_ms(), 50);
    }
}
