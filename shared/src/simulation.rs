//! Deterministic per-entity movement, replayed identically on every peer

use crate::command::Direction;
use crate::step::{ParticipantId, Step};
use crate::{BOX_SIZE, ENTITY_SPEED, WORLD_HEIGHT, WORLD_WIDTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Simulated object owned by one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: ParticipantId,
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub speed: f32,
}

impl Entity {
    pub fn new(id: impl Into<ParticipantId>) -> Self {
        Self {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            direction: Direction::Stop,
            speed: ENTITY_SPEED,
        }
    }

    /// Moves the entity one step along its current direction.
    ///
    /// Each axis is checked on its own: a candidate coordinate outside
    /// `[0, max]` is discarded and the entity keeps its old value on that axis.
    pub fn advance(&mut self, dt: f32, max_x: f32, max_y: f32) {
        let (vx, vy) = self.direction.vector();
        let x = self.x + vx * dt * self.speed;
        let y = self.y + vy * dt * self.speed;

        if (0.0..=max_x).contains(&x) {
            self.x = x;
        }
        if (0.0..=max_y).contains(&y) {
            self.y = y;
        }
    }
}

/// Playfield holding one entity per participant of the running match
#[derive(Debug, Clone)]
pub struct Simulation {
    entities: BTreeMap<ParticipantId, Entity>,
    width: f32,
    height: f32,
    size: f32,
    step_dt: f32,
}

impl Simulation {
    /// Creates an empty playfield advancing `step_dt` seconds per step
    pub fn new(step_dt: f32) -> Self {
        Self::with_bounds(WORLD_WIDTH, WORLD_HEIGHT, BOX_SIZE, step_dt)
    }

    pub fn with_bounds(width: f32, height: f32, size: f32, step_dt: f32) -> Self {
        Self {
            entities: BTreeMap::new(),
            width,
            height,
            size,
            step_dt,
        }
    }

    /// Replaces all entities with fresh ones for the given roster
    pub fn spawn(&mut self, players: &[ParticipantId]) {
        self.entities = players
            .iter()
            .map(|id| (id.clone(), Entity::new(id.clone())))
            .collect();
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Applies one committed step.
    ///
    /// Commands for unknown participants are ignored. Within a step the last
    /// command for an entity wins. Entities then advance in id order.
    pub fn apply_step(&mut self, step: &Step) {
        for (id, commands) in &step.ctrls {
            if let Some(entity) = self.entities.get_mut(id) {
                if let Some(last) = commands.last() {
                    entity.direction = last.direction();
                }
            }
        }

        let max_x = self.width - self.size;
        let max_y = self.height - self.size;
        for entity in self.entities.values_mut() {
            entity.advance(self.step_dt, max_x, max_y);
        }
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Entities in their deterministic iteration order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn step_dt(&self) -> f32 {
        self.step_dt
    }
}
