//! Participant identity and connection tracking for one match
//!
//! This module handles the server-side bookkeeping of who is in a room:
//! - Identity to connection binding (one live connection per account)
//! - Join, leave and reconnect transitions
//! - Room capacity enforcement
//!
//! The registry never talks to the network. It reports what happened through
//! [`JoinOutcome`] and [`LeaveOutcome`] and leaves the notifications to the
//! owning match.

use log::info;
use shared::ParticipantId;
use std::collections::BTreeMap;

/// Server-assigned identifier of a transport connection
pub type ConnectionId = u32;

/// A registered member of the room
#[derive(Debug, Clone)]
pub struct Participant {
    /// Account identity supplied by the client
    pub id: ParticipantId,
    /// Connection currently bound to this identity
    pub connection: ConnectionId,
    /// False once the bound connection has gone away
    pub online: bool,
}

impl Participant {
    pub fn new(id: ParticipantId, connection: ConnectionId) -> Self {
        Self {
            id,
            connection,
            online: true,
        }
    }
}

/// Result of a join attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Added (or re-bound) before the match started
    Joined {
        /// Previous connection of the same identity, to be terminated
        kicked: Option<ConnectionId>,
        /// True when this join brought the room to capacity
        room_filled: bool,
    },
    /// Existing identity came back while the match is running
    Reconnected { kicked: Option<ConnectionId> },
    /// New identity and no free slot
    RoomFull,
    /// The connection already holds a different identity
    AlreadyJoined { existing: ParticipantId },
}

/// Result of a connection going away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The connection did not own an online participant
    Unknown,
    /// The participant went offline; others remain online
    Departed { id: ParticipantId },
    /// The participant was the last one online
    Emptied { id: ParticipantId },
}

/// Tracks the members of a single room
///
/// Participants are kept in a `BTreeMap` so that the roster is always
/// reported in the same order to every peer.
#[derive(Debug)]
pub struct SessionRegistry {
    participants: BTreeMap<ParticipantId, Participant>,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            participants: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Registers `id` on `connection`.
    ///
    /// `in_progress` tells whether the match has started. Only a returning
    /// identity during a running match counts as a reconnect; before the start
    /// a duplicate identity simply takes over its slot like a fresh join.
    pub fn join(
        &mut self,
        id: &str,
        connection: ConnectionId,
        in_progress: bool,
    ) -> JoinOutcome {
        if let Some(existing) = self.participant_for(connection) {
            if existing != id {
                return JoinOutcome::AlreadyJoined {
                    existing: existing.clone(),
                };
            }
        }

        if let Some(participant) = self.participants.get_mut(id) {
            let kicked = (participant.online && participant.connection != connection)
                .then_some(participant.connection);
            participant.connection = connection;
            participant.online = true;

            if in_progress {
                info!("{} reconnected on connection {}", id, connection);
                return JoinOutcome::Reconnected { kicked };
            }
            info!("{} re-joined on connection {}", id, connection);
            return JoinOutcome::Joined {
                kicked,
                room_filled: false,
            };
        }

        if in_progress || self.is_full() {
            info!("Room is full, {} rejected", id);
            return JoinOutcome::RoomFull;
        }

        self.participants
            .insert(id.to_string(), Participant::new(id.to_string(), connection));
        info!(
            "{} joined on connection {} ({}/{})",
            id,
            connection,
            self.participants.len(),
            self.capacity
        );

        JoinOutcome::Joined {
            kicked: None,
            room_filled: self.is_full(),
        }
    }

    /// Marks the participant owning `connection` offline
    pub fn leave(&mut self, connection: ConnectionId) -> LeaveOutcome {
        let id = match self.participant_for(connection) {
            Some(id) => id.clone(),
            None => return LeaveOutcome::Unknown,
        };

        if let Some(participant) = self.participants.get_mut(&id) {
            participant.online = false;
        }
        info!("{} left the game", id);

        if self.online_count() == 0 {
            LeaveOutcome::Emptied { id }
        } else {
            LeaveOutcome::Departed { id }
        }
    }

    /// Finds the online participant bound to a connection
    pub fn participant_for(&self, connection: ConnectionId) -> Option<&ParticipantId> {
        self.participants
            .values()
            .find(|p| p.online && p.connection == connection)
            .map(|p| &p.id)
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Connections of every online participant, in roster order
    pub fn online_connections(&self) -> Vec<ConnectionId> {
        self.participants
            .values()
            .filter(|p| p.online)
            .map(|p| p.connection)
            .collect()
    }

    /// Identities of every registered participant, online or not
    pub fn roster(&self) -> Vec<ParticipantId> {
        self.participants.keys().cloned().collect()
    }

    pub fn online_count(&self) -> usize {
        self.participants.values().filter(|p| p.online).count()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = SessionRegistry::new(2);
        assert_eq!(registry.capacity(), 2);
        assert!(registry.is_empty());
        assert!(!registry.is_full());
    }

    #[test]
    fn test_join_until_full() {
        let mut registry = SessionRegistry::new(2);

        let first = registry.join("A", 1, false);
        assert_eq!(
            first,
            JoinOutcome::Joined {
                kicked: None,
                room_filled: false
            }
        );

        let second = registry.join("B", 2, false);
        assert_eq!(
            second,
            JoinOutcome::Joined {
                kicked: None,
                room_filled: true
            }
        );
        assert_eq!(registry.roster(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_new_identity_rejected_when_in_progress() {
        let mut registry = SessionRegistry::new(2);
        registry.join("A", 1, false);
        registry.join("B", 2, false);

        assert_eq!(registry.join("C", 3, true), JoinOutcome::RoomFull);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reconnect_while_in_progress_kicks_old_connection() {
        let mut registry = SessionRegistry::new(2);
        registry.join("A", 1, false);
        registry.join("B", 2, false);

        let outcome = registry.join("A", 7, true);
        assert_eq!(outcome, JoinOutcome::Reconnected { kicked: Some(1) });
        assert_eq!(registry.get("A").unwrap().connection, 7);
        assert_eq!(registry.participant_for(1), None);
    }

    #[test]
    fn test_reconnect_after_going_offline() {
        let mut registry = SessionRegistry::new(2);
        registry.join("A", 1, false);
        registry.join("B", 2, false);
        registry.leave(1);
        assert!(!registry.get("A").unwrap().online);

        let outcome = registry.join("A", 9, true);
        assert_eq!(outcome, JoinOutcome::Reconnected { kicked: None });
        assert!(registry.get("A").unwrap().online);
        assert_eq!(registry.online_count(), 2);
    }

    #[test]
    fn test_duplicate_identity_before_start_is_a_fresh_join() {
        let mut registry = SessionRegistry::new(3);
        registry.join("A", 1, false);

        let outcome = registry.join("A", 2, false);
        assert_eq!(
            outcome,
            JoinOutcome::Joined {
                kicked: Some(1),
                room_filled: false
            }
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.online_connections(), vec![2]);
    }

    #[test]
    fn test_connection_cannot_hold_two_identities() {
        let mut registry = SessionRegistry::new(3);
        registry.join("A", 1, false);
        assert_eq!(
            registry.join("B", 1, false),
            JoinOutcome::AlreadyJoined {
                existing: "A".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_leave_departed_then_emptied() {
        let mut registry = SessionRegistry::new(2);
        registry.join("A", 1, false);
        registry.join("B", 2, false);

        assert_eq!(
            registry.leave(1),
            LeaveOutcome::Departed {
                id: "A".to_string()
            }
        );
        assert_eq!(registry.online_connections(), vec![2]);
        assert_eq!(
            registry.leave(2),
            LeaveOutcome::Emptied {
                id: "B".to_string()
            }
        );
    }

    #[test]
    fn test_leave_unknown_connection() {
        let mut registry = SessionRegistry::new(2);
        registry.join("A", 1, false);
        assert_eq!(registry.leave(42), LeaveOutcome::Unknown);
        // Leaving twice is a no-op the second time
        registry.leave(1);
        assert_eq!(registry.leave(1), LeaveOutcome::Unknown);
    }
}
