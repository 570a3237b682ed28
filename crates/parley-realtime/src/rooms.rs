//! Room registry: join intent that survives reconnects.
//!
//! Rooms are kept for the lifetime of the registry. Jobs are short-lived and
//! the server stops emitting once they finish, so there is no leave or TTL.
//! A warning is logged once when the registry grows past a threshold.

use std::collections::HashSet;

use parley_core::RoomId;
use tracing::{debug, warn};

/// Set of joined rooms, iterated in first-join order.
#[derive(Debug)]
pub struct RoomRegistry {
    order: Vec<RoomId>,
    members: HashSet<RoomId>,
    warn_threshold: usize,
    warned: bool,
}

impl RoomRegistry {
    /// Empty registry that warns once it holds more than `warn_threshold` rooms.
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            order: Vec::new(),
            members: HashSet::new(),
            warn_threshold,
            warned: false,
        }
    }

    /// Add `room`. Returns `true` when it was not already registered.
    pub fn join(&mut self, room: RoomId) -> bool {
        if !self.members.insert(room.clone()) {
            debug!(room_id = %room, "room already registered");
            return false;
        }
        self.order.push(room);
        if !self.warned && self.order.len() > self.warn_threshold {
            self.warned = true;
            warn!(
                rooms = self.order.len(),
                threshold = self.warn_threshold,
                "room registry is large; rooms are retained for the session lifetime"
            );
        }
        true
    }

    /// Whether `room` is registered.
    pub fn contains(&self, room: &str) -> bool {
        self.members.contains(room)
    }

    /// Registered rooms in first-join order.
    pub fn iter(&self) -> impl Iterator<Item = &RoomId> {
        self.order.iter()
    }

    /// Number of registered rooms.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no room is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
