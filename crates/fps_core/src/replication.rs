//! Authority/replication contract.
//!
//! Each participant runs its own [`Simulation`](crate::simulation::Simulation).
//! The authority is the only one whose `health`, `alive`, `clip` and
//! `spread_seed` are canonical; it drains the fields that changed into a
//! [`ReplicationFrame`] which the host ships over whatever transport it
//! likes. Observers apply frames and never overwrite entities they are
//! authoritative for. Everything else (input flags, cadence accumulators,
//! aim blend) is simulated independently per participant.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed};

/// Value cell that remembers whether it changed since the last send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replicated<T> {
    value: T,
    dirty: bool,
}

impl<T: Clone + PartialEq> Replicated<T> {
    /// New cell; starts dirty so the initial value reaches observers.
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self { value, dirty: true }
    }

    /// Current value.
    #[must_use]
    pub const fn get(&self) -> &T {
        &self.value
    }

    /// Local write; marks the cell dirty if the value changed.
    pub fn set(&mut self, value: T) {
        if self.value != value {
            self.value = value;
            self.dirty = true;
        }
    }

    /// Write pushed from the authority; never marks the cell dirty.
    pub fn receive(&mut self, value: T) {
        self.value = value;
        self.dirty = false;
    }

    /// Whether the value changed since the last [`take_dirty`](Self::take_dirty).
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return the value if it changed, clearing the flag.
    pub fn take_dirty(&mut self) -> Option<T> {
        if self.dirty {
            self.dirty = false;
            Some(self.value.clone())
        } else {
            None
        }
    }
}

impl<T: Copy> Replicated<T> {
    /// Current value, copied.
    #[must_use]
    pub const fn value(&self) -> T {
        self.value
    }
}

/// One replicated field's new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldUpdate {
    /// Character health.
    Health(#[serde(with = "fixed_serde")] Fixed),
    /// Character liveness.
    Alive(bool),
    /// Gun clip count.
    Clip(u32),
    /// Gun hipfire spread seed.
    SpreadSeed(u32),
}

/// A field update addressed to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationUpdate {
    /// Entity the field belongs to.
    pub entity: EntityId,
    /// New value.
    pub field: FieldUpdate,
}

/// Broadcast every observer runs as a call rather than a field write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Multicast {
    /// Run the kill transition so every observer reaches the same terminal
    /// state whatever its local health says.
    Kill {
        /// Character to kill.
        character: EntityId,
    },
}

/// Replication frame format version for compatibility.
pub const FRAME_VERSION: u32 = 1;

/// Everything the authority pushes after one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationFrame {
    /// Frame format version.
    pub version: u32,
    /// Authority tick the frame was collected on.
    pub tick: u64,
    /// Field updates, in entity order.
    pub updates: Vec<ReplicationUpdate>,
    /// Broadcast calls, in emission order.
    pub multicasts: Vec<Multicast>,
}

impl ReplicationFrame {
    /// Empty frame for `tick`.
    #[must_use]
    pub const fn new(tick: u64) -> Self {
        Self {
            version: FRAME_VERSION,
            tick,
            updates: Vec::new(),
            multicasts: Vec::new(),
        }
    }

    /// Whether the frame carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.multicasts.is_empty()
    }

    /// Encode for transport.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Replication(format!("Failed to encode frame: {e}")))
    }

    /// Decode a frame received from the authority.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let frame: Self = bincode::deserialize(bytes)
            .map_err(|e| GameError::Replication(format!("Failed to decode frame: {e}")))?;
        if frame.version != FRAME_VERSION {
            return Err(GameError::Replication(format!(
                "Frame version mismatch: expected {}, got {}",
                FRAME_VERSION, frame.version
            )));
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replicated_starts_dirty() {
        let mut cell = Replicated::new(30u32);
        assert!(cell.is_dirty());
        assert_eq!(cell.take_dirty(), Some(30));
        assert_eq!(cell.take_dirty(), None);
    }

    #[test]
    fn test_set_same_value_stays_clean() {
        let mut cell = Replicated::new(true);
        cell.take_dirty();
        cell.set(true);
        assert!(!cell.is_dirty());
        cell.set(false);
        assert!(cell.is_dirty());
    }

    #[test]
    fn test_receive_never_dirties() {
        let mut cell = Replicated::new(5u32);
        cell.receive(9);
        assert_eq!(cell.value(), 9);
        assert!(!cell.is_dirty());
    }

    #[test]
    fn test_frame_encode_decode() {
        let mut frame = ReplicationFrame::new(12);
        frame.updates.push(ReplicationUpdate {
            entity: 1,
            field: FieldUpdate::Health(Fixed::from_num(42.5)),
        });
        frame.multicasts.push(Multicast::Kill { character: 2 });

        let bytes = frame.encode().unwrap();
        assert_eq!(ReplicationFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = ReplicationFrame::decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, GameError::Replication(_)));
    }

    #[test]
    fn test_decode_rejects_version_mismatch() {
        let mut frame = ReplicationFrame::new(0);
        frame.version = FRAME_VERSION + 1;
        let bytes = frame.encode().unwrap();
        assert!(ReplicationFrame::decode(&bytes).is_err());
    }
}
