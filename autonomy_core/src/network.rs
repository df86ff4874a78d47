use crate::id::NetId;
use crate::snapshot::MoveSnapshot;

/// Connection metrics consulted when choosing how often to send
pub trait ConnectionQuality {
    /// Current throughput estimate, in bytes per second
    fn net_speed(&self) -> f32;
    /// Number of players connected to the session
    fn player_count(&self) -> usize;
}

/// A connection whose metrics never change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedConnection {
    pub net_speed: f32,
    pub player_count: usize,
}

impl Default for FixedConnection {
    fn default() -> Self {
        Self {
            net_speed: 100_000.0,
            player_count: 1,
        }
    }
}

impl ConnectionQuality for FixedConnection {
    fn net_speed(&self) -> f32 {
        self.net_speed
    }

    fn player_count(&self) -> usize {
        self.player_count
    }
}

/// Outbound transport for movement snapshots.
///
/// Delivery is best-effort: a snapshot that cannot be sent is dropped.
pub trait MoveSender {
    fn send_move(&mut self, character: NetId, snapshot: &MoveSnapshot);
}
