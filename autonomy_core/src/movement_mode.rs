use serde::{Deserialize, Serialize};

/// Locomotion mode of a character.
///
/// Packs into a single byte: the low nibble holds the mode, the high nibble
/// the custom sub-mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementMode {
    /// Movement is disabled
    None,
    #[default]
    Walking,
    /// Walking along a navigation mesh instead of colliding with the floor
    NavWalking,
    Falling,
    Swimming,
    Flying,
    Custom(u8),
}

impl MovementMode {
    pub fn pack(self) -> u8 {
        match self {
            MovementMode::None => 0,
            MovementMode::Walking => 1,
            MovementMode::NavWalking => 2,
            MovementMode::Falling => 3,
            MovementMode::Swimming => 4,
            MovementMode::Flying => 5,
            MovementMode::Custom(sub) => 6 | ((sub & 0x0f) << 4),
        }
    }

    /// Unknown modes unpack as [`MovementMode::None`]
    pub fn unpack(packed: u8) -> Self {
        match packed & 0x0f {
            1 => MovementMode::Walking,
            2 => MovementMode::NavWalking,
            3 => MovementMode::Falling,
            4 => MovementMode::Swimming,
            5 => MovementMode::Flying,
            6 => MovementMode::Custom(packed >> 4),
            _ => MovementMode::None,
        }
    }

    pub fn is_moving_on_ground(self) -> bool {
        matches!(self, MovementMode::Walking | MovementMode::NavWalking)
    }
}
