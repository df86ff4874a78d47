//! Contains the types shared by every autonomy crate
//!
//! - [`MoveSnapshot`](snapshot::MoveSnapshot): the unit of movement replication and its wire codec
//! - [`CharacterState`](state::CharacterState): the per-peer view of a character
//! - [`BaseRegistry`](base::BaseRegistry): network-addressable movement bases
//! - the collaborator traits for locomotion, connection quality and the outbound transport

extern crate alloc;

pub mod base;
pub mod config;
pub mod id;
pub mod locomotion;
pub mod movement_mode;
pub mod network;
pub mod role;
pub mod rotator;
pub mod snapshot;
pub mod state;

pub mod prelude {
    pub use crate::base::{BaseRegistry, MovementBase};
    pub use crate::config::{MovementConfig, NetworkSmoothingMode, SendRateConfig, SmoothingConfig};
    pub use crate::id::{BoneName, NetId, PeerId};
    pub use crate::locomotion::{KinematicLocomotion, LocomotionEngine, MoveInput};
    pub use crate::movement_mode::MovementMode;
    pub use crate::network::{ConnectionQuality, FixedConnection, MoveSender};
    pub use crate::role::NetRole;
    pub use crate::rotator::Rotator;
    pub use crate::snapshot::MoveSnapshot;
    pub use crate::state::{BasedMovementInfo, CharacterState, WorldOrigin};
}
