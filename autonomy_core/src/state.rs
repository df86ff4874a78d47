//! Per-peer view of a character
use alloc::string::String;
use alloc::vec::Vec;

use bevy_math::{Quat, Vec3};
use bevy_transform::components::Transform;
use serde::{Deserialize, Serialize};

use crate::id::{BoneName, NetId, PeerId};
use crate::movement_mode::MovementMode;
use crate::role::NetRole;
use crate::rotator::Rotator;

/// Offset between a peer's local coordinates and the shared zero origin.
///
/// Large worlds shift each peer's origin close to its camera; locations on the
/// wire are always expressed relative to the zero origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldOrigin(pub Vec3);

impl WorldOrigin {
    pub fn to_zero_origin(&self, local: Vec3) -> Vec3 {
        local + self.0
    }

    pub fn to_local(&self, zero_origin: Vec3) -> Vec3 {
        zero_origin - self.0
    }
}

/// Where a character stands, relative to a movement base
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasedMovementInfo {
    pub base: Option<NetId>,
    pub bone: Option<BoneName>,
    /// Location relative to the base (or world location without a base)
    pub location: Vec3,
    /// Rotation relative to the base when `has_relative_rotation`, world rotation otherwise
    pub rotation: Rotator,
    pub has_relative_rotation: bool,
    /// World transform of the base when the character last followed it
    pub last_base_transform: Option<Transform>,
}

impl BasedMovementInfo {
    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }
}

/// An animation-driven displacement applied on top of (or instead of) physics
#[derive(Debug, Clone, PartialEq)]
pub struct RootMotionSource {
    pub name: String,
    /// Replaces physics-driven velocity while active
    pub overrides_velocity: bool,
    pub velocity: Vec3,
    pub remaining: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterState {
    pub id: NetId,
    /// Peer whose input drives this character
    pub owner: PeerId,
    pub local_role: NetRole,
    pub remote_role: NetRole,
    pub replicate_movement: bool,

    pub location: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub acceleration: Vec3,
    pub control_rotation: Rotator,
    pub movement_mode: MovementMode,
    pub crouched: bool,
    pub half_height: f32,
    /// Whether gravity applies when simulating this character as a proxy
    pub gravity_enabled: bool,

    pub based: BasedMovementInfo,
    /// Root motion sources pending on this peer
    pub root_motion_sources: Vec<RootMotionSource>,
    /// Override root motion reported by the owning client
    pub replicated_override_root_motion: bool,
}

impl CharacterState {
    pub const STANDING_HALF_HEIGHT: f32 = 88.0;

    pub fn new(id: NetId, owner: PeerId) -> Self {
        Self {
            id,
            owner,
            local_role: NetRole::None,
            remote_role: NetRole::None,
            replicate_movement: true,
            location: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            acceleration: Vec3::ZERO,
            control_rotation: Rotator::ZERO,
            movement_mode: MovementMode::Walking,
            crouched: false,
            half_height: Self::STANDING_HALF_HEIGHT,
            gravity_enabled: true,
            based: BasedMovementInfo::default(),
            root_motion_sources: Vec::new(),
            replicated_override_root_motion: false,
        }
    }

    pub fn with_roles(mut self, local: NetRole, remote: NetRole) -> Self {
        self.local_role = local;
        self.remote_role = remote;
        self
    }

    pub fn with_location(mut self, location: Vec3) -> Self {
        self.location = location;
        self
    }

    /// The owning client, which simulates and sends its own movement
    pub fn is_locally_controlled(&self) -> bool {
        self.local_role == NetRole::AutonomousProxy
    }

    /// Whether an active root motion source replaces physics on this peer
    pub fn has_override_root_motion(&self) -> bool {
        self.root_motion_sources.iter().any(|s| s.overrides_velocity)
    }

    /// Whether override root motion drives this character, locally or as reported by its owner
    pub fn is_playing_override_root_motion(&self) -> bool {
        self.has_override_root_motion() || self.replicated_override_root_motion
    }

    /// The peer whose snapshots this peer accepts for the character, if any
    pub fn authority_source(&self) -> Option<PeerId> {
        match (self.local_role, self.remote_role) {
            (NetRole::Authority, NetRole::AutonomousProxy) => Some(self.owner),
            (NetRole::SimulatedProxy, _) => Some(PeerId::Server),
            _ => None,
        }
    }

    pub fn rotator(&self) -> Rotator {
        Rotator::from_quat(self.rotation)
    }
}
