//! Registry of movement bases (platforms a character can stand on).
//!
//! Bases are looked up by [`NetId`]. A lookup for an id that was never
//! registered, or was removed, returns `None` and callers treat the character
//! as having no base.
use bevy_math::{Quat, Vec3};
use bevy_platform::collections::{HashMap, HashSet};
use bevy_transform::components::Transform;
use tracing::{debug, trace};

use crate::id::{BoneName, NetId, PeerId};
use crate::rotator::Rotator;
use crate::state::{BasedMovementInfo, CharacterState};

#[derive(Debug, Clone, PartialEq)]
pub struct MovementBase {
    /// World transform of the base
    pub transform: Transform,
    /// Bone transforms, relative to the base
    pub bones: HashMap<BoneName, Transform>,
    /// Peer that simulates this base
    pub authority: Option<PeerId>,
    /// Whether the base can be addressed over the network
    pub replicated: bool,
    /// Characters on a movable base store their location relative to it
    pub movable: bool,
    /// World-space velocity, used to advance the base each tick
    pub linear_velocity: Vec3,
    /// Rotation speed around the vertical axis, in radians per second
    pub angular_speed: f32,
}

impl MovementBase {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            bones: HashMap::default(),
            authority: Some(PeerId::Server),
            replicated: true,
            movable: true,
            linear_velocity: Vec3::ZERO,
            angular_speed: 0.0,
        }
    }

    pub fn with_bone(mut self, bone: BoneName, transform: Transform) -> Self {
        self.bones.insert(bone, transform);
        self
    }

    pub fn with_authority(mut self, authority: Option<PeerId>) -> Self {
        self.authority = authority;
        self
    }

    pub fn with_motion(mut self, linear_velocity: Vec3, angular_speed: f32) -> Self {
        self.linear_velocity = linear_velocity;
        self.angular_speed = angular_speed;
        self
    }

    /// World transform of the base, or of one of its bones.
    ///
    /// Unknown bones fall back to the base itself.
    pub fn world_transform(&self, bone: Option<&BoneName>) -> Transform {
        match bone.and_then(|b| self.bones.get(b)) {
            Some(local) => self.transform * *local,
            None => self.transform,
        }
    }
}

/// Applies the rotation and translation of `transform` to `point`, ignoring scale
pub fn transform_position_no_scale(transform: &Transform, point: Vec3) -> Vec3 {
    transform.rotation * point + transform.translation
}

/// Inverse of [`transform_position_no_scale`]
pub fn inverse_transform_position_no_scale(transform: &Transform, point: Vec3) -> Vec3 {
    transform.rotation.inverse() * (point - transform.translation)
}

#[derive(Debug, Default)]
pub struct BaseRegistry {
    bases: HashMap<NetId, MovementBase>,
    /// Characters currently attached to each base
    attached: HashMap<NetId, HashSet<NetId>>,
}

impl BaseRegistry {
    pub fn insert(&mut self, id: NetId, base: MovementBase) {
        self.bases.insert(id, base);
    }

    pub fn remove(&mut self, id: NetId) -> Option<MovementBase> {
        self.attached.remove(&id);
        self.bases.remove(&id)
    }

    pub fn get(&self, id: NetId) -> Option<&MovementBase> {
        self.bases.get(&id)
    }

    pub fn get_mut(&mut self, id: NetId) -> Option<&mut MovementBase> {
        self.bases.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NetId, &MovementBase)> {
        self.bases.iter()
    }

    /// Whether characters on this base store their location relative to it
    pub fn uses_relative_location(&self, id: Option<NetId>) -> bool {
        id.and_then(|id| self.get(id)).is_some_and(|b| b.movable)
    }

    /// Whether `sender` may reference this base in its snapshots.
    ///
    /// The base must be network-addressable and simulated by a peer other
    /// than the sender.
    pub fn is_replicable_by(&self, id: NetId, sender: PeerId) -> bool {
        self.get(id).is_some_and(|b| {
            b.replicated && b.authority.is_some_and(|authority| authority != sender)
        })
    }

    /// World transform of a base (or one of its bones); `None` if the id does not resolve
    pub fn base_world_transform(&self, id: NetId, bone: Option<&BoneName>) -> Option<Transform> {
        self.get(id).map(|b| b.world_transform(bone))
    }

    /// Track `character` as standing on `base`, detaching it from any previous base.
    ///
    /// Returns the base id if it resolves; an unresolved base leaves the
    /// character without a base.
    pub fn attach_to_base(&mut self, character: NetId, base: Option<NetId>) -> Option<NetId> {
        self.attached.values_mut().for_each(|set| {
            set.remove(&character);
        });
        let resolved = base.filter(|id| self.bases.contains_key(id));
        match (base, resolved) {
            (Some(id), None) => debug!(?character, base = ?id, "movement base does not resolve"),
            (_, Some(id)) => {
                trace!(?character, base = ?id, "attached to movement base");
                self.attached.entry(id).or_default().insert(character);
            }
            _ => {}
        }
        resolved
    }

    pub fn attached_to(&self, base: NetId) -> impl Iterator<Item = &NetId> {
        self.attached.get(&base).into_iter().flatten()
    }

    /// Stand `state` on `base`, or take it off any base with `None`
    pub fn set_base(
        &mut self,
        state: &mut CharacterState,
        base: Option<NetId>,
        bone: Option<BoneName>,
        has_relative_rotation: bool,
    ) {
        let resolved = self.attach_to_base(state.id, base);
        state.based = BasedMovementInfo {
            base: resolved,
            bone: resolved.and(bone),
            has_relative_rotation,
            ..Default::default()
        };
        self.save_base_location(state);
    }

    /// Carry `state` along with the movement of its base since the last save.
    ///
    /// A base that stopped resolving detaches the character.
    pub fn follow_base(&self, state: &mut CharacterState) {
        let Some(id) = state.based.base else {
            return;
        };
        let Some(current) = self.base_world_transform(id, state.based.bone.as_ref()) else {
            debug!(character = ?state.id, base = ?id, "movement base vanished");
            state.based = BasedMovementInfo::default();
            return;
        };
        let Some(previous) = state.based.last_base_transform else {
            return;
        };
        let local = inverse_transform_position_no_scale(&previous, state.location);
        state.location = transform_position_no_scale(&current, local);
        if state.based.has_relative_rotation {
            state.rotation = current.rotation * previous.rotation.inverse() * state.rotation;
        }
    }

    /// Record the base transform and the character's location relative to it
    pub fn save_base_location(&self, state: &mut CharacterState) {
        let Some(id) = state.based.base else {
            state.based.last_base_transform = None;
            return;
        };
        let transform = self.base_world_transform(id, state.based.bone.as_ref());
        state.based.last_base_transform = transform;
        if let Some(transform) = transform {
            state.based.location = inverse_transform_position_no_scale(&transform, state.location);
            state.based.rotation = if state.based.has_relative_rotation {
                Rotator::from_quat(transform.rotation.inverse() * state.rotation)
            } else {
                state.rotator()
            };
        }
    }

    /// Advance every base by its own velocity
    pub fn advance(&mut self, delta: f32) {
        self.bases.values_mut().for_each(|base| {
            base.transform.translation += base.linear_velocity * delta;
            base.transform.rotation =
                Quat::from_rotation_y(base.angular_speed * delta) * base.transform.rotation;
        });
    }
}
