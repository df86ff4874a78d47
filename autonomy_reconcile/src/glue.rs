//! The surface a remote character exposes to reconciliation.
//!
//! Each call may move the collision transform; any move goes through
//! [`SmoothingEngine::smooth_correction`](autonomy_smoothing::SmoothingEngine::smooth_correction)
//! so the visual transform does not snap.
use bevy_math::Vec3;
use tracing::{debug, trace};

use autonomy_core::base::transform_position_no_scale;
use autonomy_core::locomotion::LocomotionEngine;
use autonomy_core::role::NetRole;
use autonomy_core::rotator::Rotator;
use autonomy_core::snapshot::MoveSnapshot;
use autonomy_core::state::{BasedMovementInfo, CharacterState};
use autonomy_smoothing::Correction;

use crate::reconciler::{ReconcileContext, RemoteReconciler};

impl RemoteReconciler {
    /// Adopt the replicated velocity.
    ///
    /// The owning client is never told its own velocity.
    pub fn apply_velocity(&mut self, state: &mut CharacterState, velocity: Vec3) {
        match (state.local_role, state.remote_role) {
            (_, NetRole::AutonomousProxy) | (NetRole::SimulatedProxy, _) => state.velocity = velocity,
            _ => {}
        }
    }

    /// Adopt the replicated base, and recompute the world transform of a
    /// character standing on a movable base.
    pub fn apply_based_movement(
        &mut self,
        state: &mut CharacterState,
        locomotion: &dyn LocomotionEngine,
        ctx: &mut ReconcileContext,
        snapshot: &MoveSnapshot,
    ) {
        if state.is_playing_override_root_motion() {
            return;
        }
        self.network_update_received = true;

        let base_changed = state.based.base != snapshot.base || state.based.bone != snapshot.bone;
        let base = if base_changed {
            debug!(character = ?state.id, from = ?state.based.base, to = ?snapshot.base, "movement base changed");
            ctx.bases.attach_to_base(state.id, snapshot.base)
        } else {
            state.based.base
        };
        state.based = BasedMovementInfo {
            base,
            bone: base.and(snapshot.bone.clone()),
            location: snapshot.location,
            rotation: snapshot.rotation,
            has_relative_rotation: snapshot.base_has_relative_rotation,
            last_base_transform: state.based.last_base_transform,
        };

        let Some(base) = base.filter(|id| ctx.bases.uses_relative_location(Some(*id))) else {
            return;
        };
        let Some(transform) = ctx.bases.base_world_transform(base, state.based.bone.as_ref()) else {
            return;
        };
        let new_location = transform_position_no_scale(&transform, snapshot.location);
        let new_rotation = if snapshot.base_has_relative_rotation {
            let rotation = transform.rotation * snapshot.rotation.to_quat();
            if locomotion.should_remain_vertical(state) {
                Rotator::from_quat(rotation)
                    .yaw_only()
                    .to_quat()
            } else {
                rotation
            }
        } else {
            snapshot.rotation.to_quat()
        };

        let correction = Correction {
            old_location: state.location,
            old_rotation: state.rotation,
            new_location,
            new_rotation,
        };
        self.just_teleported |= base_changed || !correction.is_noop();
        self.smoothing.complete = false;
        self.engine
            .smooth_correction(&mut self.smoothing, state, correction, ctx.world_time);
        ctx.bases.save_base_location(state);
    }

    /// Adopt the replicated world transform, unless the snapshot places the
    /// character on a movable base (the base already placed it).
    pub fn apply_location_and_rotation(
        &mut self,
        state: &mut CharacterState,
        ctx: &mut ReconcileContext,
        snapshot: &MoveSnapshot,
    ) {
        self.network_update_received = true;
        if ctx.bases.uses_relative_location(snapshot.base) {
            return;
        }
        let correction = Correction {
            old_location: state.location,
            old_rotation: state.rotation,
            new_location: ctx.origin.to_local(snapshot.location),
            new_rotation: snapshot.rotation.to_quat(),
        };
        self.just_teleported |= !correction.is_noop();
        self.smoothing.complete = false;
        self.engine
            .smooth_correction(&mut self.smoothing, state, correction, ctx.world_time);
    }

    /// A position update arrived: root motion sources only live on the owning client
    pub fn on_replicated_movement(&mut self, state: &mut CharacterState) {
        if !state.is_locally_controlled() && !state.root_motion_sources.is_empty() {
            trace!(character = ?state.id, count = state.root_motion_sources.len(), "clearing pending root motion sources");
            state.root_motion_sources.clear();
        }
    }
}
