//! Tick of the owning client: move locally, then decide whether to send.
use bevy_math::Vec3;
use tracing::trace;

use autonomy_core::base::{inverse_transform_position_no_scale, BaseRegistry};
use autonomy_core::config::{MovementConfig, NetworkSmoothingMode};
use autonomy_core::id::PeerId;
use autonomy_core::locomotion::{LocomotionEngine, MoveInput};
use autonomy_core::network::ConnectionQuality;
use autonomy_core::rotator::Rotator;
use autonomy_core::snapshot::MoveSnapshot;
use autonomy_core::state::{CharacterState, WorldOrigin};

use crate::send_rate::SendRateController;

/// Everything the owning client needs from its peer for one tick
pub struct SendContext<'a> {
    pub local_peer: PeerId,
    /// Wall-clock time, in seconds
    pub now: f64,
    /// Game time, stamped on snapshots in linear smoothing mode
    pub world_time: f64,
    pub bases: &'a BaseRegistry,
    pub origin: WorldOrigin,
    /// `None` for a detached controller without a player connection
    pub connection: Option<&'a dyn ConnectionQuality>,
}

#[derive(Debug, Clone)]
pub struct LocalSimulationDriver {
    pacing: SendRateController,
    smoothing_mode: NetworkSmoothingMode,
    /// The server acknowledged this client as the controller of the character
    acknowledged: bool,
}

impl LocalSimulationDriver {
    pub fn new(config: &MovementConfig) -> Self {
        Self {
            pacing: SendRateController::new(config.send.clone()),
            smoothing_mode: config.smoothing.mode,
            acknowledged: false,
        }
    }

    pub fn pacing(&self) -> &SendRateController {
        &self.pacing
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// The server recognized this client as the character's controller
    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }

    /// A new possession restarts pacing: the next send is not rate-limited
    pub fn on_possessed(&mut self) {
        self.pacing.reset();
    }

    /// Run one tick, returning the snapshot to send, if any.
    ///
    /// The local move always runs; only sending is gated on the server having
    /// acknowledged this client and on a player connection being present.
    pub fn tick(
        &mut self,
        state: &mut CharacterState,
        locomotion: &mut dyn LocomotionEngine,
        input: &MoveInput,
        delta: f32,
        ctx: &SendContext,
    ) -> Option<MoveSnapshot> {
        if input.crouch != state.crouched {
            locomotion.apply_crouch_transition(state, input.crouch);
        }
        ctx.bases.follow_base(state);
        if state.has_override_root_motion() {
            Self::apply_root_motion(state, input, delta);
        } else {
            locomotion.perform_local_move(state, input, delta);
        }
        Self::tick_root_motion(state, delta);
        ctx.bases.save_base_location(state);
        self.replicate(state, ctx)
    }

    /// Override root motion replaces physics: move with the summed source velocity
    fn apply_root_motion(state: &mut CharacterState, input: &MoveInput, delta: f32) {
        let velocity: Vec3 = state
            .root_motion_sources
            .iter()
            .filter(|s| s.overrides_velocity)
            .map(|s| s.velocity)
            .sum();
        state.control_rotation = input.control_rotation;
        state.velocity = velocity;
        state.acceleration = Vec3::ZERO;
        state.location += velocity * delta;
    }

    fn tick_root_motion(state: &mut CharacterState, delta: f32) {
        state.root_motion_sources.iter_mut().for_each(|s| s.remaining -= delta);
        state.root_motion_sources.retain(|s| s.remaining > 0.0);
    }

    fn replicate(&mut self, state: &CharacterState, ctx: &SendContext) -> Option<MoveSnapshot> {
        if !self.acknowledged || ctx.connection.is_none() {
            trace!(character = ?state.id, acknowledged = self.acknowledged, "not ready to send movement");
            return None;
        }
        if !state.replicate_movement {
            return None;
        }
        let interval = self
            .pacing
            .compute_interval(state.acceleration, state.velocity, ctx.connection);
        if !self.pacing.is_ready(ctx.now, interval) {
            return None;
        }
        let snapshot = self.build_snapshot(state, ctx);
        self.pacing.mark_sent(ctx.now);
        trace!(character = ?state.id, interval, ?snapshot, "sending movement");
        #[cfg(feature = "metrics")]
        {
            metrics::counter!("autonomy/snapshots_sent").increment(1);
            metrics::gauge!("autonomy/send_interval").set(interval as f64);
        }
        Some(snapshot)
    }

    /// Build a snapshot of the current state.
    ///
    /// Based-movement fields are filled only for a base that the receivers can
    /// resolve: registered, network-addressable and not simulated by this
    /// peer. The location is relative to the base only when the base is
    /// movable; anything else is sent in world space.
    pub fn build_snapshot(&self, state: &CharacterState, ctx: &SendContext) -> MoveSnapshot {
        let based = &state.based;
        let base = based
            .base
            .filter(|id| ctx.bases.is_replicable_by(*id, ctx.local_peer));
        let mut snapshot = MoveSnapshot {
            location: ctx.origin.to_zero_origin(state.location),
            rotation: state.rotator(),
            velocity: state.velocity,
            control_rotation: state.control_rotation,
            movement_mode: state.movement_mode,
            base,
            bone: base.and(based.bone.clone()),
            base_has_relative_rotation: base.is_some() && based.has_relative_rotation,
            has_override_root_motion: state.has_override_root_motion(),
            crouching: state.crouched,
            timestamp: (self.smoothing_mode == NetworkSmoothingMode::Linear)
                .then_some(ctx.world_time as f32),
        };
        let relative_to = base
            .filter(|id| ctx.bases.uses_relative_location(Some(*id)))
            .and_then(|id| ctx.bases.base_world_transform(id, based.bone.as_ref()));
        if let Some(transform) = relative_to {
            snapshot.location = inverse_transform_position_no_scale(&transform, state.location);
            if based.has_relative_rotation {
                snapshot.rotation = Rotator::from_quat(transform.rotation.inverse() * state.rotation);
            }
        }
        snapshot
    }
}
