use tracing::{debug, trace};

use autonomy_core::base::BaseRegistry;
use autonomy_core::config::MovementConfig;
use autonomy_core::id::PeerId;
use autonomy_core::locomotion::LocomotionEngine;
use autonomy_core::snapshot::MoveSnapshot;
use autonomy_core::state::{CharacterState, WorldOrigin};
use autonomy_smoothing::{SmoothingEngine, SmoothingState, VisualTransform};

/// What the receiving peer provides to reconciliation
pub struct ReconcileContext<'a> {
    pub bases: &'a mut BaseRegistry,
    pub origin: WorldOrigin,
    /// Local game time, in seconds
    pub world_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The character does not replicate movement
    NotReplicating,
    /// The sender is not the authority source for this character on this peer
    NotAuthority,
    /// Older than the last adopted snapshot
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Applied,
    /// Identical to the latest snapshot; nothing to do
    Duplicate,
    Rejected(RejectReason),
}

/// Receive-side state for one remote character
#[derive(Debug, Clone)]
pub struct RemoteReconciler {
    pub(crate) engine: SmoothingEngine,
    pub(crate) smoothing: SmoothingState,
    /// The last snapshot received
    pub(crate) latest: Option<MoveSnapshot>,
    /// Timestamp of the last snapshot that carried one
    pub(crate) latest_timestamp: Option<f32>,
    /// The next simulation pass must adopt the replicated movement mode
    pub(crate) network_movement_mode_changed: bool,
    /// A snapshot arrived since the last simulation pass
    pub(crate) network_update_received: bool,
    /// The last snapshot moved the character or changed its base
    pub(crate) just_teleported: bool,
    pub(crate) reject_stale_snapshots: bool,
    pub(crate) skip_proxy_prediction_on_net_update: bool,
}

impl RemoteReconciler {
    pub fn new(config: &MovementConfig) -> Self {
        Self {
            engine: SmoothingEngine::new(config.smoothing.clone()),
            smoothing: SmoothingState::default(),
            latest: None,
            latest_timestamp: None,
            network_movement_mode_changed: false,
            network_update_received: false,
            just_teleported: false,
            reject_stale_snapshots: config.reject_stale_snapshots,
            skip_proxy_prediction_on_net_update: config.skip_proxy_prediction_on_net_update,
        }
    }

    pub fn latest(&self) -> Option<&MoveSnapshot> {
        self.latest.as_ref()
    }

    pub fn smoothing(&self) -> &SmoothingState {
        &self.smoothing
    }

    pub fn visual_transform(&self, state: &CharacterState) -> VisualTransform {
        self.engine.visual_transform(&self.smoothing, state)
    }

    /// Apply a snapshot received from `sender`.
    ///
    /// Snapshots are only accepted from the authority source of the character
    /// on this peer: its owning client on the server, the server on every
    /// other client. Anything else is ignored.
    pub fn receive(
        &mut self,
        sender: PeerId,
        snapshot: MoveSnapshot,
        state: &mut CharacterState,
        locomotion: &mut dyn LocomotionEngine,
        ctx: &mut ReconcileContext,
    ) -> ReceiveOutcome {
        let outcome = self.try_receive(sender, snapshot, state, locomotion, ctx);
        #[cfg(feature = "metrics")]
        match outcome {
            ReceiveOutcome::Rejected(_) => metrics::counter!("autonomy/snapshots_rejected").increment(1),
            _ => metrics::counter!("autonomy/snapshots_received").increment(1),
        }
        outcome
    }

    fn try_receive(
        &mut self,
        sender: PeerId,
        snapshot: MoveSnapshot,
        state: &mut CharacterState,
        locomotion: &mut dyn LocomotionEngine,
        ctx: &mut ReconcileContext,
    ) -> ReceiveOutcome {
        if !state.replicate_movement {
            return ReceiveOutcome::Rejected(RejectReason::NotReplicating);
        }
        if state.authority_source() != Some(sender) {
            trace!(character = ?state.id, ?sender, "ignoring movement from a peer without authority");
            return ReceiveOutcome::Rejected(RejectReason::NotAuthority);
        }
        if self.latest.as_ref() == Some(&snapshot) {
            return ReceiveOutcome::Duplicate;
        }
        if self.reject_stale_snapshots
            && let (Some(incoming), Some(latest)) = (snapshot.timestamp, self.latest_timestamp)
            && incoming < latest
        {
            debug!(character = ?state.id, incoming, latest, "ignoring stale movement");
            return ReceiveOutcome::Rejected(RejectReason::Stale);
        }

        self.on_replicated_movement(state);

        let had_base = self.latest.as_ref().is_some_and(|l| l.base.is_some());
        let had_or_has_base = had_base || snapshot.base.is_some();
        let previous_mode = self.latest.as_ref().map(|l| l.movement_mode);
        self.network_movement_mode_changed |= previous_mode != Some(snapshot.movement_mode)
            || state.movement_mode != snapshot.movement_mode;
        self.network_update_received |= self.network_movement_mode_changed || self.just_teleported;

        if let Some(timestamp) = snapshot.timestamp {
            self.smoothing.server_last_transform_update_timestamp = timestamp as f64;
            self.latest_timestamp = Some(timestamp);
        }

        state.replicated_override_root_motion = snapshot.has_override_root_motion;
        state.control_rotation = snapshot.control_rotation;
        self.apply_velocity(state, snapshot.velocity);
        if had_or_has_base {
            self.apply_based_movement(state, locomotion, ctx, &snapshot);
        }
        self.apply_location_and_rotation(state, ctx, &snapshot);

        if snapshot.crouching != state.crouched {
            debug!(character = ?state.id, crouch = snapshot.crouching, "replicated crouch transition");
            locomotion.apply_crouch_transition(state, snapshot.crouching);
        }

        self.latest = Some(snapshot);
        ReceiveOutcome::Applied
    }
}
