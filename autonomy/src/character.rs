//! A character as seen by one peer.
use alloc::boxed::Box;
use tracing::debug;

use autonomy_core::base::BaseRegistry;
use autonomy_core::config::MovementConfig;
use autonomy_core::id::PeerId;
use autonomy_core::locomotion::{LocomotionEngine, MoveInput};
use autonomy_core::network::ConnectionQuality;
use autonomy_core::role::NetRole;
use autonomy_core::snapshot::MoveSnapshot;
use autonomy_core::state::{CharacterState, WorldOrigin};
use autonomy_reconcile::{ReceiveOutcome, ReconcileContext, RejectReason};
use autonomy_send::SendContext;
use autonomy_smoothing::VisualTransform;

use crate::simulator::MovementSimulator;

/// What a peer lends its characters for one tick
pub struct TickContext<'a> {
    pub local_peer: PeerId,
    /// Peer clock, in seconds
    pub now: f64,
    pub bases: &'a mut BaseRegistry,
    pub origin: WorldOrigin,
    pub connection: Option<&'a dyn ConnectionQuality>,
}

pub struct Character {
    pub state: CharacterState,
    /// Input applied on every tick of the owning client
    pub input: MoveInput,
    locomotion: Box<dyn LocomotionEngine>,
    simulator: MovementSimulator,
}

impl core::fmt::Debug for Character {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Character")
            .field("state", &self.state)
            .field("simulator", &self.simulator)
            .finish_non_exhaustive()
    }
}

impl Character {
    pub fn new(state: CharacterState, locomotion: Box<dyn LocomotionEngine>, config: &MovementConfig) -> Self {
        let simulator = MovementSimulator::for_roles(&state, config);
        Self {
            state,
            input: MoveInput::default(),
            locomotion,
            simulator,
        }
    }

    pub fn simulator(&self) -> &MovementSimulator {
        &self.simulator
    }

    /// Change the network roles of the character, which selects a new simulator.
    ///
    /// Becoming the owning client counts as a new possession: the first
    /// snapshot after it is not rate-limited.
    pub fn set_roles(&mut self, local: NetRole, remote: NetRole, config: &MovementConfig) {
        if (self.state.local_role, self.state.remote_role) == (local, remote) {
            return;
        }
        debug!(character = ?self.state.id, ?local, ?remote, "network roles changed");
        self.state.local_role = local;
        self.state.remote_role = remote;
        self.simulator = MovementSimulator::for_roles(&self.state, config);
        self.possessed();
    }

    /// The owning client took (or re-took) control of the character
    pub fn possessed(&mut self) {
        if let Some(driver) = self.simulator.driver_mut() {
            driver.on_possessed();
        }
    }

    /// The server recognized the owning client as the controller
    pub fn acknowledge(&mut self) {
        if let Some(driver) = self.simulator.driver_mut() {
            driver.acknowledge();
        }
    }

    /// Advance the character by one tick, returning the snapshot to send, if any
    pub fn tick(&mut self, delta: f32, ctx: &mut TickContext) -> Option<MoveSnapshot> {
        match &mut self.simulator {
            MovementSimulator::LocalAuthoritative(driver) => {
                let send_ctx = SendContext {
                    local_peer: ctx.local_peer,
                    now: ctx.now,
                    world_time: ctx.now,
                    bases: &*ctx.bases,
                    origin: ctx.origin,
                    connection: ctx.connection,
                };
                driver.tick(
                    &mut self.state,
                    self.locomotion.as_mut(),
                    &self.input,
                    delta,
                    &send_ctx,
                )
            }
            MovementSimulator::RemoteReconciled(reconciler) => {
                let reconcile_ctx = ReconcileContext {
                    bases: &mut *ctx.bases,
                    origin: ctx.origin,
                    world_time: ctx.now,
                };
                reconciler.tick(&mut self.state, self.locomotion.as_mut(), &reconcile_ctx, delta);
                None
            }
            MovementSimulator::Disabled => None,
        }
    }

    /// Apply a snapshot received from `sender`
    pub fn receive(&mut self, sender: PeerId, snapshot: MoveSnapshot, ctx: &mut TickContext) -> ReceiveOutcome {
        let MovementSimulator::RemoteReconciled(reconciler) = &mut self.simulator else {
            return ReceiveOutcome::Rejected(RejectReason::NotAuthority);
        };
        let mut reconcile_ctx = ReconcileContext {
            bases: &mut *ctx.bases,
            origin: ctx.origin,
            world_time: ctx.now,
        };
        reconciler.receive(
            sender,
            snapshot,
            &mut self.state,
            self.locomotion.as_mut(),
            &mut reconcile_ctx,
        )
    }

    /// The latest snapshot received for a remote character
    pub fn latest_snapshot(&self) -> Option<&MoveSnapshot> {
        self.simulator.reconciler().and_then(|r| r.latest())
    }

    /// Where the character should be drawn on this peer
    pub fn visual_transform(&self) -> VisualTransform {
        match self.simulator.reconciler() {
            Some(reconciler) => reconciler.visual_transform(&self.state),
            None => VisualTransform {
                location: self.state.location,
                rotation: self.state.rotation,
            },
        }
    }
}
