//! Per-frame simulation of a character whose movement is owned by another peer.
//!
//! Between snapshots the character is extrapolated with its replicated
//! velocity, and any pending visual offset is smoothed out.
use tracing::trace;

use autonomy_core::config::NetworkSmoothingMode;
use autonomy_core::locomotion::LocomotionEngine;
use autonomy_core::movement_mode::MovementMode;
use autonomy_core::state::CharacterState;
use bevy_math::Vec3;

use crate::reconciler::{ReconcileContext, RemoteReconciler};

impl RemoteReconciler {
    /// Advance the remote character by `delta` seconds
    pub fn tick(
        &mut self,
        state: &mut CharacterState,
        locomotion: &mut dyn LocomotionEngine,
        ctx: &ReconcileContext,
        delta: f32,
    ) {
        let playing_override = self.latest.as_ref().is_some_and(|l| l.has_override_root_motion);
        if state.replicate_movement && !playing_override {
            let rotation = state.rotation;
            self.simulate_movement(state, locomotion, ctx, delta);
            if self.engine.mode() == NetworkSmoothingMode::Linear
                && !self.smoothing.complete
                && state.rotation != rotation
            {
                self.smoothing.mesh_rotation_target = state.rotation;
            }
        }
        self.engine.smooth_client_position(&mut self.smoothing, state, delta);
    }

    /// Extrapolate the character from its last replicated state
    pub(crate) fn simulate_movement(
        &mut self,
        state: &mut CharacterState,
        locomotion: &mut dyn LocomotionEngine,
        ctx: &ReconcileContext,
        delta: f32,
    ) {
        let Some(latest) = self.latest.as_ref() else {
            return;
        };
        // nothing real has been replicated yet
        if latest.is_empty() {
            return;
        }
        let replicated_mode = latest.movement_mode;
        let replicated_velocity = latest.velocity;

        let handled_update = self.network_update_received;
        if handled_update {
            self.network_update_received = false;
            if self.network_movement_mode_changed {
                self.network_movement_mode_changed = false;
                trace!(character = ?state.id, from = ?state.movement_mode, to = ?replicated_mode, "adopting replicated movement mode");
                state.movement_mode = replicated_mode;
                locomotion.update_floor(state);
            } else if self.just_teleported {
                locomotion.update_floor(state);
            }
        }

        if state.movement_mode == MovementMode::None {
            return;
        }
        if !state.gravity_enabled
            || (state.movement_mode.is_moving_on_ground() && replicated_velocity == Vec3::ZERO)
        {
            state.velocity = Vec3::ZERO;
        }

        ctx.bases.follow_base(state);
        if !(handled_update && self.skip_proxy_prediction_on_net_update) {
            locomotion.simulate_proxy_move(state, delta);
        }
        ctx.bases.save_base_location(state);
        self.just_teleported = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use autonomy_core::base::{BaseRegistry, MovementBase};
    use autonomy_core::config::MovementConfig;
    use autonomy_core::id::{NetId, PeerId};
    use autonomy_core::locomotion::KinematicLocomotion;
    use autonomy_core::role::NetRole;
    use autonomy_core::rotator::Rotator;
    use autonomy_core::snapshot::MoveSnapshot;
    use autonomy_core::state::WorldOrigin;
    use bevy_transform::components::Transform;
    use test_log::test;

    use crate::reconciler::ReceiveOutcome;

    fn proxy() -> CharacterState {
        CharacterState::new(NetId(1), PeerId::Client(1)).with_roles(NetRole::SimulatedProxy, NetRole::Authority)
    }

    fn moving(location: Vec3) -> MoveSnapshot {
        MoveSnapshot {
            location,
            rotation: Rotator::from_yaw(0.0),
            velocity: Vec3::new(300.0, 0.0, 0.0),
            movement_mode: MovementMode::Walking,
            ..Default::default()
        }
    }

    struct Proxy {
        reconciler: RemoteReconciler,
        state: CharacterState,
        locomotion: KinematicLocomotion,
        bases: BaseRegistry,
    }

    impl Proxy {
        fn new(config: MovementConfig) -> Self {
            Self {
                reconciler: RemoteReconciler::new(&config),
                state: proxy(),
                locomotion: KinematicLocomotion::default(),
                bases: BaseRegistry::default(),
            }
        }

        fn receive(&mut self, snapshot: MoveSnapshot) -> ReceiveOutcome {
            let mut ctx = ReconcileContext {
                bases: &mut self.bases,
                origin: WorldOrigin::default(),
                world_time: 1.0,
            };
            self.reconciler
                .receive(PeerId::Server, snapshot, &mut self.state, &mut self.locomotion, &mut ctx)
        }

        fn tick(&mut self, delta: f32) {
            let ctx = ReconcileContext {
                bases: &mut self.bases,
                origin: WorldOrigin::default(),
                world_time: 1.0,
            };
            self.reconciler.tick(&mut self.state, &mut self.locomotion, &ctx, delta);
        }
    }

    #[test]
    fn test_waits_for_first_snapshot() {
        let mut proxy = Proxy::new(MovementConfig::default());
        proxy.state.velocity = Vec3::X * 100.0;
        proxy.tick(0.1);
        assert_eq!(proxy.state.location, Vec3::ZERO);

        // an all-zero snapshot does not count
        proxy.receive(MoveSnapshot {
            velocity: Vec3::ZERO,
            ..Default::default()
        });
        proxy.state.velocity = Vec3::X * 100.0;
        proxy.tick(0.1);
        assert_eq!(proxy.state.location, Vec3::ZERO);
    }

    #[test]
    fn test_extrapolates_between_snapshots() {
        let mut proxy = Proxy::new(MovementConfig::default());
        assert_eq!(proxy.receive(moving(Vec3::new(100.0, 0.0, 0.0))), ReceiveOutcome::Applied);
        proxy.tick(0.1);
        assert_relative_eq!(proxy.state.location.x, 130.0, epsilon = 1e-3);
        proxy.tick(0.1);
        assert_relative_eq!(proxy.state.location.x, 160.0, epsilon = 1e-3);
        assert!(!proxy.reconciler.just_teleported);
        assert!(!proxy.reconciler.network_update_received);
    }

    #[test]
    fn test_skip_prediction_on_update() {
        let mut proxy = Proxy::new(MovementConfig {
            skip_proxy_prediction_on_net_update: true,
            ..Default::default()
        });
        proxy.receive(moving(Vec3::new(100.0, 0.0, 0.0)));
        proxy.tick(0.1);
        assert_relative_eq!(proxy.state.location.x, 100.0, epsilon = 1e-3);
        proxy.tick(0.1);
        assert_relative_eq!(proxy.state.location.x, 130.0, epsilon = 1e-3);
    }

    #[test]
    fn test_adopts_movement_mode() {
        let mut proxy = Proxy::new(MovementConfig::default());
        proxy.receive(MoveSnapshot {
            location: Vec3::new(0.0, 200.0, 0.0),
            velocity: Vec3::ZERO,
            movement_mode: MovementMode::Falling,
            ..moving(Vec3::ZERO)
        });
        assert_eq!(proxy.state.movement_mode, MovementMode::Walking);
        proxy.tick(0.1);
        assert_eq!(proxy.state.movement_mode, MovementMode::Falling);
        // gravity pulls the proxy down
        assert!(proxy.state.velocity.y < 0.0);
        assert!(proxy.state.location.y < 200.0);
    }

    #[test]
    fn test_stops_on_ground_without_velocity() {
        let mut proxy = Proxy::new(MovementConfig::default());
        proxy.receive(MoveSnapshot {
            velocity: Vec3::ZERO,
            ..moving(Vec3::new(50.0, 0.0, 0.0))
        });
        proxy.state.velocity = Vec3::X * 500.0;
        proxy.tick(0.1);
        assert_eq!(proxy.state.velocity, Vec3::ZERO);
        assert_relative_eq!(proxy.state.location.x, 50.0, epsilon = 1e-3);
    }

    #[test]
    fn test_override_root_motion_skips_simulation() {
        let mut proxy = Proxy::new(MovementConfig::default());
        proxy.receive(MoveSnapshot {
            has_override_root_motion: true,
            ..moving(Vec3::new(100.0, 0.0, 0.0))
        });
        proxy.tick(0.1);
        assert_relative_eq!(proxy.state.location.x, 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_follows_moving_base() {
        let mut proxy = Proxy::new(MovementConfig::default());
        proxy.bases.insert(
            NetId(9),
            MovementBase::new(Transform::from_xyz(1000.0, 0.0, 0.0)).with_motion(Vec3::Z * 100.0, 0.0),
        );
        proxy.receive(MoveSnapshot {
            velocity: Vec3::ZERO,
            base: Some(NetId(9)),
            ..moving(Vec3::new(10.0, 0.0, 0.0))
        });
        assert_relative_eq!(proxy.state.location.x, 1010.0, epsilon = 1e-3);

        proxy.bases.advance(0.5);
        proxy.tick(0.5);
        assert_relative_eq!(proxy.state.location.x, 1010.0, epsilon = 1e-3);
        assert_relative_eq!(proxy.state.location.z, 50.0, epsilon = 1e-3);
    }

    #[test]
    fn test_smoothing_converges() {
        let mut proxy = Proxy::new(MovementConfig::default());
        proxy.receive(MoveSnapshot {
            velocity: Vec3::ZERO,
            ..moving(Vec3::new(80.0, 0.0, 0.0))
        });
        let visual = proxy.reconciler.visual_transform(&proxy.state);
        assert_relative_eq!(visual.location.x, 0.0, epsilon = 1e-3);
        for _ in 0..60 {
            proxy.tick(1.0 / 60.0);
        }
        assert!(proxy.reconciler.smoothing().complete);
        let visual = proxy.reconciler.visual_transform(&proxy.state);
        assert_relative_eq!(visual.location.x, 80.0, epsilon = 1e-3);
    }
}
