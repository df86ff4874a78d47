//! Character locomotion: the physics step that movement replication drives.
//!
//! Replication never integrates movement itself; it calls into a
//! [`LocomotionEngine`] for local moves, proxy prediction, floor checks and
//! crouch transitions.
use bevy_math::Vec3;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::movement_mode::MovementMode;
use crate::rotator::Rotator;
use crate::state::CharacterState;

/// Input sampled by the owning client for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveInput {
    /// Desired world-space direction; longer than 1 is clamped
    pub direction: Vec3,
    pub control_rotation: Rotator,
    pub jump: bool,
    pub crouch: bool,
}

pub trait LocomotionEngine: Send + Sync {
    /// Integrate one tick of input-driven movement for the owning client
    fn perform_local_move(&mut self, state: &mut CharacterState, input: &MoveInput, delta: f32);

    /// Predict a proxy forward from its replicated velocity
    fn simulate_proxy_move(&mut self, state: &mut CharacterState, delta: f32);

    /// Enter or leave the crouched state, resizing the collision capsule
    fn apply_crouch_transition(&mut self, state: &mut CharacterState, crouch: bool);

    /// Re-evaluate the floor after a teleport or a forced check
    fn update_floor(&mut self, state: &mut CharacterState);

    /// Whether rotations composed from a base must keep the character upright
    fn should_remain_vertical(&self, state: &CharacterState) -> bool {
        true
    }
}

/// Reference locomotion over a flat floor.
///
/// Location is the character's feet; the floor is the plane `y = floor_height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicLocomotion {
    pub max_speed: f32,
    pub max_acceleration: f32,
    pub braking_deceleration: f32,
    pub air_control: f32,
    pub gravity: f32,
    pub jump_speed: f32,
    pub floor_height: f32,
    pub floor_tolerance: f32,
    pub crouched_half_height: f32,
    pub crouched_speed_multiplier: f32,
}

impl Default for KinematicLocomotion {
    fn default() -> Self {
        Self {
            max_speed: 600.0,
            max_acceleration: 2048.0,
            braking_deceleration: 2048.0,
            air_control: 0.35,
            gravity: 980.0,
            jump_speed: 420.0,
            floor_height: 0.0,
            floor_tolerance: 2.4,
            crouched_half_height: 44.0,
            crouched_speed_multiplier: 0.5,
        }
    }
}

impl KinematicLocomotion {
    fn max_speed(&self, state: &CharacterState) -> f32 {
        if state.crouched {
            self.max_speed * self.crouched_speed_multiplier
        } else {
            self.max_speed
        }
    }

    fn apply_acceleration(&self, velocity: Vec3, acceleration: Vec3, max_speed: f32, delta: f32) -> Vec3 {
        if acceleration == Vec3::ZERO {
            let speed = velocity.length();
            if speed == 0.0 {
                return Vec3::ZERO;
            }
            let braked = (speed - self.braking_deceleration * delta).max(0.0);
            return velocity * (braked / speed);
        }
        (velocity + acceleration * delta).clamp_length_max(max_speed)
    }

    /// Land a falling character, or start falling if the ground dropped away
    fn resolve_floor(&self, state: &mut CharacterState) {
        let floor = self.floor_height;
        match state.movement_mode {
            MovementMode::Falling if state.location.y <= floor && state.velocity.y <= 0.0 => {
                state.location.y = floor;
                state.velocity.y = 0.0;
                state.movement_mode = MovementMode::Walking;
                trace!(character = ?state.id, "landed");
            }
            mode if mode.is_moving_on_ground() => {
                if state.location.y > floor + self.floor_tolerance {
                    state.movement_mode = MovementMode::Falling;
                } else {
                    state.location.y = floor;
                    state.velocity.y = 0.0;
                }
            }
            _ => {}
        }
    }
}

impl LocomotionEngine for KinematicLocomotion {
    fn perform_local_move(&mut self, state: &mut CharacterState, input: &MoveInput, delta: f32) {
        state.control_rotation = input.control_rotation;
        if state.movement_mode == MovementMode::None {
            state.velocity = Vec3::ZERO;
            state.acceleration = Vec3::ZERO;
            return;
        }
        let max_speed = self.max_speed(state);
        let direction = input.direction.clamp_length_max(1.0);
        match state.movement_mode {
            MovementMode::Walking | MovementMode::NavWalking => {
                let acceleration = direction.with_y(0.0) * self.max_acceleration;
                state.acceleration = acceleration;
                state.velocity = self.apply_acceleration(state.velocity.with_y(0.0), acceleration, max_speed, delta);
                if input.jump && !state.crouched {
                    state.velocity.y = self.jump_speed;
                    state.movement_mode = MovementMode::Falling;
                }
            }
            MovementMode::Falling => {
                let acceleration = direction.with_y(0.0) * self.max_acceleration * self.air_control;
                state.acceleration = acceleration;
                let horizontal = (state.velocity.with_y(0.0) + acceleration * delta).clamp_length_max(max_speed);
                state.velocity = horizontal.with_y(state.velocity.y - self.gravity * delta);
            }
            _ => {
                let acceleration = direction * self.max_acceleration;
                state.acceleration = acceleration;
                state.velocity = self.apply_acceleration(state.velocity, acceleration, max_speed, delta);
            }
        }
        state.location += state.velocity * delta;
        self.resolve_floor(state);
        if input.control_rotation.yaw != state.rotator().yaw {
            state.rotation = Rotator::from_yaw(input.control_rotation.yaw).to_quat();
        }
    }

    fn simulate_proxy_move(&mut self, state: &mut CharacterState, delta: f32) {
        match state.movement_mode {
            MovementMode::None => return,
            MovementMode::Falling if state.gravity_enabled => {
                state.velocity.y -= self.gravity * delta;
            }
            _ => {}
        }
        state.location += state.velocity * delta;
        self.resolve_floor(state);
    }

    fn apply_crouch_transition(&mut self, state: &mut CharacterState, crouch: bool) {
        if crouch == state.crouched {
            return;
        }
        state.crouched = crouch;
        state.half_height = if crouch {
            self.crouched_half_height
        } else {
            CharacterState::STANDING_HALF_HEIGHT
        };
        trace!(character = ?state.id, crouch, half_height = state.half_height, "crouch transition");
    }

    fn update_floor(&mut self, state: &mut CharacterState) {
        self.resolve_floor(state);
    }
}
