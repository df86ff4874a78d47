//! Smoothing of network corrections.
//!
//! A correction moves the character's collision transform from an old to a new
//! transform. Instead of snapping the visual transform along with it, the
//! engine records an offset that is reduced over the following frames.
//!
//! - Offset mode: the visual location is `location + offset`, and the visual
//!   rotation `rotation * rotation_offset`. Offsets decay exponentially.
//!   Successive corrections accumulate into the existing offsets.
//! - Linear mode: only the collision location jumps. The collision rotation and
//!   the translation offset are interpolated toward the target, paced by the
//!   timestamps the owning client stamps on its snapshots.
//! - Disabled: the new transform is applied immediately.
//!
//! Translation offsets are bounded: a correction longer than
//! `max_smooth_distance` only contributes that much, and one longer than
//! `no_smooth_distance` discards the offset (the character teleports).
use bevy_math::{Quat, Vec3};
use tracing::{debug, trace};

use autonomy_core::config::{NetworkSmoothingMode, SmoothingConfig};
use autonomy_core::movement_mode::MovementMode;
use autonomy_core::state::CharacterState;

use crate::state::{SmoothingState, VisualTransform};

const SMALL_NUMBER: f64 = 1.0e-8;
const NEARLY_ZERO_OFFSET: f32 = 1.0e-2;
const NEARLY_EQUAL_ANGLE: f32 = 1.0e-4;

/// A jump of the collision transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub old_location: Vec3,
    pub old_rotation: Quat,
    pub new_location: Vec3,
    pub new_rotation: Quat,
}

impl Correction {
    pub fn is_noop(&self) -> bool {
        self.old_location == self.new_location && self.old_rotation == self.new_rotation
    }
}

#[derive(Debug, Clone, Default)]
pub struct SmoothingEngine {
    config: SmoothingConfig,
}

impl SmoothingEngine {
    pub fn new(config: SmoothingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmoothingConfig {
        &self.config
    }

    pub fn mode(&self) -> NetworkSmoothingMode {
        self.config.mode
    }

    /// Move the collision transform of `state` to the corrected transform, and
    /// record the visual offset to smooth out over the next frames.
    pub fn smooth_correction(
        &self,
        smoothing: &mut SmoothingState,
        state: &mut CharacterState,
        correction: Correction,
        world_time: f64,
    ) {
        let config = &self.config;
        if config.mode == NetworkSmoothingMode::Disabled {
            state.location = correction.new_location;
            state.rotation = correction.new_rotation;
            smoothing.mesh_translation_offset = Vec3::ZERO;
            smoothing.mesh_rotation_offset = smoothing.mesh_rotation_target;
            smoothing.complete = true;
            return;
        }

        let mut new_to_old = correction.old_location - correction.new_location;
        if state.movement_mode == MovementMode::NavWalking
            && new_to_old.y.abs() < config.nav_walking_floor_tolerance
        {
            new_to_old.y = 0.0;
        }

        let distance = new_to_old.length();
        let offset = &mut smoothing.mesh_translation_offset;
        if distance > config.max_smooth_distance {
            *offset = if distance > config.no_smooth_distance {
                Vec3::ZERO
            } else {
                *offset + new_to_old.normalize_or_zero() * config.max_smooth_distance
            };
        } else {
            *offset += new_to_old;
        }
        if offset.length() > config.no_smooth_distance {
            *offset = Vec3::ZERO;
        }
        if *offset == Vec3::ZERO && distance > config.no_smooth_distance {
            debug!(character = ?state.id, distance, "correction too large to smooth, snapping");
            #[cfg(feature = "metrics")]
            metrics::counter!("autonomy/smoothing_snaps").increment(1);
        }

        match config.mode {
            NetworkSmoothingMode::Linear => {
                smoothing.original_mesh_translation_offset = smoothing.mesh_translation_offset;
                smoothing.original_mesh_rotation_offset = correction.old_rotation;
                smoothing.mesh_rotation_offset = correction.old_rotation;
                smoothing.mesh_rotation_target = correction.new_rotation;
                state.location = correction.new_location;
            }
            _ => {
                smoothing.mesh_rotation_offset = (correction.new_rotation.inverse()
                    * correction.old_rotation
                    * smoothing.mesh_rotation_offset)
                    .normalize();
                smoothing.mesh_rotation_target = Quat::IDENTITY;
                state.location = correction.new_location;
                state.rotation = correction.new_rotation;
            }
        }

        self.update_timestamps(smoothing, world_time);
        smoothing.complete = false;
        trace!(
            character = ?state.id,
            offset = ?smoothing.mesh_translation_offset,
            delta = smoothing.last_correction_delta,
            "smoothing correction"
        );
    }

    /// Keep the client timestamp within a bounded lag of the server timestamp
    fn update_timestamps(&self, smoothing: &mut SmoothingState, world_time: f64) {
        // running ahead of the server: pull halfway back
        if smoothing.client_timestamp > smoothing.server_timestamp {
            smoothing.client_timestamp =
                smoothing.server_timestamp + 0.5 * (smoothing.client_timestamp - smoothing.server_timestamp);
        }

        let mut old_server_timestamp = smoothing.server_timestamp;
        smoothing.server_timestamp = smoothing.server_last_transform_update_timestamp;
        if smoothing.last_correction_time == 0.0 {
            smoothing.client_timestamp = smoothing.server_timestamp;
            old_server_timestamp = smoothing.server_timestamp;
        }

        let server_delta = smoothing.server_timestamp - old_server_timestamp;
        let max_offset = self.config.max_smoothing_lag as f64;
        let min_offset = (self.config.smooth_location_time as f64).min(max_offset);
        let max_delta = (server_delta * 1.25).clamp(min_offset, max_offset);
        smoothing.client_timestamp = smoothing.client_timestamp.clamp(
            smoothing.server_timestamp - max_delta,
            smoothing.server_timestamp,
        );

        smoothing.last_correction_delta = smoothing.server_timestamp - smoothing.client_timestamp;
        smoothing.last_correction_time = world_time;
    }

    /// Advance smoothing by one frame
    pub fn smooth_client_position(
        &self,
        smoothing: &mut SmoothingState,
        state: &mut CharacterState,
        delta: f32,
    ) {
        if smoothing.complete {
            return;
        }
        smoothing.client_timestamp += delta as f64;
        match self.config.mode {
            NetworkSmoothingMode::Disabled => {
                smoothing.mesh_translation_offset = Vec3::ZERO;
                smoothing.complete = true;
            }
            NetworkSmoothingMode::Linear => {
                self.interpolate_linear(smoothing, state.velocity);
                // the collision rotation follows the interpolated rotation
                state.rotation = smoothing.mesh_rotation_offset;
            }
            NetworkSmoothingMode::Offset => self.interpolate_offset(smoothing, state.velocity, delta),
        }
        if smoothing.complete {
            trace!(character = ?state.id, "smoothing complete");
        }
    }

    fn interpolate_linear(&self, smoothing: &mut SmoothingState, velocity: Vec3) {
        let limit = self.config.linear_lerp_limit;
        let target_delta = smoothing.last_correction_delta;
        let lerp = if target_delta > SMALL_NUMBER {
            let max_time_ahead = target_delta * self.config.linear_max_time_ahead as f64;
            smoothing.client_timestamp = smoothing
                .client_timestamp
                .min(smoothing.server_timestamp + max_time_ahead);
            let remaining = smoothing.server_timestamp - smoothing.client_timestamp;
            let elapsed = target_delta - remaining;
            ((elapsed / target_delta) as f32).clamp(0.0, limit)
        } else {
            1.0
        };

        if lerp >= 1.0 {
            if velocity == Vec3::ZERO || lerp >= limit {
                smoothing.mesh_translation_offset = Vec3::ZERO;
                smoothing.client_timestamp = smoothing.server_timestamp;
                smoothing.complete = true;
            } else {
                // still moving: extrapolate a little past the target
                smoothing.mesh_translation_offset = smoothing.original_mesh_translation_offset * (1.0 - lerp);
            }
            smoothing.mesh_rotation_offset = smoothing.mesh_rotation_target;
        } else {
            smoothing.mesh_translation_offset = smoothing.original_mesh_translation_offset * (1.0 - lerp);
            smoothing.mesh_rotation_offset = smoothing
                .original_mesh_rotation_offset
                .lerp(smoothing.mesh_rotation_target, lerp)
                .normalize();
        }
    }

    fn interpolate_offset(&self, smoothing: &mut SmoothingState, velocity: Vec3, delta: f32) {
        let location_time = if velocity == Vec3::ZERO {
            0.5 * self.config.smooth_location_time
        } else {
            self.config.smooth_location_time
        };
        if delta < location_time {
            smoothing.mesh_translation_offset *= 1.0 - delta / location_time;
        } else {
            smoothing.mesh_translation_offset = Vec3::ZERO;
        }

        let rotation_time = self.config.smooth_rotation_time;
        smoothing.mesh_rotation_offset = if delta < rotation_time {
            smoothing
                .mesh_rotation_offset
                .lerp(smoothing.mesh_rotation_target, delta / rotation_time)
                .normalize()
        } else {
            smoothing.mesh_rotation_target
        };

        if smoothing.mesh_translation_offset.length() < NEARLY_ZERO_OFFSET
            && smoothing
                .mesh_rotation_offset
                .angle_between(smoothing.mesh_rotation_target)
                < NEARLY_EQUAL_ANGLE
        {
            smoothing.mesh_translation_offset = Vec3::ZERO;
            smoothing.mesh_rotation_offset = smoothing.mesh_rotation_target;
            smoothing.complete = true;
        }
    }

    /// Where the character should be drawn this frame
    pub fn visual_transform(&self, smoothing: &SmoothingState, state: &CharacterState) -> VisualTransform {
        let location = state.location + smoothing.mesh_translation_offset;
        let rotation = match self.config.mode {
            NetworkSmoothingMode::Offset => state.rotation * smoothing.mesh_rotation_offset,
            _ => state.rotation,
        };
        VisualTransform { location, rotation }
    }
}
