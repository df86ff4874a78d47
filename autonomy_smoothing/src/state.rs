use bevy_math::{Quat, Vec3};

/// Receiver-local smoothing bookkeeping for one character. Never sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingState {
    /// Offset of the visual transform from the collision transform
    pub mesh_translation_offset: Vec3,
    /// Translation offset at the last correction; linear mode lerps from it toward zero
    pub original_mesh_translation_offset: Vec3,
    /// Offset mode: rotation offset applied on top of the collision rotation.
    /// Linear mode: the interpolated world rotation.
    pub mesh_rotation_offset: Quat,
    /// Rotation at the last correction; linear mode lerps from it toward the target
    pub original_mesh_rotation_offset: Quat,
    pub mesh_rotation_target: Quat,
    /// Running client-side timestamp, advanced every frame
    pub client_timestamp: f64,
    /// Server-side timestamp of the last correction
    pub server_timestamp: f64,
    /// Latest timestamp reported by the owning client
    pub server_last_transform_update_timestamp: f64,
    /// `server_timestamp - client_timestamp` at the last correction
    pub last_correction_delta: f64,
    /// Local world time of the last correction; zero before the first one
    pub last_correction_time: f64,
    /// No offset left to smooth
    pub complete: bool,
}

impl Default for SmoothingState {
    fn default() -> Self {
        Self {
            mesh_translation_offset: Vec3::ZERO,
            original_mesh_translation_offset: Vec3::ZERO,
            mesh_rotation_offset: Quat::IDENTITY,
            original_mesh_rotation_offset: Quat::IDENTITY,
            mesh_rotation_target: Quat::IDENTITY,
            client_timestamp: 0.0,
            server_timestamp: 0.0,
            server_last_transform_update_timestamp: 0.0,
            last_correction_delta: 0.0,
            last_correction_time: 0.0,
            complete: true,
        }
    }
}

/// Where a character should be drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualTransform {
    pub location: Vec3,
    pub rotation: Quat,
}
