//! Tuning knobs for sending and smoothing.
//!
//! Every struct deserializes with `#[serde(default)]`, so a partial config file
//! only overrides the fields it names.
use serde::{Deserialize, Serialize};

/// Controls how often the owning client sends its movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendRateConfig {
    /// Base interval between two sends, in seconds
    pub send_interval: f32,
    /// Interval used on slow connections or in crowded sessions
    pub throttled_send_interval: f32,
    /// Interval floor while the character is fully at rest
    pub stationary_send_interval: f32,
    /// Connections faster than this (bytes/s) are never throttled in small sessions
    pub throttle_at_net_speed: f32,
    /// Sessions with more players than this are always throttled
    pub throttle_over_player_count: usize,
    /// Approximate size of one move message in bytes, used to scale the throttled interval
    pub move_rep_size: f32,
    /// Hard lower bound of the computed interval
    pub min_send_interval: f32,
    /// Hard upper bound of the computed interval
    pub max_send_interval: f32,
}

impl Default for SendRateConfig {
    fn default() -> Self {
        Self {
            send_interval: 1.0 / 90.0,
            throttled_send_interval: 1.0 / 45.0,
            stationary_send_interval: 1.0 / 12.0,
            throttle_at_net_speed: 10000.0,
            throttle_over_player_count: 10,
            move_rep_size: 42.0,
            min_send_interval: 1.0 / 120.0,
            max_send_interval: 1.0 / 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkSmoothingMode {
    /// Corrections are applied immediately
    Disabled,
    /// The visual transform is interpolated toward the target, paced by timestamps
    Linear,
    /// The visual transform carries a decaying offset from the collision transform
    #[default]
    Offset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub mode: NetworkSmoothingMode,
    /// Corrections longer than this only contribute this much to the offset
    pub max_smooth_distance: f32,
    /// Corrections longer than this discard the offset entirely
    pub no_smooth_distance: f32,
    /// Time for the translation offset to decay, in seconds
    pub smooth_location_time: f32,
    /// Time for the rotation offset to decay, in seconds
    pub smooth_rotation_time: f32,
    /// Largest lag allowed between the client and server smoothing timestamps
    pub max_smoothing_lag: f32,
    /// Vertical corrections smaller than this are ignored while nav-walking
    pub nav_walking_floor_tolerance: f32,
    /// How far past the target a linear interpolation may extrapolate (1.0 = no extrapolation)
    pub linear_lerp_limit: f32,
    /// How far ahead of the server timestamp the client may run, as a fraction of the last correction delta
    pub linear_max_time_ahead: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            mode: NetworkSmoothingMode::default(),
            max_smooth_distance: 256.0,
            no_smooth_distance: 384.0,
            smooth_location_time: 0.1,
            smooth_rotation_time: 0.05,
            max_smoothing_lag: 0.5,
            nav_walking_floor_tolerance: 10.0,
            linear_lerp_limit: 1.15,
            linear_max_time_ahead: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub send: SendRateConfig,
    pub smoothing: SmoothingConfig,
    /// Skip forward-simulating a proxy on the frame a network update was applied
    pub skip_proxy_prediction_on_net_update: bool,
    /// Ignore snapshots whose timestamp is older than the last one adopted
    pub reject_stale_snapshots: bool,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            send: SendRateConfig::default(),
            smoothing: SmoothingConfig::default(),
            skip_proxy_prediction_on_net_update: false,
            reject_stale_snapshots: true,
        }
    }
}

impl MovementConfig {
    pub fn with_smoothing_mode(mut self, mode: NetworkSmoothingMode) -> Self {
        self.smoothing.mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_partial_config() {
        let config: MovementConfig = serde_json::from_str(
            r#"{
                "send": { "stationary_send_interval": 0.5, "max_send_interval": 0.5 },
                "smoothing": { "mode": "Linear" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.send.stationary_send_interval, 0.5);
        assert_eq!(config.send.max_send_interval, 0.5);
        assert_eq!(config.send.send_interval, SendRateConfig::default().send_interval);
        assert_eq!(config.smoothing.mode, NetworkSmoothingMode::Linear);
        assert_eq!(config.smoothing.max_smooth_distance, 256.0);
        assert!(config.reject_stale_snapshots);
    }
}
