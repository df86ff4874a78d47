//! Adaptive pacing of outgoing movement snapshots.
//!
//! Every tick the owning client computes the minimum interval it must leave
//! between two sends, then sends only if that much time elapsed since the
//! previous send. There is no queue: a tick that is too early is skipped.
use bevy_math::Vec3;
use tracing::trace;

use autonomy_core::config::SendRateConfig;
use autonomy_core::network::ConnectionQuality;

#[derive(Debug, Clone)]
pub struct SendRateController {
    config: SendRateConfig,
    /// Wall-clock time of the last send; `None` until the first send after possession
    last_send: Option<f64>,
}

impl SendRateController {
    pub fn new(config: SendRateConfig) -> Self {
        Self {
            config,
            last_send: None,
        }
    }

    pub fn config(&self) -> &SendRateConfig {
        &self.config
    }

    pub fn last_send(&self) -> Option<f64> {
        self.last_send
    }

    /// Minimum interval between two sends, in seconds.
    ///
    /// Fast connections in small sessions use the base interval; everyone else
    /// is throttled in proportion to their connection speed. A character at
    /// rest never sends faster than the stationary interval. The result is
    /// clamped to the configured bounds.
    pub fn compute_interval(
        &self,
        acceleration: Vec3,
        velocity: Vec3,
        connection: Option<&dyn ConnectionQuality>,
    ) -> f32 {
        let config = &self.config;
        let mut interval = config.send_interval;
        if let Some(connection) = connection {
            let net_speed = connection.net_speed();
            let fast = net_speed > config.throttle_at_net_speed
                && connection.player_count() <= config.throttle_over_player_count;
            if !fast {
                let bandwidth_interval = 2.0 * config.move_rep_size / net_speed.max(1.0);
                interval = config.throttled_send_interval.max(bandwidth_interval);
            }
        }
        if acceleration == Vec3::ZERO && velocity == Vec3::ZERO {
            interval = interval.max(config.stationary_send_interval);
        }
        let min = config.min_send_interval;
        interval.clamp(min, config.max_send_interval.max(min))
    }

    /// Whether at least `interval` seconds elapsed since the last send
    pub fn is_ready(&self, now: f64, interval: f32) -> bool {
        self.last_send
            .is_none_or(|last| now - last >= interval as f64)
    }

    pub fn mark_sent(&mut self, now: f64) {
        trace!(now, previous = ?self.last_send, "movement sent");
        self.last_send = Some(now);
    }

    /// Forget the previous send, so the next one goes out immediately
    pub fn reset(&mut self) {
        self.last_send = None;
    }
}
