//! Contains the `LinkConditioner` struct which can be used to simulate network conditions
use alloc::collections::BinaryHeap;
use core::cmp::Ordering;
use core::time::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Contains configuration required to initialize a LinkConditioner
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkConditionerConfig {
    /// Delay to receive incoming packets (half the RTT)
    pub latency: Duration,
    /// The maximum additional random latency to delay received incoming
    /// packets. This may be added OR subtracted from `latency`
    pub jitter: Duration,
    /// The % chance that an incoming packet will be dropped.
    /// Represented as a value between 0 and 1
    pub loss: f32,
    /// The % chance that an incoming packet will be delivered twice.
    /// Represented as a value between 0 and 1
    pub duplication: f32,
}

impl LinkConditionerConfig {
    pub fn new(latency: Duration, jitter: Duration, loss: f32) -> Self {
        LinkConditionerConfig {
            latency,
            jitter,
            loss,
            duplication: 0.0,
        }
    }

    pub fn with_duplication(mut self, duplication: f32) -> Self {
        self.duplication = duplication;
        self
    }

    /// Creates a new LinkConditioner that simulates a connection which is in a
    /// good condition
    pub fn good_condition() -> Self {
        LinkConditionerConfig {
            latency: Duration::from_millis(40),
            jitter: Duration::from_millis(6),
            loss: 0.002,
            duplication: 0.0,
        }
    }

    /// Creates a new `LinkConditioner` that simulates a connection which is in an
    /// average condition
    pub fn average_condition() -> Self {
        LinkConditionerConfig {
            latency: Duration::from_millis(100),
            jitter: Duration::from_millis(15),
            loss: 0.02,
            duplication: 0.005,
        }
    }

    /// Creates a new `LinkConditioner` that simulates a connection which is in an
    /// poor condition
    pub fn poor_condition() -> Self {
        LinkConditionerConfig {
            latency: Duration::from_millis(200),
            jitter: Duration::from_millis(30),
            loss: 0.04,
            duplication: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
struct ItemWithReadyKey<T> {
    key: Duration,
    /// Tie-breaker so that packets with the same key pop in arrival order
    order: u64,
    item: T,
}

impl<T> PartialEq for ItemWithReadyKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.order == other.order
    }
}

impl<T> Eq for ItemWithReadyKey<T> {}

impl<T> PartialOrd for ItemWithReadyKey<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ItemWithReadyKey<T> {
    /// BinaryHeap is a max-heap, so we reverse the ordering to pop the smallest key first
    fn cmp(&self, other: &Self) -> Ordering {
        other.key.cmp(&self.key).then(other.order.cmp(&self.order))
    }
}

/// Delays, drops and duplicates packets.
///
/// Time is the elapsed duration since the link was created, so that the
/// conditioner can be driven by a simulated clock.
#[derive(Debug, Clone)]
pub struct LinkConditioner<P> {
    config: LinkConditionerConfig,
    rng: StdRng,
    pushed: u64,
    time_queue: BinaryHeap<ItemWithReadyKey<P>>,
}

impl<P: Clone> LinkConditioner<P> {
    pub fn new(config: LinkConditionerConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// A conditioner whose randomness is reproducible
    pub fn with_seed(config: LinkConditionerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: LinkConditionerConfig, rng: StdRng) -> Self {
        LinkConditioner {
            config,
            rng,
            pushed: 0,
            time_queue: BinaryHeap::default(),
        }
    }

    pub fn config(&self) -> &LinkConditionerConfig {
        &self.config
    }

    /// Add latency/jitter/loss/duplication to a packet
    ///
    /// `now`: Duration since the link was created
    pub fn condition_packet(&mut self, packet: P, now: Duration) {
        if self.rng.random_range(0.0..1.0) < self.config.loss {
            return;
        }
        if self.rng.random_range(0.0..1.0) < self.config.duplication {
            let ready_at = self.ready_at(now);
            self.push(ready_at, packet.clone());
        }
        let ready_at = self.ready_at(now);
        self.push(ready_at, packet);
    }

    fn ready_at(&mut self, now: Duration) -> Duration {
        let mut latency = self.config.latency.as_millis() as i64;
        if self.config.jitter > Duration::ZERO {
            let jitter = self.config.jitter.as_millis() as i64;
            latency += self.rng.random_range(-jitter..=jitter);
        }
        now + Duration::from_millis(latency.max(0) as u64)
    }

    fn push(&mut self, key: Duration, item: P) {
        self.time_queue.push(ItemWithReadyKey {
            key,
            order: self.pushed,
            item,
        });
        self.pushed += 1;
    }

    /// Pop the next packet whose delay has elapsed
    pub fn pop_packet(&mut self, now: Duration) -> Option<P> {
        if self.time_queue.peek().is_some_and(|item| item.key <= now) {
            return self.time_queue.pop().map(|item| item.item);
        }
        None
    }

    /// Number of packets still in flight
    pub fn len(&self) -> usize {
        self.time_queue.len()
    }
}
