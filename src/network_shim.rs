//! Optional latency/jitter/drop stage in front of a submission path.
//!
//! Built on the crate's own [`DeterministicRng`](crate::rng::DeterministicRng)
//! for the drop/jitter draw and on `tokio::time::sleep` for the latency,
//! consistent with the rest of the async stack.

use crate::rng::DeterministicRng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NetworkShimConfig {
    pub base_latency_ms: u64,
    pub jitter_ms: u64,
    pub packet_loss_rate: f64,
}

/// Outcome of sending one action through the shim.
pub struct ShimResult<T> {
    pub delivered: bool,
    pub latency_ms: u64,
    pub result: Option<T>,
}

pub struct NetworkShim {
    config: NetworkShimConfig,
    rng: DeterministicRng,
}

impl NetworkShim {
    pub fn new(config: NetworkShimConfig, rng: DeterministicRng) -> Self {
        Self { config, rng }
    }

    /// Samples a drop, then (if not dropped) sleeps a jittered latency before
    /// invoking `action`. `action` is only ever called when the message is
    /// delivered.
    pub async fn send<T>(&mut self, action: impl FnOnce() -> T) -> ShimResult<T> {
        if self.rng.gen_bool(self.config.packet_loss_rate) {
            return ShimResult {
                delivered: false,
                latency_ms: 0,
                result: None,
            };
        }
        let jitter = self
            .rng
            .gen_range_i64_inclusive(-(self.config.jitter_ms as i64), self.config.jitter_ms as i64);
        let latency_ms = (self.config.base_latency_ms as i64 + jitter).max(0) as u64;
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }
        ShimResult {
            delivered: true,
            latency_ms,
            result: Some(action()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_loss_rate_always_delivers() {
        let mut shim = NetworkShim::new(
            NetworkShimConfig {
                base_latency_ms: 0,
                jitter_ms: 0,
                packet_loss_rate: 0.0,
            },
            DeterministicRng::new(1),
        );
        for _ in 0..20 {
            let result = shim.send(|| 42).await;
            assert!(result.delivered);
            assert_eq!(result.result, Some(42));
        }
    }

    #[tokio::test]
    async fn full_loss_rate_never_delivers() {
        let mut shim = NetworkShim::new(
            NetworkShimConfig {
                base_latency_ms: 0,
                jitter_ms: 0,
                packet_loss_rate: 1.0,
            },
            DeterministicRng::new(1),
        );
        let result = shim.send(|| 42).await;
        assert!(!result.delivered);
        assert!(result.result.is_none());
    }

    #[tokio::test]
    async fn latency_stays_within_jitter_bounds() {
        let mut shim = NetworkShim::new(
            NetworkShimConfig {
                base_latency_ms: 10,
                jitter_ms: 5,
                packet_loss_rate: 0.0,
            },
            DeterministicRng::new(2),
        );
        for _ in 0..10 {
            let result = shim.send(|| ()).await;
            assert!(result.latency_ms >= 5 && result.latency_ms <= 15);
        }
    }
}
