//! Cumulative counters and a rolling latency window for the matching engine.

use std::collections::VecDeque;
use std::time::Duration;

/// Bound on the rolling per-call latency window, matching the order of
/// magnitude named for the engine's stats (avg/p95 over the last ~2,000
/// calls).
const LATENCY_WINDOW_CAPACITY: usize = 2_000;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EngineStats {
    pub orders_submitted: u64,
    pub orders_canceled: u64,
    pub orders_rejected: u64,
    pub orders_expired: u64,
    pub trades_executed: u64,
    pub avg_latency_us: f64,
    pub p95_latency_us: f64,
}

/// Accumulates counters and a bounded window of per-call latencies from
/// which `avg`/`p95` are derived on demand.
pub struct StatsRecorder {
    orders_submitted: u64,
    orders_canceled: u64,
    orders_rejected: u64,
    orders_expired: u64,
    trades_executed: u64,
    latencies_us: VecDeque<f64>,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            orders_submitted: 0,
            orders_canceled: 0,
            orders_rejected: 0,
            orders_expired: 0,
            trades_executed: 0,
            latencies_us: VecDeque::with_capacity(LATENCY_WINDOW_CAPACITY),
        }
    }

    pub fn record_submission(&mut self, trade_count: usize, elapsed: Duration) {
        self.orders_submitted += 1;
        self.trades_executed += trade_count as u64;
        self.push_latency(elapsed);
    }

    pub fn record_rejected(&mut self) {
        self.orders_rejected += 1;
    }

    pub fn record_expired(&mut self) {
        self.orders_expired += 1;
    }

    pub fn record_cancel(&mut self, elapsed: Duration) {
        self.orders_canceled += 1;
        self.push_latency(elapsed);
    }

    fn push_latency(&mut self, elapsed: Duration) {
        if self.latencies_us.len() >= LATENCY_WINDOW_CAPACITY {
            self.latencies_us.pop_front();
        }
        self.latencies_us.push_back(elapsed.as_secs_f64() * 1_000_000.0);
    }

    pub fn snapshot(&self) -> EngineStats {
        let mut sorted: Vec<f64> = self.latencies_us.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let avg = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };
        let p95 = percentile(&sorted, 0.95);
        EngineStats {
            orders_submitted: self.orders_submitted,
            orders_canceled: self.orders_canceled,
            orders_rejected: self.orders_rejected,
            orders_expired: self.orders_expired,
            trades_executed: self.trades_executed,
            avg_latency_us: avg,
            p95_latency_us: p95,
        }
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
