use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The most recent transform latencies of one stage
///
/// Quantiles are taken over the retained samples only. A stage such as `typewriter` spends
/// milliseconds per record while the string transforms spend microseconds, so values are
/// kept as [`Duration`] and formatted by the caller.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    recent: Arc<Mutex<VecDeque<Duration>>>,
    limit: usize,
}

impl LatencyWindow {
    pub fn new(limit: usize) -> Self {
        Self {
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(limit))),
            limit: limit.max(1),
        }
    }

    pub fn record(&self, latency: Duration) {
        let mut recent = self.recent.lock();
        if recent.len() == self.limit {
            recent.pop_front();
        }
        recent.push_back(latency);
    }

    /// Nearest-rank quantile, `q` clamped to 0.0-1.0; zero when nothing was recorded
    pub fn quantile(&self, q: f64) -> Duration {
        let mut sorted: Vec<Duration> = self.recent.lock().iter().copied().collect();
        if sorted.is_empty() {
            return Duration::ZERO;
        }
        sorted.sort_unstable();
        let rank = (sorted.len() as f64 * q.clamp(0.0, 1.0)).ceil() as usize;
        sorted[rank.clamp(1, sorted.len()) - 1]
    }

    /// Slowest retained sample
    pub fn max(&self) -> Duration {
        self.recent.lock().iter().max().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.recent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-stage counters, shared between a stage handle and its worker thread
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Records taken off the queue and transformed
    processed: Arc<AtomicU64>,
    /// Records accepted by the downstream stage
    forwarded: Arc<AtomicU64>,
    /// Records refused by a closed downstream queue
    rejected: Arc<AtomicU64>,
    /// Records for which the transform produced no output
    suppressed: Arc<AtomicU64>,
    latency: LatencyWindow,
    start_time: Instant,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self {
            processed: Arc::new(AtomicU64::new(0)),
            forwarded: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            suppressed: Arc::new(AtomicU64::new(0)),
            latency: LatencyWindow::new(1000),
            start_time: Instant::now(),
        }
    }

    pub fn record_processed(&self, latency: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.latency.record(latency);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total_forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn total_suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Records processed per second since the stage was created
    pub fn throughput_rps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.total_processed() as f64 / elapsed
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.total_processed(),
            forwarded: self.total_forwarded(),
            rejected: self.total_rejected(),
            suppressed: self.total_suppressed(),
            throughput_rps: self.throughput_rps(),
            latency_p50: self.latency.quantile(0.50),
            latency_p95: self.latency.quantile(0.95),
            latency_p99: self.latency.quantile(0.99),
            latency_max: self.latency.max(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of stage metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub forwarded: u64,
    pub rejected: u64,
    pub suppressed: u64,
    pub throughput_rps: f64,
    pub latency_p50: Duration,
    pub latency_p95: Duration,
    pub latency_p99: Duration,
    pub latency_max: Duration,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Processed: {}, Forwarded: {}, Rejected: {}, Suppressed: {}, \
             Throughput: {:.2} rec/s, Latency P50: {:?}, P95: {:?}, P99: {:?}, Max: {:?}, \
             Elapsed: {:.2}s",
            self.processed,
            self.forwarded,
            self.rejected,
            self.suppressed,
            self.throughput_rps,
            self.latency_p50,
            self.latency_p95,
            self.latency_p99,
            self.latency_max,
            self.elapsed.as_secs_f64()
        )
    }
}
