use std::time::Instant;

use super::meter::Timer;

/// RAII guard for measuring and recording latency
pub struct LatencyGuard {
    start: Instant,
    timer: Timer,
}

impl LatencyGuard {
    pub fn new(timer: Timer) -> Self {
        Self {
            start: Instant::now(),
            timer,
        }
    }
}

impl Drop for LatencyGuard {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::observability::{MeterRegistry, PullRegistry};

    #[test]
    fn test_latency_guard_records_time() {
        let registry = MeterRegistry::new();
        PullRegistry::configure(&registry).unwrap();
        let timer = Timer::builder("test_latency")
            .buckets(&[0.005, 0.01, 0.1])
            .register(&registry)
            .unwrap();

        {
            let _guard = timer.start();
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        assert!(timer.total_time().as_secs_f64() >= 0.01);
        assert_eq!(timer.count(), 1);
    }
}
