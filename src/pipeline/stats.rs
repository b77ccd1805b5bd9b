use std::sync::atomic::{AtomicU64, Ordering};

/// Things worth counting over the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    RequestStarted,
    CacheHit,
    FallbackPlan,
    Succeeded,
    Failed,
}

/// Read-only copy of the counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    pub fallback_plans: u64,
    pub cache_hit_rate: f64,
}

/// Observability only; nothing reads these to make decisions.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    cache_hits: AtomicU64,
    fallbacks: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: PipelineEvent) {
        let counter = match event {
            PipelineEvent::RequestStarted => &self.total,
            PipelineEvent::CacheHit => &self.cache_hits,
            PipelineEvent::FallbackPlan => &self.fallbacks,
            PipelineEvent::Succeeded => &self.succeeded,
            PipelineEvent::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStats {
        let total_requests = self.total.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);

        let cache_hit_rate = if total_requests > 0 {
            cache_hits as f64 / total_requests as f64
        } else {
            0.0
        };

        PipelineStats {
            total_requests,
            successful_requests: self.succeeded.load(Ordering::Relaxed),
            failed_requests: self.failed.load(Ordering::Relaxed),
            cache_hits,
            fallback_plans: self.fallbacks.load(Ordering::Relaxed),
            cache_hit_rate,
        }
    }
}
