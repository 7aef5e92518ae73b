// Metrics module - Prometheus-compatible counters
// Exported as text on GET /metrics

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::image_optimizer::{EnginePlan, OutputFormat};

/// Metrics struct tracks counters for Prometheus export
/// Thread-safe via atomic operations and a mutex for labelled counters
#[derive(Default)]
pub struct Metrics {
    // Request counters
    request_count: AtomicU64,
    status_counts: Mutex<BTreeMap<u16, u64>>,

    // Cache
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    stale_evictions: AtomicU64,
    purges: AtomicU64,

    // Engine
    transforms_by_format: Mutex<BTreeMap<&'static str, u64>>,
    raster_only_plans: AtomicU64,
    hybrid_plans: AtomicU64,
    engine_fallbacks: AtomicU64,

    // Outcomes
    rejections: AtomicU64,
    failures: AtomicU64,
    bytes_sent: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_status_count(&self, status: u16) {
        *self.status_counts.lock().entry(status).or_insert(0) += 1;
    }

    pub fn increment_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stale_eviction(&self) {
        self.stale_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_purge(&self) {
        self.purges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transform(&self, format: OutputFormat, plan: EnginePlan, used_fallback: bool) {
        *self
            .transforms_by_format
            .lock()
            .entry(format.as_str())
            .or_insert(0) += 1;
        match plan {
            EnginePlan::RasterOnly => self.raster_only_plans.fetch_add(1, Ordering::Relaxed),
            EnginePlan::Hybrid => self.hybrid_plans.fetch_add(1, Ordering::Relaxed),
        };
        if used_fallback {
            self.engine_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    // Getters used by tests and health output

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn stale_evictions(&self) -> u64 {
        self.stale_evictions.load(Ordering::Relaxed)
    }

    pub fn purges(&self) -> u64 {
        self.purges.load(Ordering::Relaxed)
    }

    pub fn engine_fallbacks(&self) -> u64 {
        self.engine_fallbacks.load(Ordering::Relaxed)
    }

    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn status_count(&self, status: u16) -> u64 {
        self.status_counts.lock().get(&status).copied().unwrap_or(0)
    }

    /// Render all counters in the Prometheus text exposition format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        counter(
            &mut output,
            "kagami_requests_total",
            "Total number of HTTP requests received",
            self.request_count(),
        );

        output.push_str("\n# HELP kagami_requests_by_status_total HTTP responses by status code\n");
        output.push_str("# TYPE kagami_requests_by_status_total counter\n");
        for (status, count) in self.status_counts.lock().iter() {
            output.push_str(&format!(
                "kagami_requests_by_status_total{{status=\"{}\"}} {}\n",
                status, count
            ));
        }

        output.push('\n');
        counter(&mut output, "kagami_cache_hits_total", "Responses served from cache", self.cache_hits());
        output.push('\n');
        counter(
            &mut output,
            "kagami_cache_misses_total",
            "Requests that required a transform",
            self.cache_misses(),
        );
        output.push('\n');
        counter(
            &mut output,
            "kagami_cache_stale_evictions_total",
            "Identity-only entries evicted after a metadata change",
            self.stale_evictions(),
        );
        output.push('\n');
        counter(
            &mut output,
            "kagami_cache_purges_total",
            "Authorised cache purge requests",
            self.purges.load(Ordering::Relaxed),
        );

        output.push_str("\n# HELP kagami_transforms_total Completed transforms by output format\n");
        output.push_str("# TYPE kagami_transforms_total counter\n");
        for (format, count) in self.transforms_by_format.lock().iter() {
            output.push_str(&format!(
                "kagami_transforms_total{{format=\"{}\"}} {}\n",
                format, count
            ));
        }

        output.push_str("\n# HELP kagami_engine_plans_total Transforms by engine plan\n");
        output.push_str("# TYPE kagami_engine_plans_total counter\n");
        output.push_str(&format!(
            "kagami_engine_plans_total{{plan=\"raster_only\"}} {}\n",
            self.raster_only_plans.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "kagami_engine_plans_total{{plan=\"hybrid\"}} {}\n",
            self.hybrid_plans.load(Ordering::Relaxed)
        ));

        output.push('\n');
        counter(
            &mut output,
            "kagami_engine_fallbacks_total",
            "Codec decode failures recovered by the raster engine",
            self.engine_fallbacks(),
        );
        output.push('\n');
        counter(
            &mut output,
            "kagami_rejections_total",
            "Requests rejected by validation or authorisation",
            self.rejections(),
        );
        output.push('\n');
        counter(&mut output, "kagami_failures_total", "Internal failures", self.failures());
        output.push('\n');
        counter(
            &mut output,
            "kagami_bytes_sent_total",
            "Image bytes written to clients",
            self.bytes_sent.load(Ordering::Relaxed),
        );

        output
    }
}

fn counter(output: &mut String, name: &str, help: &str, value: u64) {
    output.push_str(&format!("# HELP {} {}\n", name, help));
    output.push_str(&format!("# TYPE {} counter\n", name));
    output.push_str(&format!("{} {}\n", name, value));
}
