use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Process-lifetime counters served on `/metrics`.
pub struct Metrics {
    started: Instant,

    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Ingestion
    documents_ingested: AtomicUsize,
    documents_failed: AtomicUsize,
    chunks_written: AtomicUsize,
    total_ingest_time_us: AtomicU64,

    // Queries
    queries: AtomicUsize,
    total_query_time_us: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            documents_ingested: AtomicUsize::new(0),
            documents_failed: AtomicUsize::new(0),
            chunks_written: AtomicUsize::new(0),
            total_ingest_time_us: AtomicU64::new(0),
            queries: AtomicUsize::new(0),
            total_query_time_us: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_ingest(&self, duration: Duration, succeeded: usize, failed: usize, chunks: usize) {
        self.total_ingest_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.documents_ingested.fetch_add(succeeded, Ordering::Relaxed);
        self.documents_failed.fetch_add(failed, Ordering::Relaxed);
        self.chunks_written.fetch_add(chunks, Ordering::Relaxed);
    }

    pub fn record_query(&self, duration: Duration) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.total_query_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let documents_ingested = self.documents_ingested.load(Ordering::Relaxed);
        let documents_failed = self.documents_failed.load(Ordering::Relaxed);
        let queries = self.queries.load(Ordering::Relaxed);

        MetricsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            documents_ingested,
            documents_failed,
            chunks_written: self.chunks_written.load(Ordering::Relaxed),
            avg_ingest_time_ms: avg_time_ms(
                &self.total_ingest_time_us,
                documents_ingested + documents_failed,
            ),
            queries,
            avg_query_time_ms: avg_time_ms(&self.total_query_time_us, queries),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    total_us.load(Ordering::Relaxed) as f64 / count as f64 / 1000.0
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub documents_ingested: usize,
    pub documents_failed: usize,
    pub chunks_written: usize,
    pub avg_ingest_time_ms: f64,
    pub queries: usize,
    pub avg_query_time_ms: f64,
}
