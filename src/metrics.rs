use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing upload activity.
#[derive(Default)]
pub struct UploadMetrics {
    documents_persisted: AtomicU64,
    summaries_generated: AtomicU64,
    summaries_missing: AtomicU64,
    summary_attempts: AtomicU64,
}

impl UploadMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stored document and how its summarization went.
    pub fn record_document(&self, attempts: u64, summarized: bool) {
        self.documents_persisted.fetch_add(1, Ordering::Relaxed);
        self.summary_attempts.fetch_add(attempts, Ordering::Relaxed);
        if summarized {
            self.summaries_generated.fetch_add(1, Ordering::Relaxed);
        } else {
            self.summaries_missing.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_persisted: self.documents_persisted.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            summaries_missing: self.summaries_missing.load(Ordering::Relaxed),
            summary_attempts: self.summary_attempts.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of upload counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    /// Documents written to the repository since startup.
    pub documents_persisted: u64,
    /// Documents stored with a summary.
    pub summaries_generated: u64,
    /// Documents stored with a null summary after exhausting retries.
    pub summaries_missing: u64,
    /// Summarization attempts across all uploads.
    pub summary_attempts: u64,
}
