//! Observability and Metrics
//!
//! Per-controller traffic counters. Each controller owns one [`SyncMetrics`];
//! there is no global instance, so several peers in one process keep separate
//! books.
//!
//! Uses atomic counters so a metrics handle can be read from another thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Traffic and routing counters for one controller
#[derive(Debug)]
pub struct SyncMetrics {
    /// Frames handed to the transport
    pub frames_sent: AtomicU64,
    /// Frames received from the transport
    pub frames_received: AtomicU64,
    /// Bytes handed to the transport
    pub bytes_sent: AtomicU64,
    /// Bytes received from the transport
    pub bytes_received: AtomicU64,
    /// Queued frames held back by a per-tick ceiling, each counted once
    pub frames_deferred: AtomicU64,
    /// Frames discarded as malformed or carrying an unknown tag
    pub malformed_frames: AtomicU64,
    /// Events delivered to the application inbound queue
    pub app_events: AtomicU64,
    /// Application events evicted from a full inbound queue
    pub app_events_dropped: AtomicU64,
    /// Valid events that had no effect (unknown object, self echo, wrong phase)
    pub ignored_events: AtomicU64,
    /// Transport send failures
    pub send_errors: AtomicU64,
    start_time: Instant,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            frames_sent: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frames_deferred: AtomicU64::new(0),
            malformed_frames: AtomicU64::new(0),
            app_events: AtomicU64::new(0),
            app_events_dropped: AtomicU64::new(0),
            ignored_events: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a frame handed to the transport
    pub fn frame_sent(&self, byte_count: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    pub fn frame_received(&self, byte_count: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count as u64, Ordering::Relaxed);
    }

    pub fn deferred(&self, count: usize) {
        self.frames_deferred.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn app_event(&self) {
        self.app_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn app_event_dropped(&self) {
        self.app_events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ignored_event(&self) {
        self.ignored_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Zeroes every counter
    pub fn reset(&self) {
        for counter in [
            &self.frames_sent,
            &self.frames_received,
            &self.bytes_sent,
            &self.bytes_received,
            &self.frames_deferred,
            &self.malformed_frames,
            &self.app_events,
            &self.app_events_dropped,
            &self.ignored_events,
            &self.send_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_deferred: self.frames_deferred.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            app_events: self.app_events.load(Ordering::Relaxed),
            app_events_dropped: self.app_events_dropped.load(Ordering::Relaxed),
            ignored_events: self.ignored_events.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            frames_sent = snapshot.frames_sent,
            frames_received = snapshot.frames_received,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            frames_deferred = snapshot.frames_deferred,
            malformed_frames = snapshot.malformed_frames,
            app_events = snapshot.app_events,
            app_events_dropped = snapshot.app_events_dropped,
            ignored_events = snapshot.ignored_events,
            send_errors = snapshot.send_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Sync metrics snapshot"
        );
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub frames_deferred: u64,
    pub malformed_frames: u64,
    pub app_events: u64,
    pub app_events_dropped: u64,
    pub ignored_events: u64,
    pub send_errors: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_and_reset() {
        let metrics = SyncMetrics::new();
        metrics.frame_sent(100);
        metrics.frame_sent(20);
        metrics.malformed_frame();
        metrics.deferred(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.frames_sent, 2);
        assert_eq!(snap.bytes_sent, 120);
        assert_eq!(snap.malformed_frames, 1);
        assert_eq!(snap.frames_deferred, 3);

        metrics.reset();
        assert_eq!(metrics.snapshot().frames_sent, 0);
    }
}
