use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-request bookkeeping for the access log.
///
/// Create one when a request handler is constructed and call
/// [`AccessLogRecorder::record_flush`] with the buffered chunks every time
/// the handler flushes output. The byte count accumulates across partial
/// flushes and can be updated through a shared reference, so the recorder
/// may live behind an `Arc` in a response body wrapper.
#[derive(Debug)]
pub struct AccessLogRecorder {
    started: Instant,
    request_start_time: DateTime<Utc>,
    response_bytes_written: AtomicU64,
}

impl Default for AccessLogRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessLogRecorder {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            request_start_time: Utc::now(),
            response_bytes_written: AtomicU64::new(0),
        }
    }

    /// Add the length of every chunk about to be flushed.
    ///
    /// Returns the number of bytes added by this call.
    pub fn record_flush<I, C>(&self, chunks: I) -> u64
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let written: u64 = chunks
            .into_iter()
            .map(|chunk| chunk.as_ref().len() as u64)
            .sum();
        self.response_bytes_written.fetch_add(written, Ordering::Relaxed);
        written
    }

    /// Wall-clock time at which the recorder was created.
    pub fn request_start_time(&self) -> DateTime<Utc> {
        self.request_start_time
    }

    pub fn response_bytes_written(&self) -> u64 {
        self.response_bytes_written.load(Ordering::Relaxed)
    }

    /// Monotonic time since the recorder was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
