use crate::record::LogRecord;
use crate::sink::RecordSink;
use std::sync::{Arc, Mutex, MutexGuard};

/// A sink that keeps every record in memory.
///
/// Useful for unit tests and for integrations that want to inspect access
/// records before handing them elsewhere. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        // A panic while holding the lock cannot leave a Vec half-pushed.
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of all records emitted so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Remove and return all records emitted so far.
    pub fn take(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.lock())
    }

    pub fn last(&self) -> Option<LogRecord> {
        self.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: LogRecord) {
        self.lock().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;

    #[test]
    fn clones_share_records() {
        let sink = MemorySink::new();
        let other = sink.clone();
        sink.emit(LogRecord::new("access", Level::Info, "one"));
        other.emit(LogRecord::new("access", Level::Warning, "two"));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.last().map(|r| r.msg), Some("two".to_string()));
        assert_eq!(other.take().len(), 2);
        assert!(sink.is_empty());
    }
}
