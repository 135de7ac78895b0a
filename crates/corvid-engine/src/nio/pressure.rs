//! Off-heap memory accounting

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

/// Sink for off-heap allocation sizes, so a collector can factor mapped
/// memory into its decisions. Hosts without a tracing collector can treat
/// it as a plain metric.
pub trait MemoryPressure: Send + Sync + fmt::Debug {
    /// `bytes` more off-heap memory is live.
    fn add(&self, bytes: u64);

    /// `bytes` of off-heap memory were released.
    fn remove(&self, bytes: u64);

    /// Bytes currently accounted.
    fn current(&self) -> u64;
}

/// Atomic counter of externally allocated bytes.
#[derive(Debug, Default)]
pub struct ExternalMemory {
    bytes: AtomicU64,
}

impl ExternalMemory {
    /// A counter starting at zero.
    pub const fn new() -> Self {
        Self {
            bytes: AtomicU64::new(0),
        }
    }
}

impl MemoryPressure for ExternalMemory {
    fn add(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::AcqRel);
    }

    fn remove(&self, bytes: u64) {
        // saturate rather than wrap if a caller over-releases
        let _ = self
            .bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    fn current(&self) -> u64 {
        self.bytes.load(Ordering::Acquire)
    }
}

static SHARED: Lazy<Arc<ExternalMemory>> = Lazy::new(|| Arc::new(ExternalMemory::new()));

/// The process-wide counter.
pub fn shared() -> Arc<ExternalMemory> {
    SHARED.clone()
}
