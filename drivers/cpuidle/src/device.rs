//! # Idle Device Record
//!
//! Per-CPU handle registered alongside the CPU's driver. Created and released
//! in lock-step with the driver record for the same CPU.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::state::STATE_COUNT;

/// Idle device bound to one logical CPU
#[derive(Debug)]
pub struct IdleDevice {
    /// Logical CPU id
    cpu: u32,

    /// Entry count per state
    usage: [AtomicU64; STATE_COUNT],
}

impl IdleDevice {
    /// Create a device for `cpu`
    pub const fn new(cpu: u32) -> Self {
        Self {
            cpu,
            usage: [const { AtomicU64::new(0) }; STATE_COUNT],
        }
    }

    /// Logical CPU id
    #[inline]
    pub fn cpu(&self) -> u32 {
        self.cpu
    }

    /// Count one entry into `index`
    #[inline]
    pub fn record_entry(&self, index: usize) {
        if let Some(counter) = self.usage.get(index) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of entries into `index`
    #[inline]
    pub fn usage(&self, index: usize) -> u64 {
        self.usage
            .get(index)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }
}
