//! # Cluster Power Management (MCPM) Interface
//!
//! The multi-cluster power manager physically powers cores down and back up.
//! Before a core is allowed to lose power it must be told where that core
//! resumes; after the core is back it must be told so explicitly.
//!
//! ```text
//!   core 5 (cluster 1, core 1)            MCPM
//!   ──────────────────────────            ────
//!   set_entry_vector(1.1, resume) ──────▶ vectors[1][1] = resume
//!   suspend_core()                ──────▶ power down ... wake
//!   ─── reset, jump to resume ◀────────── vectors[1][1]
//!   cpu_powered_up()              ──────▶ bookkeeping
//! ```
//!
//! [`EntryVectors`] is the per-core vector table a [`ClusterPowerOps`]
//! implementation can keep.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use helix_hal::smp::{MAX_CLUSTERS, MAX_CPUS_PER_CLUSTER};
use helix_hal::CpuAffinity;

use crate::error::{CpuidleError, CpuidleResult, ErrorKind};

// =============================================================================
// RESUME VECTOR
// =============================================================================

/// Address a core resumes at after a power-down
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ResumeVector(usize);

impl ResumeVector {
    /// No vector; the core is not expected to resume through MCPM
    pub const NONE: Self = Self(0);

    /// Create from a physical address
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Raw address
    #[inline]
    pub const fn addr(self) -> usize {
        self.0
    }

    /// Check if a vector is set
    #[inline]
    pub const fn is_set(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for ResumeVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResumeVector({:#x})", self.0)
    }
}

// =============================================================================
// CLUSTER POWER OPERATIONS
// =============================================================================

/// Operations the idle driver needs from the cluster power manager
pub trait ClusterPowerOps {
    /// Whether a cluster power backend is installed
    fn is_available(&self) -> bool;

    /// Record where `affinity` resumes after its next power-down
    fn set_entry_vector(&self, affinity: CpuAffinity, vector: ResumeVector);

    /// Power down the calling core
    ///
    /// Does not return when power is actually removed. A return means the
    /// core never went down (e.g. a wake-up was already pending).
    fn suspend_core(&self);

    /// The calling core is running again after [`ClusterPowerOps::suspend_core`]
    fn cpu_powered_up(&self);
}

// =============================================================================
// ENTRY VECTOR TABLE
// =============================================================================

/// Per-core resume vectors keyed by `(cluster, core)`
///
/// Each slot is written only by the core it belongs to, and read by the
/// power controller when that core is released from reset.
pub struct EntryVectors {
    slots: [[AtomicUsize; MAX_CPUS_PER_CLUSTER]; MAX_CLUSTERS],
}

impl EntryVectors {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            slots: [const { [const { AtomicUsize::new(0) }; MAX_CPUS_PER_CLUSTER] }; MAX_CLUSTERS],
        }
    }

    fn slot(&self, affinity: CpuAffinity) -> CpuidleResult<&AtomicUsize> {
        self.slots
            .get(affinity.cluster as usize)
            .and_then(|cluster| cluster.get(affinity.core as usize))
            .ok_or(CpuidleError::new(
                ErrorKind::InvalidArgument,
                "Affinity outside the vector table",
            ))
    }

    /// Set the resume vector of `affinity`
    pub fn set(&self, affinity: CpuAffinity, vector: ResumeVector) -> CpuidleResult<()> {
        self.slot(affinity)?.store(vector.addr(), Ordering::Release);
        Ok(())
    }

    /// Resume vector of `affinity`
    pub fn get(&self, affinity: CpuAffinity) -> CpuidleResult<ResumeVector> {
        Ok(ResumeVector::new(self.slot(affinity)?.load(Ordering::Acquire)))
    }

    /// Forget the resume vector of `affinity`
    pub fn clear(&self, affinity: CpuAffinity) -> CpuidleResult<()> {
        self.set(affinity, ResumeVector::NONE)
    }
}

impl Default for EntryVectors {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntryVectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (cluster, cores) in self.slots.iter().enumerate() {
            for (core, slot) in cores.iter().enumerate() {
                let addr = slot.load(Ordering::Relaxed);
                if addr != 0 {
                    list.entry(&(cluster, core, ResumeVector::new(addr)));
                }
            }
        }
        list.finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
