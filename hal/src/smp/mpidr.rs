//! # MPIDR (Multiprocessor Affinity Register)
//!
//! Decoding of the affinity register that identifies a core inside the
//! cluster hierarchy.
//!
//! ## MPIDR Format
//!
//! ```text
//! 63            40 39   32 31 30 29   25 24 23    16 15     8 7      0
//! ┌───────────────┬───────┬──┬──┬───────┬──┬────────┬────────┬────────┐
//! │     RES0      │ Aff3  │1 │U │ RES0  │MT│  Aff2  │  Aff1  │  Aff0  │
//! └───────────────┴───────┴──┴──┴───────┴──┴────────┴────────┴────────┘
//! ```
//!
//! On ARMv7 only bits `[31:0]` exist (no Aff3).
//!
//! For the big.LITTLE-style parts this HAL targets, Aff1 is the cluster and
//! Aff0 the core inside it:
//!
//! | Platform           | Aff1    | Aff0     |
//! |--------------------|---------|----------|
//! | Allwinner A83T     | 0..=1   | 0..=3    |
//! | QEMU virt          | 0       | CPU index|

use crate::cpu;

// ============================================================================
// MPIDR Bit Definitions
// ============================================================================

/// Aff0 mask (bits 0-7)
pub const MPIDR_AFF0_MASK: u64 = 0xFF;

/// Aff1 mask (bits 8-15)
pub const MPIDR_AFF1_MASK: u64 = 0xFF << 8;

/// Aff1 shift
pub const MPIDR_AFF1_SHIFT: u64 = 8;

// ============================================================================
// MPIDR Structure
// ============================================================================

/// MPIDR register wrapper
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Mpidr(u64);

impl Mpidr {
    /// Create from raw value
    #[inline]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Create from cluster (Aff1) and core (Aff0)
    #[inline]
    pub const fn from_cluster_core(cluster: u8, core: u8) -> Self {
        Self((core as u64) | ((cluster as u64) << MPIDR_AFF1_SHIFT))
    }

    /// Read the current CPU's MPIDR
    #[inline]
    pub fn current() -> Self {
        Self(cpu::read_mpidr())
    }

    /// Get the raw MPIDR value
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Affinity level 0 (core)
    #[inline]
    pub const fn aff0(self) -> u8 {
        (self.0 & MPIDR_AFF0_MASK) as u8
    }

    /// Affinity level 1 (cluster)
    #[inline]
    pub const fn aff1(self) -> u8 {
        ((self.0 & MPIDR_AFF1_MASK) >> MPIDR_AFF1_SHIFT) as u8
    }

    /// Get cluster ID (Aff1)
    #[inline]
    pub const fn cluster_id(self) -> u8 {
        self.aff1()
    }

    /// Get core ID within cluster (Aff0)
    #[inline]
    pub const fn core_id(self) -> u8 {
        self.aff0()
    }

    /// Collapse into the `(cluster, core)` pair used by cluster power code
    #[inline]
    pub const fn cpu_affinity(self) -> CpuAffinity {
        CpuAffinity::new(self.cluster_id(), self.core_id())
    }
}

impl core::fmt::Debug for Mpidr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mpidr")
            .field("raw", &format_args!("{:#x}", self.value()))
            .field("aff1", &self.aff1())
            .field("aff0", &self.aff0())
            .finish()
    }
}

impl core::fmt::Display for Mpidr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.aff1(), self.aff0())
    }
}

// ============================================================================
// Cluster / Core Pair
// ============================================================================

/// A core's position in the cluster topology
///
/// This is what cluster power management keys its per-core bookkeeping on.
/// It is cheap to re-derive and should be read at the outermost entry point
/// of any code that may run on an arbitrary core, then passed down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuAffinity {
    /// Cluster index (MPIDR Aff1)
    pub cluster: u8,
    /// Core index inside the cluster (MPIDR Aff0)
    pub core: u8,
}

impl CpuAffinity {
    /// Create a new affinity pair
    #[inline]
    pub const fn new(cluster: u8, core: u8) -> Self {
        Self { cluster, core }
    }

    /// Affinity of the calling CPU
    #[inline]
    pub fn current() -> Self {
        Mpidr::current().cpu_affinity()
    }

    /// Linear CPU number for a topology with a fixed number of cores per
    /// cluster
    ///
    /// Returns `None` when the id does not fit in a `u32`.
    #[inline]
    pub const fn logical_id(self, cores_per_cluster: u32) -> Option<u32> {
        match (self.cluster as u32).checked_mul(cores_per_cluster) {
            Some(base) => base.checked_add(self.core as u32),
            None => None,
        }
    }

    /// Inverse of [`CpuAffinity::logical_id`]
    ///
    /// Returns `None` for a zero-sized cluster or an id that does not fit the
    /// 8-bit affinity fields.
    #[inline]
    pub const fn from_logical_id(cpu: u32, cores_per_cluster: u32) -> Option<Self> {
        if cores_per_cluster == 0 {
            return None;
        }
        let cluster = cpu / cores_per_cluster;
        let core = cpu % cores_per_cluster;
        if cluster > u8::MAX as u32 || core > u8::MAX as u32 {
            return None;
        }
        Some(Self::new(cluster as u8, core as u8))
    }
}

impl core::fmt::Display for CpuAffinity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "cluster {} core {}", self.cluster, self.core)
    }
}

// ============================================================================
// TESTS
// ============================================================================
