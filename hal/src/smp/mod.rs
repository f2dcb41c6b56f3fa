//! # Symmetric Multi-Processing Helpers
//!
//! Core identification and CPU sets.
//!
//! ```text
//!   Cluster 0 (Aff1=0)            Cluster 1 (Aff1=1)
//!   ┌──────┬──────┬──────┬──────┐ ┌──────┬──────┬──────┬──────┐
//!   │CPU 0 │CPU 1 │CPU 2 │CPU 3 │ │CPU 4 │CPU 5 │CPU 6 │CPU 7 │
//!   │Aff0=0│Aff0=1│Aff0=2│Aff0=3│ │Aff0=0│Aff0=1│Aff0=2│Aff0=3│
//!   └──────┴──────┴──────┴──────┘ └──────┴──────┴──────┴──────┘
//!          logical id = Aff1 * cores_per_cluster + Aff0
//! ```

pub mod cpumask;
pub mod mpidr;

pub use cpumask::{CpuMask, CpuMaskIter, MAX_CPUS};
pub use mpidr::{CpuAffinity, Mpidr};

/// Maximum number of clusters
pub const MAX_CLUSTERS: usize = 4;

/// Maximum number of cores per cluster
pub const MAX_CPUS_PER_CLUSTER: usize = 4;

/// Logical id of the boot processor
pub const BOOT_CPU: u32 = 0;
