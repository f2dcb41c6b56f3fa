//! # Driver Configuration
//!
//! Board-level knobs for the idle driver: which CPUs exist, how they are
//! grouped into clusters, which CPU must never be powered down, and the
//! residency figures advertised for the core power-down state.

use helix_hal::smp::{MAX_CLUSTERS, MAX_CPUS_PER_CLUSTER};
use helix_hal::CpuMask;

use crate::cpuidle_ensure;
use crate::error::{CpuidleResult, ErrorKind};

/// Idle driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuidleConfig {
    /// Driver name reported to the idle framework
    pub name: &'static str,

    /// Logical CPU that never enters core power-down
    pub primary_cpu: u32,

    /// Every CPU that may ever come online
    pub possible_cpus: CpuMask,

    /// Cores per cluster (MPIDR Aff0 range)
    pub cores_per_cluster: u32,

    /// Worst-case wake-up latency of the power-down state (µs)
    pub deep_exit_latency_us: u32,

    /// Minimum worthwhile residency of the power-down state (µs)
    pub deep_target_residency_us: u32,

    /// Relative power cost of the power-down state
    pub deep_power_usage: u32,

    /// Whether the local timer stops while powered down
    pub deep_stops_timer: bool,
}

impl CpuidleConfig {
    /// Allwinner A83T: two clusters of four Cortex-A7 cores
    pub const fn a83t() -> Self {
        Self {
            name: "allwinner_a83t_idle",
            primary_cpu: helix_hal::smp::BOOT_CPU,
            possible_cpus: CpuMask::first(8),
            cores_per_cluster: 4,
            deep_exit_latency_us: 3000,
            deep_target_residency_us: 10000,
            deep_power_usage: 500,
            deep_stops_timer: true,
        }
    }

    /// Set the driver name
    pub const fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Set the CPU that must stay out of core power-down
    pub const fn with_primary_cpu(mut self, cpu: u32) -> Self {
        self.primary_cpu = cpu;
        self
    }

    /// Set the possible-CPU mask
    pub const fn with_possible_cpus(mut self, cpus: CpuMask) -> Self {
        self.possible_cpus = cpus;
        self
    }

    /// Set the cluster width
    pub const fn with_cores_per_cluster(mut self, cores: u32) -> Self {
        self.cores_per_cluster = cores;
        self
    }

    /// Set exit latency and target residency of the power-down state
    pub const fn with_deep_residency(mut self, exit_latency_us: u32, target_residency_us: u32) -> Self {
        self.deep_exit_latency_us = exit_latency_us;
        self.deep_target_residency_us = target_residency_us;
        self
    }

    /// Number of possible CPUs
    pub const fn cpu_count(&self) -> u32 {
        self.possible_cpus.weight()
    }

    /// Check the configuration describes a topology this driver can drive
    pub fn validate(&self) -> CpuidleResult<()> {
        cpuidle_ensure!(
            !self.possible_cpus.is_empty(),
            ErrorKind::InvalidArgument,
            "No possible CPUs"
        );
        cpuidle_ensure!(
            self.cores_per_cluster > 0 && self.cores_per_cluster as usize <= MAX_CPUS_PER_CLUSTER,
            ErrorKind::InvalidArgument,
            "Unsupported cluster width"
        );
        cpuidle_ensure!(
            self.possible_cpus
                .iter()
                .all(|cpu| cpu < self.cores_per_cluster * MAX_CLUSTERS as u32),
            ErrorKind::InvalidArgument,
            "CPU outside the cluster topology"
        );
        cpuidle_ensure!(
            self.deep_target_residency_us >= self.deep_exit_latency_us,
            ErrorKind::InvalidArgument,
            "Target residency shorter than exit latency"
        );
        Ok(())
    }
}

impl Default for CpuidleConfig {
    fn default() -> Self {
        Self::a83t()
    }
}

// =============================================================================
// TESTS
// =============================================================================
