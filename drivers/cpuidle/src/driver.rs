//! # Idle State Table
//!
//! The driver record handed to the idle framework: two state descriptors, a
//! safe-state index and the set of CPUs the table applies to.
//!
//! One canonical table is built from the configuration; every CPU gets its
//! own clone bound to a single-CPU mask, so no two CPUs share a mutable
//! driver record.

use helix_hal::CpuMask;

use crate::config::CpuidleConfig;
use crate::cpuidle_ensure;
use crate::error::{CpuidleResult, ErrorKind};
use crate::state::{IdleState, DEEP_STATE_INDEX, SAFE_STATE_INDEX, STATE_COUNT, WFI_STATE_INDEX};

/// Idle driver (state table)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleDriver {
    /// Driver name
    name: &'static str,

    /// State descriptors, index 0 first
    states: [IdleState; STATE_COUNT],

    /// Declared number of states
    state_count: usize,

    /// State the framework may always fall back to
    safe_state_index: usize,

    /// CPU that must never be powered down by this driver
    primary_cpu: u32,

    /// CPUs this table is bound to
    cpumask: CpuMask,
}

impl IdleDriver {
    /// Build the canonical (unbound) table
    pub const fn canonical(config: &CpuidleConfig) -> Self {
        let mut states = [IdleState::wfi(); STATE_COUNT];
        states[DEEP_STATE_INDEX] = IdleState::core_power_down(config);

        Self {
            name: config.name,
            states,
            state_count: STATE_COUNT,
            safe_state_index: SAFE_STATE_INDEX,
            primary_cpu: config.primary_cpu,
            cpumask: CpuMask::EMPTY,
        }
    }

    /// Bind this table to exactly one CPU
    pub fn bind_cpu(&mut self, cpu: u32) {
        self.cpumask = CpuMask::of(cpu);
    }

    /// Driver name
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared number of states
    #[inline]
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Safe fallback state
    #[inline]
    pub fn safe_state_index(&self) -> usize {
        self.safe_state_index
    }

    /// CPU kept out of core power-down
    #[inline]
    pub fn primary_cpu(&self) -> u32 {
        self.primary_cpu
    }

    /// CPUs this table applies to
    #[inline]
    pub fn cpumask(&self) -> CpuMask {
        self.cpumask
    }

    /// The bound CPU, if the mask has exactly one
    #[inline]
    pub fn cpu(&self) -> Option<u32> {
        self.cpumask.single()
    }

    /// All state descriptors
    #[inline]
    pub fn states(&self) -> &[IdleState] {
        &self.states[..self.state_count]
    }

    /// Descriptor for `index`
    #[inline]
    pub fn state(&self, index: usize) -> Option<&IdleState> {
        self.states().get(index)
    }

    /// Clamp an index requested by the framework to one this table declares
    #[inline]
    pub fn resolve_index(&self, index: usize) -> usize {
        if index < self.state_count {
            index
        } else {
            self.safe_state_index
        }
    }

    /// Check the table obeys the layout the entry code depends on
    pub fn validate(&self) -> CpuidleResult<()> {
        cpuidle_ensure!(
            self.state_count == STATE_COUNT,
            ErrorKind::InvalidArgument,
            "Unexpected state count"
        );
        cpuidle_ensure!(
            self.safe_state_index == WFI_STATE_INDEX,
            ErrorKind::InvalidArgument,
            "Safe state must be WFI"
        );
        cpuidle_ensure!(
            self.cpumask.weight() == 1,
            ErrorKind::InvalidArgument,
            "Driver must be bound to exactly one CPU"
        );
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
