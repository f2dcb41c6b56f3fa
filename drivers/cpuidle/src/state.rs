//! # Idle State Descriptors
//!
//! The two states this driver exposes, and how each one is entered.
//!
//! | Index | Name | Entry                      | Exit latency | Residency | Timer |
//! |-------|------|----------------------------|--------------|-----------|-------|
//! | 0     | WFI  | wait-for-interrupt         | 1 µs         | 1 µs      | runs  |
//! | 1     | C1   | core power-down via MCPM   | 3000 µs      | 10000 µs  | stops |
//!
//! Index 0 is also the safe state the framework may always fall back to.

use static_assertions::{const_assert, const_assert_eq};

use crate::config::CpuidleConfig;
use crate::enter::{self, EntryTarget};
use crate::platform::IdlePlatform;

// =============================================================================
// STATE INDICES
// =============================================================================

/// Number of idle states in the table
pub const STATE_COUNT: usize = 2;

/// Index of the wait-for-interrupt state
pub const WFI_STATE_INDEX: usize = 0;

/// Index of the core power-down state
pub const DEEP_STATE_INDEX: usize = 1;

/// State the framework may fall back to at any time
pub const SAFE_STATE_INDEX: usize = WFI_STATE_INDEX;

const_assert_eq!(STATE_COUNT, 2);
const_assert_eq!(SAFE_STATE_INDEX, 0);
const_assert!(DEEP_STATE_INDEX < STATE_COUNT);

// =============================================================================
// STATE FLAGS
// =============================================================================

bitflags::bitflags! {
    /// Idle state properties
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StateFlags: u32 {
        /// The local timer stops; a broadcast timer must wake the core
        const TIMER_STOP = 1 << 0;
    }
}

// =============================================================================
// ENTRY OPERATION
// =============================================================================

/// How a state is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEntry {
    /// Halt in WFI, context retained
    WaitForInterrupt,
    /// Save context and hand the core to cluster power management
    CorePowerDown,
}

// =============================================================================
// IDLE STATE
// =============================================================================

/// One idle state descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleState {
    /// Short name
    pub name: &'static str,
    /// Human-readable description
    pub desc: &'static str,
    /// Worst-case exit latency (µs)
    pub exit_latency_us: u32,
    /// Minimum residency for the state to pay off (µs)
    pub target_residency_us: u32,
    /// Relative power cost (lower is better)
    pub power_usage: u32,
    /// State properties
    pub flags: StateFlags,
    /// Entry operation
    pub entry: StateEntry,
}

impl IdleState {
    /// Architectural WFI state
    pub const fn wfi() -> Self {
        Self {
            name: "WFI",
            desc: "ARM WFI",
            exit_latency_us: 1,
            target_residency_us: 1,
            power_usage: u32::MAX,
            flags: StateFlags::empty(),
            entry: StateEntry::WaitForInterrupt,
        }
    }

    /// Core power-down state with the configured residency figures
    pub const fn core_power_down(config: &CpuidleConfig) -> Self {
        Self {
            name: "C1",
            desc: "Core power down",
            exit_latency_us: config.deep_exit_latency_us,
            target_residency_us: config.deep_target_residency_us,
            power_usage: config.deep_power_usage,
            flags: if config.deep_stops_timer {
                StateFlags::TIMER_STOP
            } else {
                StateFlags::empty()
            },
            entry: StateEntry::CorePowerDown,
        }
    }

    /// Whether the local timer stops in this state
    #[inline]
    pub const fn stops_timer(&self) -> bool {
        self.flags.contains(StateFlags::TIMER_STOP)
    }

    /// Enter the state on the calling CPU and return the index entered
    pub fn enter<P: IdlePlatform + ?Sized>(
        &self,
        platform: &P,
        target: EntryTarget,
        index: usize,
    ) -> usize {
        match self.entry {
            StateEntry::WaitForInterrupt => enter::wfi_enter(platform, index),
            StateEntry::CorePowerDown => enter::core_sleep_enter(platform, target, self, index),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wfi_descriptor() {
        let wfi = IdleState::wfi();
        assert_eq!(wfi.name, "WFI");
        assert_eq!(wfi.exit_latency_us, 1);
        assert_eq!(wfi.power_usage, u32::MAX);
        assert!(!wfi.stops_timer());
        assert_eq!(wfi.entry, StateEntry::WaitForInterrupt);
    }

    #[test]
    fn test_core_power_down_descriptor() {
        let c1 = IdleState::core_power_down(&CpuidleConfig::a83t());
        assert_eq!(c1.name, "C1");
        assert_eq!(c1.desc, "Core power down");
        assert_eq!(c1.exit_latency_us, 3000);
        assert_eq!(c1.target_residency_us, 10000);
        assert_eq!(c1.power_usage, 500);
        assert!(c1.stops_timer());
        assert_eq!(c1.entry, StateEntry::CorePowerDown);
    }

    #[test]
    fn test_timer_flag_follows_config() {
        let mut config = CpuidleConfig::a83t();
        config.deep_stops_timer = false;
        assert!(!IdleState::core_power_down(&config).stops_timer());
    }
}
