//! # Idle State Entry
//!
//! Entry routines behind the two state descriptors.
//!
//! ## Core Power-Down Sequence
//!
//! ```text
//!  irq_disable
//!      │
//!      ▼
//!  decide(target, state) ───── Wait ─────▶ wait_for_interrupt ──┐
//!      │                                                        │
//!   PowerDown                                                   │
//!      ▼                                                        │
//!  cpu_pm_enter                                                 │
//!  cpu_suspend(0, finisher) ─▶ set_entry_vector ─▶ mcpm suspend │
//!      │   (resume vector or local return)                      │
//!      ▼                                                        │
//!  cpu_powered_up                                               │
//!  cpu_pm_exit                                                  │
//!      │                                                        │
//!      ▼                                                        │
//!  irq_enable ◀─────────────────────────────────────────────────┘
//!      │
//!      ▼
//!  return idx
//! ```
//!
//! Nothing here fails: every path returns the requested index.

use helix_hal::CpuAffinity;

use crate::device::IdleDevice;
use crate::driver::IdleDriver;
use crate::finisher::{SleepFinisher, FINISHER_RESUMED};
use crate::platform::{IdlePlatform, LocalCpu};
use crate::state::{IdleState, StateEntry};

// =============================================================================
// ENTRY TARGET
// =============================================================================

/// The calling CPU, as the entry routines see it
///
/// Copied out of the registered records before entry, so a core asleep in
/// MCPM holds no reference into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTarget {
    /// Logical CPU id of the device
    pub cpu: u32,
    /// CPU that must never power down
    pub primary_cpu: u32,
    /// Hardware position of the calling core
    pub affinity: CpuAffinity,
}

impl EntryTarget {
    /// Snapshot of `device` and `driver` for the core at `affinity`
    pub fn new(affinity: CpuAffinity, device: &IdleDevice, driver: &IdleDriver) -> Self {
        Self {
            cpu: device.cpu(),
            primary_cpu: driver.primary_cpu(),
            affinity,
        }
    }

    /// Whether this is the primary CPU
    #[inline]
    pub const fn is_primary(&self) -> bool {
        self.cpu == self.primary_cpu
    }
}

// =============================================================================
// TRANSITION DECISION
// =============================================================================

/// What the calling core does for one idle request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Halt in WFI with context retained
    Wait,
    /// Save context and power the core down through MCPM
    PowerDown,
}

/// Choose the transition for `state` on the target CPU
pub fn decide(target: &EntryTarget, state: &IdleState) -> Transition {
    // The primary CPU never powers down
    if target.is_primary() {
        return Transition::Wait;
    }

    match state.entry {
        StateEntry::CorePowerDown => Transition::PowerDown,
        StateEntry::WaitForInterrupt => Transition::Wait,
    }
}

// =============================================================================
// ENTRY ROUTINES
// =============================================================================

/// Enter the WFI state
pub fn wfi_enter<P: LocalCpu + ?Sized>(cpu: &P, index: usize) -> usize {
    cpu.wait_for_interrupt();
    index
}

/// Enter the core power-down state
///
/// `target` must describe the calling core and `state` must be the
/// descriptor at `index`. The requested index is returned even when the
/// request was served by a plain wait.
pub fn core_sleep_enter<P: IdlePlatform + ?Sized>(
    platform: &P,
    target: EntryTarget,
    state: &IdleState,
    index: usize,
) -> usize {
    platform.irq_disable();

    match decide(&target, state) {
        Transition::Wait => platform.wait_for_interrupt(),
        Transition::PowerDown => power_down(platform, target.affinity),
    }

    platform.irq_enable();
    index
}

/// PM handshake around the suspend primitive; IRQs are masked
fn power_down<P: IdlePlatform + ?Sized>(platform: &P, affinity: CpuAffinity) {
    log::debug!("cpuidle: {}: core sleep", affinity);

    platform.cpu_pm_enter();

    let finisher = SleepFinisher::new(platform, affinity, platform.resume_vector());
    let status = platform.cpu_suspend(0, &mut |arg| finisher.finish(arg));
    if status == FINISHER_RESUMED {
        log::debug!("cpuidle: {}: suspend returned without power loss", affinity);
    }

    log::debug!("cpuidle: {}: power up", affinity);

    platform.cpu_powered_up();
    platform.cpu_pm_exit();
}

// =============================================================================
// TESTS
// =============================================================================
