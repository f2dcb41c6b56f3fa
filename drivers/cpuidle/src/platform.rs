//! # Platform Interfaces
//!
//! Everything the idle entry path touches outside this crate, grouped by
//! collaborator:
//!
//! | Trait               | Collaborator                     |
//! |---------------------|----------------------------------|
//! | [`LocalCpu`]        | the calling core                 |
//! | [`ClusterPowerOps`] | multi-cluster power manager      |
//! | [`CpuPmNotifier`]   | CPU PM notifier chain            |
//! | [`ContextSave`]     | architectural suspend primitive  |
//!
//! [`IdlePlatform`] bundles the four so entry code takes a single parameter.

use helix_hal::CpuAffinity;

pub use crate::mcpm::ClusterPowerOps;
use crate::mcpm::ResumeVector;

// =============================================================================
// LOCAL CPU
// =============================================================================

/// Control of the calling core
pub trait LocalCpu {
    /// Mask local IRQs
    fn irq_disable(&self);

    /// Unmask local IRQs
    fn irq_enable(&self);

    /// Halt until an interrupt is pending
    fn wait_for_interrupt(&self);

    /// `(cluster, core)` of the calling core
    fn current_affinity(&self) -> CpuAffinity;
}

/// [`LocalCpu`] on real hardware
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchCpu;

impl LocalCpu for ArchCpu {
    #[inline]
    fn irq_disable(&self) {
        helix_hal::cpu::local_irq_disable();
    }

    #[inline]
    fn irq_enable(&self) {
        helix_hal::cpu::local_irq_enable();
    }

    #[inline]
    fn wait_for_interrupt(&self) {
        helix_hal::cpu::wait_for_interrupt();
    }

    #[inline]
    fn current_affinity(&self) -> CpuAffinity {
        CpuAffinity::current()
    }
}

// =============================================================================
// CPU PM NOTIFIER
// =============================================================================

/// Notification chain for a CPU losing and regaining its context
pub trait CpuPmNotifier {
    /// The calling CPU is about to lose context
    fn cpu_pm_enter(&self);

    /// The calling CPU has its context back
    fn cpu_pm_exit(&self);
}

// =============================================================================
// CONTEXT SAVE
// =============================================================================

/// Return value of [`ContextSave::cpu_suspend`] after a real power loss
pub const SUSPEND_RESUMED: i32 = 0;

/// Architectural suspend primitive
pub trait ContextSave {
    /// Where a powered-down core re-enters the kernel
    fn resume_vector(&self) -> ResumeVector;

    /// Save context and call `finisher(arg)`
    ///
    /// Returns [`SUSPEND_RESUMED`] when the core came back through the resume
    /// vector, or the finisher's own value when it returned without power
    /// being removed.
    fn cpu_suspend(&self, arg: usize, finisher: &mut dyn FnMut(usize) -> i32) -> i32;
}

// =============================================================================
// IDLE PLATFORM
// =============================================================================

/// All collaborators of the idle entry path
pub trait IdlePlatform: LocalCpu + ClusterPowerOps + CpuPmNotifier + ContextSave {}

impl<T> IdlePlatform for T where T: LocalCpu + ClusterPowerOps + CpuPmNotifier + ContextSave + ?Sized {}

#[cfg(all(test, not(any(target_arch = "arm", target_arch = "aarch64"))))]
mod tests {
    use super::*;

    #[test]
    fn test_arch_cpu_on_host() {
        let cpu = ArchCpu;
        cpu.irq_disable();
        assert!(helix_hal::cpu::irqs_disabled());
        cpu.irq_enable();
        assert!(!helix_hal::cpu::irqs_disabled());
        assert_eq!(cpu.current_affinity(), CpuAffinity::new(0, 0));
    }
}
