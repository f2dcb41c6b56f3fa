//! # Local CPU Control
//!
//! Interrupt masking, low-power wait and affinity register access for the
//! calling core. Every function here acts on the *current* CPU only.

#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
use core::arch::asm;

#[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
use core::sync::atomic::{AtomicBool, Ordering};

/// Software IRQ mask for targets without a real one
#[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
static SOFT_IRQ_MASKED: AtomicBool = AtomicBool::new(false);

// =============================================================================
// Interrupt Control
// =============================================================================

/// Mask IRQs on the local CPU
///
/// Also a compiler barrier: memory accesses are not moved across it.
#[inline]
pub fn local_irq_disable() {
    #[cfg(target_arch = "aarch64")]
    unsafe {
        asm!("msr DAIFSet, #0x2", options(nostack, preserves_flags));
    }

    #[cfg(target_arch = "arm")]
    unsafe {
        asm!("cpsid i", options(nostack, preserves_flags));
    }

    #[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
    SOFT_IRQ_MASKED.store(true, Ordering::SeqCst);
}

/// Unmask IRQs on the local CPU
#[inline]
pub fn local_irq_enable() {
    #[cfg(target_arch = "aarch64")]
    unsafe {
        asm!("msr DAIFClr, #0x2", options(nostack, preserves_flags));
    }

    #[cfg(target_arch = "arm")]
    unsafe {
        asm!("cpsie i", options(nostack, preserves_flags));
    }

    #[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
    SOFT_IRQ_MASKED.store(false, Ordering::SeqCst);
}

/// Check whether IRQs are currently masked on the local CPU
#[inline]
pub fn irqs_disabled() -> bool {
    #[cfg(target_arch = "aarch64")]
    {
        let daif: u64;
        unsafe {
            asm!("mrs {}, DAIF", out(reg) daif, options(nomem, nostack, preserves_flags));
        }
        (daif & (1 << 7)) != 0
    }

    #[cfg(target_arch = "arm")]
    {
        let cpsr: u32;
        unsafe {
            asm!("mrs {}, cpsr", out(reg) cpsr, options(nomem, nostack, preserves_flags));
        }
        (cpsr & (1 << 7)) != 0
    }

    #[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
    {
        SOFT_IRQ_MASKED.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Low-power Wait
// =============================================================================

/// Wait for interrupt
///
/// Halts instruction execution until the next interrupt becomes pending.
/// Architectural state is retained, so this is always safe to call with
/// IRQs masked: a pending interrupt still wakes the core.
#[inline]
pub fn wait_for_interrupt() {
    #[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
    unsafe {
        asm!("dsb sy", "wfi", options(nostack, preserves_flags));
    }

    #[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
    core::hint::spin_loop();
}

// =============================================================================
// Affinity Register
// =============================================================================

/// Read the raw multiprocessor affinity register of the calling CPU
///
/// ARMv7 exposes a 32-bit MPIDR; it is zero-extended so both architectures
/// share the same decoding in [`crate::smp::Mpidr`].
#[inline]
pub fn read_mpidr() -> u64 {
    #[cfg(target_arch = "aarch64")]
    {
        let value: u64;
        unsafe {
            asm!("mrs {}, mpidr_el1", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value
    }

    #[cfg(target_arch = "arm")]
    {
        let value: u32;
        unsafe {
            asm!("mrc p15, 0, {}, c0, c0, 5", out(reg) value, options(nomem, nostack, preserves_flags));
        }
        value as u64
    }

    #[cfg(not(any(target_arch = "arm", target_arch = "aarch64")))]
    {
        0
    }
}

// =============================================================================
// TESTS
// =============================================================================
