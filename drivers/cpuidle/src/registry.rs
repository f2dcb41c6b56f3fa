//! # Idle Registry
//!
//! Framework-side storage for per-CPU driver and device records, and the
//! dispatch the idle loop calls into.
//!
//! ```text
//!   slots[cpu] ──▶ ┌──────────────────────────────┐
//!                  │ driver: Box<IdleDriver>      │  mask = {cpu}
//!                  │ device: Box<IdleDevice>      │  cpu  = cpu
//!                  └──────────────────────────────┘
//! ```
//!
//! Slots are indexed by logical CPU id. Each record is owned by its slot from
//! registration until it is handed back by an unregister call.

extern crate alloc;
use alloc::boxed::Box;

use helix_hal::smp::MAX_CPUS;
use helix_hal::{CpuAffinity, CpuMask};
use spin::RwLock;

use crate::cpuidle_ensure;
use crate::device::IdleDevice;
use crate::driver::IdleDriver;
use crate::enter::EntryTarget;
use crate::error::{CpuidleError, CpuidleResult, ErrorKind};
use crate::framework::IdleFramework;
use crate::platform::IdlePlatform;
use crate::state::{IdleState, SAFE_STATE_INDEX};

/// Records owned for one CPU
struct Slot {
    driver: Option<Box<IdleDriver>>,
    device: Option<Box<IdleDevice>>,
}

impl Slot {
    const EMPTY: Self = Self {
        driver: None,
        device: None,
    };
}

/// Per-CPU arena of idle records
pub struct IdleRegistry {
    slots: [RwLock<Slot>; MAX_CPUS],
    possible: CpuMask,
    cores_per_cluster: u32,
}

impl IdleRegistry {
    /// Create an empty registry for the given CPUs and cluster width
    pub const fn new(possible: CpuMask, cores_per_cluster: u32) -> Self {
        Self {
            slots: [const { RwLock::new(Slot::EMPTY) }; MAX_CPUS],
            possible,
            cores_per_cluster,
        }
    }

    /// CPUs this registry accepts records for
    pub fn possible_cpus(&self) -> CpuMask {
        self.possible
    }

    /// Cores per cluster used to map affinities to logical ids
    pub fn cores_per_cluster(&self) -> u32 {
        self.cores_per_cluster
    }

    fn slot(&self, cpu: u32) -> CpuidleResult<&RwLock<Slot>> {
        cpuidle_ensure!(
            self.possible.contains(cpu),
            ErrorKind::InvalidArgument,
            "CPU is not possible"
        );
        self.slots
            .get(cpu as usize)
            .ok_or(CpuidleError::from_kind(ErrorKind::InvalidArgument))
    }

    /// Number of registered drivers
    pub fn driver_count(&self) -> usize {
        self.slots.iter().filter(|s| s.read().driver.is_some()).count()
    }

    /// Number of registered devices
    pub fn device_count(&self) -> usize {
        self.slots.iter().filter(|s| s.read().device.is_some()).count()
    }

    /// Run `f` on the driver registered for `cpu`
    pub fn with_driver<R>(&self, cpu: u32, f: impl FnOnce(&IdleDriver) -> R) -> Option<R> {
        let slot = self.slot(cpu).ok()?.read();
        slot.driver.as_deref().map(f)
    }

    /// Run `f` on the device registered for `cpu`
    pub fn with_device<R>(&self, cpu: u32, f: impl FnOnce(&IdleDevice) -> R) -> Option<R> {
        let slot = self.slot(cpu).ok()?.read();
        slot.device.as_deref().map(f)
    }

    // =========================================================================
    // Idle Dispatch
    // =========================================================================

    /// Enter idle state `index` on the calling CPU
    ///
    /// Returns the index of the state actually entered. A CPU with no
    /// registered records, or an index the table does not declare, gets the
    /// safe state. No slot lock is held while the core is idle.
    pub fn enter_idle<P: IdlePlatform + ?Sized>(&self, platform: &P, index: usize) -> usize {
        let affinity = platform.current_affinity();
        let Some(cpu) = affinity.logical_id(self.cores_per_cluster) else {
            log::warn!("cpuidle: {} has no logical CPU id", affinity);
            return Self::enter_safe(platform);
        };

        match self.prepare_entry(cpu, affinity, index) {
            Some((target, state, resolved)) => state.enter(platform, target, resolved),
            None => Self::enter_safe(platform),
        }
    }

    /// Resolve `index` against the CPU's records and count the entry
    ///
    /// The slot is only read-locked for the duration of this call.
    fn prepare_entry(
        &self,
        cpu: u32,
        affinity: CpuAffinity,
        index: usize,
    ) -> Option<(EntryTarget, IdleState, usize)> {
        let slot = self.slot(cpu).ok()?.read();
        let (driver, device) = (slot.driver.as_deref()?, slot.device.as_deref()?);

        let resolved = driver.resolve_index(index);
        if resolved != index {
            log::warn!(
                "cpuidle: CPU{}: state {} out of range, using {}",
                cpu,
                index,
                resolved
            );
        }
        let state = *driver.state(resolved)?;

        #[cfg(feature = "debug")]
        log::debug!("cpuidle: CPU{} ({}) enter {}", cpu, affinity, state.name);

        device.record_entry(resolved);
        Some((EntryTarget::new(affinity, device, driver), state, resolved))
    }

    fn enter_safe<P: IdlePlatform + ?Sized>(platform: &P) -> usize {
        platform.wait_for_interrupt();
        SAFE_STATE_INDEX
    }
}

impl IdleFramework for IdleRegistry {
    fn register_driver(&self, driver: Box<IdleDriver>) -> CpuidleResult<()> {
        driver.validate()?;
        let Some(cpu) = driver.cpu() else {
            return Err(CpuidleError::from_kind(ErrorKind::InvalidArgument));
        };

        let mut slot = self.slot(cpu)?.write();
        cpuidle_ensure!(
            slot.driver.is_none(),
            ErrorKind::AlreadyExists,
            "Driver already registered"
        );
        slot.driver = Some(driver);
        Ok(())
    }

    fn unregister_driver(&self, cpu: u32) -> Option<Box<IdleDriver>> {
        self.slot(cpu).ok()?.write().driver.take()
    }

    fn register_device(&self, device: Box<IdleDevice>) -> CpuidleResult<()> {
        let mut slot = self.slot(device.cpu())?.write();
        cpuidle_ensure!(
            slot.driver.is_some(),
            ErrorKind::NotFound,
            "No driver for this CPU"
        );
        cpuidle_ensure!(
            slot.device.is_none(),
            ErrorKind::AlreadyExists,
            "Device already registered"
        );
        slot.device = Some(device);
        Ok(())
    }

    fn unregister_device(&self, cpu: u32) -> Option<Box<IdleDevice>> {
        self.slot(cpu).ok()?.write().device.take()
    }
}

impl core::fmt::Debug for IdleRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdleRegistry")
            .field("possible", &self.possible)
            .field("cores_per_cluster", &self.cores_per_cluster)
            .field("drivers", &self.driver_count())
            .field("devices", &self.device_count())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DEEP_STATE_INDEX, WFI_STATE_INDEX};
    use crate::testing::{canonical_driver_for, device_for, Event, MockPlatform};
    use core::sync::atomic::{AtomicBool, Ordering};

    extern crate std;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn populated(cpus: u32) -> IdleRegistry {
        let registry = IdleRegistry::new(CpuMask::first(cpus), 4);
        for cpu in 0..cpus {
            registry.register_driver(Box::new(canonical_driver_for(cpu))).unwrap();
            registry.register_device(Box::new(device_for(cpu))).unwrap();
        }
        registry
    }

    #[test]
    fn test_register_and_query() {
        let registry = populated(4);
        assert_eq!(registry.driver_count(), 4);
        assert_eq!(registry.device_count(), 4);

        for cpu in 0..4 {
            assert_eq!(registry.with_driver(cpu, |d| d.cpumask()), Some(CpuMask::of(cpu)));
            assert_eq!(registry.with_device(cpu, |d| d.cpu()), Some(cpu));
        }
        assert_eq!(registry.with_driver(4, |d| d.cpu()), None);
    }

    #[test]
    fn test_duplicate_driver_rejected() {
        let registry = populated(1);
        let err = registry
            .register_driver(Box::new(canonical_driver_for(0)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(registry.driver_count(), 1);
    }

    #[test]
    fn test_driver_must_be_bound_to_possible_cpu() {
        let registry = IdleRegistry::new(CpuMask::first(2), 4);

        let unbound = IdleDriver::canonical(&crate::config::CpuidleConfig::a83t());
        assert!(registry.register_driver(Box::new(unbound)).is_err());

        let err = registry
            .register_driver(Box::new(canonical_driver_for(7)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(registry.driver_count(), 0);
    }

    #[test]
    fn test_device_requires_driver() {
        let registry = IdleRegistry::new(CpuMask::first(2), 4);
        let err = registry.register_device(Box::new(device_for(1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(registry.device_count(), 0);
    }

    #[test]
    fn test_unregister_hands_records_back() {
        let registry = populated(2);

        let dev = registry.unregister_device(1).unwrap();
        assert_eq!(dev.cpu(), 1);
        let drv = registry.unregister_driver(1).unwrap();
        assert_eq!(drv.cpu(), Some(1));

        assert!(registry.unregister_device(1).is_none());
        assert!(registry.unregister_driver(1).is_none());
        assert_eq!(registry.driver_count(), 1);
    }

    #[test]
    fn test_enter_idle_dispatches_on_calling_core() {
        let registry = populated(8);
        // cluster 1 core 2 is logical CPU 6
        let platform = MockPlatform::new(CpuAffinity::new(1, 2));

        assert_eq!(registry.enter_idle(&platform, DEEP_STATE_INDEX), DEEP_STATE_INDEX);
        assert!(platform.events().contains(&Event::PoweredUp));
        assert_eq!(registry.with_device(6, |d| d.usage(DEEP_STATE_INDEX)), Some(1));
    }

    #[test]
    fn test_enter_idle_index_zero_has_no_handshake() {
        let registry = populated(8);
        for cpu in 0..8 {
            let platform = MockPlatform::new(CpuAffinity::from_logical_id(cpu, 4).unwrap());
            assert_eq!(registry.enter_idle(&platform, WFI_STATE_INDEX), WFI_STATE_INDEX);
            assert_eq!(platform.pm_event_count(), 0);
        }
    }

    #[test]
    fn test_enter_idle_out_of_range_index() {
        let registry = populated(2);
        let platform = MockPlatform::new(CpuAffinity::new(0, 1));

        assert_eq!(registry.enter_idle(&platform, 5), SAFE_STATE_INDEX);
        assert_eq!(platform.events(), [Event::Wfi]);
    }

    #[test]
    fn test_enter_idle_without_records_waits() {
        let registry = IdleRegistry::new(CpuMask::first(4), 4);
        let platform = MockPlatform::new(CpuAffinity::new(0, 2));

        assert_eq!(registry.enter_idle(&platform, DEEP_STATE_INDEX), SAFE_STATE_INDEX);
        assert_eq!(platform.events(), [Event::Wfi]);
    }

    #[test]
    fn test_enter_idle_unmappable_affinity_waits() {
        // A cluster width this large overflows the logical id
        let registry = IdleRegistry::new(CpuMask::first(4), u32::MAX);
        let platform = MockPlatform::new(CpuAffinity::new(3, 0));

        assert_eq!(registry.enter_idle(&platform, DEEP_STATE_INDEX), SAFE_STATE_INDEX);
        assert_eq!(platform.events(), [Event::Wfi]);
    }

    #[test]
    fn test_device_released_while_core_sleeps() {
        static SLEEPING: IdleRegistry = IdleRegistry::new(CpuMask::first(8), 4);
        static RELEASED: AtomicBool = AtomicBool::new(false);

        // Runs inside suspend_core on CPU 6; a writer must get the slot
        fn release_cpu6() {
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let _ = tx.send(SLEEPING.unregister_device(6).is_some());
            });
            let released = rx.recv_timeout(Duration::from_secs(2)).unwrap_or(false);
            RELEASED.store(released, Ordering::SeqCst);
        }

        for cpu in 0..8 {
            SLEEPING.register_driver(Box::new(canonical_driver_for(cpu))).unwrap();
            SLEEPING.register_device(Box::new(device_for(cpu))).unwrap();
        }
        let platform = MockPlatform::new(CpuAffinity::new(1, 2)).with_suspend_hook(release_cpu6);

        assert_eq!(SLEEPING.enter_idle(&platform, DEEP_STATE_INDEX), DEEP_STATE_INDEX);
        assert!(RELEASED.load(Ordering::SeqCst));
        assert!(platform.events().contains(&Event::PmExit));
        assert_eq!(SLEEPING.device_count(), 7);
        assert_eq!(SLEEPING.with_device(6, |d| d.cpu()), None);
    }
}
