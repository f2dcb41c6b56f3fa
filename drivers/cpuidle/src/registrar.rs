//! # Device Registrar
//!
//! Boot-time pass that gives every possible CPU its own driver and device
//! record, and the matching shutdown pass.
//!
//! ## Registration Order
//!
//! ```text
//!   for cpu in possible (ascending):
//!       alloc driver ─▶ bind {cpu} ─▶ register driver ─▶ push UnregisterDriver(cpu)
//!       alloc device ─▶ register device ─▶ push UnregisterDevice(cpu)
//!
//!   on the first failure: unwind the undo stack (LIFO), return the error
//! ```
//!
//! The pass is all-or-nothing: after a failure no record of this driver is
//! left with the framework.

use helix_hal::CpuMask;

use crate::allocator::RecordAllocator;
use crate::config::CpuidleConfig;
use crate::driver::IdleDriver;
use crate::error::{CpuidleResult, UndoAction, UndoStack};
use crate::framework::IdleFramework;

/// Outcome of a successful registration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    /// CPUs that received a driver and a device
    pub cpus: CpuMask,
    /// Declared number of idle states
    pub state_count: usize,
}

/// Registers one driver and one device per possible CPU
pub struct DeviceRegistrar<'a, F: IdleFramework + ?Sized, A: RecordAllocator + ?Sized> {
    framework: &'a F,
    allocator: &'a A,
    template: IdleDriver,
    cpus: CpuMask,
}

impl<'a, F: IdleFramework + ?Sized, A: RecordAllocator + ?Sized> DeviceRegistrar<'a, F, A> {
    /// Create a registrar for the CPUs and state table described by `config`
    pub fn new(framework: &'a F, allocator: &'a A, config: &CpuidleConfig) -> Self {
        Self {
            framework,
            allocator,
            template: IdleDriver::canonical(config),
            cpus: config.possible_cpus,
        }
    }

    /// Two undo steps per CPU
    fn undo_capacity(&self) -> usize {
        2 * self.cpus.weight() as usize
    }

    /// Register every possible CPU, or none
    ///
    /// On failure the error of the failing step is returned with its CPU
    /// attached, after every earlier step has been reverted.
    pub fn register_all(&self) -> CpuidleResult<ProbeReport> {
        let mut undo = UndoStack::with_capacity(self.undo_capacity())?;

        for cpu in self.cpus {
            if let Err(err) = self.register_cpu(cpu, &mut undo) {
                log::warn!(
                    "cpuidle: CPU{} failed, rolling back {} registration steps",
                    cpu,
                    undo.len()
                );
                // Unwind failures are logged by the stack; the first error is returned
                let _ = undo.unwind(self.framework);
                let stats = undo.stats();
                log::warn!(
                    "cpuidle: rollback done, {} steps undone, {} failed",
                    stats.executed,
                    stats.failed
                );
                return Err(err.with_cpu(cpu));
            }

            log::info!("cpuidle: Successfully registered idle driver for CPU{}", cpu);
        }

        undo.commit();
        Ok(ProbeReport {
            cpus: self.cpus,
            state_count: self.template.state_count(),
        })
    }

    fn register_cpu(&self, cpu: u32, undo: &mut UndoStack) -> CpuidleResult<()> {
        let mut driver = self.allocator.alloc_driver(&self.template)?;
        driver.bind_cpu(cpu);

        if let Err(err) = self.framework.register_driver(driver) {
            log::error!("cpuidle: Failed to register cpuidle driver {}", err.errno());
            return Err(err);
        }
        undo.push(UndoAction::UnregisterDriver(cpu));

        let device = self.allocator.alloc_device(cpu)?;
        if let Err(err) = self.framework.register_device(device) {
            log::error!("cpuidle: Failed to register cpuidle device for CPU {}", cpu);
            return Err(err);
        }
        undo.push(UndoAction::UnregisterDevice(cpu));

        Ok(())
    }

    /// Unregister every CPU's device and driver, highest CPU first
    ///
    /// Returns the number of CPUs released.
    pub fn teardown(&self) -> CpuidleResult<usize> {
        let mut undo = UndoStack::with_capacity(self.undo_capacity())?;
        for cpu in self.cpus {
            undo.push(UndoAction::UnregisterDriver(cpu));
            undo.push(UndoAction::UnregisterDevice(cpu));
        }

        undo.unwind(self.framework)?;
        log::info!("cpuidle: released {} CPUs", self.cpus.weight());
        Ok(self.cpus.weight() as usize)
    }
}

impl<F: IdleFramework + ?Sized, A: RecordAllocator + ?Sized> core::fmt::Debug
    for DeviceRegistrar<'_, F, A>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DeviceRegistrar")
            .field("driver", &self.template.name())
            .field("cpus", &self.cpus)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
