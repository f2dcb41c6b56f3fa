//! Test doubles for the platform and framework interfaces.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use helix_hal::CpuAffinity;
use spin::Mutex;

use crate::allocator::{HeapAllocator, RecordAllocator};
use crate::config::CpuidleConfig;
use crate::device::IdleDevice;
use crate::driver::IdleDriver;
use crate::error::{errno, CpuidleError, CpuidleResult, ErrorKind};
use crate::framework::IdleFramework;
use crate::mcpm::{ClusterPowerOps, EntryVectors, ResumeVector};
use crate::platform::{ContextSave, CpuPmNotifier, LocalCpu, SUSPEND_RESUMED};
use crate::registry::IdleRegistry;

/// Resume address handed out by [`MockPlatform`]
pub const RESUME_ADDR: usize = 0x4000_8000;

/// Errno returned by [`ScriptedFramework`] rejections
pub const REJECT_ERRNO: i32 = errno::EBUSY;

/// Canonical A83T table bound to `cpu`
pub fn canonical_driver_for(cpu: u32) -> IdleDriver {
    let mut driver = IdleDriver::canonical(&CpuidleConfig::a83t());
    driver.bind_cpu(cpu);
    driver
}

/// Fresh device record for `cpu`
pub fn device_for(cpu: u32) -> IdleDevice {
    IdleDevice::new(cpu)
}

// =============================================================================
// PLATFORM
// =============================================================================

/// Something the platform was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    IrqDisable,
    IrqEnable,
    Wfi,
    PmEnter,
    PmExit,
    ContextSaved { irqs_masked: bool },
    SetEntryVector(CpuAffinity, ResumeVector),
    ClusterSuspend,
    PoweredUp,
}

impl Event {
    fn is_pm(&self) -> bool {
        !matches!(self, Event::IrqDisable | Event::IrqEnable | Event::Wfi)
    }
}

/// How the simulated suspend primitive comes back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendMode {
    /// Power was removed; the core re-entered through the resume vector
    PowerLoss,
    /// The core never went down; the finisher's status comes back
    NoPowerLoss,
}

/// Recording platform for a single core
#[derive(Debug)]
pub struct MockPlatform {
    affinity: CpuAffinity,
    mode: SuspendMode,
    irqs_masked: AtomicBool,
    vectors: EntryVectors,
    events: Mutex<Vec<Event>>,
    last_status: Mutex<Option<i32>>,
    suspend_hook: Option<fn()>,
}

impl MockPlatform {
    pub fn new(affinity: CpuAffinity) -> Self {
        Self {
            affinity,
            mode: SuspendMode::PowerLoss,
            irqs_masked: AtomicBool::new(false),
            vectors: EntryVectors::new(),
            events: Mutex::new(Vec::new()),
            last_status: Mutex::new(None),
            suspend_hook: None,
        }
    }

    /// Run `hook` while the core sits in the cluster suspend request
    pub fn with_suspend_hook(mut self, hook: fn()) -> Self {
        self.suspend_hook = Some(hook);
        self
    }

    pub fn with_mode(mut self, mode: SuspendMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn pm_event_count(&self) -> usize {
        self.events.lock().iter().filter(|e| e.is_pm()).count()
    }

    pub fn last_suspend_status(&self) -> Option<i32> {
        *self.last_status.lock()
    }

    pub fn entry_vector(&self, affinity: CpuAffinity) -> ResumeVector {
        self.vectors.get(affinity).unwrap_or_default()
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl LocalCpu for MockPlatform {
    fn irq_disable(&self) {
        self.irqs_masked.store(true, Ordering::SeqCst);
        self.record(Event::IrqDisable);
    }

    fn irq_enable(&self) {
        self.irqs_masked.store(false, Ordering::SeqCst);
        self.record(Event::IrqEnable);
    }

    fn wait_for_interrupt(&self) {
        self.record(Event::Wfi);
    }

    fn current_affinity(&self) -> CpuAffinity {
        self.affinity
    }
}

impl CpuPmNotifier for MockPlatform {
    fn cpu_pm_enter(&self) {
        self.record(Event::PmEnter);
    }

    fn cpu_pm_exit(&self) {
        self.record(Event::PmExit);
    }
}

impl ClusterPowerOps for MockPlatform {
    fn is_available(&self) -> bool {
        true
    }

    fn set_entry_vector(&self, affinity: CpuAffinity, vector: ResumeVector) {
        let _ = self.vectors.set(affinity, vector);
        self.record(Event::SetEntryVector(affinity, vector));
    }

    fn suspend_core(&self) {
        self.record(Event::ClusterSuspend);
        if let Some(hook) = self.suspend_hook {
            hook();
        }
    }

    fn cpu_powered_up(&self) {
        self.record(Event::PoweredUp);
    }
}

impl ContextSave for MockPlatform {
    fn resume_vector(&self) -> ResumeVector {
        ResumeVector::new(RESUME_ADDR)
    }

    fn cpu_suspend(&self, arg: usize, finisher: &mut dyn FnMut(usize) -> i32) -> i32 {
        self.record(Event::ContextSaved {
            irqs_masked: self.irqs_masked.load(Ordering::SeqCst),
        });

        let returned = finisher(arg);
        let status = match self.mode {
            SuspendMode::PowerLoss => SUSPEND_RESUMED,
            SuspendMode::NoPowerLoss => returned,
        };
        *self.last_status.lock() = Some(status);
        status
    }
}

// =============================================================================
// ALLOCATOR
// =============================================================================

/// Heap allocator that runs out of memory for one CPU
///
/// Driver templates are unbound when allocated, so the failing driver
/// allocation is picked by call count; registration walks CPUs from 0.
#[derive(Debug)]
pub struct FailingAllocator {
    driver_call: Option<u32>,
    device_cpu: Option<u32>,
    driver_calls: AtomicU32,
}

impl FailingAllocator {
    pub fn driver_at(cpu: u32) -> Self {
        Self {
            driver_call: Some(cpu),
            device_cpu: None,
            driver_calls: AtomicU32::new(0),
        }
    }

    pub fn device_at(cpu: u32) -> Self {
        Self {
            driver_call: None,
            device_cpu: Some(cpu),
            driver_calls: AtomicU32::new(0),
        }
    }
}

impl RecordAllocator for FailingAllocator {
    fn alloc_driver(&self, template: &IdleDriver) -> CpuidleResult<Box<IdleDriver>> {
        let call = self.driver_calls.fetch_add(1, Ordering::SeqCst);
        if self.driver_call == Some(call) {
            return Err(CpuidleError::from_kind(ErrorKind::OutOfMemory));
        }
        HeapAllocator.alloc_driver(template)
    }

    fn alloc_device(&self, cpu: u32) -> CpuidleResult<Box<IdleDevice>> {
        if self.device_cpu == Some(cpu) {
            return Err(CpuidleError::from_kind(ErrorKind::OutOfMemory));
        }
        HeapAllocator.alloc_device(cpu)
    }
}

// =============================================================================
// FRAMEWORK
// =============================================================================

/// Framework call observed by [`ScriptedFramework`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkEvent {
    RegisterDriver(u32),
    RegisterDevice(u32),
    Rejected(u32),
    UnregisterDriver(u32),
    UnregisterDevice(u32),
}

impl FrameworkEvent {
    fn cpu(&self) -> u32 {
        match *self {
            FrameworkEvent::RegisterDriver(cpu)
            | FrameworkEvent::RegisterDevice(cpu)
            | FrameworkEvent::Rejected(cpu)
            | FrameworkEvent::UnregisterDriver(cpu)
            | FrameworkEvent::UnregisterDevice(cpu) => cpu,
        }
    }
}

/// [`IdleRegistry`] that logs every call and can reject one CPU
#[derive(Debug)]
pub struct ScriptedFramework {
    registry: IdleRegistry,
    reject_driver: Option<u32>,
    reject_device: Option<u32>,
    events: Mutex<Vec<FrameworkEvent>>,
}

impl ScriptedFramework {
    pub fn new(config: &CpuidleConfig) -> Self {
        Self {
            registry: IdleRegistry::new(config.possible_cpus, config.cores_per_cluster),
            reject_driver: None,
            reject_device: None,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn reject_driver_at(mut self, cpu: u32) -> Self {
        self.reject_driver = Some(cpu);
        self
    }

    pub fn reject_device_at(mut self, cpu: u32) -> Self {
        self.reject_device = Some(cpu);
        self
    }

    pub fn registry(&self) -> &IdleRegistry {
        &self.registry
    }

    pub fn events(&self) -> Vec<FrameworkEvent> {
        self.events.lock().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Whether any call concerned `cpu`
    pub fn touched(&self, cpu: u32) -> bool {
        self.events.lock().iter().any(|e| e.cpu() == cpu)
    }

    fn record(&self, event: FrameworkEvent) {
        self.events.lock().push(event);
    }

    fn rejection(&self, cpu: u32, kind: ErrorKind) -> CpuidleError {
        self.record(FrameworkEvent::Rejected(cpu));
        CpuidleError::from_kind(kind).with_errno(REJECT_ERRNO)
    }
}

impl IdleFramework for ScriptedFramework {
    fn register_driver(&self, driver: Box<IdleDriver>) -> CpuidleResult<()> {
        let cpu = driver.cpu().unwrap_or(u32::MAX);
        if self.reject_driver == Some(cpu) {
            return Err(self.rejection(cpu, ErrorKind::DriverRegistrationFailed));
        }
        self.registry.register_driver(driver)?;
        self.record(FrameworkEvent::RegisterDriver(cpu));
        Ok(())
    }

    fn unregister_driver(&self, cpu: u32) -> Option<Box<IdleDriver>> {
        self.record(FrameworkEvent::UnregisterDriver(cpu));
        self.registry.unregister_driver(cpu)
    }

    fn register_device(&self, device: Box<IdleDevice>) -> CpuidleResult<()> {
        let cpu = device.cpu();
        if self.reject_device == Some(cpu) {
            return Err(self.rejection(cpu, ErrorKind::DeviceRegistrationFailed));
        }
        self.registry.register_device(device)?;
        self.record(FrameworkEvent::RegisterDevice(cpu));
        Ok(())
    }

    fn unregister_device(&self, cpu: u32) -> Option<Box<IdleDevice>> {
        self.record(FrameworkEvent::UnregisterDevice(cpu));
        self.registry.unregister_device(cpu)
    }
}
