//! # Helix Cluster CPU Idle Driver
//!
//! CPU idle support for multi-cluster ARM parts whose only deep state is a
//! per-core power-down driven by the multi-cluster power manager (MCPM).
//! The reference board is the Allwinner A83T: two clusters of four
//! Cortex-A7 cores.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              BOOT (once)                                │
//! │                                                                         │
//! │   init() ──▶ probe() ──▶ DeviceRegistrar::register_all()                │
//! │                               │  per CPU: driver clone + device         │
//! │                               ▼                                         │
//! │                     IdleFramework (IdleRegistry)                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                          IDLE LOOP (per CPU)                            │
//! │                                                                         │
//! │   IdleRegistry::enter_idle(idx)                                         │
//! │        │                                                                │
//! │        ├── idx 0 ──▶ wfi_enter                                          │
//! │        └── idx 1 ──▶ core_sleep_enter ──▶ ContextSave::cpu_suspend      │
//! │                                                │                        │
//! │                                                ▼                        │
//! │                                       SleepFinisher ──▶ MCPM            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Idle States
//!
//! | Index | Name | Description       |
//! |-------|------|-------------------|
//! | 0     | WFI  | ARM WFI           |
//! | 1     | C1   | Core power down   |
//!
//! The primary CPU never powers down; a C1 request on it is served by WFI.

#![no_std]

extern crate alloc;

pub mod allocator;
pub mod config;
pub mod device;
pub mod driver;
pub mod enter;
pub mod error;
pub mod finisher;
pub mod framework;
pub mod mcpm;
pub mod platform;
pub mod registrar;
pub mod registry;
pub mod state;

#[cfg(test)]
mod testing;

pub use allocator::{HeapAllocator, RecordAllocator};
pub use config::CpuidleConfig;
pub use device::IdleDevice;
pub use driver::IdleDriver;
pub use error::{CpuidleError, CpuidleResult, ErrorKind};
pub use framework::IdleFramework;
pub use mcpm::{ClusterPowerOps, EntryVectors, ResumeVector};
pub use platform::{ArchCpu, ContextSave, CpuPmNotifier, IdlePlatform, LocalCpu};
pub use registrar::{DeviceRegistrar, ProbeReport};
pub use registry::IdleRegistry;
pub use state::{IdleState, StateFlags, STATE_COUNT};

use spin::Once;

// =============================================================================
// PROBE
// =============================================================================

/// Register the idle driver on every possible CPU
///
/// All-or-nothing: on error no CPU keeps a driver or device.
pub fn probe<F, A, C>(
    config: &CpuidleConfig,
    framework: &F,
    allocator: &A,
    cluster: &C,
) -> CpuidleResult<ProbeReport>
where
    F: IdleFramework + ?Sized,
    A: RecordAllocator + ?Sized,
    C: ClusterPowerOps + ?Sized,
{
    config.validate()?;

    log::info!("cpuidle: MCPM availability: {}", cluster.is_available() as u8);

    let report = DeviceRegistrar::new(framework, allocator, config).register_all()?;

    log::info!("cpuidle: Idle states count: {}", report.state_count);
    Ok(report)
}

// =============================================================================
// GLOBAL REGISTRY
// =============================================================================

static REGISTRY: Once<IdleRegistry> = Once::new();

/// The registry created by [`init`], if it ran
pub fn registry() -> Option<&'static IdleRegistry> {
    REGISTRY.get()
}

/// Boot-time entry point
///
/// Validates `config`, creates the global [`IdleRegistry`] and registers into
/// it. A later call must describe the same topology as the first. Returns 0,
/// or a negative errno on failure.
pub fn init<C: ClusterPowerOps + ?Sized>(config: &CpuidleConfig, cluster: &C) -> i32 {
    if let Err(e) = config.validate() {
        log::error!("cpuidle: invalid configuration: {}", e);
        return e.errno();
    }

    let registry =
        REGISTRY.call_once(|| IdleRegistry::new(config.possible_cpus, config.cores_per_cluster));
    if registry.possible_cpus() != config.possible_cpus
        || registry.cores_per_cluster() != config.cores_per_cluster
    {
        log::error!("cpuidle: topology differs from the registered one");
        return error::errno::EINVAL;
    }

    match probe(config, registry, &HeapAllocator, cluster) {
        Ok(_) => 0,
        Err(e) => {
            log::error!("cpuidle: probe failed: {}", e);
            e.errno()
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================
