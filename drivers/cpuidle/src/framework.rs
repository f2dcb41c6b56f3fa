//! # Idle Framework Interface
//!
//! What the registrar needs from the generic idle framework: somewhere to
//! hand owned driver and device records, and a way to get them back.

extern crate alloc;
use alloc::boxed::Box;

use crate::device::IdleDevice;
use crate::driver::IdleDriver;
use crate::error::CpuidleResult;

/// Registration side of the idle framework
///
/// Records are passed by value; ownership moves to the framework on success
/// and back to the caller on unregister. A rejected record is dropped by the
/// framework.
pub trait IdleFramework {
    /// Register a driver bound to a single CPU
    fn register_driver(&self, driver: Box<IdleDriver>) -> CpuidleResult<()>;

    /// Unregister the driver bound to `cpu`
    fn unregister_driver(&self, cpu: u32) -> Option<Box<IdleDriver>>;

    /// Register the device for a CPU whose driver is registered
    fn register_device(&self, device: Box<IdleDevice>) -> CpuidleResult<()>;

    /// Unregister the device bound to `cpu`
    fn unregister_device(&self, cpu: u32) -> Option<Box<IdleDevice>>;
}
