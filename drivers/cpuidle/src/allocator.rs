//! # Record Allocation
//!
//! Boot-time allocation of per-CPU driver and device records. Allocation
//! failure is reported as [`ErrorKind::OutOfMemory`] instead of aborting, so
//! the registrar can roll back.

extern crate alloc;
use alloc::alloc::{alloc as raw_alloc, Layout};
use alloc::boxed::Box;

use crate::device::IdleDevice;
use crate::driver::IdleDriver;
use crate::error::{CpuidleError, CpuidleResult, ErrorKind};

/// Source of driver and device records
pub trait RecordAllocator {
    /// Allocate an independent copy of `template`
    fn alloc_driver(&self, template: &IdleDriver) -> CpuidleResult<Box<IdleDriver>>;

    /// Allocate a zeroed device record for `cpu`
    fn alloc_device(&self, cpu: u32) -> CpuidleResult<Box<IdleDevice>>;
}

/// Global-heap allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl RecordAllocator for HeapAllocator {
    fn alloc_driver(&self, template: &IdleDriver) -> CpuidleResult<Box<IdleDriver>> {
        try_box(template.clone())
    }

    fn alloc_device(&self, cpu: u32) -> CpuidleResult<Box<IdleDevice>> {
        try_box(IdleDevice::new(cpu))
    }
}

/// Box a value, returning `OutOfMemory` instead of aborting
pub fn try_box<T>(value: T) -> CpuidleResult<Box<T>> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Ok(Box::new(value));
    }

    // SAFETY: layout has non-zero size
    let ptr = unsafe { raw_alloc(layout) }.cast::<T>();
    if ptr.is_null() {
        return Err(CpuidleError::from_kind(ErrorKind::OutOfMemory));
    }

    // SAFETY: ptr is non-null, aligned and sized for T by the global allocator,
    // and is initialised before ownership moves into the Box
    unsafe {
        ptr.write(value);
        Ok(Box::from_raw(ptr))
    }
}
