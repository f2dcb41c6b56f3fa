//! # Error Handling and Rollback
//!
//! Error types for driver registration and the undo stack used to make the
//! boot-time registration pass all-or-nothing.
//!
//! ## Error Propagation
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  probe() ──▶ register CPU 0 ──▶ CPU 1 ──▶ CPU 2 ✗                      │
//! │                                              │                        │
//! │                                              ▼                        │
//! │                ┌───────────────── UNDO STACK (LIFO) ───────────────┐  │
//! │                │ drv2 ◀── dev1 ◀── drv1 ◀── dev0 ◀── drv0           │  │
//! │                └───────────────────────────────────────────────────┘  │
//! │                                              │                        │
//! │                                              ▼                        │
//! │                               CpuidleError ──▶ errno() ──▶ boot       │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Idle-path operations never produce errors; everything in this module is
//! about the boot and shutdown passes.

use core::fmt;

extern crate alloc;
use alloc::vec::Vec;

use crate::framework::IdleFramework;

// =============================================================================
// ERRNO VALUES
// =============================================================================

/// Negative errno values reported to the boot sequence
pub mod errno {
    /// Out of memory
    pub const ENOMEM: i32 = -12;
    /// Device or resource busy
    pub const EBUSY: i32 = -16;
    /// Already exists
    pub const EEXIST: i32 = -17;
    /// No such device
    pub const ENODEV: i32 = -19;
    /// Invalid argument
    pub const EINVAL: i32 = -22;
}

// =============================================================================
// ERROR KIND
// =============================================================================

/// Classification of cpuidle errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorKind {
    // -------------------------------------------------------------------------
    // General Errors (0-99)
    // -------------------------------------------------------------------------
    /// Invalid argument provided
    InvalidArgument      = 3,

    /// Already exists
    AlreadyExists        = 6,

    /// Not found
    NotFound             = 7,

    // -------------------------------------------------------------------------
    // Resource Errors (100-199)
    // -------------------------------------------------------------------------
    /// Out of memory
    OutOfMemory          = 100,

    // -------------------------------------------------------------------------
    // Registration Errors (200-299)
    // -------------------------------------------------------------------------
    /// The idle framework rejected a driver
    DriverRegistrationFailed = 200,

    /// The idle framework rejected a device
    DeviceRegistrationFailed = 201,

    // -------------------------------------------------------------------------
    // Rollback Errors (700-799)
    // -------------------------------------------------------------------------
    /// An undo step found nothing to undo
    PartialRollback      = 702,
}

impl ErrorKind {
    /// Get the error category name
    pub const fn category(&self) -> &'static str {
        match *self as u32 {
            0..=99 => "General",
            100..=199 => "Resource",
            200..=299 => "Registration",
            700..=799 => "Rollback",
            _ => "Unknown",
        }
    }

    /// Negative errno equivalent
    pub const fn errno(&self) -> i32 {
        match self {
            ErrorKind::InvalidArgument => errno::EINVAL,
            ErrorKind::AlreadyExists => errno::EEXIST,
            ErrorKind::NotFound => errno::ENODEV,
            ErrorKind::OutOfMemory => errno::ENOMEM,
            ErrorKind::DriverRegistrationFailed => errno::EINVAL,
            ErrorKind::DeviceRegistrationFailed => errno::EINVAL,
            ErrorKind::PartialRollback => errno::EBUSY,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// CPUIDLE ERROR
// =============================================================================

/// Error raised by the registration and shutdown passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuidleError {
    /// Error classification
    kind: ErrorKind,

    /// Human-readable message
    message: &'static str,

    /// Logical CPU the failure concerns
    cpu: Option<u32>,

    /// Explicit errno override (e.g. relayed from the framework)
    errno: Option<i32>,
}

impl CpuidleError {
    /// Create new error with kind and message
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message,
            cpu: None,
            errno: None,
        }
    }

    /// Create error from kind with default message
    pub const fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind_to_message(kind))
    }

    /// Attach the CPU the error concerns
    pub const fn with_cpu(mut self, cpu: u32) -> Self {
        self.cpu = Some(cpu);
        self
    }

    /// Relay an errno reported by a collaborator instead of the kind's default
    pub const fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    /// Get error kind
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get message
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// Get the CPU
    pub const fn cpu(&self) -> Option<u32> {
        self.cpu
    }

    /// Negative errno for the boot sequence
    pub const fn errno(&self) -> i32 {
        match self.errno {
            Some(errno) => errno,
            None => self.kind.errno(),
        }
    }
}

impl fmt::Display for CpuidleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.category(), self.message)?;

        if let Some(cpu) = self.cpu {
            write!(f, " (cpu {})", cpu)?;
        }

        write!(f, " (errno {})", self.errno())
    }
}

/// Get default message for error kind
const fn kind_to_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InvalidArgument => "Invalid argument",
        ErrorKind::AlreadyExists => "Already exists",
        ErrorKind::NotFound => "Not found",
        ErrorKind::OutOfMemory => "Out of memory",
        ErrorKind::DriverRegistrationFailed => "Failed to register cpuidle driver",
        ErrorKind::DeviceRegistrationFailed => "Failed to register cpuidle device",
        ErrorKind::PartialRollback => "Partial rollback",
    }
}

// =============================================================================
// RESULT TYPE
// =============================================================================

/// Result type for cpuidle operations
pub type CpuidleResult<T> = Result<T, CpuidleError>;

// =============================================================================
// UNDO STACK
// =============================================================================

/// A single registration step that can be reverted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoAction {
    /// Unregister and release the driver bound to this CPU
    UnregisterDriver(u32),
    /// Unregister and release the device bound to this CPU
    UnregisterDevice(u32),
}

impl UndoAction {
    /// CPU the action concerns
    pub const fn cpu(&self) -> u32 {
        match *self {
            UndoAction::UnregisterDriver(cpu) | UndoAction::UnregisterDevice(cpu) => cpu,
        }
    }

    /// Revert the step against the framework that accepted it
    pub fn execute<F: IdleFramework + ?Sized>(&self, framework: &F) -> CpuidleResult<()> {
        let released = match *self {
            UndoAction::UnregisterDevice(cpu) => framework.unregister_device(cpu).is_some(),
            UndoAction::UnregisterDriver(cpu) => framework.unregister_driver(cpu).is_some(),
        };

        if released {
            Ok(())
        } else {
            Err(CpuidleError::from_kind(ErrorKind::PartialRollback).with_cpu(self.cpu()))
        }
    }

    /// Get description of the action
    pub const fn description(&self) -> &'static str {
        match self {
            UndoAction::UnregisterDriver(_) => "unregister driver",
            UndoAction::UnregisterDevice(_) => "unregister device",
        }
    }
}

/// Stack of undo actions, unwound in LIFO order on failure
#[derive(Debug, Default)]
pub struct UndoStack {
    /// Pending actions, most recent last
    actions: Vec<UndoAction>,

    /// Statistics
    executed: u32,
    failed: u32,
}

impl UndoStack {
    /// Create an empty stack
    pub const fn new() -> Self {
        Self {
            actions: Vec::new(),
            executed: 0,
            failed: 0,
        }
    }

    /// Create a stack able to hold `capacity` actions without reallocating
    ///
    /// Reserving up front keeps the failure path free of allocations.
    pub fn with_capacity(capacity: usize) -> CpuidleResult<Self> {
        let mut actions = Vec::new();
        actions
            .try_reserve_exact(capacity)
            .map_err(|_| CpuidleError::from_kind(ErrorKind::OutOfMemory))?;
        Ok(Self {
            actions,
            executed: 0,
            failed: 0,
        })
    }

    /// Record a completed step
    ///
    /// Stays within the capacity reserved by [`UndoStack::with_capacity`]
    /// when the caller sized it for the whole pass.
    pub fn push(&mut self, action: UndoAction) {
        self.actions.push(action);
    }

    /// Revert every recorded step, most recent first
    ///
    /// Keeps going past individual failures so that as much as possible is
    /// released; the first failure is returned.
    pub fn unwind<F: IdleFramework + ?Sized>(&mut self, framework: &F) -> CpuidleResult<()> {
        let mut first_error = None;

        while let Some(action) = self.actions.pop() {
            self.executed += 1;
            log::debug!("cpuidle: rollback CPU{}: {}", action.cpu(), action.description());

            if let Err(e) = action.execute(framework) {
                self.failed += 1;
                log::warn!("cpuidle: rollback step failed: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Forget every recorded step (the pass committed)
    pub fn commit(&mut self) {
        self.actions.clear();
    }

    /// Pending actions, oldest first
    pub fn pending(&self) -> &[UndoAction] {
        &self.actions
    }

    /// Get number of pending actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Get statistics
    pub fn stats(&self) -> UndoStats {
        UndoStats {
            executed: self.executed,
            failed: self.failed,
            pending: self.actions.len() as u32,
        }
    }
}

/// Undo statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoStats {
    /// Actions executed
    pub executed: u32,
    /// Failed actions
    pub failed: u32,
    /// Pending actions
    pub pending: u32,
}

// =============================================================================
// ERROR MACROS
// =============================================================================

/// Return early with a [`CpuidleError`]
#[macro_export]
macro_rules! cpuidle_bail {
    ($kind:expr) => {
        return Err($crate::error::CpuidleError::from_kind($kind))
    };
    ($kind:expr, $msg:literal) => {
        return Err($crate::error::CpuidleError::new($kind, $msg))
    };
}

/// Ensure a condition is true, otherwise return a [`CpuidleError`]
#[macro_export]
macro_rules! cpuidle_ensure {
    ($cond:expr, $kind:expr) => {
        if !$cond {
            $crate::cpuidle_bail!($kind);
        }
    };
    ($cond:expr, $kind:expr, $msg:literal) => {
        if !$cond {
            $crate::cpuidle_bail!($kind, $msg);
        }
    };
}

// =============================================================================
// TESTS
// =============================================================================
