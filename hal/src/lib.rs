//! # Helix OS Hardware Abstraction Layer
//!
//! Architecture primitives shared by Helix drivers that have to reason about
//! *which* core they are running on and park it cheaply.
//!
//! ## Module Organization
//!
//! - [`cpu`]: local interrupt masking, wait-for-interrupt, raw MPIDR access
//! - [`smp`]: affinity decoding ([`smp::Mpidr`], [`smp::CpuAffinity`]) and
//!   CPU sets ([`smp::CpuMask`])
//!
//! ## Architecture Support
//!
//! | Target              | IRQ masking        | Affinity register          |
//! |---------------------|--------------------|----------------------------|
//! | `arm` (ARMv7-A)     | `cpsid i`/`cpsie i` | `mrc p15, 0, r, c0, c0, 5` |
//! | `aarch64`           | `DAIFSet`/`DAIFClr` | `mrs MPIDR_EL1`            |
//! | anything else       | software flag      | reads as CPU 0.0           |
//!
//! The fallback row exists so host builds (unit tests, tooling) link; it
//! does not pretend to be a real machine.

#![no_std]

pub mod cpu;
pub mod smp;

pub use smp::{CpuAffinity, CpuMask, Mpidr};
