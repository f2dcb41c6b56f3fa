//! # CPU Masks
//!
//! A fixed-width set of logical CPU ids. Drivers bound to a single core carry
//! a mask of weight one; the possible-CPU set of the platform is a mask too.

use static_assertions::const_assert;

/// Maximum number of logical CPUs a mask can describe
pub const MAX_CPUS: usize = 64;

const_assert!(MAX_CPUS <= u64::BITS as usize);
const_assert!(super::MAX_CLUSTERS * super::MAX_CPUS_PER_CLUSTER <= MAX_CPUS);

/// Set of logical CPU ids
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct CpuMask(u64);

impl CpuMask {
    /// The empty set
    pub const EMPTY: Self = Self(0);

    /// Mask containing exactly one CPU
    ///
    /// CPU ids past [`MAX_CPUS`] produce the empty mask.
    #[inline]
    pub const fn of(cpu: u32) -> Self {
        if cpu as usize >= MAX_CPUS {
            return Self::EMPTY;
        }
        Self(1 << cpu)
    }

    /// Mask of CPUs `0..count`
    #[inline]
    pub const fn first(count: u32) -> Self {
        if count as usize >= MAX_CPUS {
            Self(u64::MAX)
        } else {
            Self((1u64 << count) - 1)
        }
    }

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Check whether `cpu` is in the set
    #[inline]
    pub const fn contains(self, cpu: u32) -> bool {
        (cpu as usize) < MAX_CPUS && (self.0 & (1 << cpu)) != 0
    }

    /// Number of CPUs in the set
    #[inline]
    pub const fn weight(self) -> u32 {
        self.0.count_ones()
    }

    /// Check if the set is empty
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The only CPU in a weight-one mask
    #[inline]
    pub const fn single(self) -> Option<u32> {
        if self.weight() == 1 {
            Some(self.0.trailing_zeros())
        } else {
            None
        }
    }

    /// Iterate CPUs in increasing order
    #[inline]
    pub const fn iter(self) -> CpuMaskIter {
        CpuMaskIter { remaining: self.0 }
    }
}

impl core::fmt::Debug for CpuMask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl IntoIterator for CpuMask {
    type Item = u32;
    type IntoIter = CpuMaskIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the CPUs of a [`CpuMask`], lowest first
#[derive(Debug, Clone)]
pub struct CpuMaskIter {
    remaining: u64,
}

impl Iterator for CpuMaskIter {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        let cpu = self.remaining.trailing_zeros();
        self.remaining &= self.remaining - 1;
        Some(cpu)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for CpuMaskIter {}

// ============================================================================
// TESTS
// ============================================================================
