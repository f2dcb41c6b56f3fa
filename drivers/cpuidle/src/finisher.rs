//! # Sleep Finisher
//!
//! Last step of a core power-down, run by the suspend primitive once the
//! core's context is saved and IRQs are masked.

use helix_hal::CpuAffinity;

use crate::mcpm::{ClusterPowerOps, ResumeVector};

/// Finisher status: discard the saved context and continue as if resumed
/// through the resume vector
pub const FINISHER_RESUMED: i32 = 1;

/// Hands a saved core over to the cluster power manager
pub struct SleepFinisher<'a, C: ClusterPowerOps + ?Sized> {
    cluster: &'a C,
    affinity: CpuAffinity,
    resume: ResumeVector,
}

impl<'a, C: ClusterPowerOps + ?Sized> SleepFinisher<'a, C> {
    /// Create a finisher for the core at `affinity`
    pub fn new(cluster: &'a C, affinity: CpuAffinity, resume: ResumeVector) -> Self {
        Self {
            cluster,
            affinity,
            resume,
        }
    }

    /// Publish the resume vector, then ask for the core to be powered down
    ///
    /// Only returns if the power-down did not happen.
    pub fn finish(&self, _arg: usize) -> i32 {
        self.cluster.set_entry_vector(self.affinity, self.resume);
        self.cluster.suspend_core();

        log::debug!(
            "cpuidle: {} returned from suspend without power loss",
            self.affinity
        );
        FINISHER_RESUMED
    }
}
