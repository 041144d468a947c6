//! # CPU Topology and Affinity
//!
//! Logical CPU enumeration used by affinity-qualified register access.

use crate::HalResult;

/// Sentinel CPU selector meaning "every online CPU"
pub const ALL_CPUS: u32 = u32::MAX;

/// Maximum number of logical CPUs addressable by a selector bitmap
pub const MAX_CPUS: u32 = 32;

/// Logical CPU topology of the running platform
pub trait CpuTopology: Send + Sync {
    /// Bitmap of online logical CPUs (bit N set = CPU N online)
    fn online_mask(&self) -> u64;

    /// Run `f` pinned to logical CPU `cpu` and return its result
    fn run_on(&self, cpu: u32, f: &mut dyn FnMut() -> HalResult<u64>) -> HalResult<u64>;

    /// Current CPU utilization in percent
    fn utilization(&self) -> HalResult<u32>;

    /// Check whether `cpu` is online
    fn is_online(&self, cpu: u32) -> bool {
        cpu < 64 && self.online_mask() & (1u64 << cpu) != 0
    }
}

/// Expand a CPU selector into a bitmap of target CPUs
///
/// - `0` selects CPU 0 only
/// - [`ALL_CPUS`] selects every online CPU
/// - any other value is itself a bitmap of CPUs
pub fn selector_mask(selector: u32, online: u64) -> u64 {
    match selector {
        0 => 0x1,
        ALL_CPUS => online,
        mask => mask as u64,
    }
}

/// Iterate the CPU numbers set in `mask`, lowest first
pub fn cpus_in(mask: u64) -> impl Iterator<Item = u32> {
    (0..MAX_CPUS).filter(move |cpu| mask & (1u64 << cpu) != 0)
}
