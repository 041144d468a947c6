//! # Memory-Mapped I/O Window
//!
//! 32-bit register access into a participant's MMIO BAR. Offsets are in
//! bytes from the window base and every access is exactly 32 bits wide.

use core::ptr::NonNull;

use crate::{HalError, HalResult};

// =============================================================================
// ACCESS SEAM
// =============================================================================

/// Bounded 32-bit MMIO register window
pub trait MmioAccess: Send + Sync {
    /// Window size in bytes
    fn size(&self) -> u32;

    /// Read the 32-bit register at `offset`
    fn read32(&self, offset: u32) -> HalResult<u32>;

    /// Write the 32-bit register at `offset`
    fn write32(&self, offset: u32, value: u32) -> HalResult<()>;

    /// Check that a 32-bit access at `offset` stays inside the window
    fn check(&self, offset: u32) -> HalResult<()> {
        let size = self.size();
        if offset as u64 + 4 > size as u64 {
            return Err(HalError::OutOfBounds { offset, size });
        }
        if offset % 4 != 0 {
            return Err(HalError::Unaligned(offset));
        }
        Ok(())
    }
}

// =============================================================================
// MAPPED REGION
// =============================================================================

/// MMIO window over a mapped virtual address range
#[derive(Debug)]
pub struct MmioRegion {
    base: NonNull<u32>,
    size: u32,
}

// SAFETY: the region is device memory; all accesses are volatile and
// callers serialize read-modify-write sequences.
unsafe impl Send for MmioRegion {}
// SAFETY: see above.
unsafe impl Sync for MmioRegion {}

impl MmioRegion {
    /// Wrap an already-mapped register window
    ///
    /// # Safety
    /// - `base` must map `size` bytes of device memory for the lifetime of
    ///   the region
    /// - `base` must be 4-byte aligned
    pub unsafe fn new(base: NonNull<u32>, size: u32) -> Self {
        Self { base, size }
    }
}

impl MmioAccess for MmioRegion {
    fn size(&self) -> u32 {
        self.size
    }

    fn read32(&self, offset: u32) -> HalResult<u32> {
        self.check(offset)?;
        // SAFETY: bounds and alignment checked above; mapping guaranteed by new()
        let value = unsafe {
            core::ptr::read_volatile(self.base.as_ptr().add((offset / 4) as usize))
        };
        #[cfg(feature = "debug")]
        log::trace!("MMIO: read 0x{:x} -> 0x{:08x}", offset, value);
        Ok(value)
    }

    fn write32(&self, offset: u32, value: u32) -> HalResult<()> {
        self.check(offset)?;
        #[cfg(feature = "debug")]
        log::trace!("MMIO: write 0x{:x} <- 0x{:08x}", offset, value);
        // SAFETY: bounds and alignment checked above; mapping guaranteed by new()
        unsafe {
            core::ptr::write_volatile(self.base.as_ptr().add((offset / 4) as usize), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_bounds() {
        let mut backing = [0u32; 4];
        let base = NonNull::new(backing.as_mut_ptr()).unwrap();
        // SAFETY: backing outlives the region within this test
        let region = unsafe { MmioRegion::new(base, 16) };

        region.write32(0xC, 0xDEAD_BEEF).unwrap();
        assert_eq!(region.read32(0xC).unwrap(), 0xDEAD_BEEF);
        assert_eq!(
            region.read32(0x10),
            Err(HalError::OutOfBounds { offset: 0x10, size: 16 })
        );
        assert_eq!(region.read32(0x2), Err(HalError::Unaligned(0x2)));
    }
}
