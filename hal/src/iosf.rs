//! # IOSF Sideband Message Bus (MBI)
//!
//! Atom-class SoCs expose P-unit and thermal registers on the IOSF sideband
//! rather than as MSRs. Registers are reached through three dwords in the
//! host bridge (bus 0, device 0, function 0) PCI configuration space:
//!
//! ```text
//! MCR  (0xD0)  [31:24] opcode  [23:16] port  [15:8] reg[7:0]  [7:4] byte enables
//! MDR  (0xD4)  data
//! MCRX (0xD8)  reg[31:8]
//! ```

use alloc::sync::Arc;

use crate::portio::{pci_read32, pci_write32, PortIo};
use crate::HalResult;

/// Message control register offset
pub const MBI_MCR: u8 = 0xD0;
/// Message data register offset
pub const MBI_MDR: u8 = 0xD4;
/// Message control register extension offset
pub const MBI_MCRX: u8 = 0xD8;

/// Register read opcode
pub const MBI_REG_READ: u8 = 0x10;
/// Register write opcode
pub const MBI_REG_WRITE: u8 = 0x11;

/// Well-known sideband ports
pub mod port {
    /// Power management unit
    pub const PUNIT: u8 = 0x04;
    /// Memory controller
    pub const DUNIT: u8 = 0x01;
    /// Thermal sensors
    pub const THERMAL: u8 = 0x07;
}

/// Sideband register access
pub trait IosfAccess: Send + Sync {
    /// Read the 32-bit register `reg` on sideband `port`
    fn mbi_read(&self, port: u8, reg: u32) -> HalResult<u32>;

    /// Write the 32-bit register `reg` on sideband `port`
    fn mbi_write(&self, port: u8, reg: u32, value: u32) -> HalResult<()>;
}

/// Encode an MCR dword
#[inline]
pub const fn mcr(opcode: u8, port: u8, reg: u32) -> u32 {
    ((opcode as u32) << 24) | ((port as u32) << 16) | ((reg & 0xFF) << 8) | 0xF0
}

/// Encode an MCRX dword
#[inline]
pub const fn mcrx(reg: u32) -> u32 {
    reg & 0xFFFF_FF00
}

/// Sideband access through host bridge configuration space
#[derive(Debug)]
pub struct PciMbi<P: PortIo> {
    io: Arc<P>,
}

impl<P: PortIo> PciMbi<P> {
    /// Create an accessor over the given port I/O implementation
    pub fn new(io: Arc<P>) -> Self {
        Self { io }
    }
}

impl<P: PortIo> IosfAccess for PciMbi<P> {
    fn mbi_read(&self, port: u8, reg: u32) -> HalResult<u32> {
        let io: &dyn PortIo = &*self.io;
        pci_write32(io, 0, 0, 0, MBI_MCRX, mcrx(reg))?;
        pci_write32(io, 0, 0, 0, MBI_MCR, mcr(MBI_REG_READ, port, reg))?;
        pci_read32(io, 0, 0, 0, MBI_MDR)
    }

    fn mbi_write(&self, port: u8, reg: u32, value: u32) -> HalResult<()> {
        let io: &dyn PortIo = &*self.io;
        pci_write32(io, 0, 0, 0, MBI_MDR, value)?;
        pci_write32(io, 0, 0, 0, MBI_MCRX, mcrx(reg))?;
        pci_write32(io, 0, 0, 0, MBI_MCR, mcr(MBI_REG_WRITE, port, reg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mcr_encoding() {
        assert_eq!(mcr(MBI_REG_READ, port::PUNIT, 0x71), 0x1004_71F0);
        assert_eq!(mcrx(0x0001_2345), 0x0001_2300);
    }
}
