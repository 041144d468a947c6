//! # Legacy Port I/O
//!
//! `in`/`out` access to the x86 system I/O space.

use crate::HalResult;

/// System I/O port access
pub trait PortIo: Send + Sync {
    /// Read a 32-bit value from `port`
    fn inl(&self, port: u16) -> HalResult<u32>;

    /// Write a 32-bit value to `port`
    fn outl(&self, port: u16, value: u32) -> HalResult<()>;
}

/// Port I/O through the native `in`/`out` instructions
#[derive(Debug)]
pub struct NativePortIo {
    _priv: (),
}

impl NativePortIo {
    /// Create a native accessor
    ///
    /// # Safety
    /// The caller must hold I/O privilege (ring 0 or IOPL 3).
    pub unsafe fn new() -> Self {
        Self { _priv: () }
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "x86_64", feature = "x86_64"))] {
        use core::arch::asm;

        impl PortIo for NativePortIo {
            fn inl(&self, port: u16) -> HalResult<u32> {
                let value: u32;
                // SAFETY: I/O privilege guaranteed by NativePortIo::new
                unsafe {
                    asm!("in eax, dx", out("eax") value, in("dx") port,
                         options(nomem, nostack, preserves_flags));
                }
                Ok(value)
            }

            fn outl(&self, port: u16, value: u32) -> HalResult<()> {
                // SAFETY: I/O privilege guaranteed by NativePortIo::new
                unsafe {
                    asm!("out dx, eax", in("dx") port, in("eax") value,
                         options(nomem, nostack, preserves_flags));
                }
                Ok(())
            }
        }
    } else {
        impl PortIo for NativePortIo {
            fn inl(&self, port: u16) -> HalResult<u32> {
                Err(crate::HalError::PortFault(port))
            }

            fn outl(&self, port: u16, _value: u32) -> HalResult<()> {
                Err(crate::HalError::PortFault(port))
            }
        }
    }
}

/// PCI configuration address port
pub const PCI_CONFIG_ADDRESS: u16 = 0xCF8;
/// PCI configuration data port
pub const PCI_CONFIG_DATA: u16 = 0xCFC;

/// Build a type-1 PCI configuration address
#[inline]
pub const fn pci_config_address(bus: u8, device: u8, function: u8, reg: u8) -> u32 {
    0x8000_0000
        | ((bus as u32) << 16)
        | (((device & 0x1F) as u32) << 11)
        | (((function & 0x7) as u32) << 8)
        | ((reg & 0xFC) as u32)
}

/// Read a dword from PCI configuration space
pub fn pci_read32(io: &dyn PortIo, bus: u8, device: u8, function: u8, reg: u8) -> HalResult<u32> {
    io.outl(PCI_CONFIG_ADDRESS, pci_config_address(bus, device, function, reg))?;
    io.inl(PCI_CONFIG_DATA)
}

/// Write a dword to PCI configuration space
pub fn pci_write32(
    io: &dyn PortIo,
    bus: u8,
    device: u8,
    function: u8,
    reg: u8,
    value: u32,
) -> HalResult<()> {
    io.outl(PCI_CONFIG_ADDRESS, pci_config_address(bus, device, function, reg))?;
    io.outl(PCI_CONFIG_DATA, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pci_config_address() {
        assert_eq!(pci_config_address(0, 0, 0, 0xD0), 0x8000_00D0);
        assert_eq!(pci_config_address(1, 2, 3, 0x13), 0x8001_1310);
    }
}
