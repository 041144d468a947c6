//! # ESIF Hardware Abstraction Layer
//!
//! Raw access seams used by the primitive engine to reach platform hardware.
//! Every seam is a trait so the engine never touches an instruction or a
//! firmware interface directly.
//!
//! ## Seams
//!
//! - **MSR**: per-CPU model-specific register read/write
//! - **MMIO**: 32-bit memory-mapped register window
//! - **IOSF**: message bus (MBI) sideband registers behind the host bridge
//! - **Port I/O**: legacy `in`/`out` system I/O space
//! - **CPU**: online CPU mask, affinity pinning and utilization
//! - **ACPI**: control method evaluation returning an owned object tree
//! - **Graphics**: display driver interface for performance and brightness
//!
//! ## Implementations
//!
//! Native implementations live next to each trait and are only compiled for
//! `x86_64` targets with the `x86_64` feature. Simulated devices (feature
//! `sim`) back every seam with plain memory so the engine can be exercised
//! off-target.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod acpi;
pub mod cpu;
pub mod gfx;
pub mod iosf;
pub mod mmio;
pub mod msr;
pub mod portio;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

use core::fmt;

pub use acpi::{AcpiError, AcpiEvaluator, AcpiName, AcpiObject, AcpiObjectType};
pub use cpu::{CpuTopology, ALL_CPUS};
pub use gfx::{GfxControl, GfxDriver};
pub use iosf::IosfAccess;
pub use mmio::MmioAccess;
pub use msr::MsrAccess;
pub use portio::PortIo;

/// Result type for raw hardware access
pub type HalResult<T> = Result<T, HalError>;

/// Raw hardware access errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The MSR faulted or does not exist on this CPU
    MsrFault {
        /// MSR address
        msr: u32,
        /// Logical CPU the access targeted
        cpu: u32,
    },
    /// Logical CPU is not online
    CpuOffline(u32),
    /// Pinning the caller to a CPU failed
    AffinityFailed(u32),
    /// Access lies outside the mapped window
    OutOfBounds {
        /// Byte offset of the access
        offset: u32,
        /// Window size in bytes
        size: u32,
    },
    /// Access is not naturally aligned
    Unaligned(u32),
    /// Sideband message bus did not respond
    SidebandTimeout {
        /// MBI port
        port: u8,
        /// Register within the port
        reg: u32,
    },
    /// Port I/O was rejected
    PortFault(u16),
    /// Operation is not available on this platform
    NotSupported,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MsrFault { msr, cpu } => write!(f, "MSR 0x{:x} faulted on CPU {}", msr, cpu),
            Self::CpuOffline(cpu) => write!(f, "CPU {} is offline", cpu),
            Self::AffinityFailed(cpu) => write!(f, "cannot pin to CPU {}", cpu),
            Self::OutOfBounds { offset, size } => {
                write!(f, "offset 0x{:x} outside window of {} bytes", offset, size)
            },
            Self::Unaligned(offset) => write!(f, "unaligned access at 0x{:x}", offset),
            Self::SidebandTimeout { port, reg } => {
                write!(f, "sideband port 0x{:02x} reg 0x{:x} timed out", port, reg)
            },
            Self::PortFault(port) => write!(f, "port 0x{:04x} access rejected", port),
            Self::NotSupported => write!(f, "not supported on this platform"),
        }
    }
}

/// Build the inclusive bit mask `[bit_from, bit_to]`
///
/// Bits beyond `width` are ignored, so a range that runs past the register
/// simply saturates at its top bit.
#[inline]
pub const fn bit_range_mask(bit_from: u8, bit_to: u8, width: u8) -> u64 {
    let mut mask = 0u64;
    let mut i = bit_from;
    while i <= bit_to && i < width {
        mask |= 1u64 << i;
        if i == u8::MAX {
            break;
        }
        i += 1;
    }
    mask
}
