//! # Model-Specific Register (MSR) Access
//!
//! Thermal and power MSR definitions and the per-CPU access seam.
//!
//! ## Overview
//!
//! The engine reads temperatures, RAPL energy counters and power limits out
//! of MSRs. An MSR read only ever reaches the CPU that executes it, so every
//! access names a logical CPU and native implementations pin themselves
//! there before issuing `rdmsr`/`wrmsr`.
//!
//! ## Safety
//!
//! MSR access requires ring 0 privilege. Incorrect MSR writes can crash
//! the system; the raw instructions are therefore `unsafe` and only reached
//! through [`NativeMsr`].
//!
//! ## Categories
//!
//! - **Thermal**: THERM_STATUS, PACKAGE_THERM_STATUS, TEMPERATURE_TARGET
//! - **RAPL**: POWER_UNIT, *_ENERGY_STATUS, *_POWER_LIMIT, *_POWER_INFO
//! - **Platform**: PLATFORM_INFO, PERF_STATUS, PERF_CTL

use crate::cpu::CpuTopology;
use crate::{HalError, HalResult};

// =============================================================================
// RAW MSR ACCESS
// =============================================================================

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "x86_64", feature = "x86_64"))] {
        use core::arch::asm;

        /// Read a Model-Specific Register on the executing CPU
        ///
        /// # Safety
        /// - Must be in ring 0
        /// - MSR must exist (otherwise #GP)
        #[inline]
        pub unsafe fn rdmsr(msr: u32) -> u64 {
            let (low, high): (u32, u32);
            unsafe {
                asm!(
                    "rdmsr",
                    in("ecx") msr,
                    out("eax") low,
                    out("edx") high,
                    options(nomem, nostack, preserves_flags)
                );
            }
            ((high as u64) << 32) | (low as u64)
        }

        /// Write a Model-Specific Register on the executing CPU
        ///
        /// # Safety
        /// - Must be in ring 0
        /// - MSR must exist and be writable
        /// - Value must be valid for the MSR
        #[inline]
        pub unsafe fn wrmsr(msr: u32, value: u64) {
            let low = value as u32;
            let high = (value >> 32) as u32;
            unsafe {
                asm!(
                    "wrmsr",
                    in("ecx") msr,
                    in("eax") low,
                    in("edx") high,
                    options(nomem, nostack, preserves_flags)
                );
            }
        }
    }
}

// =============================================================================
// MSR ADDRESSES
// =============================================================================

/// MSR address namespace
pub mod addr {
    //! Thermal and power MSR addresses

    // =========================================================================
    // Thermal
    // =========================================================================

    /// Core thermal status (digital readout in bits 22:16)
    pub const IA32_THERM_STATUS: u32 = 0x0000_019C;
    /// Core thermal interrupt control
    pub const IA32_THERM_INTERRUPT: u32 = 0x0000_019B;
    /// Package thermal status
    pub const IA32_PACKAGE_THERM_STATUS: u32 = 0x0000_01B1;
    /// Package thermal interrupt control (thresholds 1 and 2)
    pub const IA32_PACKAGE_THERM_INTERRUPT: u32 = 0x0000_01B2;
    /// Temperature target (TjMax in bits 23:16)
    pub const MSR_TEMPERATURE_TARGET: u32 = 0x0000_01A2;

    // =========================================================================
    // Performance
    // =========================================================================

    /// Current performance state
    pub const IA32_PERF_STATUS: u32 = 0x0000_0198;
    /// Performance state control
    pub const IA32_PERF_CTL: u32 = 0x0000_0199;
    /// Platform information (ratios, programmable TjMax/TDP, RFI tuning)
    pub const MSR_PLATFORM_INFO: u32 = 0x0000_00CE;
    /// FIVR RF interference tuning control
    pub const MSR_FIVR_RFI_TUNING: u32 = 0x0000_00E4;

    // =========================================================================
    // RAPL
    // =========================================================================

    /// RAPL power/energy/time unit exponents
    pub const MSR_RAPL_POWER_UNIT: u32 = 0x0000_0606;
    /// Package power limits PL1/PL2
    pub const MSR_PKG_POWER_LIMIT: u32 = 0x0000_0610;
    /// Package energy accumulator
    pub const MSR_PKG_ENERGY_STATUS: u32 = 0x0000_0611;
    /// Package power range information
    pub const MSR_PKG_POWER_INFO: u32 = 0x0000_0614;
    /// DRAM power limit
    pub const MSR_DRAM_POWER_LIMIT: u32 = 0x0000_0618;
    /// DRAM energy accumulator
    pub const MSR_DRAM_ENERGY_STATUS: u32 = 0x0000_0619;
    /// Core (PP0) power limit
    pub const MSR_PP0_POWER_LIMIT: u32 = 0x0000_0638;
    /// Core (PP0) energy accumulator
    pub const MSR_PP0_ENERGY_STATUS: u32 = 0x0000_0639;
    /// Graphics (PP1) power limit
    pub const MSR_PP1_POWER_LIMIT: u32 = 0x0000_0640;
    /// Graphics (PP1) energy accumulator
    pub const MSR_PP1_ENERGY_STATUS: u32 = 0x0000_0641;
}

// =============================================================================
// STRUCTURED REGISTERS
// =============================================================================

bitflags::bitflags! {
    /// Low status bits of IA32_THERM_STATUS / IA32_PACKAGE_THERM_STATUS
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThermStatus: u64 {
        /// Thermal sensor currently above PROCHOT
        const STATUS = 1 << 0;
        /// Sticky log of STATUS
        const LOG = 1 << 1;
        /// PROCHOT# asserted
        const PROCHOT = 1 << 2;
        /// Sticky log of PROCHOT
        const PROCHOT_LOG = 1 << 3;
        /// Critical temperature reached
        const CRITICAL = 1 << 4;
        /// Sticky log of CRITICAL
        const CRITICAL_LOG = 1 << 5;
        /// Threshold 1 crossed
        const THRESHOLD1 = 1 << 6;
        /// Sticky log of THRESHOLD1
        const THRESHOLD1_LOG = 1 << 7;
        /// Threshold 2 crossed
        const THRESHOLD2 = 1 << 8;
        /// Sticky log of THRESHOLD2
        const THRESHOLD2_LOG = 1 << 9;
        /// Digital readout valid
        const READING_VALID = 1 << 31;
    }
}

impl ThermStatus {
    /// Digital readout: degrees below TjMax (bits 22:16)
    #[inline]
    pub const fn readout(raw: u64) -> u32 {
        ((raw >> 16) & 0x7F) as u32
    }
}

/// Decoded MSR_RAPL_POWER_UNIT
///
/// Each field is an exponent `e` meaning a unit of `1 / 2^e`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaplUnits {
    /// Power unit exponent (bits 3:0)
    pub power: u32,
    /// Energy unit exponent (bits 12:8)
    pub energy: u32,
    /// Time unit exponent (bits 19:16)
    pub time: u32,
}

impl RaplUnits {
    /// Decode the raw register value
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            power: (raw & 0xF) as u32,
            energy: ((raw >> 8) & 0x1F) as u32,
            time: ((raw >> 16) & 0xF) as u32,
        }
    }
}

/// TjMax in degrees Celsius from MSR_TEMPERATURE_TARGET (bits 23:16)
#[inline]
pub const fn tjmax_from_target(raw: u64) -> u32 {
    ((raw >> 16) & 0xFF) as u32
}

// =============================================================================
// ACCESS SEAM
// =============================================================================

/// Per-CPU MSR access
pub trait MsrAccess: Send + Sync {
    /// Bitmap of online CPUs reachable by this accessor
    fn online_cpus(&self) -> u64;

    /// Read `msr` on logical CPU `cpu`
    fn read(&self, cpu: u32, msr: u32) -> HalResult<u64>;

    /// Write `msr` on logical CPU `cpu`
    fn write(&self, cpu: u32, msr: u32, value: u64) -> HalResult<()>;
}

/// MSR accessor issuing real `rdmsr`/`wrmsr` after pinning to the target CPU
#[derive(Debug)]
pub struct NativeMsr<T: CpuTopology> {
    topology: T,
}

impl<T: CpuTopology> NativeMsr<T> {
    /// Create an accessor over the given CPU topology
    ///
    /// # Safety
    /// The caller must run in ring 0 for the lifetime of the accessor.
    pub unsafe fn new(topology: T) -> Self {
        Self { topology }
    }
}

impl<T: CpuTopology> MsrAccess for NativeMsr<T> {
    fn online_cpus(&self) -> u64 {
        self.topology.online_mask()
    }

    fn read(&self, cpu: u32, msr: u32) -> HalResult<u64> {
        if !self.topology.is_online(cpu) {
            return Err(HalError::CpuOffline(cpu));
        }
        self.topology.run_on(cpu, &mut || native_read(cpu, msr))
    }

    fn write(&self, cpu: u32, msr: u32, value: u64) -> HalResult<()> {
        if !self.topology.is_online(cpu) {
            return Err(HalError::CpuOffline(cpu));
        }
        self.topology
            .run_on(cpu, &mut || native_write(cpu, msr, value).map(|()| 0))
            .map(|_| ())
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "x86_64", feature = "x86_64"))] {
        fn native_read(_cpu: u32, msr: u32) -> HalResult<u64> {
            #[cfg(feature = "debug")]
            log::trace!("MSR: rdmsr 0x{:x} on CPU {}", msr, _cpu);
            // SAFETY: NativeMsr::new requires ring 0; the topology pinned us.
            Ok(unsafe { rdmsr(msr) })
        }

        fn native_write(_cpu: u32, msr: u32, value: u64) -> HalResult<()> {
            #[cfg(feature = "debug")]
            log::trace!("MSR: wrmsr 0x{:x} <- 0x{:x} on CPU {}", msr, value, _cpu);
            // SAFETY: NativeMsr::new requires ring 0; the topology pinned us.
            unsafe { wrmsr(msr, value) };
            Ok(())
        }
    } else {
        fn native_read(cpu: u32, msr: u32) -> HalResult<u64> {
            Err(HalError::MsrFault { msr, cpu })
        }

        fn native_write(cpu: u32, msr: u32, _value: u64) -> HalResult<()> {
            Err(HalError::MsrFault { msr, cpu })
        }
    }
}
