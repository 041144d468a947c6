//! # Simulated Hardware
//!
//! Memory-backed implementations of every access seam. Used for bring-up on
//! machines without the target silicon and by the engine's unit tests.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::acpi::{AcpiError, AcpiEvaluator, AcpiName, AcpiObject};
use crate::cpu::CpuTopology;
use crate::gfx::{GfxControl, GfxDriver};
use crate::iosf::IosfAccess;
use crate::mmio::MmioAccess;
use crate::msr::MsrAccess;
use crate::portio::PortIo;
use crate::{HalError, HalResult};

// =============================================================================
// CPU
// =============================================================================

/// Simulated CPU topology
#[derive(Debug)]
pub struct SimCpu {
    online: u64,
    utilization: Mutex<u32>,
}

impl SimCpu {
    /// Topology with CPUs `0..count` online
    pub fn new(count: u32) -> Self {
        let online = if count >= 64 { u64::MAX } else { (1u64 << count) - 1 };
        Self { online, utilization: Mutex::new(0) }
    }

    /// Set the reported utilization
    pub fn set_utilization(&self, percent: u32) {
        *self.utilization.lock() = percent;
    }
}

impl CpuTopology for SimCpu {
    fn online_mask(&self) -> u64 {
        self.online
    }

    fn run_on(&self, cpu: u32, f: &mut dyn FnMut() -> HalResult<u64>) -> HalResult<u64> {
        if !self.is_online(cpu) {
            return Err(HalError::AffinityFailed(cpu));
        }
        f()
    }

    fn utilization(&self) -> HalResult<u32> {
        Ok(*self.utilization.lock())
    }
}

// =============================================================================
// MSR
// =============================================================================

/// Simulated per-CPU MSR file
#[derive(Debug)]
pub struct SimMsr {
    online: u64,
    regs: Mutex<BTreeMap<(u32, u32), u64>>,
    faulting: Mutex<Vec<(u32, u32)>>,
}

impl SimMsr {
    /// MSR file for CPUs `0..cpus`, every register reading zero
    pub fn new(cpus: u32) -> Self {
        let online = if cpus >= 64 { u64::MAX } else { (1u64 << cpus) - 1 };
        Self {
            online,
            regs: Mutex::new(BTreeMap::new()),
            faulting: Mutex::new(Vec::new()),
        }
    }

    /// Preload `msr` on one CPU
    pub fn poke(&self, cpu: u32, msr: u32, value: u64) {
        self.regs.lock().insert((cpu, msr), value);
    }

    /// Preload `msr` with the same value on every online CPU
    pub fn poke_all(&self, msr: u32, value: u64) {
        let mut regs = self.regs.lock();
        for cpu in crate::cpu::cpus_in(self.online) {
            regs.insert((cpu, msr), value);
        }
    }

    /// Raw register content, bypassing fault injection
    pub fn peek(&self, cpu: u32, msr: u32) -> u64 {
        self.regs.lock().get(&(cpu, msr)).copied().unwrap_or(0)
    }

    /// Make every access to `msr` on `cpu` fault
    pub fn inject_fault(&self, cpu: u32, msr: u32) {
        self.faulting.lock().push((cpu, msr));
    }

    fn check(&self, cpu: u32, msr: u32) -> HalResult<()> {
        if cpu >= 64 || self.online & (1u64 << cpu) == 0 {
            return Err(HalError::CpuOffline(cpu));
        }
        if self.faulting.lock().contains(&(cpu, msr)) {
            return Err(HalError::MsrFault { msr, cpu });
        }
        Ok(())
    }
}

impl MsrAccess for SimMsr {
    fn online_cpus(&self) -> u64 {
        self.online
    }

    fn read(&self, cpu: u32, msr: u32) -> HalResult<u64> {
        self.check(cpu, msr)?;
        Ok(self.peek(cpu, msr))
    }

    fn write(&self, cpu: u32, msr: u32, value: u64) -> HalResult<()> {
        self.check(cpu, msr)?;
        self.poke(cpu, msr, value);
        Ok(())
    }
}

// =============================================================================
// MMIO
// =============================================================================

/// Simulated MMIO window
#[derive(Debug)]
pub struct SimMmio {
    regs: Mutex<Vec<u32>>,
}

impl SimMmio {
    /// Zeroed window of `size` bytes (rounded down to whole registers)
    pub fn new(size: u32) -> Self {
        Self { regs: Mutex::new(vec![0; (size / 4) as usize]) }
    }

    /// Preload the register at `offset`
    pub fn poke(&self, offset: u32, value: u32) {
        if let Some(reg) = self.regs.lock().get_mut((offset / 4) as usize) {
            *reg = value;
        }
    }

    /// Raw register content
    pub fn peek(&self, offset: u32) -> u32 {
        self.regs.lock().get((offset / 4) as usize).copied().unwrap_or(0)
    }
}

impl MmioAccess for SimMmio {
    fn size(&self) -> u32 {
        (self.regs.lock().len() * 4) as u32
    }

    fn read32(&self, offset: u32) -> HalResult<u32> {
        self.check(offset)?;
        Ok(self.peek(offset))
    }

    fn write32(&self, offset: u32, value: u32) -> HalResult<()> {
        self.check(offset)?;
        self.poke(offset, value);
        Ok(())
    }
}

// =============================================================================
// IOSF / PORT I/O
// =============================================================================

/// Simulated sideband register file
#[derive(Debug, Default)]
pub struct SimIosf {
    regs: Mutex<BTreeMap<(u8, u32), u32>>,
}

impl SimIosf {
    /// Empty sideband, every register reading zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a register
    pub fn poke(&self, port: u8, reg: u32, value: u32) {
        self.regs.lock().insert((port, reg), value);
    }

    /// Raw register content
    pub fn peek(&self, port: u8, reg: u32) -> u32 {
        self.regs.lock().get(&(port, reg)).copied().unwrap_or(0)
    }
}

impl IosfAccess for SimIosf {
    fn mbi_read(&self, port: u8, reg: u32) -> HalResult<u32> {
        Ok(self.peek(port, reg))
    }

    fn mbi_write(&self, port: u8, reg: u32, value: u32) -> HalResult<()> {
        self.poke(port, reg, value);
        Ok(())
    }
}

/// Simulated system I/O space
#[derive(Debug, Default)]
pub struct SimPortIo {
    ports: Mutex<BTreeMap<u16, u32>>,
}

impl SimPortIo {
    /// Empty I/O space
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a port
    pub fn poke(&self, port: u16, value: u32) {
        self.ports.lock().insert(port, value);
    }

    /// Raw port content
    pub fn peek(&self, port: u16) -> u32 {
        self.ports.lock().get(&port).copied().unwrap_or(0)
    }
}

impl PortIo for SimPortIo {
    fn inl(&self, port: u16) -> HalResult<u32> {
        Ok(self.peek(port))
    }

    fn outl(&self, port: u16, value: u32) -> HalResult<()> {
        self.poke(port, value);
        Ok(())
    }
}

// =============================================================================
// ACPI
// =============================================================================

type AcpiReply = Result<Option<AcpiObject>, AcpiError>;

/// Simulated ACPI device node with canned method replies
#[derive(Debug, Default)]
pub struct SimAcpi {
    methods: Mutex<BTreeMap<[u8; 4], AcpiReply>>,
    calls: Mutex<Vec<(AcpiName, Vec<AcpiObject>)>>,
}

impl SimAcpi {
    /// Device node with no methods
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `method` to return `value`
    pub fn define(&self, method: &str, value: AcpiObject) {
        self.methods.lock().insert(AcpiName::new(method).0, Ok(Some(value)));
    }

    /// Define `method` to complete without a return value
    pub fn define_void(&self, method: &str) {
        self.methods.lock().insert(AcpiName::new(method).0, Ok(None));
    }

    /// Define `method` to fail with `err`
    pub fn define_error(&self, method: &str, err: AcpiError) {
        self.methods.lock().insert(AcpiName::new(method).0, Err(err));
    }

    /// Every evaluation so far, oldest first
    pub fn calls(&self) -> Vec<(AcpiName, Vec<AcpiObject>)> {
        self.calls.lock().clone()
    }
}

impl AcpiEvaluator for SimAcpi {
    fn evaluate(&self, method: AcpiName, args: &[AcpiObject]) -> Result<Option<AcpiObject>, AcpiError> {
        self.calls.lock().push((method, args.to_vec()));
        match self.methods.lock().get(&method.0) {
            Some(reply) => reply.clone(),
            None => Err(AcpiError::NotFound),
        }
    }
}

// =============================================================================
// GRAPHICS
// =============================================================================

/// Simulated graphics driver
#[derive(Debug, Default)]
pub struct SimGfx {
    settings: Mutex<BTreeMap<(u8, u32), u32>>,
}

impl SimGfx {
    /// Driver with every setting reading zero
    pub fn new() -> Self {
        Self::default()
    }

    fn key(control: GfxControl, index: u32) -> (u8, u32) {
        let control = match control {
            GfxControl::Performance => 0,
            GfxControl::Display => 1,
        };
        (control, index)
    }
}

impl GfxDriver for SimGfx {
    fn get(&self, control: GfxControl, index: u32) -> HalResult<u32> {
        Ok(self.settings.lock().get(&Self::key(control, index)).copied().unwrap_or(0))
    }

    fn set(&self, control: GfxControl, index: u32, value: u32) -> HalResult<()> {
        self.settings.lock().insert(Self::key(control, index), value);
        Ok(())
    }
}
