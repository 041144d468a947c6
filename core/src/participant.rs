//! # Participant Runtime
//!
//! A participant is one hardware device managed by the engine: a CPU
//! package, a PCH, a fan controller. It owns
//!
//! - the hardware handles its actions reach ([`Platform`]),
//! - the domains and their cached runtime state,
//! - the catalog slot, swapped atomically on descriptor reload,
//! - the VAR store.
//!
//! ## Reload
//!
//! The catalog sits behind a [`RwLock`]. Primitive calls hold the read guard
//! for their whole duration; a reload takes the write guard, so it waits for
//! in-flight calls and no call ever observes a half-built catalog.
//!
//! ## Backend locks
//!
//! Register and firmware backends serialize through [`BACKEND_LOCKS`]: one
//! lock per backend type, shared by every participant reaching the hardware.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use esif_hal::{AcpiEvaluator, CpuTopology, GfxDriver, IosfAccess, MmioAccess, MsrAccess, PortIo};
use spin::{Mutex, RwLock};

use crate::backend::VarStore;
use crate::catalog::{Catalog, DspImage, DspParser, Event};
use crate::config::EngineConfig;
use crate::data::{DataType, EsifData};
use crate::domain::{Domain, DomainCapability, PollMask, TEMP_INVALID};
use crate::error::{EsifError, EsifResult};
use crate::primitive::{id, INSTANCE_ANY};
use crate::xform::{PowerContext, XformEnv};

// =============================================================================
// PLATFORM
// =============================================================================

/// Hardware handles available to a participant
///
/// Every handle is optional; actions reaching a missing one fail with the
/// matching `No*Support` error.
#[derive(Clone, Default)]
pub struct Platform {
    /// CPU topology
    pub cpu: Option<Arc<dyn CpuTopology>>,
    /// MSR access
    pub msr: Option<Arc<dyn MsrAccess>>,
    /// MMIO window of the device
    pub mmio: Option<Arc<dyn MmioAccess>>,
    /// Sideband message bus
    pub iosf: Option<Arc<dyn IosfAccess>>,
    /// System I/O ports
    pub port_io: Option<Arc<dyn PortIo>>,
    /// ACPI device node
    pub acpi: Option<Arc<dyn AcpiEvaluator>>,
    /// Graphics driver
    pub gfx: Option<Arc<dyn GfxDriver>>,
}

impl Platform {
    /// No hardware at all
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach CPU topology
    pub fn with_cpu(mut self, cpu: Arc<dyn CpuTopology>) -> Self {
        self.cpu = Some(cpu);
        self
    }

    /// Attach MSR access
    pub fn with_msr(mut self, msr: Arc<dyn MsrAccess>) -> Self {
        self.msr = Some(msr);
        self
    }

    /// Attach an MMIO window
    pub fn with_mmio(mut self, mmio: Arc<dyn MmioAccess>) -> Self {
        self.mmio = Some(mmio);
        self
    }

    /// Attach sideband access
    pub fn with_iosf(mut self, iosf: Arc<dyn IosfAccess>) -> Self {
        self.iosf = Some(iosf);
        self
    }

    /// Attach port I/O
    pub fn with_port_io(mut self, port_io: Arc<dyn PortIo>) -> Self {
        self.port_io = Some(port_io);
        self
    }

    /// Attach an ACPI device node
    pub fn with_acpi(mut self, acpi: Arc<dyn AcpiEvaluator>) -> Self {
        self.acpi = Some(acpi);
        self
    }

    /// Attach a graphics driver
    pub fn with_gfx(mut self, gfx: Arc<dyn GfxDriver>) -> Self {
        self.gfx = Some(gfx);
        self
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("cpu", &self.cpu.is_some())
            .field("msr", &self.msr.is_some())
            .field("mmio", &self.mmio.is_some())
            .field("iosf", &self.iosf.is_some())
            .field("port_io", &self.port_io.is_some())
            .field("acpi", &self.acpi.is_some())
            .field("gfx", &self.gfx.is_some())
            .finish()
    }
}

// =============================================================================
// LOCKS
// =============================================================================

/// One lock per register backend
///
/// Read-modify-write sequences and multi-step firmware calls hold the lock of
/// their backend for their whole duration.
#[derive(Debug)]
pub struct BackendLocks {
    /// MSR read-modify-write and affinity sweeps
    pub msr: Mutex<()>,
    /// MMIO read-modify-write
    pub mmio: Mutex<()>,
    /// Sideband read-modify-write
    pub iosf: Mutex<()>,
    /// Port I/O read-modify-write
    pub systemio: Mutex<()>,
    /// ACPI evaluation
    pub acpi: Mutex<()>,
}

impl BackendLocks {
    const fn new() -> Self {
        Self {
            msr: Mutex::new(()),
            mmio: Mutex::new(()),
            iosf: Mutex::new(()),
            systemio: Mutex::new(()),
            acpi: Mutex::new(()),
        }
    }
}

/// Process-wide backend locks
pub static BACKEND_LOCKS: BackendLocks = BackendLocks::new();

// =============================================================================
// PARTICIPANT
// =============================================================================

/// One managed device
pub struct Participant {
    name: String,
    config: EngineConfig,
    platform: Platform,
    domains: Vec<Domain>,
    catalog: RwLock<Option<Catalog>>,
    parser: Option<Arc<dyn DspParser>>,
    vars: VarStore,
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("domains", &self.domains.len())
            .field("dsp_loaded", &self.has_dsp())
            .finish()
    }
}

impl Participant {
    /// Create a participant with no descriptor loaded
    pub fn new(name: &str, config: EngineConfig, platform: Platform, domains: Vec<Domain>) -> Self {
        Self {
            name: String::from(name),
            config,
            platform,
            domains,
            catalog: RwLock::new(None),
            parser: None,
            vars: VarStore::new(),
        }
    }

    /// Use `parser` for `DSP`-typed reload requests
    pub fn with_parser(mut self, parser: Arc<dyn DspParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Participant name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Hardware handles
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Backend locks, shared with every other participant
    pub fn locks(&self) -> &'static BackendLocks {
        &BACKEND_LOCKS
    }

    /// VAR store
    pub fn vars(&self) -> &VarStore {
        &self.vars
    }

    /// All domains
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// Domain at `index`
    pub fn domain(&self, index: u8) -> EsifResult<&Domain> {
        self.domains.get(index as usize).ok_or(EsifError::OutOfBounds)
    }

    /// Domain addressed by a packed domain code
    pub fn domain_by_code(&self, code: u16) -> EsifResult<&Domain> {
        self.domain(crate::primitive::domain_index(code)?)
    }

    /// Transform inputs for a primitive on domain `code`
    ///
    /// TjMax always comes from the first domain; RAPL exponents come from
    /// the addressed domain and fall back to the configured defaults.
    pub(crate) fn xform_env(&self, code: u16) -> XformEnv {
        let tjmax = self
            .domains
            .first()
            .map_or(0, |d| d.snapshot().temp_tjmax);
        let power_unit = self.domain_by_code(code).map_or(0, |d| d.snapshot().rapl_power_unit);
        let (core_unit, atom_unit) = if power_unit == 0 {
            (self.config.core_power_unit, self.config.atom_power_unit)
        } else {
            (power_unit, power_unit)
        };
        XformEnv {
            temp_unit: self.config.temp_unit,
            tjmax: self.config.tjmax_or_default(tjmax),
            power: PowerContext { core_unit, atom_unit },
        }
    }

    // =========================================================================
    // Catalog slot
    // =========================================================================

    /// Check whether a descriptor is loaded
    pub fn has_dsp(&self) -> bool {
        self.catalog.read().is_some()
    }

    /// Run `f` against the loaded catalog
    pub fn with_catalog<R>(&self, f: impl FnOnce(&Catalog) -> R) -> EsifResult<R> {
        let guard = self.catalog.read();
        let catalog = guard.as_ref().ok_or(EsifError::NeedDsp)?;
        Ok(f(catalog))
    }

    pub(crate) fn catalog_slot(&self) -> &RwLock<Option<Catalog>> {
        &self.catalog
    }

    /// Build a catalog from `image` and swap it in
    ///
    /// Software variables belong to the catalog they were set under and are
    /// dropped. Domains are instrumented afterwards; instrumentation failures are
    /// logged and do not fail the load.
    pub fn load_dsp(&self, image: DspImage) -> EsifResult<()> {
        let catalog = Catalog::build(image, self.config.catalog_buckets)?;
        let code = catalog.metadata().code.clone();
        let previous = self.catalog.write().replace(catalog);
        self.vars.clear();
        match previous {
            Some(old) => log::info!("DSP: {} replaced {} on {}", code, old.metadata().code, self.name),
            None => log::info!("DSP: {} loaded on {}", code, self.name),
        }
        self.instrument_domains();
        Ok(())
    }

    /// Drop the loaded catalog
    pub fn unload_dsp(&self) -> EsifResult<()> {
        let previous = self.catalog.write().take().ok_or(EsifError::NeedDsp)?;
        self.vars.clear();
        log::info!("DSP: {} unloaded from {}", previous.metadata().code, self.name);
        Ok(())
    }

    /// Handle a `DSP`-typed request: non-empty body (re)loads, empty unloads
    pub(crate) fn reload_dsp(&self, req: &EsifData) -> EsifResult<()> {
        let body = req.data();
        if body.is_empty() {
            return self.unload_dsp();
        }
        let parser = self.parser.as_ref().ok_or_else(|| {
            log::warn!("DSP: {} has no descriptor parser", self.name);
            EsifError::NotSupported
        })?;
        let image = parser.parse(body)?;
        self.load_dsp(image)
    }

    /// Event mapped to ACPI notify `notify_id`
    pub fn get_event(&self, notify_id: u32) -> EsifResult<Option<Event>> {
        self.with_catalog(|catalog| catalog.get_event(notify_id).copied())
    }

    // =========================================================================
    // Instrumentation
    // =========================================================================

    /// Prime domain caches from the freshly loaded catalog
    pub fn instrument_domains(&self) {
        for domain in &self.domains {
            if domain
                .capabilities
                .intersects(DomainCapability::TEMP_STATUS | DomainCapability::TEMP_THRESHOLD)
            {
                self.instrument_temperature(domain);
            }
            if domain
                .capabilities
                .intersects(DomainCapability::POWER_STATUS | DomainCapability::POWER_CONTROL)
            {
                self.instrument_power(domain);
            }
        }
    }

    fn read_u32(&self, primitive_id: u16, domain: u16, ty: DataType) -> EsifResult<u32> {
        let mut rsp = EsifData::new(ty, 4);
        self.get_simple_primitive(primitive_id, domain, INSTANCE_ANY, &mut rsp)?;
        rsp.read_u32().ok_or(EsifError::PrimitiveActionFailure)
    }

    fn instrument_temperature(&self, domain: &Domain) {
        let hysteresis = self.read_u32(id::GET_TEMPERATURE_THRESHOLD_HYSTERESIS, domain.code, DataType::Temperature);
        let tjmax = self.read_u32(id::GET_PROC_TJMAX, domain.code, DataType::Uint32);
        domain.with_state(|state| {
            match hysteresis {
                Ok(value) => state.temp_hysteresis = value,
                Err(err) => log::debug!("Primitive: {} hysteresis unavailable: {}", domain.name, err),
            }
            match tjmax {
                Ok(value) => state.temp_tjmax = value,
                Err(err) => log::debug!("Primitive: {} TjMax unavailable: {}", domain.name, err),
            }
            state.temp_aux0 = TEMP_INVALID;
            state.temp_aux1 = TEMP_INVALID;
        });
    }

    fn instrument_power(&self, domain: &Domain) {
        let units = [
            id::GET_RAPL_POWER_UNIT,
            id::GET_RAPL_ENERGY_UNIT,
            id::GET_RAPL_TIME_UNIT,
        ]
        .map(|primitive| self.read_u32(primitive, domain.code, DataType::Uint32));

        let aux_high = self.config.power_aux_high;
        domain.with_state(|state| {
            let slots = [
                &mut state.rapl_power_unit,
                &mut state.rapl_energy_unit,
                &mut state.rapl_time_unit,
            ];
            for (slot, unit) in slots.into_iter().zip(units) {
                match unit {
                    Ok(value) => *slot = value,
                    Err(err) => log::debug!("Primitive: {} RAPL unit unavailable: {}", domain.name, err),
                }
            }
            state.power_aux0 = 0;
            state.power_aux1 = aux_high;
            state.poll_mask |= PollMask::POWER;
        });
        log::debug!("Primitive: {} power polling enabled", domain.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Algorithm, DspMetadata, PowerXform, TempXform};
    use crate::primitive::{Action, ActionType, Opcode, Primitive, Tuple, DOMAIN_D0, DOMAIN_D1};
    use alloc::vec;

    fn konst(primitive_id: u16, domain: u16, value: u32) -> Primitive {
        Primitive::new(
            Tuple::new(primitive_id, domain, INSTANCE_ANY),
            Opcode::Get,
            vec![Action::with_p1(ActionType::Konst, value)],
        )
    }

    fn cpu_participant() -> Participant {
        let domains = vec![
            Domain::new(
                DOMAIN_D0,
                "CPU",
                DomainCapability::TEMP_STATUS | DomainCapability::POWER_CONTROL,
            ),
            Domain::new(DOMAIN_D1, "GFX", DomainCapability::PERF_CONTROL),
        ];
        Participant::new("TCPU", EngineConfig::default(), Platform::new(), domains)
    }

    fn image() -> DspImage {
        DspImage::new(DspMetadata::new("tcpu", 1, 0, 2))
            .algorithm(Algorithm::new(ActionType::Konst, TempXform::None, PowerXform::None))
            .primitive(konst(id::GET_PROC_TJMAX, DOMAIN_D0, 105))
            .primitive(konst(id::GET_TEMPERATURE_THRESHOLD_HYSTERESIS, DOMAIN_D0, 2))
            .primitive(konst(id::GET_RAPL_POWER_UNIT, DOMAIN_D0, 3))
            .primitive(konst(id::GET_RAPL_ENERGY_UNIT, DOMAIN_D0, 14))
            .primitive(konst(id::GET_RAPL_TIME_UNIT, DOMAIN_D0, 10))
    }

    #[test]
    fn test_no_dsp() {
        let participant = cpu_participant();
        assert!(!participant.has_dsp());
        assert_eq!(participant.with_catalog(|c| c.len()), Err(EsifError::NeedDsp));
        assert_eq!(participant.unload_dsp(), Err(EsifError::NeedDsp));
    }

    #[test]
    fn test_load_instruments_domains() {
        let participant = cpu_participant();
        participant.load_dsp(image()).unwrap();

        let state = participant.domain(0).unwrap().snapshot();
        assert_eq!(state.temp_tjmax, 105);
        assert_eq!(state.temp_hysteresis, 2);
        assert_eq!(state.temp_aux0, TEMP_INVALID);
        assert_eq!((state.rapl_power_unit, state.rapl_energy_unit, state.rapl_time_unit), (3, 14, 10));
        assert_eq!(state.power_aux1, 10_000_000);
        assert!(state.is_polling_power());

        // domain 1 has neither temperature nor power capability
        assert_eq!(participant.domain(1).unwrap().snapshot().poll_mask, PollMask::empty());
    }

    #[test]
    fn test_xform_env_uses_cached_values() {
        let participant = cpu_participant();
        let env = participant.xform_env(DOMAIN_D0);
        assert_eq!(env.tjmax, 100);
        assert_eq!(env.power, PowerContext { core_unit: 3, atom_unit: 5 });

        participant.domain(0).unwrap().with_state(|s| {
            s.temp_tjmax = 90;
            s.rapl_power_unit = 4;
        });
        let env = participant.xform_env(DOMAIN_D0);
        assert_eq!(env.tjmax, 90);
        assert_eq!(env.power, PowerContext { core_unit: 4, atom_unit: 4 });
    }

    #[test]
    fn test_domain_bounds() {
        let participant = cpu_participant();
        assert!(participant.domain(1).is_ok());
        assert_eq!(participant.domain(2).err(), Some(EsifError::OutOfBounds));
        assert_eq!(participant.domain_by_code(DOMAIN_D1).map(|d| d.code), Ok(DOMAIN_D1));
    }

    struct FixedParser;

    impl DspParser for FixedParser {
        fn parse(&self, body: &[u8]) -> EsifResult<DspImage> {
            let value = body.first().copied().ok_or(EsifError::InvalidRequestType)?;
            Ok(DspImage::new(DspMetadata::new("fixed", 1, 0, 1))
                .primitive(konst(id::GET_TEMPERATURE, DOMAIN_D0, value as u32)))
        }
    }

    #[test]
    fn test_reload_through_parser() {
        let participant = cpu_participant().with_parser(Arc::new(FixedParser));
        participant.reload_dsp(&EsifData::from_bytes(DataType::Dsp, vec![7])).unwrap();
        assert_eq!(participant.with_catalog(|c| c.metadata().code.clone()).unwrap(), "fixed");

        participant.reload_dsp(&EsifData::new(DataType::Dsp, 0)).unwrap();
        assert!(!participant.has_dsp());
    }

    #[test]
    fn test_reload_without_parser() {
        let participant = cpu_participant();
        assert_eq!(
            participant.reload_dsp(&EsifData::from_bytes(DataType::Dsp, vec![1])),
            Err(EsifError::NotSupported)
        );
    }
}
