//! # Engine Configuration
//!
//! Tunables shared by every participant. All values have platform defaults;
//! named constructors cover the common alternatives.

use crate::xform::temp::TempUnit;

// ============================================================================
// DEFAULTS
// ============================================================================

/// Primitive hash table bucket count
pub const DEFAULT_CATALOG_BUCKETS: usize = 31;

/// TjMax assumed until the processor reports one (degrees C)
pub const DEFAULT_TJMAX: u32 = 100;

/// RAPL power-unit exponent assumed for core parts (1/2^3 W)
pub const DEFAULT_CORE_POWER_UNIT: u32 = 3;

/// RAPL power-unit exponent assumed for Atom parts (1/2^5 W)
pub const DEFAULT_ATOM_POWER_UNIT: u32 = 5;

/// Scale between a percent value and its hardware integer
pub const DEFAULT_PERCENT_FACTOR: u32 = 100;

/// Upper power threshold armed when a power domain is instrumented (mW)
pub const DEFAULT_POWER_AUX_HIGH: u32 = 10_000_000;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of hash buckets in each catalog
    pub catalog_buckets: usize,
    /// TjMax used when a domain never reported one
    pub default_tjmax: u32,
    /// RAPL power-unit exponent for `UNIT_CORE` until the domain reports one
    pub core_power_unit: u32,
    /// RAPL power-unit exponent for `UNIT_ATOM` until the domain reports one
    pub atom_power_unit: u32,
    /// Percent conversion factor applied around backends
    pub percent_factor: u32,
    /// Semantic temperature unit exchanged with callers
    pub temp_unit: TempUnit,
    /// Re-read RAPL power for CODE `ADDP`/`SUBP` when the domain is not polled
    pub live_rapl_power: bool,
    /// Upper power threshold armed on instrumented power domains
    pub power_aux_high: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_buckets: DEFAULT_CATALOG_BUCKETS,
            default_tjmax: DEFAULT_TJMAX,
            core_power_unit: DEFAULT_CORE_POWER_UNIT,
            atom_power_unit: DEFAULT_ATOM_POWER_UNIT,
            percent_factor: DEFAULT_PERCENT_FACTOR,
            temp_unit: TempUnit::Celsius,
            live_rapl_power: true,
            power_aux_high: DEFAULT_POWER_AUX_HIGH,
        }
    }
}

impl EngineConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Exchange temperatures with callers in tenths of a Kelvin
    pub fn deci_kelvin() -> Self {
        Self {
            temp_unit: TempUnit::DeciKelvin,
            ..Default::default()
        }
    }

    /// Use `unit` as the semantic temperature unit
    pub fn with_temp_unit(unit: TempUnit) -> Self {
        Self {
            temp_unit: unit,
            ..Default::default()
        }
    }

    /// Never re-read RAPL power from CODE actions; use cached samples only
    pub fn cached_power() -> Self {
        Self {
            live_rapl_power: false,
            ..Default::default()
        }
    }

    /// TjMax to use given a cached value (0 = never read)
    pub fn tjmax_or_default(&self, cached: u32) -> u32 {
        if cached == 0 {
            self.default_tjmax
        } else {
            cached
        }
    }
}
