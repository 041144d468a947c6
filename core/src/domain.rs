//! # Domain Runtime State
//!
//! A domain is one controllable zone of a participant (a CPU package, the
//! graphics engine, a fan). Its runtime state holds the values the engine
//! caches between primitive calls: aux thresholds, read-back caches for
//! thresholds the hardware cannot report, TjMax and RAPL unit exponents.
//!
//! State survives descriptor reloads and is only touched by the engine.

use alloc::string::String;

use bitflags::bitflags;
use spin::Mutex;

/// Temperature value meaning "not set"
pub const TEMP_INVALID: u32 = 0xFFFF_FFFF;

bitflags! {
    /// What a domain can report or control
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DomainCapability: u32 {
        /// Reports temperature
        const TEMP_STATUS = 1 << 0;
        /// Accepts temperature thresholds
        const TEMP_THRESHOLD = 1 << 1;
        /// Reports power
        const POWER_STATUS = 1 << 2;
        /// Accepts power limits
        const POWER_CONTROL = 1 << 3;
        /// Performance states
        const PERF_CONTROL = 1 << 4;
        /// Display brightness
        const DISPLAY_CONTROL = 1 << 5;
        /// RF profile
        const RF_PROFILE = 1 << 6;
        /// Utilization
        const UTILIZATION = 1 << 7;
    }
}

bitflags! {
    /// Quantities the manager should sample periodically for this domain
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PollMask: u32 {
        /// Temperature crossing aux thresholds
        const TEMPERATURE = 1 << 0;
        /// RAPL power crossing power thresholds
        const POWER = 1 << 1;
    }
}

/// Cached per-domain values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainState {
    /// Lower aux temperature threshold
    pub temp_aux0: u32,
    /// Upper aux temperature threshold
    pub temp_aux1: u32,
    /// Last threshold written through aux0, in the caller's unit
    pub temp_cache0: u32,
    /// Last threshold written through aux1, in the caller's unit
    pub temp_cache1: u32,
    /// Threshold hysteresis
    pub temp_hysteresis: u32,
    /// TjMax in Celsius (0 = never read)
    pub temp_tjmax: u32,
    /// Lower power threshold (mW)
    pub power_aux0: u32,
    /// Upper power threshold (mW)
    pub power_aux1: u32,
    /// Last sampled RAPL power (mW)
    pub rapl_power: u32,
    /// RAPL power unit exponent (0 = never read)
    pub rapl_power_unit: u32,
    /// RAPL energy unit exponent
    pub rapl_energy_unit: u32,
    /// RAPL time unit exponent
    pub rapl_time_unit: u32,
    /// Logical processor affinity mask
    pub affinity: u32,
    /// What the manager should poll
    pub poll_mask: PollMask,
}

impl Default for DomainState {
    fn default() -> Self {
        Self {
            temp_aux0: TEMP_INVALID,
            temp_aux1: TEMP_INVALID,
            temp_cache0: 0,
            temp_cache1: 0,
            temp_hysteresis: 0,
            temp_tjmax: 0,
            power_aux0: 0,
            power_aux1: 0,
            rapl_power: 0,
            rapl_power_unit: 0,
            rapl_energy_unit: 0,
            rapl_time_unit: 0,
            affinity: 0,
            poll_mask: PollMask::empty(),
        }
    }
}

impl DomainState {
    /// Derive the poll mask from the armed thresholds
    pub fn recompute_poll_mask(&mut self) -> PollMask {
        let mut mask = PollMask::empty();
        if self.temp_aux0 != TEMP_INVALID || self.temp_aux1 != TEMP_INVALID {
            mask |= PollMask::TEMPERATURE;
        }
        if self.power_aux0 > 0 || self.power_aux1 > 0 {
            mask |= PollMask::POWER;
        }
        self.poll_mask = mask;
        mask
    }

    /// Whether the manager samples RAPL power for this domain
    pub fn is_polling_power(&self) -> bool {
        self.poll_mask.contains(PollMask::POWER)
    }
}

/// One domain of a participant
#[derive(Debug)]
pub struct Domain {
    /// Packed two-character domain code
    pub code: u16,
    /// Display name
    pub name: String,
    /// Capabilities
    pub capabilities: DomainCapability,
    state: Mutex<DomainState>,
}

impl Domain {
    /// Create a domain with default state
    pub fn new(code: u16, name: &str, capabilities: DomainCapability) -> Self {
        Self {
            code,
            name: String::from(name),
            capabilities,
            state: Mutex::new(DomainState::default()),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> DomainState {
        self.state.lock().clone()
    }

    /// Run `f` with exclusive access to the state
    pub fn with_state<R>(&self, f: impl FnOnce(&mut DomainState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Record a RAPL power sample taken by the poller (mW)
    pub fn record_rapl_power(&self, milliwatts: u32) {
        self.state.lock().rapl_power = milliwatts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::DOMAIN_D0;

    #[test]
    fn test_default_state() {
        let state = DomainState::default();
        assert_eq!(state.temp_aux0, TEMP_INVALID);
        assert_eq!(state.poll_mask, PollMask::empty());
    }

    #[test]
    fn test_poll_mask() {
        let domain = Domain::new(DOMAIN_D0, "CPU", DomainCapability::TEMP_STATUS);
        let mask = domain.with_state(|s| {
            s.temp_aux1 = 80;
            s.recompute_poll_mask()
        });
        assert_eq!(mask, PollMask::TEMPERATURE);

        let mask = domain.with_state(|s| {
            s.temp_aux1 = TEMP_INVALID;
            s.power_aux1 = 15_000;
            s.recompute_poll_mask()
        });
        assert_eq!(mask, PollMask::POWER);
        assert!(domain.snapshot().is_polling_power());
    }

    #[test]
    fn test_record_rapl_power() {
        let domain = Domain::new(DOMAIN_D0, "CPU", DomainCapability::POWER_STATUS);
        domain.record_rapl_power(12_500);
        assert_eq!(domain.snapshot().rapl_power, 12_500);
    }
}
