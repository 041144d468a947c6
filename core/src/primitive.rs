//! # Primitive Definitions
//!
//! A primitive is addressed by a [`Tuple`] and carries an ordered list of
//! [`Action`]s. The order is the fallback priority used by the executor.

use alloc::vec::Vec;
use core::fmt;

use crate::error::{EsifError, EsifResult};

// =============================================================================
// TUPLE
// =============================================================================

/// Instance value callers use for "any instance"
pub const INSTANCE_ANY: u8 = 255;

/// Pack a two-character domain code (`"D0"`) into its u16 form
///
/// The first character lands in the low byte.
pub const fn domain_code(code: &str) -> u16 {
    let bytes = code.as_bytes();
    let lo = if bytes.len() > 0 { bytes[0] } else { 0 };
    let hi = if bytes.len() > 1 { bytes[1] } else { 0 };
    u16::from_le_bytes([lo, hi])
}

/// Domain `D0`
pub const DOMAIN_D0: u16 = domain_code("D0");
/// Domain `D1`
pub const DOMAIN_D1: u16 = domain_code("D1");
/// Domain `D2`
pub const DOMAIN_D2: u16 = domain_code("D2");

/// Primitive identity
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tuple {
    /// Primitive id
    pub id: u16,
    /// Packed two-character domain code
    pub domain: u16,
    /// Instance
    pub instance: u8,
}

impl Tuple {
    /// Create a tuple
    pub const fn new(id: u16, domain: u16, instance: u8) -> Self {
        Self { id, domain, instance }
    }

    /// Wire bytes: id (LE), domain (LE), instance
    pub fn to_bytes(&self) -> [u8; 5] {
        let id = self.id.to_le_bytes();
        let domain = self.domain.to_le_bytes();
        [id[0], id[1], domain[0], domain[1], self.instance]
    }

    /// Domain index derived from the domain code's second character
    pub fn domain_index(&self) -> EsifResult<u8> {
        domain_index(self.domain)
    }
}

/// Domain index of a packed domain code (`'D','3'` gives 3)
pub fn domain_index(domain: u16) -> EsifResult<u8> {
    let digit = domain.to_le_bytes()[1];
    digit.checked_sub(b'0').ok_or(EsifError::OutOfBounds)
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tuple({}.{}.{})", self.id, DomainCode(self.domain), self.instance)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.id, DomainCode(self.domain), self.instance)
    }
}

struct DomainCode(u16);

impl fmt::Display for DomainCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.to_le_bytes() {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "?")?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// PRIMITIVE IDS
// =============================================================================

/// Primitive ids the engine itself issues or special-cases
pub mod id {
    /// Current temperature
    pub const GET_TEMPERATURE: u16 = 14;
    /// Temperature threshold hysteresis
    pub const GET_TEMPERATURE_THRESHOLD_HYSTERESIS: u16 = 15;
    /// Aux temperature thresholds (instance 0 = aux0, 1 = aux1)
    pub const SET_TEMPERATURE_THRESHOLDS: u16 = 47;
    /// Aux temperature thresholds read back
    pub const GET_TEMPERATURE_THRESHOLDS: u16 = 143;
    /// Processor TjMax
    pub const GET_PROC_TJMAX: u16 = 72;
    /// RAPL power
    pub const GET_RAPL_POWER: u16 = 80;
    /// RAPL power unit exponent
    pub const GET_RAPL_POWER_UNIT: u16 = 83;
    /// RAPL energy unit exponent
    pub const GET_RAPL_ENERGY_UNIT: u16 = 84;
    /// RAPL time unit exponent
    pub const GET_RAPL_TIME_UNIT: u16 = 85;
    /// Performance states table
    pub const GET_PERF_SUPPORT_STATES: u16 = 116;
    /// Graphics RP state capability (instance 0 = RP0, 1 = RP1, 2 = RPn)
    pub const GET_PROC_RP_STATE_CAPABILITY: u16 = 162;
    /// Graphics current P-state request
    pub const SET_GFX_RPCP: u16 = 163;
    /// Whether RF tuning is available
    pub const GET_PROC_RF_TUNING_AVAILABLE: u16 = 188;
    /// RF profile center frequency
    pub const GET_RFPROFILE_DEFAULT_CENTER_FREQUENCY: u16 = 189;
    /// RF profile right clip percent
    pub const GET_RFPROFILE_CLIP_PERCENT_RIGHT: u16 = 190;
    /// RF profile left clip percent
    pub const GET_RFPROFILE_CLIP_PERCENT_LEFT: u16 = 191;
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Primitive direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Read
    Get,
    /// Write
    Set,
}

/// Hardware access strategy of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// ACPI control method
    Acpi,
    /// ACPI `LPAT` table
    AcpiLpat,
    /// Constant
    Konst,
    /// Hand-coded method
    Kode,
    /// System I/O port
    SystemIo,
    /// Software variable
    Var,
    /// IOSF sideband
    Iosf,
    /// MMIO register
    Mmio,
    /// Model-specific register
    Msr,
    /// Graphics driver performance control
    DdiGfxPerf,
    /// Graphics driver display control
    DdiGfxDisp,
    /// MMIO register holding TjMax
    MmioTjmax,
    /// Code not known to this engine
    Unknown(u32),
}

impl ActionType {
    /// Wire code
    pub const fn code(self) -> u32 {
        match self {
            Self::Acpi => 1,
            Self::AcpiLpat => 2,
            Self::Konst => 3,
            Self::Kode => 4,
            Self::SystemIo => 5,
            Self::Var => 6,
            Self::Iosf => 7,
            Self::Mmio => 8,
            Self::Msr => 9,
            Self::DdiGfxPerf => 10,
            Self::DdiGfxDisp => 11,
            Self::MmioTjmax => 12,
            Self::Unknown(code) => code,
        }
    }

    /// Decode a wire code
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Acpi,
            2 => Self::AcpiLpat,
            3 => Self::Konst,
            4 => Self::Kode,
            5 => Self::SystemIo,
            6 => Self::Var,
            7 => Self::Iosf,
            8 => Self::Mmio,
            9 => Self::Msr,
            10 => Self::DdiGfxPerf,
            11 => Self::DdiGfxDisp,
            12 => Self::MmioTjmax,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acpi => write!(f, "ACPI"),
            Self::AcpiLpat => write!(f, "ACPILPAT"),
            Self::Konst => write!(f, "KONST"),
            Self::Kode => write!(f, "KODE"),
            Self::SystemIo => write!(f, "SYSTEMIO"),
            Self::Var => write!(f, "VAR"),
            Self::Iosf => write!(f, "IOSF"),
            Self::Mmio => write!(f, "MMIO"),
            Self::Msr => write!(f, "MSR"),
            Self::DdiGfxPerf => write!(f, "DDIGFXPERF"),
            Self::DdiGfxDisp => write!(f, "DDIGFXDISP"),
            Self::MmioTjmax => write!(f, "MMIOTJMAX"),
            Self::Unknown(code) => write!(f, "ACTION_{}", code),
        }
    }
}

/// Number of parameters carried by an action
pub const ACTION_PARAMS: usize = 5;

/// One hardware access strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    /// Backend
    pub ty: ActionType,
    /// Backend-specific parameters p1..p5
    pub params: [u32; ACTION_PARAMS],
}

impl Action {
    /// Action with all five parameters
    pub const fn new(ty: ActionType, params: [u32; ACTION_PARAMS]) -> Self {
        Self { ty, params }
    }

    /// Action whose parameters are all zero except `p1`
    pub const fn with_p1(ty: ActionType, p1: u32) -> Self {
        Self { ty, params: [p1, 0, 0, 0, 0] }
    }

    /// Parameter 1
    #[inline]
    pub const fn p1(&self) -> u32 {
        self.params[0]
    }

    /// Parameter 2
    #[inline]
    pub const fn p2(&self) -> u32 {
        self.params[1]
    }

    /// Parameter 3
    #[inline]
    pub const fn p3(&self) -> u32 {
        self.params[2]
    }

    /// Parameter 4
    #[inline]
    pub const fn p4(&self) -> u32 {
        self.params[3]
    }

    /// Parameter 5
    #[inline]
    pub const fn p5(&self) -> u32 {
        self.params[4]
    }
}

/// Pack a four-character method code into a parameter (first char low)
pub const fn method_code(code: &str) -> u32 {
    let bytes = code.as_bytes();
    let mut raw = [0u8; 4];
    let mut i = 0;
    while i < 4 && i < bytes.len() {
        raw[i] = bytes[i];
        i += 1;
    }
    u32::from_le_bytes(raw)
}

// =============================================================================
// PRIMITIVE
// =============================================================================

/// One controllable or readable quantity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Primitive {
    /// Identity
    pub tuple: Tuple,
    /// Direction
    pub opcode: Opcode,
    /// Actions in fallback order
    pub actions: Vec<Action>,
}

impl Primitive {
    /// Create a primitive
    pub fn new(tuple: Tuple, opcode: Opcode, actions: Vec<Action>) -> Self {
        Self { tuple, opcode, actions }
    }

    /// Action at `index`
    pub fn action(&self, index: usize) -> Option<&Action> {
        self.actions.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_code() {
        assert_eq!(DOMAIN_D0, u16::from_le_bytes([b'D', b'0']));
        assert_eq!(domain_index(DOMAIN_D2), Ok(2));
        assert_eq!(domain_index(0x0044), Err(EsifError::OutOfBounds));
    }

    #[test]
    fn test_tuple_bytes() {
        let tuple = Tuple::new(0x0102, DOMAIN_D1, 7);
        assert_eq!(tuple.to_bytes(), [0x02, 0x01, b'D', b'1', 7]);
        assert_eq!(alloc::format!("{}", tuple), "258.D1.7");
    }

    #[test]
    fn test_action_type_codes() {
        for code in 0..16 {
            assert_eq!(ActionType::from_code(code).code(), code);
        }
        assert_eq!(ActionType::from_code(9), ActionType::Msr);
    }

    #[test]
    fn test_method_code() {
        assert_eq!(method_code("ADDP").to_le_bytes(), *b"ADDP");
        let action = Action::with_p1(ActionType::Kode, method_code("GTT0"));
        assert_eq!(action.p1().to_le_bytes(), *b"GTT0");
        assert_eq!(action.p2(), 0);
    }
}
