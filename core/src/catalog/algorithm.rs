//! Per action-type unit transform policy.

use crate::primitive::ActionType;

/// Temperature transform kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempXform {
    /// Value already in Celsius
    None,
    /// Tenths of a Kelvin
    DeciK,
    /// Degrees below TjMax (core DTS)
    TjmaxCore,
    /// PCH thermal sensor (`raw / 2 - 50`)
    PchCore,
    /// Atom DTS with sign bit
    TjmaxAtom,
    /// Atom DTS through the DTS-to-Celsius offset
    DtsAtom,
    /// LPAT calibration curve
    Lpat,
    /// Kind not known to this engine
    Unknown(u32),
}

impl TempXform {
    /// Decode a wire code
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::DeciK,
            2 => Self::TjmaxCore,
            3 => Self::PchCore,
            4 => Self::TjmaxAtom,
            5 => Self::DtsAtom,
            6 => Self::Lpat,
            other => Self::Unknown(other),
        }
    }
}

/// Power transform kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerXform {
    /// No conversion
    None,
    /// Tenths of a Watt
    DeciW,
    /// Milli-Watts
    MilliW,
    /// RAPL units on core parts
    UnitCore,
    /// RAPL units on Atom parts
    UnitAtom,
    /// Kind not known to this engine
    Unknown(u32),
}

impl PowerXform {
    /// Decode a wire code
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::DeciW,
            2 => Self::MilliW,
            3 => Self::UnitCore,
            4 => Self::UnitAtom,
            other => Self::Unknown(other),
        }
    }
}

/// Unit policy for every action of one type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Algorithm {
    /// Action type this policy applies to
    pub action_type: ActionType,
    /// Temperature conversion
    pub temp_xform: TempXform,
    /// Power conversion
    pub power_xform: PowerXform,
    /// First temperature constant (TjMax for `DtsAtom`)
    pub temp_c1: u32,
    /// Second temperature constant
    pub temp_c2: u32,
}

impl Algorithm {
    /// Policy with both constants zero
    pub const fn new(action_type: ActionType, temp_xform: TempXform, power_xform: PowerXform) -> Self {
        Self {
            action_type,
            temp_xform,
            power_xform,
            temp_c1: 0,
            temp_c2: 0,
        }
    }

    /// Set the temperature constants
    pub const fn with_constants(mut self, temp_c1: u32, temp_c2: u32) -> Self {
        self.temp_c1 = temp_c1;
        self.temp_c2 = temp_c2;
        self
    }
}

/// Maps an ACPI notify code to an engine event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// ACPI notify code
    pub notify_id: u32,
    /// Engine event id
    pub event_id: u32,
}
