//! # Power Transforms
//!
//! Callers exchange power in milli-Watts. Hardware reports Watts scaled by a
//! decimal factor or in RAPL units of `1 / 2^exp` Watt.

use crate::catalog::PowerXform;
use crate::error::{EsifError, EsifResult};
use crate::primitive::Opcode;

/// Power unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerUnit {
    /// Watts
    Watt,
    /// Tenths of a Watt
    DeciWatt,
    /// Hundredths of a Watt
    CentiWatt,
    /// Thousandths of a Watt
    MilliWatt,
    /// RAPL unit of `1 / 2^exp` Watt
    Rapl(u32),
}

impl PowerUnit {
    /// Units per Watt
    const fn per_watt(self) -> u64 {
        match self {
            Self::Watt => 1,
            Self::DeciWatt => 10,
            Self::CentiWatt => 100,
            Self::MilliWatt => 1000,
            Self::Rapl(exp) => 1u64 << (exp & 0x1F),
        }
    }
}

/// Convert `value` between power units, truncating
///
/// Zero and same-unit conversions pass through untouched.
pub fn convert_power(from: PowerUnit, to: PowerUnit, value: u32) -> EsifResult<u32> {
    if value == 0 || from == to {
        return Ok(value);
    }
    let out = value as u64 * to.per_watt() / from.per_watt();
    u32::try_from(out).map_err(|_| EsifError::OverflowedResultType)
}

/// RAPL exponents a power transform may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerContext {
    /// Power unit exponent on core parts
    pub core_unit: u32,
    /// Power unit exponent on Atom parts
    pub atom_unit: u32,
}

/// Apply the transform `kind` in direction `op`
pub fn transform(kind: PowerXform, op: Opcode, value: u32, ctx: &PowerContext) -> EsifResult<u32> {
    let native = match kind {
        PowerXform::None => return Ok(value),
        PowerXform::DeciW => PowerUnit::DeciWatt,
        PowerXform::MilliW => PowerUnit::MilliWatt,
        PowerXform::UnitCore => PowerUnit::Rapl(ctx.core_unit),
        PowerXform::UnitAtom => PowerUnit::Rapl(ctx.atom_unit),
        PowerXform::Unknown(code) => {
            log::warn!("Xform: unknown power algorithm {}", code);
            return Err(EsifError::UnsupportedAlgorithm);
        },
    };
    let out = match op {
        Opcode::Get => convert_power(native, PowerUnit::MilliWatt, value),
        Opcode::Set => convert_power(PowerUnit::MilliWatt, native, value),
    }?;
    log::trace!("Xform: power {:?} {:?} {} -> {}", kind, op, value, out);
    Ok(out)
}
