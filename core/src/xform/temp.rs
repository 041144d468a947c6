//! # Temperature Transforms
//!
//! Hardware sensors report temperature in many encodings. Every encoding is
//! first brought to degrees Celsius (or deci-Kelvin for the kinds that
//! natively speak it) and then to the caller's semantic [`TempUnit`].
//!
//! Values are carried as `u32` but interpreted as signed so sub-zero
//! Celsius readings survive the trip.

use crate::catalog::TempXform;
use crate::error::{EsifError, EsifResult};
use crate::primitive::Opcode;
use crate::xform::lpat::{self, LpatEntry};

/// Zero Celsius in milli-Kelvin
const ZERO_C_MILLI_K: i64 = 273_200;

/// Temperature unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempUnit {
    /// Kelvin
    Kelvin,
    /// Tenths of a Kelvin
    DeciKelvin,
    /// Hundredths of a Kelvin
    CentiKelvin,
    /// Thousandths of a Kelvin
    MilliKelvin,
    /// Celsius
    Celsius,
    /// Tenths of a degree Celsius
    DeciCelsius,
    /// Hundredths of a degree Celsius
    CentiCelsius,
    /// Thousandths of a degree Celsius
    MilliCelsius,
}

impl TempUnit {
    const fn per_milli(self) -> i64 {
        match self {
            Self::Kelvin | Self::Celsius => 1000,
            Self::DeciKelvin | Self::DeciCelsius => 100,
            Self::CentiKelvin | Self::CentiCelsius => 10,
            Self::MilliKelvin | Self::MilliCelsius => 1,
        }
    }

    const fn is_kelvin(self) -> bool {
        matches!(
            self,
            Self::Kelvin | Self::DeciKelvin | Self::CentiKelvin | Self::MilliKelvin
        )
    }
}

fn div_round(n: i64, d: i64) -> i64 {
    if n >= 0 {
        (n + d / 2) / d
    } else {
        (n - d / 2) / d
    }
}

/// Convert `value` between temperature units
///
/// Rounds half away from zero.
pub fn convert_temp(from: TempUnit, to: TempUnit, value: u32) -> u32 {
    if from == to {
        return value;
    }
    let mut milli = value as i32 as i64 * from.per_milli();
    match (from.is_kelvin(), to.is_kelvin()) {
        (true, false) => milli -= ZERO_C_MILLI_K,
        (false, true) => milli += ZERO_C_MILLI_K,
        _ => {},
    }
    div_round(milli, to.per_milli()) as i32 as u32
}

/// Inputs a temperature transform may depend on
#[derive(Debug, Clone, Copy)]
pub struct TempContext<'a> {
    /// Caller's semantic unit
    pub unit: TempUnit,
    /// TjMax of the package in Celsius
    pub tjmax: u32,
    /// First algorithm constant (Atom DTS TjMax)
    pub temp_c1: u32,
    /// LPAT calibration curve
    pub lpat: &'a [LpatEntry],
}

const fn signed(value: u32) -> i64 {
    value as i32 as i64
}

const fn unsigned(value: i64) -> u32 {
    value as i32 as u32
}

/// Apply the transform `kind` in direction `op`
///
/// `Get` turns a raw hardware value into the semantic unit, `Set` turns a
/// semantic value into the raw encoding.
pub fn transform(kind: TempXform, op: Opcode, value: u32, ctx: &TempContext<'_>) -> EsifResult<u32> {
    use TempUnit::{Celsius, DeciKelvin};

    let tjmax = signed(ctx.tjmax);
    let out = match (kind, op) {
        (TempXform::None, Opcode::Get) => convert_temp(Celsius, ctx.unit, value),
        (TempXform::None, Opcode::Set) => convert_temp(ctx.unit, Celsius, value),

        (TempXform::DeciK, Opcode::Get) => convert_temp(DeciKelvin, ctx.unit, value),
        (TempXform::DeciK, Opcode::Set) => convert_temp(ctx.unit, DeciKelvin, value),

        (TempXform::TjmaxCore, Opcode::Get) => {
            convert_temp(Celsius, ctx.unit, unsigned(tjmax - signed(value)))
        },
        (TempXform::TjmaxCore, Opcode::Set) => {
            let c = signed(convert_temp(ctx.unit, Celsius, value));
            unsigned(tjmax - c)
        },

        (TempXform::PchCore, Opcode::Get) => {
            convert_temp(Celsius, ctx.unit, unsigned(signed(value) / 2 - 50))
        },
        (TempXform::PchCore, Opcode::Set) => {
            let c = signed(convert_temp(ctx.unit, Celsius, value));
            unsigned((c + 50) * 2)
        },

        (TempXform::TjmaxAtom, Opcode::Get) => {
            let offset = ((value >> 16) & 0x7F) as i64;
            let above = value & 0x10 != 0 || value & 0x8000_0000 == 0;
            let c = if above { tjmax + offset } else { tjmax - offset };
            convert_temp(Celsius, ctx.unit, unsigned(c))
        },
        (TempXform::TjmaxAtom, Opcode::Set) => {
            let delta = signed(convert_temp(ctx.unit, Celsius, value)) - tjmax;
            if delta >= 0 {
                ((delta as u32) & 0x7F) << 16
            } else {
                ((((-delta) as u32) & 0x7F) << 16) | 0x8000_0000
            }
        },

        (TempXform::DtsAtom, Opcode::Get) => {
            let c = 10 + (207 - signed(value)) + signed(ctx.temp_c1) - 90;
            convert_temp(Celsius, ctx.unit, unsigned(c))
        },
        (TempXform::DtsAtom, Opcode::Set) => {
            let c = signed(convert_temp(ctx.unit, Celsius, value));
            unsigned(127 + signed(ctx.temp_c1) - c)
        },

        (TempXform::Lpat, Opcode::Get) => {
            let dk = lpat::raw_to_temp(ctx.lpat, value)?;
            convert_temp(DeciKelvin, ctx.unit, dk)
        },
        (TempXform::Lpat, Opcode::Set) => {
            let dk = convert_temp(ctx.unit, DeciKelvin, value);
            lpat::temp_to_raw(ctx.lpat, dk)?
        },

        (TempXform::Unknown(code), _) => {
            log::warn!("Xform: unknown temperature algorithm {}", code);
            return Err(EsifError::UnsupportedAlgorithm);
        },
    };
    log::trace!("Xform: temp {:?} {:?} {} -> {}", kind, op, value, out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(unit: TempUnit) -> TempContext<'static> {
        TempContext {
            unit,
            tjmax: 100,
            temp_c1: 90,
            lpat: &lpat::STATIC_LPAT,
        }
    }

    #[test]
    fn test_convert_units() {
        assert_eq!(convert_temp(TempUnit::DeciKelvin, TempUnit::Celsius, 3032), 30);
        assert_eq!(convert_temp(TempUnit::Celsius, TempUnit::DeciKelvin, 30), 3032);
        assert_eq!(convert_temp(TempUnit::Celsius, TempUnit::MilliCelsius, 45), 45_000);
        assert_eq!(convert_temp(TempUnit::MilliKelvin, TempUnit::Kelvin, 300_499), 300);
        assert_eq!(convert_temp(TempUnit::DeciKelvin, TempUnit::Celsius, 2632), (-10i32) as u32);
        assert_eq!(convert_temp(TempUnit::Kelvin, TempUnit::Kelvin, 7), 7);
    }

    #[test]
    fn test_tjmax_relative() {
        let ctx = ctx(TempUnit::Celsius);
        assert_eq!(transform(TempXform::TjmaxCore, Opcode::Get, 30, &ctx), Ok(70));
        assert_eq!(transform(TempXform::TjmaxCore, Opcode::Set, 70, &ctx), Ok(30));
    }

    #[test]
    fn test_tjmax_relative_deci_kelvin() {
        let ctx = ctx(TempUnit::DeciKelvin);
        assert_eq!(transform(TempXform::TjmaxCore, Opcode::Get, 30, &ctx), Ok(3432));
        assert_eq!(transform(TempXform::TjmaxCore, Opcode::Set, 3432, &ctx), Ok(30));
    }

    #[test]
    fn test_round_trip_every_kind() {
        for unit in [TempUnit::Celsius, TempUnit::DeciKelvin, TempUnit::MilliCelsius] {
            for tjmax in (60..=110).step_by(5) {
                let ctx = TempContext { tjmax, ..ctx(unit) };
                for raw in [0u32, 10, 25, 40, 60] {
                    for kind in [TempXform::None, TempXform::TjmaxCore, TempXform::DtsAtom] {
                        let semantic = transform(kind, Opcode::Get, raw, &ctx).unwrap();
                        assert_eq!(transform(kind, Opcode::Set, semantic, &ctx), Ok(raw), "{:?}", kind);
                    }
                }
                for raw in [100u32, 160, 230] {
                    let semantic = transform(TempXform::PchCore, Opcode::Get, raw, &ctx).unwrap();
                    assert_eq!(transform(TempXform::PchCore, Opcode::Set, semantic, &ctx), Ok(raw));
                }
            }
        }
    }

    #[test]
    fn test_deci_kelvin_round_trip_within_rounding() {
        let ctx = ctx(TempUnit::Celsius);
        for raw in (2732u32..3732).step_by(37) {
            let c = transform(TempXform::DeciK, Opcode::Get, raw, &ctx).unwrap();
            let back = transform(TempXform::DeciK, Opcode::Set, c, &ctx).unwrap();
            assert!(back.abs_diff(raw) <= 5, "{} -> {} -> {}", raw, c, back);
        }
    }

    #[test]
    fn test_atom_sign_encoding() {
        let ctx = ctx(TempUnit::Celsius);
        // bit 31 clear: above TjMax
        assert_eq!(transform(TempXform::TjmaxAtom, Opcode::Get, 5 << 16, &ctx), Ok(105));
        // bit 31 set, bit 4 clear: below TjMax
        assert_eq!(transform(TempXform::TjmaxAtom, Opcode::Get, (20 << 16) | 0x8000_0000, &ctx), Ok(80));
        // bit 4 forces above
        assert_eq!(transform(TempXform::TjmaxAtom, Opcode::Get, (20 << 16) | 0x8000_0010, &ctx), Ok(120));

        for c in [60u32, 80, 100, 110] {
            let raw = transform(TempXform::TjmaxAtom, Opcode::Set, c, &ctx).unwrap();
            assert_eq!(transform(TempXform::TjmaxAtom, Opcode::Get, raw, &ctx), Ok(c));
        }
    }

    #[test]
    fn test_dts_atom() {
        let ctx = ctx(TempUnit::Celsius);
        // 10 + (207 - 150) + 90 - 90
        assert_eq!(transform(TempXform::DtsAtom, Opcode::Get, 150, &ctx), Ok(67));
    }

    #[test]
    fn test_lpat_breakpoints() {
        let ctx = ctx(TempUnit::DeciKelvin);
        for entry in lpat::STATIC_LPAT.iter() {
            assert_eq!(transform(TempXform::Lpat, Opcode::Get, entry.raw, &ctx), Ok(entry.temp));
            assert_eq!(transform(TempXform::Lpat, Opcode::Set, entry.temp, &ctx), Ok(entry.raw));
        }
    }

    #[test]
    fn test_unknown_kind() {
        let ctx = ctx(TempUnit::Celsius);
        assert_eq!(
            transform(TempXform::Unknown(42), Opcode::Get, 1, &ctx),
            Err(EsifError::UnsupportedAlgorithm)
        );
    }
}
