//! # LPAT Calibration Curve
//!
//! A Linear Piecewise Approximation Table maps raw sensor readings to
//! temperature as a list of `(temperature, raw)` breakpoints, temperature in
//! tenths of a Kelvin. Values between breakpoints are linearly interpolated;
//! values beyond either end extrapolate along the outermost segment.
//!
//! Arithmetic is integer only, carried in milli-units and rounded once.

use crate::data::{DataType, VariantWriter, VARIANT_HEADER_LEN};
use crate::error::{EsifError, EsifResult};

/// One breakpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpatEntry {
    /// Temperature in tenths of a Kelvin
    pub temp: u32,
    /// Raw sensor value at that temperature
    pub raw: u32,
}

impl LpatEntry {
    /// Create a breakpoint
    pub const fn new(temp: u32, raw: u32) -> Self {
        Self { temp, raw }
    }
}

/// Table used when the platform programs none
pub const STATIC_LPAT: [LpatEntry; 24] = [
    LpatEntry::new(2531, 976),
    LpatEntry::new(2581, 960),
    LpatEntry::new(2631, 940),
    LpatEntry::new(2681, 916),
    LpatEntry::new(2731, 884),
    LpatEntry::new(2781, 852),
    LpatEntry::new(2831, 812),
    LpatEntry::new(2881, 768),
    LpatEntry::new(2931, 720),
    LpatEntry::new(2981, 668),
    LpatEntry::new(3031, 612),
    LpatEntry::new(3081, 560),
    LpatEntry::new(3131, 508),
    LpatEntry::new(3181, 456),
    LpatEntry::new(3231, 404),
    LpatEntry::new(3281, 356),
    LpatEntry::new(3331, 312),
    LpatEntry::new(3381, 276),
    LpatEntry::new(3431, 240),
    LpatEntry::new(3481, 212),
    LpatEntry::new(3531, 184),
    LpatEntry::new(3581, 160),
    LpatEntry::new(3631, 140),
    LpatEntry::new(3731, 104),
];

/// Encoded size of `table` as a variant array (two integers per entry)
pub const fn encoded_len(table: &[LpatEntry]) -> u32 {
    table.len() as u32 * 2 * VARIANT_HEADER_LEN
}

/// Encode `table` as `{UINT64 temp, UINT64 raw}` variant pairs
pub fn encode(table: &[LpatEntry], dst: &mut [u8]) -> EsifResult<()> {
    let mut writer = VariantWriter::new(dst);
    for entry in table {
        writer.put_integer(DataType::Uint64, entry.temp as u64)?;
        writer.put_integer(DataType::Uint64, entry.raw as u64)?;
    }
    Ok(())
}

fn div_round(n: i64, d: i64) -> i64 {
    if (n >= 0) == (d >= 0) {
        (n + d / 2) / d
    } else {
        (n - d / 2) / d
    }
}

/// Interpolate `x` on the segment `(x0, y0)..(x1, y1)`
fn interpolate(x: i64, x0: i64, y0: i64, x1: i64, y1: i64) -> i64 {
    if x1 == x0 {
        return y0;
    }
    let milli = y0 * 1000 + div_round((x - x0) * (y1 - y0) * 1000, x1 - x0);
    div_round(milli, 1000)
}

fn lookup(
    table: &[LpatEntry],
    value: u32,
    key: fn(&LpatEntry) -> u32,
    out: fn(&LpatEntry) -> u32,
) -> EsifResult<u32> {
    if table.len() < 2 {
        return Err(EsifError::UnsupportedAlgorithm);
    }
    let x = value as i64;
    let segment = table
        .windows(2)
        .find(|pair| {
            let (a, b) = (key(&pair[0]) as i64, key(&pair[1]) as i64);
            (a.min(b)..=a.max(b)).contains(&x)
        })
        .or_else(|| {
            // extrapolate along the outer segment nearest to x
            let first = &table[..2];
            let last = &table[table.len() - 2..];
            let dist = |e: &LpatEntry| (key(e) as i64 - x).abs();
            if dist(&table[0]) <= dist(&table[table.len() - 1]) {
                Some(first)
            } else {
                Some(last)
            }
        })
        .ok_or(EsifError::UnsupportedAlgorithm)?;

    let (p, q) = (&segment[0], &segment[1]);
    let y = interpolate(x, key(p) as i64, out(p) as i64, key(q) as i64, out(q) as i64);
    Ok(y.max(0) as u32)
}

/// Temperature (deci-Kelvin) of raw reading `raw`
pub fn raw_to_temp(table: &[LpatEntry], raw: u32) -> EsifResult<u32> {
    lookup(table, raw, |e| e.raw, |e| e.temp)
}

/// Raw reading expected at temperature `temp` (deci-Kelvin)
pub fn temp_to_raw(table: &[LpatEntry], temp: u32) -> EsifResult<u32> {
    lookup(table, temp, |e| e.temp, |e| e.raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::VariantIter;
    use alloc::vec;

    #[test]
    fn test_breakpoints_exact() {
        for entry in STATIC_LPAT.iter() {
            assert_eq!(raw_to_temp(&STATIC_LPAT, entry.raw), Ok(entry.temp));
            assert_eq!(temp_to_raw(&STATIC_LPAT, entry.temp), Ok(entry.raw));
        }
    }

    #[test]
    fn test_interpolation_midpoint() {
        // halfway between (2731, 884) and (2781, 852)
        assert_eq!(raw_to_temp(&STATIC_LPAT, 868), Ok(2756));
        assert_eq!(temp_to_raw(&STATIC_LPAT, 2756), Ok(868));
    }

    #[test]
    fn test_round_trip_within_one_count() {
        for raw in 104..=976 {
            let temp = raw_to_temp(&STATIC_LPAT, raw).unwrap();
            let back = temp_to_raw(&STATIC_LPAT, temp).unwrap();
            assert!(back.abs_diff(raw) <= 2, "{} -> {} -> {}", raw, temp, back);
        }
    }

    #[test]
    fn test_extrapolation() {
        // beyond the coldest point, continue the first segment
        assert_eq!(raw_to_temp(&STATIC_LPAT, 992), Ok(2481));
        assert!(raw_to_temp(&[LpatEntry::new(2731, 100)], 100).is_err());
    }

    #[test]
    fn test_encode_pairs() {
        let mut buf = vec![0u8; encoded_len(&STATIC_LPAT) as usize];
        assert_eq!(buf.len(), 24 * 24);
        encode(&STATIC_LPAT, &mut buf).unwrap();
        let values: alloc::vec::Vec<u64> = VariantIter::new(&buf).filter_map(|v| v.as_integer()).collect();
        assert_eq!(&values[..4], &[2531, 976, 2581, 960]);
        assert!(encode(&STATIC_LPAT, &mut buf[..100]).is_err());
    }
}
