//! Percentage scaling between callers and hardware.

use crate::error::{EsifError, EsifResult};

/// Percentage representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentUnit {
    /// Whole percent, 100 = full scale
    Percent,
    /// Tenths of a percent
    Deci,
    /// Hundredths of a percent
    Centi,
    /// Thousandths of a percent
    Milli,
    /// Byte scale, 255 = full scale
    Byte,
}

impl PercentUnit {
    /// Value representing 100 %
    pub const fn full_scale(self) -> u64 {
        match self {
            Self::Percent => 100,
            Self::Deci => 1_000,
            Self::Centi => 10_000,
            Self::Milli => 100_000,
            Self::Byte => 255,
        }
    }

    /// Unit whose value is `factor` times a whole percent
    pub fn from_factor(factor: u32) -> EsifResult<Self> {
        match factor {
            1 => Ok(Self::Percent),
            10 => Ok(Self::Deci),
            100 => Ok(Self::Centi),
            1000 => Ok(Self::Milli),
            _ => Err(EsifError::UnsupportedRequestPercentType),
        }
    }
}

/// Rescale `value` from one percentage unit to another, truncating
pub fn convert_percent(from: PercentUnit, to: PercentUnit, value: u32) -> EsifResult<u32> {
    if from == to {
        return Ok(value);
    }
    let out = value as u64 * to.full_scale() / from.full_scale();
    u32::try_from(out).map_err(|_| EsifError::OverflowedResultType)
}
