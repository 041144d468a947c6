//! # Unit Transform Layer
//!
//! Converts between the raw encoding an action produces or consumes and the
//! semantic units callers use: temperature in the configured [`TempUnit`],
//! power in milli-Watts, percentages in hundredths of a percent.
//!
//! The transform kind comes from the catalog [`Algorithm`] registered for
//! the action's type. A missing registration is [`EsifError::NeedAlgorithm`].
//!
//! [`Algorithm`]: crate::catalog::Algorithm

pub mod lpat;
pub mod percent;
pub mod power;
pub mod temp;

pub use lpat::{LpatEntry, STATIC_LPAT};
pub use percent::{convert_percent, PercentUnit};
pub use power::{convert_power, PowerContext, PowerUnit};
pub use temp::{convert_temp, TempContext, TempUnit};

use crate::catalog::Catalog;
use crate::error::{EsifError, EsifResult};
use crate::primitive::{ActionType, Opcode};

/// Everything outside the catalog a transform may read
#[derive(Debug, Clone, Copy)]
pub struct XformEnv {
    /// Caller's temperature unit
    pub temp_unit: TempUnit,
    /// TjMax in Celsius
    pub tjmax: u32,
    /// RAPL exponents
    pub power: PowerContext,
}

/// Transform a temperature for an action of type `action_type`
pub fn temperature(
    catalog: &Catalog,
    action_type: ActionType,
    op: Opcode,
    value: u32,
    env: &XformEnv,
) -> EsifResult<u32> {
    let algorithm = catalog.get_algorithm(action_type).ok_or_else(|| {
        log::debug!("Xform: no algorithm for {}", action_type);
        EsifError::NeedAlgorithm
    })?;
    let ctx = TempContext {
        unit: env.temp_unit,
        tjmax: env.tjmax,
        temp_c1: algorithm.temp_c1,
        lpat: catalog.lpat().unwrap_or(&STATIC_LPAT),
    };
    temp::transform(algorithm.temp_xform, op, value, &ctx)
}

/// Transform a power value for an action of type `action_type`
pub fn power(
    catalog: &Catalog,
    action_type: ActionType,
    op: Opcode,
    value: u32,
    env: &XformEnv,
) -> EsifResult<u32> {
    let algorithm = catalog.get_algorithm(action_type).ok_or_else(|| {
        log::debug!("Xform: no algorithm for {}", action_type);
        EsifError::NeedAlgorithm
    })?;
    power::transform(algorithm.power_xform, op, value, &env.power)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Algorithm, DspImage, PowerXform, TempXform};

    fn env() -> XformEnv {
        XformEnv {
            temp_unit: TempUnit::Celsius,
            tjmax: 100,
            power: PowerContext { core_unit: 3, atom_unit: 5 },
        }
    }

    #[test]
    fn test_algorithm_lookup() {
        let image = DspImage::default()
            .algorithm(Algorithm::new(ActionType::Msr, TempXform::TjmaxCore, PowerXform::UnitCore));
        let catalog = Catalog::build(image, 31).unwrap();

        assert_eq!(temperature(&catalog, ActionType::Msr, Opcode::Get, 30, &env()), Ok(70));
        assert_eq!(power(&catalog, ActionType::Msr, Opcode::Get, 8, &env()), Ok(1000));
        assert_eq!(
            temperature(&catalog, ActionType::Acpi, Opcode::Get, 30, &env()),
            Err(EsifError::NeedAlgorithm)
        );
    }

    #[test]
    fn test_programmed_lpat_preferred() {
        let table = alloc::vec![LpatEntry::new(2731, 1000), LpatEntry::new(3731, 0)];
        let image = DspImage::default()
            .algorithm(Algorithm::new(ActionType::AcpiLpat, TempXform::Lpat, PowerXform::None))
            .lpat(table);
        let catalog = Catalog::build(image, 31).unwrap();
        // 500 raw is halfway: 3231 dK = 50 C
        assert_eq!(temperature(&catalog, ActionType::AcpiLpat, Opcode::Get, 500, &env()), Ok(50));
    }
}
