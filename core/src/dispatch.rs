//! # Action Dispatcher
//!
//! Runs one action of a primitive, wrapping the backend call in unit
//! normalization:
//!
//! 1. SET of a `TEMPERATURE` or `POWER` request: convert the caller's value
//!    to the action's native unit.
//! 2. Re-tag semantic types (`TEMPERATURE`, `POWER`, `PERCENT`) to `UINT32`;
//!    a `PERCENT` request is divided by the percent factor.
//! 3. Call the backend's GET or SET entry point.
//! 4. Restore the tags; a `PERCENT` response is multiplied back on success.
//! 5. GET of a `TEMPERATURE` or `POWER` response: convert native to
//!    semantic.
//! 6. SET of threshold temperatures through a non-CODE action: remember
//!    the caller's value in the domain's read-back cache.
//!
//! Conversions on SET work on a copy of the request, so the caller's buffer
//! keeps the semantic value whatever the outcome.

use crate::backend::{ActionContext, Backend};
use crate::catalog::Catalog;
use crate::data::{DataType, EsifData};
use crate::error::{EsifError, EsifResult};
use crate::participant::Participant;
use crate::primitive::{id, ActionType, Opcode, Primitive};
use crate::xform;

/// Tag a semantic type travels under while a backend sees it
const PLAIN: DataType = DataType::Uint32;

/// Scalar `u32` payload of a semantic buffer
fn semantic_value(data: &EsifData) -> EsifResult<u32> {
    data.read_u32().ok_or(EsifError::OverflowedResultType)
}

/// Run action `index` of `primitive` against `req` and `rsp`
pub fn execute_action(
    participant: &Participant,
    catalog: &Catalog,
    primitive: &Primitive,
    index: usize,
    req: &mut EsifData,
    rsp: &mut EsifData,
) -> EsifResult<()> {
    let action = catalog.get_action(primitive, index)?;
    let backend = Backend::for_action(action.ty)?;
    let tuple = primitive.tuple;
    let opcode = primitive.opcode;
    let env = participant.xform_env(tuple.domain);

    log::trace!(
        "Action: {} {:?} tuple {}.{:04x}.{} req {} rsp {}",
        action.ty,
        opcode,
        tuple.id,
        tuple.domain,
        tuple.instance,
        req.ty,
        rsp.ty
    );

    let semantic_rsp = rsp.ty;
    let ctx = ActionContext {
        participant,
        catalog,
        primitive,
        action,
        semantic_rsp,
    };

    match opcode {
        Opcode::Get => {
            let retagged = semantic_rsp.is_semantic();
            if retagged {
                rsp.ty = PLAIN;
            }
            let result = backend.get(&ctx, req, rsp);
            if retagged {
                rsp.ty = semantic_rsp;
            }
            result?;

            match semantic_rsp {
                DataType::Percent => {
                    let value = semantic_value(rsp)?;
                    let scaled = value.saturating_mul(participant.config().percent_factor);
                    rsp.patch_scalar(4, scaled as u64)?;
                },
                DataType::Temperature => {
                    let native = semantic_value(rsp)?;
                    let value = xform::temperature(catalog, action.ty, Opcode::Get, native, &env)?;
                    log::trace!("Xform: temperature {} -> {}", native, value);
                    rsp.patch_scalar(4, value as u64)?;
                },
                DataType::Power => {
                    let native = semantic_value(rsp)?;
                    let value = xform::power(catalog, action.ty, Opcode::Get, native, &env)?;
                    log::trace!("Xform: power {} -> {}", native, value);
                    rsp.patch_scalar(4, value as u64)?;
                },
                _ => {},
            }

            // firmware reports this one in tenths of a degree
            if action.ty == ActionType::Acpi && tuple.id == id::GET_TEMPERATURE_THRESHOLD_HYSTERESIS {
                if let Some(width) = rsp.ty.scalar_width() {
                    let value = rsp.scalar_with_width(width)?;
                    rsp.patch_scalar(width, value / 10)?;
                }
            }
            Ok(())
        },
        Opcode::Set => {
            if !req.ty.is_semantic() {
                return backend.set(&ctx, req);
            }

            let original = semantic_value(req)?;
            let native = match req.ty {
                DataType::Temperature => xform::temperature(catalog, action.ty, Opcode::Set, original, &env)?,
                DataType::Power => xform::power(catalog, action.ty, Opcode::Set, original, &env)?,
                _ => original / participant.config().percent_factor.max(1),
            };
            log::trace!("Xform: {} {} -> native {}", req.ty, original, native);

            let mut plain = req.clone();
            plain.ty = PLAIN;
            plain.patch_scalar(4, native as u64)?;
            backend.set(&ctx, &mut plain)?;

            if req.ty == DataType::Temperature
                && tuple.id == id::SET_TEMPERATURE_THRESHOLDS
                && action.ty != ActionType::Kode
            {
                let domain = participant.domain_by_code(tuple.domain)?;
                domain.with_state(|state| match tuple.instance {
                    0 => state.temp_cache0 = original,
                    1 => state.temp_cache1 = original,
                    _ => {},
                });
            }
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Algorithm, DspImage, DspMetadata, PowerXform, TempXform};
    use crate::config::EngineConfig;
    use crate::domain::{Domain, DomainCapability};
    use crate::participant::Platform;
    use crate::primitive::{method_code, Action, Tuple, DOMAIN_D0, INSTANCE_ANY};
    use alloc::sync::Arc;
    use alloc::vec;
    use esif_hal::sim::{SimAcpi, SimMmio};
    use esif_hal::AcpiObject;

    fn participant(platform: Platform) -> Participant {
        let domains = vec![Domain::new(
            DOMAIN_D0,
            "CPU",
            DomainCapability::TEMP_STATUS | DomainCapability::TEMP_THRESHOLD,
        )];
        Participant::new("DISP", EngineConfig::default(), platform, domains)
    }

    fn catalog(algorithms: &[Algorithm]) -> Catalog {
        let image = algorithms
            .iter()
            .fold(DspImage::new(DspMetadata::new("disp", 1, 0, 1)), |image, a| image.algorithm(*a));
        Catalog::build(image, 7).unwrap()
    }

    fn primitive(id: u16, instance: u8, opcode: Opcode, action: Action) -> Primitive {
        Primitive::new(Tuple::new(id, DOMAIN_D0, instance), opcode, vec![action])
    }

    #[test]
    fn test_temperature_get_transformed() {
        let p = participant(Platform::new());
        let c = catalog(&[Algorithm::new(ActionType::Konst, TempXform::DeciK, PowerXform::None)]);
        let prim = primitive(id::GET_TEMPERATURE, INSTANCE_ANY, Opcode::Get, Action::with_p1(ActionType::Konst, 3232));

        let mut rsp = EsifData::new(DataType::Temperature, 4);
        execute_action(&p, &c, &prim, 0, &mut EsifData::void(), &mut rsp).unwrap();
        assert_eq!(rsp.ty, DataType::Temperature);
        assert_eq!(rsp.read_u32(), Some(50));
    }

    #[test]
    fn test_missing_algorithm() {
        let p = participant(Platform::new());
        let c = catalog(&[]);
        let prim = primitive(id::GET_TEMPERATURE, INSTANCE_ANY, Opcode::Get, Action::with_p1(ActionType::Konst, 1));
        let mut rsp = EsifData::new(DataType::Temperature, 4);
        assert_eq!(
            execute_action(&p, &c, &prim, 0, &mut EsifData::void(), &mut rsp),
            Err(EsifError::NeedAlgorithm)
        );
        assert_eq!(rsp.ty, DataType::Temperature);
    }

    #[test]
    fn test_percent_scaling() {
        let mmio = Arc::new(SimMmio::new(0x10));
        let p = participant(Platform::new().with_mmio(mmio.clone()));
        let c = catalog(&[]);
        let field = Action::new(ActionType::Mmio, [0x4, 31, 0, 0, 0]);

        let set = primitive(200, INSTANCE_ANY, Opcode::Set, field);
        let mut req = EsifData::from_u32(DataType::Percent, 4_550);
        execute_action(&p, &c, &set, 0, &mut req, &mut EsifData::void()).unwrap();
        assert_eq!(mmio.peek(0x4), 45);
        // caller keeps its semantic value
        assert_eq!((req.ty, req.read_u32()), (DataType::Percent, Some(4_550)));

        let get = primitive(201, INSTANCE_ANY, Opcode::Get, field);
        let mut rsp = EsifData::new(DataType::Percent, 4);
        execute_action(&p, &c, &get, 0, &mut EsifData::void(), &mut rsp).unwrap();
        assert_eq!(rsp.read_u32(), Some(4_500));
    }

    #[test]
    fn test_threshold_cache() {
        let mmio = Arc::new(SimMmio::new(0x10));
        let p = participant(Platform::new().with_mmio(mmio.clone()));
        let c = catalog(&[Algorithm::new(ActionType::Mmio, TempXform::DeciK, PowerXform::None)]);
        let field = Action::new(ActionType::Mmio, [0x8, 15, 0, 0, 0]);

        let set = primitive(id::SET_TEMPERATURE_THRESHOLDS, 1, Opcode::Set, field);
        let mut req = EsifData::from_u32(DataType::Temperature, 60);
        execute_action(&p, &c, &set, 0, &mut req, &mut EsifData::void()).unwrap();
        assert_eq!(mmio.peek(0x8), 3332);
        let state = p.domain(0).unwrap().snapshot();
        assert_eq!((state.temp_cache0, state.temp_cache1), (0, 60));
    }

    #[test]
    fn test_code_threshold_not_cached() {
        let p = participant(Platform::new());
        let c = catalog(&[Algorithm::new(ActionType::Kode, TempXform::None, PowerXform::None)]);
        let action = Action::with_p1(ActionType::Kode, method_code("STT0"));
        let set = primitive(id::SET_TEMPERATURE_THRESHOLDS, 0, Opcode::Set, action);

        let mut req = EsifData::from_u32(DataType::Temperature, 70);
        execute_action(&p, &c, &set, 0, &mut req, &mut EsifData::void()).unwrap();
        let state = p.domain(0).unwrap().snapshot();
        assert_eq!((state.temp_aux0, state.temp_cache0), (70, 0));
    }

    #[test]
    fn test_acpi_hysteresis_tenths() {
        let acpi = Arc::new(SimAcpi::new());
        acpi.define("GTSH", AcpiObject::Integer(20));
        let p = participant(Platform::new().with_acpi(acpi));
        let c = catalog(&[Algorithm::new(ActionType::Acpi, TempXform::None, PowerXform::None)]);
        let action = Action::with_p1(ActionType::Acpi, method_code("GTSH"));
        let prim = primitive(id::GET_TEMPERATURE_THRESHOLD_HYSTERESIS, INSTANCE_ANY, Opcode::Get, action);

        let mut rsp = EsifData::new(DataType::Uint32, 4);
        execute_action(&p, &c, &prim, 0, &mut EsifData::void(), &mut rsp).unwrap();
        assert_eq!(rsp.read_u32(), Some(2));
    }

    #[test]
    fn test_index_and_type_errors() {
        let p = participant(Platform::new());
        let c = catalog(&[]);
        let prim = primitive(1, INSTANCE_ANY, Opcode::Get, Action::with_p1(ActionType::Unknown(99), 0));
        let mut rsp = EsifData::new(DataType::Uint32, 4);
        assert_eq!(
            execute_action(&p, &c, &prim, 0, &mut EsifData::void(), &mut rsp),
            Err(EsifError::UnsupportedActionType)
        );
        assert_eq!(
            execute_action(&p, &c, &prim, 1, &mut EsifData::void(), &mut rsp),
            Err(EsifError::PrimitiveNotFound)
        );
    }
}
