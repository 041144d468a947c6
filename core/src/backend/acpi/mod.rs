//! # ACPI Backend
//!
//! Evaluates the control method named by `p1` (four ASCII bytes, first
//! character in the low byte) on the participant's device node.
//!
//! ## GET
//!
//! The returned object tree is unpacked into the response type in two
//! passes (see [`unpack`]). When the response cannot hold the result the
//! call fails with `NeedLargerBuffer` and `data_len` carries the size a
//! retry needs; nothing is written. A `TABLE` response receives only the
//! 5-byte table header.
//!
//! ## SET
//!
//! `_OSC` and `_SCP` take `STRUCTURE` requests; other methods take integer
//! arrays (see [`args`]). `_OSC` reports the negotiated status back through
//! the request.
//!
//! ## Errors
//!
//! A missing method is mapped by name: trip point methods (`_ACx`, `_PSV`,
//! `_CRT`, `_HOT`, `_CR3`) give `AcpiTripPointAbsent`, optional identity
//! methods (`_STR`, `_UID`) give `AcpiObjectNotPresent`, anything else
//! `AcpiObjectNotFound`. Other evaluation failures give `AcpiEvalFailure`.

pub mod args;
pub mod unpack;

use esif_hal::{AcpiError, AcpiEvaluator, AcpiName, AcpiObject};

use self::unpack::{TableShape, Unpacker};
use super::{ActionBackend, ActionContext};
use crate::data::{DataType, EsifData, TableHeader};
use crate::error::{EsifError, EsifResult};
use crate::participant::Participant;

/// Trip point methods whose absence is expected
const TRIP_POINT_PREFIXES: [&str; 5] = ["_AC", "_PSV", "_CRT", "_HOT", "_CR3"];

/// Optional methods whose absence is expected
const OPTIONAL_METHODS: [&str; 2] = ["_STR", "_UID"];

/// Map an evaluation failure of `method` to an engine error
pub fn translate_error(method: AcpiName, err: AcpiError) -> EsifError {
    match err {
        AcpiError::NotFound if TRIP_POINT_PREFIXES.iter().any(|p| method.starts_with(p)) => {
            EsifError::AcpiTripPointAbsent
        },
        AcpiError::NotFound if OPTIONAL_METHODS.iter().any(|p| method.starts_with(p)) => {
            EsifError::AcpiObjectNotPresent
        },
        AcpiError::NotFound => EsifError::AcpiObjectNotFound,
        _ => EsifError::AcpiEvalFailure,
    }
}

fn evaluator(participant: &Participant) -> EsifResult<&dyn AcpiEvaluator> {
    participant.platform().acpi.as_deref().ok_or(EsifError::NoAcpiSupport)
}

fn evaluate(
    participant: &Participant,
    acpi: &dyn AcpiEvaluator,
    method: AcpiName,
    args: &[AcpiObject],
) -> Result<Option<AcpiObject>, AcpiError> {
    let _guard = participant.locks().acpi.lock();
    acpi.evaluate(method, args)
}

/// ACPI method backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcpiBackend;

impl AcpiBackend {
    fn get_table(method: AcpiName, result: Option<&AcpiObject>, rsp: &mut EsifData) -> EsifResult<()> {
        let shape = result.map(TableShape::scan);
        let dst = rsp.reserve(TableHeader::LEN as u32)?;
        let header = shape.ok_or(EsifError::NotTable)?.header().map_err(|err| {
            log::debug!("ACPI: {} result is not a table", method);
            err
        })?;
        log::trace!(
            "ACPI: {} table rev {} rows {} cols {}",
            method,
            header.revision,
            header.rows,
            header.cols
        );
        header.encode(dst)
    }
}

impl ActionBackend for AcpiBackend {
    fn get(&self, ctx: &ActionContext<'_>, _req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        let acpi = evaluator(ctx.participant)?;
        let method = AcpiName::from_u32(ctx.action.p1());
        let result = evaluate(ctx.participant, acpi, method, &[]).map_err(|err| {
            let mapped = translate_error(method, err);
            log::debug!("ACPI: {} failed: {} ({})", method, err, mapped);
            mapped
        })?;

        if rsp.ty == DataType::Table {
            return Self::get_table(method, result.as_ref(), rsp);
        }

        let Some(obj) = result else {
            rsp.data_len = 0;
            return Ok(());
        };
        let unpacker = Unpacker::new(method, rsp.ty);
        let needed = unpacker.required_len(&obj)?;
        let dst = rsp.reserve(needed).map_err(|err| {
            log::trace!("ACPI: {} needs {} bytes", method, needed);
            err
        })?;
        unpacker.fill(&obj, dst)?;
        Ok(())
    }

    fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        let acpi = evaluator(ctx.participant)?;
        let method = AcpiName::from_u32(ctx.action.p1());
        let args = args::build(method, req)?;

        let result = evaluate(ctx.participant, acpi, method, &args).map_err(|err| {
            log::warn!("ACPI: {} set failed: {}", method, err);
            EsifError::AcpiEvalFailure
        })?;
        if method == args::OSC {
            return args::apply_osc_result(result.as_ref(), req);
        }
        Ok(())
    }
}

/// `LPAT` package read through the ACPI path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcpiLpatBackend;

impl ActionBackend for AcpiLpatBackend {
    fn get(&self, ctx: &ActionContext<'_>, req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        AcpiBackend.get(ctx, req, rsp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::Harness;
    use crate::data::{OscRequest, VariantIter};
    use crate::participant::Platform;
    use crate::primitive::{method_code, Action, ActionType};
    use alloc::sync::Arc;
    use alloc::vec;
    use alloc::vec::Vec;
    use esif_hal::sim::SimAcpi;

    fn acpi_harness() -> (Arc<SimAcpi>, Harness) {
        let acpi = Arc::new(SimAcpi::new());
        let harness = Harness::with_platform(Platform::new().with_acpi(acpi.clone()));
        (acpi, harness)
    }

    fn method(name: &str) -> Action {
        Action::with_p1(ActionType::Acpi, method_code(name))
    }

    #[test]
    fn test_error_translation() {
        let cases = [
            ("_AC0", EsifError::AcpiTripPointAbsent),
            ("_AC9", EsifError::AcpiTripPointAbsent),
            ("_PSV", EsifError::AcpiTripPointAbsent),
            ("_CR3", EsifError::AcpiTripPointAbsent),
            ("_STR", EsifError::AcpiObjectNotPresent),
            ("_UID", EsifError::AcpiObjectNotPresent),
            ("_TMP", EsifError::AcpiObjectNotFound),
        ];
        for (name, expected) in cases {
            assert_eq!(translate_error(AcpiName::new(name), AcpiError::NotFound), expected, "{}", name);
        }
        assert_eq!(
            translate_error(AcpiName::new("_PSV"), AcpiError::Failure(5)),
            EsifError::AcpiEvalFailure
        );
    }

    #[test]
    fn test_get_sizing_and_retry() {
        let (acpi, harness) = acpi_harness();
        let mut raw: Vec<u8> = "Hi".encode_utf16().flat_map(u16::to_le_bytes).collect();
        raw.resize(12, 0);
        acpi.define("_STR", AcpiObject::Buffer(raw));

        let mut rsp = EsifData::new(DataType::String, 0);
        assert_eq!(harness.get(&AcpiBackend, &method("_STR"), &mut rsp), Err(EsifError::NeedLargerBuffer));
        assert_eq!(rsp.data_len, 3);

        rsp.resize(rsp.data_len);
        harness.get(&AcpiBackend, &method("_STR"), &mut rsp).unwrap();
        assert_eq!(rsp.data(), b"Hi\0");
    }

    #[test]
    fn test_get_package_as_binary() {
        let (acpi, harness) = acpi_harness();
        acpi.define(
            "PPCC",
            AcpiObject::Package(vec![AcpiObject::Integer(2), AcpiObject::Integer(15000)]),
        );
        let mut rsp = EsifData::new(DataType::Binary, 64);
        harness.get(&AcpiBackend, &method("PPCC"), &mut rsp).unwrap();
        assert_eq!(rsp.data_len, 24);
        let values: Vec<u64> = VariantIter::new(rsp.data()).filter_map(|v| v.as_integer()).collect();
        assert_eq!(values, [2, 15000]);
    }

    #[test]
    fn test_get_table_header() {
        let (acpi, harness) = acpi_harness();
        let row = AcpiObject::Package(vec![AcpiObject::Integer(0), AcpiObject::Integer(1), AcpiObject::Integer(2)]);
        acpi.define("_TRT", AcpiObject::Package(vec![AcpiObject::Integer(1), row.clone(), row]));

        let mut rsp = EsifData::new(DataType::Table, 2);
        assert_eq!(harness.get(&AcpiBackend, &method("_TRT"), &mut rsp), Err(EsifError::NeedLargerBuffer));
        assert_eq!(rsp.data_len, 5);

        let mut rsp = EsifData::new(DataType::Table, 16);
        harness.get(&AcpiBackend, &method("_TRT"), &mut rsp).unwrap();
        assert_eq!(TableHeader::decode(rsp.data()), Some(TableHeader { revision: 1, rows: 2, cols: 3 }));

        acpi.define("_TMP", AcpiObject::Integer(3000));
        assert_eq!(harness.get(&AcpiBackend, &method("_TMP"), &mut rsp), Err(EsifError::NotTable));
    }

    #[test]
    fn test_missing_method_and_support() {
        let (_, harness) = acpi_harness();
        let mut rsp = EsifData::new(DataType::Uint32, 4);
        assert_eq!(
            harness.get(&AcpiBackend, &method("_HOT"), &mut rsp),
            Err(EsifError::AcpiTripPointAbsent)
        );

        let harness = Harness::new();
        assert_eq!(harness.get(&AcpiBackend, &method("_TMP"), &mut rsp), Err(EsifError::NoAcpiSupport));
    }

    #[test]
    fn test_set_scalar_args() {
        let (acpi, harness) = acpi_harness();
        acpi.define_void("_SCP");
        acpi.define_void("PDRT");
        let mut req = EsifData::from_u32(DataType::Uint32, 3);
        harness.set(&AcpiBackend, &method("PDRT"), &mut req).unwrap();

        let calls = acpi.calls();
        assert_eq!(calls.last(), Some(&(AcpiName::new("PDRT"), vec![AcpiObject::Integer(3)])));
    }

    #[test]
    fn test_set_osc_updates_request() {
        let (acpi, harness) = acpi_harness();
        acpi.define("_OSC", AcpiObject::Buffer(vec![0x0, 0, 0, 0, 0x3F, 0, 0, 0]));

        let mut bytes = vec![0x11; 16];
        for word in [1u32, 2, 0x1, 0x3F] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let mut req = EsifData::from_bytes(DataType::Structure, bytes);
        harness.set(&AcpiBackend, &method("_OSC"), &mut req).unwrap();
        assert_eq!(req.u32_at(OscRequest::STATUS_OFFSET), Some(0));

        acpi.define("_OSC", AcpiObject::Buffer(vec![0x8, 0, 0, 0]));
        assert_eq!(harness.set(&AcpiBackend, &method("_OSC"), &mut req), Err(EsifError::AcpiEvalFailure));
    }

    #[test]
    fn test_lpat_is_get_only() {
        let (acpi, harness) = acpi_harness();
        acpi.define("LPAT", AcpiObject::Package(vec![AcpiObject::Integer(2531), AcpiObject::Integer(977)]));
        let action = Action::with_p1(ActionType::AcpiLpat, method_code("LPAT"));

        let mut rsp = EsifData::new(DataType::Binary, 64);
        harness.get(&AcpiLpatBackend, &action, &mut rsp).unwrap();
        assert_eq!(rsp.data_len, 24);

        let mut req = EsifData::from_u32(DataType::Uint32, 0);
        assert_eq!(harness.set(&AcpiLpatBackend, &action, &mut req), Err(EsifError::OpcodeNotImplemented));
    }
}
