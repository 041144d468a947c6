//! Argument lists for ACPI SET.
//!
//! `_OSC` and `_SCP` take their fixed `STRUCTURE` layouts; every other method
//! takes the request as a run of integers of the request type's width.

use alloc::vec::Vec;

use arrayvec::ArrayVec;
use esif_hal::{AcpiName, AcpiObject};

use crate::data::{DataType, EsifData, OscRequest, ScpRequest};
use crate::error::{EsifError, EsifResult};

/// Most arguments an ACPI control method accepts
pub const MAX_ARGS: usize = 7;

/// Arguments for one evaluation
pub type AcpiArgs = ArrayVec<AcpiObject, MAX_ARGS>;

/// Capability negotiation method
pub const OSC: AcpiName = AcpiName::new("_OSC");

/// Cooling policy method
pub const SCP: AcpiName = AcpiName::new("_SCP");

/// `_OSC` status bits reported by firmware; bit 0 is not an error
const OSC_FAILURE_BITS: [(u32, &str); 4] = [
    (0x2, "platform unable to process the request"),
    (0x4, "unrecognized UUID"),
    (0x8, "unrecognized revision"),
    (0x10, "capabilities masked"),
];

/// Build the argument list `method` takes for `req`
pub fn build(method: AcpiName, req: &EsifData) -> EsifResult<AcpiArgs> {
    let mut args = AcpiArgs::new();
    match (method, req.ty) {
        (OSC, DataType::Structure) => {
            let osc = OscRequest::decode(req.buf())?;
            log::trace!(
                "ACPI: _OSC revision {} count {} status 0x{:x} capabilities 0x{:x}",
                osc.revision,
                osc.count,
                osc.status,
                osc.capabilities
            );
            let words: Vec<u8> = osc.capability_words().flat_map(u32::to_le_bytes).collect();
            args.push(AcpiObject::Buffer(osc.guid.to_vec()));
            args.push(AcpiObject::Integer(osc.revision as u64));
            args.push(AcpiObject::Integer(osc.count as u64));
            args.push(AcpiObject::Buffer(words));
        },
        (SCP, DataType::Structure) => {
            let scp = ScpRequest::decode(req.buf())?;
            log::trace!(
                "ACPI: _SCP mode {} acoustic {} power {}",
                scp.cooling_mode,
                scp.acoustic_limit,
                scp.power_limit
            );
            args.push(AcpiObject::Integer(scp.cooling_mode as u64));
            args.push(AcpiObject::Integer(scp.acoustic_limit as u64));
            args.push(AcpiObject::Integer(scp.power_limit as u64));
        },
        (OSC | SCP, _) => return Err(EsifError::InvalidRequestType),
        (_, ty) => {
            let width = match ty {
                DataType::Uint8 => 1,
                DataType::Uint16 => 2,
                DataType::Uint32 | DataType::Temperature => 4,
                DataType::Uint64 | DataType::Frequency => 8,
                _ => return Err(EsifError::UnsupportedRequestDataType),
            };
            let words = req.buf().chunks_exact(width);
            if words.len() == 0 {
                return Err(EsifError::InvalidRequestType);
            }
            for word in words {
                let mut raw = [0u8; 8];
                raw[..width].copy_from_slice(word);
                args.try_push(AcpiObject::Integer(u64::from_le_bytes(raw)))
                    .map_err(|_| EsifError::InvalidRequestType)?;
            }
        },
    }
    Ok(args)
}

/// Fold the `_OSC` result into the caller's request
///
/// The first dword firmware returns is written back as the request's status
/// word; any status bit besides bit 0 fails the call.
pub fn apply_osc_result(result: Option<&AcpiObject>, req: &mut EsifData) -> EsifResult<()> {
    let Some(AcpiObject::Buffer(raw)) = result else {
        log::warn!("ACPI: _OSC returned no capabilities buffer");
        return Err(EsifError::AcpiEvalFailure);
    };
    let status = raw
        .get(..4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(EsifError::AcpiEvalFailure)?;

    req.buf_mut()
        .get_mut(OscRequest::STATUS_OFFSET..OscRequest::STATUS_OFFSET + 4)
        .ok_or(EsifError::InvalidRequestType)?
        .copy_from_slice(&status.to_le_bytes());

    let failure = status & !0x1;
    if failure == 0 {
        return Ok(());
    }
    for (bit, reason) in OSC_FAILURE_BITS {
        if failure & bit != 0 {
            log::warn!("ACPI: _OSC failed: {}", reason);
        }
    }
    Err(EsifError::AcpiEvalFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn osc_bytes(count: u32, status: u32, capabilities: u32) -> Vec<u8> {
        let mut bytes = vec![0xAB; 16];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&status.to_le_bytes());
        bytes.extend_from_slice(&capabilities.to_le_bytes());
        bytes
    }

    #[test]
    fn test_osc_args() {
        let req = EsifData::from_bytes(DataType::Structure, osc_bytes(2, 0, 0x3F));
        let args = build(OSC, &req).unwrap();
        assert_eq!(args.len(), 4);
        assert_eq!(args[0], AcpiObject::Buffer(vec![0xAB; 16]));
        assert_eq!(args[2], AcpiObject::Integer(2));
        assert_eq!(args[3], AcpiObject::Buffer(vec![0, 0, 0, 0, 0x3F, 0, 0, 0]));

        let req = EsifData::from_bytes(DataType::Structure, vec![0; 12]);
        assert_eq!(build(OSC, &req), Err(EsifError::InvalidRequestType));
        let req = EsifData::from_u32(DataType::Uint32, 1);
        assert_eq!(build(SCP, &req), Err(EsifError::InvalidRequestType));
    }

    #[test]
    fn test_integer_args() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&0x10u16.to_le_bytes());
        bytes.extend_from_slice(&0x20u16.to_le_bytes());
        let req = EsifData::from_bytes(DataType::Uint16, bytes);
        let args = build(AcpiName::new("_DTI"), &req).unwrap();
        assert_eq!(args.as_slice(), &[AcpiObject::Integer(0x10), AcpiObject::Integer(0x20)]);

        let req = EsifData::new(DataType::Uint32, 2);
        assert_eq!(build(AcpiName::new("_DTI"), &req), Err(EsifError::InvalidRequestType));
        let req = EsifData::from_bytes(DataType::String, vec![b'a']);
        assert_eq!(build(AcpiName::new("_DTI"), &req), Err(EsifError::UnsupportedRequestDataType));
        let req = EsifData::from_bytes(DataType::Uint8, vec![0; 8]);
        assert_eq!(build(AcpiName::new("_DTI"), &req), Err(EsifError::InvalidRequestType));
    }

    #[test]
    fn test_osc_status_written_back() {
        let mut req = EsifData::from_bytes(DataType::Structure, osc_bytes(2, 0, 0x3F));
        let result = AcpiObject::Buffer(vec![0x1, 0, 0, 0, 0x3F, 0, 0, 0]);
        apply_osc_result(Some(&result), &mut req).unwrap();
        assert_eq!(req.u32_at(OscRequest::STATUS_OFFSET), Some(1));

        let result = AcpiObject::Buffer(vec![0x4, 0, 0, 0]);
        assert_eq!(apply_osc_result(Some(&result), &mut req), Err(EsifError::AcpiEvalFailure));
        assert_eq!(req.u32_at(OscRequest::STATUS_OFFSET), Some(4));
        assert_eq!(apply_osc_result(None, &mut req), Err(EsifError::AcpiEvalFailure));
    }
}
