//! SYSTEMIO: bit fields of 32-bit system I/O ports.
//!
//! `p1` is the port, `p3`/`p2` the lowest/highest bit of the field.

use super::{check_bits, extract32, insert32, register_request, register_response};
use super::{ActionBackend, ActionContext};
use crate::data::EsifData;
use crate::error::{EsifError, EsifResult};

/// System I/O backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemIoBackend;

fn decode(ctx: &ActionContext<'_>) -> EsifResult<(u16, u8, u8)> {
    let port = u16::try_from(ctx.action.p1()).map_err(|_| EsifError::OutOfBounds)?;
    let (bit_from, bit_to) = (ctx.action.p3() as u8, ctx.action.p2() as u8);
    check_bits(bit_from, bit_to, 32)?;
    Ok((port, bit_from, bit_to))
}

impl ActionBackend for SystemIoBackend {
    fn get(&self, ctx: &ActionContext<'_>, _req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        let io = ctx.participant.platform().port_io.as_ref().ok_or(EsifError::NotSupported)?;
        let (port, bit_from, bit_to) = decode(ctx)?;
        let raw = {
            let _guard = ctx.participant.locks().systemio.lock();
            io.inl(port)?
        };
        register_response(rsp, extract32(raw, bit_from, bit_to))
    }

    fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        let io = ctx.participant.platform().port_io.as_ref().ok_or(EsifError::NotSupported)?;
        let (port, bit_from, bit_to) = decode(ctx)?;
        let value = register_request(req)?;

        let _guard = ctx.participant.locks().systemio.lock();
        let raw = io.inl(port)?;
        io.outl(port, insert32(raw, bit_from, bit_to, value)).map_err(|err| {
            log::warn!("Action: port 0x{:04x} write failed: {}", port, err);
            EsifError::from(err)
        })
    }
}
