//! # CODE Backend
//!
//! Hand-written methods selected by a four-character code packed into `p1`.
//! The primitive's domain selects the domain whose cached state the method
//! reads or writes.
//!
//! ## SET
//!
//! | Code | Effect |
//! |------|--------|
//! | `SPT0` / `SPT1` | lower / upper power threshold |
//! | `STT0` / `STT1` | lower / upper temperature threshold |
//! | `SAFF` | logical processor affinity |
//! | `FNDG` | RF tuning target frequency, see [`fndg`] |
//! | `RPCP` | graphics P-state by index, see [`rpcp`] |
//!
//! Every SET recomputes the domain's poll mask, whatever its outcome.
//!
//! ## GET
//!
//! | Code | Value |
//! |------|-------|
//! | `ADDP` / `SUBP` | sum / difference of the RAPL power of domains `p2`, `p3` |
//! | `MAXT` | hotter of domains `p2`, `p3` |
//! | `GRP0`..`GRP2` | cached RAPL power of domain 0..2 |
//! | `GTT0` / `GTT1` | temperature threshold, read-back cache first |
//! | `GPT0` / `GPT1` | power threshold |
//! | `GAFF` | affinity |
//! | `PUTL` | platform utilization |
//! | `LPAT` | LPAT table as `UINT64` variant pairs |
//! | `RPCP` | graphics P-state frequency table |

pub mod fndg;
pub mod rpcp;

use super::{ActionBackend, ActionContext};
use crate::catalog::TempXform;
use crate::data::{DataType, EsifData};
use crate::domain::{Domain, TEMP_INVALID};
use crate::error::{EsifError, EsifResult};
use crate::primitive::{id, method_code, Tuple, INSTANCE_ANY};
use crate::xform::lpat;

/// CODE backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodeBackend;

/// Method codes understood by the backend
pub mod method {
    use super::method_code;

    /// Set lower power threshold
    pub const SPT0: u32 = method_code("SPT0");
    /// Set upper power threshold
    pub const SPT1: u32 = method_code("SPT1");
    /// Set lower temperature threshold
    pub const STT0: u32 = method_code("STT0");
    /// Set upper temperature threshold
    pub const STT1: u32 = method_code("STT1");
    /// Set affinity
    pub const SAFF: u32 = method_code("SAFF");
    /// Program RF tuning
    pub const FNDG: u32 = method_code("FNDG");
    /// Graphics P-state
    pub const RPCP: u32 = method_code("RPCP");
    /// Add two domains' power
    pub const ADDP: u32 = method_code("ADDP");
    /// Subtract two domains' power
    pub const SUBP: u32 = method_code("SUBP");
    /// Max of two domains' temperature
    pub const MAXT: u32 = method_code("MAXT");
    /// RAPL power of domain 0
    pub const GRP0: u32 = method_code("GRP0");
    /// RAPL power of domain 1
    pub const GRP1: u32 = method_code("GRP1");
    /// RAPL power of domain 2
    pub const GRP2: u32 = method_code("GRP2");
    /// Get lower temperature threshold
    pub const GTT0: u32 = method_code("GTT0");
    /// Get upper temperature threshold
    pub const GTT1: u32 = method_code("GTT1");
    /// Get lower power threshold
    pub const GPT0: u32 = method_code("GPT0");
    /// Get upper power threshold
    pub const GPT1: u32 = method_code("GPT1");
    /// Get affinity
    pub const GAFF: u32 = method_code("GAFF");
    /// Platform utilization
    pub const PUTL: u32 = method_code("PUTL");
    /// LPAT table
    pub const LPAT: u32 = method_code("LPAT");
}

/// Printable form of a method code
fn method_name(code: u32) -> heapless::String<4> {
    code.to_le_bytes()
        .iter()
        .map(|b| if b.is_ascii_graphic() { *b as char } else { '?' })
        .collect()
}

/// Domain the primitive addresses
fn target_domain<'a>(ctx: &ActionContext<'a>) -> EsifResult<&'a Domain> {
    ctx.participant
        .domain_by_code(ctx.primitive.tuple.domain)
        .map_err(|err| {
            log::debug!("CODE: domain 0x{:04x} out of bounds", ctx.primitive.tuple.domain);
            err
        })
}

/// GET `primitive` on `domain` through the same catalog, into a fresh `ty` scalar
pub(crate) fn nested_get(
    ctx: &ActionContext<'_>,
    primitive: u16,
    domain: u16,
    instance: u8,
    ty: DataType,
) -> EsifResult<u64> {
    let width = ty.scalar_width().ok_or(EsifError::UnsupportedResultDataType)?;
    let mut rsp = EsifData::new(ty, width);
    ctx.participant.execute_in(
        ctx.catalog,
        Tuple::new(primitive, domain, instance),
        &mut EsifData::void(),
        &mut rsp,
        None,
    )?;
    rsp.scalar()
}

fn request_u32(req: &EsifData) -> EsifResult<u32> {
    req.read_u32().ok_or(EsifError::UnsupportedRequestDataType)
}

impl CodeBackend {
    /// RAPL power of domains `p2` and `p3`
    ///
    /// Read live when the addressed domain is not being polled, otherwise
    /// taken from the poller's cache.
    fn power_pair(&self, ctx: &ActionContext<'_>, domain: &Domain) -> EsifResult<(u32, u32)> {
        let codes = [ctx.action.p2() as u16, ctx.action.p3() as u16];
        let [d1, d2] = codes.map(|code| ctx.participant.domain_by_code(code));
        let (d1, d2) = (d1?, d2?);

        if ctx.participant.config().live_rapl_power && !domain.snapshot().is_polling_power() {
            let p1 = nested_get(ctx, id::GET_RAPL_POWER, d1.code, INSTANCE_ANY, DataType::Uint32)?;
            let p2 = nested_get(ctx, id::GET_RAPL_POWER, d2.code, INSTANCE_ANY, DataType::Uint32)?;
            log::trace!("CODE: live power {}={} {}={}", d1.name, p1, d2.name, p2);
            Ok((p1 as u32, p2 as u32))
        } else {
            Ok((d1.snapshot().rapl_power, d2.snapshot().rapl_power))
        }
    }

    fn cached_rapl_power(&self, ctx: &ActionContext<'_>, index: u8) -> EsifResult<u32> {
        Ok(ctx.participant.domain(index)?.snapshot().rapl_power)
    }

    fn get_lpat(&self, ctx: &ActionContext<'_>, rsp: &mut EsifData) -> EsifResult<()> {
        if !ctx.catalog.has_algorithm(TempXform::Lpat) {
            return Err(EsifError::UnsupportedAlgorithm);
        }
        let table = ctx.catalog.lpat().unwrap_or(&lpat::STATIC_LPAT);
        let dst = rsp.reserve(lpat::encoded_len(table))?;
        lpat::encode(table, dst)
    }

    /// Value of a scalar GET method
    fn get_value(&self, ctx: &ActionContext<'_>, code: u32, domain: &Domain) -> EsifResult<u32> {
        let value = match code {
            method::ADDP => {
                let (p1, p2) = self.power_pair(ctx, domain)?;
                p1.saturating_add(p2)
            },
            method::SUBP => {
                let (p1, p2) = self.power_pair(ctx, domain)?;
                p1.saturating_sub(p2)
            },
            method::MAXT => {
                let codes = [ctx.action.p2() as u16, ctx.action.p3() as u16];
                let t1 = nested_get(ctx, id::GET_TEMPERATURE, codes[0], INSTANCE_ANY, DataType::Temperature)?;
                let t2 = nested_get(ctx, id::GET_TEMPERATURE, codes[1], INSTANCE_ANY, DataType::Temperature)?;
                // readings below zero come back two's complement
                (t1 as u32 as i32).max(t2 as u32 as i32) as u32
            },
            method::GRP0 => self.cached_rapl_power(ctx, 0)?,
            method::GRP1 => self.cached_rapl_power(ctx, 1)?,
            method::GRP2 => self.cached_rapl_power(ctx, 2)?,
            method::GTT0 | method::GTT1 => {
                let state = domain.snapshot();
                let (cache, aux) = if code == method::GTT0 {
                    (state.temp_cache0, state.temp_aux0)
                } else {
                    (state.temp_cache1, state.temp_aux1)
                };
                match if cache > 0 { cache } else { aux } {
                    0 => TEMP_INVALID,
                    value => value,
                }
            },
            method::GPT0 => domain.snapshot().power_aux0,
            method::GPT1 => domain.snapshot().power_aux1,
            method::GAFF => domain.snapshot().affinity,
            method::PUTL => {
                let cpu = ctx.participant.platform().cpu.as_ref().ok_or(EsifError::NotSupported)?;
                cpu.utilization()?
            },
            _ => {
                log::debug!("CODE: GET {} not implemented", method_name(code));
                return Err(EsifError::NotImplemented);
            },
        };
        Ok(value)
    }
}

impl ActionBackend for CodeBackend {
    fn get(&self, ctx: &ActionContext<'_>, _req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        let code = ctx.action.p1();
        let domain = target_domain(ctx)?;

        match code {
            method::LPAT => return self.get_lpat(ctx, rsp),
            method::RPCP => return rpcp::get_table(ctx, rsp),
            _ => {},
        }

        let value = self.get_value(ctx, code, domain)?;
        log::trace!("CODE: GET {} on {} -> {} as {}", method_name(code), domain.name, value, rsp.ty);
        match rsp.ty {
            DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 | DataType::Frequency => {
                rsp.store_scalar(value as u64)
            },
            other => {
                log::debug!("CODE: response type {} not implemented", other);
                Err(EsifError::NotImplemented)
            },
        }
    }

    fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        let code = ctx.action.p1();
        let domain = target_domain(ctx)?;
        log::trace!("CODE: SET {} on {}", method_name(code), domain.name);

        let result = match code {
            method::SPT0 | method::SPT1 | method::STT0 | method::STT1 | method::SAFF => {
                request_u32(req).map(|value| {
                    domain.with_state(|state| match code {
                        method::SPT0 => state.power_aux0 = value,
                        method::SPT1 => state.power_aux1 = value,
                        method::STT0 => state.temp_aux0 = value,
                        method::STT1 => state.temp_aux1 = value,
                        _ => state.affinity = value,
                    })
                })
            },
            method::FNDG => fndg::set(ctx, req),
            method::RPCP => rpcp::set_state(ctx, req),
            _ => {
                log::debug!("CODE: SET {} not implemented", method_name(code));
                Err(EsifError::NotImplemented)
            },
        };

        let mask = domain.with_state(|state| state.recompute_poll_mask());
        log::debug!("CODE: {} poll mask {:?}", domain.name, mask);
        result
    }
}
