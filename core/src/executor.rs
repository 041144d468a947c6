//! # Primitive Executor
//!
//! Entry point of a primitive call. A primitive may list several actions
//! that reach the same value by different means; without an explicit action
//! index they are tried in catalog order until one produces a terminal
//! result (see [`EsifError::is_terminal`]). Non-terminal failures are logged
//! and the next action is tried; when the list runs out the last failure is
//! returned.
//!
//! A `DSP`-typed request is not a primitive call: it reloads or unloads the
//! participant's descriptor.

use crate::catalog::Catalog;
use crate::data::{DataType, EsifData};
use crate::dispatch;
use crate::error::{EsifError, EsifResult};
use crate::participant::Participant;
use crate::primitive::Tuple;

impl Participant {
    /// Execute the primitive at `tuple`
    ///
    /// With `action_index` only that action runs; an index past the
    /// primitive's action list is `PrimitiveNotFound`.
    pub fn execute_primitive(
        &self,
        tuple: Tuple,
        req: &mut EsifData,
        rsp: &mut EsifData,
        action_index: Option<u8>,
    ) -> EsifResult<()> {
        if req.ty == DataType::Dsp {
            return self.reload_dsp(req);
        }
        let guard = self.catalog_slot().read();
        let catalog = guard.as_ref().ok_or_else(|| {
            log::debug!("Primitive: {} has no DSP loaded", self.name());
            EsifError::NeedDsp
        })?;
        self.execute_in(catalog, tuple, req, rsp, action_index)
    }

    /// GET `id` on `domain` with an empty request
    pub fn get_simple_primitive(&self, id: u16, domain: u16, instance: u8, rsp: &mut EsifData) -> EsifResult<()> {
        self.execute_primitive(Tuple::new(id, domain, instance), &mut EsifData::void(), rsp, None)
    }

    /// Execute against an already borrowed catalog
    ///
    /// Actions that issue primitives of their own come through here so the
    /// whole call sees one catalog.
    pub(crate) fn execute_in(
        &self,
        catalog: &Catalog,
        tuple: Tuple,
        req: &mut EsifData,
        rsp: &mut EsifData,
        action_index: Option<u8>,
    ) -> EsifResult<()> {
        let primitive = catalog.lookup(&tuple).map_err(|err| {
            log::debug!(
                "Primitive: {}.{:04x}.{} not in {}",
                tuple.id,
                tuple.domain,
                tuple.instance,
                catalog.metadata().code
            );
            err
        })?;

        if let Some(index) = action_index {
            return dispatch::execute_action(self, catalog, primitive, index as usize, req, rsp);
        }

        let mut result = Err(EsifError::PrimitiveNotFound);
        for (index, action) in primitive.actions.iter().enumerate() {
            result = dispatch::execute_action(self, catalog, primitive, index, req, rsp);
            match result {
                Ok(()) => break,
                Err(err) if err.is_terminal() => break,
                Err(err) => log::debug!(
                    "Primitive: {} action {} ({}) failed: {}, trying next",
                    tuple.id,
                    index,
                    action.ty,
                    err
                ),
            }
        }
        result
    }
}
