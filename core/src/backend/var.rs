//! # VAR Backend
//!
//! Software variables. A SET primitive stores the caller's bytes and type
//! under the tuple of its companion GET primitive, named by the SET
//! action's parameters (`p1` id, `p2` domain, `p3` instance). The GET
//! primitive returns whatever was stored last, or its own `p1` as a
//! `UINT32` when nothing was stored yet.
//!
//! The first SET fixes the variable's capacity; a later, larger SET fails
//! with `OverflowedResultType`.

use alloc::vec::Vec;

use hashbrown::HashMap;
use spin::Mutex;

use super::{ActionBackend, ActionContext};
use crate::data::{DataType, EsifData};
use crate::error::{EsifError, EsifResult};
use crate::primitive::Tuple;

/// One stored variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarEntry {
    /// Type of the last SET request
    pub ty: DataType,
    /// Bytes of the last SET request
    pub bytes: Vec<u8>,
    capacity: usize,
}

/// Variables of one participant, keyed by GET tuple
#[derive(Debug, Default)]
pub struct VarStore {
    vars: Mutex<HashMap<Tuple, VarEntry>>,
}

impl VarStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the variable behind `tuple`
    pub fn get(&self, tuple: &Tuple) -> Option<VarEntry> {
        self.vars.lock().get(tuple).cloned()
    }

    /// Store `bytes` under `tuple`
    pub fn store(&self, tuple: Tuple, ty: DataType, bytes: &[u8]) -> EsifResult<()> {
        let mut vars = self.vars.lock();
        let entry = vars.entry(tuple).or_insert_with(|| VarEntry {
            ty,
            bytes: Vec::new(),
            capacity: bytes.len(),
        });
        if bytes.len() > entry.capacity {
            return Err(EsifError::OverflowedResultType);
        }
        entry.ty = ty;
        entry.bytes.clear();
        entry.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Forget every variable
    pub fn clear(&self) {
        self.vars.lock().clear();
    }

    /// Number of stored variables
    pub fn len(&self) -> usize {
        self.vars.lock().len()
    }

    /// Check whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// VAR backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarBackend;

impl ActionBackend for VarBackend {
    fn get(&self, ctx: &ActionContext<'_>, _req: &EsifData, rsp: &mut EsifData) -> EsifResult<()> {
        let (ty, bytes) = match ctx.participant.vars().get(&ctx.primitive.tuple) {
            Some(entry) => (entry.ty, entry.bytes),
            None => (DataType::Uint32, ctx.action.p1().to_le_bytes().to_vec()),
        };
        if rsp.buf_len() < bytes.len() as u32 {
            return Err(EsifError::OverflowedResultType);
        }
        rsp.ty = ty;
        rsp.commit(&bytes)?;
        log::trace!("VAR: {} -> {} bytes of {}", ctx.primitive.tuple, bytes.len(), ty);
        Ok(())
    }

    fn set(&self, ctx: &ActionContext<'_>, req: &mut EsifData) -> EsifResult<()> {
        let action = ctx.action;
        let target = Tuple::new(action.p1() as u16, action.p2() as u16, action.p3() as u8);
        ctx.participant.vars().store(target, req.ty, req.buf())?;
        log::trace!("VAR: {} <- {} bytes of {}", target, req.buf_len(), req.ty);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::Harness;
    use crate::primitive::{Action, ActionType, DOMAIN_D0};

    #[test]
    fn test_get_before_set_returns_p1() {
        let harness = Harness::new();
        let action = Action::with_p1(ActionType::Var, 42);
        let mut rsp = EsifData::new(DataType::Uint32, 4);
        harness.get(&VarBackend, &action, &mut rsp).unwrap();
        assert_eq!((rsp.ty, rsp.read_u32()), (DataType::Uint32, Some(42)));
    }

    #[test]
    fn test_set_then_get() {
        let harness = Harness::new();
        let get_tuple = harness.tuple();
        let set_action = Action::new(
            ActionType::Var,
            [get_tuple.id as u32, DOMAIN_D0 as u32, get_tuple.instance as u32, 0, 0],
        );
        let mut req = EsifData::from_u64(DataType::Uint64, 0xDEAD_BEEF_0000_0001);
        harness.set(&VarBackend, &set_action, &mut req).unwrap();

        let mut rsp = EsifData::new(DataType::Uint32, 8);
        harness.get(&VarBackend, &Action::with_p1(ActionType::Var, 0), &mut rsp).unwrap();
        assert_eq!(rsp.ty, DataType::Uint64);
        assert_eq!(rsp.u64_at(0), Some(0xDEAD_BEEF_0000_0001));

        let mut small = EsifData::new(DataType::Uint32, 4);
        assert_eq!(
            harness.get(&VarBackend, &Action::with_p1(ActionType::Var, 0), &mut small),
            Err(EsifError::OverflowedResultType)
        );
    }

    #[test]
    fn test_capacity_fixed_by_first_set() {
        let store = VarStore::new();
        let tuple = Tuple::new(1, DOMAIN_D0, 0);
        store.store(tuple, DataType::Uint32, &[1, 2, 3, 4]).unwrap();
        store.store(tuple, DataType::Uint16, &[5, 6]).unwrap();
        assert_eq!(store.get(&tuple).map(|e| e.bytes), Some(alloc::vec![5, 6]));
        assert_eq!(
            store.store(tuple, DataType::Uint64, &[0; 8]),
            Err(EsifError::OverflowedResultType)
        );
        store.clear();
        assert!(store.is_empty());
    }
}
