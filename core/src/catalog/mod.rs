//! # Primitive Catalog
//!
//! Per-participant store built from a loaded platform descriptor (DSP):
//! primitives keyed by [`Tuple`], unit transform [`Algorithm`]s keyed by
//! action type, ACPI notify to [`Event`] mappings and an optional LPAT
//! calibration table.
//!
//! ## Layout
//!
//! Primitives live in an arena and are referred to by [`PrimitiveHandle`].
//! The hash table stores handles only; a bucket is scanned for an exact
//! tuple match, so hash collisions never affect correctness.
//!
//! ## Lifecycle
//!
//! A catalog is built in one go by [`Catalog::build`] and is immutable
//! afterwards. Reload replaces the whole catalog.

pub mod algorithm;

use alloc::vec;
use alloc::vec::Vec;

use heapless::String;

pub use algorithm::{Algorithm, Event, PowerXform, TempXform};

use crate::error::{EsifError, EsifResult};
use crate::primitive::{Action, ActionType, Primitive, Tuple};
use crate::xform::lpat::LpatEntry;

/// Constant reported when an algorithm constant is absent
pub const CONSTANT_ABSENT: u32 = 0xFFFF_FFFF;

/// Maximum length of a descriptor code
pub const DSP_CODE_LEN: usize = 16;

// =============================================================================
// HASHING
// =============================================================================

const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a over the wire bytes of `tuple`, seeded with zero
pub fn tuple_hash(tuple: &Tuple) -> u32 {
    tuple
        .to_bytes()
        .iter()
        .fold(0u32, |h, b| (h ^ *b as u32).wrapping_mul(FNV_PRIME))
}

/// Index of a primitive in the catalog arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveHandle(u32);

impl PrimitiveHandle {
    /// Arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// DESCRIPTOR IMAGE
// =============================================================================

/// Descriptor identity
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DspMetadata {
    /// Descriptor code (e.g. `"dptf_cpu"`)
    pub code: String<DSP_CODE_LEN>,
    /// Major version
    pub version_major: u8,
    /// Minor version
    pub version_minor: u8,
    /// Number of domains the descriptor describes
    pub domain_count: u8,
}

impl DspMetadata {
    /// Metadata with `code` truncated to [`DSP_CODE_LEN`] characters
    pub fn new(code: &str, version_major: u8, version_minor: u8, domain_count: u8) -> Self {
        let mut stored = String::new();
        for c in code.chars() {
            if stored.push(c).is_err() {
                break;
            }
        }
        Self {
            code: stored,
            version_major,
            version_minor,
            domain_count,
        }
    }
}

/// Parsed descriptor contents, as produced by the descriptor parser
#[derive(Debug, Clone, Default)]
pub struct DspImage {
    /// Identity
    pub metadata: DspMetadata,
    /// Primitives in descriptor order
    pub primitives: Vec<Primitive>,
    /// Unit transform policies
    pub algorithms: Vec<Algorithm>,
    /// Notify mappings
    pub events: Vec<Event>,
    /// Programmed LPAT table, if any
    pub lpat: Option<Vec<LpatEntry>>,
}

impl DspImage {
    /// Empty image with `metadata`
    pub fn new(metadata: DspMetadata) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    /// Add a primitive
    pub fn primitive(mut self, primitive: Primitive) -> Self {
        self.primitives.push(primitive);
        self
    }

    /// Add an algorithm
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithms.push(algorithm);
        self
    }

    /// Add a notify mapping
    pub fn event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Attach a programmed LPAT table
    pub fn lpat(mut self, table: Vec<LpatEntry>) -> Self {
        self.lpat = Some(table);
        self
    }
}

/// Turns a descriptor body into a [`DspImage`]
pub trait DspParser: Send + Sync {
    /// Parse a descriptor body
    fn parse(&self, body: &[u8]) -> EsifResult<DspImage>;
}

// =============================================================================
// CATALOG
// =============================================================================

/// Loaded descriptor
#[derive(Debug)]
pub struct Catalog {
    metadata: DspMetadata,
    arena: Vec<Primitive>,
    buckets: Vec<Vec<PrimitiveHandle>>,
    algorithms: Vec<Algorithm>,
    events: Vec<Event>,
    lpat: Option<Vec<LpatEntry>>,
}

impl Catalog {
    /// Empty catalog with `bucket_count` hash buckets
    pub fn new(metadata: DspMetadata, bucket_count: usize) -> Self {
        Self {
            metadata,
            arena: Vec::new(),
            buckets: vec![Vec::new(); bucket_count.max(1)],
            algorithms: Vec::new(),
            events: Vec::new(),
            lpat: None,
        }
    }

    /// Build a complete catalog from `image`
    pub fn build(image: DspImage, bucket_count: usize) -> EsifResult<Self> {
        let mut catalog = Self::new(image.metadata, bucket_count);
        for primitive in image.primitives {
            catalog.insert(primitive);
        }
        for algorithm in image.algorithms {
            catalog.insert_algorithm(algorithm)?;
        }
        catalog.events = image.events;
        catalog.lpat = image.lpat;

        log::info!(
            "DSP: built {} v{}.{}: {} primitives, {} algorithms, {} events",
            catalog.metadata.code,
            catalog.metadata.version_major,
            catalog.metadata.version_minor,
            catalog.arena.len(),
            catalog.algorithms.len(),
            catalog.events.len()
        );
        Ok(catalog)
    }

    /// Descriptor identity
    pub fn metadata(&self) -> &DspMetadata {
        &self.metadata
    }

    /// Number of primitives
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Check whether the catalog holds no primitive
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    fn bucket_of(&self, tuple: &Tuple) -> usize {
        tuple_hash(tuple) as usize % self.buckets.len()
    }

    // =========================================================================
    // Primitives
    // =========================================================================

    /// Add a primitive under its tuple
    ///
    /// A later primitive with an identical tuple is stored but shadowed by
    /// the first one.
    pub fn insert(&mut self, primitive: Primitive) -> PrimitiveHandle {
        let handle = PrimitiveHandle(self.arena.len() as u32);
        let bucket = self.bucket_of(&primitive.tuple);
        self.arena.push(primitive);
        self.buckets[bucket].push(handle);
        handle
    }

    /// Find the primitive for `tuple`
    pub fn lookup(&self, tuple: &Tuple) -> EsifResult<&Primitive> {
        self.buckets[self.bucket_of(tuple)]
            .iter()
            .map(|handle| &self.arena[handle.index()])
            .find(|primitive| primitive.tuple == *tuple)
            .ok_or(EsifError::PrimitiveNotFound)
    }

    /// Primitive behind `handle`
    pub fn get(&self, handle: PrimitiveHandle) -> Option<&Primitive> {
        self.arena.get(handle.index())
    }

    /// Action `index` of `primitive`
    pub fn get_action<'a>(&self, primitive: &'a Primitive, index: usize) -> EsifResult<&'a Action> {
        primitive.action(index).ok_or(EsifError::PrimitiveNotFound)
    }

    // =========================================================================
    // Algorithms
    // =========================================================================

    /// Register a unit transform policy
    ///
    /// At most one policy may exist per action type.
    pub fn insert_algorithm(&mut self, algorithm: Algorithm) -> EsifResult<()> {
        if self.get_algorithm(algorithm.action_type).is_some() {
            log::warn!("DSP: duplicate algorithm for action type {}", algorithm.action_type);
            return Err(EsifError::InvalidRequestType);
        }
        self.algorithms.push(algorithm);
        Ok(())
    }

    /// Policy for `action_type`
    pub fn get_algorithm(&self, action_type: ActionType) -> Option<&Algorithm> {
        self.algorithms.iter().find(|a| a.action_type == action_type)
    }

    /// Check whether any policy uses temperature transform `kind`
    pub fn has_algorithm(&self, kind: TempXform) -> bool {
        self.algorithms.iter().any(|a| a.temp_xform == kind)
    }

    /// First temperature constant for `action_type`
    pub fn temp_c1(&self, action_type: ActionType) -> u32 {
        self.get_algorithm(action_type).map_or(CONSTANT_ABSENT, |a| a.temp_c1)
    }

    /// Second temperature constant for `action_type`
    pub fn temp_c2(&self, action_type: ActionType) -> u32 {
        self.get_algorithm(action_type).map_or(CONSTANT_ABSENT, |a| a.temp_c2)
    }

    // =========================================================================
    // Events and tables
    // =========================================================================

    /// Event mapped to ACPI notify `notify_id`
    pub fn get_event(&self, notify_id: u32) -> Option<&Event> {
        self.events.iter().find(|e| e.notify_id == notify_id)
    }

    /// Programmed LPAT table
    pub fn lpat(&self) -> Option<&[LpatEntry]> {
        self.lpat.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{Opcode, DOMAIN_D0, DOMAIN_D1};

    fn primitive(id: u16, domain: u16, instance: u8, p1: u32) -> Primitive {
        Primitive::new(
            Tuple::new(id, domain, instance),
            Opcode::Get,
            vec![Action::with_p1(ActionType::Konst, p1)],
        )
    }

    #[test]
    fn test_tuple_hash_fnv() {
        let tuple = Tuple::new(0, 0, 0);
        assert_eq!(tuple_hash(&tuple), 0);
        let tuple = Tuple::new(1, 0, 0);
        let expected = (0..5).fold(1u32, |h, _| h.wrapping_mul(FNV_PRIME));
        assert_eq!(tuple_hash(&tuple), expected);
    }

    #[test]
    fn test_lookup_exact_match_in_shared_bucket() {
        // one bucket forces every tuple to collide
        let mut catalog = Catalog::new(DspMetadata::default(), 1);
        catalog.insert(primitive(14, DOMAIN_D0, 255, 1));
        catalog.insert(primitive(14, DOMAIN_D1, 255, 2));
        catalog.insert(primitive(14, DOMAIN_D0, 0, 3));

        let found = catalog.lookup(&Tuple::new(14, DOMAIN_D1, 255)).unwrap();
        assert_eq!(found.actions[0].p1(), 2);
        let found = catalog.lookup(&Tuple::new(14, DOMAIN_D0, 0)).unwrap();
        assert_eq!(found.actions[0].p1(), 3);
        assert_eq!(
            catalog.lookup(&Tuple::new(15, DOMAIN_D0, 255)),
            Err(EsifError::PrimitiveNotFound)
        );
    }

    #[test]
    fn test_first_duplicate_wins() {
        let mut catalog = Catalog::new(DspMetadata::default(), 31);
        catalog.insert(primitive(14, DOMAIN_D0, 255, 1));
        catalog.insert(primitive(14, DOMAIN_D0, 255, 2));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup(&Tuple::new(14, DOMAIN_D0, 255)).unwrap().actions[0].p1(), 1);
    }

    #[test]
    fn test_algorithms() {
        let image = DspImage::new(DspMetadata::new("dptf_cpu", 1, 2, 3))
            .algorithm(
                Algorithm::new(ActionType::Msr, TempXform::TjmaxCore, PowerXform::UnitCore)
                    .with_constants(0, 0),
            )
            .algorithm(Algorithm::new(ActionType::Iosf, TempXform::DtsAtom, PowerXform::None).with_constants(90, 0));
        let catalog = Catalog::build(image, 31).unwrap();

        assert!(catalog.has_algorithm(TempXform::DtsAtom));
        assert!(!catalog.has_algorithm(TempXform::Lpat));
        assert_eq!(catalog.temp_c1(ActionType::Iosf), 90);
        assert_eq!(catalog.temp_c2(ActionType::Acpi), CONSTANT_ABSENT);
        assert_eq!(catalog.metadata().code.as_str(), "dptf_cpu");

        let dup = DspImage::default()
            .algorithm(Algorithm::new(ActionType::Msr, TempXform::None, PowerXform::None))
            .algorithm(Algorithm::new(ActionType::Msr, TempXform::DeciK, PowerXform::None));
        assert_eq!(Catalog::build(dup, 31).err(), Some(EsifError::InvalidRequestType));
    }

    #[test]
    fn test_events_and_actions() {
        let image = DspImage::default()
            .primitive(primitive(14, DOMAIN_D0, 255, 7))
            .event(Event { notify_id: 0x80, event_id: 3 });
        let catalog = Catalog::build(image, 31).unwrap();

        assert_eq!(catalog.get_event(0x80).map(|e| e.event_id), Some(3));
        assert!(catalog.get_event(0x81).is_none());

        let prim = catalog.lookup(&Tuple::new(14, DOMAIN_D0, 255)).unwrap();
        assert_eq!(catalog.get_action(prim, 0).map(|a| a.p1()), Ok(7));
        assert_eq!(catalog.get_action(prim, 1).err(), Some(EsifError::PrimitiveNotFound));
    }
}
