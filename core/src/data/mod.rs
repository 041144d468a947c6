//! # Data Model
//!
//! Typed buffers ([`EsifData`]), the variant wire format used for flattened
//! array responses, and the fixed-layout ACPI argument structures.

pub mod complex;
pub mod esif_data;
pub mod types;
pub mod variant;

pub use complex::{OscRequest, ScpRequest, TableHeader, TABLE_NO_REVISION};
pub use esif_data::EsifData;
pub use types::DataType;
pub use variant::{Variant, VariantIter, VariantWriter, VARIANT_HEADER_LEN};
