//! Schema descriptors: field types, PDX types and enum descriptors.

mod enum_info;
mod error;
mod field;
mod pdx_type;

pub use enum_info::EnumInfo;
pub use error::SchemaError;
pub use field::{FieldType, PdxField};
pub use pdx_type::{PdxType, PdxTypeBuilder, SchemaOrigin};
