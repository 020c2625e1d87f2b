//! Field definition within a PDX type.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::SchemaError;

/// Wire type of a PDX field.
///
/// The discriminant is the type code written in type definitions exchanged
/// with the servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum FieldType {
    Boolean = 0,
    Byte = 1,
    Char = 2,
    Short = 3,
    #[serde(alias = "int32")]
    Int = 4,
    #[serde(alias = "int64")]
    Long = 5,
    Float = 6,
    Double = 7,
    Date = 8,
    String = 9,
    Object = 10,
    BooleanArray = 11,
    CharArray = 12,
    ByteArray = 13,
    ShortArray = 14,
    IntArray = 15,
    LongArray = 16,
    FloatArray = 17,
    DoubleArray = 18,
    StringArray = 19,
    ObjectArray = 20,
    ArrayOfByteArrays = 21,
}

impl FieldType {
    /// Wire type code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a wire type code.
    pub fn from_code(code: u8) -> Result<Self, SchemaError> {
        use FieldType::*;
        let field_type = match code {
            0 => Boolean,
            1 => Byte,
            2 => Char,
            3 => Short,
            4 => Int,
            5 => Long,
            6 => Float,
            7 => Double,
            8 => Date,
            9 => String,
            10 => Object,
            11 => BooleanArray,
            12 => CharArray,
            13 => ByteArray,
            14 => ShortArray,
            15 => IntArray,
            16 => LongArray,
            17 => FloatArray,
            18 => DoubleArray,
            19 => StringArray,
            20 => ObjectArray,
            21 => ArrayOfByteArrays,
            other => return Err(SchemaError::UnknownTypeCode(other)),
        };
        Ok(field_type)
    }

    /// Encoded size in bytes for fixed-width types, `None` for variable-length ones.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            FieldType::Boolean | FieldType::Byte => Some(1),
            FieldType::Char | FieldType::Short => Some(2),
            FieldType::Int | FieldType::Float => Some(4),
            FieldType::Long | FieldType::Double | FieldType::Date => Some(8),
            _ => None,
        }
    }

    /// Returns `true` if values of this type have a fixed encoded width.
    pub fn is_fixed_size(self) -> bool {
        self.fixed_size().is_some()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Boolean => "boolean",
            FieldType::Byte => "byte",
            FieldType::Char => "char",
            FieldType::Short => "short",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Date => "date",
            FieldType::String => "string",
            FieldType::Object => "object",
            FieldType::BooleanArray => "boolean[]",
            FieldType::CharArray => "char[]",
            FieldType::ByteArray => "byte[]",
            FieldType::ShortArray => "short[]",
            FieldType::IntArray => "int[]",
            FieldType::LongArray => "long[]",
            FieldType::FloatArray => "float[]",
            FieldType::DoubleArray => "double[]",
            FieldType::StringArray => "string[]",
            FieldType::ObjectArray => "object[]",
            FieldType::ArrayOfByteArrays => "byte[][]",
        };
        f.write_str(name)
    }
}

/// Field definition within a PDX type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdxField {
    /// Field name
    pub name: String,
    /// Wire type
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Position of the field within its type (assigned by the owning type)
    #[serde(skip)]
    pub sequence_id: usize,
    /// Index among the variable-length fields, `None` for fixed-width fields
    #[serde(skip)]
    pub var_len_seq_id: Option<usize>,
}

impl PdxField {
    /// Creates a field. Sequence ids are assigned when the field is added to a type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            sequence_id: 0,
            var_len_seq_id: None,
        }
    }

    /// Returns `true` if the field is encoded with a fixed width.
    pub fn is_fixed_size(&self) -> bool {
        self.field_type.is_fixed_size()
    }

    /// Name and type match, position is ignored.
    pub fn same_shape(&self, other: &PdxField) -> bool {
        self.name == other.name && self.field_type == other.field_type
    }
}
