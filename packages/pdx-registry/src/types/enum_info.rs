use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one enum constant as exchanged with the servers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumInfo {
    /// Fully qualified enum class name
    pub enum_class_name: String,
    /// Constant name
    pub enum_name: String,
    /// Declaration ordinal
    pub ordinal: i32,
}

impl EnumInfo {
    pub fn new(enum_class_name: impl Into<String>, enum_name: impl Into<String>, ordinal: i32) -> Self {
        Self {
            enum_class_name: enum_class_name.into(),
            enum_name: enum_name.into(),
            ordinal,
        }
    }
}

impl fmt::Display for EnumInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.enum_class_name, self.enum_name)
    }
}
