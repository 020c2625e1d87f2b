/// Error type for schema construction, validation and merging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("PDX type has an empty class name")]
    EmptyClassName,

    #[error("Field '{field}' declared twice in '{class_name}'")]
    DuplicateField { class_name: String, field: String },

    #[error("Field '{field}' of '{class_name}' is {local} locally but {remote} remotely")]
    FieldTypeConflict {
        class_name: String,
        field: String,
        local: String,
        remote: String,
    },

    #[error("Cannot merge '{local}' with '{remote}': class names differ")]
    ClassNameMismatch { local: String, remote: String },

    #[error("Type '{class_name}' already has id {current}, refusing to reassign {requested}")]
    TypeIdReassigned {
        class_name: String,
        current: i32,
        requested: i32,
    },

    #[error("Remote type '{class_name}' arrived without a type id")]
    UnassignedTypeId { class_name: String },

    #[error("Unknown field type code {0}")]
    UnknownTypeCode(u8),
}
