//! PDX type descriptor and schema merging.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::error::SchemaError;
use super::field::{FieldType, PdxField};

/// Where a descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaOrigin {
    /// Built from a locally compiled type
    #[default]
    Local,
    /// Received from a server
    Remote,
    /// Union of a remote and a local descriptor of the same class
    Merged,
}

/// Layout of one PDX type: class name plus ordered fields.
///
/// Equality and hashing consider only the class name and the ordered
/// `(name, type)` pairs. The type id and origin are not part of a schema's
/// identity, so a descriptor still compares equal to itself after an id has
/// been assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PdxTypeRepr")]
pub struct PdxType {
    type_id: i32,
    class_name: String,
    fields: Vec<PdxField>,
    origin: SchemaOrigin,
}

/// Unvalidated serialized form.
#[derive(Deserialize)]
struct PdxTypeRepr {
    #[serde(default)]
    type_id: i32,
    class_name: String,
    fields: Vec<PdxField>,
    #[serde(default)]
    origin: SchemaOrigin,
}

impl TryFrom<PdxTypeRepr> for PdxType {
    type Error = SchemaError;

    fn try_from(repr: PdxTypeRepr) -> Result<Self, Self::Error> {
        let mut pdx_type = PdxType::from_fields(repr.class_name, repr.fields, repr.origin)?;
        pdx_type.type_id = repr.type_id;
        Ok(pdx_type)
    }
}

impl PdxType {
    /// Starts building a local type.
    pub fn builder(class_name: impl Into<String>) -> PdxTypeBuilder {
        PdxTypeBuilder {
            class_name: class_name.into(),
            origin: SchemaOrigin::Local,
            fields: Vec::new(),
        }
    }

    /// Creates an unassigned descriptor (type id 0) from ordered fields.
    ///
    /// Sequence ids are reassigned from field order.
    pub fn from_fields(
        class_name: impl Into<String>,
        fields: Vec<PdxField>,
        origin: SchemaOrigin,
    ) -> Result<Self, SchemaError> {
        let class_name = class_name.into();
        if class_name.is_empty() {
            return Err(SchemaError::EmptyClassName);
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    class_name,
                    field: field.name.clone(),
                });
            }
        }

        let mut pdx_type = Self {
            type_id: 0,
            class_name,
            fields,
            origin,
        };
        pdx_type.reindex();
        Ok(pdx_type)
    }

    fn reindex(&mut self) {
        let mut var_len = 0;
        for (i, field) in self.fields.iter_mut().enumerate() {
            field.sequence_id = i;
            field.var_len_seq_id = if field.is_fixed_size() {
                None
            } else {
                var_len += 1;
                Some(var_len - 1)
            };
        }
    }

    /// Assigned type id, 0 if none has been negotiated yet.
    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    /// Fully qualified class name.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Fields in wire order.
    pub fn fields(&self) -> &[PdxField] {
        &self.fields
    }

    pub fn origin(&self) -> SchemaOrigin {
        self.origin
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&PdxField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of variable-length fields (each needs an offset slot on the wire).
    pub fn variable_len_field_count(&self) -> usize {
        self.fields.iter().filter(|f| !f.is_fixed_size()).count()
    }

    /// Sum of the widths of all fixed-size fields.
    pub fn fixed_size_total(&self) -> usize {
        self.fields
            .iter()
            .filter_map(|f| f.field_type.fixed_size())
            .sum()
    }

    /// Returns a copy carrying `type_id`.
    ///
    /// # Returns
    /// `Err(SchemaError::TypeIdReassigned)` if this descriptor already carries
    /// a different non-zero id.
    pub fn with_type_id(&self, type_id: i32) -> Result<Self, SchemaError> {
        if self.type_id != 0 && self.type_id != type_id {
            return Err(SchemaError::TypeIdReassigned {
                class_name: self.class_name.clone(),
                current: self.type_id,
                requested: type_id,
            });
        }
        let mut assigned = self.clone();
        assigned.type_id = type_id;
        Ok(assigned)
    }

    /// Returns a copy tagged with `origin`.
    pub fn with_origin(mut self, origin: SchemaOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Returns `true` if both types declare the same set of `(name, type)`
    /// pairs, regardless of order.
    pub fn has_same_fields(&self, other: &PdxType) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|f| other.field(&f.name).is_some_and(|o| o.same_shape(f)))
    }

    /// Fields of `self` that `local` does not declare.
    pub fn fields_missing_from<'a>(&'a self, local: &PdxType) -> Vec<&'a PdxField> {
        self.fields
            .iter()
            .filter(|f| local.field(&f.name).is_none())
            .collect()
    }

    /// Merges a local and a remote descriptor of the same class.
    ///
    /// The merged layout keeps the remote field order and appends local-only
    /// fields. When the result has exactly the remote's fields it inherits the
    /// remote type id; otherwise it is unassigned and needs its own id before
    /// being written.
    ///
    /// # Returns
    /// `Ok(None)` if both declare the same fields, `Ok(Some(merged))` otherwise.
    pub fn merge(local: &PdxType, remote: &PdxType) -> Result<Option<PdxType>, SchemaError> {
        if local.class_name != remote.class_name {
            return Err(SchemaError::ClassNameMismatch {
                local: local.class_name.clone(),
                remote: remote.class_name.clone(),
            });
        }

        for field in &local.fields {
            if let Some(remote_field) = remote.field(&field.name) {
                if remote_field.field_type != field.field_type {
                    return Err(SchemaError::FieldTypeConflict {
                        class_name: local.class_name.clone(),
                        field: field.name.clone(),
                        local: field.field_type.to_string(),
                        remote: remote_field.field_type.to_string(),
                    });
                }
            }
        }

        if local.has_same_fields(remote) {
            return Ok(None);
        }

        let mut fields = remote.fields.clone();
        let local_only: Vec<PdxField> = local.fields_missing_from(remote).into_iter().cloned().collect();
        let widened = !local_only.is_empty();
        fields.extend(local_only);

        let mut merged = PdxType::from_fields(remote.class_name.clone(), fields, SchemaOrigin::Merged)?;
        if !widened {
            merged.type_id = remote.type_id;
        }
        Ok(Some(merged))
    }
}

impl PartialEq for PdxType {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.same_shape(b))
    }
}

impl Eq for PdxType {}

impl Hash for PdxType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class_name.hash(state);
        self.fields.len().hash(state);
        for field in &self.fields {
            field.name.hash(state);
            field.field_type.hash(state);
        }
    }
}

/// Incremental constructor for [`PdxType`].
#[derive(Debug, Clone)]
pub struct PdxTypeBuilder {
    class_name: String,
    origin: SchemaOrigin,
    fields: Vec<PdxField>,
}

impl PdxTypeBuilder {
    /// Appends a field.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(PdxField::new(name, field_type));
        self
    }

    pub fn origin(mut self, origin: SchemaOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn build(self) -> Result<PdxType, SchemaError> {
        PdxType::from_fields(self.class_name, self.fields, self.origin)
    }
}
