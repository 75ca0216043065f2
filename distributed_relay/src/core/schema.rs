//! Record schemas: the field name → (dtype, shape) contract shared by every
//! endpoint of a channel.
//!
//! Schemas are agreed out-of-band at construction time. There is no runtime
//! negotiation, so any mismatch is reported as a [`SchemaError`] at the call
//! site that attempted the enqueue or update.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::record::Record;
use super::tensor::{DType, Tensor};

/// Errors raised when data does not match the agreed layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("field `{0}` is missing from the record")]
    MissingField(String),

    #[error("field `{0}` is not part of the schema")]
    UnexpectedField(String),

    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),

    #[error("field `{field}`: expected dtype {expected}, found {found}")]
    DTypeMismatch {
        field: String,
        expected: DType,
        found: DType,
    },

    #[error("field `{field}`: expected shape {expected:?}, found {found:?}")]
    ShapeMismatch {
        field: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("field `{field}`: batch dimension {found} does not match {expected}")]
    BatchMismatch {
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("batch must contain at least one row")]
    EmptyBatch,

    #[error("tensor data holds {found} elements, shape requires {expected}")]
    ElementCount { expected: usize, found: usize },

    #[error("row {index} out of range for {rows} rows")]
    RowOutOfRange { index: usize, rows: usize },

    #[error("rows have dtype {found}, storage has {expected}")]
    RowDType { expected: DType, found: DType },

    #[error("rows have shape {found:?}, expected {expected:?}")]
    RowShape {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("tensor of shape {shape:?} has no row dimension")]
    NotBatched { shape: Vec<usize> },
}

/// Layout of one named field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub dtype: DType,
    pub shape: Vec<usize>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, dtype: DType, shape: impl Into<Vec<usize>>) -> Self {
        Self {
            name: name.into(),
            dtype,
            shape: shape.into(),
        }
    }

    /// Shorthand for an `f32` field.
    pub fn f32(name: impl Into<String>, shape: impl Into<Vec<usize>>) -> Self {
        Self::new(name, DType::F32, shape)
    }

    /// Check a tensor against this field exactly.
    pub fn check(&self, tensor: &Tensor) -> Result<(), SchemaError> {
        if tensor.dtype() != self.dtype {
            return Err(SchemaError::DTypeMismatch {
                field: self.name.clone(),
                expected: self.dtype,
                found: tensor.dtype(),
            });
        }
        if tensor.shape() != self.shape.as_slice() {
            return Err(SchemaError::ShapeMismatch {
                field: self.name.clone(),
                expected: self.shape.clone(),
                found: tensor.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Number of rows `tensor` carries for this field: 1 if it is a single row,
    /// `B` if it is shaped `[B, ..shape]`.
    fn rows_in(&self, tensor: &Tensor) -> Result<usize, SchemaError> {
        if tensor.dtype() != self.dtype {
            return Err(SchemaError::DTypeMismatch {
                field: self.name.clone(),
                expected: self.dtype,
                found: tensor.dtype(),
            });
        }
        if tensor.shape() == self.shape.as_slice() {
            return Ok(1);
        }
        if tensor.shape().len() == self.shape.len() + 1 && tensor.row_shape() == self.shape.as_slice()
        {
            return Ok(tensor.shape()[0]);
        }
        Err(SchemaError::ShapeMismatch {
            field: self.name.clone(),
            expected: self.shape.clone(),
            found: tensor.shape().to_vec(),
        })
    }
}

/// Ordered set of uniquely named fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldSpec>", into = "Vec<FieldSpec>")]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// Derive the schema that describes `record` exactly.
    pub fn of_record(record: &Record) -> Self {
        Self {
            fields: record
                .iter()
                .map(|(name, t)| FieldSpec::new(name.clone(), t.dtype(), t.shape().to_vec()))
                .collect(),
        }
    }

    /// Append a field.
    pub fn with_field(mut self, field: FieldSpec) -> Result<Self, SchemaError> {
        if self.field(&field.name).is_some() {
            return Err(SchemaError::DuplicateField(field.name));
        }
        self.fields.push(field);
        Ok(self)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Same fields with a leading batch dimension of `n` rows.
    pub fn batched(&self, n: usize) -> Schema {
        Schema {
            fields: self
                .fields
                .iter()
                .map(|f| {
                    let mut shape = Vec::with_capacity(f.shape.len() + 1);
                    shape.push(n);
                    shape.extend_from_slice(&f.shape);
                    FieldSpec::new(f.name.clone(), f.dtype, shape)
                })
                .collect(),
        }
    }

    fn check_field_set(&self, record: &Record) -> Result<(), SchemaError> {
        if let Some(extra) = record.names().find(|name| self.field(name).is_none()) {
            return Err(SchemaError::UnexpectedField(extra.to_string()));
        }
        Ok(())
    }

    /// Require `record` to carry exactly these fields with these dtypes and shapes.
    pub fn validate(&self, record: &Record) -> Result<(), SchemaError> {
        self.check_field_set(record)?;
        for field in &self.fields {
            let tensor = record
                .get(&field.name)
                .ok_or_else(|| SchemaError::MissingField(field.name.clone()))?;
            field.check(tensor)?;
        }
        Ok(())
    }

    /// Treat this schema as a per-row layout and count the rows in `record`.
    ///
    /// Every field must be either a single row or a `[B, ..]` batch, with the
    /// same `B > 0` across fields.
    pub fn batch_of(&self, record: &Record) -> Result<usize, SchemaError> {
        self.check_field_set(record)?;
        let mut batch: Option<usize> = None;
        for field in &self.fields {
            let tensor = record
                .get(&field.name)
                .ok_or_else(|| SchemaError::MissingField(field.name.clone()))?;
            let rows = field.rows_in(tensor)?;
            match batch {
                None => batch = Some(rows),
                Some(expected) if expected != rows => {
                    return Err(SchemaError::BatchMismatch {
                        field: field.name.clone(),
                        expected,
                        found: rows,
                    })
                }
                Some(_) => {}
            }
        }
        match batch {
            Some(0) | None => Err(SchemaError::EmptyBatch),
            Some(rows) => Ok(rows),
        }
    }
}

impl TryFrom<Vec<FieldSpec>> for Schema {
    type Error = SchemaError;

    fn try_from(fields: Vec<FieldSpec>) -> Result<Self, Self::Error> {
        Schema::new(fields)
    }
}

impl From<Schema> for Vec<FieldSpec> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}
