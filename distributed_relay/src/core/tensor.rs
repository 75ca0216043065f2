//! Dense row-major tensors carried inside records.
//!
//! Tensors are plain host data, so they are `Send + Sync` and can cross any
//! channel boundary without touching the state that produced them. The
//! leading dimension doubles as the row axis for stores that scatter and
//! gather whole rows.
//!
//! ```text
//! shape [capacity, 3]          gather_rows(&[2, 0])       shape [2, 3]
//! ┌──────────────┐             ─────────────────────►     ┌──────────────┐
//! │ row 0        │                                        │ row 2        │
//! │ row 1        │                                        │ row 0        │
//! │ row 2        │                                        └──────────────┘
//! └──────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::schema::SchemaError;

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
    U8,
    Bool,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Typed flat storage behind a [`Tensor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum Buffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    Bool(Vec<bool>),
}

/// Apply a dtype-generic expression to every variant, rebuilding the same variant.
macro_rules! map_buffer {
    ($buffer:expr, $values:ident => $body:expr) => {
        match $buffer {
            Buffer::F32($values) => Buffer::F32($body),
            Buffer::F64($values) => Buffer::F64($body),
            Buffer::I32($values) => Buffer::I32($body),
            Buffer::I64($values) => Buffer::I64($body),
            Buffer::U8($values) => Buffer::U8($body),
            Buffer::Bool($values) => Buffer::Bool($body),
        }
    };
}

impl Buffer {
    /// Zero-filled buffer of `len` elements.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => Buffer::F32(vec![0.0; len]),
            DType::F64 => Buffer::F64(vec![0.0; len]),
            DType::I32 => Buffer::I32(vec![0; len]),
            DType::I64 => Buffer::I64(vec![0; len]),
            DType::U8 => Buffer::U8(vec![0; len]),
            DType::Bool => Buffer::Bool(vec![false; len]),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Buffer::F32(_) => DType::F32,
            Buffer::F64(_) => DType::F64,
            Buffer::I32(_) => DType::I32,
            Buffer::I64(_) => DType::I64,
            Buffer::U8(_) => DType::U8,
            Buffer::Bool(_) => DType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::F32(v) => v.len(),
            Buffer::F64(v) => v.len(),
            Buffer::I32(v) => v.len(),
            Buffer::I64(v) => v.len(),
            Buffer::U8(v) => v.len(),
            Buffer::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn gather<T: Copy>(values: &[T], row_len: usize, indices: &[usize]) -> Vec<T> {
    let mut out = Vec::with_capacity(indices.len() * row_len);
    for &i in indices {
        out.extend_from_slice(&values[i * row_len..(i + 1) * row_len]);
    }
    out
}

fn scatter<T: Copy>(dst: &mut [T], row_len: usize, indices: &[usize], src: &[T]) {
    for (k, &i) in indices.iter().enumerate() {
        dst[i * row_len..(i + 1) * row_len].copy_from_slice(&src[k * row_len..(k + 1) * row_len]);
    }
}

/// Dense row-major array with a fixed shape and dtype.
///
/// Deserialization goes through [`Tensor::new`], so a decoded tensor always
/// holds exactly `product(shape)` elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor", into = "RawTensor")]
pub struct Tensor {
    shape: Vec<usize>,
    data: Buffer,
}

/// Wire form of a [`Tensor`], before the element count is checked.
#[derive(Serialize, Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: Buffer,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = SchemaError;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        Tensor::new(raw.shape, raw.data)
    }
}

impl From<Tensor> for RawTensor {
    fn from(tensor: Tensor) -> Self {
        RawTensor {
            shape: tensor.shape,
            data: tensor.data,
        }
    }
}

impl Tensor {
    /// Build a tensor, checking that `data` holds exactly `product(shape)` elements.
    pub fn new(shape: impl Into<Vec<usize>>, data: Buffer) -> Result<Self, SchemaError> {
        let shape = shape.into();
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(SchemaError::ElementCount {
                expected,
                found: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn from_f32(shape: impl Into<Vec<usize>>, values: Vec<f32>) -> Result<Self, SchemaError> {
        Self::new(shape, Buffer::F32(values))
    }

    pub fn from_f64(shape: impl Into<Vec<usize>>, values: Vec<f64>) -> Result<Self, SchemaError> {
        Self::new(shape, Buffer::F64(values))
    }

    pub fn from_i32(shape: impl Into<Vec<usize>>, values: Vec<i32>) -> Result<Self, SchemaError> {
        Self::new(shape, Buffer::I32(values))
    }

    pub fn from_i64(shape: impl Into<Vec<usize>>, values: Vec<i64>) -> Result<Self, SchemaError> {
        Self::new(shape, Buffer::I64(values))
    }

    pub fn from_u8(shape: impl Into<Vec<usize>>, values: Vec<u8>) -> Result<Self, SchemaError> {
        Self::new(shape, Buffer::U8(values))
    }

    pub fn from_bool(shape: impl Into<Vec<usize>>, values: Vec<bool>) -> Result<Self, SchemaError> {
        Self::new(shape, Buffer::Bool(values))
    }

    /// Rank-0 `f32` tensor.
    pub fn scalar_f32(value: f32) -> Self {
        Self {
            shape: Vec::new(),
            data: Buffer::F32(vec![value]),
        }
    }

    /// Zero-filled tensor.
    pub fn zeros(dtype: DType, shape: impl Into<Vec<usize>>) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: Buffer::zeros(dtype, len),
        }
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &Buffer {
        &self.data
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            Buffer::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            Buffer::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            Buffer::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.data {
            Buffer::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.data {
            Buffer::U8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match &self.data {
            Buffer::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Number of rows along the leading dimension, `None` for rank-0 tensors.
    pub fn rows(&self) -> Option<usize> {
        self.shape.first().copied()
    }

    /// Shape of a single row (everything after the leading dimension).
    pub fn row_shape(&self) -> &[usize] {
        self.shape.get(1..).unwrap_or(&[])
    }

    fn row_len(&self) -> usize {
        self.row_shape().iter().product()
    }

    fn check_indices(&self, indices: &[usize]) -> Result<usize, SchemaError> {
        let rows = self.rows().ok_or_else(|| SchemaError::NotBatched {
            shape: self.shape.clone(),
        })?;
        if let Some(&index) = indices.iter().find(|&&i| i >= rows) {
            return Err(SchemaError::RowOutOfRange { index, rows });
        }
        Ok(rows)
    }

    /// Copy out a single row.
    pub fn row(&self, index: usize) -> Result<Tensor, SchemaError> {
        self.check_indices(&[index])?;
        let row_len = self.row_len();
        Ok(Tensor {
            shape: self.row_shape().to_vec(),
            data: map_buffer!(&self.data, v => gather(v, row_len, &[index])),
        })
    }

    /// Gather rows by index; the result has leading dimension `indices.len()`.
    pub fn gather_rows(&self, indices: &[usize]) -> Result<Tensor, SchemaError> {
        self.check_indices(indices)?;
        let row_len = self.row_len();
        let mut shape = Vec::with_capacity(self.shape.len());
        shape.push(indices.len());
        shape.extend_from_slice(self.row_shape());
        Ok(Tensor {
            shape,
            data: map_buffer!(&self.data, v => gather(v, row_len, indices)),
        })
    }

    /// Overwrite the rows at `indices` with the rows of `rows`.
    ///
    /// `rows` is either shaped `[indices.len(), ..row_shape]`, or, when a single
    /// index is given, exactly `row_shape`.
    pub fn scatter_rows(&mut self, indices: &[usize], rows: &Tensor) -> Result<(), SchemaError> {
        self.check_indices(indices)?;
        if rows.dtype() != self.dtype() {
            return Err(SchemaError::RowDType {
                expected: self.dtype(),
                found: rows.dtype(),
            });
        }

        let single = indices.len() == 1 && rows.shape() == self.row_shape();
        let batched =
            rows.rows() == Some(indices.len()) && rows.row_shape() == self.row_shape();
        if !single && !batched {
            let mut expected = vec![indices.len()];
            expected.extend_from_slice(self.row_shape());
            return Err(SchemaError::RowShape {
                expected,
                found: rows.shape.clone(),
            });
        }

        let row_len = self.row_len();
        match (&mut self.data, &rows.data) {
            (Buffer::F32(dst), Buffer::F32(src)) => scatter(dst, row_len, indices, src),
            (Buffer::F64(dst), Buffer::F64(src)) => scatter(dst, row_len, indices, src),
            (Buffer::I32(dst), Buffer::I32(src)) => scatter(dst, row_len, indices, src),
            (Buffer::I64(dst), Buffer::I64(src)) => scatter(dst, row_len, indices, src),
            (Buffer::U8(dst), Buffer::U8(src)) => scatter(dst, row_len, indices, src),
            (Buffer::Bool(dst), Buffer::Bool(src)) => scatter(dst, row_len, indices, src),
            (dst, src) => {
                return Err(SchemaError::RowDType {
                    expected: dst.dtype(),
                    found: src.dtype(),
                })
            }
        }
        Ok(())
    }
}
