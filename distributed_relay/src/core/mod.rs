//! Core value types shared by every layer of the fabric.

pub mod cancel;
pub mod record;
pub mod schema;
pub mod tensor;

pub use cancel::CancelToken;
pub use record::Record;
pub use schema::{FieldSpec, Schema, SchemaError};
pub use tensor::{Buffer, DType, Tensor};
