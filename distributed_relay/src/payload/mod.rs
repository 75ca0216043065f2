//! Payload holders: the local state a relay module wraps.
//!
//! A holder exposes its fields (for default pushes and schema derivation) and
//! integrates incoming records with one of two strategies:
//!
//! - **Replace**: every named field is overwritten by the incoming value
//!   (parameter broadcast).
//! - **Scatter-merge**: each incoming logical row overwrites exactly one
//!   storage row at an index the holder chooses itself (experience insertion).
//!
//! State never crosses a role boundary by reference. All mutation from another
//! role arrives as an owned [`Record`] through [`PayloadHolder::apply_update`].

mod parameters;

pub use parameters::ParameterSet;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::core::{Record, Schema, SchemaError};

/// How a holder integrates an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    Replace,
    ScatterMerge,
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStrategy::Replace => f.write_str("replace"),
            UpdateStrategy::ScatterMerge => f.write_str("scatter_merge"),
        }
    }
}

impl FromStr for UpdateStrategy {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" | "assign" => Ok(UpdateStrategy::Replace),
            "scatter" | "scatter_merge" => Ok(UpdateStrategy::ScatterMerge),
            other => Err(PayloadError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Errors raised while integrating records into a holder.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("unknown update strategy `{0}`")]
    UnknownStrategy(String),

    #[error("{holder} does not support the {strategy} update strategy")]
    UnsupportedStrategy {
        holder: String,
        strategy: UpdateStrategy,
    },

    #[error("update does not match the holder layout: {0}")]
    Schema(#[from] SchemaError),

    #[error("store capacity must be at least 1")]
    ZeroCapacity,

    #[error("batch size must be at least 1")]
    ZeroBatchSize,
}

fn unsupported<H: ?Sized>(strategy: UpdateStrategy) -> PayloadError {
    PayloadError::UnsupportedStrategy {
        holder: std::any::type_name::<H>().to_string(),
        strategy,
    }
}

/// Capability interface for state wrapped by a relay module.
///
/// Implementors pick one [`UpdateStrategy`] and override the hooks it needs;
/// the default hooks report the strategy as unsupported.
pub trait PayloadHolder: Send {
    /// Ordered view of the holder's fields.
    ///
    /// For scatter-merge holders this is the layout of a single row.
    fn schema(&self) -> Schema;

    /// Current field values, used as the payload of a push without data.
    fn snapshot(&self) -> Record;

    fn strategy(&self) -> UpdateStrategy;

    /// Overwrite every field with the values in `record`.
    fn replace_fields(&mut self, _record: Record) -> Result<(), PayloadError> {
        Err(unsupported::<Self>(UpdateStrategy::Replace))
    }

    /// Storage row the next incoming row should overwrite.
    fn choose_eviction_index(&mut self) -> Result<usize, PayloadError> {
        Err(unsupported::<Self>(UpdateStrategy::ScatterMerge))
    }

    /// Write row `k` of `record` at `indices[k]` for every field.
    fn scatter_rows(&mut self, _indices: &[usize], _record: &Record) -> Result<(), PayloadError> {
        Err(unsupported::<Self>(UpdateStrategy::ScatterMerge))
    }

    /// Integrate `record` using the holder's strategy.
    fn apply_update(&mut self, record: Record) -> Result<(), PayloadError> {
        match self.strategy() {
            UpdateStrategy::Replace => {
                self.schema().validate(&record)?;
                self.replace_fields(record)
            }
            UpdateStrategy::ScatterMerge => scatter_merge(self, &record).map(|_| ()),
        }
    }
}

/// Fold `record` into `holder` one row at a time.
///
/// `record` is either a single row or a `[B, ..]` batch; exactly one eviction
/// index is drawn per row, never one shared by the whole batch. Returns the
/// number of rows written.
pub fn scatter_merge<H: PayloadHolder + ?Sized>(
    holder: &mut H,
    record: &Record,
) -> Result<usize, PayloadError> {
    let rows = holder.schema().batch_of(record)?;
    let indices = (0..rows)
        .map(|_| holder.choose_eviction_index())
        .collect::<Result<Vec<_>, _>>()?;
    holder.scatter_rows(&indices, record)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldSpec, Tensor};

    /// Holder that only declares a strategy and relies on the default hooks.
    struct Bare(UpdateStrategy);

    impl PayloadHolder for Bare {
        fn schema(&self) -> Schema {
            Schema::new(vec![FieldSpec::f32("x", [])]).unwrap()
        }

        fn snapshot(&self) -> Record {
            Record::new().with("x", Tensor::scalar_f32(0.0))
        }

        fn strategy(&self) -> UpdateStrategy {
            self.0
        }
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("replace".parse::<UpdateStrategy>(), Ok(UpdateStrategy::Replace));
        assert_eq!("scatter".parse::<UpdateStrategy>(), Ok(UpdateStrategy::ScatterMerge));
        assert_eq!(
            "gather".parse::<UpdateStrategy>(),
            Err(PayloadError::UnknownStrategy("gather".into()))
        );
    }

    #[test]
    fn test_default_hooks_are_unsupported() {
        let update = Record::new().with("x", Tensor::scalar_f32(1.0));

        let mut replace = Bare(UpdateStrategy::Replace);
        assert!(matches!(
            replace.apply_update(update.clone()),
            Err(PayloadError::UnsupportedStrategy { strategy: UpdateStrategy::Replace, .. })
        ));

        let mut scatter = Bare(UpdateStrategy::ScatterMerge);
        assert!(matches!(
            scatter.apply_update(update),
            Err(PayloadError::UnsupportedStrategy { strategy: UpdateStrategy::ScatterMerge, .. })
        ));
    }

    #[test]
    fn test_replace_validates_before_hook() {
        let mut holder = Bare(UpdateStrategy::Replace);
        let bad = Record::new().with("y", Tensor::scalar_f32(1.0));
        assert!(matches!(holder.apply_update(bad), Err(PayloadError::Schema(_))));
    }
}
