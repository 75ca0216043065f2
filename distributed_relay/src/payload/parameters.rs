//! Named parameter tensors integrated by replacement.

use super::{PayloadError, PayloadHolder, UpdateStrategy};
use crate::core::{Record, Schema, Tensor};

/// A fixed set of named tensors, e.g. the weights of a policy.
///
/// The field layout is frozen at construction; updates must match it exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    schema: Schema,
    values: Record,
}

impl ParameterSet {
    pub fn new(values: Record) -> Self {
        Self {
            schema: Schema::of_record(&values),
            values,
        }
    }

    /// Zero-filled parameters with the given layout.
    pub fn zeros(schema: &Schema) -> Self {
        let values = schema
            .fields()
            .iter()
            .map(|f| (f.name.clone(), Tensor::zeros(f.dtype, f.shape.clone())))
            .collect();
        Self {
            schema: schema.clone(),
            values,
        }
    }

    /// Select the update strategy. Parameter sets only support replacement.
    pub fn with_strategy(self, strategy: UpdateStrategy) -> Result<Self, PayloadError> {
        match strategy {
            UpdateStrategy::Replace => Ok(self),
            other => Err(PayloadError::UnsupportedStrategy {
                holder: "ParameterSet".to_string(),
                strategy: other,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.values.get(name)
    }

    /// Overwrite one field locally, keeping its dtype and shape.
    pub fn set(&mut self, name: &str, value: Tensor) -> Result<(), PayloadError> {
        let spec = self
            .schema
            .field(name)
            .ok_or_else(|| crate::core::SchemaError::UnexpectedField(name.to_string()))?;
        spec.check(&value)?;
        self.values.insert(name, value);
        Ok(())
    }

    pub fn values(&self) -> &Record {
        &self.values
    }
}

impl PayloadHolder for ParameterSet {
    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn snapshot(&self) -> Record {
        self.values.clone()
    }

    fn strategy(&self) -> UpdateStrategy {
        UpdateStrategy::Replace
    }

    fn replace_fields(&mut self, record: Record) -> Result<(), PayloadError> {
        self.values = record;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaError;

    fn params(v: f32) -> ParameterSet {
        ParameterSet::new(
            Record::new()
                .with("v", Tensor::scalar_f32(v))
                .with("w", Tensor::from_f32([2], vec![v, v]).unwrap()),
        )
    }

    #[test]
    fn test_replace_overwrites_every_field() {
        let mut local = params(0.0);
        local.apply_update(params(1.0).snapshot()).unwrap();
        assert_eq!(local.get("v").unwrap().as_f32().unwrap(), &[1.0]);
        assert_eq!(local.get("w").unwrap().as_f32().unwrap(), &[1.0, 1.0]);
    }

    #[test]
    fn test_replace_rejects_partial_update() {
        let mut local = params(0.0);
        let partial = Record::new().with("v", Tensor::scalar_f32(3.0));
        assert_eq!(
            local.apply_update(partial),
            Err(PayloadError::Schema(SchemaError::MissingField("w".into())))
        );
        assert_eq!(local, params(0.0));
    }

    #[test]
    fn test_scatter_strategy_unsupported() {
        assert!(matches!(
            params(0.0).with_strategy(UpdateStrategy::ScatterMerge),
            Err(PayloadError::UnsupportedStrategy { .. })
        ));
        assert!(params(0.0).with_strategy(UpdateStrategy::Replace).is_ok());
    }

    #[test]
    fn test_set_checks_layout() {
        let mut p = params(0.0);
        p.set("v", Tensor::scalar_f32(2.0)).unwrap();
        assert_eq!(p.get("v").unwrap().as_f32().unwrap(), &[2.0]);
        assert!(p.set("w", Tensor::scalar_f32(2.0)).is_err());
        assert!(p.set("z", Tensor::scalar_f32(2.0)).is_err());
    }

    #[test]
    fn test_zeros_matches_schema() {
        let schema = params(1.0).schema();
        let zeros = ParameterSet::zeros(&schema);
        assert_eq!(zeros.schema(), schema);
        assert_eq!(zeros.get("w").unwrap().as_f32().unwrap(), &[0.0, 0.0]);
        assert!(schema.validate(zeros.values()).is_ok());
    }
}
