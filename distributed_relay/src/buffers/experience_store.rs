//! Fixed-capacity experience store with random-replacement eviction.
//!
//! Key characteristics:
//! - Column storage: one `[capacity, ..row_shape]` tensor per field
//! - Sequential fill: the first `capacity` rows land in slots `0, 1, ..`
//! - Random replacement once full: each new row overwrites a uniformly random
//!   slot (not FIFO, not LRU)
//! - Uniform sampling with replacement from the filled prefix `[0, len)`
//! - Explicit empty state: [`ExperienceStore::clear`] forgets the contents
//!   without reallocating
//!
//! # Data Flow
//!
//! ```text
//! pushed rows ──► choose_eviction_index() ──► scatter into columns
//!                                                   │
//!                               sample_n(n) ◄───────┘ gather n random rows
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{FieldSpec, Record, Schema, SchemaError, Tensor};
use crate::payload::{scatter_merge, PayloadError, PayloadHolder, UpdateStrategy};

/// Configuration for an experience store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceStoreConfig {
    /// Number of rows kept.
    pub capacity: usize,
    /// Layout of a single row.
    pub fields: Schema,
    /// Seed for eviction and sampling; `None` draws a random seed.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ExperienceStoreConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            fields: Schema::default(),
            seed: None,
        }
    }
}

impl ExperienceStoreConfig {
    /// Create a config for `capacity` rows of the given layout.
    pub fn new(capacity: usize, fields: Schema) -> Self {
        Self {
            capacity,
            fields,
            seed: None,
        }
    }

    /// Builder pattern: set capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builder pattern: add a row field.
    pub fn with_field(mut self, field: FieldSpec) -> Result<Self, SchemaError> {
        self.fields = self.fields.with_field(field)?;
        Ok(self)
    }

    /// Builder pattern: fix the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Fill state. `Empty` is distinct from any size so `clear` is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    Empty,
    Rows(usize),
}

/// Fixed-capacity tabular store of experience rows.
///
/// Owned exclusively by the process hosting it. Other roles reach it only
/// through channels, by pushing rows (scatter-merge) or receiving samples.
#[derive(Debug)]
pub struct ExperienceStore {
    row_schema: Schema,
    capacity: usize,
    fill: Fill,
    columns: BTreeMap<String, Tensor>,
    rng: fastrand::Rng,
}

impl ExperienceStore {
    /// Create an empty store with `capacity` rows of `row_schema`.
    pub fn new(row_schema: Schema, capacity: usize) -> Result<Self, PayloadError> {
        if capacity == 0 {
            return Err(PayloadError::ZeroCapacity);
        }
        let columns = row_schema
            .fields()
            .iter()
            .map(|field| {
                let mut shape = Vec::with_capacity(field.shape.len() + 1);
                shape.push(capacity);
                shape.extend_from_slice(&field.shape);
                (field.name.clone(), Tensor::zeros(field.dtype, shape))
            })
            .collect();
        Ok(Self {
            row_schema,
            capacity,
            fill: Fill::Empty,
            columns,
            rng: fastrand::Rng::new(),
        })
    }

    pub fn from_config(config: &ExperienceStoreConfig) -> Result<Self, PayloadError> {
        let store = Self::new(config.fields.clone(), config.capacity)?;
        Ok(match config.seed {
            Some(seed) => store.with_seed(seed),
            None => store,
        })
    }

    /// Reseed the eviction and sampling generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of filled rows; 0 when empty.
    pub fn len(&self) -> usize {
        match self.fill {
            Fill::Empty => 0,
            Fill::Rows(n) => n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fill == Fill::Empty
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Get buffer utilization as fraction (0.0 to 1.0).
    pub fn utilization(&self) -> f32 {
        self.len() as f32 / self.capacity as f32
    }

    /// Layout of a single row.
    pub fn row_schema(&self) -> &Schema {
        &self.row_schema
    }

    /// Raw `[capacity, ..]` column for `field`, including unfilled slots.
    pub fn column(&self, field: &str) -> Option<&Tensor> {
        self.columns.get(field)
    }

    /// Forget all rows. Storage is kept and later overwritten from slot 0.
    pub fn clear(&mut self) {
        self.fill = Fill::Empty;
    }

    /// Slot for the next incoming row.
    ///
    /// Sequential while filling, uniformly random over `[0, capacity)` once
    /// full.
    fn next_index(&mut self) -> usize {
        let len = self.len();
        if len < self.capacity {
            self.fill = Fill::Rows(len + 1);
            len
        } else {
            self.rng.usize(0..self.capacity)
        }
    }

    /// Insert a batch of rows.
    ///
    /// Every field must be shaped `[B, ..row_shape]` with the same `B > 0`.
    /// One eviction index is drawn per row. Returns `B`.
    pub fn add(&mut self, batch: &Record) -> Result<usize, PayloadError> {
        for field in self.row_schema.fields() {
            if let Some(tensor) = batch.get(&field.name) {
                if tensor.shape().len() != field.shape.len() + 1 {
                    return Err(SchemaError::NotBatched {
                        shape: tensor.shape().to_vec(),
                    }
                    .into());
                }
            }
        }
        scatter_merge(self, batch)
    }

    /// Draw `n` rows uniformly with replacement from the filled rows.
    ///
    /// Returns `None` when the store is empty. Asking for more rows than are
    /// stored is allowed; duplicates are then guaranteed.
    pub fn sample_n(&mut self, n: usize) -> Option<Record> {
        if self.is_empty() {
            return None;
        }
        let len = self.len();
        if n > len {
            log::warn!(
                "sampling a batch of {} from an experience store holding {} rows",
                n,
                len
            );
        }

        let indices: Vec<usize> = (0..n).map(|_| self.rng.usize(0..len)).collect();
        let gathered = self
            .columns
            .iter()
            .map(|(name, column)| column.gather_rows(&indices).map(|rows| (name.clone(), rows)))
            .collect::<Result<Record, SchemaError>>();

        match gathered {
            Ok(record) => Some(record),
            Err(e) => {
                log::error!("experience store gather failed: {}", e);
                None
            }
        }
    }

    /// Draw a single row (with a leading dimension of 1).
    pub fn sample(&mut self) -> Option<Record> {
        self.sample_n(1)
    }
}

impl PayloadHolder for ExperienceStore {
    fn schema(&self) -> Schema {
        self.row_schema.clone()
    }

    fn snapshot(&self) -> Record {
        self.columns
            .iter()
            .map(|(name, column)| (name.clone(), column.clone()))
            .collect()
    }

    fn strategy(&self) -> UpdateStrategy {
        UpdateStrategy::ScatterMerge
    }

    fn choose_eviction_index(&mut self) -> Result<usize, PayloadError> {
        Ok(self.next_index())
    }

    fn scatter_rows(&mut self, indices: &[usize], record: &Record) -> Result<(), PayloadError> {
        for (name, column) in self.columns.iter_mut() {
            let rows = record
                .get(name)
                .ok_or_else(|| SchemaError::MissingField(name.clone()))?;
            column.scatter_rows(indices, rows)?;
        }
        Ok(())
    }
}
