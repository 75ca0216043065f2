//! Experience storage behind the relay role.
//!
//! - `ExperienceStore`: fixed-capacity rows, random-replacement eviction,
//!   uniform sampling with replacement

pub mod experience_store;

pub use experience_store::{ExperienceStore, ExperienceStoreConfig};
