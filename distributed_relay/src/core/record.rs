//! Records: the unit of data moved through a channel.

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

use super::tensor::Tensor;

/// Mapping from field name to tensor.
///
/// Records are owned values; applying one to a payload holder copies data in,
/// it never aliases the sender's state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Tensor>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.fields.insert(name.into(), tensor);
        self
    }

    /// Insert a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        self.fields.insert(name.into(), tensor)
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.fields.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Tensor> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Tensor)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Tensor);
    type IntoIter = btree_map::IntoIter<String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Tensor);
    type IntoIter = btree_map::Iter<'a, String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_lookup() {
        let r = Record::new()
            .with("b", Tensor::scalar_f32(2.0))
            .with("a", Tensor::scalar_f32(1.0));
        assert_eq!(r.len(), 2);
        assert!(r.contains("a"));
        assert_eq!(r.get("b").unwrap().as_f32().unwrap(), &[2.0]);
        // Field order is by name, independent of insertion order.
        assert_eq!(r.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_serde_is_a_plain_map() {
        let r = Record::new().with("x", Tensor::scalar_f32(1.0));
        let value = serde_json::to_value(&r).unwrap();
        assert!(value.get("x").is_some());
        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, r);
    }
}
