//! Module implementing the on-disk dataset store contract.
//!
//! A session's precomputed arrays live in a keyed hierarchical container
//! addressed by slash-delimited paths, e.g. `population/metrics/pr`. A
//! missing dataset is a valid terminal state, reported as `None` rather
//! than an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::EphysError;

/// A single stored array.
///
/// Integer arrays hold cluster ids, label codes, and boolean filter
/// flags; float arrays hold timestamps and metric values; matrices hold
/// per-unit response curves (one row per unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Matrix(DMatrix<f64>),
}

impl Dataset {
    /// Returns the integer payload, or `None` for other element types.
    pub fn as_ints(&self) -> Option<&[i64]> {
        match self {
            Dataset::Ints(values) => Some(values),
            _ => None,
        }
    }

    /// Returns the float payload, or `None` for other element types.
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Dataset::Floats(values) => Some(values),
            _ => None,
        }
    }

    /// Returns the matrix payload, or `None` for other element types.
    pub fn as_matrix(&self) -> Option<&DMatrix<f64>> {
        match self {
            Dataset::Matrix(values) => Some(values),
            _ => None,
        }
    }

    /// Number of elements (rows, for a matrix).
    pub fn len(&self) -> usize {
        match self {
            Dataset::Ints(values) => values.len(),
            Dataset::Floats(values) => values.len(),
            Dataset::Matrix(values) => values.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The dataset-store contract consumed by sessions and populations.
pub trait DatasetStore {
    /// Load the dataset at `path`, or `None` if the store has no such dataset.
    fn load(&self, path: &str) -> Option<Dataset>;

    /// Whether a dataset exists at `path`.
    fn has_dataset(&self, path: &str) -> bool;

    /// Whether `path` names a group, i.e., a prefix under which datasets exist.
    fn has_group(&self, path: &str) -> bool;
}

/// An in-memory dataset store with a JSON snapshot format.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    datasets: BTreeMap<String, Dataset>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryStore {
            datasets: BTreeMap::new(),
        }
    }

    /// Insert a dataset at `path`, replacing any previous one.
    pub fn insert(&mut self, path: impl Into<String>, dataset: Dataset) -> &mut Self {
        self.datasets.insert(path.into(), dataset);
        self
    }

    /// Number of datasets in the store.
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Load a store snapshot from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, EphysError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let store: MemoryStore = serde_json::from_str(&contents)
            .map_err(|e| EphysError::IoError(e.to_string()))?;
        debug!(
            "Loaded {} datasets from {}",
            store.len(),
            path.as_ref().display()
        );
        Ok(store)
    }

    /// Write the store snapshot to a JSON file.
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<(), EphysError> {
        let contents =
            serde_json::to_string(self).map_err(|e| EphysError::IoError(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl DatasetStore for MemoryStore {
    fn load(&self, path: &str) -> Option<Dataset> {
        self.datasets.get(path).cloned()
    }

    fn has_dataset(&self, path: &str) -> bool {
        self.datasets.contains_key(path)
    }

    fn has_group(&self, path: &str) -> bool {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.datasets.keys().any(|key| key.starts_with(&prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .insert("spikes/clusters", Dataset::Ints(vec![1, 1, 2]))
            .insert("spikes/timestamps", Dataset::Floats(vec![0.1, 0.2, 1.0]))
            .insert(
                "population/psths/probe/left",
                Dataset::Matrix(DMatrix::from_row_slice(2, 3, &[
                    0.0, 1.0, 2.0, //
                    3.0, 4.0, 5.0,
                ])),
            );
        store
    }

    #[test]
    fn test_load_and_has_dataset() {
        let store = sample_store();

        assert!(store.has_dataset("spikes/clusters"));
        assert!(!store.has_dataset("spikes"));
        assert!(!store.has_dataset("population/metrics/pr"));

        assert_eq!(
            store.load("spikes/clusters").unwrap().as_ints().unwrap(),
            &[1, 1, 2]
        );
        assert_eq!(store.load("population/metrics/pr"), None);

        // Element-type accessors reject mismatched payloads
        let clusters = store.load("spikes/clusters").unwrap();
        assert_eq!(clusters.as_floats(), None);
        assert_eq!(clusters.as_matrix(), None);
    }

    #[test]
    fn test_has_group() {
        let store = sample_store();

        assert!(store.has_group("spikes"));
        assert!(store.has_group("population/psths"));
        assert!(store.has_group("population/psths/"));
        assert!(!store.has_group("spikes/clusters"));
        assert!(!store.has_group("stimuli"));
    }

    #[test]
    fn test_json_round_trip() {
        let store = sample_store();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        store.to_json_file(&path).unwrap();
        let reloaded = MemoryStore::from_json_file(&path).unwrap();
        assert_eq!(store, reloaded);

        let matrix = reloaded
            .load("population/psths/probe/left")
            .unwrap()
            .as_matrix()
            .unwrap()
            .clone();
        assert_eq!(matrix.nrows(), 2);
        assert!((matrix[(1, 2)] - 5.0).abs() < 1e-6);
    }
}
