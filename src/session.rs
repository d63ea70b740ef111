//! Module implementing a recording session, the unit of analysis.
//!
//! A session is identified by a date and an animal and owns the dataset
//! store holding its spike data and precomputed per-unit properties.

use crate::store::{Dataset, DatasetStore};

/// One behavioral recording session.
pub struct Session {
    date: String,
    animal: String,
    // Recording time range in seconds, as (start, stop).
    t_range: (f64, f64),
    // Onsets of the visual probe stimulus, absent for sessions without one.
    probe_timestamps: Option<Vec<f64>>,
    store: Box<dyn DatasetStore>,
}

impl Session {
    /// Create a session over the given store.
    pub fn new(
        date: impl Into<String>,
        animal: impl Into<String>,
        t_range: (f64, f64),
        store: Box<dyn DatasetStore>,
    ) -> Self {
        Session {
            date: date.into(),
            animal: animal.into(),
            t_range,
            probe_timestamps: None,
            store,
        }
    }

    /// Attach the probe stimulus onsets to the session.
    pub fn with_probe_timestamps(mut self, timestamps: Vec<f64>) -> Self {
        self.probe_timestamps = Some(timestamps);
        self
    }

    /// Returns the session date, e.g. "2023-05-12".
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Returns the animal identifier.
    pub fn animal(&self) -> &str {
        &self.animal
    }

    /// Returns the recording time range in seconds.
    pub fn t_range(&self) -> (f64, f64) {
        self.t_range
    }

    /// Returns the probe stimulus onsets, if the session has any.
    pub fn probe_timestamps(&self) -> Option<&[f64]> {
        self.probe_timestamps.as_deref()
    }

    /// Load the dataset at `path` from the session's store.
    pub fn load(&self, path: &str) -> Option<Dataset> {
        self.store.load(path)
    }

    /// Whether the session's store holds a dataset at `path`.
    pub fn has_dataset(&self, path: &str) -> bool {
        self.store.has_dataset(path)
    }

    /// Whether the session's store holds a group at `path`.
    pub fn has_group(&self, path: &str) -> bool {
        self.store.has_group(path)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("date", &self.date)
            .field("animal", &self.animal)
            .field("t_range", &self.t_range)
            .finish()
    }
}
