//! Module implementing the `Population` structure, the collection of
//! sorted units recorded in one session.
//!
//! Loading pulls the session's bulk spike arrays and per-population
//! metric tables from the store once; units hold a shared handle to
//! that immutable state and resolve their own views lazily. Filtering
//! narrows the live unit list; `unfilter` is the only reset path and
//! fully reloads from the store.

use std::collections::HashMap;
use std::ops::Index;
use std::rc::Rc;

use log::debug;

use crate::error::EphysError;
use crate::schema::{Metric, MetricSchema, ProbeDirection};
use crate::session::Session;
use crate::store::Dataset;
use crate::unit::SingleUnit;

/// The bulk arrays and metric tables shared by a population's units.
/// Immutable after load.
pub(crate) struct PopulationCore {
    pub(crate) session: Rc<Session>,
    pub(crate) all_spike_clusters: Option<Vec<i64>>,
    pub(crate) all_spike_timestamps: Option<Vec<f64>>,
    // Sorted distinct cluster ids; position defines the metric index.
    pub(crate) unique_spike_clusters: Option<Vec<i64>>,
    pub(crate) datasets: HashMap<Metric, Dataset>,
}

/// Multi-criterion unit filter. Each `None` threshold disables the
/// corresponding check.
///
/// The default carries the thresholds used for routine screening:
/// presence ratio at least 0.9, refractory-violation rate at most 0.7,
/// amplitude cutoff at most 0.1, response probability at least 0.99,
/// response latency within 50-500 ms, and at least 3000 spikes.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFilter {
    /// Probe motion selecting a single direction: -1 for leftward, +1
    /// for rightward, `None` for both.
    pub probe_motion: Option<i32>,
    pub presence_ratio: Option<f64>,
    pub refractory_period_violation_rate: Option<f64>,
    pub amplitude_cutoff: Option<f64>,
    pub visual_response_probability: Option<f64>,
    pub visual_response_amplitude: Option<f64>,
    pub visual_response_latency_range: Option<(f64, f64)>,
    pub spike_count_minimum: usize,
    /// Reset to the full unit list before filtering.
    pub reload: bool,
}

impl Default for UnitFilter {
    fn default() -> Self {
        UnitFilter {
            probe_motion: None,
            presence_ratio: Some(0.9),
            refractory_period_violation_rate: Some(0.7),
            amplitude_cutoff: Some(0.1),
            visual_response_probability: Some(0.99),
            visual_response_amplitude: None,
            visual_response_latency_range: Some((0.05, 0.5)),
            spike_count_minimum: 3000,
            reload: true,
        }
    }
}

impl UnitFilter {
    /// The probe directions the filter evaluates.
    fn probe_directions(&self) -> &'static [ProbeDirection] {
        match self.probe_motion {
            Some(-1) => &[ProbeDirection::Left],
            Some(_) => &[ProbeDirection::Right],
            None => &ProbeDirection::ALL,
        }
    }

    /// Whether one unit passes every gate.
    ///
    /// The quality gates short-circuit: a unit failing one is skipped
    /// before any response metric is evaluated. Responsiveness needs at
    /// least one passing direction; the latency range must hold for
    /// every direction. A gated metric that is absent fails its gate.
    fn passes(&self, unit: &SingleUnit) -> bool {
        if let Some(threshold) = self.presence_ratio {
            match unit.presence_ratio() {
                Some(value) if value >= threshold => {}
                _ => return false,
            }
        }
        if let Some(threshold) = self.refractory_period_violation_rate {
            match unit.refractory_period_violation_rate() {
                Some(value) if value <= threshold => {}
                _ => return false,
            }
        }
        if let Some(threshold) = self.amplitude_cutoff {
            match unit.amplitude_cutoff() {
                Some(value) if value <= threshold => {}
                _ => return false,
            }
        }

        // At least one direction with a strong enough response
        let probabilities = unit.visual_response_probability();
        let amplitudes = unit.visual_response_amplitude();
        let mut responsive = false;
        for &direction in self.probe_directions() {
            if let Some(threshold) = self.visual_response_probability {
                match probabilities.get(direction) {
                    Some(&value) if value >= threshold => {}
                    _ => continue,
                }
            }
            if let Some(threshold) = self.visual_response_amplitude {
                match amplitudes.get(direction) {
                    Some(&value) if value >= threshold => {}
                    _ => continue,
                }
            }
            responsive = true;
        }
        if !responsive {
            return false;
        }

        // Every direction's latency inside the range
        if let Some((low, high)) = self.visual_response_latency_range {
            let latencies = unit.visual_response_latency();
            for &direction in self.probe_directions() {
                match latencies.get(direction) {
                    Some(&value) if value >= low && value <= high => {}
                    _ => return false,
                }
            }
        }

        unit.num_spikes() >= self.spike_count_minimum
    }
}

/// The units recorded in one session, with their bulk spike arrays and
/// metric tables.
pub struct Population {
    core: Rc<PopulationCore>,
    schema: MetricSchema,
    units: Vec<SingleUnit>,
}

impl Population {
    /// Load a session's population with the given metric catalog.
    ///
    /// A session without spike data yields an empty population; an
    /// inconsistent store (clusters without timestamps, or mismatched
    /// array lengths) is an error.
    pub fn load(session: Rc<Session>, schema: MetricSchema) -> Result<Self, EphysError> {
        let core = Rc::new(Self::load_core(&session, &schema)?);
        let units = Self::make_units(&core);
        debug!(
            "Loaded population for {} / {}: {} units, {} metric datasets",
            session.date(),
            session.animal(),
            units.len(),
            core.datasets.len()
        );
        Ok(Population {
            core,
            schema,
            units,
        })
    }

    fn load_core(
        session: &Rc<Session>,
        schema: &MetricSchema,
    ) -> Result<PopulationCore, EphysError> {
        let mut datasets = HashMap::new();
        for &metric in schema.metrics() {
            let path = schema.store_path(metric);
            if session.has_dataset(&path) {
                if let Some(dataset) = session.load(&path) {
                    datasets.insert(metric, dataset);
                }
            }
        }

        let clusters = match session.load("spikes/clusters") {
            None => {
                return Ok(PopulationCore {
                    session: session.clone(),
                    all_spike_clusters: None,
                    all_spike_timestamps: None,
                    unique_spike_clusters: None,
                    datasets,
                })
            }
            Some(dataset) => dataset
                .as_ints()
                .ok_or(EphysError::TypeMismatch {
                    path: "spikes/clusters".to_string(),
                    expected: "integer",
                })?
                .to_vec(),
        };

        let timestamps = session
            .load("spikes/timestamps")
            .ok_or_else(|| EphysError::MissingDataset("spikes/timestamps".to_string()))?
            .as_floats()
            .ok_or(EphysError::TypeMismatch {
                path: "spikes/timestamps".to_string(),
                expected: "float",
            })?
            .to_vec();

        if clusters.len() != timestamps.len() {
            return Err(EphysError::InvalidParameter(format!(
                "Spike clusters ({}) and timestamps ({}) must be index-aligned",
                clusters.len(),
                timestamps.len()
            )));
        }

        let mut unique = clusters.clone();
        unique.sort_unstable();
        unique.dedup();

        Ok(PopulationCore {
            session: session.clone(),
            all_spike_clusters: Some(clusters),
            all_spike_timestamps: Some(timestamps),
            unique_spike_clusters: Some(unique),
            datasets,
        })
    }

    fn make_units(core: &Rc<PopulationCore>) -> Vec<SingleUnit> {
        match core.unique_spike_clusters.as_ref() {
            None => vec![],
            Some(unique) => unique
                .iter()
                .map(|&cluster| SingleUnit::new(core.clone(), cluster))
                .collect(),
        }
    }

    pub(crate) fn core(&self) -> Rc<PopulationCore> {
        self.core.clone()
    }

    /// The session the population was loaded from.
    pub fn session(&self) -> &Session {
        &self.core.session
    }

    /// Cluster id per spike, index-aligned with
    /// [`Population::all_spike_timestamps`].
    pub fn all_spike_clusters(&self) -> Option<&[i64]> {
        self.core.all_spike_clusters.as_deref()
    }

    /// Timestamp per spike, in seconds.
    pub fn all_spike_timestamps(&self) -> Option<&[f64]> {
        self.core.all_spike_timestamps.as_deref()
    }

    /// The sorted distinct cluster ids; a unit's position here is its
    /// metric index.
    pub fn unique_spike_clusters(&self) -> Option<&[i64]> {
        self.core.unique_spike_clusters.as_deref()
    }

    /// A per-population metric dataset, or `None` if the store lacks it.
    pub fn dataset(&self, metric: Metric) -> Option<&Dataset> {
        self.core.datasets.get(&metric)
    }

    /// Number of units on the live list.
    pub fn count(&self) -> usize {
        self.units.len()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// The live unit list, in unique-cluster order.
    pub fn units(&self) -> &[SingleUnit] {
        &self.units
    }

    pub fn get(&self, index: usize) -> Option<&SingleUnit> {
        self.units.get(index)
    }

    /// Iterate over the live unit list. Each call starts a fresh
    /// traversal.
    pub fn iter(&self) -> std::slice::Iter<'_, SingleUnit> {
        self.units.iter()
    }

    /// The units selected by a boolean mask aligned to the live list.
    pub fn select(&self, mask: &[bool]) -> Vec<&SingleUnit> {
        self.units
            .iter()
            .zip(mask)
            .filter(|(_, &keep)| keep)
            .map(|(unit, _)| unit)
            .collect()
    }

    /// Linear scan for the unit with the given cluster id.
    pub fn index_by_cluster(&self, cluster: i64) -> Option<&SingleUnit> {
        self.units.iter().find(|unit| unit.cluster() == cluster)
    }

    /// Narrow the live unit list to the units passing every gate of the
    /// filter. With no spike data or no probe stimulus the population
    /// is left as is (beyond the optional reload).
    pub fn filter(&mut self, criteria: &UnitFilter) -> Result<(), EphysError> {
        if criteria.reload {
            self.unfilter()?;
        }
        if self.units.is_empty() || self.core.session.probe_timestamps().is_none() {
            return Ok(());
        }

        let kept: Vec<bool> = self.units.iter().map(|unit| criteria.passes(unit)).collect();
        let mut units = Vec::new();
        for (unit, keep) in std::mem::take(&mut self.units).into_iter().zip(&kept) {
            if *keep {
                units.push(unit);
            }
        }
        debug!(
            "Filter kept {} of {} units for {} / {}",
            units.len(),
            kept.len(),
            self.core.session.date(),
            self.core.session.animal()
        );
        self.units = units;
        Ok(())
    }

    /// Evaluate the filter without narrowing the unit list.
    ///
    /// # Returns
    /// A boolean mask aligned to the (possibly reloaded) live unit
    /// order; all-false when the population is empty or the session has
    /// no probe stimulus.
    pub fn filter_mask(&mut self, criteria: &UnitFilter) -> Result<Vec<bool>, EphysError> {
        if criteria.reload {
            self.unfilter()?;
        }
        if self.units.is_empty() || self.core.session.probe_timestamps().is_none() {
            return Ok(vec![false; self.units.len()]);
        }
        Ok(self.units.iter().map(|unit| criteria.passes(unit)).collect())
    }

    /// Discard any filtering by reloading the population from the
    /// store.
    pub fn unfilter(&mut self) -> Result<(), EphysError> {
        let session = self.core.session.clone();
        self.core = Rc::new(Self::load_core(&session, &self.schema)?);
        self.units = Self::make_units(&self.core);
        Ok(())
    }
}

impl Index<usize> for Population {
    type Output = SingleUnit;

    fn index(&self, index: usize) -> &SingleUnit {
        &self.units[index]
    }
}

impl<'a> IntoIterator for &'a Population {
    type Item = &'a SingleUnit;
    type IntoIter = std::slice::Iter<'a, SingleUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
