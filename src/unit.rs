//! Module implementing the `SingleUnit` structure, the per-unit view of
//! a population.
//!
//! A unit is identified by its session and cluster id. Spike timestamps,
//! the metric-lookup index, and metric values are resolved lazily from
//! the population's bulk arrays and cached for the lifetime of the
//! object; nothing about a unit changes after construction except cache
//! population.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use nalgebra::{DMatrix, DVector};
use rand::Rng;

use crate::error::EphysError;
use crate::kde::{linspace, GaussianKde};
use crate::population::PopulationCore;
use crate::psth::{event_window_counts, peri_event_counts, pooled_offsets};
use crate::schema::{KilosortLabel, Metric, ProbeDirection, METRIC_DECIMALS};
use crate::store::Dataset;
use crate::utils::{mean, round_to, std_dev};
use crate::RATE_DECIMALS;

/// A record with one optional value per probe direction.
///
/// A direction's field is `None` when the underlying dataset is absent
/// from the session's store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ByDirection<T> {
    pub left: Option<T>,
    pub right: Option<T>,
}

impl<T> ByDirection<T> {
    pub fn get(&self, direction: ProbeDirection) -> Option<&T> {
        match direction {
            ProbeDirection::Left => self.left.as_ref(),
            ProbeDirection::Right => self.right.as_ref(),
        }
    }
}

/// Functional classification of a unit from its visual and motor
/// responsiveness flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitType {
    Visuomotor,
    Visual,
    Motor,
    Unresponsive,
}

/// Whole-session activity statistics, with the per-bin rates when the
/// estimate was binned.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySummary {
    pub mean: f64,
    pub std: f64,
    pub rates: Option<Vec<f64>>,
}

/// One sorted neural cluster within a session's population.
pub struct SingleUnit {
    core: Rc<PopulationCore>,
    cluster: i64,
    timestamps: OnceCell<Option<Vec<f64>>>,
    index: OnceCell<Option<usize>>,
    scalars: RefCell<HashMap<Metric, Option<f64>>>,
    label: OnceCell<Option<KilosortLabel>>,
    curves: OnceCell<ByDirection<DVector<f64>>>,
}

impl SingleUnit {
    pub(crate) fn new(core: Rc<PopulationCore>, cluster: i64) -> Self {
        SingleUnit {
            core,
            cluster,
            timestamps: OnceCell::new(),
            index: OnceCell::new(),
            scalars: RefCell::new(HashMap::new()),
            label: OnceCell::new(),
            curves: OnceCell::new(),
        }
    }

    /// Returns the cluster id of the unit.
    pub fn cluster(&self) -> i64 {
        self.cluster
    }

    /// Returns the unit's spike timestamps, in stored order, or `None`
    /// when the session has no spike data. Computed once and cached.
    pub fn timestamps(&self) -> Option<&[f64]> {
        self.timestamps
            .get_or_init(|| {
                let clusters = self.core.all_spike_clusters.as_ref()?;
                let times = self.core.all_spike_timestamps.as_ref()?;
                Some(
                    clusters
                        .iter()
                        .zip(times)
                        .filter(|(&c, _)| c == self.cluster)
                        .map(|(_, &t)| t)
                        .collect(),
                )
            })
            .as_deref()
    }

    /// Returns the number of spikes assigned to the unit.
    pub fn num_spikes(&self) -> usize {
        self.timestamps().map_or(0, |t| t.len())
    }

    /// Returns the unit's position in the population's unique-cluster
    /// ordering, used to index every per-population metric array.
    ///
    /// Fails loudly on a missing registry or an unregistered cluster;
    /// see [`SingleUnit::try_index`] for the lenient variant.
    pub fn index(&self) -> Result<usize, EphysError> {
        let registry = self
            .core
            .unique_spike_clusters
            .as_ref()
            .ok_or_else(|| EphysError::MissingDataset("spikes/clusters".to_string()))?;
        self.index
            .get_or_init(|| registry.binary_search(&self.cluster).ok())
            .ok_or(EphysError::ClusterNotFound(self.cluster))
    }

    /// Lenient index resolution: `None` on a missing registry or an
    /// unregistered cluster.
    pub fn try_index(&self) -> Option<usize> {
        let registry = self.core.unique_spike_clusters.as_ref()?;
        *self
            .index
            .get_or_init(|| registry.binary_search(&self.cluster).ok())
    }

    /// The post-processed value of a scalar metric at the unit's index,
    /// or `None` when the dataset is absent. Cached per metric.
    fn scalar_metric(&self, metric: Metric) -> Option<f64> {
        if let Some(&value) = self.scalars.borrow().get(&metric) {
            return value;
        }
        let value = (|| {
            let data = self.core.datasets.get(&metric)?;
            let index = self.try_index()?;
            let raw = *data.as_floats()?.get(index)?;
            Some(metric.postprocess(raw))
        })();
        self.scalars.borrow_mut().insert(metric, value);
        value
    }

    /// A boolean filter flag at the unit's index. Flag arrays are
    /// stored as 0/1, as integers or floats depending on the writer.
    fn flag_metric(&self, metric: Metric) -> Option<bool> {
        let data = self.core.datasets.get(&metric)?;
        let index = self.try_index()?;
        match data {
            Dataset::Ints(values) => values.get(index).map(|&v| v != 0),
            Dataset::Floats(values) => values.get(index).map(|&v| v != 0.0),
            Dataset::Matrix(_) => None,
        }
    }

    fn directional_metric(&self, metric: fn(ProbeDirection) -> Metric) -> ByDirection<f64> {
        ByDirection {
            left: self.scalar_metric(metric(ProbeDirection::Left)),
            right: self.scalar_metric(metric(ProbeDirection::Right)),
        }
    }

    /// Fraction of the session during which the unit was detected.
    pub fn presence_ratio(&self) -> Option<f64> {
        self.scalar_metric(Metric::PresenceRatio)
    }

    /// Fraction of spike pairs violating the refractory interval.
    pub fn refractory_period_violation_rate(&self) -> Option<f64> {
        self.scalar_metric(Metric::RefractoryPeriodViolationRate)
    }

    /// Estimated fraction of spikes missed by amplitude thresholding.
    pub fn amplitude_cutoff(&self) -> Option<f64> {
        self.scalar_metric(Metric::AmplitudeCutoff)
    }

    /// The spike sorter's quality classification.
    pub fn kilosort_label(&self) -> Option<KilosortLabel> {
        *self.label.get_or_init(|| {
            let data = self.core.datasets.get(&Metric::KilosortLabel)?;
            let index = self.try_index()?;
            data.as_ints()?
                .get(index)
                .copied()
                .map(KilosortLabel::from_code)
        })
    }

    /// Onset-to-peak response latency per probe direction, in seconds.
    pub fn visual_response_latency(&self) -> ByDirection<f64> {
        self.directional_metric(Metric::ZetaProbeLatency)
    }

    /// Z-scored response amplitude per probe direction.
    pub fn visual_response_amplitude(&self) -> ByDirection<f64> {
        self.directional_metric(Metric::VisualResponseAmplitude)
    }

    /// Probability of being visually responsive per probe direction,
    /// i.e. one minus the stored ZETA-test p-value.
    pub fn visual_response_probability(&self) -> ByDirection<f64> {
        self.directional_metric(Metric::ZetaProbeProbability)
    }

    /// Baseline-to-response rate change per probe direction.
    pub fn delta_response_value(&self) -> ByDirection<f64> {
        self.directional_metric(Metric::DeltaResponseValue)
    }

    /// Probability attached to the rate change, inverted like
    /// [`SingleUnit::visual_response_probability`].
    pub fn delta_response_probability(&self) -> ByDirection<f64> {
        self.directional_metric(Metric::DeltaResponseProbability)
    }

    /// Precomputed peri-probe response curve per direction.
    pub fn visual_response_curve(&self) -> &ByDirection<DVector<f64>> {
        self.curves.get_or_init(|| {
            let row = |direction| {
                let data = self.core.datasets.get(&Metric::ResponseCurve(direction))?;
                let index = self.try_index()?;
                let matrix: &DMatrix<f64> = data.as_matrix()?;
                if index < matrix.nrows() {
                    Some(matrix.row(index).transpose())
                } else {
                    None
                }
            };
            ByDirection {
                left: row(ProbeDirection::Left),
                right: row(ProbeDirection::Right),
            }
        })
    }

    /// Direction-selectivity index (earlier schema).
    pub fn direction_selectivity(&self) -> Option<f64> {
        self.scalar_metric(Metric::DirectionSelectivity)
    }

    /// Firing-rate stability score (earlier schema).
    pub fn stability(&self) -> Option<f64> {
        self.scalar_metric(Metric::Stability)
    }

    /// Cluster contamination score (earlier schema).
    pub fn contamination(&self) -> Option<f64> {
        self.scalar_metric(Metric::Contamination)
    }

    /// Whether the unit passed the precomputed quality filter (earlier
    /// schema).
    pub fn is_high_quality(&self) -> Option<bool> {
        self.flag_metric(Metric::QualityFilter)
    }

    /// Functional classification from the visual and motor filter
    /// flags; `None` if either flag array is missing.
    pub fn unit_type(&self) -> Option<UnitType> {
        let visual = self.flag_metric(Metric::VisualFilter)?;
        let motor = self.flag_metric(Metric::MotorFilter)?;
        Some(match (visual, motor) {
            (true, true) => UnitType::Visuomotor,
            (true, false) => UnitType::Visual,
            (false, true) => UnitType::Motor,
            (false, false) => UnitType::Unresponsive,
        })
    }

    fn required_timestamps(&self) -> Result<&[f64], EphysError> {
        self.timestamps()
            .ok_or_else(|| EphysError::MissingDataset("spikes/timestamps".to_string()))
    }

    /// Per-bin firing rates, averaged across events first.
    fn binned_rates(counts: &DMatrix<f64>, binsize: f64) -> Vec<f64> {
        (0..counts.ncols())
            .map(|bin| {
                let column: Vec<f64> = counts.column(bin).iter().copied().collect();
                mean(&column) / binsize
            })
            .collect()
    }

    /// Estimate activity mean and std across trials: each event's
    /// window is one count, divided by the window duration.
    ///
    /// # Returns
    /// `(mean, std)` of the firing rate across events, in spikes/s.
    pub fn describe_across_trials(
        &self,
        event_timestamps: &[f64],
        window: (f64, f64),
    ) -> Result<(f64, f64), EphysError> {
        let spikes = self.required_timestamps()?;
        let counts = event_window_counts(event_timestamps, spikes, window)?;
        let duration = window.1 - window.0;
        let rates: Vec<f64> = counts.iter().map(|c| c / duration).collect();
        Ok((
            round_to(mean(&rates), RATE_DECIMALS),
            round_to(std_dev(&rates), RATE_DECIMALS),
        ))
    }

    /// Estimate activity mean and std across time bins: the per-bin
    /// rate is averaged across events first, then summarized across
    /// bins.
    pub fn describe_across_bins(
        &self,
        event_timestamps: &[f64],
        window: (f64, f64),
        binsize: f64,
    ) -> Result<(f64, f64), EphysError> {
        let spikes = self.required_timestamps()?;
        let (_, counts) = peri_event_counts(event_timestamps, spikes, window, binsize)?;
        let rates = Self::binned_rates(&counts, binsize);
        Ok((
            round_to(mean(&rates), RATE_DECIMALS),
            round_to(std_dev(&rates), RATE_DECIMALS),
        ))
    }

    /// Estimate baseline activity with a bootstrap: each run places a
    /// window of `window_size` seconds uniformly at random within the
    /// baseline boundaries, and the runs' means and stds are averaged
    /// independently. Robust to where exactly the baseline window sits.
    ///
    /// # Parameters
    /// - `boundaries`: Baseline window boundaries relative to the events.
    /// - `window_size`: Duration of each random sub-window, in seconds.
    /// - `num_runs`: Number of bootstrap draws.
    /// - `binsize`: Bin size within each draw, or `None` for a single bin.
    pub fn describe_with_bootstrap<R: Rng>(
        &self,
        event_timestamps: &[f64],
        boundaries: (f64, f64),
        window_size: f64,
        num_runs: usize,
        binsize: Option<f64>,
        rng: &mut R,
    ) -> Result<(f64, f64), EphysError> {
        let spikes = self.required_timestamps()?;
        let low = boundaries.0 + window_size;
        let high = boundaries.1;
        if !(high > low) {
            return Err(EphysError::InvalidParameter(format!(
                "Baseline boundaries ({}, {}) leave no room for a {} s window",
                boundaries.0, boundaries.1, window_size
            )));
        }
        let dt = binsize.unwrap_or(window_size);

        let mut means = Vec::with_capacity(num_runs);
        let mut stds = Vec::with_capacity(num_runs);
        for _ in 0..num_runs {
            let edge = rng.gen_range(low..high);
            let window = (edge, edge + window_size);
            let (_, counts) = peri_event_counts(event_timestamps, spikes, window, dt)?;
            let rates = Self::binned_rates(&counts, dt);
            means.push(round_to(mean(&rates), RATE_DECIMALS));
            stds.push(round_to(std_dev(&rates), RATE_DECIMALS));
        }

        Ok((
            round_to(mean(&means), RATE_DECIMALS),
            round_to(mean(&stds), RATE_DECIMALS),
        ))
    }

    /// Whole-session activity: total rate when unbinned, else the
    /// mean/std of the per-bin rate histogram over the recording range.
    pub fn describe_global_activity(
        &self,
        binsize: Option<f64>,
    ) -> Result<ActivitySummary, EphysError> {
        let spikes = self.required_timestamps()?;
        let (t_start, t_stop) = self.core.session.t_range();

        let binsize = match binsize {
            None => {
                return Ok(ActivitySummary {
                    mean: round_to(spikes.len() as f64 / t_stop, METRIC_DECIMALS),
                    std: f64::NAN,
                    rates: None,
                })
            }
            Some(b) => b,
        };

        let num_bins = (t_stop / binsize) as usize;
        if num_bins == 0 {
            return Err(EphysError::InvalidParameter(format!(
                "Bin size {} exceeds the session duration",
                binsize
            )));
        }
        let width = (t_stop - t_start) / num_bins as f64;
        let mut counts = vec![0.0; num_bins];
        for &t in spikes {
            if t < t_start || t > t_stop {
                continue;
            }
            let bin = (((t - t_start) / width) as usize).min(num_bins - 1);
            counts[bin] += 1.0;
        }
        let rates: Vec<f64> = counts.iter().map(|c| c / binsize).collect();

        Ok(ActivitySummary {
            mean: round_to(mean(&rates), METRIC_DECIMALS),
            std: round_to(std_dev(&rates), METRIC_DECIMALS),
            rates: Some(rates),
        })
    }

    /// Fixed-bin peri-event time histogram: the mean firing rate per
    /// bin across events.
    ///
    /// # Returns
    /// The bin-center time axis and the rate curve, in spikes/s.
    pub fn peth(
        &self,
        event_timestamps: &[f64],
        window: (f64, f64),
        binsize: f64,
    ) -> Result<(Vec<f64>, Vec<f64>), EphysError> {
        let spikes = self.required_timestamps()?;
        let (times, counts) = peri_event_counts(event_timestamps, spikes, window, binsize)?;
        let rates = Self::binned_rates(&counts, binsize);
        Ok((times, rates))
    }

    /// Kernel-density-smoothed peri-event rate estimate.
    ///
    /// Spike offsets are pooled from all events within the window
    /// expanded by `edge_buffer_factor` (so the kernel does not see an
    /// artificial edge), a Gaussian density with an effective bandwidth
    /// of `sd` seconds is fit, evaluated on `num_points` points across
    /// the original window, and rescaled to spikes per event per
    /// second. With fewer than 2 pooled spikes the fit is undefined and
    /// the curve is all-NaN.
    pub fn peth_kde(
        &self,
        event_timestamps: &[f64],
        window: (f64, f64),
        sd: f64,
        num_points: usize,
        edge_buffer_factor: f64,
    ) -> Result<(Vec<f64>, Vec<f64>), EphysError> {
        let spikes = self.required_timestamps()?;
        let expanded = (window.0 * edge_buffer_factor, window.1 * edge_buffer_factor);
        let sample = pooled_offsets(event_timestamps, spikes, expanded);
        let times = linspace(window.0, window.1, num_points);

        let sigma = std_dev(&sample);
        if sample.len() < 2 || !(sigma > 0.0) {
            let rates = vec![f64::NAN; times.len()];
            return Ok((times, rates));
        }

        let kde = GaussianKde::fit(&sample, sd / sigma)?;
        let scale = sample.len() as f64 / event_timestamps.len() as f64;
        let rates: Vec<f64> = kde.evaluate(&times).iter().map(|y| y * scale).collect();
        Ok((times, rates))
    }
}

impl std::fmt::Debug for SingleUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleUnit")
            .field("cluster", &self.cluster)
            .field("num_spikes", &self.num_spikes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::population::Population;
    use crate::schema::MetricSchema;
    use crate::session::Session;
    use crate::store::MemoryStore;

    const SEED: u64 = 42;

    fn v2_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .insert("spikes/clusters", Dataset::Ints(vec![1, 1, 2, 2, 2, 3]))
            .insert(
                "spikes/timestamps",
                Dataset::Floats(vec![0.1, 0.2, 1.0, 1.1, 1.2, 5.0]),
            )
            .insert(
                "population/metrics/pr",
                Dataset::Floats(vec![0.95, 0.5, 0.99]),
            )
            .insert(
                "population/zeta/probe/left/p",
                Dataset::Floats(vec![0.0123, 0.8, 0.04]),
            )
            .insert(
                "population/zeta/probe/left/latency",
                Dataset::Floats(vec![0.12345, 0.4, 0.2]),
            )
            .insert("population/metrics/ksl", Dataset::Ints(vec![0, 1, 1]))
            .insert(
                "population/psths/probe/left",
                Dataset::Matrix(DMatrix::from_row_slice(3, 2, &[
                    1.0, 2.0, //
                    3.0, 4.0, //
                    5.0, 6.0,
                ])),
            );
        store
    }

    fn v2_population() -> Population {
        let session = Rc::new(
            Session::new("2023-05-12", "mlati6", (0.0, 10.0), Box::new(v2_store()))
                .with_probe_timestamps(vec![1.0, 2.0]),
        );
        Population::load(session, MetricSchema::v2()).unwrap()
    }

    #[test]
    fn test_timestamps_and_index() {
        let population = v2_population();

        let sizes: Vec<usize> = population.iter().map(|u| u.num_spikes()).collect();
        assert_eq!(sizes, vec![2, 3, 1]);

        let indices: Vec<usize> = population.iter().map(|u| u.index().unwrap()).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let unit = population.index_by_cluster(2).unwrap();
        assert_eq!(unit.timestamps().unwrap(), &[1.0, 1.1, 1.2]);
    }

    #[test]
    fn test_index_fails_loudly_on_unknown_cluster() {
        let population = v2_population();
        let stray = SingleUnit::new(population.core(), 99);
        assert_eq!(stray.index(), Err(EphysError::ClusterNotFound(99)));
        assert_eq!(stray.try_index(), None);
    }

    #[test]
    fn test_scalar_metrics_and_inversion() {
        let population = v2_population();
        let unit = &population[0];

        // Quality metrics pass through raw
        assert!((unit.presence_ratio().unwrap() - 0.95).abs() < 1e-9);
        // Probability is 1 - p, rounded to 3 decimals
        assert!((unit.visual_response_probability().left.unwrap() - 0.988).abs() < 1e-9);
        // Latency is rounded, not inverted
        assert!((unit.visual_response_latency().left.unwrap() - 0.123).abs() < 1e-9);

        // Absent datasets stay None
        assert_eq!(unit.visual_response_probability().right, None);
        assert_eq!(unit.refractory_period_violation_rate(), None);
        assert_eq!(unit.stability(), None);
        assert_eq!(unit.unit_type(), None);
    }

    #[test]
    fn test_kilosort_label_and_curve() {
        let population = v2_population();

        assert_eq!(population[0].kilosort_label(), Some(KilosortLabel::MultiUnit));
        assert_eq!(population[1].kilosort_label(), Some(KilosortLabel::Good));

        let curve = population[1].visual_response_curve();
        assert_eq!(curve.left.as_ref().unwrap().as_slice(), &[3.0, 4.0]);
        assert_eq!(curve.right, None);
    }

    #[test]
    fn test_unit_type_from_filter_flags() {
        let mut store = MemoryStore::new();
        store
            .insert("spikes/clusters", Dataset::Ints(vec![1, 2, 3, 4]))
            .insert("spikes/timestamps", Dataset::Floats(vec![0.1, 0.2, 0.3, 0.4]))
            .insert("population/filters/visual", Dataset::Ints(vec![1, 1, 0, 0]))
            .insert("population/filters/motor", Dataset::Ints(vec![1, 0, 1, 0]))
            .insert("population/filters/quality", Dataset::Ints(vec![1, 0, 1, 1]))
            .insert(
                "population/metrics/dsi",
                Dataset::Floats(vec![0.5, 0.25, 0.125, 0.0625]),
            );
        let session = Rc::new(Session::new("2022-01-01", "mlati1", (0.0, 10.0), Box::new(store)));
        let population = Population::load(session, MetricSchema::v1()).unwrap();

        let types: Vec<Option<UnitType>> = population.iter().map(|u| u.unit_type()).collect();
        assert_eq!(types, vec![
            Some(UnitType::Visuomotor),
            Some(UnitType::Visual),
            Some(UnitType::Motor),
            Some(UnitType::Unresponsive),
        ]);

        assert_eq!(population[0].is_high_quality(), Some(true));
        assert_eq!(population[1].is_high_quality(), Some(false));
        assert!((population[1].direction_selectivity().unwrap() - 0.25).abs() < 1e-9);
    }

    // A session with one 10 Hz unit: spikes every 0.1 s for 10 s.
    fn regular_population() -> Population {
        let timestamps: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let clusters = vec![7; timestamps.len()];
        let mut store = MemoryStore::new();
        store
            .insert("spikes/clusters", Dataset::Ints(clusters))
            .insert("spikes/timestamps", Dataset::Floats(timestamps));
        let session = Rc::new(
            Session::new("2023-05-12", "mlati6", (0.0, 10.0), Box::new(store))
                .with_probe_timestamps(vec![3.0, 6.0]),
        );
        Population::load(session, MetricSchema::v2()).unwrap()
    }

    #[test]
    fn test_describe_across_trials() {
        let population = regular_population();
        let unit = &population[0];

        // 10 Hz everywhere, so every trial sees the same rate
        let (mu, sigma) = unit
            .describe_across_trials(&[3.0, 6.0], (-1.0, 0.0))
            .unwrap();
        assert!((mu - 10.0).abs() < 1e-9);
        assert!((sigma - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_describe_across_bins() {
        let population = regular_population();
        let unit = &population[0];

        let (mu, sigma) = unit
            .describe_across_bins(&[3.0, 6.0], (-1.0, 0.0), 0.2)
            .unwrap();
        assert!((mu - 10.0).abs() < 1e-9);
        assert!((sigma - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_describe_with_bootstrap() {
        let population = regular_population();
        let unit = &population[0];
        let mut rng = StdRng::seed_from_u64(SEED);

        let (mu, sigma) = unit
            .describe_with_bootstrap(&[3.0, 6.0], (-2.0, -0.5), 0.5, 30, None, &mut rng)
            .unwrap();
        // Constant 10 Hz activity, and a single bin per draw gives a
        // zero per-run std
        assert!((mu - 10.0).abs() < 0.5);
        assert!((sigma - 0.0).abs() < 1e-9);

        // Boundaries narrower than the window are rejected
        assert!(unit
            .describe_with_bootstrap(&[3.0], (-1.0, -0.6), 0.5, 10, None, &mut rng)
            .is_err());
    }

    #[test]
    fn test_describe_global_activity() {
        let population = regular_population();
        let unit = &population[0];

        // Unbinned: exactly size / t_stop, no std
        let summary = unit.describe_global_activity(None).unwrap();
        assert!((summary.mean - 10.0).abs() < 1e-9);
        assert!(summary.std.is_nan());
        assert_eq!(summary.rates, None);

        // Binned: 10 one-second bins of 10 spikes each
        let summary = unit.describe_global_activity(Some(1.0)).unwrap();
        assert!((summary.mean - 10.0).abs() < 1e-9);
        assert!((summary.std - 0.0).abs() < 1e-9);
        assert_eq!(summary.rates.unwrap().len(), 10);
    }

    #[test]
    fn test_peth() {
        let population = regular_population();
        let unit = &population[0];

        let (times, rates) = unit.peth(&[3.0, 6.0], (-1.0, 1.0), 0.5).unwrap();
        assert_eq!(times.len(), 4);
        assert_eq!(rates.len(), 4);
        for rate in rates {
            assert!((rate - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_peth_kde_smooths_to_the_rate() {
        let population = regular_population();
        let unit = &population[0];

        let (times, rates) = unit
            .peth_kde(&[3.0, 6.0], (-1.0, 1.0), 0.1, 101, 1.1)
            .unwrap();
        assert_eq!(times.len(), 101);
        // Away from the edges the smoothed estimate sits near 10 Hz
        let center = rates[50];
        assert!(center.is_finite());
        assert!((center - 10.0).abs() < 2.0);
    }

    #[test]
    fn test_peth_kde_returns_nan_on_sparse_spikes() {
        let mut store = MemoryStore::new();
        store
            .insert("spikes/clusters", Dataset::Ints(vec![1]))
            .insert("spikes/timestamps", Dataset::Floats(vec![3.05]));
        let session = Rc::new(Session::new("2023-05-12", "mlati6", (0.0, 10.0), Box::new(store)));
        let population = Population::load(session, MetricSchema::v2()).unwrap();

        let (times, rates) = population[0]
            .peth_kde(&[3.0], (-1.0, 1.0), 0.02, 51, 1.1)
            .unwrap();
        assert_eq!(times.len(), 51);
        assert!(rates.iter().all(|r| r.is_nan()));
    }
}
