//! Module implementing the metric-schema registry.
//!
//! Two successive dataset schemas exist on disk: an early one built
//! around visual/motor/quality filter flags with stability and
//! contamination scores, and a later one built around ZETA-test
//! response metrics, delta-response metrics, and per-unit PSTH curves.
//! Both are the same design with different metric catalogs, so a single
//! registry maps logical metric identifiers to store paths and
//! post-processing rules, and a population is parameterized by the
//! catalog it loads.

use serde::{Deserialize, Serialize};

use crate::utils::round_to;

/// Decimal precision for stored metric values.
pub const METRIC_DECIMALS: u32 = 3;

/// Direction of probe motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeDirection {
    Left,
    Right,
}

impl ProbeDirection {
    /// Both directions, in catalog order.
    pub const ALL: [ProbeDirection; 2] = [ProbeDirection::Left, ProbeDirection::Right];

    fn key(&self) -> &'static str {
        match self {
            ProbeDirection::Left => "left",
            ProbeDirection::Right => "right",
        }
    }
}

/// Direction of a saccadic eye movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaccadeDirection {
    Nasal,
    Temporal,
}

impl SaccadeDirection {
    pub const ALL: [SaccadeDirection; 2] = [SaccadeDirection::Nasal, SaccadeDirection::Temporal];

    fn key(&self) -> &'static str {
        match self {
            SaccadeDirection::Nasal => "nasal",
            SaccadeDirection::Temporal => "temporal",
        }
    }
}

/// Quality classification assigned by the Kilosort spike sorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KilosortLabel {
    /// Multi-unit activity (raw label code 0).
    MultiUnit,
    /// A well-isolated single unit.
    Good,
}

impl KilosortLabel {
    /// Decode the raw label code stored by the sorter.
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            KilosortLabel::MultiUnit
        } else {
            KilosortLabel::Good
        }
    }
}

impl std::fmt::Display for KilosortLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KilosortLabel::MultiUnit => write!(f, "mua"),
            KilosortLabel::Good => write!(f, "good"),
        }
    }
}

/// A logical per-unit metric, addressing one array in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    // Clustering-quality metrics
    PresenceRatio,
    RefractoryPeriodViolationRate,
    AmplitudeCutoff,
    KilosortLabel,
    // ZETA-test response metrics (later schema)
    VisualResponseAmplitude(ProbeDirection),
    ZetaProbeProbability(ProbeDirection),
    ZetaProbeLatency(ProbeDirection),
    ZetaSaccadeProbability(SaccadeDirection),
    ZetaSaccadeLatency(SaccadeDirection),
    DeltaResponseValue(ProbeDirection),
    DeltaResponseProbability(ProbeDirection),
    ResponseCurve(ProbeDirection),
    // Filter flags and scores (earlier schema)
    VisualFilter,
    MotorFilter,
    QualityFilter,
    Stability,
    Contamination,
    DirectionSelectivity,
}

impl Metric {
    /// The store path of the metric, relative to the population group.
    pub fn path(&self) -> String {
        match self {
            Metric::PresenceRatio => "metrics/pr".to_string(),
            Metric::RefractoryPeriodViolationRate => "metrics/rpvr".to_string(),
            Metric::AmplitudeCutoff => "metrics/ac".to_string(),
            Metric::KilosortLabel => "metrics/ksl".to_string(),
            Metric::VisualResponseAmplitude(dir) => format!("metrics/vra/{}", dir.key()),
            Metric::ZetaProbeProbability(dir) => format!("zeta/probe/{}/p", dir.key()),
            Metric::ZetaProbeLatency(dir) => format!("zeta/probe/{}/latency", dir.key()),
            Metric::ZetaSaccadeProbability(dir) => format!("zeta/saccade/{}/p", dir.key()),
            Metric::ZetaSaccadeLatency(dir) => format!("zeta/saccade/{}/latency", dir.key()),
            Metric::DeltaResponseValue(dir) => format!("metrics/dr/{}/x", dir.key()),
            Metric::DeltaResponseProbability(dir) => format!("metrics/dr/{}/p", dir.key()),
            Metric::ResponseCurve(dir) => format!("psths/probe/{}", dir.key()),
            Metric::VisualFilter => "filters/visual".to_string(),
            Metric::MotorFilter => "filters/motor".to_string(),
            Metric::QualityFilter => "filters/quality".to_string(),
            Metric::Stability => "metrics/stability".to_string(),
            Metric::Contamination => "metrics/contamination".to_string(),
            Metric::DirectionSelectivity => "metrics/dsi".to_string(),
        }
    }

    /// Post-processing applied to a raw stored value before it is
    /// exposed on a unit.
    ///
    /// Probability-type metrics are stored as p-values from a test for
    /// non-responsiveness; accessors expose `1 - p`, the probability of
    /// being responsive. The raw p-values stay raw where the review-log
    /// builder reads them directly from the store.
    pub fn postprocess(&self, raw: f64) -> f64 {
        match self {
            Metric::ZetaProbeProbability(_)
            | Metric::ZetaSaccadeProbability(_)
            | Metric::DeltaResponseProbability(_) => round_to(1.0 - raw, METRIC_DECIMALS),
            Metric::ZetaProbeLatency(_)
            | Metric::ZetaSaccadeLatency(_)
            | Metric::VisualResponseAmplitude(_)
            | Metric::DeltaResponseValue(_)
            | Metric::Stability
            | Metric::Contamination
            | Metric::DirectionSelectivity => round_to(raw, METRIC_DECIMALS),
            _ => raw,
        }
    }
}

/// The schema version a session's store was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    V1,
    V2,
}

/// The metric catalog loaded with a population.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSchema {
    version: SchemaVersion,
    metrics: Vec<Metric>,
}

impl MetricSchema {
    /// The early schema: visual/motor/quality filter flags plus
    /// stability, contamination, and direction-selectivity scores.
    pub fn v1() -> Self {
        MetricSchema {
            version: SchemaVersion::V1,
            metrics: vec![
                Metric::VisualFilter,
                Metric::MotorFilter,
                Metric::QualityFilter,
                Metric::Stability,
                Metric::Contamination,
                Metric::DirectionSelectivity,
            ],
        }
    }

    /// The later schema: clustering-quality metrics, ZETA-test response
    /// metrics per probe/saccade direction, delta-response metrics, and
    /// per-unit PSTH curves.
    pub fn v2() -> Self {
        let mut metrics = vec![
            Metric::PresenceRatio,
            Metric::RefractoryPeriodViolationRate,
            Metric::AmplitudeCutoff,
            Metric::KilosortLabel,
        ];
        for dir in ProbeDirection::ALL {
            metrics.push(Metric::VisualResponseAmplitude(dir));
            metrics.push(Metric::ZetaProbeProbability(dir));
            metrics.push(Metric::ZetaProbeLatency(dir));
            metrics.push(Metric::DeltaResponseValue(dir));
            metrics.push(Metric::DeltaResponseProbability(dir));
            metrics.push(Metric::ResponseCurve(dir));
        }
        for dir in SaccadeDirection::ALL {
            metrics.push(Metric::ZetaSaccadeProbability(dir));
            metrics.push(Metric::ZetaSaccadeLatency(dir));
        }
        MetricSchema {
            version: SchemaVersion::V2,
            metrics,
        }
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// The metrics in the catalog, in load order.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// The full store path of a metric dataset.
    pub fn store_path(&self, metric: Metric) -> String {
        format!("population/{}", metric.path())
    }
}
