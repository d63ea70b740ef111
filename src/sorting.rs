//! Module implementing the manual spike-sorting review log.
//!
//! Units with poor clustering-quality scores that are nonetheless
//! statistically responsive are the ambiguous cases worth a human look.
//! The builder collects them across sessions, ranks them by their best
//! evidence of responsiveness, and writes a CSV for manual labeling.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use itertools::Itertools;
use log::info;

use crate::error::EphysError;
use crate::population::Population;
use crate::schema::{KilosortLabel, MetricSchema};
use crate::session::Session;

/// Quality-control thresholds for flagging units.
///
/// A unit is flagged when it fails the combined quality check (presence
/// ratio below the minimum, or refractory-violation rate or amplitude
/// cutoff above their maxima) while its smallest ZETA p-value across
/// the four test conditions stays at or below `maximum_probability_value`.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityThresholds {
    pub minimum_presence_ratio: f64,
    pub maximum_refractory_period_violation_rate: f64,
    pub maximum_amplitude_cutoff: f64,
    pub maximum_probability_value: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        QualityThresholds {
            minimum_presence_ratio: 0.9,
            maximum_refractory_period_violation_rate: 0.5,
            maximum_amplitude_cutoff: 0.1,
            maximum_probability_value: 0.05,
        }
    }
}

/// One row of the review log.
#[derive(Debug, Clone, PartialEq)]
pub struct SortingLogEntry {
    pub date: String,
    pub animal: String,
    pub cluster: i64,
    /// Smallest raw p-value across the four test conditions.
    pub probability: f64,
    /// Derived sorter label, empty when the session has no label array.
    pub label: String,
}

impl SortingLogEntry {
    /// The CSV rendition of the entry, with the trailing blank column
    /// reserved for the manual label.
    fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{:.3},{},",
            self.date, self.animal, self.cluster, self.probability, self.label
        )
    }
}

/// The fixed header of the review log.
pub const LOG_COLUMNS: [&str; 6] = [
    "Date",
    "Animal",
    "Cluster",
    "p",
    "Label (pre)",
    "Label (post)",
];

fn required_floats(session: &Session, path: &str) -> Result<Vec<f64>, EphysError> {
    session
        .load(path)
        .ok_or_else(|| EphysError::MissingDataset(path.to_string()))?
        .as_floats()
        .map(|values| values.to_vec())
        .ok_or(EphysError::TypeMismatch {
            path: path.to_string(),
            expected: "float",
        })
}

/// Per-unit minimum of the four ZETA p-values: the smallest p across
/// probe-left, probe-right, saccade-nasal, and saccade-temporal is the
/// unit's best evidence of responsiveness.
fn minimum_response_probabilities(session: &Session) -> Result<Vec<f64>, EphysError> {
    let conditions = [
        "population/zeta/probe/left/p",
        "population/zeta/probe/right/p",
        "population/zeta/saccade/nasal/p",
        "population/zeta/saccade/temporal/p",
    ];
    let mut minima: Option<Vec<f64>> = None;
    for path in conditions {
        let values = required_floats(session, path)?;
        minima = Some(match minima {
            None => values,
            Some(current) => {
                if current.len() != values.len() {
                    return Err(EphysError::InvalidParameter(format!(
                        "Dataset {} is not aligned with the other test conditions",
                        path
                    )));
                }
                current
                    .iter()
                    .zip(&values)
                    .map(|(&a, &b)| a.min(b))
                    .collect()
            }
        });
    }
    // The conditions array is non-empty, so minima is always set
    minima.ok_or_else(|| EphysError::MissingDataset("population/zeta".to_string()))
}

/// True where a unit fails the combined clustering-quality check.
fn quality_failure_mask(
    session: &Session,
    thresholds: &QualityThresholds,
) -> Result<Vec<bool>, EphysError> {
    let presence = required_floats(session, "population/metrics/pr")?;
    let violations = required_floats(session, "population/metrics/rpvr")?;
    let cutoffs = required_floats(session, "population/metrics/ac")?;

    Ok(presence
        .iter()
        .zip(&violations)
        .zip(&cutoffs)
        .map(|((&pr, &rpvr), &ac)| {
            !(pr >= thresholds.minimum_presence_ratio
                && rpvr <= thresholds.maximum_refractory_period_violation_rate
                && ac <= thresholds.maximum_amplitude_cutoff)
        })
        .collect())
}

/// Build the manual spike-sorting review log for a batch of sessions.
///
/// Rows are sorted by ascending p-value within each session, and
/// sessions appear in input order.
///
/// # Returns
/// The structured entries, in the order they were written.
pub fn create_manual_sorting_log<P: AsRef<Path>>(
    sessions: &[Rc<Session>],
    csv: P,
    thresholds: &QualityThresholds,
) -> Result<Vec<SortingLogEntry>, EphysError> {
    let mut all_entries = Vec::new();

    for session in sessions {
        let probabilities = minimum_response_probabilities(session)?;
        let failures = quality_failure_mask(session, thresholds)?;
        let labels = session
            .load("population/metrics/ksl")
            .and_then(|dataset| dataset.as_ints().map(|values| values.to_vec()));

        let population = Population::load(session.clone(), MetricSchema::v2())?;

        let mut session_entries = Vec::new();
        for unit in population.select(&failures) {
            let index = unit.index()?;
            let probability = probabilities[index];
            if probability > thresholds.maximum_probability_value {
                continue;
            }
            let label = match &labels {
                None => String::new(),
                Some(codes) => KilosortLabel::from_code(codes[index]).to_string(),
            };
            session_entries.push(SortingLogEntry {
                date: session.date().to_string(),
                animal: session.animal().to_string(),
                cluster: unit.cluster(),
                probability,
                label,
            });
        }

        info!(
            "Session {} / {}: {} units flagged for review",
            session.date(),
            session.animal(),
            session_entries.len()
        );

        all_entries.extend(
            session_entries
                .into_iter()
                .sorted_by(|a, b| a.probability.total_cmp(&b.probability)),
        );
    }

    let file = File::create(csv)?;
    let mut stream = BufWriter::new(file);
    writeln!(stream, "{}", LOG_COLUMNS.join(","))?;
    for entry in &all_entries {
        writeln!(stream, "{}", entry.to_csv_line())?;
    }
    stream.flush()?;

    Ok(all_entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Dataset, MemoryStore};

    // Four units: 0 and 1 fail quality, 2 and 3 are clean. Unit 0 is
    // responsive (min p = 0.02), unit 1 is not (min p = 0.3).
    fn fixture_session() -> Rc<Session> {
        let clusters: Vec<i64> = vec![11, 22, 33, 44];
        let timestamps: Vec<f64> = vec![0.1, 0.2, 0.3, 0.4];
        let mut store = MemoryStore::new();
        store
            .insert("spikes/clusters", Dataset::Ints(clusters))
            .insert("spikes/timestamps", Dataset::Floats(timestamps))
            .insert(
                "population/metrics/pr",
                Dataset::Floats(vec![0.5, 0.6, 0.95, 0.99]),
            )
            .insert(
                "population/metrics/rpvr",
                Dataset::Floats(vec![0.1, 0.1, 0.1, 0.1]),
            )
            .insert(
                "population/metrics/ac",
                Dataset::Floats(vec![0.01, 0.01, 0.01, 0.01]),
            )
            .insert(
                "population/zeta/probe/left/p",
                Dataset::Floats(vec![0.02, 0.9, 0.01, 0.5]),
            )
            .insert(
                "population/zeta/probe/right/p",
                Dataset::Floats(vec![0.2, 0.8, 0.2, 0.5]),
            )
            .insert(
                "population/zeta/saccade/nasal/p",
                Dataset::Floats(vec![0.7, 0.3, 0.3, 0.5]),
            )
            .insert(
                "population/zeta/saccade/temporal/p",
                Dataset::Floats(vec![0.9, 0.4, 0.4, 0.5]),
            )
            .insert("population/metrics/ksl", Dataset::Ints(vec![0, 1, 1, 1]));
        Rc::new(Session::new("2023-05-12", "mlati6", (0.0, 10.0), Box::new(store)))
    }

    #[test]
    fn test_minimum_response_probabilities() {
        let session = fixture_session();
        let minima = minimum_response_probabilities(&session).unwrap();
        let expected = [0.02, 0.3, 0.01, 0.5];
        assert!(minima
            .iter()
            .zip(&expected)
            .all(|(a, b)| (a - b).abs() < 1e-9));
    }

    #[test]
    fn test_quality_failure_mask() {
        let session = fixture_session();
        let mask = quality_failure_mask(&session, &QualityThresholds::default()).unwrap();
        assert_eq!(mask, vec![true, true, false, false]);
    }

    #[test]
    fn test_flagging_rules() {
        let session = fixture_session();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sorting.csv");

        let entries =
            create_manual_sorting_log(&[session], &path, &QualityThresholds::default()).unwrap();

        // Unit 11 fails quality with min p = 0.02 <= 0.05: flagged.
        // Unit 22 fails quality but min p = 0.3: excluded. Units 33 and
        // 44 pass quality: excluded regardless of their p-values.
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cluster, 11);
        assert!((entries[0].probability - 0.02).abs() < 1e-9);
        assert_eq!(entries[0].label, "mua");
    }

    #[test]
    fn test_missing_condition_dataset_is_an_error() {
        let mut store = MemoryStore::new();
        store
            .insert("spikes/clusters", Dataset::Ints(vec![1]))
            .insert("spikes/timestamps", Dataset::Floats(vec![0.1]))
            .insert("population/zeta/probe/left/p", Dataset::Floats(vec![0.5]));
        let session = Rc::new(Session::new("2023-05-12", "mlati6", (0.0, 10.0), Box::new(store)));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sorting.csv");

        let result = create_manual_sorting_log(&[session], &path, &QualityThresholds::default());
        assert_eq!(
            result,
            Err(EphysError::MissingDataset(
                "population/zeta/probe/right/p".to_string()
            ))
        );
    }

    #[test]
    fn test_csv_format() {
        let session = fixture_session();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sorting.csv");

        create_manual_sorting_log(&[session], &path, &QualityThresholds::default()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Date,Animal,Cluster,p,Label (pre),Label (post)");
        assert_eq!(lines[1], "2023-05-12,mlati6,11,0.020,mua,");
        assert_eq!(lines.len(), 2);
    }
}
