//! Error module for the Rusty Ephys library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum EphysError {
    /// Error for a dataset the operation cannot do without, e.g., missing spike timestamps.
    MissingDataset(String),
    /// Error for a cluster absent from the unique-cluster registry.
    ClusterNotFound(i64),
    /// Error for a dataset stored with an unexpected element type.
    TypeMismatch { path: String, expected: &'static str },
    /// Error for invalid parameters, e.g., a non-positive bin size.
    InvalidParameter(String),
    /// Error for estimation on too few samples, e.g., kernel-density fitting on fewer than 2 spikes.
    InsufficientSample { needed: usize, got: usize },
    /// Error for I/O operations.
    IoError(String),
}

impl fmt::Display for EphysError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EphysError::MissingDataset(path) => write!(f, "Missing dataset: {}", path),
            EphysError::ClusterNotFound(cluster) => {
                write!(
                    f,
                    "Cluster {} not found in the unique-cluster registry",
                    cluster
                )
            }
            EphysError::TypeMismatch { path, expected } => {
                write!(f, "Dataset {} does not hold {} data", path, expected)
            }
            EphysError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            EphysError::InsufficientSample { needed, got } => {
                write!(f, "Insufficient sample: needed {}, got {}", needed, got)
            }
            EphysError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for EphysError {}

impl From<std::io::Error> for EphysError {
    fn from(e: std::io::Error) -> Self {
        EphysError::IoError(e.to_string())
    }
}
