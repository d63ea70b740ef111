//! This crate provides tools for analyzing spike-sorted extracellular
//! recordings collected during behavioral sessions.
//!
//! # Loading a Population
//!
//! ```rust
//! use std::rc::Rc;
//! use rusty_ephys::population::Population;
//! use rusty_ephys::schema::MetricSchema;
//! use rusty_ephys::session::Session;
//! use rusty_ephys::store::{Dataset, MemoryStore};
//!
//! // A minimal session store: three units across six spikes
//! let mut store = MemoryStore::new();
//! store
//!     .insert("spikes/clusters", Dataset::Ints(vec![1, 1, 2, 2, 2, 3]))
//!     .insert(
//!         "spikes/timestamps",
//!         Dataset::Floats(vec![0.1, 0.2, 1.0, 1.1, 1.2, 5.0]),
//!     );
//! let session = Rc::new(Session::new("2023-05-12", "mlati6", (0.0, 10.0), Box::new(store)));
//!
//! let population = Population::load(session, MetricSchema::v2()).unwrap();
//! assert_eq!(population.len(), 3);
//! assert_eq!(population[1].num_spikes(), 3);
//! ```
//!
//! # Filtering Units
//!
//! ```rust
//! use rusty_ephys::population::UnitFilter;
//!
//! // Routine screening thresholds, restricted to leftward probe motion
//! let criteria = UnitFilter {
//!     probe_motion: Some(-1),
//!     ..UnitFilter::default()
//! };
//! ```
//!
//! # Estimating Firing Rates
//!
//! Units expose peri-event rate estimation relative to behavioral
//! events: windowed counting across trials or bins, bootstrap baseline
//! resampling, and fixed-bin or kernel-density-smoothed PETHs. See
//! [`unit::SingleUnit`].

pub mod error;
pub mod kde;
pub mod population;
pub mod psth;
pub mod schema;
pub mod session;
pub mod sorting;
pub mod store;
pub mod unit;
pub mod utils;

/// Decimal precision for windowed firing-rate estimates.
pub const RATE_DECIMALS: u32 = 2;
