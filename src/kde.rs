//! Module implementing Gaussian kernel density estimation.
//!
//! The estimator follows the scipy convention: the bandwidth is given
//! as a factor, and the effective kernel width is the factor times the
//! sample standard deviation. Fitting on fewer than 2 samples is
//! undefined and reported as an error.

use crate::error::EphysError;
use crate::utils::std_dev;

/// A Gaussian kernel density estimate over a one-dimensional sample.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKde {
    sample: Vec<f64>,
    // Effective kernel standard deviation, in sample units.
    bandwidth: f64,
}

impl GaussianKde {
    /// Fit a kernel density to the sample with the given bandwidth factor.
    ///
    /// # Parameters
    /// - `sample`: The observations; at least 2 are required.
    /// - `bandwidth_factor`: Kernel width as a multiple of the sample
    ///   standard deviation. Passing `sd / std` yields an effective
    ///   kernel width of exactly `sd`.
    pub fn fit(sample: &[f64], bandwidth_factor: f64) -> Result<Self, EphysError> {
        if sample.len() < 2 {
            return Err(EphysError::InsufficientSample {
                needed: 2,
                got: sample.len(),
            });
        }
        if !(bandwidth_factor > 0.0) {
            return Err(EphysError::InvalidParameter(format!(
                "Bandwidth factor {} must be positive",
                bandwidth_factor
            )));
        }

        let sigma = std_dev(sample);
        if !(sigma > 0.0) {
            return Err(EphysError::InvalidParameter(
                "Sample standard deviation must be positive".to_string(),
            ));
        }

        Ok(GaussianKde {
            sample: sample.to_vec(),
            bandwidth: bandwidth_factor * sigma,
        })
    }

    /// Returns the effective kernel standard deviation.
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Evaluate the density at a single point.
    pub fn density(&self, t: f64) -> f64 {
        let norm = 1.0 / (self.sample.len() as f64 * self.bandwidth * (2.0 * std::f64::consts::PI).sqrt());
        self.sample
            .iter()
            .map(|&x| (-0.5 * ((t - x) / self.bandwidth).powi(2)).exp())
            .sum::<f64>()
            * norm
    }

    /// Evaluate the density on a grid of points.
    pub fn evaluate(&self, grid: &[f64]) -> Vec<f64> {
        grid.iter().map(|&t| self.density(t)).collect()
    }
}

/// An evenly spaced grid of `num_points` values across `[start, stop]`.
pub fn linspace(start: f64, stop: f64, num_points: usize) -> Vec<f64> {
    match num_points {
        0 => vec![],
        1 => vec![start],
        n => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}
