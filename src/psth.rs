//! Module implementing peri-event spike binning.
//!
//! All windows are expressed in seconds relative to the supplied event
//! timestamps. Spike trains are assumed sorted in time, as stored, so
//! window extraction is a pair of binary searches.

use nalgebra::DMatrix;

use crate::error::EphysError;

/// The spikes falling in `[lo, hi)` of a sorted spike train.
fn window_slice(spike_times: &[f64], lo: f64, hi: f64) -> &[f64] {
    let start = spike_times.partition_point(|&t| t < lo);
    let stop = spike_times.partition_point(|&t| t < hi);
    &spike_times[start..stop]
}

fn check_window(window: (f64, f64)) -> Result<(), EphysError> {
    if !(window.1 > window.0) {
        return Err(EphysError::InvalidParameter(format!(
            "Window ({}, {}) must have positive duration",
            window.0, window.1
        )));
    }
    Ok(())
}

/// Count the spikes in one window per event.
///
/// # Returns
/// One count per event, in event order.
pub fn event_window_counts(
    event_times: &[f64],
    spike_times: &[f64],
    window: (f64, f64),
) -> Result<Vec<f64>, EphysError> {
    check_window(window)?;
    Ok(event_times
        .iter()
        .map(|&t| window_slice(spike_times, t + window.0, t + window.1).len() as f64)
        .collect())
}

/// Bin the spikes around each event into fixed-size bins.
///
/// The window is divided into `floor(duration / binsize)` bins; a
/// trailing remainder narrower than one bin is dropped.
///
/// # Returns
/// The bin-center time axis and an events-by-bins count matrix.
pub fn peri_event_counts(
    event_times: &[f64],
    spike_times: &[f64],
    window: (f64, f64),
    binsize: f64,
) -> Result<(Vec<f64>, DMatrix<f64>), EphysError> {
    check_window(window)?;
    if !(binsize > 0.0) {
        return Err(EphysError::InvalidParameter(format!(
            "Bin size {} must be positive",
            binsize
        )));
    }

    let num_bins = ((window.1 - window.0) / binsize) as usize;
    if num_bins == 0 {
        return Err(EphysError::InvalidParameter(
            "Window duration must be at least one bin".to_string(),
        ));
    }

    let times: Vec<f64> = (0..num_bins)
        .map(|i| window.0 + (i as f64 + 0.5) * binsize)
        .collect();

    let mut counts = DMatrix::<f64>::zeros(event_times.len(), num_bins);
    for (event_index, &event_time) in event_times.iter().enumerate() {
        let lo = event_time + window.0;
        let hi = lo + num_bins as f64 * binsize;
        for &spike_time in window_slice(spike_times, lo, hi) {
            let bin_index = ((spike_time - lo) / binsize) as usize;
            if bin_index < num_bins {
                counts[(event_index, bin_index)] += 1.0;
            }
        }
    }

    Ok((times, counts))
}

/// Pool the event-relative spike offsets from all events in one sample.
pub fn pooled_offsets(event_times: &[f64], spike_times: &[f64], window: (f64, f64)) -> Vec<f64> {
    let mut offsets = Vec::new();
    for &event_time in event_times {
        let lo = event_time + window.0;
        let hi = event_time + window.1;
        offsets.extend(window_slice(spike_times, lo, hi).iter().map(|&t| t - event_time));
    }
    offsets
}
