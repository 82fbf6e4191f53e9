//! Summary statistics over frames and sample sets.

use ndarray::ArrayView2;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("NaN value encountered at index {0}")]
    NaNEncountered(usize),
    #[error("No data provided (empty set)")]
    NoData,
}

/// Population mean and standard deviation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanStd {
    pub mean: f64,
    pub std_dev: f64,
}

/// Two-pass population mean and standard deviation.
pub fn mean_std<I>(values: I) -> Result<MeanStd, StatsError>
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: Clone,
{
    let iter = values.into_iter();

    let mut sum = 0.0;
    let mut count = 0usize;
    for (index, value) in iter.clone().enumerate() {
        if value.is_nan() {
            return Err(StatsError::NaNEncountered(index));
        }
        sum += value;
        count += 1;
    }
    if count == 0 {
        return Err(StatsError::NoData);
    }

    let mean = sum / count as f64;
    let variance = iter.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

    Ok(MeanStd {
        mean,
        std_dev: variance.sqrt(),
    })
}

/// Fraction of samples ignored at each end of the histogram
pub const PERCENTILE_TRIM: f64 = 0.005;

/// Intensity range of a frame with the extreme tails trimmed.
///
/// A 256-bin histogram is accumulated; the low value is the first intensity whose
/// cumulative count reaches 0.5% of the pixels, the high value the first whose
/// cumulative count reaches 99.5%. Hot pixels and dead columns therefore do not
/// stretch the thresholds. Returns `None` for an empty frame.
pub fn trimmed_min_max(frame: ArrayView2<u8>) -> Option<(u8, u8)> {
    let total = frame.len();
    if total == 0 {
        return None;
    }

    let mut histogram = [0usize; 256];
    for &value in frame.iter() {
        histogram[value as usize] += 1;
    }

    let low_count = PERCENTILE_TRIM * total as f64;
    let high_count = ((1.0 - PERCENTILE_TRIM) * total as f64).floor() as usize;

    let mut min = None;
    let mut max = None;
    let mut cumulative = 0usize;
    for (value, &count) in histogram.iter().enumerate() {
        cumulative += count;
        if min.is_none() && cumulative as f64 >= low_count {
            min = Some(value as u8);
        }
        if max.is_none() && cumulative >= high_count {
            max = Some(value as u8);
        }
        if min.is_some() && max.is_some() {
            break;
        }
    }

    Some((min?, max?))
}
