//! Parallel value ranges of component payloads
//!
//! Used for display scaling of coverages. Non-finite values and the no-data
//! value of the component are skipped.

use ndarray::ArrayD;
use rayon::prelude::*;

/// Minimum, maximum and number of valid values of a payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl ValueRange {
    fn single(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            count: 1,
        }
    }

    fn merge(a: Option<Self>, b: Option<Self>) -> Option<Self> {
        match (a, b) {
            (Some(a), Some(b)) => Some(Self {
                min: a.min.min(b.min),
                max: a.max.max(b.max),
                count: a.count + b.count,
            }),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// Range of the valid values in `values`, `None` when there are none.
pub fn value_range(values: &[f64], no_data: f64) -> Option<ValueRange> {
    values
        .par_iter()
        .filter(|v| is_valid(**v, no_data))
        .fold(|| None, |acc, &v| ValueRange::merge(acc, Some(ValueRange::single(v))))
        .reduce(|| None, ValueRange::merge)
}

/// Same as [`value_range`] for an array of any shape.
pub fn array_range(data: &ArrayD<f64>, no_data: f64) -> Option<ValueRange> {
    match data.as_slice() {
        Some(values) => value_range(values, no_data),
        None => value_range(&data.iter().copied().collect::<Vec<_>>(), no_data),
    }
}

fn is_valid(value: f64, no_data: f64) -> bool {
    value.is_finite() && value != no_data
}
