//! Ragged series index
//!
//! Flattens a collection of variable-length series into one contiguous
//! array plus cumulative offsets, so the tail of any series can be sliced
//! out in constant time.

use crate::error::{ForecastError, Result};
use super::series::SeriesCollection;

/// Concatenated series values with offset pointers.
///
/// Series `i` occupies `values[offsets[i]..offsets[i + 1]]`. Immutable
/// after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct RaggedSeriesIndex {
    values: Vec<f32>,
    offsets: Vec<usize>,
}

impl RaggedSeriesIndex {
    /// Flatten the `target_field` of every item in input order
    pub fn new(collection: &SeriesCollection, target_field: &str) -> Result<Self> {
        let mut values = Vec::with_capacity(collection.total_len());
        let mut offsets = Vec::with_capacity(collection.len() + 1);
        offsets.push(0);

        for item in collection {
            let series = item.field(target_field).ok_or_else(|| {
                ForecastError::FieldNotFound(format!(
                    "field '{}' missing for item '{}'",
                    target_field,
                    item.item_id()
                ))
            })?;
            values.extend_from_slice(series);
            offsets.push(values.len());
        }

        Ok(Self { values, offsets })
    }

    /// Build directly from raw series, mostly useful for tests and benches
    pub fn from_series<S: AsRef<[f32]>>(series: &[S]) -> Self {
        let mut values = Vec::new();
        let mut offsets = Vec::with_capacity(series.len() + 1);
        offsets.push(0);
        for s in series {
            values.extend_from_slice(s.as_ref());
            offsets.push(values.len());
        }
        Self { values, offsets }
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cumulative offsets, `len() + 1` entries starting at 0
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// All observations, concatenated in input order
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Observations of series `index`
    pub fn series(&self, index: usize) -> Result<&[f32]> {
        if index >= self.len() {
            return Err(ForecastError::DataError(format!(
                "series index {} out of range for {} series",
                index,
                self.len()
            )));
        }
        Ok(&self.values[self.offsets[index]..self.offsets[index + 1]])
    }

    /// Observations of series `index`; callers guarantee `index < len()`
    pub(crate) fn series_at(&self, index: usize) -> &[f32] {
        &self.values[self.offsets[index]..self.offsets[index + 1]]
    }

    /// Length of series `index`
    pub fn series_len(&self, index: usize) -> Result<usize> {
        self.series(index).map(<[f32]>::len)
    }

    /// Length of the longest series
    pub fn max_series_len(&self) -> usize {
        self.offsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0)
    }

    /// Last `width` observations of series `index`, left-padded with NaN.
    ///
    /// Always returns exactly `width` values.
    pub fn extract_last_window(&self, index: usize, width: usize) -> Result<Vec<f32>> {
        if width == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "window width must be positive".to_string(),
            ));
        }
        self.series(index)?;
        Ok(self.last_window_at(index, width))
    }

    /// Unchecked form of [`RaggedSeriesIndex::extract_last_window`] for
    /// indices already known to be in range
    pub(crate) fn last_window_at(&self, index: usize, width: usize) -> Vec<f32> {
        let series = self.series_at(index);
        left_pad(&series[series.len().saturating_sub(width)..], width)
    }
}

/// Left-pad `values` with NaN up to `width`; `values` must not be longer
pub(crate) fn left_pad(values: &[f32], width: usize) -> Vec<f32> {
    debug_assert!(values.len() <= width);
    let mut out = Vec::with_capacity(width);
    out.resize(width - values.len(), f32::NAN);
    out.extend_from_slice(values);
    out
}
