//! Inference datasets
//!
//! Random access to the trailing context of every series, and sequential
//! batches of those contexts stacked into `(batch, context_length)` arrays.

use crate::data::ragged::RaggedSeriesIndex;
use crate::data::series::SeriesCollection;
use crate::error::{ForecastError, Result};
use ndarray::Array2;
use std::iter::FusedIterator;

/// Left-pad variable-length rows with NaN to the longest one and stack them
pub fn left_pad_and_stack(rows: &[Vec<f32>]) -> Array2<f32> {
    let max_len = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = Array2::from_elem((rows.len(), max_len), f32::NAN);
    for (i, row) in rows.iter().enumerate() {
        let offset = max_len - row.len();
        for (j, &value) in row.iter().enumerate() {
            out[[i, offset + j]] = value;
        }
    }
    out
}

/// Fixed-width contexts for every series of a collection
#[derive(Debug, Clone)]
pub struct InferenceDataset {
    index: RaggedSeriesIndex,
    context_length: usize,
}

impl InferenceDataset {
    pub fn new(collection: &SeriesCollection, target_field: &str, context_length: usize) -> Result<Self> {
        if context_length == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "context_length must be positive".to_string(),
            ));
        }
        Ok(Self {
            index: RaggedSeriesIndex::new(collection, target_field)?,
            context_length,
        })
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    /// Context of series `idx`, exactly `context_length` values
    pub fn get(&self, idx: usize) -> Result<Vec<f32>> {
        self.index.extract_last_window(idx, self.context_length)
    }

    /// Contexts in input order, `batch_size` series at a time
    pub fn batches(&self, batch_size: usize) -> Result<InferenceBatches<'_>> {
        if batch_size == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(InferenceBatches {
            dataset: self,
            batch_size,
            cursor: 0,
        })
    }
}

/// Sequential, unshuffled context batches
#[derive(Debug)]
pub struct InferenceBatches<'a> {
    dataset: &'a InferenceDataset,
    batch_size: usize,
    cursor: usize,
}

impl Iterator for InferenceBatches<'_> {
    type Item = Array2<f32>;

    fn next(&mut self) -> Option<Array2<f32>> {
        let n = self.dataset.len();
        if self.cursor >= n {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(n);
        let width = self.dataset.context_length;

        let rows: Vec<Vec<f32>> = (self.cursor..end)
            .map(|idx| self.dataset.index.last_window_at(idx, width))
            .collect();
        self.cursor = end;
        Some(left_pad_and_stack(&rows))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.len().saturating_sub(self.cursor);
        let batches = remaining.div_ceil(self.batch_size);
        (batches, Some(batches))
    }
}

impl ExactSizeIterator for InferenceBatches<'_> {}

impl FusedIterator for InferenceBatches<'_> {}
