//! Forecast results

use crate::error::{ForecastError, Result};
use ndarray::{Array2, Array3};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Mean and quantile forecasts for every input series, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    pub item_ids: Vec<String>,
    pub quantile_levels: Vec<f64>,
    /// Shape `(items, prediction_length)`
    pub mean: Array2<f32>,
    /// Shape `(items, prediction_length, quantile_levels)`
    pub quantiles: Array3<f32>,
}

impl ForecastOutput {
    pub fn new(
        item_ids: Vec<String>,
        quantile_levels: Vec<f64>,
        mean: Array2<f32>,
        quantiles: Array3<f32>,
    ) -> Result<Self> {
        let (items, horizon) = mean.dim();
        let expected = (item_ids.len(), horizon, quantile_levels.len());
        if items != item_ids.len() || quantiles.dim() != expected {
            return Err(ForecastError::ShapeError {
                expected: format!("mean {:?}, quantiles {:?}", (item_ids.len(), horizon), expected),
                actual: format!("mean {:?}, quantiles {:?}", mean.dim(), quantiles.dim()),
            });
        }
        Ok(Self {
            item_ids,
            quantile_levels,
            mean,
            quantiles,
        })
    }

    pub fn num_items(&self) -> usize {
        self.item_ids.len()
    }

    pub fn prediction_length(&self) -> usize {
        self.mean.ncols()
    }

    /// Column name used for a quantile level
    pub fn quantile_column(level: f64) -> String {
        format!("{}", level)
    }

    /// Long format: `item_id`, `step` (1-based), `mean`, one column per level
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let horizon = self.prediction_length();
        let rows = self.num_items() * horizon;

        let mut ids = Vec::with_capacity(rows);
        let mut steps = Vec::with_capacity(rows);
        for id in &self.item_ids {
            for h in 0..horizon {
                ids.push(id.as_str());
                steps.push((h + 1) as u32);
            }
        }
        let mean: Vec<f32> = self.mean.iter().copied().collect();

        let mut columns: Vec<Column> = vec![
            Series::new("item_id".into(), &ids).into(),
            Series::new("step".into(), &steps).into(),
            Series::new("mean".into(), &mean).into(),
        ];
        for (k, &level) in self.quantile_levels.iter().enumerate() {
            let values: Vec<f32> = self
                .quantiles
                .index_axis(ndarray::Axis(2), k)
                .iter()
                .copied()
                .collect();
            columns.push(Series::new(Self::quantile_column(level).into(), &values).into());
        }

        Ok(DataFrame::new(columns)?)
    }
}
