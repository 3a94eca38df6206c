//! Series collections
//!
//! An ordered collection of named time series in long format: every item
//! owns one or more equally long numeric fields, with missing observations
//! stored as NaN.

use crate::error::{ForecastError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::Path;

/// Name of the field holding the forecast target
pub const DEFAULT_TARGET: &str = "target";

/// A single named time series with one or more fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesItem {
    item_id: String,
    length: usize,
    fields: BTreeMap<String, Vec<f32>>,
}

impl TimeSeriesItem {
    /// Create an item whose `target` field holds `values`
    pub fn new(item_id: impl Into<String>, values: Vec<f32>) -> Self {
        let mut fields = BTreeMap::new();
        let length = values.len();
        fields.insert(DEFAULT_TARGET.to_string(), values);
        Self {
            item_id: item_id.into(),
            length,
            fields,
        }
    }

    /// Add another field; it must match the length of the existing ones
    pub fn with_field(mut self, name: impl Into<String>, values: Vec<f32>) -> Result<Self> {
        let name = name.into();
        if values.len() != self.length {
            return Err(ForecastError::ShapeError {
                expected: format!("{} values for field '{}'", self.length, name),
                actual: values.len().to_string(),
            });
        }
        self.fields.insert(name, values);
        Ok(self)
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Values of a field, if present
    pub fn field(&self, name: &str) -> Option<&[f32]> {
        self.fields.get(name).map(|v| v.as_slice())
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Ordered collection of time series, read-only once handed to a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesCollection {
    items: Vec<TimeSeriesItem>,
}

impl SeriesCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from items, rejecting duplicate item ids
    pub fn from_items(items: Vec<TimeSeriesItem>) -> Result<Self> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());
        if let Some(dup) = items.iter().find(|item| !seen.insert(item.item_id.as_str())) {
            return Err(ForecastError::DataError(format!(
                "duplicate item id '{}'",
                dup.item_id
            )));
        }
        Ok(Self { items })
    }

    /// Convenience constructor for target-only series
    pub fn from_targets<I, S>(series: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        Self::from_items(
            series
                .into_iter()
                .map(|(id, values)| TimeSeriesItem::new(id, values))
                .collect(),
        )
    }

    /// Append an item; linear in the collection size, use
    /// [`SeriesCollection::from_items`] to build large collections
    pub fn push(&mut self, item: TimeSeriesItem) -> Result<()> {
        if self.items.iter().any(|existing| existing.item_id == item.item_id) {
            return Err(ForecastError::DataError(format!(
                "duplicate item id '{}'",
                item.item_id
            )));
        }
        self.items.push(item);
        Ok(())
    }

    /// Number of series
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[TimeSeriesItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeSeriesItem> {
        self.items.iter()
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.item_id.clone()).collect()
    }

    /// Length of every series, in order
    pub fn num_timesteps_per_item(&self) -> Vec<usize> {
        self.items.iter().map(TimeSeriesItem::len).collect()
    }

    /// Length of the longest series (0 for an empty collection)
    pub fn max_len(&self) -> usize {
        self.items.iter().map(TimeSeriesItem::len).max().unwrap_or(0)
    }

    /// Total number of observations across all series
    pub fn total_len(&self) -> usize {
        self.items.iter().map(TimeSeriesItem::len).sum()
    }

    /// Keep only the items at `indices`, preserving input order
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let wanted: HashSet<usize> = indices.iter().copied().collect();
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.items.len()) {
            return Err(ForecastError::DataError(format!(
                "item index {} out of range for {} items",
                bad,
                self.items.len()
            )));
        }
        let items = self
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| wanted.contains(i))
            .map(|(_, item)| item.clone())
            .collect();
        Ok(Self { items })
    }

    /// Build a collection from a long-format frame sorted by item.
    ///
    /// Rows of one item must be contiguous. Nulls in the target column
    /// become NaN.
    pub fn from_dataframe(df: &DataFrame, id_column: &str, target_column: &str) -> Result<Self> {
        let ids = df
            .column(id_column)
            .map_err(|_| ForecastError::FieldNotFound(id_column.to_string()))?
            .cast(&DataType::String)?;
        let targets = df
            .column(target_column)
            .map_err(|_| ForecastError::FieldNotFound(target_column.to_string()))?
            .cast(&DataType::Float32)?;

        let ids = ids.as_materialized_series().str()?;
        let targets = targets.as_materialized_series().f32()?;

        let mut items = ContiguousItems::default();
        let mut current: Option<(String, Vec<f32>)> = None;

        for (id, value) in ids.into_iter().zip(targets.into_iter()) {
            let id = id.ok_or_else(|| {
                ForecastError::DataError(format!("null value in item id column '{}'", id_column))
            })?;
            let value = value.unwrap_or(f32::NAN);

            match current.as_mut() {
                Some((current_id, values)) if current_id.as_str() == id => values.push(value),
                _ => {
                    if let Some((done_id, values)) = current.take() {
                        items.push(done_id, values)?;
                    }
                    current = Some((id.to_string(), vec![value]));
                }
            }
        }

        if let Some((done_id, values)) = current.take() {
            items.push(done_id, values)?;
        }

        Ok(Self { items: items.items })
    }

    /// Load a long-format CSV file with a header row
    pub fn from_csv(path: impl AsRef<Path>, id_column: &str, target_column: &str) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file)
            .finish()?;
        Self::from_dataframe(&df, id_column, target_column)
    }
}

/// Items read from contiguous row runs, with the ids seen so far
#[derive(Default)]
struct ContiguousItems {
    items: Vec<TimeSeriesItem>,
    seen: HashSet<String>,
}

impl ContiguousItems {
    fn push(&mut self, item_id: String, values: Vec<f32>) -> Result<()> {
        if !self.seen.insert(item_id.clone()) {
            return Err(ForecastError::DataError(format!(
                "rows for item '{}' are not contiguous",
                item_id
            )));
        }
        self.items.push(TimeSeriesItem::new(item_id, values));
        Ok(())
    }
}

impl<'a> IntoIterator for &'a SeriesCollection {
    type Item = &'a TimeSeriesItem;
    type IntoIter = std::slice::Iter<'a, TimeSeriesItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = SeriesCollection::from_targets(vec![
            ("a", vec![1.0, 2.0]),
            ("a", vec![3.0]),
        ]);
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_many_items_build_in_linear_time() {
        let n = 50_000;
        let start = std::time::Instant::now();
        let collection =
            SeriesCollection::from_targets((0..n).map(|i| (format!("item_{}", i), vec![i as f32])))
                .unwrap();
        assert_eq!(collection.len(), n);
        assert!(start.elapsed() < std::time::Duration::from_secs(5));

        let ids = (0..n)
            .map(|i| format!("item_{}", i))
            .chain(std::iter::once("item_0".to_string()));
        let with_dup = SeriesCollection::from_targets(ids.map(|id| (id, vec![0.0])));
        assert!(matches!(with_dup, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_field_length_checked() {
        let item = TimeSeriesItem::new("a", vec![1.0, 2.0, 3.0]);
        assert!(item.clone().with_field("price", vec![1.0]).is_err());
        let item = item.with_field("price", vec![4.0, 5.0, 6.0]).unwrap();
        assert_eq!(item.field("price"), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(item.field("volume"), None);
    }

    #[test]
    fn test_select_preserves_order() {
        let collection = SeriesCollection::from_targets(vec![
            ("a", vec![1.0]),
            ("b", vec![2.0, 2.0]),
            ("c", vec![3.0, 3.0, 3.0]),
        ])
        .unwrap();

        let subset = collection.select(&[2, 0]).unwrap();
        assert_eq!(subset.item_ids(), vec!["a".to_string(), "c".to_string()]);
        assert!(collection.select(&[5]).is_err());
        assert_eq!(collection.max_len(), 3);
        assert_eq!(collection.total_len(), 6);
    }

    #[test]
    fn test_from_dataframe_groups_rows() {
        let df = df!(
            "item_id" => &["x", "x", "y", "y", "y"],
            "target" => &[Some(1.0f64), None, Some(3.0), Some(4.0), Some(5.0)]
        )
        .unwrap();

        let collection = SeriesCollection::from_dataframe(&df, "item_id", "target").unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.num_timesteps_per_item(), vec![2, 3]);

        let x = collection.items()[0].field(DEFAULT_TARGET).unwrap();
        assert_eq!(x[0], 1.0);
        assert!(x[1].is_nan());
    }

    #[test]
    fn test_from_dataframe_rejects_interleaved_items() {
        let df = df!(
            "item_id" => &["x", "y", "x"],
            "target" => &[1.0f64, 2.0, 3.0]
        )
        .unwrap();

        let result = SeriesCollection::from_dataframe(&df, "item_id", "target");
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_missing_column() {
        let df = df!("item_id" => &["x"], "value" => &[1.0f64]).unwrap();
        let result = SeriesCollection::from_dataframe(&df, "item_id", "target");
        assert!(matches!(result, Err(ForecastError::FieldNotFound(_))));
    }

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "item_id,timestamp,target").unwrap();
        writeln!(file, "1,2024-01-01,10.0").unwrap();
        writeln!(file, "1,2024-01-02,11.0").unwrap();
        writeln!(file, "2,2024-01-01,20.0").unwrap();
        file.flush().unwrap();

        let collection = SeriesCollection::from_csv(file.path(), "item_id", "target").unwrap();
        assert_eq!(collection.item_ids(), vec!["1".to_string(), "2".to_string()]);
        assert_eq!(collection.num_timesteps_per_item(), vec![2, 1]);
    }
}
