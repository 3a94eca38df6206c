//! Fine-tuning datasets
//!
//! Ties a ragged index, a window sampler and an example format together.
//! Every call to [`FineTuningDataset::iter`] starts a fresh sampler, so a
//! training dataset can be iterated any number of times while each
//! validation pass yields every series exactly once.

use crate::data::format::{ExampleFormat, TrainingBatch, TrainingExample};
use crate::data::ragged::RaggedSeriesIndex;
use crate::data::sampler::{SamplerMode, WindowSampler, Windows};
use crate::data::series::SeriesCollection;
use crate::data::shuffle::ReservoirShuffle;
use crate::error::{ForecastError, Result};
use std::sync::Arc;

/// Windows of a series collection in a model-specific format
#[derive(Debug, Clone)]
pub struct FineTuningDataset {
    index: Arc<RaggedSeriesIndex>,
    context_length: usize,
    prediction_length: usize,
    format: ExampleFormat,
    mode: SamplerMode,
    seed: Option<u64>,
}

impl FineTuningDataset {
    /// Build the dataset; configuration problems surface here, never during
    /// iteration.
    pub fn new(
        collection: &SeriesCollection,
        target_field: &str,
        context_length: usize,
        prediction_length: usize,
        format: ExampleFormat,
        mode: SamplerMode,
    ) -> Result<Self> {
        let index = Arc::new(RaggedSeriesIndex::new(collection, target_field)?);
        // validates lengths and training eligibility up front
        WindowSampler::new(index.clone(), context_length, prediction_length, mode)?;

        Ok(Self {
            index,
            context_length,
            prediction_length,
            format,
            mode,
            seed: None,
        })
    }

    /// Seed split-point sampling and shuffling
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn mode(&self) -> SamplerMode {
        self.mode
    }

    pub fn format(&self) -> &ExampleFormat {
        &self.format
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn prediction_length(&self) -> usize {
        self.prediction_length
    }

    /// Number of series backing the dataset
    pub fn num_series(&self) -> usize {
        self.index.len()
    }

    /// Start a new pass over the data
    pub fn iter(&self) -> Result<FineTuningExamples> {
        let mut sampler = WindowSampler::new(
            self.index.clone(),
            self.context_length,
            self.prediction_length,
            self.mode,
        )?;
        if let Some(seed) = self.seed {
            sampler = sampler.with_seed(seed);
        }
        Ok(FineTuningExamples {
            windows: sampler.into_iter(),
            format: self.format.clone(),
        })
    }

    /// A pseudo-shuffled pass; `None` or `Some(0)` keeps the sampler order
    pub fn shuffle(&self, buffer_size: Option<i64>) -> Result<ReservoirShuffle<FineTuningExamples>> {
        let shuffle_seed = self.seed.map(|seed| seed.wrapping_add(1));
        ReservoirShuffle::from_buffer_size(self.iter()?, buffer_size, shuffle_seed)
    }
}

/// Formatted examples of one pass
#[derive(Debug)]
pub struct FineTuningExamples {
    windows: Windows,
    format: ExampleFormat,
}

impl Iterator for FineTuningExamples {
    type Item = Result<TrainingExample>;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.windows.next()?;
        Some(self.format.apply(window))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.windows.size_hint()
    }
}

/// Groups examples into collated batches; the last batch may be short
#[derive(Debug)]
pub struct Batched<I> {
    source: I,
    batch_size: usize,
    failed: bool,
}

impl<I> Batched<I>
where
    I: Iterator<Item = Result<TrainingExample>>,
{
    pub fn new(source: I, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(Self {
            source,
            batch_size,
            failed: false,
        })
    }
}

impl<I> Iterator for Batched<I>
where
    I: Iterator<Item = Result<TrainingExample>>,
{
    type Item = Result<TrainingBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut examples = Vec::with_capacity(self.batch_size);
        while examples.len() < self.batch_size {
            match self.source.next() {
                Some(Ok(example)) => examples.push(example),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => break,
            }
        }
        if examples.is_empty() {
            return None;
        }
        Some(TrainingBatch::collate(examples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> SeriesCollection {
        SeriesCollection::from_targets(vec![
            ("a", (0..20).map(|v| v as f32).collect::<Vec<_>>()),
            ("b", vec![1.0, 2.0]),
            ("c", (0..8).map(|v| v as f32).collect::<Vec<_>>()),
        ])
        .unwrap()
    }

    #[test]
    fn test_validation_pass_covers_every_series() {
        let dataset = FineTuningDataset::new(
            &collection(),
            "target",
            4,
            3,
            ExampleFormat::RawWindow,
            SamplerMode::Validation,
        )
        .unwrap();

        let examples: Vec<TrainingExample> = dataset.iter().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(examples.len(), 3);
        match &examples[0] {
            TrainingExample::Raw { context, target } => {
                assert_eq!(context, &vec![13.0, 14.0, 15.0, 16.0]);
                assert_eq!(target, &vec![17.0, 18.0, 19.0]);
            }
            other => panic!("unexpected example {:?}", other),
        }

        // a fresh pass starts over
        assert_eq!(dataset.iter().unwrap().count(), 3);
    }

    #[test]
    fn test_training_shuffle_and_batching() {
        let dataset = FineTuningDataset::new(
            &collection(),
            "target",
            4,
            3,
            ExampleFormat::RawWindow,
            SamplerMode::Training,
        )
        .unwrap()
        .with_seed(3);

        let shuffled = dataset.shuffle(Some(16)).unwrap();
        let batches: Vec<TrainingBatch> = Batched::new(shuffled, 8)
            .unwrap()
            .take(5)
            .map(|b| b.unwrap())
            .collect();

        assert_eq!(batches.len(), 5);
        for batch in &batches {
            assert_eq!(batch.len(), 8);
            match batch {
                TrainingBatch::Raw { context, target } => {
                    assert_eq!(context.ncols(), 4);
                    assert_eq!(target.ncols(), 3);
                    assert!(target.iter().all(|v| !v.is_nan()));
                }
                other => panic!("unexpected batch {:?}", other),
            }
        }
    }

    #[test]
    fn test_last_batch_may_be_short() {
        let dataset = FineTuningDataset::new(
            &collection(),
            "target",
            2,
            1,
            ExampleFormat::RawWindow,
            SamplerMode::Validation,
        )
        .unwrap();
        let sizes: Vec<usize> = Batched::new(dataset.iter().unwrap(), 2)
            .unwrap()
            .map(|b| b.unwrap().len())
            .collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_configuration_errors_are_eager() {
        let result = FineTuningDataset::new(
            &collection(),
            "target",
            0,
            3,
            ExampleFormat::RawWindow,
            SamplerMode::Training,
        );
        assert!(matches!(result, Err(ForecastError::InvalidConfiguration(_))));

        let dataset = FineTuningDataset::new(
            &collection(),
            "target",
            4,
            3,
            ExampleFormat::RawWindow,
            SamplerMode::Training,
        )
        .unwrap();
        assert!(matches!(
            dataset.shuffle(Some(-5)),
            Err(ForecastError::InvalidConfiguration(_))
        ));
        assert!(Batched::new(dataset.iter().unwrap(), 0).is_err());
    }
}
