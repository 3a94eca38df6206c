//! Model-specific example formats
//!
//! A window becomes either a tokenized example (ids, attention mask and
//! labels from a [`SeriesTokenizer`]) or a raw context/target pair. The
//! choice is made once when the dataset is built.

use crate::error::{ForecastError, Result};
use crate::model::SeriesTokenizer;
use super::sampler::Window;
use ndarray::Array2;
use std::fmt;
use std::sync::Arc;

/// Label value ignored by the training loss
pub const IGNORE_LABEL: i64 = -100;

/// How windows are turned into model inputs
#[derive(Clone)]
pub enum ExampleFormat {
    /// Token ids through an external tokenizer
    Tokenized(Arc<dyn SeriesTokenizer>),
    /// Context and target values as they are
    RawWindow,
}

impl ExampleFormat {
    /// Tokenized when a tokenizer is available, raw otherwise
    pub fn from_tokenizer(tokenizer: Option<Arc<dyn SeriesTokenizer>>) -> Self {
        match tokenizer {
            Some(tokenizer) => ExampleFormat::Tokenized(tokenizer),
            None => ExampleFormat::RawWindow,
        }
    }

    pub fn is_tokenized(&self) -> bool {
        matches!(self, ExampleFormat::Tokenized(_))
    }

    /// Convert one window
    pub fn apply(&self, window: Window) -> Result<TrainingExample> {
        match self {
            ExampleFormat::RawWindow => Ok(TrainingExample::Raw {
                context: window.context,
                target: window.future,
            }),
            ExampleFormat::Tokenized(tokenizer) => {
                let context = tokenizer.context_input_transform(&window.context)?;
                let labels = tokenizer.label_input_transform(&window.future, context.scale)?;
                if labels.labels.len() != labels.labels_mask.len() {
                    return Err(ForecastError::ShapeError {
                        expected: format!("{} label mask entries", labels.labels.len()),
                        actual: labels.labels_mask.len().to_string(),
                    });
                }

                let labels = labels
                    .labels
                    .into_iter()
                    .zip(labels.labels_mask)
                    .map(|(label, keep)| if keep { label } else { IGNORE_LABEL })
                    .collect();

                Ok(TrainingExample::Tokenized {
                    input_ids: context.input_ids,
                    attention_mask: context.attention_mask,
                    labels,
                })
            }
        }
    }
}

impl fmt::Debug for ExampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExampleFormat::Tokenized(_) => write!(f, "Tokenized"),
            ExampleFormat::RawWindow => write!(f, "RawWindow"),
        }
    }
}

/// A single training example
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingExample {
    Tokenized {
        input_ids: Vec<i64>,
        attention_mask: Vec<bool>,
        labels: Vec<i64>,
    },
    Raw {
        context: Vec<f32>,
        target: Vec<f32>,
    },
}

/// Examples stacked along a leading batch axis
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingBatch {
    Tokenized {
        input_ids: Array2<i64>,
        attention_mask: Array2<bool>,
        labels: Array2<i64>,
    },
    Raw {
        context: Array2<f32>,
        target: Array2<f32>,
    },
}

impl TrainingBatch {
    /// Stack examples of one format and equal widths
    pub fn collate(examples: Vec<TrainingExample>) -> Result<Self> {
        let Some(first) = examples.first() else {
            return Err(ForecastError::DataError("cannot collate an empty batch".to_string()));
        };

        match first {
            TrainingExample::Raw { .. } => {
                let mut contexts = Vec::with_capacity(examples.len());
                let mut targets = Vec::with_capacity(examples.len());
                for example in examples {
                    match example {
                        TrainingExample::Raw { context, target } => {
                            contexts.push(context);
                            targets.push(target);
                        }
                        TrainingExample::Tokenized { .. } => return Err(mixed_formats()),
                    }
                }
                Ok(TrainingBatch::Raw {
                    context: stack_rows(contexts)?,
                    target: stack_rows(targets)?,
                })
            }
            TrainingExample::Tokenized { .. } => {
                let mut ids = Vec::with_capacity(examples.len());
                let mut masks = Vec::with_capacity(examples.len());
                let mut all_labels = Vec::with_capacity(examples.len());
                for example in examples {
                    match example {
                        TrainingExample::Tokenized {
                            input_ids,
                            attention_mask,
                            labels,
                        } => {
                            ids.push(input_ids);
                            masks.push(attention_mask);
                            all_labels.push(labels);
                        }
                        TrainingExample::Raw { .. } => return Err(mixed_formats()),
                    }
                }
                Ok(TrainingBatch::Tokenized {
                    input_ids: stack_rows(ids)?,
                    attention_mask: stack_rows(masks)?,
                    labels: stack_rows(all_labels)?,
                })
            }
        }
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        match self {
            TrainingBatch::Tokenized { input_ids, .. } => input_ids.nrows(),
            TrainingBatch::Raw { context, .. } => context.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn mixed_formats() -> ForecastError {
    ForecastError::DataError("cannot collate tokenized and raw examples together".to_string())
}

fn stack_rows<T: Clone>(rows: Vec<Vec<T>>) -> Result<Array2<T>> {
    let n_rows = rows.len();
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = rows.iter().find(|row| row.len() != width) {
        return Err(ForecastError::ShapeError {
            expected: format!("rows of width {}", width),
            actual: format!("row of width {}", bad.len()),
        });
    }
    let flat: Vec<T> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((n_rows, width), flat)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sampler::InstanceSplitter;
    use crate::model::{TokenizedContext, TokenizedLabels};

    /// Rounds values to integer ids; NaN maps to 0 and is masked
    struct RoundingTokenizer;

    impl SeriesTokenizer for RoundingTokenizer {
        fn context_input_transform(&self, context: &[f32]) -> Result<TokenizedContext> {
            Ok(TokenizedContext {
                input_ids: context.iter().map(|v| if v.is_nan() { 0 } else { v.round() as i64 }).collect(),
                attention_mask: context.iter().map(|v| !v.is_nan()).collect(),
                scale: 1.0,
            })
        }

        fn label_input_transform(&self, future: &[f32], _scale: f32) -> Result<TokenizedLabels> {
            Ok(TokenizedLabels {
                labels: future.iter().map(|v| if v.is_nan() { 0 } else { v.round() as i64 }).collect(),
                labels_mask: future.iter().map(|v| !v.is_nan()).collect(),
            })
        }
    }

    fn window() -> Window {
        InstanceSplitter::new(3, 3).split(&[1.0, 2.0, 3.0, 4.0], 2, 0)
    }

    #[test]
    fn test_raw_format() {
        let example = ExampleFormat::RawWindow.apply(window()).unwrap();
        match example {
            TrainingExample::Raw { context, target } => {
                assert!(context[0].is_nan());
                assert_eq!(&context[1..], &[1.0, 2.0]);
                assert_eq!(&target[..2], &[3.0, 4.0]);
                assert!(target[2].is_nan());
            }
            other => panic!("unexpected example {:?}", other),
        }
    }

    #[test]
    fn test_tokenized_format_masks_padded_labels() {
        let format = ExampleFormat::from_tokenizer(Some(Arc::new(RoundingTokenizer)));
        assert!(format.is_tokenized());

        let example = format.apply(window()).unwrap();
        assert_eq!(
            example,
            TrainingExample::Tokenized {
                input_ids: vec![0, 1, 2],
                attention_mask: vec![false, true, true],
                labels: vec![3, 4, IGNORE_LABEL],
            }
        );
    }

    #[test]
    fn test_collate_raw() {
        let examples = vec![
            TrainingExample::Raw { context: vec![1.0, 2.0], target: vec![3.0] },
            TrainingExample::Raw { context: vec![4.0, 5.0], target: vec![6.0] },
        ];
        let batch = TrainingBatch::collate(examples).unwrap();
        assert_eq!(batch.len(), 2);
        match batch {
            TrainingBatch::Raw { context, target } => {
                assert_eq!(context.shape(), &[2, 2]);
                assert_eq!(context[[1, 0]], 4.0);
                assert_eq!(target.shape(), &[2, 1]);
            }
            other => panic!("unexpected batch {:?}", other),
        }
    }

    #[test]
    fn test_collate_rejects_mixed_and_ragged() {
        let mixed = vec![
            TrainingExample::Raw { context: vec![1.0], target: vec![1.0] },
            TrainingExample::Tokenized { input_ids: vec![1], attention_mask: vec![true], labels: vec![1] },
        ];
        assert!(matches!(TrainingBatch::collate(mixed), Err(ForecastError::DataError(_))));

        let ragged = vec![
            TrainingExample::Raw { context: vec![1.0, 2.0], target: vec![1.0] },
            TrainingExample::Raw { context: vec![1.0], target: vec![1.0] },
        ];
        assert!(matches!(TrainingBatch::collate(ragged), Err(ForecastError::ShapeError { .. })));

        assert!(TrainingBatch::collate(Vec::new()).is_err());
    }
}
