//! Known pretrained model presets

use serde::{Deserialize, Serialize};

/// Weight precision a model is loaded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorchDtype {
    Auto,
    Bfloat16,
    Float32,
    Float64,
}

/// Resource and batching defaults for a named model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelPreset {
    pub name: &'static str,
    /// Minimum number of GPUs required
    pub num_gpus: usize,
    pub default_dtype: TorchDtype,
    pub default_batch_size: usize,
}

pub const MODEL_PRESETS: &[ModelPreset] = &[
    ModelPreset { name: "chronos-t5-tiny", num_gpus: 0, default_dtype: TorchDtype::Auto, default_batch_size: 16 },
    ModelPreset { name: "chronos-t5-mini", num_gpus: 0, default_dtype: TorchDtype::Auto, default_batch_size: 16 },
    ModelPreset { name: "chronos-t5-small", num_gpus: 1, default_dtype: TorchDtype::Bfloat16, default_batch_size: 16 },
    ModelPreset { name: "chronos-t5-base", num_gpus: 1, default_dtype: TorchDtype::Bfloat16, default_batch_size: 16 },
    ModelPreset { name: "chronos-t5-large", num_gpus: 1, default_dtype: TorchDtype::Bfloat16, default_batch_size: 8 },
    ModelPreset { name: "chronos-bolt-mini", num_gpus: 0, default_dtype: TorchDtype::Auto, default_batch_size: 256 },
    ModelPreset { name: "chronos-bolt-small", num_gpus: 0, default_dtype: TorchDtype::Auto, default_batch_size: 256 },
    ModelPreset { name: "chronos-bolt-base", num_gpus: 0, default_dtype: TorchDtype::Auto, default_batch_size: 256 },
];

/// Short names accepted in place of a full model path
pub const MODEL_ALIASES: &[(&str, &str)] = &[
    ("tiny", "autogluon/chronos-t5-tiny"),
    ("mini", "autogluon/chronos-t5-mini"),
    ("small", "autogluon/chronos-t5-small"),
    ("base", "autogluon/chronos-t5-base"),
    ("large", "autogluon/chronos-t5-large"),
    ("bolt-mini", "autogluon/chronos-bolt-mini"),
    ("bolt-small", "autogluon/chronos-bolt-small"),
    ("bolt-base", "autogluon/chronos-bolt-base"),
];

/// Batch size for models without a preset
pub const FALLBACK_BATCH_SIZE: usize = 8;

/// Expand an alias; anything else is returned unchanged
pub fn resolve_model_path(path: &str) -> String {
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == path)
        .map(|(_, full)| full.to_string())
        .unwrap_or_else(|| path.to_string())
}

impl ModelPreset {
    /// Preset for the last path component of `model_path`, if known
    pub fn lookup(model_path: &str) -> Option<ModelPreset> {
        let name = model_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(model_path);
        MODEL_PRESETS.iter().copied().find(|preset| preset.name == name)
    }

    /// Default inference batch size for a model path
    pub fn default_batch_size_for(model_path: &str) -> usize {
        Self::lookup(model_path)
            .map(|p| p.default_batch_size)
            .unwrap_or(FALLBACK_BATCH_SIZE)
    }

    pub fn default_dtype_for(model_path: &str) -> TorchDtype {
        Self::lookup(model_path)
            .map(|p| p.default_dtype)
            .unwrap_or(TorchDtype::Auto)
    }

    pub fn min_num_gpus_for(model_path: &str) -> usize {
        Self::lookup(model_path).map(|p| p.num_gpus).unwrap_or(0)
    }
}
