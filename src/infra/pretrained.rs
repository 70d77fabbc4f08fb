// ============================================================
// Layer 6 — Pretrained Weight Loader
// ============================================================
// Initializes the frozen extractor from a flat safetensors file:
//
//   "arg:conv1.weight" → [C, 3, 3, 3]  f32
//   "arg:fc.bias"      → [F]           f32
//   "arg:image_data"   → ...           skipped (pure input slot)
//
// Names may carry an "arg:" or "aux:" prefix; it is stripped.
// Every extractor parameter must be present with the exact
// shape and dtype F32. The file is read once; nothing is ever
// written back.
//
// Without a file the same injector is fed seeded Glorot-uniform
// weights (zero biases), so a run and a later `caption` built
// from the same config see the same extractor.
//
// Reference: Burn Book §5 (Records), safetensors format

use anyhow::{Context, Result};
use burn::{
    module::{ModuleMapper, Param},
    prelude::*,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use safetensors::{Dtype, SafeTensors};
use std::{collections::HashMap, fs, path::Path};

use crate::domain::error::PipelineError;
use crate::ml::{model::FeatureExtractor, trainable::named_params};

const NAME_PREFIXES: [&str; 2] = ["arg:", "aux:"];

/// Decoded f32 entries keyed by bare parameter name.
pub type WeightMap = HashMap<String, (Vec<usize>, Vec<f32>)>;

fn bare_name(name: &str) -> &str {
    NAME_PREFIXES
        .iter()
        .find_map(|p| name.strip_prefix(p))
        .unwrap_or(name)
}

/// Parse a safetensors buffer, skipping entries named after `input_slots`.
pub fn read_weights(bytes: &[u8], input_slots: &[&str]) -> Result<WeightMap> {
    let tensors = SafeTensors::deserialize(bytes).context("Invalid safetensors file")?;
    let mut weights = WeightMap::new();

    for (name, view) in tensors.tensors() {
        let bare = bare_name(&name);
        if input_slots.contains(&bare) {
            tracing::debug!("Skipping input slot '{}' in pretrained file", bare);
            continue;
        }
        if view.dtype() != Dtype::F32 {
            return Err(PipelineError::UnsupportedDtype {
                name:  bare.to_string(),
                dtype: format!("{:?}", view.dtype()),
            }
            .into());
        }
        let values = view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        weights.insert(bare.to_string(), (view.shape().to_vec(), values));
    }
    Ok(weights)
}

// ─── WeightInjector ───────────────────────────────────────────────────────────
/// Replaces every float parameter with the entry of the same path.
struct WeightInjector<'a, B: Backend> {
    weights: &'a WeightMap,
    device:  &'a B::Device,
    path:    Vec<String>,
    used:    usize,
    error:   Option<PipelineError>,
}

impl<B: Backend> ModuleMapper<B> for WeightInjector<'_, B> {
    fn enter_module(&mut self, name: &str, _container_type: &str) {
        self.path.push(name.to_string());
    }

    fn exit_module(&mut self, _name: &str, _container_type: &str) {
        self.path.pop();
    }

    fn map_float<const D: usize>(&mut self, param: Param<Tensor<B, D>>) -> Param<Tensor<B, D>> {
        let (id, tensor, mapper) = param.consume();
        if self.error.is_some() {
            return Param::from_mapped_value(id, tensor, mapper);
        }

        let name = self.path.join(".");
        let Some((shape, values)) = self.weights.get(&name) else {
            self.error = Some(PipelineError::MissingPretrainedWeight(name));
            return Param::from_mapped_value(id, tensor, mapper);
        };

        let expected = tensor.dims().to_vec();
        if *shape != expected {
            self.error = Some(PipelineError::ShapeMismatch {
                name,
                expected,
                actual: shape.clone(),
            });
            return Param::from_mapped_value(id, tensor, mapper);
        }

        self.used += 1;
        let loaded = Tensor::<B, D>::from_data(TensorData::new(values.clone(), shape.clone()), self.device);
        Param::from_mapped_value(id, loaded, mapper)
    }
}

/// Overwrite every extractor parameter from `weights`.
pub fn apply_weights<B: Backend>(
    encoder: FeatureExtractor<B>,
    weights: &WeightMap,
    device:  &B::Device,
) -> Result<FeatureExtractor<B>, PipelineError> {
    let mut injector = WeightInjector::<B> {
        weights,
        device,
        path:  Vec::new(),
        used:  0,
        error: None,
    };
    let encoder = encoder.map(&mut injector);
    if let Some(err) = injector.error {
        return Err(err);
    }
    if injector.used < weights.len() {
        tracing::debug!("{} pretrained entries had no matching parameter", weights.len() - injector.used);
    }
    Ok(encoder.no_grad())
}

pub fn load_pretrained<B: Backend>(
    encoder: FeatureExtractor<B>,
    path:    impl AsRef<Path>,
    device:  &B::Device,
) -> Result<FeatureExtractor<B>> {
    let path  = path.as_ref();
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read pretrained weights from '{}'", path.display()))?;
    let weights = read_weights(&bytes, &FeatureExtractor::<B>::INPUT_SLOTS)?;
    let encoder = apply_weights(encoder, &weights, device)
        .with_context(|| format!("Pretrained file '{}' does not fit the extractor", path.display()))?;
    tracing::info!("Loaded {} pretrained tensors from '{}'", weights.len(), path.display());
    Ok(encoder)
}

/// Deterministic stand-in for a pretrained file, keyed like one.
pub fn seeded_weights<B: Backend>(encoder: &FeatureExtractor<B>, seed: u64) -> WeightMap {
    let mut rng = StdRng::seed_from_u64(seed);
    named_params::<B, _>(encoder)
        .into_iter()
        .filter(|p| p.float)
        .map(|p| {
            let numel: usize = p.shape.iter().product();
            let values = if p.shape.len() < 2 {
                vec![0.0; numel]
            } else {
                let fan_a = p.shape[0];
                let fan_b = numel / fan_a.max(1);
                let bound = (6.0 / (fan_a + fan_b) as f32).sqrt();
                (0..numel).map(|_| rng.random_range(-bound..bound)).collect()
            };
            (p.name, (p.shape, values))
        })
        .collect()
}
