// ============================================================
// Layer 5 — Validation Driver
// ============================================================
// Forward-only pass over the validation split:
//
//   images → frozen extractor → decoder → masked NLL → metric
//
// No backward, no optimiser, no parameter writes. Runs on the
// inner backend with `decoder.valid()` and owns its own loader
// and Perplexity, so nothing it does leaks into the training
// state.
//
// Reference: Burn Book §5 (Validation with model.valid())

use anyhow::Result;
use burn::prelude::*;

use crate::data::{batcher::CaptionBatch, iterator::CaptionLoader};
use crate::domain::error::PipelineError;
use crate::ml::{
    metric::{masked_nll, Perplexity},
    model::{CaptionDecoder, FeatureExtractor},
};

/// Loss and perplexity of one pass over a split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    pub loss:       f64,
    pub perplexity: f64,
    pub batches:    usize,
}

impl EvalSummary {
    pub fn from_metric(metric: &Perplexity) -> Self {
        Self {
            loss:       metric.mean_loss(),
            perplexity: metric.value(),
            batches:    metric.batches(),
        }
    }
}

// ─── Shape contracts ──────────────────────────────────────────────────────────
pub fn check_shape(name: &str, expected: &[usize], actual: &[usize]) -> Result<(), PipelineError> {
    if expected != actual {
        return Err(PipelineError::ShapeMismatch {
            name:     name.to_string(),
            expected: expected.to_vec(),
            actual:   actual.to_vec(),
        });
    }
    Ok(())
}

/// Images must match what the loader declared.
pub fn check_images<B: Backend>(
    batch:    &CaptionBatch<B>,
    declared: [usize; 4],
) -> Result<(), PipelineError> {
    check_shape(FeatureExtractor::<B>::INPUT_SLOTS[0], &declared, &batch.images.dims())
}

/// Embedding, tokens and labels must match the decoder's declared slots.
pub fn check_decoder_inputs<B: Backend>(
    decoder:  &CaptionDecoder<B>,
    features: &Tensor<B, 2>,
    batch:    &CaptionBatch<B>,
    batch_size: usize,
) -> Result<(), PipelineError> {
    let actual = [
        features.dims().to_vec(),
        batch.tokens.dims().to_vec(),
        batch.labels.dims().to_vec(),
    ];
    for ((name, expected), actual) in decoder
        .input_shapes(batch_size, batch.seq_len())
        .iter()
        .zip(actual.iter())
    {
        check_shape(name, expected, actual)?;
    }
    Ok(())
}

// ─── Validator ────────────────────────────────────────────────────────────────
pub struct Validator<B: Backend> {
    loader: CaptionLoader<B>,
    metric: Perplexity,
}

impl<B: Backend> Validator<B> {
    pub fn new(loader: CaptionLoader<B>) -> Self {
        Self { loader, metric: Perplexity::new() }
    }

    pub fn run(
        &mut self,
        encoder: &FeatureExtractor<B>,
        decoder: &CaptionDecoder<B>,
    ) -> Result<EvalSummary> {
        self.metric.reset();
        let declared = self.loader.image_shape();

        while let Some(batch) = self.loader.next_batch()? {
            check_images(&batch, declared)?;
            let features = encoder.forward(batch.images.clone());
            check_decoder_inputs(decoder, &features, &batch, declared[0])?;

            let logits = decoder.forward(features, batch.tokens);
            let nll    = masked_nll(logits, batch.labels, decoder.pad_id);
            self.metric.update(nll.sum.into_scalar().elem::<f64>(), nll.count);
        }
        self.loader.reset();

        Ok(EvalSummary::from_metric(&self.metric))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        bucketing::FixedLength, dataset::CaptionDataset, sampler::WindowPolicy,
    };
    use crate::domain::annotation::Split;
    use crate::ml::model::{CaptionDecoderConfig, FeatureExtractorConfig};
    use crate::ml::trainable::ParamSnapshot;
    use crate::testing::{sample_annotations, tiny_vocab, SyntheticImages, TestBackend};
    use std::sync::Arc;

    #[test]
    fn test_check_shape_reports_both_shapes() {
        let err = check_shape("word_data", &[2, 5], &[2, 6]).unwrap_err();
        assert_eq!(err, PipelineError::ShapeMismatch {
            name:     "word_data".into(),
            expected: vec![2, 5],
            actual:   vec![2, 6],
        });
    }

    #[test]
    fn test_validation_is_forward_only() {
        let device = Default::default();
        let vocab  = tiny_vocab();
        let ds = CaptionDataset::build(&sample_annotations(), Split::Train, &vocab, &FixedLength::new(5)).unwrap();
        let loader = CaptionLoader::<TestBackend>::new(
            Arc::new(ds), Arc::new(SyntheticImages::new(8, 8)), 2,
            WindowPolicy::Disjoint, false, 0, device,
        )
        .unwrap();

        let encoder = FeatureExtractorConfig::new(6).with_conv_channels(4).init::<TestBackend>(&device);
        let decoder = CaptionDecoderConfig::new(vocab.size(), 6, 4, 5).init::<TestBackend>(&device);
        let before  = ParamSnapshot::capture::<TestBackend, _>(&decoder);

        let mut validator = Validator::new(loader);
        let first  = validator.run(&encoder, &decoder).unwrap();
        let second = validator.run(&encoder, &decoder).unwrap();

        assert_eq!(first.batches, 2);
        assert!(first.perplexity.is_finite());
        // same data, same weights, metric reset between runs
        assert!((first.loss - second.loss).abs() < 1e-6);
        assert!(before.changed(&ParamSnapshot::capture::<TestBackend, _>(&decoder)).is_empty());
    }
}
