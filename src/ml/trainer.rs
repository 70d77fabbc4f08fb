// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Two-stage training: a frozen extractor feeds a trainable
// decoder. Per batch:
//
//   1. images → extractor on the INNER backend (no autodiff graph)
//   2. Tensor::from_inner(embedding) → decoder forward with grads
//   3. masked NLL → running perplexity (PAD labels ignored)
//   4. loss.backward()
//   5. GradientsParams::from_params(.., trainable ids)
//      → optim.step on exactly the trainable set
//
// Per epoch: train → reset loader → validate every `freq_val`
// epochs → checkpoint every `period` epochs → CSV row.
// Epochs are counted from 0; a cadence k fires when k > 0 and
// epoch % k == 0.
//
// Burn 0.20 backends:
//   - Training uses Autodiff<B> for gradients
//   - decoder.valid() returns the decoder on the inner backend
//   - the validation loader must also be on the inner backend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{sync::Arc, time::Instant};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::CaptionBatch, dataset::CaptionDataset, iterator::CaptionLoader,
};
use crate::domain::traits::ImageSource;
use crate::infra::{
    checkpoint::CheckpointWriter,
    metrics::{EpochMetrics, MetricsLogger},
    pretrained::{apply_weights, load_pretrained, seeded_weights},
};
use crate::ml::{
    metric::{masked_nll, Perplexity},
    model::{CaptionDecoder, CaptionDecoderConfig, FeatureExtractor, FeatureExtractorConfig},
    trainable::TrainableSet,
    validator::{check_decoder_inputs, check_images, EvalSummary, Validator},
};

/// True when a cadence of `every` epochs fires at `epoch` (0-based).
pub fn cadence_fires(every: i64, epoch: usize) -> bool {
    every > 0 && epoch % every as usize == 0
}

/// Epoch range and cadences of one run.
#[derive(Debug, Clone, Copy)]
pub struct FitPlan {
    pub start_epoch: usize,
    pub epochs:      usize,
    pub freq_val:    i64,
    pub period:      i64,
}

/// Per-step numbers, read after the update.
#[derive(Debug, Clone, Copy)]
pub struct StepStats {
    pub loss:   f64,
    pub tokens: usize,
}

// ─── CaptionTrainer ───────────────────────────────────────────────────────────
pub struct CaptionTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CaptionDecoder<B>, B>,
{
    encoder:      FeatureExtractor<B::InnerBackend>,
    decoder:      CaptionDecoder<B>,
    optim:        O,
    trainable:    TrainableSet,
    lr:           f64,
    metric:       Perplexity,
    log_interval: usize,
}

impl<B, O> CaptionTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CaptionDecoder<B>, B>,
{
    /// The trainable set is declared here, once, from the decoder.
    pub fn new(
        encoder:      FeatureExtractor<B::InnerBackend>,
        decoder:      CaptionDecoder<B>,
        optim:        O,
        lr:           f64,
        log_interval: usize,
    ) -> Self {
        let trainable = TrainableSet::declare::<B, _>(&decoder, &CaptionDecoder::<B>::INPUT_SLOTS);
        Self {
            encoder: encoder.no_grad(),
            decoder,
            optim,
            trainable,
            lr,
            metric: Perplexity::new(),
            log_interval: log_interval.max(1),
        }
    }

    pub fn encoder(&self)   -> &FeatureExtractor<B::InnerBackend> { &self.encoder }
    pub fn decoder(&self)   -> &CaptionDecoder<B>                 { &self.decoder }
    pub fn trainable(&self) -> &TrainableSet                      { &self.trainable }
    pub fn metric(&self)    -> &Perplexity                        { &self.metric }

    /// One forward / backward / update cycle.
    pub fn train_step(&mut self, batch: CaptionBatch<B>, declared: [usize; 4]) -> Result<StepStats> {
        check_images(&batch, declared)?;

        // ── Frozen forward: inner backend, nothing recorded ──────────────────
        let features = self.encoder.forward(batch.images.clone().inner());
        let features = Tensor::<B, 2>::from_inner(features);
        check_decoder_inputs(&self.decoder, &features, &batch, declared[0])?;

        // ── Decoder forward with gradients ────────────────────────────────────
        let logits = self.decoder.forward(features, batch.tokens);
        let nll    = masked_nll(logits, batch.labels, self.decoder.pad_id);
        let tokens = nll.count;
        let loss   = nll.mean();

        let nll_sum: f64 = nll.sum.clone().into_scalar().elem::<f64>();
        self.metric.update(nll_sum, tokens);

        // ── Backward + restricted update ──────────────────────────────────────
        let mut grads = loss.backward();
        let grads = GradientsParams::from_params(&mut grads, &self.decoder, self.trainable.ids());
        self.decoder = self.optim.step(self.lr, self.decoder.clone(), grads);

        Ok(StepStats { loss: nll_sum / tokens.max(1) as f64, tokens })
    }

    /// Drain the loader once, then reset it for the next epoch.
    pub fn train_epoch(&mut self, loader: &mut CaptionLoader<B>, epoch: usize) -> Result<EvalSummary> {
        self.metric.reset();
        let declared = loader.image_shape();
        let started  = Instant::now();
        let mut nbatch = 0usize;

        while let Some(batch) = loader.next_batch()? {
            let stats = self.train_step(batch, declared)?;
            nbatch += 1;

            if nbatch % self.log_interval == 0 {
                let speed = (nbatch * declared[0]) as f64 / started.elapsed().as_secs_f64().max(1e-9);
                tracing::debug!(
                    "Epoch[{}] Batch[{}] speed={:.1} samples/sec loss={:.4} perplexity={:.3}",
                    epoch, nbatch, speed, stats.loss, self.metric.value()
                );
            }
        }
        loader.reset();

        Ok(EvalSummary::from_metric(&self.metric))
    }

    /// Run every epoch of `plan`, interleaving validation and checkpoints.
    pub fn fit(
        &mut self,
        plan:       FitPlan,
        train:      &mut CaptionLoader<B>,
        mut val:    Option<&mut Validator<B::InnerBackend>>,
        checkpoint: &CheckpointWriter,
        metrics:    &MetricsLogger,
    ) -> Result<()> {
        for epoch in plan.start_epoch..plan.epochs {
            let train_summary = self.train_epoch(train, epoch)?;

            let mut val_summary = None;
            if cadence_fires(plan.freq_val, epoch) {
                if let Some(v) = val.as_deref_mut() {
                    val_summary = Some(v.run(&self.encoder, &self.decoder.valid())?);
                }
            }

            let row = EpochMetrics::new(epoch, &train_summary, val_summary.as_ref());
            tracing::info!("{}", row.summary_line(plan.epochs));

            if cadence_fires(plan.period, epoch) {
                checkpoint.save(&self.decoder, &self.trainable, &row)?;
                checkpoint.save_optimizer::<B, _>(&self.optim, epoch)?;
            }
            metrics.log(&row)?;
        }

        tracing::info!("Training complete!");
        Ok(())
    }
}

// ─── run_training ─────────────────────────────────────────────────────────────
/// Everything the loop needs that is not a hyper-parameter.
pub struct TrainingData {
    pub train:      Arc<CaptionDataset>,
    pub val:        Option<Arc<CaptionDataset>>,
    pub images:     Arc<dyn ImageSource>,
    pub vocab_size: usize,
    pub pad_id:     i32,
}

pub fn run_training<B: AutodiffBackend>(
    cfg:        &TrainConfig,
    data:       TrainingData,
    checkpoint: CheckpointWriter,
    device:     B::Device,
) -> Result<()> {
    // ── Models ────────────────────────────────────────────────────────────────
    let encoder = frozen_extractor::<B::InnerBackend>(cfg, &device)?;

    let decoder_cfg = decoder_config(cfg, data.vocab_size, data.pad_id);
    let mut decoder: CaptionDecoder<B> = decoder_cfg.init(&device);

    // ── Adam optimiser and resume ─────────────────────────────────────────────
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
    let mut start_epoch = 0;
    if cfg.resume {
        if let Some(epoch) = checkpoint.latest_epoch()? {
            decoder = checkpoint.load_decoder(decoder, epoch, &device)?;
            optim   = checkpoint.load_optimizer::<B, _>(optim, epoch, &device)?;
            start_epoch = epoch + 1;
            tracing::info!("Resuming after epoch {}", epoch);
        } else {
            tracing::warn!("--resume given but no checkpoint found; starting from scratch");
        }
    }
    tracing::info!(
        "Decoder ready: {} LSTM layers, hidden={}, embed={}, vocab={}",
        cfg.num_layers, cfg.num_hidden, cfg.num_embed, data.vocab_size
    );

    // ── Loaders ───────────────────────────────────────────────────────────────
    let mut train_loader = CaptionLoader::<B>::new(
        data.train, data.images.clone(), cfg.batch_size,
        cfg.window, true, cfg.seed, device.clone(),
    )?;

    let mut validator = match data.val {
        Some(val) if cfg.freq_val > 0 => {
            let loader = CaptionLoader::<B::InnerBackend>::new(
                val, data.images, cfg.batch_size,
                cfg.window, true, cfg.seed, device.clone(),
            )
            .context("Validation split cannot fill one batch; lower --batch-size or set --freq-val 0")?;
            Some(Validator::new(loader))
        }
        _ => None,
    };

    // ── Fit ───────────────────────────────────────────────────────────────────
    let metrics = MetricsLogger::new(&cfg.metrics_dir)?;
    let plan = FitPlan {
        start_epoch,
        epochs:   cfg.epochs,
        freq_val: cfg.freq_val,
        period:   cfg.period,
    };

    let mut trainer = CaptionTrainer::new(encoder, decoder, optim, cfg.lr, cfg.log_interval);
    trainer.fit(plan, &mut train_loader, validator.as_mut(), &checkpoint, &metrics)
}

/// The extractor a run trains against. Built the same way by
/// `caption`, which only has the saved config to go on.
pub fn frozen_extractor<B: Backend>(cfg: &TrainConfig, device: &B::Device) -> Result<FeatureExtractor<B>> {
    let encoder: FeatureExtractor<B> = FeatureExtractorConfig::new(cfg.feature_dim).init(device);
    match &cfg.pretrained {
        Some(path) => load_pretrained(encoder, path, device),
        None => {
            tracing::warn!("No pretrained weights given; the frozen extractor is seeded from {}", cfg.seed);
            let weights = seeded_weights(&encoder, cfg.seed);
            Ok(apply_weights(encoder, &weights, device)?)
        }
    }
}

pub fn decoder_config(cfg: &TrainConfig, vocab_size: usize, pad_id: i32) -> CaptionDecoderConfig {
    CaptionDecoderConfig::new(vocab_size, cfg.feature_dim, cfg.num_embed, cfg.num_hidden)
        .with_num_layers(cfg.num_layers)
        .with_pad_id(pad_id)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{bucketing::FixedLength, sampler::WindowPolicy};
    use crate::domain::annotation::Split;
    use crate::ml::trainable::ParamSnapshot;
    use crate::testing::{
        sample_annotations, tiny_vocab, SyntheticImages, TestAutodiffBackend, TestBackend,
    };

    type Inner = TestBackend;

    fn setup() -> (CaptionLoader<TestAutodiffBackend>, FeatureExtractor<Inner>, CaptionDecoder<TestAutodiffBackend>) {
        let device = Default::default();
        let vocab  = tiny_vocab();
        let ds = CaptionDataset::build(&sample_annotations(), Split::Train, &vocab, &FixedLength::new(5)).unwrap();
        let loader = CaptionLoader::<TestAutodiffBackend>::new(
            Arc::new(ds), Arc::new(SyntheticImages::new(8, 8)), 2,
            WindowPolicy::Disjoint, true, 11, device,
        )
        .unwrap();
        let encoder = FeatureExtractorConfig::new(6).with_conv_channels(4).init::<Inner>(&device);
        let decoder = CaptionDecoderConfig::new(vocab.size(), 6, 4, 5).init::<TestAutodiffBackend>(&device);
        (loader, encoder, decoder)
    }

    #[test]
    fn test_cadence() {
        assert!(cadence_fires(5, 0));
        assert!(!cadence_fires(5, 3));
        assert!(cadence_fires(5, 10));
        assert!(!cadence_fires(0, 0));
        assert!(!cadence_fires(-1, 4));
    }

    #[test]
    fn test_one_step_updates_decoder_only() {
        let (mut loader, encoder, decoder) = setup();
        let declared = loader.image_shape();

        let enc_before = ParamSnapshot::capture::<Inner, _>(&encoder);
        let dec_before = ParamSnapshot::capture::<TestAutodiffBackend, _>(&decoder);

        let optim = AdamConfig::new().with_epsilon(1e-8).init();
        let mut trainer = CaptionTrainer::new(encoder, decoder, optim, 0.01, 1);
        let batch = loader.next_batch().unwrap().unwrap();
        let stats = trainer.train_step(batch, declared).unwrap();
        assert!(stats.loss.is_finite());
        assert!(stats.tokens > 0);

        // every trainable tensor moved
        let dec_after = ParamSnapshot::capture::<TestAutodiffBackend, _>(trainer.decoder());
        let changed   = dec_before.changed(&dec_after);
        for name in trainer.trainable().trainable_names() {
            assert!(changed.contains(&name), "{name} was not updated");
        }

        // the frozen extractor is bit-identical
        let enc_after = ParamSnapshot::capture::<Inner, _>(trainer.encoder());
        assert_eq!(enc_before, enc_after);
    }

    #[test]
    fn test_shape_mismatch_is_fatal() {
        let (mut loader, encoder, decoder) = setup();
        let optim = AdamConfig::new().init();
        let mut trainer = CaptionTrainer::new(encoder, decoder, optim, 0.01, 1);
        let batch = loader.next_batch().unwrap().unwrap();
        let err = trainer.train_step(batch, [2, 3, 16, 16]).unwrap_err();
        assert!(err.to_string().contains("image_data"));
    }

    #[test]
    fn test_epoch_runs_every_batch_and_resets() {
        let (mut loader, encoder, decoder) = setup();
        let optim = AdamConfig::new().init();
        let mut trainer = CaptionTrainer::new(encoder, decoder, optim, 0.01, 1);

        let summary = trainer.train_epoch(&mut loader, 0).unwrap();
        assert_eq!(summary.batches, 2);
        assert!(summary.perplexity.is_finite());
        // loader is ready for the next epoch
        assert!(loader.has_next());
    }

    #[test]
    fn test_frozen_extractor_is_rebuilt_identically_from_config() {
        let device = Default::default();
        let cfg = TrainConfig { feature_dim: 6, seed: 3, ..TrainConfig::default() };
        let first  = frozen_extractor::<Inner>(&cfg, &device).unwrap();
        let second = frozen_extractor::<Inner>(&cfg, &device).unwrap();
        assert_eq!(
            ParamSnapshot::capture::<Inner, _>(&first),
            ParamSnapshot::capture::<Inner, _>(&second),
        );

        let other = TrainConfig { seed: 4, ..cfg };
        let third = frozen_extractor::<Inner>(&other, &device).unwrap();
        assert_ne!(
            ParamSnapshot::capture::<Inner, _>(&first),
            ParamSnapshot::capture::<Inner, _>(&third),
        );
    }
}
