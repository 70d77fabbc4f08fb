// ============================================================
// Layer 6 — Checkpoint Writer
// ============================================================
// Persists the decoder, and only the decoder, keyed by a path
// prefix plus the epoch index:
//
//   {prefix}-config.json     ← run configuration (written once)
//   {prefix}-0000.mpk        ← decoder record, full precision
//   {prefix}-0000-optim.mpk  ← Adam moments, keyed by param id
//   {prefix}-0000.json       ← manifest: epoch, tensor names, metrics
//   {prefix}-0005.mpk
//   {prefix}-0005.json
//   {prefix}-latest.json     ← number of the newest epoch saved
//
// The record holds every decoder tensor: trainable weights and
// any auxiliary state alike. The manifest lists which is which.
// The frozen extractor is never written; it is rebuilt from the
// pretrained file or the run seed.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    optim::Optimizer,
    prelude::*,
    record::{DefaultRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::infra::metrics::EpochMetrics;
use crate::ml::{model::CaptionDecoder, trainable::TrainableSet};

/// What a checkpoint contains, next to the weights themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointManifest {
    pub epoch:     usize,
    pub trainable: Vec<String>,
    pub auxiliary: Vec<String>,
    pub metrics:   EpochMetrics,
}

pub struct CheckpointWriter {
    prefix: String,
}

impl CheckpointWriter {
    /// Creates the prefix's parent directory if needed.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if let Some(parent) = PathBuf::from(&prefix).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Cannot create checkpoint directory '{}'", parent.display())
                })?;
            }
        }
        Ok(Self { prefix })
    }

    fn path(&self, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}-{}", self.prefix, suffix))
    }

    fn weights_path(&self, epoch: usize) -> PathBuf {
        self.path(&format!("{epoch:04}.mpk"))
    }

    fn optimizer_path(&self, epoch: usize) -> PathBuf {
        self.path(&format!("{epoch:04}-optim.mpk"))
    }

    fn manifest_path(&self, epoch: usize) -> PathBuf {
        self.path(&format!("{epoch:04}.json"))
    }

    pub fn save<B: Backend>(
        &self,
        decoder:   &CaptionDecoder<B>,
        trainable: &TrainableSet,
        metrics:   &EpochMetrics,
    ) -> Result<()> {
        let epoch = metrics.epoch;
        let path  = self.weights_path(epoch);

        DefaultRecorder::new()
            .record(decoder.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let manifest = CheckpointManifest {
            epoch,
            trainable: trainable.trainable_names(),
            auxiliary: trainable.auxiliary_names(),
            metrics:   metrics.clone(),
        };
        let manifest_path = self.manifest_path(epoch);
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
            .with_context(|| format!("Cannot write manifest '{}'", manifest_path.display()))?;

        fs::write(self.path("latest.json"), serde_json::to_string(&epoch)?)
            .context("Failed to update the latest-epoch pointer")?;

        tracing::info!("Saved checkpoint for epoch {} to '{}'", epoch, path.display());
        Ok(())
    }

    /// Restore decoder weights saved at `epoch`.
    pub fn load_decoder<B: Backend>(
        &self,
        decoder: CaptionDecoder<B>,
        epoch:   usize,
        device:  &B::Device,
    ) -> Result<CaptionDecoder<B>> {
        let path = self.weights_path(epoch);
        let record = DefaultRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;
        tracing::info!("Loaded decoder from epoch {}", epoch);
        Ok(decoder.load_record(record))
    }

    pub fn save_optimizer<B, O>(&self, optim: &O, epoch: usize) -> Result<()>
    where
        B: AutodiffBackend,
        O: Optimizer<CaptionDecoder<B>, B>,
    {
        let path = self.optimizer_path(epoch);
        Recorder::<B>::record(&DefaultRecorder::new(), optim.to_record(), path.clone())
            .with_context(|| format!("Failed to save optimizer state to '{}'", path.display()))?;
        Ok(())
    }

    /// Restore optimizer state saved at `epoch`. Checkpoints without
    /// one leave `optim` fresh.
    pub fn load_optimizer<B, O>(&self, optim: O, epoch: usize, device: &B::Device) -> Result<O>
    where
        B: AutodiffBackend,
        O: Optimizer<CaptionDecoder<B>, B>,
    {
        let path = self.optimizer_path(epoch);
        if !path.exists() {
            tracing::warn!("No optimizer state for epoch {}; Adam restarts from zero moments", epoch);
            return Ok(optim);
        }
        let record: O::Record = Recorder::<B>::load(&DefaultRecorder::new(), path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))?;
        Ok(optim.load_record(record))
    }

    pub fn load_manifest(&self, epoch: usize) -> Result<CheckpointManifest> {
        let path = self.manifest_path(epoch);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read manifest '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Newest saved epoch, or None when nothing has been saved yet.
    pub fn latest_epoch(&self) -> Result<Option<usize>> {
        let path = self.path("latest.json");
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(Some(serde_json::from_str::<usize>(&s)?))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.path("config.json");
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.path("config.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'caption'.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{model::CaptionDecoderConfig, trainable::ParamSnapshot, validator::EvalSummary};
    use crate::testing::{TestAutodiffBackend, TestBackend};
    use burn::optim::{AdamConfig, GradientsParams};

    fn metrics(epoch: usize) -> EpochMetrics {
        let s = EvalSummary { loss: 1.0, perplexity: 1f64.exp(), batches: 2 };
        EpochMetrics::new(epoch, &s, None)
    }

    #[test]
    fn test_save_then_load_restores_decoder() {
        let dir    = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("run").join("train");
        let writer = CheckpointWriter::new(prefix.to_string_lossy()).unwrap();
        assert_eq!(writer.latest_epoch().unwrap(), None);

        let device = <TestBackend as Backend>::Device::default();
        let config = CaptionDecoderConfig::new(6, 4, 3, 5);
        let saved: CaptionDecoder<TestBackend> = config.init(&device);
        let set = TrainableSet::declare::<TestBackend, _>(&saved, &[]);
        writer.save(&saved, &set, &metrics(5)).unwrap();

        assert_eq!(writer.latest_epoch().unwrap(), Some(5));
        assert!(dir.path().join("run").join("train-0005.mpk").exists());

        let fresh: CaptionDecoder<TestBackend> = config.init(&device);
        let loaded = writer.load_decoder(fresh, 5, &device).unwrap();
        assert_eq!(
            ParamSnapshot::capture::<TestBackend, _>(&saved),
            ParamSnapshot::capture::<TestBackend, _>(&loaded),
        );

        let manifest = writer.load_manifest(5).unwrap();
        assert_eq!(manifest.epoch, 5);
        assert_eq!(manifest.metrics.batches, 2);
    }

    #[test]
    fn test_config_round_trip() {
        let dir    = tempfile::tempdir().unwrap();
        let writer = CheckpointWriter::new(dir.path().join("m").to_string_lossy()).unwrap();
        let cfg = TrainConfig { epochs: 3, ..TrainConfig::default() };
        writer.save_config(&cfg).unwrap();
        assert_eq!(writer.load_config().unwrap().epochs, 3);
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir    = tempfile::tempdir().unwrap();
        let writer = CheckpointWriter::new(dir.path().join("m").to_string_lossy()).unwrap();
        let device = <TestBackend as Backend>::Device::default();
        let fresh: CaptionDecoder<TestBackend> = CaptionDecoderConfig::new(6, 4, 3, 5).init(&device);
        assert!(writer.load_decoder(fresh, 1, &device).is_err());
    }

    #[test]
    fn test_optimizer_state_survives_a_restart() {
        let dir    = tempfile::tempdir().unwrap();
        let writer = CheckpointWriter::new(dir.path().join("m").to_string_lossy()).unwrap();
        let device = <TestAutodiffBackend as Backend>::Device::default();

        let decoder: CaptionDecoder<TestAutodiffBackend> =
            CaptionDecoderConfig::new(6, 4, 3, 5).init(&device);
        let mut optim = AdamConfig::new().init();
        let loss  = decoder.output.weight.val().sum();
        let grads = GradientsParams::from_grads(loss.backward(), &decoder);
        let _decoder = optim.step(0.1, decoder, grads);
        assert_eq!(optim.to_record().len(), 1);

        writer.save_optimizer::<TestAutodiffBackend, _>(&optim, 2).unwrap();
        let restored = writer
            .load_optimizer::<TestAutodiffBackend, _>(AdamConfig::new().init(), 2, &device)
            .unwrap();
        assert_eq!(restored.to_record().len(), 1);

        // nothing saved for epoch 3: a fresh optimizer comes back
        let fresh = writer
            .load_optimizer::<TestAutodiffBackend, _>(AdamConfig::new().init(), 3, &device)
            .unwrap();
        assert!(fresh.to_record().is_empty());
    }
}
