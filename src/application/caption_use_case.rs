// ============================================================
// Layer 2 — CaptionUseCase
// ============================================================
// Captions one image with a trained checkpoint:
//
//   Step 1: Load the run config saved by `train`   (Layer 6 - infra)
//   Step 2: Load the vocabulary it was trained on  (Layer 6 - infra)
//   Step 3: Pick the checkpoint epoch               (Layer 6 - infra)
//   Step 4: Rebuild models + greedy decode          (Layer 5 - ml)
//   Step 5: Map ids back to words                   (Layer 4 - data)
//
// Reference: Burn Book §6 (Inference)

use anyhow::{anyhow, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};

use crate::application::{device::ComputeDevice, train_use_case::TrainConfig};
use crate::data::{encoder::SequenceEncoder, images::FsImageSource};
use crate::domain::vocabulary::Vocabulary;
use crate::infra::{checkpoint::CheckpointWriter, vocab_store::VocabularyStore};
use crate::ml::inferencer::Captioner;

/// Everything `caption` needs besides the saved run.
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    /// Checkpoint prefix used for training
    pub prefix:  String,
    pub image:   String,
    /// Defaults to the newest checkpoint
    pub epoch:   Option<usize>,
    /// Overrides the device stored in the run config
    pub device:  Option<String>,
    /// Overrides the trained sequence length
    pub max_len: Option<usize>,
}

pub struct CaptionUseCase {
    request: CaptionRequest,
}

impl CaptionUseCase {
    pub fn new(request: CaptionRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<String> {
        let req = &self.request;

        // ── Steps 1-3: run config, vocabulary, epoch ─────────────────────────
        let checkpoint = CheckpointWriter::new(&req.prefix)?;
        let cfg        = checkpoint.load_config()?;
        let vocab      = VocabularyStore::new(&cfg.vocab).load()?;
        let epoch = match req.epoch {
            Some(e) => e,
            None => checkpoint
                .latest_epoch()?
                .ok_or_else(|| anyhow!("No checkpoint found for prefix '{}'", req.prefix))?,
        };
        let seq_len = req.max_len.unwrap_or(cfg.seq_len);
        let device: ComputeDevice = req.device.as_deref().unwrap_or(&cfg.device).parse()?;
        tracing::info!("Captioning '{}' with epoch {} on {}", req.image, epoch, device);

        // ── Step 4: greedy decode on the selected backend ────────────────────
        let ids = match device {
            ComputeDevice::Cpu => caption_with::<NdArray>(
                &cfg, &checkpoint, &vocab, epoch, seq_len, &req.image, NdArrayDevice::default(),
            )?,
            ComputeDevice::Gpu(n) => caption_with::<Wgpu>(
                &cfg, &checkpoint, &vocab, epoch, seq_len, &req.image, WgpuDevice::DiscreteGpu(n),
            )?,
        };

        // ── Step 5: ids → words ──────────────────────────────────────────────
        Ok(SequenceEncoder::new(&vocab).decode(&ids).join(" "))
    }
}

fn caption_with<B: Backend>(
    cfg:        &TrainConfig,
    checkpoint: &CheckpointWriter,
    vocab:      &Vocabulary,
    epoch:      usize,
    seq_len:    usize,
    image:      &str,
    device:     B::Device,
) -> Result<Vec<i32>> {
    let captioner = Captioner::<B>::from_checkpoint(
        cfg, checkpoint, epoch, vocab.size(), vocab.pad(), seq_len, device,
    )?;
    // The image path is used as given, not relative to the training image root.
    let images = FsImageSource::new("", cfg.image_size, cfg.image_size);
    captioner.generate(&images, image, vocab.begin(), vocab.end())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{tests::fixture_config, TrainUseCase};

    #[test]
    fn test_caption_after_training() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { epochs: 1, ..fixture_config(dir.path()) };
        TrainUseCase::new(cfg.clone()).execute().unwrap();

        let image = dir.path().join("images").join("0.png");
        let caption = CaptionUseCase::new(CaptionRequest {
            prefix:  cfg.prefix.clone(),
            image:   image.to_string_lossy().into_owned(),
            epoch:   None,
            device:  None,
            max_len: None,
        })
        .execute()
        .unwrap();

        // at most L-1 = 4 words, none of them markers
        assert!(caption.split_whitespace().count() <= 4);
        assert!(!caption.contains('#'));
    }

    #[test]
    fn test_caption_without_training_fails() {
        let dir = tempfile::tempdir().unwrap();
        let req = CaptionRequest {
            prefix:  dir.path().join("none").to_string_lossy().into_owned(),
            image:   "x.png".into(),
            epoch:   None,
            device:  None,
            max_len: None,
        };
        let err = CaptionUseCase::new(req).execute().unwrap_err();
        assert!(err.to_string().contains("config"));
    }
}
