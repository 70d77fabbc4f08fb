// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load annotation records        (Layer 4 - data)
//   Step 2: Load / build vocabulary        (Layer 6 - infra)
//   Step 3: Choose the bucket strategy     (Layer 4 - data)
//   Step 4: Index train and val splits     (Layer 4 - data)
//   Step 5: Save config for captioning     (Layer 6 - infra)
//   Step 6: Run the training loop          (Layer 5 - ml)
//           on the selected device
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use burn::backend::{
    ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::device::ComputeDevice;
use crate::data::{
    bucketing::{BucketStrategy, Bucketing},
    dataset::CaptionDataset,
    images::FsImageSource,
    loader::AnnotationLoader,
    sampler::WindowPolicy,
};
use crate::domain::{
    annotation::{AnnotationSet, Split},
    traits::AnnotationSource,
    vocabulary::Vocabulary,
};
use crate::infra::{checkpoint::CheckpointWriter, vocab_store::VocabularyStore};
use crate::ml::trainer::{run_training, TrainingData};

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a run. Saved as `{prefix}-config.json` so that
// `caption` can rebuild the same decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub annotations:  String,
    pub vocab:        String,
    pub min_count:    usize,
    pub image_root:   String,
    pub image_size:   usize,
    pub feature_dim:  usize,
    pub pretrained:   Option<String>,
    pub epochs:       usize,
    pub batch_size:   usize,
    pub num_hidden:   usize,
    pub num_embed:    usize,
    pub num_layers:   usize,
    pub lr:           f64,
    /// Validate every `freq_val` epochs; ≤ 0 disables.
    pub freq_val:     i64,
    /// Checkpoint every `period` epochs; ≤ 0 disables.
    pub period:       i64,
    pub device:       String,
    pub prefix:       String,
    pub bucketing:    Bucketing,
    pub window:       WindowPolicy,
    pub seed:         u64,
    pub log_interval: usize,
    pub metrics_dir:  String,
    pub resume:       bool,
    /// Declared token length, filled in once the data is indexed.
    #[serde(default)]
    pub seq_len:      usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            annotations:  "data/dataset.json".to_string(),
            vocab:        "data/vocab.json".to_string(),
            min_count:    1,
            image_root:   "data/images".to_string(),
            image_size:   224,
            feature_dim:  4096,
            pretrained:   None,
            epochs:       20,
            batch_size:   50,
            num_hidden:   256,
            num_embed:    256,
            num_layers:   1,
            lr:           0.01,
            freq_val:     5,
            period:       5,
            device:       "cpu".to_string(),
            prefix:       "./checkpoint/train".to_string(),
            bucketing:    Bucketing::Fixed,
            window:       WindowPolicy::Disjoint,
            seed:         42,
            log_interval: 20,
            metrics_dir:  "./checkpoint".to_string(),
            resume:       false,
            seq_len:      0,
        }
    }
}

// ─── Shared data preparation ─────────────────────────────────────────────────
/// Annotations, vocabulary and both indexed splits.
pub struct PreparedData {
    pub annotations: AnnotationSet,
    pub vocab:       Vocabulary,
    pub strategy:    Box<dyn BucketStrategy>,
    pub train:       CaptionDataset,
    pub val:         CaptionDataset,
}

/// Steps 1-4, shared with the stats use case.
pub fn prepare_data(cfg: &TrainConfig) -> Result<PreparedData> {
    // ── Step 1: Annotation records ───────────────────────────────────────────
    tracing::info!("Loading annotations from '{}'", cfg.annotations);
    let annotations = AnnotationLoader::new(&cfg.annotations).load()?;
    tracing::info!("Loaded {} image records", annotations.images.len());

    // ── Step 2: Vocabulary ───────────────────────────────────────────────────
    let vocab = VocabularyStore::new(&cfg.vocab).load_or_build(&annotations, cfg.min_count)?;

    // ── Step 3: Bucket strategy ──────────────────────────────────────────────
    let strategy = cfg.bucketing.build(
        annotations.max_caption_len(),
        &annotations.caption_lengths(Split::Train),
        cfg.batch_size,
    )?;
    tracing::info!("Sequence lengths ({}): {:?}", cfg.bucketing, strategy.buckets());

    // ── Step 4: Index both splits ────────────────────────────────────────────
    let train = CaptionDataset::build(&annotations, Split::Train, &vocab, strategy.as_ref())?;
    let val   = CaptionDataset::build(&annotations, Split::Val,   &vocab, strategy.as_ref())?;

    Ok(PreparedData { annotations, vocab, strategy, train, val })
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let device: ComputeDevice = self.config.device.parse()?;
        let prepared = prepare_data(&self.config)?;

        let mut cfg = self.config.clone();
        cfg.seq_len = prepared.strategy.max_len();

        // ── Step 5: Save config for captioning ───────────────────────────────
        let checkpoint = CheckpointWriter::new(&cfg.prefix)?;
        checkpoint.save_config(&cfg)?;

        let val = if prepared.val.samples().is_empty() {
            tracing::warn!("Validation split is empty; validation disabled");
            None
        } else {
            Some(Arc::new(prepared.val))
        };
        let data = TrainingData {
            train:      Arc::new(prepared.train),
            val,
            images:     Arc::new(FsImageSource::new(&cfg.image_root, cfg.image_size, cfg.image_size)),
            vocab_size: prepared.vocab.size(),
            pad_id:     prepared.vocab.pad(),
        };

        // ── Step 6: Training loop on the selected backend ────────────────────
        tracing::info!("Training on {}", device);
        match device {
            ComputeDevice::Cpu => {
                run_training::<Autodiff<NdArray>>(&cfg, data, checkpoint, NdArrayDevice::default())
            }
            ComputeDevice::Gpu(n) => {
                run_training::<Autodiff<Wgpu>>(&cfg, data, checkpoint, WgpuDevice::DiscreteGpu(n))
            }
        }
    }
}
