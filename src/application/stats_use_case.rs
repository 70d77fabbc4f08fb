// ============================================================
// Layer 2 — StatsUseCase
// ============================================================
// Indexes every split exactly as training would and reports
// what the pipeline will see, without touching the model:
//
//   records / captions / kept / discarded / UNK tokens
//   samples per sequence length
//   batches per epoch for the configured batch size
//
// Reference: Rust Book §13 (Iterators)

use anyhow::Result;
use std::collections::BTreeMap;

use crate::application::train_use_case::{prepare_data, TrainConfig};
use crate::data::{dataset::CaptionDataset, sampler::BatchSampler};
use crate::domain::annotation::Split;

/// Per-split numbers shown by the `stats` command.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitStats {
    pub split:          Split,
    pub records:        usize,
    pub captions:       usize,
    pub kept:           usize,
    pub discarded:      usize,
    pub unknown_tokens: usize,
    pub per_bucket:     BTreeMap<usize, usize>,
    /// None when the split cannot fill a single batch
    pub batches:        Option<usize>,
}

impl SplitStats {
    fn from_dataset(ds: &CaptionDataset, cfg: &TrainConfig) -> Self {
        let report = ds.report();
        let groups = ds.groups().iter().map(|g| g.indices.clone()).collect();
        let batches = BatchSampler::new(groups, cfg.batch_size, cfg.window, false, cfg.seed)
            .ok()
            .map(|s| s.batches_per_epoch());
        Self {
            split:          ds.split(),
            records:        report.records,
            captions:       report.captions,
            kept:           report.kept,
            discarded:      report.discarded,
            unknown_tokens: report.unknown_tokens,
            per_bucket:     report.per_bucket.clone(),
            batches,
        }
    }
}

pub struct DatasetStats {
    pub vocab_size: usize,
    pub seq_lens:   Vec<usize>,
    pub splits:     Vec<SplitStats>,
}

pub struct StatsUseCase {
    config: TrainConfig,
}

impl StatsUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<DatasetStats> {
        let cfg = &self.config;
        let prepared = prepare_data(cfg)?;
        let test = CaptionDataset::build(
            &prepared.annotations, Split::Test, &prepared.vocab, prepared.strategy.as_ref(),
        )?;

        let splits = [&prepared.train, &prepared.val, &test]
            .into_iter()
            .map(|ds| SplitStats::from_dataset(ds, cfg))
            .collect();

        Ok(DatasetStats {
            vocab_size: prepared.vocab.size(),
            seq_lens:   prepared.strategy.buckets(),
            splits,
        })
    }
}
