// ============================================================
// Layer 4 — Caption Loader (epoch iterator)
// ============================================================
// Ties the pieces of the data layer together for one split:
//
//   BatchSampler   → which indices form the next batch
//   CaptionDataset → the encoded samples at those indices
//   ImageSource    → pixels for each sample's image
//   CaptionBatcher → tensors on the target device
//
// Unlike Burn's DataLoader this iterator is explicitly reset at
// the end of each epoch and signals exhaustion with Ok(None),
// so training and validation loops can interleave freely, each
// with its own loader. Image failures surface as Err and stop
// the run.
//
// Reference: Burn Book §4 (DataLoader), Rust Book §13 (Iterators)

use anyhow::{Context, Result};
use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};
use std::sync::Arc;

use crate::data::{
    batcher::{CaptionBatch, CaptionBatcher, CaptionItem},
    dataset::CaptionDataset,
    images::materialize,
    sampler::{BatchSampler, WindowPolicy},
};
use crate::domain::traits::ImageSource;

pub struct CaptionLoader<B: Backend> {
    dataset: Arc<CaptionDataset>,
    sampler: BatchSampler,
    images:  Arc<dyn ImageSource>,
    batcher: CaptionBatcher,
    device:  B::Device,
}

impl<B: Backend> CaptionLoader<B> {
    pub fn new(
        dataset:    Arc<CaptionDataset>,
        images:     Arc<dyn ImageSource>,
        batch_size: usize,
        policy:     WindowPolicy,
        shuffle:    bool,
        seed:       u64,
        device:     B::Device,
    ) -> Result<Self> {
        let groups = dataset.groups().iter().map(|g| g.indices.clone()).collect();
        let sampler = BatchSampler::new(groups, batch_size, policy, shuffle, seed)
            .with_context(|| format!("Cannot batch the '{}' split", dataset.split()))?;
        let batcher = CaptionBatcher::new(images.shape());

        tracing::info!(
            "[{}] {} batches of {} per epoch ({} windows)",
            dataset.split(),
            sampler.batches_per_epoch(),
            batch_size,
            policy
        );
        Ok(Self { dataset, sampler, images, batcher, device })
    }

    pub fn reset(&mut self) {
        self.sampler.reset();
    }

    pub fn has_next(&self) -> bool {
        self.sampler.has_next()
    }

    /// Next batch of the epoch, Ok(None) once it is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<CaptionBatch<B>>> {
        let Some(indices) = self.sampler.next() else {
            return Ok(None);
        };

        let samples = indices
            .iter()
            .map(|&i| {
                self.dataset
                    .get(i)
                    .with_context(|| format!("sample index {i} out of range"))
            })
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<String> = samples.iter().map(|s| s.image.clone()).collect();

        let pixels    = materialize(self.images.as_ref(), &refs)?;
        let per_image = pixels.data.len() / refs.len().max(1);
        let items: Vec<CaptionItem> = samples
            .into_iter()
            .zip(pixels.data.chunks_exact(per_image.max(1)))
            .map(|(sample, px)| CaptionItem { sample, pixels: px.to_vec() })
            .collect();

        Ok(Some(Batcher::<B, _, _>::batch(&self.batcher, items, &self.device)))
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.sampler.batches_per_epoch()
    }

    pub fn batch_size(&self) -> usize {
        self.sampler.batch_size()
    }

    /// Declared image tensor shape: [batch_size, C, H, W]
    pub fn image_shape(&self) -> [usize; 4] {
        let [c, h, w] = self.images.shape();
        [self.batch_size(), c, h, w]
    }

    /// Declared sequence lengths a batch may carry
    pub fn seq_lens(&self) -> Vec<usize> {
        self.dataset.groups().iter().map(|g| g.seq_len).collect()
    }

    pub fn dataset(&self) -> &CaptionDataset {
        &self.dataset
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::bucketing::FixedLength;
    use crate::domain::annotation::Split;
    use crate::testing::{sample_annotations, tiny_vocab, SyntheticImages, TestBackend};

    fn loader(images: SyntheticImages, batch_size: usize) -> CaptionLoader<TestBackend> {
        let ds = CaptionDataset::build(
            &sample_annotations(), Split::Train, &tiny_vocab(), &FixedLength::new(5),
        ).unwrap();
        CaptionLoader::new(
            Arc::new(ds), Arc::new(images), batch_size,
            WindowPolicy::Disjoint, true, 1, Default::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_epoch_yields_full_batches_then_none() {
        let mut l = loader(SyntheticImages::new(4, 4), 2);
        assert_eq!(l.batches_per_epoch(), 2);
        assert_eq!(l.image_shape(), [2, 3, 4, 4]);

        let mut count = 0;
        while let Some(batch) = l.next_batch().unwrap() {
            assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
            assert_eq!(batch.tokens.dims(), [2, 5]);
            count += 1;
        }
        assert_eq!(count, 2);
        assert!(!l.has_next());

        l.reset();
        assert!(l.next_batch().unwrap().is_some());
    }

    #[test]
    fn test_missing_image_aborts() {
        let mut l = loader(SyntheticImages::new(2, 2).with_missing("a.jpg"), 4);
        // the only batch contains both captions of a.jpg
        assert!(l.next_batch().is_err());
    }

    #[test]
    fn test_batch_larger_than_split_fails_at_construction() {
        let ds = CaptionDataset::build(
            &sample_annotations(), Split::Val, &tiny_vocab(), &FixedLength::new(6),
        ).unwrap();
        let res = CaptionLoader::<TestBackend>::new(
            Arc::new(ds), Arc::new(SyntheticImages::new(2, 2)), 2,
            WindowPolicy::Disjoint, true, 1, Default::default(),
        );
        assert!(res.is_err());
    }
}
