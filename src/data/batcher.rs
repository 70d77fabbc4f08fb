// ============================================================
// Layer 4 — Caption Batcher
// ============================================================
// Implements Burn's Batcher trait: stacks a Vec of samples with
// their materialized pixels into one CaptionBatch.
//
//   images: [batch_size, 3, H, W]   float
//   tokens: [batch_size, L]         int  (BEGIN, ids, PAD)
//   labels: [batch_size, L]         int  (ids, PAD, END)
//
// Every item of a batch comes from the same bucket, so they all
// share L: items are flattened into one buffer and reshaped,
// no dynamic padding happens here.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::CaptionSample;

/// A sample whose image has already been decoded.
#[derive(Debug, Clone)]
pub struct CaptionItem {
    pub sample: CaptionSample,
    /// [3, H, W] flattened
    pub pixels: Vec<f32>,
}

// ─── CaptionBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct CaptionBatch<B: Backend> {
    /// Image references, row i of every tensor belongs to image_refs[i]
    pub image_refs: Vec<String>,

    /// [batch_size, 3, H, W]
    pub images: Tensor<B, 4>,

    /// [batch_size, L]
    pub tokens: Tensor<B, 2, Int>,

    /// [batch_size, L]
    pub labels: Tensor<B, 2, Int>,
}

impl<B: Backend> CaptionBatch<B> {
    pub fn batch_size(&self) -> usize { self.image_refs.len() }

    pub fn seq_len(&self) -> usize { self.tokens.dims()[1] }
}

// ─── CaptionBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct CaptionBatcher {
    /// [channels, height, width] of every image
    pub image_shape: [usize; 3],
}

impl CaptionBatcher {
    pub fn new(image_shape: [usize; 3]) -> Self {
        Self { image_shape }
    }
}

impl<B: Backend> Batcher<B, CaptionItem, CaptionBatch<B>> for CaptionBatcher {
    fn batch(&self, items: Vec<CaptionItem>, device: &B::Device) -> CaptionBatch<B> {
        let batch_size = items.len();
        let seq_len    = items.first().map(|i| i.sample.seq_len()).unwrap_or(0);
        let [c, h, w]  = self.image_shape;

        let mut pixels = Vec::with_capacity(batch_size * c * h * w);
        let mut tokens = Vec::with_capacity(batch_size * seq_len);
        let mut labels = Vec::with_capacity(batch_size * seq_len);
        let mut image_refs = Vec::with_capacity(batch_size);

        for item in items {
            pixels.extend_from_slice(&item.pixels);
            tokens.extend_from_slice(&item.sample.tokens);
            labels.extend_from_slice(&item.sample.labels);
            image_refs.push(item.sample.image);
        }

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, c, h, w]), device,
        );
        let tokens = Tensor::<B, 2, Int>::from_data(
            TensorData::new(tokens, [batch_size, seq_len]), device,
        );
        let labels = Tensor::<B, 2, Int>::from_data(
            TensorData::new(labels, [batch_size, seq_len]), device,
        );

        CaptionBatch { image_refs, images, tokens, labels }
    }
}
