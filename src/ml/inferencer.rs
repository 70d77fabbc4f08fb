// ============================================================
// Layer 5 — Greedy Captioner
// ============================================================
// Generates a caption for one image with a trained decoder:
//
//   image → frozen extractor → embedding → init_state
//   token = BEGIN
//   repeat up to L-1 times:
//       logits = decoder.forward_from([token], state)
//       token  = argmax(logits)
//       stop on END
//
// The decoder is rebuilt from the saved run config, then its
// weights are loaded from the chosen checkpoint. The extractor
// comes from the same pretrained file used in training, or from
// the same seed when there was none.
//
// Reference: Burn Book §6 (Inference)
//            Vinyals et al. (2015) Show and Tell

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::application::train_use_case::TrainConfig;
use crate::data::images::materialize;
use crate::domain::{traits::ImageSource, vocabulary::TokenId};
use crate::infra::checkpoint::CheckpointWriter;
use crate::ml::{
    model::{CaptionDecoder, FeatureExtractor},
    trainer::{decoder_config, frozen_extractor},
};

pub struct Captioner<B: Backend> {
    encoder: FeatureExtractor<B>,
    decoder: CaptionDecoder<B>,
    /// Longest token sequence the decoder was trained on
    seq_len: usize,
    device:  B::Device,
}

impl<B: Backend> Captioner<B> {
    pub fn new(
        encoder: FeatureExtractor<B>,
        decoder: CaptionDecoder<B>,
        seq_len: usize,
        device:  B::Device,
    ) -> Self {
        Self { encoder, decoder, seq_len, device }
    }

    /// Rebuild both networks for `cfg` and load decoder weights from `epoch`.
    pub fn from_checkpoint(
        cfg:        &TrainConfig,
        checkpoint: &CheckpointWriter,
        epoch:      usize,
        vocab_size: usize,
        pad_id:     i32,
        seq_len:    usize,
        device:     B::Device,
    ) -> Result<Self> {
        if seq_len < 2 {
            bail!("sequence length {seq_len} leaves no room for a generated token");
        }

        let encoder = frozen_extractor::<B>(cfg, &device)?;

        let decoder: CaptionDecoder<B> = decoder_config(cfg, vocab_size, pad_id).init(&device);
        let decoder = checkpoint.load_decoder(decoder, epoch, &device)?;

        Ok(Self::new(encoder, decoder, seq_len, device))
    }

    /// Greedy ids for one image, BEGIN and END excluded.
    pub fn generate(
        &self,
        images: &dyn ImageSource,
        image:  &str,
        begin:  TokenId,
        end:    TokenId,
    ) -> Result<Vec<TokenId>> {
        let batch  = materialize(images, &[image.to_string()])?;
        let pixels = Tensor::<B, 4>::from_data(TensorData::new(batch.data, batch.shape), &self.device);

        let features   = self.encoder.forward(pixels);
        let mut states = self.decoder.init_state(features);
        let mut token  = begin;
        let mut out    = Vec::new();

        for _ in 0..self.seq_len - 1 {
            let input = Tensor::<B, 2, Int>::from_data(TensorData::new(vec![token], [1, 1]), &self.device);
            let (logits, next_states) = self.decoder.forward_from(input, states);
            states = next_states;

            token = logits.argmax(2).into_scalar().elem::<i64>() as TokenId;
            if token == end {
                break;
            }
            out.push(token);
        }
        Ok(out)
    }
}
