// ============================================================
// Layer 5 — Captioning Models
// ============================================================
// Two networks, trained very differently:
//
//   FeatureExtractor (frozen)
//     image [B, 3, H, W]
//       → conv 3×3 /2 → relu → conv 3×3 /2 → relu
//       → adaptive avg pool 1×1 → linear → relu
//       → image embedding [B, F]
//     Weights come from a pretrained file and never change.
//     It always runs on the inner (non-autodiff) backend.
//
//   CaptionDecoder (trainable)
//     embedding [B, F] → tanh(linear) → initial hidden state
//     tokens    [B, L] → word embedding [B, L, E]
//       → stacked LSTM layers [B, L, H]
//       → linear → logits [B, L, V]
//
// Each network declares the names of its pure inputs. Those
// names are what separates "data fed in" from "parameters
// learned" when the trainable set is built.
//
// Reference: Burn Book §3 (Building Blocks)
//            Vinyals et al. (2015) Show and Tell

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
        Lstm, LstmConfig, LstmState,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{relu, tanh},
};

// ─── FeatureExtractor ─────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct FeatureExtractorConfig {
    /// Width of the image embedding (fc7 of VGG-16 is 4096)
    pub feature_dim: usize,
    #[config(default = 32)]
    pub conv_channels: usize,
}

impl FeatureExtractorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeatureExtractor<B> {
        let half = (self.conv_channels / 2).max(1);
        let conv1 = Conv2dConfig::new([3, half], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = Conv2dConfig::new([half, self.conv_channels], [3, 3])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc   = LinearConfig::new(self.conv_channels, self.feature_dim).init(device);
        FeatureExtractor { conv1, conv2, pool, fc, feature_dim: self.feature_dim }
    }
}

#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    pub conv1:       Conv2d<B>,
    pub conv2:       Conv2d<B>,
    pub pool:        AdaptiveAvgPool2d,
    pub fc:          Linear<B>,
    pub feature_dim: usize,
}

impl<B: Backend> FeatureExtractor<B> {
    /// The only pure input of the extractor.
    pub const INPUT_SLOTS: [&'static str; 1] = ["image_data"];

    /// images: [B, 3, H, W] → embedding: [B, feature_dim]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(images));
        let x = relu(self.conv2.forward(x));
        let x = self.pool.forward(x); // [B, C, 1, 1]
        let [batch, channels, _, _] = x.dims();
        relu(self.fc.forward(x.reshape([batch, channels])))
    }
}

// ─── CaptionDecoder ───────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct CaptionDecoderConfig {
    /// Embedding rows: every token id except PAD
    pub vocab_size:  usize,
    pub feature_dim: usize,
    pub num_embed:   usize,
    pub num_hidden:  usize,
    #[config(default = 1)]
    pub num_layers:  usize,
    /// Token id treated as padding on input
    #[config(default = "-1")]
    pub pad_id:      i32,
}

impl CaptionDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CaptionDecoder<B> {
        let image_projection = LinearConfig::new(self.feature_dim, self.num_hidden).init(device);
        let word_embedding   = EmbeddingConfig::new(self.vocab_size, self.num_embed).init(device);
        let layers: Vec<Lstm<B>> = (0..self.num_layers.max(1))
            .map(|i| {
                let d_input = if i == 0 { self.num_embed } else { self.num_hidden };
                LstmConfig::new(d_input, self.num_hidden, true).init(device)
            })
            .collect();
        let output = LinearConfig::new(self.num_hidden, self.vocab_size).init(device);
        CaptionDecoder {
            image_projection, word_embedding, layers, output,
            feature_dim: self.feature_dim,
            pad_id:      self.pad_id,
        }
    }
}

#[derive(Module, Debug)]
pub struct CaptionDecoder<B: Backend> {
    pub image_projection: Linear<B>,
    pub word_embedding:   Embedding<B>,
    pub layers:           Vec<Lstm<B>>,
    pub output:           Linear<B>,
    pub feature_dim:      usize,
    pub pad_id:           i32,
}

impl<B: Backend> CaptionDecoder<B> {
    /// Pure inputs bound per batch: image embedding, token ids, labels.
    pub const INPUT_SLOTS: [&'static str; 3] = ["image_feature", "word_data", "softmax_label"];

    /// Declared shape of every input slot for one batch.
    pub fn input_shapes(&self, batch_size: usize, seq_len: usize) -> Vec<(&'static str, Vec<usize>)> {
        vec![
            ("image_feature", vec![batch_size, self.feature_dim]),
            ("word_data",     vec![batch_size, seq_len]),
            ("softmax_label", vec![batch_size, seq_len]),
        ]
    }

    /// One (cell, hidden) pair per layer; hidden seeded from the image.
    pub fn init_state(&self, features: Tensor<B, 2>) -> Vec<LstmState<B, 2>> {
        let hidden = tanh(self.image_projection.forward(features));
        self.layers
            .iter()
            .map(|_| LstmState::new(hidden.zeros_like(), hidden.clone()))
            .collect()
    }

    /// Run the LSTM stack from `states`, returning logits and final states.
    pub fn forward_from(
        &self,
        tokens: Tensor<B, 2, Int>,
        states: Vec<LstmState<B, 2>>,
    ) -> (Tensor<B, 3>, Vec<LstmState<B, 2>>) {
        // PAD may be -1: route it to row 0; its labels are masked out anyway.
        let pad_mask = tokens.clone().equal_elem(self.pad_id);
        let tokens   = tokens.mask_fill(pad_mask, 0);

        let mut x = self.word_embedding.forward(tokens);
        let mut next_states = Vec::with_capacity(self.layers.len());
        for (layer, state) in self.layers.iter().zip(states) {
            let (out, state) = layer.forward(x, Some(state));
            x = out;
            next_states.push(state);
        }
        (self.output.forward(x), next_states)
    }

    /// features: [B, F], tokens: [B, L] → logits: [B, L, vocab_size]
    pub fn forward(&self, features: Tensor<B, 2>, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let states = self.init_state(features);
        self.forward_from(tokens, states).0
    }
}
