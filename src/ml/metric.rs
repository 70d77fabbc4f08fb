// ============================================================
// Layer 5 — Masked Loss and Perplexity
// ============================================================
// Token-level negative log-likelihood over the label positions
// that are NOT padding:
//
//   nll = - Σ_{b,t : label[b,t] != PAD} log softmax(logits[b,t])[label[b,t]]
//   loss       = nll / #non-PAD labels
//   perplexity = exp(Σ nll / Σ #non-PAD labels)   (running)
//
// END labels count: predicting the end of a caption is part of
// the task. Train and validation each own a Perplexity and
// reset it at every epoch boundary.
//
// Reference: Burn Book §5 (Loss functions)

use burn::{prelude::*, tensor::activation::log_softmax};

/// Summed NLL of one batch and the number of labels it covers.
pub struct MaskedNll<B: Backend> {
    /// [1]
    pub sum:   Tensor<B, 1>,
    pub count: usize,
}

impl<B: Backend> MaskedNll<B> {
    /// Mean NLL per counted label (0 when nothing was counted).
    pub fn mean(&self) -> Tensor<B, 1> {
        self.sum.clone().div_scalar(self.count.max(1) as f64)
    }
}

/// logits: [B, L, V], labels: [B, L]
pub fn masked_nll<B: Backend>(
    logits: Tensor<B, 3>,
    labels: Tensor<B, 2, Int>,
    pad_id: i32,
) -> MaskedNll<B> {
    let [batch, seq_len, _] = logits.dims();

    let pad  = labels.clone().equal_elem(pad_id);
    let keep = pad.clone().bool_not();
    let safe = labels.mask_fill(pad, 0);

    let log_probs = log_softmax(logits, 2);
    let picked = log_probs
        .gather(2, safe.unsqueeze_dim::<3>(2))
        .reshape([batch, seq_len]);

    let sum   = picked.neg().mul(keep.clone().float()).sum();
    let count = keep.int().sum().into_scalar().elem::<i64>().max(0) as usize;
    MaskedNll { sum, count }
}

// ─── Perplexity ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct Perplexity {
    nll_sum: f64,
    tokens:  usize,
    batches: usize,
}

impl Perplexity {
    pub fn new() -> Self { Self::default() }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, nll_sum: f64, tokens: usize) {
        self.nll_sum += nll_sum;
        self.tokens  += tokens;
        self.batches += 1;
    }

    /// Mean NLL per token so far (NaN before any update)
    pub fn mean_loss(&self) -> f64 {
        if self.tokens == 0 { f64::NAN } else { self.nll_sum / self.tokens as f64 }
    }

    pub fn value(&self) -> f64 {
        self.mean_loss().exp()
    }

    pub fn batches(&self) -> usize { self.batches }

    pub fn tokens(&self) -> usize { self.tokens }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestBackend;

    #[test]
    fn test_uniform_logits_give_log_vocab_per_token() {
        let device = Default::default();
        // 1 sample, 3 positions, vocab 4; one PAD label
        let logits = Tensor::<TestBackend, 3>::zeros([1, 3, 4], &device);
        let labels = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![2, -1, 3], [1, 3]), &device,
        );
        let nll = masked_nll(logits, labels, -1);

        assert_eq!(nll.count, 2);
        let sum: f32 = nll.sum.into_scalar().elem();
        assert!((sum - 2.0 * 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_pad_positions_do_not_contribute() {
        let device = Default::default();
        let mut values = vec![0.0f32; 2 * 4];
        // position 1 is PAD; make its logits extreme, they must be ignored
        values[4..8].copy_from_slice(&[100.0, -100.0, -100.0, -100.0]);
        let logits = Tensor::<TestBackend, 3>::from_data(TensorData::new(values, [1, 2, 4]), &device);
        let labels = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![1, -1], [1, 2]), &device,
        );
        let mean: f32 = masked_nll(logits, labels, -1).mean().into_scalar().elem();
        assert!((mean - 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_perplexity_accumulates_and_resets() {
        let mut p = Perplexity::new();
        assert!(p.value().is_nan());
        p.update(2.0, 2);
        p.update(0.0, 2);
        assert!((p.mean_loss() - 0.5).abs() < 1e-12);
        assert!((p.value() - 0.5f64.exp()).abs() < 1e-12);
        assert_eq!(p.batches(), 2);
        p.reset();
        assert_eq!(p.tokens(), 0);
    }
}
