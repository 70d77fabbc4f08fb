// ============================================================
// Layer 4 — Sequence Encoder
// ============================================================
// Turns a caption's tokens into the fixed-length id sequence
// the decoder reads, and derives the labels it is trained on.
//
//   tokens:  ["cat", "sat"]                L = 5
//   encoded: [BEGIN, cat, sat, PAD, PAD]
//   labels:  [cat,   sat, PAD, PAD, END]
//
// Labels are the encoded sequence shifted left by one; the
// vacated last slot is always END (never PAD), so the model is
// taught to stop once the sequence is exhausted.
//
// Reference: Rust Book §8 (Vectors)

use crate::domain::{
    error::PipelineError,
    vocabulary::{TokenId, Vocabulary, UNK_TOKEN},
};

/// Encoded caption plus how many of its tokens fell back to UNK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCaption {
    pub ids:     Vec<TokenId>,
    pub unknown: usize,
}

pub struct SequenceEncoder<'a> {
    vocab: &'a Vocabulary,
}

impl<'a> SequenceEncoder<'a> {
    pub fn new(vocab: &'a Vocabulary) -> Self {
        Self { vocab }
    }

    /// [BEGIN, ids..., PAD...] of exactly `seq_len` entries.
    /// Rejects captions with `len + 1 > seq_len`.
    pub fn encode<S: AsRef<str>>(
        &self,
        tokens:  &[S],
        seq_len: usize,
    ) -> Result<EncodedCaption, PipelineError> {
        if tokens.len() + 1 > seq_len {
            return Err(PipelineError::CaptionTooLong { len: tokens.len(), seq_len });
        }

        let mut ids     = vec![self.vocab.pad(); seq_len];
        let mut unknown = 0usize;
        ids[0] = self.vocab.begin();
        for (slot, token) in ids[1..].iter_mut().zip(tokens) {
            *slot = match self.vocab.get(token.as_ref()) {
                Some(id) => id,
                None => {
                    unknown += 1;
                    self.vocab.unk()
                }
            };
        }
        Ok(EncodedCaption { ids, unknown })
    }

    /// label[t] = encoded[t + 1], label[L - 1] = END
    pub fn labels(&self, encoded: &[TokenId]) -> Vec<TokenId> {
        if encoded.is_empty() {
            return Vec::new();
        }
        let mut labels = Vec::with_capacity(encoded.len());
        labels.extend_from_slice(&encoded[1..]);
        labels.push(self.vocab.end());
        labels
    }

    /// Tokens of an id sequence: stops at END and drops PAD/BEGIN.
    /// Ids outside the vocabulary decode as UNK.
    pub fn decode(&self, ids: &[TokenId]) -> Vec<String> {
        ids.iter()
            .take_while(|&&id| id != self.vocab.end())
            .filter(|&&id| !self.vocab.is_marker(id))
            .map(|&id| self.vocab.token(id).unwrap_or(UNK_TOKEN).to_string())
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scenario_vocab;

    #[test]
    fn test_encode_cat_sat() {
        let vocab = scenario_vocab();
        let enc   = SequenceEncoder::new(&vocab);
        let out   = enc.encode(&["cat", "sat"], 5).unwrap();
        assert_eq!(out.ids, vec![1, 3, 4, -1, -1]);
        assert_eq!(out.unknown, 0);
        assert_eq!(enc.labels(&out.ids), vec![3, 4, -1, -1, 2]);
    }

    #[test]
    fn test_unknown_tokens_become_unk() {
        let vocab = scenario_vocab();
        let enc   = SequenceEncoder::new(&vocab);
        let out   = enc.encode(&["cat", "ran", "fast"], 6).unwrap();
        assert_eq!(out.ids, vec![1, 3, 0, 0, -1, -1]);
        assert_eq!(out.unknown, 2);
    }

    #[test]
    fn test_empty_caption_is_begin_then_pad() {
        let vocab = scenario_vocab();
        let enc   = SequenceEncoder::new(&vocab);
        let out   = enc.encode::<&str>(&[], 4).unwrap();
        assert_eq!(out.ids, vec![1, -1, -1, -1]);
        assert_eq!(enc.labels(&out.ids), vec![-1, -1, -1, 2]);
    }

    #[test]
    fn test_caption_filling_every_slot_still_ends_with_end_label() {
        let vocab = scenario_vocab();
        let enc   = SequenceEncoder::new(&vocab);
        let out   = enc.encode(&["cat", "sat", "cat", "sat"], 5).unwrap();
        assert_eq!(out.ids, vec![1, 3, 4, 3, 4]);
        assert_eq!(enc.labels(&out.ids), vec![3, 4, 3, 4, 2]);
    }

    #[test]
    fn test_too_long_caption_is_rejected() {
        let vocab = scenario_vocab();
        let enc   = SequenceEncoder::new(&vocab);
        let err   = enc.encode(&["cat", "sat", "cat", "sat", "cat"], 5).unwrap_err();
        assert_eq!(err, PipelineError::CaptionTooLong { len: 5, seq_len: 5 });
    }

    #[test]
    fn test_decode_reverses_encode_up_to_unk() {
        let vocab = scenario_vocab();
        let enc   = SequenceEncoder::new(&vocab);
        let out   = enc.encode(&["sat", "dog", "cat"], 6).unwrap();
        assert_eq!(enc.decode(&out.ids), vec!["sat", "UNK", "cat"]);
    }

    #[test]
    fn test_decode_stops_at_end() {
        let vocab = scenario_vocab();
        let enc   = SequenceEncoder::new(&vocab);
        assert_eq!(enc.decode(&[1, 3, 2, 4]), vec!["cat"]);
    }
}
