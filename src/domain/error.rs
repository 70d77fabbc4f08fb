// ============================================================
// Layer 3 — Pipeline Errors
// ============================================================
// Typed failures raised by the captioning pipeline.
//
// Three families:
//   - configuration: bad batch size, unknown split, broken
//     vocabulary — raised while things are being built
//   - data: a caption too long for any bucket — recovered
//     locally (sample dropped and counted)
//   - runtime contract: image load failures, shape mismatches,
//     missing pretrained weights — abort the run
//
// Every variant converts into anyhow::Error through `?`,
// so the upper layers keep their anyhow::Result signatures.
//
// Reference: Rust Book §9 (Recoverable Errors with Result)

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("batch size {batch_size} yields no full batch from {available} samples")]
    BatchLargerThanDataset { batch_size: usize, available: usize },

    #[error("unsupported split '{0}' (expected train, val or test)")]
    UnsupportedSplit(String),

    #[error("vocabulary is missing reserved token '{0}'")]
    MissingReservedToken(String),

    #[error("vocabulary id {id} is assigned to both '{first}' and '{second}'")]
    DuplicateTokenId { id: i32, first: String, second: String },

    #[error("vocabulary id {id} for '{token}' is outside 0..{size}")]
    TokenIdOutOfRange { token: String, id: i32, size: usize },

    #[error("padding id {0} collides with a valid embedding id")]
    PadCollision(i32),

    #[error("caption of {len} tokens does not fit a sequence of length {seq_len}")]
    CaptionTooLong { len: usize, seq_len: usize },

    #[error("cannot materialize image '{image}': {reason}")]
    ImageLoad { image: String, reason: String },

    #[error("shape mismatch for '{name}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch { name: String, expected: Vec<usize>, actual: Vec<usize> },

    #[error("pretrained weights have no entry for '{0}'")]
    MissingPretrainedWeight(String),

    #[error("pretrained entry '{name}' has dtype {dtype}, expected F32")]
    UnsupportedDtype { name: String, dtype: String },
}

impl PipelineError {
    /// Data errors are handled where they occur; everything else aborts.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::CaptionTooLong { .. })
    }
}
