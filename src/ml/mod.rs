// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All network math lives here.
//
//   model.rs      — FeatureExtractor (frozen CNN → embedding)
//                   and CaptionDecoder (image-seeded LSTM stack)
//
//   trainable.rs  — Walks the decoder's parameters by name and
//                   fixes, once, the set the optimiser may update
//
//   metric.rs     — Masked NLL over non-PAD labels and the
//                   running Perplexity accumulator
//
//   trainer.rs    — Per-batch step (frozen forward, decoder
//                   forward/backward, restricted Adam update) and
//                   the epoch loop with validation and checkpoints
//
//   validator.rs  — Forward-only pass over the validation split,
//                   plus the input shape checks both loops share
//
//   inferencer.rs — Greedy captioning from a checkpoint
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vinyals et al. (2015) Show and Tell

/// Frozen extractor and trainable LSTM decoder
pub mod model;

/// Trainable / auxiliary parameter partition
pub mod trainable;

/// Masked loss and perplexity
pub mod metric;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Validation pass and shape contracts
pub mod validator;

/// Greedy caption generation
pub mod inferencer;
