// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// other layers:
//
//   checkpoint.rs  — Decoder checkpoints keyed by prefix + epoch
//                    (burn DefaultRecorder), the JSON manifest
//                    next to each one, and the run config that
//                    `caption` uses to rebuild the decoder.
//
//   vocab_store.rs — Loads the token → id mapping, or builds it
//                    from the training captions and saves it.
//
//   pretrained.rs  — Reads a safetensors file once and copies it
//                    into the frozen feature extractor.
//
//   metrics.rs     — One CSV row of loss / perplexity per epoch.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Decoder checkpoint writer and loader
pub mod checkpoint;

/// Vocabulary persistence
pub mod vocab_store;

/// Pretrained extractor weights
pub mod pretrained;

/// Per-epoch metrics CSV
pub mod metrics;
