// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the annotation file to device-ready batches.
//
//   annotation JSON
//       │
//       ▼
//   AnnotationLoader  → domain records
//       │
//       ▼
//   BucketStrategy    → sequence length per caption (or reject)
//       │
//       ▼
//   SequenceEncoder   → [BEGIN, ids, PAD...] + END-terminated labels
//       │
//       ▼
//   CaptionDataset    → ordered index of one split, grouped by length
//       │
//       ▼
//   BatchSampler      → per-epoch permutation, full batches only
//       │
//       ▼
//   materialize       → [n, 3, H, W] pixels (rayon, per batch)
//       │
//       ▼
//   CaptionBatcher    → image / token / label tensors
//       │
//       ▼
//   CaptionLoader     → explicit has_next / next_batch / reset
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the annotation JSON file
pub mod loader;

/// Fixed-length and multi-bucket sequence length strategies
pub mod bucketing;

/// Caption → id sequence, labels, and back
pub mod encoder;

/// Burn Dataset over one split
pub mod dataset;

/// Shuffled full-batch index windows
pub mod sampler;

/// Image decoding and batch materialization
pub mod images;

/// Burn Batcher producing CaptionBatch tensors
pub mod batcher;

/// Epoch iterator combining all of the above
pub mod iterator;
