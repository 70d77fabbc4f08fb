// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each:
// train a decoder, report dataset statistics, caption an image.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No UI or printing here (that's Layer 1)
//   - No direct file parsing (that's Layer 4 and 6)
//   - Only workflow coordination and backend selection
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// cpu / gpu:N selection
pub mod device;

// The training workflow and its configuration
pub mod train_use_case;

// Dataset statistics without training
pub mod stats_use_case;

// Greedy captioning from a checkpoint
pub mod caption_use_case;
