// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that define what the
// captioning pipeline talks about:
//
//   annotation.rs — raw image/caption records and the Split enum
//   vocabulary.rs — token ↔ id mapping with reserved markers
//   error.rs      — typed pipeline errors (config / data / runtime)
//   traits.rs     — capabilities injected from outer layers
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod annotation;

pub mod vocabulary;

pub mod error;

pub mod traits;
