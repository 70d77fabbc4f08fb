// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline depends on two external capabilities it does
// not implement itself: reading annotation records and turning
// an image reference into pixels. Both are traits so tests can
// feed synthetic data and the application layer can plug in
// the filesystem implementations from Layer 4.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::annotation::AnnotationSet;

// ─── AnnotationSource ─────────────────────────────────────────────────────────
/// Any component that can produce the raw annotation records.
///
/// Implementations:
///   - AnnotationLoader → reads a JSON split file
pub trait AnnotationSource {
    fn load(&self) -> Result<AnnotationSet>;
}

// ─── ImageSource ──────────────────────────────────────────────────────────────
/// Turns an image reference into a channel-first float buffer.
///
/// `load` must return exactly `C * H * W` values laid out as
/// [channel][row][column] and must be deterministic per reference.
/// Implementations are shared across rayon workers.
///
/// Implementations:
///   - FsImageSource → decodes and resizes files under a root dir
pub trait ImageSource: Send + Sync {
    /// [channels, height, width] of every image this source yields
    fn shape(&self) -> [usize; 3];

    fn load(&self, image: &str) -> Result<Vec<f32>>;
}
