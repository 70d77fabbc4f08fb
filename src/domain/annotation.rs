// ============================================================
// Layer 3 — Annotation Records
// ============================================================
// Raw caption annotations as they come from a Karpathy-style
// split file:
//
//   { "images": [
//       { "filename": "COCO_val2014_000000391895.jpg",
//         "split":    "train",
//         "sentences": [ { "tokens": ["a", "man", "riding"] }, ... ] },
//       ...
//   ] }
//
// Fields we do not use (sentids, raw, cocoid, ...) are ignored
// by serde. One image carries several captions; every caption
// becomes its own training sample.
//
// Reference: Rust Book §5 (Structs), serde docs

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::PipelineError;

// ─── Split ────────────────────────────────────────────────────────────────────
/// Which partition of the annotation file a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val   => "val",
            Split::Test  => "test",
        }
    }
}

impl FromStr for Split {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "val"   => Ok(Split::Val),
            "test"  => Ok(Split::Test),
            other   => Err(PipelineError::UnsupportedSplit(other.to_string())),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Records ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub filename:  String,
    /// Kept as a string: records of splits we never train on
    /// (e.g. "restval") must not fail deserialisation.
    pub split:     String,
    pub sentences: Vec<SentenceRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationSet {
    pub images: Vec<ImageRecord>,
}

impl AnnotationSet {
    /// Records whose split field matches `split`, in file order.
    pub fn records(&self, split: Split) -> impl Iterator<Item = &ImageRecord> {
        self.images.iter().filter(move |r| r.split == split.as_str())
    }

    /// Longest caption across every split. Fixes the global
    /// sequence length so train and val tensors share one shape.
    pub fn max_caption_len(&self) -> usize {
        self.images
            .iter()
            .flat_map(|r| r.sentences.iter())
            .map(|s| s.tokens.len())
            .max()
            .unwrap_or(0)
    }

    /// Caption lengths of one split, for bucket generation.
    pub fn caption_lengths(&self, split: Split) -> Vec<usize> {
        self.records(split)
            .flat_map(|r| r.sentences.iter())
            .map(|s| s.tokens.len())
            .collect()
    }
}
