// ============================================================
// Test Fixtures
// ============================================================
// Small hand-written inputs shared by the unit tests of every
// layer. Compiled only under `cargo test`.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};

use crate::domain::{
    annotation::{AnnotationSet, ImageRecord, SentenceRecord},
    traits::ImageSource,
    vocabulary::{TokenId, Vocabulary},
};

pub type TestBackend         = burn::backend::NdArray<f32>;
pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;

fn vocab_from(pairs: &[(&str, TokenId)]) -> Vocabulary {
    let mapping: HashMap<String, TokenId> =
        pairs.iter().map(|(t, id)| (t.to_string(), *id)).collect();
    Vocabulary::from_mapping(mapping).unwrap()
}

/// {PAD:-1, UNK:0, BEGIN:1, END:2, cat:3, sat:4}
pub fn scenario_vocab() -> Vocabulary {
    vocab_from(&[
        ("#PAD", -1), ("UNK", 0), ("#", 1), ("#END", 2), ("cat", 3), ("sat", 4),
    ])
}

/// Covers every word of `sample_annotations` except "down".
pub fn tiny_vocab() -> Vocabulary {
    vocab_from(&[
        ("UNK", 0), ("#", 1), ("#END", 2),
        ("a", 3), ("cat", 4), ("sat", 5), ("dog", 6), ("ran", 7),
    ])
}

fn record(filename: &str, split: &str, captions: &[&[&str]]) -> ImageRecord {
    ImageRecord {
        filename:  filename.to_string(),
        split:     split.to_string(),
        sentences: captions
            .iter()
            .map(|c| SentenceRecord { tokens: c.iter().map(|t| t.to_string()).collect() })
            .collect(),
    }
}

/// train: a.jpg (2 captions), b.jpg, d.jpg; val: c.jpg; test: e.jpg
pub fn sample_annotations() -> AnnotationSet {
    AnnotationSet {
        images: vec![
            record("a.jpg", "train", &[&["a", "cat", "sat"], &["cat"]]),
            record("b.jpg", "train", &[&["a", "dog", "ran"]]),
            record("c.jpg", "val",   &[&["a", "cat", "sat", "down"]]),
            record("d.jpg", "train", &[&["dog", "sat"]]),
            record("e.jpg", "test",  &[&["cat"]]),
        ],
    }
}

/// Deterministic pixels derived from the image name.
pub struct SyntheticImages {
    pub height:  usize,
    pub width:   usize,
    pub missing: HashSet<String>,
}

impl SyntheticImages {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width, missing: HashSet::new() }
    }

    pub fn with_missing(mut self, image: &str) -> Self {
        self.missing.insert(image.to_string());
        self
    }
}

impl ImageSource for SyntheticImages {
    fn shape(&self) -> [usize; 3] {
        [3, self.height, self.width]
    }

    fn load(&self, image: &str) -> Result<Vec<f32>> {
        if self.missing.contains(image) {
            bail!("no such image '{image}'");
        }
        let seed = image.bytes().map(|b| b as usize).sum::<usize>();
        Ok((0..3 * self.height * self.width)
            .map(|i| ((seed + i) % 17) as f32 / 17.0)
            .collect())
    }
}
