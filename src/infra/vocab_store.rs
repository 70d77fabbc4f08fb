// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Loads the token → id mapping from JSON, or builds one from
// the training captions the first time and saves it, so that
// training, stats and captioning all see the same ids.
//
// Built vocabularies reserve:
//
//   UNK  = 0
//   #    = 1   (BEGIN)
//   #END = 2
//   #PAD = -1  (sentinel, never an embedding row)
//
// followed by every training word seen at least `min_count`
// times, most frequent first, ties broken lexically.
//
// Reference: Rust Book §8 (HashMaps), Rust Book §12 (I/O)

use anyhow::{Context, Result};
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use crate::domain::{
    annotation::{AnnotationSet, Split},
    vocabulary::{
        TokenId, Vocabulary, BEGIN_TOKEN, DEFAULT_PAD_ID, END_TOKEN, PAD_TOKEN, UNK_TOKEN,
    },
};

pub struct VocabularyStore {
    path: PathBuf,
}

impl VocabularyStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load the saved vocabulary, or build it from `annotations` and save it.
    pub fn load_or_build(&self, annotations: &AnnotationSet, min_count: usize) -> Result<Vocabulary> {
        if self.path.exists() {
            tracing::info!("Loading vocabulary from '{}'", self.path.display());
            return self.load();
        }
        tracing::info!("Building vocabulary from the train split (min_count={})", min_count);
        let vocab = build_vocabulary(annotations, min_count)?;
        self.save(&vocab)?;
        Ok(vocab)
    }

    pub fn load(&self) -> Result<Vocabulary> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read vocabulary from '{}'", self.path.display()))?;
        let mapping: HashMap<String, TokenId> = serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a token → id JSON object", self.path.display()))?;
        let vocab = Vocabulary::from_mapping(mapping)?;
        tracing::info!("Vocabulary: {} embedding rows", vocab.size());
        Ok(vocab)
    }

    pub fn save(&self, vocab: &Vocabulary) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mapping: BTreeMap<String, TokenId> = vocab.to_mapping().into_iter().collect();
        fs::write(&self.path, serde_json::to_string_pretty(&mapping)?)
            .with_context(|| format!("Cannot write vocabulary to '{}'", self.path.display()))?;
        tracing::info!(
            "Vocabulary with {} embedding rows saved to '{}'",
            vocab.size(),
            self.path.display()
        );
        Ok(())
    }
}

/// Frequency-ordered vocabulary over the train split.
pub fn build_vocabulary(annotations: &AnnotationSet, min_count: usize) -> Result<Vocabulary> {
    let reserved = [UNK_TOKEN, BEGIN_TOKEN, END_TOKEN, PAD_TOKEN];

    let mut freq: HashMap<&str, usize> = HashMap::new();
    for record in annotations.records(Split::Train) {
        for sentence in &record.sentences {
            for token in &sentence.tokens {
                if !reserved.contains(&token.as_str()) {
                    *freq.entry(token.as_str()).or_insert(0) += 1;
                }
            }
        }
    }

    let mut words: Vec<(&str, usize)> = freq
        .into_iter()
        .filter(|(_, n)| *n >= min_count)
        .collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut mapping: HashMap<String, TokenId> = HashMap::with_capacity(words.len() + 4);
    mapping.insert(UNK_TOKEN.to_string(), 0);
    mapping.insert(BEGIN_TOKEN.to_string(), 1);
    mapping.insert(END_TOKEN.to_string(), 2);
    mapping.insert(PAD_TOKEN.to_string(), DEFAULT_PAD_ID);
    for (i, (word, _)) in words.iter().enumerate() {
        mapping.insert(word.to_string(), (i + 3) as TokenId);
    }

    Ok(Vocabulary::from_mapping(mapping)?)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_annotations;

    #[test]
    fn test_build_orders_by_frequency_then_lexically() {
        let vocab = build_vocabulary(&sample_annotations(), 1).unwrap();
        // train words: a×2 cat×2 sat×2 dog×2 ran×1
        assert_eq!(vocab.get("a"),   Some(3));
        assert_eq!(vocab.get("cat"), Some(4));
        assert_eq!(vocab.get("dog"), Some(5));
        assert_eq!(vocab.get("sat"), Some(6));
        assert_eq!(vocab.get("ran"), Some(7));
        // val-only word stays out
        assert_eq!(vocab.get("down"), None);
        assert_eq!(vocab.pad(), -1);
        assert_eq!(vocab.size(), 8);
    }

    #[test]
    fn test_min_count_filters_rare_words() {
        let vocab = build_vocabulary(&sample_annotations(), 2).unwrap();
        assert_eq!(vocab.get("ran"), None);
        assert_eq!(vocab.lookup("ran"), vocab.unk());
        assert_eq!(vocab.size(), 7);
    }

    #[test]
    fn test_built_vocabulary_is_saved_and_reloaded() {
        let dir   = tempfile::tempdir().unwrap();
        let store = VocabularyStore::new(dir.path().join("vocab").join("words.json"));

        let built  = store.load_or_build(&sample_annotations(), 1).unwrap();
        // second call must read the file, not rebuild
        let loaded = store.load_or_build(&Default::default(), 1).unwrap();

        assert_eq!(built.to_mapping(), loaded.to_mapping());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r##"{"UNK": 0, "#": 1}"##).unwrap();
        let err = VocabularyStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("#END"));
    }
}
