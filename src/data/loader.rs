// ============================================================
// Layer 4 — Annotation Loader
// ============================================================
// Reads the JSON split file into domain records.
// Implements the AnnotationSource trait from Layer 3.
//
// Reference: Rust Book §9 (Error Handling), serde_json docs

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::{annotation::AnnotationSet, traits::AnnotationSource};

pub struct AnnotationLoader {
    path: PathBuf,
}

impl AnnotationLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AnnotationSource for AnnotationLoader {
    fn load(&self) -> Result<AnnotationSet> {
        let json = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read annotations from '{}'", self.path.display()))?;
        let set: AnnotationSet = serde_json::from_str(&json)
            .with_context(|| format!("Malformed annotation file '{}'", self.path.display()))?;

        tracing::info!(
            "Loaded {} image records from '{}'",
            set.images.len(),
            self.path.display()
        );
        Ok(set)
    }
}
