// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch:
//
//   epoch,train_loss,train_perplexity,val_loss,val_perplexity,batches
//   0,4.812034,123.000101,4.700112,109.950010,40
//   1,4.103311,60.551003,,,40          ← no validation this epoch
//
// Validation columns stay empty on epochs where the validation
// cadence did not fire. Epochs are 0-based, matching the
// cadence rule used by the trainer.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::validator::EvalSummary;

const HEADER: &str = "epoch,train_loss,train_perplexity,val_loss,val_perplexity,batches";

/// One row of metrics for a single epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:            usize,
    pub train_loss:       f64,
    pub train_perplexity: f64,
    pub val_loss:         Option<f64>,
    pub val_perplexity:   Option<f64>,
    /// Training batches seen this epoch
    pub batches:          usize,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train: &EvalSummary, val: Option<&EvalSummary>) -> Self {
        Self {
            epoch,
            train_loss:       train.loss,
            train_perplexity: train.perplexity,
            val_loss:         val.map(|v| v.loss),
            val_perplexity:   val.map(|v| v.perplexity),
            batches:          train.batches,
        }
    }

    /// Human-readable progress line for the epoch log.
    pub fn summary_line(&self, total_epochs: usize) -> String {
        let mut line = format!(
            "Epoch {:>3}/{} | train loss={:.4} ppl={:.3}",
            self.epoch, total_epochs, self.train_loss, self.train_perplexity
        );
        if let (Some(loss), Some(ppl)) = (self.val_loss, self.val_perplexity) {
            line.push_str(&format!(" | val loss={:.4} ppl={:.3}", loss, ppl));
        }
        line
    }

    fn csv_row(&self) -> String {
        let opt = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
        format!(
            "{},{:.6},{:.6},{},{},{}",
            self.epoch,
            self.train_loss,
            self.train_perplexity,
            opt(self.val_loss),
            opt(self.val_perplexity),
            self.batches,
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header only when the file is new, so resumed runs append.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.csv_row())?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
