// ============================================================
// Layer 4 — Bucketing Strategies
// ============================================================
// Decides how long the encoded sequence of a caption is.
// The single question a strategy answers:
//
//   "a caption has n tokens; which sequence length L does it
//    go into, or does it not fit anywhere?"
//
// An encoded caption needs n + 1 slots (BEGIN + n tokens), so
// a bucket of length L accepts n when n + 1 <= L.
//
//   FixedLength   — one global L = max_caption_len + 2
//   LengthBuckets — several sorted lengths; a caption goes to
//                   the smallest one that fits
//
// Auto buckets are `len + 1` of the frequent caption lengths,
// so each frequent length fills its own bucket exactly and END
// lands in the last label slot. The fixed length and the auto
// fallback keep one spare slot (`longest + 2`).
//
// Reference: Rust Book §10 (Traits), §17 (Trait Objects)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Slots a caption of `n` tokens occupies beyond its tokens: BEGIN plus the END label.
pub const RESERVED_SLOTS: usize = 2;

pub trait BucketStrategy: fmt::Debug + Send + Sync {
    /// Sequence length for a caption of `num_tokens`, or None to reject it.
    fn bucket_for(&self, num_tokens: usize) -> Option<usize>;

    /// All bucket lengths, ascending.
    fn buckets(&self) -> Vec<usize>;

    /// Largest sequence length this strategy produces.
    fn max_len(&self) -> usize {
        self.buckets().last().copied().unwrap_or(0)
    }
}

// ─── FixedLength ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLength {
    seq_len: usize,
}

impl FixedLength {
    pub fn new(seq_len: usize) -> Self {
        Self { seq_len }
    }

    /// L = longest caption + 2
    pub fn for_max_caption(max_caption_len: usize) -> Self {
        Self::new(max_caption_len + RESERVED_SLOTS)
    }
}

impl BucketStrategy for FixedLength {
    fn bucket_for(&self, num_tokens: usize) -> Option<usize> {
        (num_tokens + 1 <= self.seq_len).then_some(self.seq_len)
    }

    fn buckets(&self) -> Vec<usize> {
        vec![self.seq_len]
    }
}

// ─── LengthBuckets ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthBuckets {
    lengths: Vec<usize>,
}

impl LengthBuckets {
    pub fn new(mut lengths: Vec<usize>) -> Result<Self> {
        lengths.retain(|&l| l > 1);
        lengths.sort_unstable();
        lengths.dedup();
        if lengths.is_empty() {
            bail!("at least one bucket longer than 1 is required");
        }
        Ok(Self { lengths })
    }

    /// One bucket per caption length that occurs at least `batch_size`
    /// times, so every bucket can fill a batch on its own. Falls back to
    /// a single bucket for the longest caption when no length is that
    /// frequent.
    pub fn from_captions(caption_lengths: &[usize], batch_size: usize) -> Result<Self> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &len in caption_lengths {
            *counts.entry(len).or_insert(0) += 1;
        }

        let frequent: Vec<usize> = counts
            .iter()
            .filter(|(_, &count)| count >= batch_size.max(1))
            .map(|(&len, _)| len + 1)
            .collect();

        if frequent.is_empty() {
            let longest = caption_lengths.iter().copied().max().unwrap_or(0);
            tracing::warn!(
                "No caption length occurs {} times; using a single bucket of {}",
                batch_size,
                longest + RESERVED_SLOTS
            );
            return Self::new(vec![longest + RESERVED_SLOTS]);
        }
        Self::new(frequent)
    }
}

impl BucketStrategy for LengthBuckets {
    fn bucket_for(&self, num_tokens: usize) -> Option<usize> {
        // smallest bucket L with L >= num_tokens + 1
        let i = self.lengths.partition_point(|&l| l < num_tokens + 1);
        self.lengths.get(i).copied()
    }

    fn buckets(&self) -> Vec<usize> {
        self.lengths.clone()
    }
}

// ─── Bucketing (configuration) ────────────────────────────────────────────────
/// How the run picks its strategy. Parsed from the CLI as
/// `fixed`, `auto`, or a comma separated list such as `8,12,20`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucketing {
    #[default]
    Fixed,
    Auto,
    Explicit(Vec<usize>),
}

impl Bucketing {
    /// Build the strategy. `max_caption_len` spans every split;
    /// `train_lengths` are the training captions only.
    pub fn build(
        &self,
        max_caption_len: usize,
        train_lengths:   &[usize],
        batch_size:      usize,
    ) -> Result<Box<dyn BucketStrategy>> {
        Ok(match self {
            Bucketing::Fixed => Box::new(FixedLength::for_max_caption(max_caption_len)),
            Bucketing::Auto  => Box::new(LengthBuckets::from_captions(train_lengths, batch_size)?),
            Bucketing::Explicit(lengths) => Box::new(LengthBuckets::new(lengths.clone())?),
        })
    }
}

impl FromStr for Bucketing {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "fixed" => Ok(Bucketing::Fixed),
            "auto"  => Ok(Bucketing::Auto),
            list => {
                let lengths = list
                    .split(',')
                    .map(|p| p.trim().parse::<usize>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| anyhow::anyhow!("invalid bucket list '{list}': {e}"))?;
                Ok(Bucketing::Explicit(lengths))
            }
        }
    }
}

impl fmt::Display for Bucketing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucketing::Fixed => f.write_str("fixed"),
            Bucketing::Auto  => f.write_str("auto"),
            Bucketing::Explicit(lengths) => {
                let parts: Vec<String> = lengths.iter().map(usize::to_string).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}
