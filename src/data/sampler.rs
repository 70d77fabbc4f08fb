// ============================================================
// Layer 4 — Batch Sampler
// ============================================================
// Decides which sample indices form each batch of an epoch.
//
// State: a permutation of every bucket group plus a cursor
// into the epoch's batch plan.
//
//   reset()    — re-permute each group (when shuffling), lay
//                out the windows, shuffle the plan, cursor = 0
//   has_next() — is there another full batch this epoch?
//   next()     — the next batch of indices, or None at the end
//
// Window policy is fixed per sampler:
//   Disjoint — windows advance by batch_size (default)
//   Sliding  — windows advance by one; consecutive batches
//              share batch_size - 1 samples
//
// A batch never mixes groups and is never partial: trailing
// samples that cannot fill a batch sit out that epoch.
//
// Reference: Rust Book §13 (Iterators), rand docs (SliceRandom)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::PipelineError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowPolicy {
    #[default]
    Disjoint,
    Sliding,
}

impl WindowPolicy {
    /// Start offsets of the full windows over `n` samples.
    fn starts(&self, n: usize, batch_size: usize) -> Vec<usize> {
        if n < batch_size {
            return Vec::new();
        }
        match self {
            WindowPolicy::Disjoint => (0..n / batch_size).map(|i| i * batch_size).collect(),
            WindowPolicy::Sliding  => (0..=n - batch_size).collect(),
        }
    }
}

impl FromStr for WindowPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "disjoint" => Ok(WindowPolicy::Disjoint),
            "sliding"  => Ok(WindowPolicy::Sliding),
            other => anyhow::bail!("unknown window policy '{other}' (expected disjoint or sliding)"),
        }
    }
}

impl fmt::Display for WindowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowPolicy::Disjoint => f.write_str("disjoint"),
            WindowPolicy::Sliding  => f.write_str("sliding"),
        }
    }
}

#[derive(Debug)]
pub struct BatchSampler {
    groups:     Vec<Vec<usize>>,
    batch_size: usize,
    policy:     WindowPolicy,
    shuffle:    bool,
    rng:        StdRng,
    /// (group, window start) for every batch of the current epoch
    plan:       Vec<(usize, usize)>,
    cursor:     usize,
}

impl BatchSampler {
    /// `groups` holds dataset indices; each group yields its own batches.
    /// Fails when `batch_size` is zero or no group can fill one batch.
    pub fn new(
        groups:     Vec<Vec<usize>>,
        batch_size: usize,
        policy:     WindowPolicy,
        shuffle:    bool,
        seed:       u64,
    ) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::ZeroBatchSize);
        }
        let available = groups.iter().map(Vec::len).sum::<usize>();
        if groups.iter().all(|g| g.len() < batch_size) {
            return Err(PipelineError::BatchLargerThanDataset { batch_size, available });
        }

        let mut sampler = Self {
            groups,
            batch_size,
            policy,
            shuffle,
            rng: StdRng::seed_from_u64(seed),
            plan: Vec::new(),
            cursor: 0,
        };
        sampler.reset();
        Ok(sampler)
    }

    /// Start a new epoch.
    pub fn reset(&mut self) {
        if self.shuffle {
            for group in &mut self.groups {
                group.shuffle(&mut self.rng);
            }
        }

        self.plan.clear();
        for (g, group) in self.groups.iter().enumerate() {
            for start in self.policy.starts(group.len(), self.batch_size) {
                self.plan.push((g, start));
            }
        }
        if self.shuffle {
            self.plan.shuffle(&mut self.rng);
        }
        self.cursor = 0;
    }

    pub fn has_next(&self) -> bool {
        self.cursor < self.plan.len()
    }

    /// Indices of the next batch, or None once the epoch is exhausted.
    pub fn next(&mut self) -> Option<Vec<usize>> {
        let &(g, start) = self.plan.get(self.cursor)?;
        self.cursor += 1;
        Some(self.groups[g][start..start + self.batch_size].to_vec())
    }

    pub fn batches_per_epoch(&self) -> usize { self.plan.len() }

    pub fn batch_size(&self) -> usize { self.batch_size }

    pub fn policy(&self) -> WindowPolicy { self.policy }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn drain(s: &mut BatchSampler) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        while let Some(b) = s.next() {
            out.push(b);
        }
        out
    }

    #[test]
    fn test_floor_n_over_b_batches() {
        let mut s = BatchSampler::new(vec![(0..10).collect()], 3, WindowPolicy::Disjoint, true, 7).unwrap();
        let batches = drain(&mut s);
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 3));
    }

    #[test]
    fn test_seven_by_three_drops_one_sample_without_repeats() {
        let mut s = BatchSampler::new(vec![(0..7).collect()], 3, WindowPolicy::Disjoint, false, 0).unwrap();
        let batches = drain(&mut s);
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        // index 6 never appears this epoch
        assert!(batches.iter().flatten().all(|&i| i != 6));
    }

    #[test]
    fn test_no_index_repeats_within_an_epoch() {
        let mut s = BatchSampler::new(vec![(0..20).collect()], 4, WindowPolicy::Disjoint, true, 3).unwrap();
        let seen: Vec<usize> = drain(&mut s).into_iter().flatten().collect();
        let unique: HashSet<usize> = seen.iter().copied().collect();
        assert_eq!(seen.len(), 20);
        assert_eq!(unique.len(), 20);
    }

    #[test]
    fn test_end_of_epoch_is_explicit() {
        let mut s = BatchSampler::new(vec![(0..4).collect()], 2, WindowPolicy::Disjoint, false, 0).unwrap();
        assert!(s.has_next());
        s.next();
        s.next();
        assert!(!s.has_next());
        assert_eq!(s.next(), None);
        s.reset();
        assert!(s.has_next());
    }

    #[test]
    fn test_successive_resets_reshuffle() {
        let mut s = BatchSampler::new(vec![(0..12).collect()], 3, WindowPolicy::Disjoint, true, 42).unwrap();
        let first = drain(&mut s);
        s.reset();
        let second = drain(&mut s);
        assert_ne!(first, second);
    }

    #[test]
    fn test_deterministic_mode_is_identity() {
        let mut s = BatchSampler::new(vec![(0..6).collect()], 2, WindowPolicy::Disjoint, false, 9).unwrap();
        let first = drain(&mut s);
        s.reset();
        assert_eq!(first, drain(&mut s));
        assert_eq!(first, vec![vec![0, 1], vec![2, 3], vec![4, 5]]);
    }

    #[test]
    fn test_sliding_windows_advance_by_one() {
        let mut s = BatchSampler::new(vec![(0..5).collect()], 3, WindowPolicy::Sliding, false, 0).unwrap();
        assert_eq!(s.batches_per_epoch(), 3);
        assert_eq!(drain(&mut s), vec![vec![0, 1, 2], vec![1, 2, 3], vec![2, 3, 4]]);
    }

    #[test]
    fn test_batches_never_mix_groups() {
        let groups = vec![vec![0, 1, 2, 3], vec![4, 5, 6]];
        let mut s = BatchSampler::new(groups, 2, WindowPolicy::Disjoint, true, 5).unwrap();
        let batches = drain(&mut s);
        // 2 from the first group, 1 from the second (index left over)
        assert_eq!(batches.len(), 3);
        for b in batches {
            let low = b.iter().all(|&i| i < 4);
            let high = b.iter().all(|&i| i >= 4);
            assert!(low || high);
        }
    }

    #[test]
    fn test_batch_larger_than_dataset_is_a_config_error() {
        let err = BatchSampler::new(vec![(0..3).collect()], 4, WindowPolicy::Disjoint, true, 0).unwrap_err();
        assert_eq!(err, PipelineError::BatchLargerThanDataset { batch_size: 4, available: 3 });
    }

    #[test]
    fn test_zero_batch_size_is_a_config_error() {
        let err = BatchSampler::new(vec![(0..3).collect()], 0, WindowPolicy::Disjoint, true, 0).unwrap_err();
        assert_eq!(err, PipelineError::ZeroBatchSize);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("sliding".parse::<WindowPolicy>().unwrap(), WindowPolicy::Sliding);
        assert!("random".parse::<WindowPolicy>().is_err());
    }
}
