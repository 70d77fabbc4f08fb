// ============================================================
// Layer 4 — Caption Dataset (Dataset Index)
// ============================================================
// Built once per split: every caption of every record whose
// split matches becomes one CaptionSample, in file order.
//
// Captions that fit no bucket are dropped and counted; words
// missing from the vocabulary are replaced by UNK and counted.
// Both counts end up in the IndexReport and are logged as
// warnings. Only a non-recoverable encoding error aborts the
// build.
//
// Samples are grouped by sequence length so that the sampler
// can draw every batch from a single bucket.
//
// Reference: Burn Book §4 (Dataset trait)

use burn::data::dataset::Dataset;
use std::collections::BTreeMap;

use crate::data::{bucketing::BucketStrategy, encoder::SequenceEncoder};
use crate::domain::{
    annotation::{AnnotationSet, Split},
    error::PipelineError,
    vocabulary::{TokenId, Vocabulary},
};

/// One (image, caption) training example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionSample {
    /// Image reference, relative to the image root
    pub image:  String,
    /// [BEGIN, ids..., PAD...]
    pub tokens: Vec<TokenId>,
    /// tokens shifted left, END in the last slot
    pub labels: Vec<TokenId>,
}

impl CaptionSample {
    pub fn seq_len(&self) -> usize { self.tokens.len() }
}

/// Indices of all samples sharing one sequence length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketGroup {
    pub seq_len: usize,
    pub indices: Vec<usize>,
}

/// What happened while indexing one split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub records:        usize,
    pub captions:       usize,
    pub kept:           usize,
    pub discarded:      usize,
    pub unknown_tokens: usize,
    /// seq_len → number of samples
    pub per_bucket:     BTreeMap<usize, usize>,
}

pub struct CaptionDataset {
    split:   Split,
    samples: Vec<CaptionSample>,
    groups:  Vec<BucketGroup>,
    report:  IndexReport,
}

impl CaptionDataset {
    pub fn build(
        annotations: &AnnotationSet,
        split:       Split,
        vocab:       &Vocabulary,
        strategy:    &dyn BucketStrategy,
    ) -> Result<Self, PipelineError> {
        let encoder     = SequenceEncoder::new(vocab);
        let mut samples = Vec::new();
        let mut report  = IndexReport::default();
        let mut by_len: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

        for record in annotations.records(split) {
            report.records += 1;
            for sentence in &record.sentences {
                report.captions += 1;

                let Some(seq_len) = strategy.bucket_for(sentence.tokens.len()) else {
                    report.discarded += 1;
                    continue;
                };
                let encoded = match encoder.encode(&sentence.tokens, seq_len) {
                    Ok(e) => e,
                    Err(e) if e.is_recoverable() => {
                        tracing::debug!("Dropping caption of '{}': {e}", record.filename);
                        report.discarded += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                report.unknown_tokens += encoded.unknown;
                by_len.entry(seq_len).or_default().push(samples.len());
                samples.push(CaptionSample {
                    image:  record.filename.clone(),
                    labels: encoder.labels(&encoded.ids),
                    tokens: encoded.ids,
                });
            }
        }

        report.kept       = samples.len();
        report.per_bucket = by_len.iter().map(|(&l, idx)| (l, idx.len())).collect();
        let groups = by_len
            .into_iter()
            .map(|(seq_len, indices)| BucketGroup { seq_len, indices })
            .collect();

        if report.discarded > 0 {
            tracing::warn!(
                "[{split}] discarded {} of {} captions that fit no sequence length",
                report.discarded,
                report.captions
            );
        }
        if report.unknown_tokens > 0 {
            tracing::warn!(
                "[{split}] replaced {} out-of-vocabulary tokens with UNK",
                report.unknown_tokens
            );
        }
        tracing::info!(
            "[{split}] indexed {} samples from {} images",
            report.kept,
            report.records
        );

        Ok(Self { split, samples, groups, report })
    }

    pub fn split(&self) -> Split { self.split }

    pub fn groups(&self) -> &[BucketGroup] { &self.groups }

    pub fn report(&self) -> &IndexReport { &self.report }

    pub fn samples(&self) -> &[CaptionSample] { &self.samples }
}

impl Dataset<CaptionSample> for CaptionDataset {
    fn get(&self, index: usize) -> Option<CaptionSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::bucketing::{FixedLength, LengthBuckets};
    use crate::testing::{sample_annotations, tiny_vocab};

    #[test]
    fn test_train_split_keeps_file_order() {
        let set   = sample_annotations();
        let vocab = tiny_vocab();
        let ds    = CaptionDataset::build(&set, Split::Train, &vocab, &FixedLength::new(6)).unwrap();

        let images: Vec<&str> = ds.samples().iter().map(|s| s.image.as_str()).collect();
        assert_eq!(images, vec!["a.jpg", "a.jpg", "b.jpg", "d.jpg"]);
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.report().records, 3);
    }

    #[test]
    fn test_samples_carry_tokens_and_labels() {
        let set   = sample_annotations();
        let vocab = tiny_vocab();
        let ds    = CaptionDataset::build(&set, Split::Train, &vocab, &FixedLength::new(5)).unwrap();

        // "a cat sat" → [#, a, cat, sat, PAD]
        let first = ds.get(0).unwrap();
        assert_eq!(first.tokens, vec![1, 3, 4, 5, -1]);
        assert_eq!(first.labels, vec![3, 4, 5, -1, 2]);
    }

    #[test]
    fn test_too_long_captions_are_counted_not_fatal() {
        let set   = sample_annotations();
        let vocab = tiny_vocab();
        // L = 3 fits at most 2 tokens: "a cat sat" and "a dog ran" are dropped
        let ds = CaptionDataset::build(&set, Split::Train, &vocab, &FixedLength::new(3)).unwrap();
        assert_eq!(ds.report().discarded, 2);
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_unknown_tokens_are_counted() {
        let set   = sample_annotations();
        let vocab = tiny_vocab();
        let ds    = CaptionDataset::build(&set, Split::Val, &vocab, &FixedLength::new(6)).unwrap();
        // "down" is not in the vocabulary
        assert_eq!(ds.report().unknown_tokens, 1);
        assert_eq!(ds.get(0).unwrap().tokens[4], vocab.unk());
    }

    #[test]
    fn test_groups_follow_buckets() {
        let set     = sample_annotations();
        let vocab   = tiny_vocab();
        let buckets = LengthBuckets::new(vec![3, 5]).unwrap();
        let ds      = CaptionDataset::build(&set, Split::Train, &vocab, &buckets).unwrap();

        assert_eq!(ds.groups().len(), 2);
        assert_eq!(ds.groups()[0], BucketGroup { seq_len: 3, indices: vec![1, 3] });
        assert_eq!(ds.groups()[1], BucketGroup { seq_len: 5, indices: vec![0, 2] });
        assert_eq!(ds.report().per_bucket.get(&3), Some(&2));
    }
}
