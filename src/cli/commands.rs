// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Three subcommands: `train`, `stats` and `caption`.
//
// `stats` takes the same flags as `train` so it reports on
// exactly the data a training run with those flags would see.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{caption_use_case::CaptionRequest, train_use_case::TrainConfig};
use crate::data::{bucketing::Bucketing, sampler::WindowPolicy};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the caption decoder on top of the frozen extractor
    Train(TrainArgs),

    /// Report split sizes, discarded captions and buckets without training
    Stats(TrainArgs),

    /// Caption one image with a trained checkpoint
    Caption(CaptionArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Annotation JSON with image records and tokenized sentences
    #[arg(long, default_value = "data/dataset.json")]
    pub annotations: String,

    /// Vocabulary JSON; built from the train split when missing
    #[arg(long, default_value = "data/vocab.json")]
    pub vocab: String,

    /// Minimum frequency for a word to enter a built vocabulary
    #[arg(long, default_value_t = 1)]
    pub min_count: usize,

    /// Directory the annotation filenames are relative to
    #[arg(long, default_value = "data/images")]
    pub image_root: String,

    /// Images are resized to image_size × image_size
    #[arg(long, default_value_t = 224)]
    pub image_size: usize,

    /// Width of the image embedding
    #[arg(long, default_value_t = 4096)]
    pub feature_dim: usize,

    /// safetensors file with the extractor weights
    #[arg(long)]
    pub pretrained: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 50)]
    pub batch_size: usize,

    /// LSTM hidden units
    #[arg(long, default_value_t = 256)]
    pub num_hidden: usize,

    /// Word embedding width
    #[arg(long, default_value_t = 256)]
    pub num_embed: usize,

    /// Stacked LSTM layers
    #[arg(long, default_value_t = 1)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    /// Validate every N epochs (epochs count from 0); ≤ 0 disables
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    pub freq_val: i64,

    /// Checkpoint every N epochs; ≤ 0 disables
    #[arg(long, default_value_t = 5, allow_negative_numbers = true)]
    pub period: i64,

    /// cpu, gpu or gpu:N
    #[arg(long, default_value = "cpu")]
    pub device: String,

    /// Checkpoint path prefix
    #[arg(long, default_value = "./checkpoint/train")]
    pub prefix: String,

    /// fixed, auto, or a comma separated list of lengths
    #[arg(long, default_value = "fixed")]
    pub bucketing: Bucketing,

    /// disjoint or sliding batch windows
    #[arg(long, default_value = "disjoint")]
    pub window: WindowPolicy,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Log progress every N batches
    #[arg(long, default_value_t = 20)]
    pub log_interval: usize,

    /// Directory for metrics.csv
    #[arg(long, default_value = "./checkpoint")]
    pub metrics_dir: String,

    /// Continue from the newest checkpoint under --prefix
    #[arg(long)]
    pub resume: bool,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            annotations:  a.annotations,
            vocab:        a.vocab,
            min_count:    a.min_count,
            image_root:   a.image_root,
            image_size:   a.image_size,
            feature_dim:  a.feature_dim,
            pretrained:   a.pretrained,
            epochs:       a.epochs,
            batch_size:   a.batch_size,
            num_hidden:   a.num_hidden,
            num_embed:    a.num_embed,
            num_layers:   a.num_layers,
            lr:           a.lr,
            freq_val:     a.freq_val,
            period:       a.period,
            device:       a.device,
            prefix:       a.prefix,
            bucketing:    a.bucketing,
            window:       a.window,
            seed:         a.seed,
            log_interval: a.log_interval,
            metrics_dir:  a.metrics_dir,
            resume:       a.resume,
            seq_len:      0,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CaptionArgs {
    /// Image file to caption
    #[arg(long)]
    pub image: String,

    /// Checkpoint prefix used by `train`
    #[arg(long, default_value = "./checkpoint/train")]
    pub prefix: String,

    /// Checkpoint epoch (default: newest)
    #[arg(long)]
    pub epoch: Option<usize>,

    /// Override the device saved with the run
    #[arg(long)]
    pub device: Option<String>,

    /// Override the maximum caption length
    #[arg(long)]
    pub max_len: Option<usize>,
}

impl From<CaptionArgs> for CaptionRequest {
    fn from(a: CaptionArgs) -> Self {
        CaptionRequest {
            prefix:  a.prefix,
            image:   a.image,
            epoch:   a.epoch,
            device:  a.device,
            max_len: a.max_len,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["caption-train", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();
        assert_eq!(cfg.epochs, def.epochs);
        assert_eq!(cfg.batch_size, def.batch_size);
        assert_eq!(cfg.freq_val, def.freq_val);
        assert_eq!(cfg.prefix, def.prefix);
        assert_eq!(cfg.bucketing, def.bucketing);
    }

    #[test]
    fn test_negative_cadence_and_bucket_list() {
        let cli = Cli::try_parse_from([
            "caption-train", "train", "--freq-val", "-1", "--bucketing", "8,12", "--window", "sliding",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert_eq!(args.freq_val, -1);
        assert_eq!(args.bucketing, Bucketing::Explicit(vec![8, 12]));
        assert_eq!(args.window, WindowPolicy::Sliding);
    }

    #[test]
    fn test_caption_requires_image() {
        assert!(Cli::try_parse_from(["caption-train", "caption"]).is_err());
        let cli = Cli::try_parse_from(["caption-train", "caption", "--image", "x.png", "--epoch", "3"]).unwrap();
        let Commands::Caption(args) = cli.command else { panic!("expected caption") };
        let req: CaptionRequest = args.into();
        assert_eq!(req.epoch, Some(3));
    }
}
