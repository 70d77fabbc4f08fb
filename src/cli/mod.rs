// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with clap.
// All work is delegated to Layer 2 (application); this layer
// only routes and prints.
//
//   1. `train`   — train the decoder, checkpoint, log metrics
//   2. `stats`   — index the splits and print what training would see
//   3. `caption` — greedy caption for one image from a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{CaptionArgs, Commands, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "caption-train",
    version = "0.1.0",
    about = "Train an LSTM caption decoder on frozen image features, then caption images."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Stats(args)   => run_stats(args),
            Commands::Caption(args) => run_caption(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on annotations in: {}", args.annotations);
    let prefix = args.prefix.clone();
    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints under '{prefix}'.");
    Ok(())
}

fn run_stats(args: TrainArgs) -> Result<()> {
    use crate::application::stats_use_case::StatsUseCase;

    let stats = StatsUseCase::new(args.into()).execute()?;

    println!("vocabulary: {} embedding rows", stats.vocab_size);
    println!("sequence lengths: {:?}", stats.seq_lens);
    for s in &stats.splits {
        let batches = s
            .batches
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "\n[{}] images={} captions={} kept={} discarded={} unk_tokens={} batches/epoch={}",
            s.split, s.records, s.captions, s.kept, s.discarded, s.unknown_tokens, batches
        );
        for (len, n) in &s.per_bucket {
            println!("  L={len:<4} {n}");
        }
    }
    Ok(())
}

fn run_caption(args: CaptionArgs) -> Result<()> {
    use crate::application::caption_use_case::CaptionUseCase;

    let caption = CaptionUseCase::new(args.into()).execute()?;
    println!("\nCaption: {caption}");
    Ok(())
}
