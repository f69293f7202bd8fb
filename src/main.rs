use anyhow::{Context, Result};
use clap::Parser;
use rpc_eval::config::EvalConfig;
use rpc_eval::dataset::{AnnotatedDataset, CocoDataset};
use rpc_eval::prediction::load_predictions;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "rpc_eval",
    about = "Score detector output on the retail product checkout dataset (checkout metrics, mAP, density counting)"
)]
struct Args {
    /// COCO-style ground truth annotation file.
    #[arg(long)]
    annotations: PathBuf,
    /// Per-image predictions (JSON array, dataset order).
    #[arg(long)]
    predictions: PathBuf,
    /// Where bbox_results.json, pseudo_labeling.json and result_*.txt are written.
    #[arg(long)]
    output_folder: Option<PathBuf>,
    /// TOML config file; rpc_eval.toml is picked up when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit pseudo_labeling.json (density-map predictions only); `=false` turns it off.
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    generate_pseudo_labels: Option<bool>,
    /// Minimum score for a detection to count towards checkout metrics.
    #[arg(long)]
    score_threshold: Option<f64>,
}

fn main() -> Result<()> {
    rpc_eval::init_tracing();
    let args = Args::parse();

    let cfg = EvalConfig::load(args.config.as_deref())
        .context("loading configuration")?
        .with_overrides(
            args.output_folder,
            args.generate_pseudo_labels,
            args.score_threshold,
        );
    info!(?cfg, "configuration");

    let dataset = CocoDataset::open(&args.annotations)
        .with_context(|| format!("reading annotations {}", args.annotations.display()))?;
    let predictions = load_predictions(&args.predictions)
        .with_context(|| format!("reading predictions {}", args.predictions.display()))?;
    info!(
        images = dataset.len(),
        predictions = predictions.len(),
        "inputs loaded"
    );

    let outcome = rpc_eval::rpc_evaluation(
        &dataset,
        &predictions,
        &cfg.output_folder,
        &cfg.options(),
        &cfg.evaluator(),
    )
    .context("evaluation failed")?;
    println!("{outcome}");
    Ok(())
}
