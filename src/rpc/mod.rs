use std::fmt;
use std::path::Path;
use tracing::{debug, info};

pub mod pseudo;

use crate::dataset::AnnotatedDataset;
use crate::eval::{DensityStats, EvalReport, Evaluator};
use crate::prediction::{BboxResult, BoxList};
use crate::report::{self, BBOX_RESULTS_FILE, PSEUDO_LABEL_FILE};
use crate::{EvalError, Result};
use pseudo::{pseudo_label, PseudoLabelConfig};

pub const NOTHING_DETECTED: &str = "Nothing detected.";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RpcOptions {
    /// Only honoured on the density-map path.
    pub generate_pseudo_labels: bool,
    pub pseudo_label: PseudoLabelConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    NothingDetected,
    Evaluated {
        report: EvalReport,
        density: Option<DensityStats>,
    },
}

/// Shortest round-trip form with a signed, two-digit exponent (`1e-05`, `0.5`, `1.0`).
fn ratio_text(value: f64) -> String {
    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

fn density_line(stats: &DensityStats) -> String {
    format!(
        "Ratio: {}, MAE: {:.3} ",
        ratio_text(stats.ratio().unwrap_or_default()),
        stats.mae().unwrap_or_default()
    )
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::NothingDetected => f.write_str(NOTHING_DETECTED),
            Outcome::Evaluated { report, density } => {
                write!(f, "{report}")?;
                if let Some(stats) = density {
                    write!(f, "\n{}", density_line(stats))?;
                }
                Ok(())
            }
        }
    }
}

/// Evaluates `predictions` (one per dataset image, in dataset order) and writes
/// reports into `output_folder`.
///
/// Switches to [`rpc_evaluation_with_density_map`] when the first prediction
/// carries a density map.
pub fn rpc_evaluation<D: AnnotatedDataset + ?Sized>(
    dataset: &D,
    predictions: &[BoxList],
    output_folder: &Path,
    options: &RpcOptions,
    evaluator: &dyn Evaluator,
) -> Result<Outcome> {
    let first = predictions.first().ok_or(EvalError::NoPredictions)?;
    if first.has_density_map() {
        info!("Density map evaluation ...");
        return rpc_evaluation_with_density_map(
            dataset,
            predictions,
            output_folder,
            options,
            evaluator,
        );
    }
    report::ensure_dir(output_folder)?;

    let mut results = Vec::new();
    for (index, prediction) in predictions.iter().enumerate() {
        let img_info = dataset.img_info(index)?;
        let prediction = prediction.resize((img_info.width, img_info.height));
        debug!(index, image_id = img_info.id, boxes = prediction.len(), "image");
        results.extend(prediction.to_results(img_info.id));
    }

    if results.is_empty() {
        return nothing_detected(output_folder);
    }

    let report = score(dataset, &results, output_folder, evaluator)?;
    report::write_result_text(output_folder, &report.to_string())?;
    Ok(Outcome::Evaluated {
        report,
        density: None,
    })
}

/// Like [`rpc_evaluation`], additionally scoring the density-map count estimate
/// of every image and, if enabled, collecting pseudo-labels.
pub fn rpc_evaluation_with_density_map<D: AnnotatedDataset + ?Sized>(
    dataset: &D,
    predictions: &[BoxList],
    output_folder: &Path,
    options: &RpcOptions,
    evaluator: &dyn Evaluator,
) -> Result<Outcome> {
    if predictions.is_empty() {
        return Err(EvalError::NoPredictions);
    }
    report::ensure_dir(output_folder)?;

    let mut results = Vec::new();
    let mut pseudo_labels = Vec::new();
    let mut stats = DensityStats::default();
    for (index, prediction) in predictions.iter().enumerate() {
        let img_info = dataset.img_info(index)?;
        let prediction = prediction.resize((img_info.width, img_info.height));
        let density = prediction
            .density()
            .ok_or(EvalError::MissingDensityMap { index })?;
        let gt_count = dataset.annotations(img_info.id).len();
        let hit = stats.observe(density, gt_count);
        debug!(
            index,
            image_id = img_info.id,
            boxes = prediction.len(),
            density,
            gt_count,
            hit,
            "image"
        );

        if options.generate_pseudo_labels {
            if let Some(label) = pseudo_label(img_info, &prediction, density, &options.pseudo_label)
            {
                pseudo_labels.push(label);
            }
        }

        results.extend(prediction.to_results(img_info.id));
    }

    info!("Ratio: {}", ratio_text(stats.ratio().unwrap_or_default()));
    info!("MAE: {:.3} ", stats.mae().unwrap_or_default());
    if results.is_empty() {
        return nothing_detected(output_folder);
    }

    if options.generate_pseudo_labels {
        info!("Pseudo-Labeling: {}", pseudo_labels.len());
        report::write_json(&output_folder.join(PSEUDO_LABEL_FILE), &pseudo_labels)?;
    }

    let report = score(dataset, &results, output_folder, evaluator)?;
    report::write_result_text(
        output_folder,
        &format!("{report}\n{}", density_line(&stats)),
    )?;
    Ok(Outcome::Evaluated {
        report,
        density: Some(stats),
    })
}

fn nothing_detected(output_folder: &Path) -> Result<Outcome> {
    info!("{NOTHING_DETECTED}");
    report::write_result_text(output_folder, NOTHING_DETECTED)?;
    Ok(Outcome::NothingDetected)
}

/// Persists the flattened detections, then scores them.
fn score<D: AnnotatedDataset + ?Sized>(
    dataset: &D,
    results: &[BboxResult],
    output_folder: &Path,
    evaluator: &dyn Evaluator,
) -> Result<EvalReport> {
    report::write_json(&output_folder.join(BBOX_RESULTS_FILE), results)?;
    info!(
        detections = results.len(),
        "evaluating against {}",
        dataset.ann_file().display()
    );
    let report = evaluator.evaluate(results, dataset.ground_truth())?;
    info!("\n{report}");
    Ok(report)
}
