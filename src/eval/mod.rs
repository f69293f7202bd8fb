use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::debug;

pub mod checkout;
pub mod coco_map;
pub mod density;

pub use checkout::CheckoutMetrics;
pub use coco_map::MapSummary;
pub use density::DensityStats;

use crate::dataset::GroundTruth;
use crate::prediction::BboxResult;
use crate::Result;

/// Scores flattened detections against a ground truth document.
pub trait Evaluator {
    fn evaluate(&self, results: &[BboxResult], ground_truth: &GroundTruth) -> Result<EvalReport>;
}

/// Name of the row covering every image.
pub const ALL_LEVEL: &str = "all";
const KNOWN_LEVELS: [&str; 3] = ["easy", "medium", "hard"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub level: String,
    pub images: usize,
    #[serde(flatten)]
    pub checkout: CheckoutMetrics,
    pub map50: f64,
    pub mmap: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvalReport {
    pub rows: Vec<MetricRow>,
}

impl EvalReport {
    pub fn row(&self, level: &str) -> Option<&MetricRow> {
        self.rows.iter().find(|r| r.level == level)
    }

    pub fn overall(&self) -> Option<&MetricRow> {
        self.row(ALL_LEVEL)
    }
}

fn percent(v: f64) -> String {
    if v < 0.0 {
        "n/a".to_string()
    } else {
        format!("{:.2}%", v * 100.0)
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10}{:>8}{:>9}{:>9}{:>9}{:>9}{:>9}{:>9}",
            "level", "images", "cAcc", "ACD", "mCCD", "mCIoU", "mAP50", "mmAP"
        )?;
        for r in &self.rows {
            write!(
                f,
                "\n{:<10}{:>8}{:>9}{:>9.3}{:>9.3}{:>9}{:>9}{:>9}",
                r.level,
                r.images,
                percent(r.checkout.c_acc),
                r.checkout.acd,
                r.checkout.mccd,
                percent(r.checkout.mciou),
                percent(r.map50),
                percent(r.mmap),
            )?;
        }
        Ok(())
    }
}

/// Checkout counting metrics plus COCO mAP, per difficulty level and overall.
#[derive(Debug, Clone)]
pub struct RpcEvaluator {
    /// Minimum score for a detection to count towards checkout metrics.
    pub score_threshold: f64,
    /// Detections kept per image and category for mAP.
    pub max_dets: usize,
}

impl Default for RpcEvaluator {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            max_dets: 100,
        }
    }
}

impl RpcEvaluator {
    fn score_subset(
        &self,
        level: &str,
        image_ids: &HashSet<u64>,
        results: &[BboxResult],
        ground_truth: &GroundTruth,
    ) -> MetricRow {
        let checkout = checkout::checkout_metrics(
            results,
            &ground_truth.annotations,
            image_ids,
            self.score_threshold,
        );
        let map = coco_map::average_precision(
            results,
            &ground_truth.annotations,
            image_ids,
            self.max_dets,
        );
        debug!(tier = level, images = image_ids.len(), ?checkout, ?map, "scored level");
        MetricRow {
            level: level.to_string(),
            images: image_ids.len(),
            checkout,
            map50: map.ap50,
            mmap: map.map,
        }
    }
}

impl Evaluator for RpcEvaluator {
    fn evaluate(&self, results: &[BboxResult], ground_truth: &GroundTruth) -> Result<EvalReport> {
        let mut by_level: BTreeMap<&str, HashSet<u64>> = BTreeMap::new();
        for img in &ground_truth.images {
            if let Some(level) = img.level.as_deref() {
                by_level.entry(level).or_default().insert(img.id);
            }
        }

        let mut levels: Vec<&str> = KNOWN_LEVELS
            .iter()
            .copied()
            .filter(|l| by_level.contains_key(l))
            .collect();
        levels.extend(by_level.keys().copied().filter(|l| !KNOWN_LEVELS.contains(l)));

        let mut rows: Vec<MetricRow> = levels
            .into_iter()
            .map(|l| self.score_subset(l, &by_level[l], results, ground_truth))
            .collect();

        let all: HashSet<u64> = ground_truth.images.iter().map(|i| i.id).collect();
        rows.push(self.score_subset(ALL_LEVEL, &all, results, ground_truth));
        Ok(EvalReport { rows })
    }
}
