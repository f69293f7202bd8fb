//! Checkout metrics for the retail product counting task.
//!
//! Per image, detections at or above the score threshold are counted per
//! category (`P`). These counts are compared with the ground-truth counts (`G`).

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::dataset::Annotation;
use crate::prediction::BboxResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CheckoutMetrics {
    /// Share of images whose whole product list is counted exactly.
    pub c_acc: f64,
    /// Average counting distance: mean over images of sum_k |P - G|.
    pub acd: f64,
    /// Mean over categories of sum_i |P - G| / sum_i G.
    pub mccd: f64,
    /// Mean over categories of sum_i min(P, G) / sum_i max(P, G).
    pub mciou: f64,
}

type Counts = BTreeMap<u64, BTreeMap<u64, i64>>;

fn count_objects(items: impl Iterator<Item = (u64, u64)>, image_ids: &HashSet<u64>) -> Counts {
    let mut counts = Counts::new();
    for (image_id, category_id) in items.filter(|(img, _)| image_ids.contains(img)) {
        *counts
            .entry(image_id)
            .or_default()
            .entry(category_id)
            .or_default() += 1;
    }
    counts
}

pub fn checkout_metrics(
    results: &[BboxResult],
    annotations: &[Annotation],
    image_ids: &HashSet<u64>,
    score_threshold: f64,
) -> CheckoutMetrics {
    if image_ids.is_empty() {
        return CheckoutMetrics::default();
    }
    let predicted = count_objects(
        results
            .iter()
            .filter(|r| r.score >= score_threshold)
            .map(|r| (r.image_id, r.category_id)),
        image_ids,
    );
    let truth = count_objects(
        annotations.iter().map(|a| (a.image_id, a.category_id)),
        image_ids,
    );

    let empty = BTreeMap::new();
    let mut categories = BTreeSet::new();
    for per_image in predicted.values().chain(truth.values()) {
        categories.extend(per_image.keys().copied());
    }

    let mut exact = 0usize;
    let mut distance = 0i64;
    // category -> (sum |P - G|, sum G, sum min, sum max)
    let mut per_cat: BTreeMap<u64, (i64, i64, i64, i64)> = BTreeMap::new();
    for image_id in image_ids {
        let p = predicted.get(image_id).unwrap_or(&empty);
        let g = truth.get(image_id).unwrap_or(&empty);
        let mut image_distance = 0i64;
        for &cat in &categories {
            let pc = p.get(&cat).copied().unwrap_or(0);
            let gc = g.get(&cat).copied().unwrap_or(0);
            image_distance += (pc - gc).abs();
            let acc = per_cat.entry(cat).or_default();
            acc.0 += (pc - gc).abs();
            acc.1 += gc;
            acc.2 += pc.min(gc);
            acc.3 += pc.max(gc);
        }
        if image_distance == 0 {
            exact += 1;
        }
        distance += image_distance;
    }

    let n = image_ids.len() as f64;
    let ccd: Vec<f64> = per_cat
        .values()
        .filter(|acc| acc.1 > 0)
        .map(|acc| acc.0 as f64 / acc.1 as f64)
        .collect();
    // mCIoU skips categories whose P and G sums are both zero
    let ciou: Vec<f64> = per_cat
        .values()
        .filter(|acc| acc.3 > 0)
        .map(|acc| acc.2 as f64 / acc.3 as f64)
        .collect();

    CheckoutMetrics {
        c_acc: exact as f64 / n,
        acd: distance as f64 / n,
        mccd: mean_or_zero(&ccd),
        mciou: mean_or_zero(&ciou),
    }
}

fn mean_or_zero(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}
