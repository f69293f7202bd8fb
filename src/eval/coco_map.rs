//! COCO-style average precision for bounding boxes.
//!
//! Follows the pycocotools conventions: greedy score-ordered matching per image,
//! a monotone precision envelope, and 101-point recall sampling. Only the
//! "all areas" range is evaluated.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::trace;

use crate::dataset::Annotation;
use crate::prediction::BboxResult;

const RECALL_POINTS: usize = 101;

/// IoU thresholds 0.50, 0.55, ..., 0.95.
pub fn iou_thresholds() -> Vec<f64> {
    (0..10).map(|i| 0.5 + 0.05 * i as f64).collect()
}

/// Intersection over union of two `(x, y, w, h)` boxes.
pub fn iou_xywh(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let ix = ((a[0] + a[2]).min(b[0] + b[2]) - a[0].max(b[0])).max(0.0);
    let iy = ((a[1] + a[3]).min(b[1] + b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let union = a[2] * a[3] + b[2] * b[3] - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapSummary {
    /// AP averaged over IoU 0.50:0.95.
    pub map: f64,
    pub ap50: f64,
    pub ap75: f64,
}

impl MapSummary {
    /// pycocotools reports -1 when no category has ground truth.
    pub const UNDEFINED: MapSummary = MapSummary {
        map: -1.0,
        ap50: -1.0,
        ap75: -1.0,
    };

    pub fn is_defined(&self) -> bool {
        self.map >= 0.0
    }
}

/// Scores `results` against `annotations`, restricted to `image_ids`.
pub fn average_precision(
    results: &[BboxResult],
    annotations: &[Annotation],
    image_ids: &HashSet<u64>,
    max_dets: usize,
) -> MapSummary {
    let mut gts: HashMap<(u64, u64), Vec<&[f64; 4]>> = HashMap::new();
    let mut categories = BTreeSet::new();
    for ann in annotations.iter().filter(|a| image_ids.contains(&a.image_id)) {
        gts.entry((ann.image_id, ann.category_id))
            .or_default()
            .push(&ann.bbox);
        categories.insert(ann.category_id);
    }
    if categories.is_empty() {
        return MapSummary::UNDEFINED;
    }

    let mut dts: HashMap<(u64, u64), Vec<&BboxResult>> = HashMap::new();
    for r in results.iter().filter(|r| image_ids.contains(&r.image_id)) {
        dts.entry((r.image_id, r.category_id)).or_default().push(r);
    }
    for dets in dts.values_mut() {
        dets.sort_by(|a, b| b.score.total_cmp(&a.score));
        dets.truncate(max_dets);
    }

    let mut images: Vec<u64> = image_ids.iter().copied().collect();
    images.sort_unstable();
    let thresholds = iou_thresholds();

    // ap[t][k]
    let mut ap = vec![Vec::with_capacity(categories.len()); thresholds.len()];
    for &cat in &categories {
        for (t, &thr) in thresholds.iter().enumerate() {
            let mut scored = Vec::new();
            let mut n_gt = 0usize;
            for &img in &images {
                let g = gts.get(&(img, cat)).map_or(&[][..], |v| v.as_slice());
                let d = dts.get(&(img, cat)).map_or(&[][..], |v| v.as_slice());
                n_gt += g.len();
                scored.extend(match_image(d, g, thr));
            }
            let value = ap_from_matches(scored, n_gt);
            trace!(category = cat, iou = thr, ap = value, "class ap");
            ap[t].push(value);
        }
    }

    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let per_threshold: Vec<f64> = ap.iter().map(|row| mean(row.as_slice())).collect();
    MapSummary {
        map: mean(per_threshold.as_slice()),
        ap50: per_threshold[0],
        ap75: per_threshold[5],
    }
}

/// Greedy matching of score-sorted detections; yields `(score, is_tp)` per detection.
fn match_image(dets: &[&BboxResult], gts: &[&[f64; 4]], threshold: f64) -> Vec<(f64, bool)> {
    let mut taken = vec![false; gts.len()];
    dets.iter()
        .map(|d| {
            let mut best_iou = threshold.min(1.0 - 1e-10);
            let mut best = None;
            for (g, gt) in gts.iter().enumerate() {
                if taken[g] {
                    continue;
                }
                let iou = iou_xywh(&d.bbox, gt);
                if iou < best_iou {
                    continue;
                }
                best_iou = iou;
                best = Some(g);
            }
            if let Some(g) = best {
                taken[g] = true;
            }
            (d.score, best.is_some())
        })
        .collect()
}

fn ap_from_matches(mut scored: Vec<(f64, bool)>, n_gt: usize) -> f64 {
    if n_gt == 0 || scored.is_empty() {
        return 0.0;
    }
    // stable, so equal scores keep image order
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut recall = Vec::with_capacity(scored.len());
    let mut precision = Vec::with_capacity(scored.len());
    for (_, is_tp) in &scored {
        if *is_tp {
            tp += 1;
        } else {
            fp += 1;
        }
        recall.push(tp as f64 / n_gt as f64);
        precision.push(tp as f64 / (tp + fp) as f64);
    }
    for i in (1..precision.len()).rev() {
        if precision[i] > precision[i - 1] {
            precision[i - 1] = precision[i];
        }
    }

    let mut sum = 0.0;
    for r in 0..RECALL_POINTS {
        let rec_thr = r as f64 / (RECALL_POINTS - 1) as f64;
        let idx = recall.partition_point(|&rc| rc < rec_thr);
        match precision.get(idx) {
            Some(p) => sum += p,
            None => break,
        }
    }
    sum / RECALL_POINTS as f64
}
