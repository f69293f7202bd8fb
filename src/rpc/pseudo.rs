use serde::{Deserialize, Serialize};

use crate::dataset::ImageInfo;
use crate::eval::density::rounded_count;
use crate::prediction::boxlist::xyxy_to_xywh;
use crate::prediction::BoxList;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PseudoLabelConfig {
    /// Boxes must score strictly above this.
    pub min_score: f32,
    pub min_boxes: usize,
}

impl Default for PseudoLabelConfig {
    fn default() -> Self {
        Self {
            min_score: 0.95,
            min_boxes: 3,
        }
    }
}

/// An image whose confident detections agree with its density estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PseudoLabel {
    /// `(label, x, y, width, height)`
    pub bbox: Vec<(u64, f64, f64, f64, f64)>,
    pub width: u32,
    pub height: u32,
    pub id: u64,
    pub file_name: String,
}

/// `prediction` must already be resized to the image frame.
pub fn pseudo_label(
    image: &ImageInfo,
    prediction: &BoxList,
    density: f64,
    cfg: &PseudoLabelConfig,
) -> Option<PseudoLabel> {
    let bbox: Vec<_> = prediction
        .iter()
        .filter(|(_, _, score)| *score > cfg.min_score)
        .map(|(b, label, _)| {
            let [x, y, w, h] = xyxy_to_xywh(b);
            (label, x, y, w, h)
        })
        .collect();

    if bbox.len() < cfg.min_boxes || bbox.len() as f64 != rounded_count(density) {
        return None;
    }
    Some(PseudoLabel {
        bbox,
        width: image.width,
        height: image.height,
        id: image.id,
        file_name: image.file_name.clone(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn image() -> ImageInfo {
        ImageInfo {
            id: 11,
            file_name: "20180824-13-43-23-1.jpg".into(),
            width: 1800,
            height: 1800,
            level: Some("easy".into()),
        }
    }

    fn prediction(scores: Vec<f32>) -> BoxList {
        let n = scores.len();
        let boxes = (0..n)
            .map(|i| {
                let o = i as f32 * 10.0;
                [o, o, o + 5.0, o + 8.0]
            })
            .collect();
        BoxList::new((1800, 1800), boxes, (1..=n as u64).collect(), scores)
    }

    #[test]
    fn accepts_when_confident_count_matches_density() {
        let pred = prediction(vec![0.99, 0.97, 0.96, 0.4]);
        let label = pseudo_label(&image(), &pred, 3.4, &PseudoLabelConfig::default()).unwrap();
        assert_eq!(label.id, 11);
        assert_eq!(label.width, 1800);
        assert_eq!(label.bbox.len(), 3);
        assert_eq!(label.bbox[1], (2, 10.0, 10.0, 5.0, 8.0));
    }

    #[test]
    fn rejects_density_disagreement() {
        let pred = prediction(vec![0.99, 0.97, 0.96]);
        assert!(pseudo_label(&image(), &pred, 4.2, &PseudoLabelConfig::default()).is_none());
    }

    #[test]
    fn rejects_too_few_boxes() {
        let pred = prediction(vec![0.99, 0.97]);
        assert!(pseudo_label(&image(), &pred, 2.0, &PseudoLabelConfig::default()).is_none());
    }

    #[test]
    fn threshold_is_strict() {
        let pred = prediction(vec![0.95, 0.99, 0.99, 0.99]);
        let label = pseudo_label(&image(), &pred, 3.0, &PseudoLabelConfig::default()).unwrap();
        assert!(label.bbox.iter().all(|b| b.0 != 1));
    }

    #[test]
    fn serializes_boxes_as_arrays() {
        let pred = prediction(vec![0.99, 0.99, 0.99]);
        let label = pseudo_label(&image(), &pred, 3.0, &PseudoLabelConfig::default()).unwrap();
        let v = serde_json::to_value(&label).unwrap();
        assert_eq!(v["bbox"][0], serde_json::json!([1, 0.0, 0.0, 5.0, 8.0]));
        assert_eq!(v["file_name"], "20180824-13-43-23-1.jpg");
    }
}
