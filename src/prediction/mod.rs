use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub mod boxlist;
pub use boxlist::BoxList;

use crate::{EvalError, Result};

/// One detection in COCO result format, as written to `bbox_results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BboxResult {
    pub image_id: u64,
    pub category_id: u64,
    /// x, y, width, height
    pub bbox: [f64; 4],
    pub score: f64,
}

/// On-disk shape of a single image's prediction.
#[derive(Debug, Deserialize)]
struct RawPrediction {
    size: [u32; 2],
    #[serde(default)]
    boxes: Vec<[f32; 4]>,
    #[serde(default)]
    labels: Vec<u64>,
    #[serde(default)]
    scores: Vec<f32>,
    #[serde(default)]
    density_map: Option<Vec<Vec<f32>>>,
}

impl RawPrediction {
    fn into_box_list(self, index: usize) -> Result<BoxList> {
        let [width, height] = self.size;
        if width == 0 || height == 0 {
            return Err(EvalError::EmptyFrame {
                index,
                width,
                height,
            });
        }
        if self.boxes.len() != self.labels.len() || self.boxes.len() != self.scores.len() {
            return Err(EvalError::MismatchedFields {
                index,
                boxes: self.boxes.len(),
                labels: self.labels.len(),
                scores: self.scores.len(),
            });
        }
        let mut list = BoxList::new((width, height), self.boxes, self.labels, self.scores);
        if let Some(rows) = self.density_map {
            list = list.with_density_map(density_from_rows(rows, index)?);
        }
        Ok(list)
    }
}

fn density_from_rows(rows: Vec<Vec<f32>>, index: usize) -> Result<Array2<f32>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, |r| r.len());
    if rows.iter().any(|r| r.len() != n_cols) {
        return Err(EvalError::DensityShape { index });
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat).map_err(|_| EvalError::DensityShape { index })
}

/// Reads per-image predictions, in dataset order, from a JSON array.
pub fn load_predictions<P: AsRef<Path>>(path: P) -> Result<Vec<BoxList>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    parse_predictions(&raw, path)
}

fn parse_predictions(raw: &str, origin: &Path) -> Result<Vec<BoxList>> {
    let entries: Vec<RawPrediction> =
        serde_json::from_str(raw).map_err(|e| EvalError::json(origin, e))?;
    entries
        .into_iter()
        .enumerate()
        .map(|(i, p)| p.into_box_list(i))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_plain_and_density_predictions() {
        let raw = r#"[
            {"size": [100, 100], "boxes": [[0, 0, 10, 10]], "labels": [1], "scores": [0.8]},
            {"size": [100, 100], "density_map": [[0.5, 0.5, 0.0], [1.0, 0.0, 0.0]]}
        ]"#;
        let preds = parse_predictions(raw, Path::new("preds.json")).unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].len(), 1);
        assert!(!preds[0].has_density_map());
        assert!(preds[1].is_empty());
        let map = preds[1].density_map.as_ref().unwrap();
        assert_eq!(map.dim(), (2, 3));
        assert_eq!(preds[1].density(), Some(2.0));
    }

    #[test]
    fn rejects_mismatched_fields() {
        let raw = r#"[{"size": [10, 10], "boxes": [[0, 0, 1, 1]], "labels": [], "scores": [0.3]}]"#;
        match parse_predictions(raw, Path::new("preds.json")) {
            Err(EvalError::MismatchedFields {
                index: 0,
                boxes: 1,
                labels: 0,
                scores: 1,
            }) => {}
            _ => panic!("expected MismatchedFields"),
        }
    }

    #[test]
    fn rejects_ragged_density_map() {
        let raw = r#"[{"size": [10, 10], "density_map": [[1.0, 2.0], [3.0]]}]"#;
        assert!(matches!(
            parse_predictions(raw, Path::new("preds.json")),
            Err(EvalError::DensityShape { index: 0 })
        ));
    }

    #[test]
    fn rejects_zero_frame() {
        let raw = r#"[{"size": [0, 10]}]"#;
        assert!(matches!(
            parse_predictions(raw, Path::new("preds.json")),
            Err(EvalError::EmptyFrame { index: 0, .. })
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_predictions(dir.path().join("absent.json")),
            Err(EvalError::Io { .. })
        ));
    }

    #[test]
    fn bbox_result_serializes_in_coco_shape() {
        let r = BboxResult {
            image_id: 5,
            category_id: 2,
            bbox: [1.0, 2.0, 3.0, 4.0],
            score: 0.5,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"image_id": 5, "category_id": 2, "bbox": [1.0, 2.0, 3.0, 4.0], "score": 0.5})
        );
    }
}
