use ndarray::Array2;

use super::BboxResult;

/// Detector output for one image.
///
/// Boxes are `(x1, y1, x2, y2)` in the coordinate frame given by `size`.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxList {
    pub size: (u32, u32),
    pub boxes: Vec<[f32; 4]>,
    pub labels: Vec<u64>,
    pub scores: Vec<f32>,
    pub density_map: Option<Array2<f32>>,
}

impl BoxList {
    pub fn new(size: (u32, u32), boxes: Vec<[f32; 4]>, labels: Vec<u64>, scores: Vec<f32>) -> Self {
        Self {
            size,
            boxes,
            labels,
            scores,
            density_map: None,
        }
    }

    pub fn with_density_map(mut self, density_map: Array2<f32>) -> Self {
        self.density_map = Some(density_map);
        self
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn has_density_map(&self) -> bool {
        self.density_map.is_some()
    }

    /// Estimated object count: the sum over the density map.
    pub fn density(&self) -> Option<f64> {
        self.density_map.as_ref().map(|m| m.sum() as f64)
    }

    /// Rescales the boxes into a `(width, height)` frame. The density map is kept as is.
    pub fn resize(&self, size: (u32, u32)) -> BoxList {
        if size == self.size {
            return self.clone();
        }
        let ratio_w = size.0 as f32 / self.size.0 as f32;
        let ratio_h = size.1 as f32 / self.size.1 as f32;
        let boxes = self
            .boxes
            .iter()
            .map(|b| [b[0] * ratio_w, b[1] * ratio_h, b[2] * ratio_w, b[3] * ratio_h])
            .collect();
        BoxList {
            size,
            boxes,
            labels: self.labels.clone(),
            scores: self.scores.clone(),
            density_map: self.density_map.clone(),
        }
    }

    /// Flattens into xywh result records tagged with `image_id`.
    pub fn to_results(&self, image_id: u64) -> Vec<BboxResult> {
        self.iter()
            .map(|(b, label, score)| BboxResult {
                image_id,
                category_id: label,
                bbox: xyxy_to_xywh(b),
                score: score as f64,
            })
            .collect()
    }

    /// `(box, label, score)` triples.
    pub fn iter(&self) -> impl Iterator<Item = ([f32; 4], u64, f32)> + '_ {
        self.boxes
            .iter()
            .zip(&self.labels)
            .zip(&self.scores)
            .map(|((b, l), s)| (*b, *l, *s))
    }
}

pub fn xyxy_to_xywh(b: [f32; 4]) -> [f64; 4] {
    let (x1, y1, x2, y2) = (b[0] as f64, b[1] as f64, b[2] as f64, b[3] as f64);
    [x1, y1, x2 - x1, y2 - y1]
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    fn sample() -> BoxList {
        BoxList::new(
            (200, 100),
            vec![[10.0, 20.0, 50.0, 60.0], [0.0, 0.0, 100.0, 100.0]],
            vec![3, 8],
            vec![0.9, 0.25],
        )
    }

    #[test]
    fn to_results_converts_corners_to_width_height() {
        let results = sample().to_results(42);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].image_id, 42);
        assert_eq!(results[0].category_id, 3);
        assert_eq!(results[0].bbox, [10.0, 20.0, 40.0, 40.0]);
        assert!((results[0].score - 0.9).abs() < 1e-6);
        assert_eq!(results[1].category_id, 8);
        assert_eq!(results[1].bbox, [0.0, 0.0, 100.0, 100.0]);
    }

    #[test]
    fn resize_scales_each_axis() {
        let resized = sample().resize((400, 50));
        assert_eq!(resized.size, (400, 50));
        assert_eq!(resized.boxes[0], [20.0, 10.0, 100.0, 30.0]);
        assert_eq!(resized.labels, vec![3, 8]);
    }

    #[test]
    fn resize_to_same_size_is_identity() {
        let list = sample();
        assert_eq!(list.resize((200, 100)), list);
    }

    #[test]
    fn density_sums_the_map() {
        let list = sample().with_density_map(array![[0.5, 1.0], [1.25, 0.25]]);
        assert!(list.has_density_map());
        assert_eq!(list.density(), Some(3.0));
        assert_eq!(list.resize((100, 100)).density(), Some(3.0));
        assert_eq!(sample().density(), None);
    }
}
