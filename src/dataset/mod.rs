use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod coco;
pub use coco::CocoDataset;

use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageInfo {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    /// RPC difficulty tier: `easy`, `medium` or `hard`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub image_id: u64,
    pub category_id: u64,
    /// x, y, width, height
    pub bbox: [f64; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

/// COCO-format ground truth document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundTruth {
    pub images: Vec<ImageInfo>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// What the evaluation loop needs from a dataset.
pub trait AnnotatedDataset {
    /// Info for the `index`-th image in dataset order.
    fn img_info(&self, index: usize) -> Result<&ImageInfo>;
    /// Ground-truth objects of an image; empty for unknown ids.
    fn annotations(&self, image_id: u64) -> &[Annotation];
    fn ground_truth(&self) -> &GroundTruth;
    fn ann_file(&self) -> &Path;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
