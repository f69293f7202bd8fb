use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{AnnotatedDataset, Annotation, GroundTruth, ImageInfo};
use crate::{EvalError, Result};

/// Ground truth loaded from a COCO-style annotation file.
pub struct CocoDataset {
    ann_file: PathBuf,
    ground_truth: GroundTruth,
    by_image: HashMap<u64, Vec<Annotation>>,
}

impl CocoDataset {
    pub fn open<P: AsRef<Path>>(ann_file: P) -> Result<Self> {
        let ann_file = ann_file.as_ref();
        let raw = fs::read_to_string(ann_file).map_err(|e| EvalError::io(ann_file, e))?;
        let ground_truth: GroundTruth =
            serde_json::from_str(&raw).map_err(|e| EvalError::json(ann_file, e))?;
        debug!(
            images = ground_truth.images.len(),
            annotations = ground_truth.annotations.len(),
            categories = ground_truth.categories.len(),
            "loaded {}",
            ann_file.display()
        );
        Ok(Self::from_ground_truth(ground_truth, ann_file))
    }

    pub fn from_ground_truth<P: Into<PathBuf>>(ground_truth: GroundTruth, ann_file: P) -> Self {
        let mut by_image: HashMap<u64, Vec<Annotation>> = HashMap::new();
        for ann in &ground_truth.annotations {
            by_image.entry(ann.image_id).or_default().push(ann.clone());
        }
        Self {
            ann_file: ann_file.into(),
            ground_truth,
            by_image,
        }
    }
}

impl AnnotatedDataset for CocoDataset {
    fn img_info(&self, index: usize) -> Result<&ImageInfo> {
        self.ground_truth
            .images
            .get(index)
            .ok_or(EvalError::ImageIndexOutOfRange {
                index,
                len: self.ground_truth.images.len(),
            })
    }

    fn annotations(&self, image_id: u64) -> &[Annotation] {
        self.by_image
            .get(&image_id)
            .map_or(&[][..], |v| v.as_slice())
    }

    fn ground_truth(&self) -> &GroundTruth {
        &self.ground_truth
    }

    fn ann_file(&self) -> &Path {
        &self.ann_file
    }

    fn len(&self) -> usize {
        self.ground_truth.images.len()
    }
}
