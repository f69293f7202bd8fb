use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no predictions to evaluate")]
    NoPredictions,
    #[error("prediction {index}: {boxes} boxes, {labels} labels, {scores} scores")]
    MismatchedFields {
        index: usize,
        boxes: usize,
        labels: usize,
        scores: usize,
    },
    #[error("image index {index} out of range for dataset of {len} images")]
    ImageIndexOutOfRange { index: usize, len: usize },
    #[error("prediction {index}: frame size must be non-zero, got {width}x{height}")]
    EmptyFrame {
        index: usize,
        width: u32,
        height: u32,
    },
    #[error("prediction {index}: density map rows have unequal widths")]
    DensityShape { index: usize },
    #[error("prediction {index} has no density map, but the first prediction does")]
    MissingDensityMap { index: usize },
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl EvalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EvalError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        EvalError::Json {
            path: path.into(),
            source,
        }
    }
}
