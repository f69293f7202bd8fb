use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{EvalError, Result};

pub const BBOX_RESULTS_FILE: &str = "bbox_results.json";
pub const PSEUDO_LABEL_FILE: &str = "pseudo_labeling.json";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `<prefix>_<YYYY-mm-dd_HH-MM-SS>.<ext>`
pub fn timestamped_name<Tz: TimeZone>(prefix: &str, ext: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("{prefix}_{}.{ext}", now.format(TIMESTAMP_FORMAT))
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| EvalError::io(dir, e))
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).map_err(|e| EvalError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|e| EvalError::json(path, e))?;
    writer.flush().map_err(|e| EvalError::io(path, e))?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Writes `result_<timestamp>.txt` under `folder`.
pub fn write_result_text(folder: &Path, text: &str) -> Result<PathBuf> {
    let path = folder.join(timestamped_name("result", "txt", &Local::now()));
    fs::write(&path, text).map_err(|e| EvalError::io(&path, e))?;
    debug!("wrote {}", path.display());
    Ok(path)
}
