use config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::eval::RpcEvaluator;
use crate::rpc::pseudo::PseudoLabelConfig;
use crate::rpc::RpcOptions;
use crate::Result;

const DEFAULT_CONFIG_NAME: &str = "rpc_eval";
const ENV_PREFIX: &str = "RPC_EVAL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub output_folder: PathBuf,
    pub generate_pseudo_labels: bool,
    /// Minimum score for a detection to count as a checkout item.
    pub score_threshold: f64,
    pub max_dets: usize,
    pub pseudo_label: PseudoLabelConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            output_folder: PathBuf::from("output"),
            generate_pseudo_labels: false,
            score_threshold: 0.5,
            max_dets: 100,
            pseudo_label: PseudoLabelConfig::default(),
        }
    }
}

impl EvalConfig {
    /// Layers an optional TOML file and `RPC_EVAL_*` variables over the defaults.
    ///
    /// Without an explicit file, `rpc_eval.toml` in the working directory is used when present.
    /// Nested keys use `__`, e.g. `RPC_EVAL_PSEUDO_LABEL__MIN_SCORE`.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(file, None)
    }

    /// As [`EvalConfig::load`], reading variables from `env` instead of the
    /// process environment when given.
    pub fn load_with_env(file: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        let settings = Config::builder()
            .add_source(source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Applies command-line values, which take precedence over every other layer.
    pub fn with_overrides(
        mut self,
        output_folder: Option<PathBuf>,
        generate_pseudo_labels: Option<bool>,
        score_threshold: Option<f64>,
    ) -> Self {
        if let Some(folder) = output_folder {
            self.output_folder = folder;
        }
        if let Some(enabled) = generate_pseudo_labels {
            self.generate_pseudo_labels = enabled;
        }
        if let Some(th) = score_threshold {
            self.score_threshold = th;
        }
        self
    }

    pub fn evaluator(&self) -> RpcEvaluator {
        RpcEvaluator {
            score_threshold: self.score_threshold,
            max_dets: self.max_dets,
        }
    }

    pub fn options(&self) -> RpcOptions {
        RpcOptions {
            generate_pseudo_labels: self.generate_pseudo_labels,
            pseudo_label: self.pseudo_label,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn toml_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "{body}").unwrap();
        file
    }

    fn env(vars: &[(&str, &str)]) -> Option<Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn file_overrides_defaults() {
        let file = toml_file(
            "output_folder = \"runs/eval\"\ngenerate_pseudo_labels = true\n\n[pseudo_label]\nmin_score = 0.9",
        );

        let cfg = EvalConfig::load_with_env(Some(file.path()), env(&[])).unwrap();
        assert_eq!(cfg.output_folder, PathBuf::from("runs/eval"));
        assert!(cfg.generate_pseudo_labels);
        assert_eq!(cfg.pseudo_label.min_score, 0.9);
        assert_eq!(cfg.pseudo_label.min_boxes, 3);
        assert_eq!(cfg.score_threshold, 0.5);
        assert_eq!(cfg.max_dets, 100);
    }

    #[test]
    fn environment_overrides_file() {
        let file = toml_file("output_folder = \"from_file\"\nmax_dets = 7\nscore_threshold = 0.4");
        let vars = env(&[
            ("RPC_EVAL_OUTPUT_FOLDER", "from_env"),
            ("RPC_EVAL_SCORE_THRESHOLD", "0.25"),
            ("RPC_EVAL_PSEUDO_LABEL__MIN_BOXES", "5"),
            ("RPC_EVAL_PSEUDO_LABEL__MIN_SCORE", "0.8"),
            ("UNRELATED_MAX_DETS", "1"),
        ]);

        let cfg = EvalConfig::load_with_env(Some(file.path()), vars).unwrap();
        assert_eq!(cfg.output_folder, PathBuf::from("from_env"));
        assert_eq!(cfg.score_threshold, 0.25);
        assert_eq!(cfg.max_dets, 7);
        assert_eq!(cfg.pseudo_label.min_boxes, 5);
        assert_eq!(cfg.pseudo_label.min_score, 0.8);
    }

    #[test]
    fn command_line_overrides_everything() {
        let file = toml_file("output_folder = \"from_file\"\ngenerate_pseudo_labels = true");
        let vars = env(&[("RPC_EVAL_SCORE_THRESHOLD", "0.25")]);

        let cfg = EvalConfig::load_with_env(Some(file.path()), vars)
            .unwrap()
            .with_overrides(Some(PathBuf::from("from_cli")), Some(false), Some(0.7));
        assert_eq!(cfg.output_folder, PathBuf::from("from_cli"));
        assert!(!cfg.generate_pseudo_labels);
        assert_eq!(cfg.score_threshold, 0.7);
    }

    #[test]
    fn absent_overrides_keep_loaded_values() {
        let loaded = EvalConfig {
            output_folder: PathBuf::from("kept"),
            generate_pseudo_labels: true,
            score_threshold: 0.3,
            ..EvalConfig::default()
        };
        assert_eq!(loaded.clone().with_overrides(None, None, None), loaded);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EvalConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn projects_into_evaluator_and_options() {
        let cfg = EvalConfig {
            score_threshold: 0.3,
            max_dets: 10,
            generate_pseudo_labels: true,
            ..EvalConfig::default()
        };
        let evaluator = cfg.evaluator();
        assert_eq!(evaluator.score_threshold, 0.3);
        assert_eq!(evaluator.max_dets, 10);
        assert!(cfg.options().generate_pseudo_labels);
    }
}
