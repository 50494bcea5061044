use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use photosort_vision::ModelPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<&'static Path> =
    Lazy::new(|| Path::new(option_env!("PHOTOSORT_CONFIG_PATH").unwrap_or("photosort.toml")));

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Cosine similarity strictly above this counts as a match.
    pub threshold: f32,
    pub reference_dir: PathBuf,
    pub candidate_dir: PathBuf,
    pub results_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub unmatched_dir: PathBuf,
    pub report_csv: PathBuf,
    pub report_html: PathBuf,
    /// Accepted image suffixes, compared case-insensitively.
    pub extensions: Vec<String>,
    pub thumbnail_width: u32,
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub detector_model: PathBuf,
    pub recognizer_model: PathBuf,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: 0.35,
            reference_dir: PathBuf::from("A_references"),
            candidate_dir: PathBuf::from("B_photos"),
            results_dir: PathBuf::from("C_resultats"),
            logs_dir: PathBuf::from("logs"),
            unmatched_dir: PathBuf::from("logs/no_match"),
            report_csv: PathBuf::from("logs/tri_resultats.csv"),
            report_html: PathBuf::from("logs/rapport_resultats.html"),
            extensions: ["jpg", "jpeg", "png", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            thumbnail_width: 200,
            detector: DetectorConfig::default(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detector_model: PathBuf::from("models/face_detection_yunet_2023mar.onnx"),
            recognizer_model: PathBuf::from("models/face_recognition_sface_2021dec.onnx"),
            score_threshold: 0.6,
            nms_threshold: 0.3,
        }
    }
}

impl DetectorConfig {
    pub fn model_paths(&self) -> ModelPaths {
        ModelPaths {
            detector: self.detector_model.clone(),
            recognizer: self.recognizer_model.clone(),
        }
    }
}

impl Config {
    /// Whether `path` carries one of the accepted image extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Every directory a run reads from or writes to.
    pub fn directories(&self) -> [&Path; 5] {
        [
            self.reference_dir.as_path(),
            self.candidate_dir.as_path(),
            self.results_dir.as_path(),
            self.logs_dir.as_path(),
            self.unmatched_dir.as_path(),
        ]
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data).with_context(|| format!("writing config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg, Config::default());
        assert!((cfg.threshold - 0.35).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photosort.toml");
        std::fs::write(&path, "threshold = 0.5\n[detector]\nnms_threshold = 0.4\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert!((cfg.threshold - 0.5).abs() < f32::EPSILON);
        assert!((cfg.detector.nms_threshold - 0.4).abs() < f32::EPSILON);
        assert!((cfg.detector.score_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(cfg.candidate_dir, PathBuf::from("B_photos"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("photosort.toml");
        let mut cfg = Config::default();
        cfg.thumbnail_width = 120;
        save_config(&cfg, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn extension_check_ignores_case() {
        let cfg = Config::default();
        assert!(cfg.accepts(Path::new("a/IMG_0001.JPG")));
        assert!(cfg.accepts(Path::new("b.webp")));
        assert!(!cfg.accepts(Path::new("notes.txt")));
        assert!(!cfg.accepts(Path::new("README")));
    }
}
