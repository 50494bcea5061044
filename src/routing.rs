use std::path::{Path, PathBuf};

use crate::classifier::ClassificationResult;
use crate::config::Config;

/// Joins labels into a composite folder name.
pub const LABEL_SEPARATOR: &str = "_";

/// Where a photo ends up. Every photo reaches exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No face in the photo.
    NoFace,
    /// At least one face matched; the photo goes to the composite folder.
    Matched { folder: String },
    /// Faces were found but none cleared the threshold.
    NoMatch,
}

impl Outcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, Outcome::Matched { .. })
    }

    /// Folder the photo is copied into.
    pub fn destination(&self, cfg: &Config) -> PathBuf {
        match self {
            Outcome::Matched { folder } => cfg.results_dir.join(folder),
            Outcome::NoFace | Outcome::NoMatch => cfg.unmatched_dir.clone(),
        }
    }

    pub fn action(&self) -> String {
        match self {
            Outcome::NoFace => "no face detected".to_string(),
            Outcome::Matched { folder } => format!("copied to {}", folder),
            Outcome::NoMatch => "no match".to_string(),
        }
    }
}

/// The per-photo line of the run report.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingRecord {
    pub filename: String,
    pub found: bool,
    /// Sorted.
    pub matched_labels: Vec<String>,
    pub best_label: String,
    pub best_score: f32,
    pub outcome: Outcome,
    pub action: String,
}

impl RoutingRecord {
    pub fn destination(&self, cfg: &Config) -> PathBuf {
        self.outcome.destination(cfg)
    }
}

/// Sort labels and join them, so the same people always share one folder
/// whatever order their faces were found in.
pub fn composite_folder<'a>(labels: impl IntoIterator<Item = &'a str>) -> String {
    let mut labels: Vec<&str> = labels.into_iter().collect();
    labels.sort_unstable();
    labels.dedup();
    labels.join(LABEL_SEPARATOR)
}

pub fn decide(filename: &str, result: &ClassificationResult) -> RoutingRecord {
    let outcome = if !result.found {
        Outcome::NoFace
    } else if !result.matched_labels.is_empty() {
        Outcome::Matched {
            folder: composite_folder(result.matched_labels.iter().map(String::as_str)),
        }
    } else {
        Outcome::NoMatch
    };

    let mut matched_labels: Vec<String> = result.matched_labels.iter().cloned().collect();
    matched_labels.sort();

    RoutingRecord {
        filename: filename.to_string(),
        found: result.found,
        matched_labels,
        best_label: result.best_label.clone(),
        best_score: result.best_score,
        action: outcome.action(),
        outcome,
    }
}

/// File name component of `path` as shown in reports.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn result(found: bool, labels: &[&str], best: (&str, f32)) -> ClassificationResult {
        ClassificationResult {
            found,
            matched_labels: labels.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            best_label: best.0.to_string(),
            best_score: best.1,
        }
    }

    #[test]
    fn composite_is_order_independent() {
        assert_eq!(composite_folder(["bob", "alice"]), "alice_bob");
        assert_eq!(composite_folder(["alice", "bob"]), "alice_bob");
        assert_eq!(composite_folder(["carol"]), "carol");
    }

    #[test]
    fn same_labels_same_destination() {
        let a = decide("x.jpg", &result(true, &["bob", "alice"], ("bob", 0.8)));
        let b = decide("x.jpg", &result(true, &["alice", "bob"], ("bob", 0.8)));
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(
            a.outcome,
            Outcome::Matched {
                folder: "alice_bob".to_string()
            }
        );
        assert_eq!(a.action, "copied to alice_bob");
    }

    #[test]
    fn no_face_goes_to_unmatched() {
        let cfg = Config::default();
        let record = decide("empty.png", &ClassificationResult::no_face());
        assert_eq!(record.outcome, Outcome::NoFace);
        assert!(!record.found);
        assert_eq!(record.action, "no face detected");
        assert_eq!(record.destination(&cfg), cfg.unmatched_dir);
    }

    #[test]
    fn no_match_keeps_best_guess() {
        let cfg = Config::default();
        let record = decide("crowd.jpg", &result(true, &[], ("dave", 0.2)));
        assert_eq!(record.outcome, Outcome::NoMatch);
        assert!(record.found);
        assert_eq!(record.best_label, "dave");
        assert!((record.best_score - 0.2).abs() < f32::EPSILON);
        assert_eq!(record.action, "no match");
        assert_eq!(record.destination(&cfg), cfg.unmatched_dir);
    }

    #[test]
    fn matched_destination_is_under_results() {
        let cfg = Config::default();
        let record = decide("pair.jpg", &result(true, &["alice", "bob"], ("alice", 0.9)));
        assert_eq!(record.destination(&cfg), cfg.results_dir.join("alice_bob"));
        assert_eq!(record.matched_labels, vec!["alice", "bob"]);
    }

    #[test]
    fn display_name_is_file_name() {
        assert_eq!(display_name(Path::new("B_photos/IMG_1.jpg")), "IMG_1.jpg");
    }
}
