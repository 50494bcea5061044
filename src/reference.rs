//! Labelled reference faces and the queries run against them.
//!
//! The index is filled once before any candidate is looked at and is only
//! read afterwards. Scans follow insertion order and the first entry wins a
//! tie, so results are stable for a given ingestion order.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::config::Config;
use crate::detector::FaceDetector;
use crate::similarity;
use crate::FaceVector;

/// Case-fold and trim a raw identity name.
pub fn normalize_label(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub label: String,
    pub vector: FaceVector,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, label: &str, vector: FaceVector) {
        self.entries.push(ReferenceEntry {
            label: normalize_label(label),
            vector,
        });
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct labels, sorted.
    pub fn labels(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    /// Highest-scoring entry for `probe`, `("", 0.0)` when the index is empty.
    pub fn best_match(&self, probe: &FaceVector) -> (&str, f32) {
        let mut best: Option<(&str, f32)> = None;
        for entry in &self.entries {
            let score = similarity::score(probe, &entry.vector);
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((entry.label.as_str(), score)),
            }
        }
        best.unwrap_or(("", 0.0))
    }

    /// Labels with at least one entry scoring strictly above `threshold`.
    pub fn matches_above_threshold(&self, probe: &FaceVector, threshold: f32) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter(|e| similarity::score(probe, &e.vector) > threshold)
            .map(|e| e.label.as_str())
            .collect()
    }

    /// Embed every reference image and index its faces under the image's label.
    ///
    /// Images that fail to decode or contain no face are logged and skipped.
    pub fn ingest<D: FaceDetector>(pairs: &[(String, PathBuf)], detector: &mut D) -> Self {
        let mut index = Self::new();
        for (label, path) in pairs {
            let img = match image::open(path) {
                Ok(img) => img,
                Err(e) => {
                    warn!("Cannot read {}: {}", path.display(), e);
                    continue;
                }
            };
            let faces = match detector.detect(&img) {
                Ok(faces) => faces,
                Err(e) => {
                    warn!("Face analysis failed for {}: {:#}", path.display(), e);
                    continue;
                }
            };
            if faces.is_empty() {
                warn!("No face detected in {}", path.display());
                continue;
            }
            debug!("{}: {} face(s) for '{}'", path.display(), faces.len(), label);
            for face in faces {
                index.add_entry(label, face);
            }
        }
        info!(
            "{} reference face(s) loaded for {} person(s)",
            index.len(),
            index.labels().len()
        );
        index
    }
}

/// Whether a normalized label can name a folder under the results root.
///
/// Rejects blank names, `.`, `..` and anything holding a path separator.
pub fn is_usable_label(label: &str) -> bool {
    !label.is_empty()
        && label != "."
        && label != ".."
        && !label.contains(['/', '\\'])
}

/// Accepted images directly inside `dir`, by file name.
fn list_images(dir: &Path, cfg: &Config) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && cfg.accepts(p))
        .collect();
    images.sort();
    Ok(images)
}

/// List `(label, image)` pairs under `root`: each subdirectory is one person
/// and every accepted image directly inside it is one of their references.
///
/// Ordered by directory name, then file name. Only an unreadable `root` is an
/// error; person folders that cannot be used are logged and skipped.
pub fn discover(root: &Path, cfg: &Config) -> Result<Vec<(String, PathBuf)>> {
    let mut people: Vec<PathBuf> = std::fs::read_dir(root)
        .with_context(|| format!("listing references in {}", root.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    people.sort();

    let mut pairs = Vec::new();
    for person in people {
        let Some(name) = person.file_name().and_then(|n| n.to_str()) else {
            warn!("Skipping non UTF-8 folder {}", person.display());
            continue;
        };
        let label = normalize_label(name);
        if !is_usable_label(&label) {
            warn!("Skipping folder with unusable name {}", person.display());
            continue;
        }

        let images = match list_images(&person, cfg) {
            Ok(images) => images,
            Err(e) => {
                warn!("Skipping {}: {:#}", person.display(), e);
                continue;
            }
        };
        pairs.extend(images.into_iter().map(|p| (label.clone(), p)));
    }
    Ok(pairs)
}
