use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::{debug, info, warn};

use crate::classifier::classify;
use crate::config::Config;
use crate::detector::FaceDetector;
use crate::error::SortError;
use crate::reference::{self, ReferenceIndex};
use crate::report::Report;
use crate::routing::{decide, display_name, RoutingRecord};

/// Create every directory the configuration names.
pub fn bootstrap(cfg: &Config) -> Result<()> {
    for dir in cfg.directories() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

fn require_dir(role: &'static str, path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(SortError::MissingDirectory {
            role,
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

/// Accepted images directly under the candidate directory, by file name.
pub fn candidates(cfg: &Config) -> Result<Vec<PathBuf>> {
    let dir = &cfg.candidate_dir;
    let mut photos = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        if cfg.accepts(&path) {
            photos.push(path);
        } else {
            debug!("ignoring {}", path.display());
        }
    }
    photos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(photos)
}

/// Copy `photo` into the folder its record routes to, keeping its
/// modification time.
pub fn place(cfg: &Config, photo: &Path, record: &RoutingRecord) -> Result<PathBuf> {
    let dir = record.destination(cfg);
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let target = dir.join(&record.filename);
    std::fs::copy(photo, &target)
        .with_context(|| format!("copying {} to {}", photo.display(), target.display()))?;

    let modified = std::fs::metadata(photo)
        .and_then(|m| m.modified())
        .with_context(|| format!("reading mtime of {}", photo.display()))?;
    File::options()
        .write(true)
        .open(&target)
        .and_then(|f| f.set_modified(modified))
        .with_context(|| format!("setting mtime of {}", target.display()))?;
    Ok(target)
}

/// One sorting run: a reference index and the detector that built it.
pub struct Sorter<'a, D: FaceDetector> {
    cfg: &'a Config,
    detector: D,
    index: ReferenceIndex,
}

impl<'a, D: FaceDetector> Sorter<'a, D> {
    /// Check the input directories and index every reference face.
    ///
    /// Fails when either input directory is missing or no reference image
    /// yields a face; nothing has been copied at that point.
    pub fn new(cfg: &'a Config, mut detector: D) -> Result<Self> {
        require_dir("reference", &cfg.reference_dir)?;
        require_dir("photo", &cfg.candidate_dir)?;

        info!("Analysing references in {}", cfg.reference_dir.display());
        let pairs = reference::discover(&cfg.reference_dir, cfg)?;
        let index = ReferenceIndex::ingest(&pairs, &mut detector);
        if index.is_empty() {
            return Err(SortError::NoReferences {
                root: cfg.reference_dir.clone(),
            }
            .into());
        }

        Ok(Self {
            cfg,
            detector,
            index,
        })
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// Decode, detect, classify and route a single photo without copying it.
    pub fn route(&mut self, photo: &Path) -> Result<RoutingRecord> {
        let img = image::open(photo).with_context(|| format!("reading {}", photo.display()))?;
        let faces = self
            .detector
            .detect(&img)
            .with_context(|| format!("analysing {}", photo.display()))?;
        let result = classify(&faces, &self.index, self.cfg.threshold);
        let record = decide(&display_name(photo), &result);
        debug!(
            "{}: {} face(s), best '{}' {:.3}, {}",
            record.filename,
            faces.len(),
            record.best_label,
            record.best_score,
            record.action
        );
        Ok(record)
    }

    /// Route and copy every candidate photo, in file-name order.
    ///
    /// A photo that cannot be read is skipped. A failed copy keeps the
    /// record with the failure noted in its action.
    pub fn run(&mut self, progress: &ProgressBar) -> Result<Report> {
        let photos = candidates(self.cfg)?;
        info!("{} photo(s) to analyse in {}", photos.len(), self.cfg.candidate_dir.display());
        progress.set_length(photos.len() as u64);

        let mut report = Report::new();
        for photo in &photos {
            progress.set_message(display_name(photo));
            match self.route(photo) {
                Ok(mut record) => {
                    if let Err(e) = place(self.cfg, photo, &record) {
                        warn!("{:#}", e);
                        record.action = format!("{} (copy failed)", record.action);
                    }
                    report.push(record);
                }
                Err(e) => {
                    warn!("Skipping {}: {:#}", photo.display(), e);
                    report.skip(display_name(photo), format!("{:#}", e));
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        info!("Done: {}", report.summary());
        Ok(report)
    }
}
