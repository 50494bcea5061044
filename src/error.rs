use std::path::PathBuf;

use thiserror::Error;

/// Conditions that abort a run before any photo is routed.
#[derive(Debug, Error)]
pub enum SortError {
    #[error("no usable reference faces found under {}", root.display())]
    NoReferences { root: PathBuf },
    #[error("{role} directory {} does not exist", path.display())]
    MissingDirectory { role: &'static str, path: PathBuf },
}
