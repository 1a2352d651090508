use std::path::{Path, PathBuf};

use tracing::warn;

/// Tells whether the node is under an operator-driven procedure
pub trait MaintenanceGate: Send + Sync {
    fn in_maintenance(&self) -> bool;
}

/// Marker file on local disk
#[derive(Debug, Clone)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// An unreadable marker location counts as absent
    pub fn exists(&self) -> bool {
        match self.path.try_exists() {
            Ok(exists) => exists,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to check marker file");
                false
            }
        }
    }
}

impl MaintenanceGate for FileMarker {
    fn in_maintenance(&self) -> bool {
        self.exists()
    }
}
