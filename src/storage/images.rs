use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::{StorageError, StorageResult};

pub const TEMP_CAPTURE_PREFIX: &str = "capture_";
const IMAGES_SUBDIR: &str = "images";

#[derive(Debug, Default, Clone)]
pub struct PruneReport {
    pub removed_files: usize,
}

/// Temporary stills and the persisted images records point at.
#[derive(Debug, Clone)]
pub struct ImageLibrary {
    temp_dir: PathBuf,
    images_dir: PathBuf,
}

impl ImageLibrary {
    pub const fn with_paths(temp_dir: PathBuf, images_dir: PathBuf) -> Self {
        Self {
            temp_dir,
            images_dir,
        }
    }

    /// Uses `<data_dir>/images` for persisted images and creates both directories.
    pub fn open(temp_dir: PathBuf, data_dir: &Path) -> StorageResult<Self> {
        let images_dir = data_dir.join(IMAGES_SUBDIR);
        fs::create_dir_all(&temp_dir)?;
        fs::create_dir_all(&images_dir)?;
        Ok(Self::with_paths(temp_dir, images_dir))
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    fn validate_capture_id(capture_id: &str) -> StorageResult<()> {
        if capture_id.is_empty() {
            return Err(StorageError::MissingCaptureId);
        }
        Ok(())
    }

    pub fn temp_path_for_capture(&self, capture_id: &str) -> StorageResult<PathBuf> {
        Self::validate_capture_id(capture_id)?;
        Ok(temp_capture_path(&self.temp_dir, capture_id))
    }

    pub fn allocate_target_path(&self, capture_id: &str) -> StorageResult<PathBuf> {
        Self::validate_capture_id(capture_id)?;
        let mut path = self.images_dir.clone();
        path.push(format!("{capture_id}.png"));
        Ok(path)
    }

    /// Copies a temporary still into the images directory and returns the new path.
    pub fn persist_still(&self, capture_id: &str, source: &Path) -> StorageResult<PathBuf> {
        let target = self.allocate_target_path(capture_id)?;
        save_overwrite(source, &target)?;
        tracing::info!(
            capture_id,
            path = %target.display(),
            "persisted still image"
        );
        Ok(target)
    }

    pub fn discard_temp_still(&self, capture_id: &str) -> StorageResult<()> {
        let path = self.temp_path_for_capture(capture_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    pub fn prune_stale_temp_files(&self, max_age_hours: u64) -> StorageResult<PruneReport> {
        let now = SystemTime::now();
        let mut report = PruneReport::default();
        let max_age = Duration::from_secs(max_age_hours.saturating_mul(60 * 60));

        if !self.temp_dir.exists() {
            return Ok(report);
        }

        for entry in fs::read_dir(&self.temp_dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            if path
                .file_name()
                .and_then(|name| name.to_str())
                .is_none_or(|name| !name.starts_with(TEMP_CAPTURE_PREFIX))
            {
                continue;
            }

            let modified = fs::metadata(&path)?.modified()?;
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);

            if age > max_age {
                match fs::remove_file(&path) {
                    Ok(()) => report.removed_files += 1,
                    Err(err) => {
                        tracing::warn!(
                            path = %path.display(),
                            ?err,
                            "failed to remove stale temp still"
                        );
                    }
                }
            }
        }

        Ok(report)
    }
}

/// `<temp_dir>/capture_<id>.png`
pub(crate) fn temp_capture_path(temp_dir: &Path, capture_id: &str) -> PathBuf {
    let mut path = temp_dir.to_path_buf();
    path.push(format!("{TEMP_CAPTURE_PREFIX}{capture_id}.png"));
    path
}

fn save_overwrite(source: &Path, destination: &Path) -> StorageResult<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    let _ = fs::remove_file(destination);
    fs::copy(source, destination)?;
    Ok(())
}
