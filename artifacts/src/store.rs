use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tryon_values::ImageAsset;

use crate::error::{ArtifactError, Result};
use crate::naming::{unique_filename, OutputName};

pub const UPLOADS_DIR: &str = "uploads";
pub const PROCESSED_DIR: &str = "processed";
pub const RESULTS_DIR: &str = "results";

/// Owns the temp and output areas.
///
/// ```text
/// <temp>/uploads/     ephemeral request inputs
/// <temp>/processed/   ephemeral intermediates
/// <output>/results/   persisted outputs
/// ```
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    temp_dir: PathBuf,
    uploads_dir: PathBuf,
    processed_dir: PathBuf,
    results_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates the directory layout if missing.
    pub fn new(temp_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let temp_dir = temp_dir.into();
        let output_dir = output_dir.into();
        let store = Self {
            uploads_dir: temp_dir.join(UPLOADS_DIR),
            processed_dir: temp_dir.join(PROCESSED_DIR),
            results_dir: output_dir.join(RESULTS_DIR),
            temp_dir,
        };
        for dir in [&store.uploads_dir, &store.processed_dir, &store.results_dir] {
            fs::create_dir_all(dir).map_err(|e| ArtifactError::io(dir, e))?;
        }
        tracing::debug!(
            temp = %store.temp_dir.display(),
            results = %store.results_dir.display(),
            "Artifact directories ready"
        );
        Ok(store)
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Writes `reader` into the uploads area under a sanitized unique name.
    pub fn materialize<R: Read>(&self, reader: &mut R, name: &str) -> Result<PathBuf> {
        let path = self.uploads_dir.join(unique_filename(name));
        let mut file = fs::File::create(&path).map_err(|e| ArtifactError::io(&path, e))?;
        let copied = std::io::copy(reader, &mut file).and_then(|n| file.flush().map(|_| n));
        match copied {
            Ok(bytes) => {
                tracing::debug!(path = %path.display(), bytes, "Materialized upload");
                Ok(path)
            }
            Err(e) => {
                drop(file);
                remove_quietly(&path);
                Err(ArtifactError::io(&path, e))
            }
        }
    }

    /// Encodes `asset` as PNG into the results area.
    ///
    /// The file is written under a hidden partial name first and renamed, so a
    /// reader never sees a half-written result.
    pub fn persist(&self, asset: &ImageAsset, name: &OutputName) -> Result<PathBuf> {
        let file_name = name.file_name();
        let path = self.results_dir.join(&file_name);
        let partial = self.results_dir.join(format!(".{}.partial", file_name));

        let mut encoded = Cursor::new(Vec::new());
        asset.pixels().write_to(&mut encoded, ImageFormat::Png)?;

        let written = fs::write(&partial, encoded.get_ref()).and_then(|_| fs::rename(&partial, &path));
        if let Err(e) = written {
            remove_quietly(&partial);
            return Err(ArtifactError::io(&path, e));
        }
        tracing::debug!(path = %path.display(), "Persisted output");
        Ok(path)
    }

    /// Removes every path in `paths`. Missing files are not errors, so calling
    /// this twice with the same paths is harmless.
    pub fn release(&self, paths: &[PathBuf]) {
        for path in paths {
            remove_quietly(path);
        }
    }

    /// Opens a scope whose tracked files are released when it drops.
    pub fn scope(&self) -> ArtifactScope<'_> {
        ArtifactScope {
            store: self,
            paths: Vec::new(),
        }
    }

    /// Empties the uploads and processed areas. Returns the number of files
    /// removed.
    pub fn clear_temp(&self) -> Result<usize> {
        let mut removed = 0;
        for dir in [&self.uploads_dir, &self.processed_dir] {
            let entries = fs::read_dir(dir).map_err(|e| ArtifactError::io(dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| ArtifactError::io(dir, e))?;
                let path = entry.path();
                let result = if path.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                match result {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(ArtifactError::io(&path, e)),
                }
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Cleared temp artifacts");
        }
        Ok(removed)
    }

    /// Path of a persisted output. Only plain file names inside the results
    /// area resolve.
    pub fn resolve_result(&self, filename: &str) -> Option<PathBuf> {
        let is_plain = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains(&['/', '\\'][..])
            && Path::new(filename).file_name().map(|n| n == filename).unwrap_or(false);
        if !is_plain {
            return None;
        }
        let path = self.results_dir.join(filename);
        path.is_file().then_some(path)
    }
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::trace!(path = %path.display(), "Released artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to release artifact"),
    }
}

/// Ephemeral files belonging to one request.
///
/// Everything materialized or tracked through the scope is removed when the
/// scope drops, whether the request finished, failed or unwound.
pub struct ArtifactScope<'a> {
    store: &'a ArtifactStore,
    paths: Vec<PathBuf>,
}

impl ArtifactScope<'_> {
    pub fn materialize<R: Read>(&mut self, reader: &mut R, name: &str) -> Result<PathBuf> {
        let path = self.store.materialize(reader, name)?;
        self.paths.push(path.clone());
        Ok(path)
    }

    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn store(&self) -> &ArtifactStore {
        self.store
    }
}

impl Drop for ArtifactScope<'_> {
    fn drop(&mut self) {
        if !self.paths.is_empty() {
            self.store.release(&self.paths);
            tracing::debug!(count = self.paths.len(), "Released request artifacts");
        }
    }
}
