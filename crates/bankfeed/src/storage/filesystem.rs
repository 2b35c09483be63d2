//! Statement file store.
//!
//! Uploaded statement bytes live under a single upload directory, keyed by
//! the uuid-based `file_ref` recorded on the document row.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

pub struct FileStorage {
    upload_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(upload_directory: P) -> Self {
        Self {
            upload_directory: upload_directory.as_ref().to_path_buf(),
        }
    }

    pub fn upload_directory(&self) -> &Path {
        &self.upload_directory
    }

    /// Stores statement bytes under the given relative file name.
    /// Creation uses O_EXCL so a colliding ref fails instead of clobbering.
    pub fn store(&self, file_ref: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        self.ensure_directory(&self.upload_directory)?;
        let path = self.upload_directory.join(file_ref);

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::FileExists(path.clone())
                } else {
                    StorageError::WriteFile {
                        path: path.clone(),
                        source: e,
                    }
                }
            })?;
        file.write_all(content).map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }

    /// Reads back stored statement bytes.
    pub fn read(&self, file_ref: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.upload_directory.join(file_ref);
        std::fs::read(&path).map_err(|e| StorageError::ReadFile { path, source: e })
    }

    /// Removes a stored statement. Missing files are fine (the row may
    /// outlive the bytes after a crash mid-delete).
    pub fn remove(&self, file_ref: &str) -> Result<(), StorageError> {
        let path = self.upload_directory.join(file_ref);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::RemoveFile { path, source: e }),
        }
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}
