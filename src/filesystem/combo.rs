//! Layered read-only mount

use std::sync::Arc;

use indexmap::IndexSet;

use crate::filesystem::mount::{FsError, FsResult, Mount};

/// Several mounts seen as one. Later parts shadow earlier ones; directory
/// listings merge every part that has the directory.
pub struct ComboMount {
    parts: Vec<Arc<dyn Mount>>,
}

impl std::fmt::Debug for ComboMount {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ComboMount")
            .field("parts", &self.parts.len())
            .finish()
    }
}

impl ComboMount {
    pub fn new(parts: Vec<Arc<dyn Mount>>) -> Self {
        Self { parts }
    }

    /// Parts from topmost to bottommost
    fn layers(&self) -> impl Iterator<Item = &Arc<dyn Mount>> {
        self.parts.iter().rev()
    }

    fn file_owner(
        &self,
        path: &str,
    ) -> FsResult<&Arc<dyn Mount>> {
        self.layers()
            .find(|part| part.exists(path) && !part.is_directory(path))
            .ok_or_else(|| FsError::operation(path, "No such file"))
    }
}

impl Mount for ComboMount {
    fn exists(
        &self,
        path: &str,
    ) -> bool {
        self.layers().any(|part| part.exists(path))
    }

    fn is_directory(
        &self,
        path: &str,
    ) -> bool {
        self.layers().any(|part| part.is_directory(path))
    }

    fn list(
        &self,
        path: &str,
    ) -> FsResult<Vec<String>> {
        let mut found = IndexSet::new();
        let mut dirs = 0;
        for part in self.layers() {
            if part.exists(path) && part.is_directory(path) {
                found.extend(part.list(path)?);
                dirs += 1;
            }
        }
        if dirs == 0 {
            return Err(FsError::operation(path, "Not a directory"));
        }
        Ok(found.into_iter().collect())
    }

    fn read(
        &self,
        path: &str,
    ) -> FsResult<Vec<u8>> {
        self.file_owner(path)?.read(path)
    }

    fn size(
        &self,
        path: &str,
    ) -> FsResult<u64> {
        self.layers()
            .find(|part| part.exists(path))
            .ok_or_else(|| FsError::operation(path, "No such file"))?
            .size(path)
    }
}
