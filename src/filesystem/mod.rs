//! Virtual filesystem
//!
//! A [`FileSystem`] is a table of mounts keyed by location. Paths are
//! resolved against the deepest mount whose location contains them.
//!
//! ```text
//! ""          ──► computer root (writable)
//! "rom"       ──► ComboMount [ base, overlay ]
//! "disk"      ──► MemoryMount (from a disk drive)
//! ```

pub mod combo;
pub mod mount;

pub use combo::ComboMount;
pub use mount::{FsError, FsResult, MemoryMount, Mount, WritableMount};

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

/// Normalise a path: strip separators at both ends, drop `.` components
/// and resolve `..` without ever leaving the root.
pub fn sanitize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

#[derive(Clone)]
enum MountKind {
    ReadOnly(Arc<dyn Mount>),
    Writable(Arc<dyn WritableMount>),
}

impl MountKind {
    fn exists(
        &self,
        path: &str,
    ) -> bool {
        match self {
            MountKind::ReadOnly(m) => m.exists(path),
            MountKind::Writable(m) => m.exists(path),
        }
    }

    fn is_directory(
        &self,
        path: &str,
    ) -> bool {
        match self {
            MountKind::ReadOnly(m) => m.is_directory(path),
            MountKind::Writable(m) => m.is_directory(path),
        }
    }

    fn list(
        &self,
        path: &str,
    ) -> FsResult<Vec<String>> {
        match self {
            MountKind::ReadOnly(m) => m.list(path),
            MountKind::Writable(m) => m.list(path),
        }
    }

    fn read(
        &self,
        path: &str,
    ) -> FsResult<Vec<u8>> {
        match self {
            MountKind::ReadOnly(m) => m.read(path),
            MountKind::Writable(m) => m.read(path),
        }
    }
}

#[derive(Clone)]
struct MountWrapper {
    label: String,
    location: String,
    mount: MountKind,
}

impl MountWrapper {
    fn local_path<'a>(
        &self,
        path: &'a str,
    ) -> &'a str {
        path[self.location.len()..].trim_start_matches('/')
    }
}

/// Mount table of one computer
#[derive(Default)]
pub struct FileSystem {
    mounts: RwLock<IndexMap<String, MountWrapper>>,
}

impl fmt::Debug for FileSystem {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("mounts", &self.mounts.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a read-only tree at `location`
    pub fn mount(
        &self,
        label: &str,
        location: &str,
        mount: Arc<dyn Mount>,
    ) -> FsResult<()> {
        self.insert(label, location, MountKind::ReadOnly(mount))
    }

    /// Mount a writable tree at `location`
    pub fn mount_writable(
        &self,
        label: &str,
        location: &str,
        mount: Arc<dyn WritableMount>,
    ) -> FsResult<()> {
        self.insert(label, location, MountKind::Writable(mount))
    }

    fn insert(
        &self,
        label: &str,
        location: &str,
        mount: MountKind,
    ) -> FsResult<()> {
        let location = sanitize_path(location);
        let mut mounts = self.mounts.write();
        if mounts.contains_key(&location) {
            return Err(FsError::AlreadyMounted(location));
        }
        mounts.insert(
            location.clone(),
            MountWrapper {
                label: label.to_string(),
                location,
                mount,
            },
        );
        Ok(())
    }

    /// Remove the mount at `location`. Returns whether one was there.
    pub fn unmount(
        &self,
        location: &str,
    ) -> bool {
        self.mounts
            .write()
            .shift_remove(&sanitize_path(location))
            .is_some()
    }

    /// Whether a mount sits exactly at `location`
    pub fn contains(
        &self,
        location: &str,
    ) -> bool {
        self.mounts.read().contains_key(&sanitize_path(location))
    }

    /// Mounted locations, in mount order
    pub fn locations(&self) -> Vec<String> {
        self.mounts.read().keys().cloned().collect()
    }

    /// Label of the mount a path resolves to
    pub fn mount_label(
        &self,
        path: &str,
    ) -> Option<String> {
        self.resolve(&sanitize_path(path)).map(|m| m.label)
    }

    fn resolve(
        &self,
        path: &str,
    ) -> Option<MountWrapper> {
        self.mounts
            .read()
            .values()
            .filter(|m| {
                m.location.is_empty()
                    || path == m.location
                    || path.starts_with(&format!("{}/", m.location))
            })
            .max_by_key(|m| m.location.len())
            .cloned()
    }

    pub fn exists(
        &self,
        path: &str,
    ) -> bool {
        let path = sanitize_path(path);
        match self.resolve(&path) {
            Some(m) => m.mount.exists(m.local_path(&path)),
            None => false,
        }
    }

    pub fn is_directory(
        &self,
        path: &str,
    ) -> bool {
        let path = sanitize_path(path);
        match self.resolve(&path) {
            Some(m) => m.mount.is_directory(m.local_path(&path)),
            None => false,
        }
    }

    /// Directory entries, including mount points directly below `path`
    pub fn list(
        &self,
        path: &str,
    ) -> FsResult<Vec<String>> {
        let path = sanitize_path(path);
        let m = self
            .resolve(&path)
            .ok_or_else(|| FsError::InvalidPath(path.clone()))?;
        let mut entries = m.mount.list(m.local_path(&path))?;
        for location in self.mounts.read().keys() {
            let parent = location.rfind('/').map(|i| &location[..i]).unwrap_or("");
            if !location.is_empty() && parent == path {
                let name = location.rsplit('/').next().unwrap_or(location).to_string();
                if !entries.contains(&name) {
                    entries.push(name);
                }
            }
        }
        Ok(entries)
    }

    pub fn read(
        &self,
        path: &str,
    ) -> FsResult<Vec<u8>> {
        let path = sanitize_path(path);
        let m = self
            .resolve(&path)
            .ok_or_else(|| FsError::InvalidPath(path.clone()))?;
        m.mount.read(m.local_path(&path))
    }

    pub fn write(
        &self,
        path: &str,
        contents: &[u8],
    ) -> FsResult<()> {
        let path = sanitize_path(path);
        let m = self
            .resolve(&path)
            .ok_or_else(|| FsError::InvalidPath(path.clone()))?;
        match &m.mount {
            MountKind::Writable(w) => w.write(m.local_path(&path), contents),
            MountKind::ReadOnly(_) => Err(FsError::AccessDenied(path)),
        }
    }
}
