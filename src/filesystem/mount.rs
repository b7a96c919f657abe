//! Mount traits and the in-memory mount

use std::collections::BTreeMap;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::warn;

/// Filesystem errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// An operation failed on a specific path
    #[error("/{path}: {message}")]
    Operation { path: String, message: String },
    /// Nothing is mounted over the path
    #[error("/{0}: Invalid Path")]
    InvalidPath(String),
    /// The location already has a mount
    #[error("/{0}: Already mounted")]
    AlreadyMounted(String),
    #[error("/{0}: Access denied")]
    AccessDenied(String),
}

impl FsError {
    pub fn operation(
        path: &str,
        message: impl Into<String>,
    ) -> Self {
        FsError::Operation {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// A read-only tree of files. Paths are relative, `/`-separated and
/// already normalised; the empty path is the root.
pub trait Mount: Send + Sync {
    fn exists(
        &self,
        path: &str,
    ) -> bool;

    fn is_directory(
        &self,
        path: &str,
    ) -> bool;

    /// Names of the entries directly inside `path`
    fn list(
        &self,
        path: &str,
    ) -> FsResult<Vec<String>>;

    fn read(
        &self,
        path: &str,
    ) -> FsResult<Vec<u8>>;

    fn size(
        &self,
        path: &str,
    ) -> FsResult<u64>;
}

/// A mount that can be modified
pub trait WritableMount: Mount {
    fn make_directory(
        &self,
        path: &str,
    ) -> FsResult<()>;

    /// Create or replace a file, creating missing parent directories
    fn write(
        &self,
        path: &str,
        contents: &[u8],
    ) -> FsResult<()>;

    fn delete(
        &self,
        path: &str,
    ) -> FsResult<()>;
}

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Directory,
}

/// Files held in memory
#[derive(Debug)]
pub struct MemoryMount {
    nodes: RwLock<BTreeMap<String, Node>>,
}

impl Default for MemoryMount {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMount {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(String::new(), Node::Directory);
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Builder-style file insertion
    pub fn with_file(
        self,
        path: &str,
        contents: impl AsRef<[u8]>,
    ) -> Self {
        if let Err(err) = self.write(path, contents.as_ref()) {
            warn!("Cannot add {} to memory mount: {}", path, err);
        }
        self
    }

    fn parent(path: &str) -> &str {
        path.rfind('/').map(|i| &path[..i]).unwrap_or("")
    }

    fn ensure_parents(
        nodes: &mut BTreeMap<String, Node>,
        path: &str,
    ) -> FsResult<()> {
        let mut current = String::new();
        for part in Self::parent(path).split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            match nodes.get(&current) {
                Some(Node::File(_)) => return Err(FsError::operation(&current, "File exists")),
                Some(Node::Directory) => {}
                None => {
                    nodes.insert(current.clone(), Node::Directory);
                }
            }
        }
        Ok(())
    }
}

impl Mount for MemoryMount {
    fn exists(
        &self,
        path: &str,
    ) -> bool {
        self.nodes.read().contains_key(path)
    }

    fn is_directory(
        &self,
        path: &str,
    ) -> bool {
        matches!(self.nodes.read().get(path), Some(Node::Directory))
    }

    fn list(
        &self,
        path: &str,
    ) -> FsResult<Vec<String>> {
        let nodes = self.nodes.read();
        if !matches!(nodes.get(path), Some(Node::Directory)) {
            return Err(FsError::operation(path, "Not a directory"));
        }
        Ok(nodes
            .keys()
            .filter(|key| !key.is_empty() && *key != path && Self::parent(key) == path)
            .map(|key| key.rsplit('/').next().unwrap_or(key).to_string())
            .collect())
    }

    fn read(
        &self,
        path: &str,
    ) -> FsResult<Vec<u8>> {
        match self.nodes.read().get(path) {
            Some(Node::File(contents)) => Ok(contents.clone()),
            _ => Err(FsError::operation(path, "No such file")),
        }
    }

    fn size(
        &self,
        path: &str,
    ) -> FsResult<u64> {
        match self.nodes.read().get(path) {
            Some(Node::File(contents)) => Ok(contents.len() as u64),
            Some(Node::Directory) => Ok(0),
            None => Err(FsError::operation(path, "No such file")),
        }
    }
}

impl WritableMount for MemoryMount {
    fn make_directory(
        &self,
        path: &str,
    ) -> FsResult<()> {
        let mut nodes = self.nodes.write();
        match nodes.get(path) {
            Some(Node::Directory) => Ok(()),
            Some(Node::File(_)) => Err(FsError::operation(path, "File exists")),
            None => {
                Self::ensure_parents(&mut nodes, path)?;
                nodes.insert(path.to_string(), Node::Directory);
                Ok(())
            }
        }
    }

    fn write(
        &self,
        path: &str,
        contents: &[u8],
    ) -> FsResult<()> {
        let mut nodes = self.nodes.write();
        if matches!(nodes.get(path), Some(Node::Directory)) {
            return Err(FsError::operation(path, "Cannot write to directory"));
        }
        Self::ensure_parents(&mut nodes, path)?;
        nodes.insert(path.to_string(), Node::File(contents.to_vec()));
        Ok(())
    }

    fn delete(
        &self,
        path: &str,
    ) -> FsResult<()> {
        if path.is_empty() {
            return Err(FsError::AccessDenied(String::new()));
        }
        let mut nodes = self.nodes.write();
        let prefix = format!("{}/", path);
        nodes.retain(|key, _| key != path && !key.starts_with(&prefix));
        Ok(())
    }
}
