//! AGFS: the append-oriented, byte-level content store behind a `viking://` URI.
//!
//! `AgFs` knows nothing about contexts, vectors, or relations. It reads and
//! writes bytes at paths and lists directories. `VikingFS` is the layer above
//! that binds an `AgFs` backend to a vector index and enforces consistency.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ov_core::error::{OvError, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// A single entry returned by [`AgFs::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgfsEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Byte-level content store, rooted at a backend-specific storage root and
/// addressed with `viking://` URIs (scope included, so different scopes
/// never collide on disk).
#[async_trait]
pub trait AgFs: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;
    async fn mkdir(&self, path: &str) -> Result<()>;
    async fn rm(&self, path: &str, recursive: bool) -> Result<()>;
    async fn mv(&self, from: &str, to: &str) -> Result<()>;
    async fn list(&self, path: &str) -> Result<Vec<AgfsEntry>>;
    async fn exists(&self, path: &str) -> bool;
    async fn is_dir(&self, path: &str) -> bool;
    async fn append(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// Normalize a `viking://` URI into a backend-relative path.
///
/// AGFS sits below the `§3.1` scope grammar: it addresses by an opaque
/// relative path after the `viking://` prefix and rejects traversal
/// segments, but doesn't itself require the first segment to be one of the
/// six known scopes — callers that need their own flat namespace (a KV
/// store, a temp staging area) are free to use any leading segment.
fn rel_path_of(uri: &str) -> Result<String> {
    let rest = uri
        .strip_prefix("viking://")
        .ok_or_else(|| OvError::InvalidUri(uri.to_string()))?;
    let mut segments = Vec::new();
    for seg in rest.split('/') {
        if seg.is_empty() {
            continue;
        }
        if seg == "." || seg == ".." {
            return Err(OvError::InvalidUri(format!("path traversal segment in {uri}")));
        }
        segments.push(seg);
    }
    Ok(segments.join("/"))
}

/// Local-disk backed [`AgFs`]. Writes go through a temp-file-then-rename
/// dance so a reader never observes a half-written file.
pub struct LocalAgFs {
    root: PathBuf,
}

impl LocalAgFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn abs(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }
}

#[async_trait]
impl AgFs for LocalAgFs {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let abs = self.abs(&rel_path_of(path)?);
        fs::read(&abs)
            .await
            .map_err(|e| OvError::not_found(format!("{path}: {e}")))
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let abs = self.abs(&rel_path_of(path)?);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OvError::TransientBackend(e.to_string()))?;
        }
        let tmp = tmp_sibling(&abs);
        let mut f = fs::File::create(&tmp)
            .await
            .map_err(|e| OvError::TransientBackend(e.to_string()))?;
        f.write_all(data)
            .await
            .map_err(|e| OvError::TransientBackend(e.to_string()))?;
        f.flush()
            .await
            .map_err(|e| OvError::TransientBackend(e.to_string()))?;
        drop(f);
        fs::rename(&tmp, &abs)
            .await
            .map_err(|e| OvError::TransientBackend(e.to_string()))?;
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let abs = self.abs(&rel_path_of(path)?);
        fs::create_dir_all(abs)
            .await
            .map_err(|e| OvError::TransientBackend(e.to_string()))
    }

    async fn rm(&self, path: &str, recursive: bool) -> Result<()> {
        let abs = self.abs(&rel_path_of(path)?);
        if !abs.exists() {
            return Err(OvError::not_found(path));
        }
        if abs.is_dir() {
            if recursive {
                fs::remove_dir_all(&abs)
                    .await
                    .map_err(|e| OvError::TransientBackend(e.to_string()))?;
            } else {
                fs::remove_dir(&abs)
                    .await
                    .map_err(|e| OvError::InvalidInput(format!("{path} is not empty: {e}")))?;
            }
        } else {
            fs::remove_file(&abs)
                .await
                .map_err(|e| OvError::TransientBackend(e.to_string()))?;
        }
        Ok(())
    }

    async fn mv(&self, from: &str, to: &str) -> Result<()> {
        let from_abs = self.abs(&rel_path_of(from)?);
        let to_abs = self.abs(&rel_path_of(to)?);
        if let Some(parent) = to_abs.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OvError::TransientBackend(e.to_string()))?;
        }
        fs::rename(&from_abs, &to_abs)
            .await
            .map_err(|e| OvError::TransientBackend(e.to_string()))
    }

    async fn list(&self, path: &str) -> Result<Vec<AgfsEntry>> {
        let abs = self.abs(&rel_path_of(path)?);
        let mut rd = fs::read_dir(&abs)
            .await
            .map_err(|e| OvError::not_found(format!("{path}: {e}")))?;
        let mut out = Vec::new();
        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| OvError::TransientBackend(e.to_string()))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| OvError::TransientBackend(e.to_string()))?;
            out.push(AgfsEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: meta.len(),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn exists(&self, path: &str) -> bool {
        match rel_path_of(path) {
            Ok(rel) => self.abs(&rel).exists(),
            Err(_) => false,
        }
    }

    async fn is_dir(&self, path: &str) -> bool {
        match rel_path_of(path) {
            Ok(rel) => self.abs(&rel).is_dir(),
            Err(_) => false,
        }
    }

    async fn append(&self, path: &str, data: &[u8]) -> Result<()> {
        use tokio::fs::OpenOptions;
        let abs = self.abs(&rel_path_of(path)?);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OvError::TransientBackend(e.to_string()))?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&abs)
            .await
            .map_err(|e| OvError::TransientBackend(e.to_string()))?;
        f.write_all(data)
            .await
            .map_err(|e| OvError::TransientBackend(e.to_string()))
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".tmp");
    path.with_file_name(name)
}

/// In-memory [`AgFs`], used for tests and the `temp` scope.
#[derive(Default)]
pub struct InMemoryAgFs {
    files: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl InMemoryAgFs {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgFs for InMemoryAgFs {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let rel = rel_path_of(path)?;
        self.files
            .lock()
            .unwrap()
            .get(&rel)
            .cloned()
            .ok_or_else(|| OvError::not_found(path))
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let rel = rel_path_of(path)?;
        self.files.lock().unwrap().insert(rel, data.to_vec());
        Ok(())
    }

    async fn mkdir(&self, _path: &str) -> Result<()> {
        Ok(())
    }

    async fn rm(&self, path: &str, recursive: bool) -> Result<()> {
        let rel = rel_path_of(path)?;
        let mut files = self.files.lock().unwrap();
        if recursive {
            let prefix = format!("{rel}/");
            let before = files.len();
            files.retain(|k, _| !(k == &rel || k.starts_with(&prefix)));
            if files.len() == before {
                return Err(OvError::not_found(path));
            }
        } else if files.remove(&rel).is_none() {
            return Err(OvError::not_found(path));
        }
        Ok(())
    }

    async fn mv(&self, from: &str, to: &str) -> Result<()> {
        let from_rel = rel_path_of(from)?;
        let to_rel = rel_path_of(to)?;
        let mut files = self.files.lock().unwrap();
        let data = files.remove(&from_rel).ok_or_else(|| OvError::not_found(from))?;
        files.insert(to_rel, data);
        Ok(())
    }

    async fn list(&self, path: &str) -> Result<Vec<AgfsEntry>> {
        let rel = rel_path_of(path)?;
        let prefix = format!("{rel}/");
        let files = self.files.lock().unwrap();
        let mut seen = std::collections::BTreeSet::new();
        for key in files.keys() {
            let Some(suffix) = key.strip_prefix(&prefix) else {
                continue;
            };
            if suffix.is_empty() {
                continue;
            }
            let name = suffix.split('/').next().unwrap().to_string();
            seen.insert(name);
        }
        Ok(seen
            .into_iter()
            .map(|name| {
                let full = format!("{prefix}{name}");
                let is_dir = files.keys().any(|k| k.starts_with(&format!("{full}/")));
                let size = files.get(&full).map(|v| v.len() as u64).unwrap_or(0);
                AgfsEntry { name, is_dir, size }
            })
            .collect())
    }

    async fn exists(&self, path: &str) -> bool {
        let Ok(rel) = rel_path_of(path) else {
            return false;
        };
        let files = self.files.lock().unwrap();
        files.contains_key(&rel) || files.keys().any(|k| k.starts_with(&format!("{rel}/")))
    }

    async fn is_dir(&self, path: &str) -> bool {
        let Ok(rel) = rel_path_of(path) else {
            return false;
        };
        let files = self.files.lock().unwrap();
        files.keys().any(|k| k.starts_with(&format!("{rel}/")))
    }

    async fn append(&self, path: &str, data: &[u8]) -> Result<()> {
        let rel = rel_path_of(path)?;
        let mut files = self.files.lock().unwrap();
        files.entry(rel).or_default().extend_from_slice(data);
        Ok(())
    }
}

pub fn local(root: impl Into<PathBuf>) -> Arc<dyn AgFs> {
    Arc::new(LocalAgFs::new(root))
}

pub fn in_memory() -> Arc<dyn AgFs> {
    Arc::new(InMemoryAgFs::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_write_read_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fs = LocalAgFs::new(tmp.path());
        fs.write("viking://resources/a.txt", b"hello").await.unwrap();
        assert_eq!(fs.read("viking://resources/a.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn local_rm_nonexistent_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fs = LocalAgFs::new(tmp.path());
        let err = fs.rm("viking://resources/missing", false).await.unwrap_err();
        assert!(matches!(err, OvError::NotFound { .. }));
    }

    #[tokio::test]
    async fn local_mv_relocates_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fs = LocalAgFs::new(tmp.path());
        fs.write("viking://resources/a.txt", b"x").await.unwrap();
        fs.mv("viking://resources/a.txt", "viking://resources/b/a.txt")
            .await
            .unwrap();
        assert!(!fs.exists("viking://resources/a.txt").await);
        assert_eq!(fs.read("viking://resources/b/a.txt").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn local_list_sorted() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fs = LocalAgFs::new(tmp.path());
        fs.write("viking://resources/b.txt", b"1").await.unwrap();
        fs.write("viking://resources/a.txt", b"2").await.unwrap();
        let entries = fs.list("viking://resources").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn local_append_creates_then_extends() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fs = LocalAgFs::new(tmp.path());
        fs.append("viking://resources/log", b"a").await.unwrap();
        fs.append("viking://resources/log", b"b").await.unwrap();
        assert_eq!(fs.read("viking://resources/log").await.unwrap(), b"ab");
    }

    #[tokio::test]
    async fn local_rejects_traversal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fs = LocalAgFs::new(tmp.path());
        let err = fs
            .read("viking://resources/../../etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, OvError::InvalidUri(_)));
    }

    #[tokio::test]
    async fn in_memory_crud() {
        let fs = InMemoryAgFs::new();
        fs.write("viking://temp/a", b"1").await.unwrap();
        assert_eq!(fs.read("viking://temp/a").await.unwrap(), b"1");
        fs.rm("viking://temp/a", false).await.unwrap();
        assert!(fs.read("viking://temp/a").await.is_err());
    }

    #[tokio::test]
    async fn in_memory_list_directories() {
        let fs = InMemoryAgFs::new();
        fs.write("viking://temp/dir/a", b"1").await.unwrap();
        fs.write("viking://temp/b", b"2").await.unwrap();
        let entries = fs.list("viking://temp").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "dir"]);
        assert!(entries.iter().find(|e| e.name == "dir").unwrap().is_dir);
        assert!(!entries.iter().find(|e| e.name == "b").unwrap().is_dir);
    }

    #[tokio::test]
    async fn in_memory_recursive_rm() {
        let fs = InMemoryAgFs::new();
        fs.write("viking://temp/dir/a", b"1").await.unwrap();
        fs.write("viking://temp/dir/b", b"2").await.unwrap();
        fs.rm("viking://temp/dir", true).await.unwrap();
        assert!(!fs.exists("viking://temp/dir/a").await);
        assert!(!fs.exists("viking://temp/dir/b").await);
    }
}
