//! `VikingFS`: the consistency layer binding an [`AgFs`] byte store to a
//! [`VectorIndex`], enforcing per-uri write ordering and the `.relations.json`
//! link model.
//!
//! Port of the filesystem half of `openviking/storage/viking_fs.py`, now
//! generalized over an injected backend instead of always touching local
//! disk directly.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ov_core::error::{OvError, Result};
pub use ov_core::types::RelatedContext as RelationEntry;
use ov_core::uri::{SCHEME, Scope};
use ov_vectordb::VectorIndex;
use serde::{Deserialize, Serialize};

use crate::agfs::{self, AgFs};
use crate::transaction::TransactionManager;

const SCOPES: [Scope; 6] =
    [Scope::Resources, Scope::User, Scope::Agent, Scope::Session, Scope::Queue, Scope::Temp];

const ABSTRACT_FILE: &str = ".abstract.md";
const OVERVIEW_FILE: &str = ".overview.md";
const RELATIONS_FILE: &str = ".relations.json";

/// A single directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// A single entry in a recursive tree walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub rel_path: String,
    pub uri: String,
    pub is_dir: bool,
    pub size: u64,
}

fn join_uri(base: &str, segment: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{segment}")
    } else {
        format!("{base}/{segment}")
    }
}

/// Virtual filesystem over `viking://` URIs, backed by an [`AgFs`] content
/// store and (optionally) a [`VectorIndex`] kept consistent with it.
pub struct VikingFS {
    agfs: Arc<dyn AgFs>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    locks: std::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    transactions: TransactionManager,
}

impl VikingFS {
    /// Local-disk backed instance rooted at `root`, with no vector index.
    /// Convenience constructor for callers (the KV store, tests) that only
    /// need byte storage.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_backend(agfs::local(root), None)
    }

    /// In-memory backed instance, no vector index.
    pub fn new_in_memory() -> Self {
        Self::with_backend(agfs::in_memory(), None)
    }

    /// Generic constructor: inject the content store and, optionally, the
    /// vector index to keep in sync on write/rm.
    pub fn with_backend(agfs: Arc<dyn AgFs>, vector_index: Option<Arc<dyn VectorIndex>>) -> Self {
        Self {
            agfs,
            vector_index,
            locks: std::sync::Mutex::new(HashMap::new()),
            transactions: TransactionManager::new(),
        }
    }

    fn lock_for(&self, uri: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(uri.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Run `body` between `acquire`/`mark_executing` and `commit`/`rollback`
    /// + `release`, so a caller panicking or erroring mid-operation leaves a
    /// transaction record behind instead of silent partial state.
    async fn run_in_txn<Fut>(&self, locks: Vec<String>, body: Fut) -> Result<()>
    where
        Fut: std::future::Future<Output = Result<()>>,
    {
        let txn = self.transactions.begin();
        self.transactions.acquire(&txn.id, locks)?;
        self.transactions.mark_executing(&txn.id)?;
        match body.await {
            Ok(()) => {
                self.transactions.commit(&txn.id)?;
                self.transactions.release(&txn.id)?;
                Ok(())
            }
            Err(e) => {
                let mut info = HashMap::new();
                info.insert("error".to_string(), serde_json::json!(e.to_string()));
                let _ = self.transactions.rollback(&txn.id, info);
                let _ = self.transactions.release(&txn.id);
                Err(e)
            }
        }
    }

    /// Transactions left non-terminal by a crash, if any. Exposed so a
    /// caller restarting after a crash can decide whether to retry or
    /// surface a `ConsistencyDrift` for the locks they claim.
    pub fn recover_transactions(&self) -> Vec<ov_core::types::TransactionRecord> {
        self.transactions.recover()
    }

    // -- byte-level passthrough --

    pub async fn read(&self, uri: &str) -> Result<Vec<u8>> {
        self.agfs.read(uri).await
    }

    pub async fn read_string(&self, uri: &str) -> Result<String> {
        let bytes = self.read(uri).await?;
        String::from_utf8(bytes).map_err(|e| OvError::InvalidInput(e.to_string()))
    }

    pub async fn write(&self, uri: &str, data: &[u8]) -> Result<()> {
        let lock = self.lock_for(uri);
        let _guard = lock.lock().await;
        self.agfs.write(uri, data).await
    }

    pub async fn write_string(&self, uri: &str, content: &str) -> Result<()> {
        self.write(uri, content.as_bytes()).await
    }

    pub async fn mkdir(&self, uri: &str) -> Result<()> {
        self.agfs.mkdir(uri).await
    }

    pub async fn rm(&self, uri: &str, recursive: bool) -> Result<()> {
        let lock = self.lock_for(uri);
        let _guard = lock.lock().await;
        self.run_in_txn(vec![uri.to_string()], async {
            if let Some(vi) = &self.vector_index {
                // Drop vector records before the content goes away, so a
                // concurrent search never turns up a uri with nothing behind it.
                let _ = vi.delete_prefix(uri).await;
            }
            self.agfs.rm(uri, recursive).await
        })
        .await
    }

    pub async fn exists(&self, uri: &str) -> bool {
        self.agfs.exists(uri).await
    }

    pub async fn is_dir(&self, uri: &str) -> bool {
        self.agfs.is_dir(uri).await
    }

    pub async fn ls(&self, uri: &str) -> Result<Vec<DirEntry>> {
        let entries = self.agfs.list(uri).await?;
        Ok(entries
            .into_iter()
            .map(|e| DirEntry { name: e.name, is_dir: e.is_dir, size: e.size })
            .collect())
    }

    pub async fn mv(&self, old_uri: &str, new_uri: &str) -> Result<()> {
        // Lock in a fixed order so concurrent moves can't deadlock.
        let (first, second) = if old_uri <= new_uri { (old_uri, new_uri) } else { (new_uri, old_uri) };
        let l1 = self.lock_for(first);
        let _g1 = l1.lock().await;
        let l2 = self.lock_for(second);
        let _g2 = l2.lock().await;

        self.run_in_txn(vec![first.to_string(), second.to_string()], async {
            self.agfs.mv(old_uri, new_uri).await?;
            if let Some(vi) = &self.vector_index {
                let _ = vi.rename_prefix(old_uri, new_uri).await;
            }
            self.rewrite_relation_targets(old_uri, new_uri).await
        })
        .await
    }

    /// After a move, every `.relations.json` entry pointing at `old_prefix`
    /// (or a descendant of it) needs its target rewritten to the new uri, or
    /// the link would silently dangle. Walks every scope that exists since
    /// relations can cross scopes (e.g. a session context linking a
    /// resource).
    async fn rewrite_relation_targets(&self, old_prefix: &str, new_prefix: &str) -> Result<()> {
        let matches_prefix = |uri: &str| uri == old_prefix || uri.starts_with(&format!("{old_prefix}/"));
        let rewrite = |uri: &str| -> String {
            if uri == old_prefix {
                new_prefix.to_string()
            } else {
                format!("{new_prefix}{}", &uri[old_prefix.len()..])
            }
        };

        for scope in SCOPES {
            let root = format!("{SCHEME}{}", scope.as_str());
            if !self.exists(&root).await {
                continue;
            }
            let mut uris = vec![root.clone()];
            uris.extend(self.tree(&root).await?.into_iter().map(|e| e.uri));

            for uri in uris {
                let relations = self.get_relations(&uri).await?;
                if relations.is_empty() {
                    continue;
                }
                let mut changed = false;
                let rewritten: Vec<RelationEntry> = relations
                    .into_iter()
                    .map(|r| {
                        if matches_prefix(&r.uri) {
                            changed = true;
                            RelationEntry { uri: rewrite(&r.uri), ..r }
                        } else {
                            r
                        }
                    })
                    .collect();
                if changed {
                    self.write_relations(&uri, &rewritten).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn append(&self, uri: &str, content: &[u8]) -> Result<()> {
        let lock = self.lock_for(uri);
        let _guard = lock.lock().await;
        self.agfs.append(uri, content).await
    }

    // -- L0/L1 context text --

    pub async fn abstract_text(&self, uri: &str) -> Result<String> {
        self.read_string(&join_uri(uri, ABSTRACT_FILE)).await
    }

    pub async fn overview(&self, uri: &str) -> Result<String> {
        self.read_string(&join_uri(uri, OVERVIEW_FILE)).await
    }

    pub async fn write_context(
        &self,
        uri: &str,
        abstract_text: &str,
        overview: &str,
        content: Option<&str>,
        content_filename: Option<&str>,
    ) -> Result<()> {
        self.run_in_txn(vec![uri.to_string()], async {
            self.mkdir(uri).await?;
            if !abstract_text.is_empty() {
                self.write_string(&join_uri(uri, ABSTRACT_FILE), abstract_text).await?;
            }
            if !overview.is_empty() {
                self.write_string(&join_uri(uri, OVERVIEW_FILE), overview).await?;
            }
            if let (Some(content), Some(filename)) = (content, content_filename) {
                self.write_string(&join_uri(uri, filename), content).await?;
            }
            Ok(())
        })
        .await
    }

    // -- relations --

    pub async fn get_relations(&self, uri: &str) -> Result<Vec<RelationEntry>> {
        let path = join_uri(uri, RELATIONS_FILE);
        match self.read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(OvError::from),
            Err(_) => Ok(Vec::new()),
        }
    }

    async fn write_relations(&self, uri: &str, relations: &[RelationEntry]) -> Result<()> {
        let json = serde_json::to_vec_pretty(relations)?;
        self.write(&join_uri(uri, RELATIONS_FILE), &json).await
    }

    /// Link `from_uri` to each of `targets`. Re-linking an already-present
    /// target is a no-op: the earliest `created_at` for that target wins,
    /// and the stored reason is not overwritten.
    pub async fn link(&self, from_uri: &str, targets: &[String], reason: &str) -> Result<()> {
        let lock = self.lock_for(from_uri);
        let _guard = lock.lock().await;
        let mut relations = self.get_relations(from_uri).await?;
        let now = chrono::Utc::now().timestamp_millis();
        for target in targets {
            if relations.iter().any(|r| &r.uri == target) {
                continue;
            }
            relations.push(RelationEntry { uri: target.clone(), reason: reason.to_string(), created_at: now });
        }
        relations.sort_by(|a, b| (a.created_at, &a.uri).cmp(&(b.created_at, &b.uri)));
        self.write_relations(from_uri, &relations).await
    }

    pub async fn unlink(&self, from_uri: &str, target_uri: &str) -> Result<()> {
        let lock = self.lock_for(from_uri);
        let _guard = lock.lock().await;
        let mut relations = self.get_relations(from_uri).await?;
        relations.retain(|r| r.uri != target_uri);
        self.write_relations(from_uri, &relations).await
    }

    pub async fn get_related_uris(&self, uri: &str) -> Result<Vec<String>> {
        Ok(self.get_relations(uri).await?.into_iter().map(|r| r.uri).collect())
    }

    // -- tree walk --

    pub async fn tree(&self, uri: &str) -> Result<Vec<TreeEntry>> {
        let mut out = Vec::new();
        self.walk(uri, "", &mut out).await?;
        Ok(out)
    }

    fn walk<'a>(
        &'a self,
        current_uri: &'a str,
        rel_prefix: &'a str,
        out: &'a mut Vec<TreeEntry>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let entries = self.ls(current_uri).await?;
            for entry in entries {
                let child_uri = join_uri(current_uri, &entry.name);
                let rel_path = if rel_prefix.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{rel_prefix}/{}", entry.name)
                };
                out.push(TreeEntry {
                    name: entry.name.clone(),
                    rel_path: rel_path.clone(),
                    uri: child_uri.clone(),
                    is_dir: entry.is_dir,
                    size: entry.size,
                });
                if entry.is_dir {
                    self.walk(&child_uri, &rel_path, out).await?;
                }
            }
            Ok(())
        })
    }
}
