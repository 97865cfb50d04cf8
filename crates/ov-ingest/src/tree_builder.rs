//! TreeBuilder orchestration: stages a parsed document under `viking://temp`,
//! then promotes it into its scope and enqueues a bottom-up `SemanticMsg`
//! per directory in the moved subtree.
//!
//! The actual splitting decisions (what becomes a file, what becomes a
//! directory, coalescing, disambiguation) live in `ov_parser::tree_builder`;
//! this module only knows how to move the resulting shape into AGFS and
//! schedule semantic processing over it.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use ov_core::context::Context;
use ov_core::error::{OvError, Result};
use ov_core::types::SemanticMsg;
use ov_core::uri::VikingUri;
use ov_parser::tree_builder::{build_tree, TreeBuilderConfig, TreeNode};
use ov_storage::VikingFS;

use crate::queue::SemanticQueue;

pub struct TreeBuilder {
    vfs: Arc<VikingFS>,
}

impl TreeBuilder {
    pub fn new(vfs: Arc<VikingFS>) -> Self {
        Self { vfs }
    }

    /// Split `content` per the Markdown Tree Builder and materialize it
    /// under a fresh `viking://temp/<uuid>` staging root. Returns that
    /// staging uri.
    pub async fn stage(&self, title: &str, content: &str, cfg: &TreeBuilderConfig) -> Result<String> {
        let node = build_tree(title, content, cfg);
        let staging_root = format!("viking://temp/{}", uuid::Uuid::new_v4());
        self.vfs.mkdir(&staging_root).await?;
        self.write_node(&staging_root, &node).await?;
        Ok(staging_root)
    }

    fn write_node<'a>(
        &'a self,
        base_uri: &'a str,
        node: &'a TreeNode,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match node {
                TreeNode::File { name, content } => {
                    self.vfs.write_string(&format!("{base_uri}/{name}"), content).await
                }
                TreeNode::Dir { name, children } => {
                    let dir_uri = format!("{base_uri}/{name}");
                    self.vfs.mkdir(&dir_uri).await?;
                    for child in children {
                        self.write_node(&dir_uri, child).await?;
                    }
                    Ok(())
                }
            }
        })
    }

    /// Steps 1-5 of the TreeBuilder algorithm: verify the staged shape,
    /// pick a uniquified target uri under `scope_base`, copy it in,
    /// delete the staging area, and enqueue a `SemanticMsg` for every
    /// directory in the moved subtree.
    ///
    /// The target uri is picked fresh on every call — two calls for
    /// unrelated documents that happen to share a title land at distinct
    /// uris. A caller resuming a specific crashed run (one that already
    /// computed and partially populated a target) should call
    /// [`Self::promote_to`] with that same target instead of recomputing
    /// one here, or this step-2 uniquification will pick a new sibling
    /// name rather than complete the original copy.
    pub async fn promote(
        &self,
        temp_uri: &str,
        scope_base: &str,
        queue: &dyn SemanticQueue,
        seq: &AtomicU64,
    ) -> Result<Vec<SemanticMsg>> {
        let doc_root_name = self.single_top_level_child(temp_uri).await?;
        let target_uri = self.uniquify(scope_base, &doc_root_name).await?;
        self.promote_to(temp_uri, &doc_root_name, &target_uri, scope_base, queue, seq).await
    }

    /// Steps 3-5 against an already-chosen `target_uri`, skipping
    /// existing destinations under it — safe to re-run against the same
    /// `temp_uri`/`target_uri` pair after a crash mid-copy.
    pub async fn promote_to(
        &self,
        temp_uri: &str,
        doc_root_name: &str,
        target_uri: &str,
        scope_base: &str,
        queue: &dyn SemanticQueue,
        seq: &AtomicU64,
    ) -> Result<Vec<SemanticMsg>> {
        let source_uri = format!("{temp_uri}/{doc_root_name}");
        self.copy_recursive(&source_uri, target_uri).await?;
        self.vfs.rm(temp_uri, true).await?;
        self.enqueue_subtree(target_uri, scope_base, queue, seq).await
    }

    /// Verify `temp_uri` has exactly one top-level child and return its
    /// name. The document root is usually a directory, but a short,
    /// headingless document (see `ov_parser::tree_builder::build_tree`)
    /// comes back as a single leaf file instead — that still satisfies
    /// "exactly one top-level child", just not a directory-shaped one.
    async fn single_top_level_child(&self, temp_uri: &str) -> Result<String> {
        let top = self.vfs.ls(temp_uri).await?;
        if top.len() != 1 {
            return Err(OvError::InvalidInput(format!(
                "temp root {temp_uri} must contain exactly one top-level child, found {}",
                top.len()
            )));
        }
        Ok(top[0].name.clone())
    }

    /// Numeric-suffix a colliding target name, inserting the suffix before
    /// a trailing `.md` extension rather than after it.
    async fn uniquify(&self, scope_base: &str, name: &str) -> Result<String> {
        let (stem, ext) = match name.strip_suffix(".md") {
            Some(stem) => (stem.to_string(), Some("md")),
            None => (name.to_string(), None),
        };
        let mut candidate = format!("{scope_base}/{name}");
        let mut suffix = 2;
        while self.vfs.exists(&candidate).await {
            candidate = match ext {
                Some(ext) => format!("{scope_base}/{stem}_{suffix}.{ext}"),
                None => format!("{scope_base}/{stem}_{suffix}"),
            };
            suffix += 1;
        }
        Ok(candidate)
    }

    fn copy_recursive<'a>(
        &'a self,
        src: &'a str,
        dst: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if !self.vfs.exists(dst).await {
                if self.vfs.is_dir(src).await {
                    self.vfs.mkdir(dst).await?;
                } else {
                    let data = self.vfs.read(src).await?;
                    self.vfs.write(dst, &data).await?;
                    return Ok(());
                }
            }
            if self.vfs.is_dir(src).await {
                for entry in self.vfs.ls(src).await? {
                    let child_src = format!("{src}/{}", entry.name);
                    let child_dst = format!("{dst}/{}", entry.name);
                    self.copy_recursive(&child_src, &child_dst).await?;
                }
            }
            Ok(())
        })
    }

    async fn enqueue_subtree(
        &self,
        target_uri: &str,
        scope_base: &str,
        queue: &dyn SemanticQueue,
        seq: &AtomicU64,
    ) -> Result<Vec<SemanticMsg>> {
        let scope_root_len = VikingUri::parse(scope_base)?.segments.len();
        let mut dir_uris = Vec::new();
        if self.vfs.is_dir(target_uri).await {
            dir_uris.push(target_uri.to_string());
        }
        for entry in self.vfs.tree(target_uri).await? {
            if entry.is_dir {
                dir_uris.push(entry.uri);
            }
        }

        let mut msgs = Vec::with_capacity(dir_uris.len());
        for uri in dir_uris {
            let parsed = VikingUri::parse(&uri)?;
            let depth = (parsed.segments.len() - scope_root_len) as i64;
            let context_type = Context::derive_context_type(&uri).as_str().to_string();
            let seq_no = seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let msg = SemanticMsg::new(uri, context_type, depth, seq_no);
            queue.enqueue(msg.clone()).await?;
            msgs.push(msg);
        }
        Ok(msgs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use ov_storage::VikingFS as Vfs;

    fn cfg() -> TreeBuilderConfig {
        TreeBuilderConfig::default()
    }

    /// A document whose single `## Parent` section is itself oversized
    /// with real subsections, forcing a nested directory
    /// (`Big_Doc/Parent/…`) instead of a flat one-level split.
    fn nested_markdown() -> String {
        let child1 = format!("### Child One\n\n{}", "word ".repeat(3000));
        let child2 = format!("### Child Two\n\n{}", "word ".repeat(3000));
        format!("## Parent\n\n{child1}{child2}")
    }

    #[tokio::test]
    async fn stage_then_promote_lands_under_scope_base() {
        let vfs = Arc::new(Vfs::new_in_memory());
        let tb = TreeBuilder::new(vfs.clone());
        let content = "Flat doc with no headings, short enough to stay one file.";
        let temp = tb.stage("Flat Doc", content, &cfg()).await.unwrap();
        let queue = MemoryQueue::new();
        let seq = AtomicU64::new(0);
        let msgs = tb.promote(&temp, "viking://resources", &queue, &seq).await.unwrap();

        assert!(!vfs.exists(&temp).await, "staging area should be gone");
        assert!(vfs.exists("viking://resources/Flat_Doc.md").await);
        // a lone leaf file introduces no new directory, so nothing to process
        assert!(msgs.is_empty());
    }

    #[tokio::test]
    async fn promote_enqueues_every_directory_bottom_up_claimable() {
        let vfs = Arc::new(Vfs::new_in_memory());
        let tb = TreeBuilder::new(vfs.clone());
        let temp = tb.stage("Big Doc", &nested_markdown(), &cfg()).await.unwrap();
        let queue = MemoryQueue::new();
        let seq = AtomicU64::new(0);
        let msgs = tb.promote(&temp, "viking://resources", &queue, &seq).await.unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(vfs.is_dir("viking://resources/Big_Doc/Parent").await);

        // the nested Parent directory must be claimable before its
        // Big_Doc ancestor
        let first = queue.claim().await.unwrap().unwrap();
        assert_eq!(first.uri, "viking://resources/Big_Doc/Parent");
        assert!(queue.claim().await.unwrap().is_none(), "ancestor blocked until child completes");
        queue.ack(&first.id).await.unwrap();
        let second = queue.claim().await.unwrap().unwrap();
        assert_eq!(second.uri, "viking://resources/Big_Doc");
    }

    #[tokio::test]
    async fn uniquifies_colliding_target_file_name() {
        let vfs = Arc::new(Vfs::new_in_memory());
        vfs.write("viking://resources/Flat_Doc.md", b"existing").await.unwrap();
        let tb = TreeBuilder::new(vfs.clone());
        let temp = tb.stage("Flat Doc", "short body", &cfg()).await.unwrap();
        let queue = MemoryQueue::new();
        let seq = AtomicU64::new(0);
        tb.promote(&temp, "viking://resources", &queue, &seq).await.unwrap();
        assert!(vfs.exists("viking://resources/Flat_Doc_2.md").await);
        assert_eq!(vfs.read("viking://resources/Flat_Doc.md").await.unwrap(), b"existing");
    }

    #[tokio::test]
    async fn resuming_a_crashed_copy_with_the_same_target_is_idempotent() {
        let vfs = Arc::new(Vfs::new_in_memory());
        let tb = TreeBuilder::new(vfs.clone());
        // Simulate a crash partway through a prior promote_to: the target
        // directory already exists with a file a concurrent writer added,
        // but the rest of the tree was never copied in.
        vfs.write_string("viking://resources/Big_Doc/extra.md", "already there").await.unwrap();
        let temp = tb.stage("Big Doc", &nested_markdown(), &cfg()).await.unwrap();
        let queue = MemoryQueue::new();
        let seq = AtomicU64::new(0);
        tb.promote_to(&temp, "Big_Doc", "viking://resources/Big_Doc", "viking://resources", &queue, &seq)
            .await
            .unwrap();
        // pre-existing file content is preserved, not clobbered
        assert_eq!(
            vfs.read_string("viking://resources/Big_Doc/extra.md").await.unwrap(),
            "already there"
        );
        // and the rest of the tree still gets copied in
        assert!(vfs.is_dir("viking://resources/Big_Doc/Parent").await);
    }

    #[tokio::test]
    async fn two_documents_sharing_a_title_land_at_distinct_targets() {
        let vfs = Arc::new(Vfs::new_in_memory());
        let tb = TreeBuilder::new(vfs.clone());
        let queue = MemoryQueue::new();
        let seq = AtomicU64::new(0);

        let temp1 = tb.stage("Big Doc", &nested_markdown(), &cfg()).await.unwrap();
        tb.promote(&temp1, "viking://resources", &queue, &seq).await.unwrap();
        let temp2 = tb.stage("Big Doc", &nested_markdown(), &cfg()).await.unwrap();
        tb.promote(&temp2, "viking://resources", &queue, &seq).await.unwrap();

        assert!(vfs.is_dir("viking://resources/Big_Doc").await);
        assert!(vfs.is_dir("viking://resources/Big_Doc_2").await);
    }
}
