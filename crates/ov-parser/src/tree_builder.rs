//! The Markdown Tree Builder: the canonical splitter that turns one
//! normalized Markdown document into the directory shape ingestion persists
//! under a scope. Pure function over its input, zero LLM calls, zero I/O —
//! `ov-ingest`'s TreeBuilder is the thing that actually writes this to AGFS.

use std::collections::HashMap;

use crate::{estimate_tokens, markdown::MarkdownParser};

/// Token thresholds and the (swappable, for tests) counter driving them.
#[derive(Clone)]
pub struct TreeBuilderConfig {
    pub small: usize,
    pub split: usize,
    pub subsplit: usize,
    pub token_counter: fn(&str) -> usize,
}

impl Default for TreeBuilderConfig {
    fn default() -> Self {
        Self {
            small: 800,
            split: 4000,
            subsplit: 1024,
            token_counter: estimate_tokens,
        }
    }
}

/// A built node: either a leaf file or a directory of further nodes, named
/// the way they'll be written under AGFS (directories carry no extension,
/// files always end in `.md`).
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    File { name: String, content: String },
    Dir { name: String, children: Vec<TreeNode> },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::File { name, .. } => name,
            TreeNode::Dir { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
struct Section {
    title: String,
    direct_content: String,
    full_text: String,
    children: Vec<Section>,
}

/// Build the tree for one document. `title` is the document's own name
/// (used as the root file/directory name); `content` is the raw Markdown,
/// frontmatter and all.
pub fn build_tree(title: &str, content: &str, cfg: &TreeBuilderConfig) -> TreeNode {
    let parser = MarkdownParser::new();
    let (body, _frontmatter) = parser.extract_frontmatter(content);
    let root_name = sanitize_filename(title);
    let headings = parser.find_headings(body);

    if headings.is_empty() {
        let tokens = (cfg.token_counter)(body);
        if tokens <= cfg.split {
            return TreeNode::File {
                name: format!("{root_name}.md"),
                content: body.trim().to_string(),
            };
        }
        let children = split_into_files(&parser, &root_name, body, cfg);
        return TreeNode::Dir { name: root_name, children };
    }

    let mut sections = build_sections(&headings, body, body.len());
    let mut intro = body[..headings[0].0].trim().to_string();

    // A single top-level heading that just restates the document's own
    // title wraps everything else without adding real structure: collapse
    // it so the document directory and the section's directory aren't
    // nested two deep under the same name. A top-level section with a
    // *different* name is a real section and keeps its own directory even
    // when it's the only one (see the Parent/Big-Doc case below).
    if sections.len() == 1 && sanitize_filename(&sections[0].title).eq_ignore_ascii_case(&root_name) {
        let wrapper = sections.remove(0);
        if wrapper.children.is_empty() {
            let node = section_to_node(&root_name, &wrapper, cfg);
            if intro.is_empty() {
                return node;
            }
            return match node {
                TreeNode::Dir { name, mut children } => {
                    children.insert(0, TreeNode::File { name: format!("{name}.md"), content: intro });
                    TreeNode::Dir { name, children }
                }
                TreeNode::File { name, content } => {
                    TreeNode::File { name, content: format!("{intro}\n\n{content}") }
                }
            };
        }
        if intro.is_empty() {
            intro = wrapper.direct_content;
        }
        sections = wrapper.children;
    }

    let mut children = Vec::new();
    if !intro.is_empty() {
        children.push(TreeNode::File {
            name: format!("{root_name}.md"),
            content: intro,
        });
    }
    for section in &sections {
        let name = sanitize_filename(&section.title);
        children.push(section_to_node(&name, section, cfg));
    }

    let children = coalesce_small_sections(children, cfg);
    let children = disambiguate(children);
    TreeNode::Dir { name: root_name, children }
}

/// Group a flat heading list into a nested tree, scoped to `[0, scope_end)`.
/// `headings` must all lie within that range and share no level lower than
/// the minimum level present (true of any contiguous sub-slice produced by
/// a previous call to this function).
fn build_sections(
    headings: &[(usize, usize, String, usize)],
    content: &str,
    scope_end: usize,
) -> Vec<Section> {
    if headings.is_empty() {
        return Vec::new();
    }
    let min_level = headings.iter().map(|h| h.3).min().unwrap();
    let mut sections = Vec::new();
    let mut i = 0;
    while i < headings.len() {
        if headings[i].3 != min_level {
            i += 1;
            continue;
        }
        let start = headings[i].0;
        let title = headings[i].2.clone();
        let mut j = i + 1;
        while j < headings.len() && headings[j].3 > min_level {
            j += 1;
        }
        let end = if j < headings.len() { headings[j].0 } else { scope_end };
        let heading_end = headings[i].1;
        let sub_headings = &headings[i + 1..j];
        let direct_end = sub_headings.first().map(|h| h.0).unwrap_or(end);
        let direct_content = content[heading_end..direct_end].trim().to_string();
        let full_text = content[start..end].trim().to_string();
        let children = build_sections(sub_headings, content, end);
        sections.push(Section { title, direct_content, full_text, children });
        i = j;
    }
    sections
}

fn section_to_node(name: &str, section: &Section, cfg: &TreeBuilderConfig) -> TreeNode {
    let tokens = (cfg.token_counter)(&section.full_text);

    if !section.children.is_empty() && tokens > cfg.split {
        let mut children = Vec::new();
        if !section.direct_content.is_empty() {
            children.push(TreeNode::File {
                name: format!("{name}.md"),
                content: section.direct_content.clone(),
            });
        }
        for child in &section.children {
            let child_name = sanitize_filename(&child.title);
            children.push(section_to_node(&child_name, child, cfg));
        }
        let children = coalesce_small_sections(children, cfg);
        let children = disambiguate(children);
        return TreeNode::Dir { name: name.to_string(), children };
    }

    if section.children.is_empty() && tokens > cfg.split {
        let parser = MarkdownParser::new();
        let children = split_into_files(&parser, name, &section.full_text, cfg);
        return TreeNode::Dir { name: name.to_string(), children };
    }

    TreeNode::File {
        name: format!("{name}.md"),
        content: section.full_text.clone(),
    }
}

/// Split oversized, subsection-free content into `name_1.md, name_2.md, …`
/// by paragraph, targeting `cfg.subsplit` tokens per chunk.
fn split_into_files(
    parser: &MarkdownParser,
    name: &str,
    content: &str,
    cfg: &TreeBuilderConfig,
) -> Vec<TreeNode> {
    parser
        .smart_split(content, cfg.subsplit)
        .into_iter()
        .enumerate()
        .map(|(i, part)| TreeNode::File {
            name: format!("{name}_{}.md", i + 1),
            content: part,
        })
        .collect()
}

/// Greedily merge consecutive small files (individual size < `small`) into
/// one file while the running total stays under `small`. Directories never
/// participate and always break a run.
fn coalesce_small_sections(nodes: Vec<TreeNode>, cfg: &TreeBuilderConfig) -> Vec<TreeNode> {
    let mut result = Vec::new();
    let mut buffer: Vec<(String, String)> = Vec::new();
    let mut buffer_tokens = 0usize;

    fn flush(buffer: &mut Vec<(String, String)>, result: &mut Vec<TreeNode>) {
        if buffer.is_empty() {
            return;
        }
        if buffer.len() == 1 {
            let (name, content) = buffer.pop().unwrap();
            result.push(TreeNode::File { name: format!("{name}.md"), content });
        } else {
            let name = buffer.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>().join("_");
            let content = buffer.iter().map(|(_, c)| c.as_str()).collect::<Vec<_>>().join("\n\n");
            result.push(TreeNode::File { name: format!("{name}.md"), content });
        }
        buffer.clear();
    }

    for node in nodes {
        match node {
            TreeNode::File { name, content } => {
                let tokens = (cfg.token_counter)(&content);
                let base_name = name.strip_suffix(".md").unwrap_or(&name).to_string();
                if tokens >= cfg.small {
                    flush(&mut buffer, &mut result);
                    buffer_tokens = 0;
                    result.push(TreeNode::File { name, content });
                } else if buffer_tokens + tokens < cfg.small {
                    buffer_tokens += tokens;
                    buffer.push((base_name, content));
                } else {
                    flush(&mut buffer, &mut result);
                    buffer_tokens = tokens;
                    buffer.push((base_name, content));
                }
            }
            dir @ TreeNode::Dir { .. } => {
                flush(&mut buffer, &mut result);
                buffer_tokens = 0;
                result.push(dir);
            }
        }
    }
    flush(&mut buffer, &mut result);
    result
}

/// Append `_2`, `_3`, … to the base name of any node whose name collides
/// with an earlier sibling.
fn disambiguate(nodes: Vec<TreeNode>) -> Vec<TreeNode> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    nodes
        .into_iter()
        .map(|node| {
            let name = node.name().to_string();
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                return node;
            }
            let suffix = count.to_string();
            match node {
                TreeNode::File { content, .. } => {
                    let base = name.strip_suffix(".md").unwrap_or(&name);
                    TreeNode::File { name: format!("{base}_{suffix}.md"), content }
                }
                TreeNode::Dir { children, .. } => {
                    TreeNode::Dir { name: format!("{name}_{suffix}"), children }
                }
            }
        })
        .collect()
}

/// Strip path separators and control characters, collapse whitespace runs
/// to `_`, and truncate to 120 UTF-8 bytes without splitting a character.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::new();
    let mut last_was_space = false;
    for c in name.chars() {
        if c == '/' || c.is_control() {
            continue;
        }
        if c.is_whitespace() {
            if !last_was_space {
                out.push('_');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    let mut bytes = out.into_bytes();
    if bytes.len() > 120 {
        bytes.truncate(120);
        while !bytes.is_empty() && std::str::from_utf8(&bytes).is_err() {
            bytes.pop();
        }
    }
    String::from_utf8(bytes).unwrap_or_default()
}
