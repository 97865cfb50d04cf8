//! Document parsing: format-specific parsers, a dispatch registry, and the
//! Markdown Tree Builder that imposes the directory shape ingestion persists.

use std::collections::HashMap;
use std::sync::Arc;

pub mod chunker;
pub mod code;
pub mod markdown;
pub mod text;
pub mod traits;
pub mod tree_builder;

#[cfg(test)]
mod tests;

pub use chunker::TextChunker;
pub use code::CodeParser;
pub use markdown::MarkdownParser;
pub use text::TextParser;
pub use traits::DocumentParser;
pub use tree_builder::{build_tree, TreeBuilderConfig, TreeNode};

/// The kind of content a `Chunk` carries, used by downstream consumers to
/// decide how to present or further split it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkType {
    Frontmatter,
    Paragraph,
    Heading,
    Text,
    Code,
}

/// A single piece of parsed content, with enough metadata to re-locate it in
/// the source and to carry parser-specific annotations (heading title and
/// level, detected language, …).
#[derive(Debug, Clone)]
pub struct Chunk {
    pub text: String,
    pub chunk_type: ChunkType,
    pub metadata: HashMap<String, String>,
    pub start_offset: usize,
    pub end_offset: usize,
    pub token_count: usize,
}

impl Chunk {
    pub fn new(text: impl Into<String>, chunk_type: ChunkType) -> Self {
        let text = text.into();
        let token_count = estimate_tokens(&text);
        Self {
            text,
            chunk_type,
            metadata: HashMap::new(),
            start_offset: 0,
            end_offset: 0,
            token_count,
        }
    }

    pub fn with_meta(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_offsets(mut self, start: usize, end: usize) -> Self {
        self.start_offset = start;
        self.end_offset = end;
        self
    }
}

/// Output of a single `DocumentParser::parse_content` call.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub parser_name: String,
    pub source_format: String,
    pub chunks: Vec<Chunk>,
    pub metadata: HashMap<String, String>,
}

impl ParseResult {
    pub fn new(parser_name: impl Into<String>, source_format: impl Into<String>) -> Self {
        Self {
            parser_name: parser_name.into(),
            source_format: source_format.into(),
            chunks: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn total_tokens(&self) -> usize {
        self.chunks.iter().map(|c| c.token_count).sum()
    }
}

/// Approximate token count: CJK characters count one-for-one (no
/// whitespace separates them), everything else is estimated at roughly
/// four bytes per token. Deliberately not exact — nothing downstream
/// depends on the absolute count, only on ordering and threshold crossings.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let mut cjk_chars = 0usize;
    let mut other_chars = 0usize;
    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        if is_cjk(c) {
            cjk_chars += 1;
        } else {
            other_chars += 1;
        }
    }
    cjk_chars + (other_chars + 3) / 4
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF   // CJK Unified Ideographs
        | 0x3400..=0x4DBF // CJK Extension A
        | 0x3040..=0x30FF // Hiragana + Katakana
        | 0xAC00..=0xD7AF // Hangul Syllables
        | 0xF900..=0xFAFF // CJK Compatibility Ideographs
    )
}

/// Maps a file path to the parser that claims it, via each parser's
/// `supported_extensions`. Order is significant only in that the first
/// match wins; the shipped parsers have disjoint extension sets.
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn DocumentParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Arc::new(MarkdownParser::new()),
                Arc::new(CodeParser::new()),
                Arc::new(TextParser::new()),
            ],
        }
    }

    /// Register an additional parser, tried after the built-in ones.
    pub fn register(&mut self, parser: Arc<dyn DocumentParser>) {
        self.parsers.push(parser);
    }

    pub fn parser_for(&self, path: &str) -> Option<Arc<dyn DocumentParser>> {
        self.parsers.iter().find(|p| p.can_parse(path)).cloned()
    }

    pub fn parse_file(&self, path: &str) -> anyhow::Result<ParseResult> {
        let parser = self
            .parser_for(path)
            .ok_or_else(|| anyhow::anyhow!("no parser registered for {path}"))?;
        parser.parse_file(path)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
