//! Line-range chunking for indexing.
//!
//! A file's lines are partitioned into fixed windows of at most
//! `max_lines` lines: no gaps, no overlaps, ascending by start line.
//! Symbol and kind metadata are best-effort and never influence where a
//! chunk starts or ends.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::language::detect_language;
use crate::config::ChunkerConfig;

/// Chunk of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Starting line (1-based).
    pub start_line: usize,
    /// Ending line (1-based, inclusive).
    pub end_line: usize,
    /// Chunk content, lines joined with `\n`.
    pub content: String,
    /// First declared symbol in the chunk.
    pub symbol: Option<String>,
    /// Declaration kind: `function`, `class` or `block`.
    pub kind: Option<String>,
}

impl Chunk {
    /// Number of lines covered.
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// Rough token count (four bytes per token).
    #[must_use]
    pub fn token_estimate(&self) -> usize {
        self.content.len() / 4
    }
}

/// Chunks produced for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedFile {
    pub chunks: Vec<Chunk>,
}

/// Declaration patterns per language: group 1 is the keyword, group 2 the name.
static SYMBOL_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let table = [
        (
            "rust",
            r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|const|unsafe|extern)\s+)*(fn|struct|enum|impl|trait|mod)\s+(\w+)",
        ),
        ("python", r"(?m)^\s*(?:async\s+)?(def|class)\s+(\w+)"),
        (
            "javascript",
            r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?(function|class|const|let)\s+(\w+)",
        ),
        (
            "typescript",
            r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(function|class|interface|type|const|let)\s+(\w+)",
        ),
        ("go", r"(?m)^\s*(func|type)\s+(?:\([^)]*\)\s*)?(\w+)"),
        (
            "java",
            r"(?m)^\s*(?:(?:public|private|protected|static|final|abstract|sealed)\s+)*(class|interface|enum|record)\s+(\w+)",
        ),
    ];

    table
        .into_iter()
        .filter_map(|(lang, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((lang, re)),
            Err(e) => {
                tracing::error!(lang, error = %e, "Invalid symbol pattern");
                None
            }
        })
        .collect()
});

/// Line chunker.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker with config.
    #[must_use]
    pub const fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Maximum span of a chunk in lines.
    #[must_use]
    pub const fn max_lines(&self) -> usize {
        self.config.max_lines
    }

    /// Chunk file content into consecutive line windows.
    #[must_use]
    pub fn chunk_content(&self, content: &str, language: Option<&str>) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        let max_lines = self.config.max_lines.max(1);

        lines
            .chunks(max_lines)
            .enumerate()
            .map(|(i, window)| {
                let start_line = i * max_lines + 1;
                let text = window.join("\n");
                let (symbol, kind) = extract_symbol(&text, language).unzip();

                Chunk {
                    start_line,
                    end_line: start_line + window.len() - 1,
                    content: text,
                    symbol,
                    kind: kind.map(str::to_string),
                }
            })
            .collect()
    }
}

/// Chunk `content` belonging to `path`, detecting its language from the extension.
#[must_use]
pub fn chunk_file(path: &Path, content: &str, options: ChunkerConfig) -> ChunkedFile {
    ChunkedFile {
        chunks: Chunker::new(options).chunk_content(content, detect_language(path)),
    }
}

/// Find the first declaration in `text`, returning its name and kind.
fn extract_symbol(text: &str, language: Option<&str>) -> Option<(String, &'static str)> {
    let language = language?;
    let (_, pattern) = SYMBOL_PATTERNS.iter().find(|(lang, _)| *lang == language)?;
    let captures = pattern.captures(text)?;

    let keyword = captures.get(1)?.as_str();
    let name = captures.get(2)?.as_str().to_string();
    Some((name, kind_for(keyword)))
}

fn kind_for(keyword: &str) -> &'static str {
    match keyword {
        "fn" | "def" | "function" | "func" => "function",
        "class" | "struct" | "enum" | "impl" | "trait" | "interface" | "type" | "record" => {
            "class"
        }
        _ => "block",
    }
}
