//! Semantic-boundary chunking of extracted document text.
//!
//! Documents are split into sections at heading-like boundaries first; a
//! section that fits the chunk budget becomes a single chunk, larger sections
//! are packed greedily from blank-line paragraphs with a character overlap
//! carried between consecutive chunks.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Default target chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters carried over between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Which splitting rule produced a chunk. Diagnostic only; retrieval does not
/// look at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Section,
    ParagraphGroup,
}

/// A retrievable passage of document text with its source metadata.
/// Immutable once produced; owned by the embedding index after a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub kind: ChunkKind,
}

/// Splits raw document text into an ordered sequence of chunks.
#[derive(Debug, Clone)]
pub struct DocumentChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for DocumentChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

/// Matches a newline immediately followed by a section opener: a numbered
/// list marker ("3." or "3)"), a word plus number and colon ("Section 1:"),
/// or a run of 6+ uppercase letters/spaces ending in a colon.
fn section_boundary_regex() -> &'static Regex {
    static BOUNDARY: OnceLock<Regex> = OnceLock::new();
    BOUNDARY.get_or_init(|| {
        Regex::new(r"\n(?:\d+\.|\d+\)|\w+\s+\d+:|[A-Z][A-Z\s]{5,}:)")
            .expect("valid section boundary pattern")
    })
}

fn multi_newline_regex() -> &'static Regex {
    static NEWLINES: OnceLock<Regex> = OnceLock::new();
    NEWLINES.get_or_init(|| Regex::new(r"\n{3,}").expect("valid newline pattern"))
}

fn multi_space_regex() -> &'static Regex {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    SPACES.get_or_init(|| Regex::new(r" {2,}").expect("valid space pattern"))
}

impl DocumentChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Chunk one document's text. `source` identifies the originating
    /// document (typically the file name) and is stamped on every chunk.
    pub fn chunk(&self, text: &str, source: &str) -> Vec<Chunk> {
        let normalized = normalize_whitespace(text);

        let mut chunks = Vec::new();
        for section in split_sections(&normalized) {
            let section = section.trim();
            if section.is_empty() {
                continue;
            }

            if char_len(section) <= self.chunk_size {
                chunks.push(Chunk {
                    text: section.to_string(),
                    source: source.to_string(),
                    kind: ChunkKind::Section,
                });
            } else {
                self.pack_paragraphs(section, source, &mut chunks);
            }
        }

        tracing::debug!(source, chunks = chunks.len(), "chunked document");
        chunks
    }

    /// Greedily pack blank-line paragraphs of an oversized section into
    /// chunks, seeding each new chunk with the tail of the previous one.
    ///
    /// A single paragraph longer than the chunk budget is emitted whole. That
    /// is a known limitation rather than a bug; see the oversized-paragraph
    /// test below.
    fn pack_paragraphs(&self, section: &str, source: &str, chunks: &mut Vec<Chunk>) {
        let mut current = String::new();

        for paragraph in section.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            if char_len(&current) + char_len(paragraph) + 2 > self.chunk_size {
                if !current.is_empty() {
                    chunks.push(Chunk {
                        text: current.trim().to_string(),
                        source: source.to_string(),
                        kind: ChunkKind::ParagraphGroup,
                    });
                }

                if self.chunk_overlap > 0 && !current.is_empty() {
                    let overlap = char_tail(&current, self.chunk_overlap);
                    current = format!("{overlap}\n\n{paragraph}");
                } else {
                    current = paragraph.to_string();
                }
            } else if current.is_empty() {
                current = paragraph.to_string();
            } else {
                current.push_str("\n\n");
                current.push_str(paragraph);
            }
        }

        if !current.is_empty() {
            chunks.push(Chunk {
                text: current.trim().to_string(),
                source: source.to_string(),
                kind: ChunkKind::ParagraphGroup,
            });
        }
    }
}

/// Collapse 3+ newlines to a blank line and runs of spaces to one space.
fn normalize_whitespace(text: &str) -> String {
    let text = multi_newline_regex().replace_all(text, "\n\n");
    multi_space_regex().replace_all(&text, " ").into_owned()
}

/// Split text into candidate sections. Boundaries are newlines that precede a
/// section opener; the opener itself stays with the following section, so the
/// scan advances one character past each match start rather than past the
/// whole match (openers may themselves contain newlines).
fn split_sections(text: &str) -> Vec<&str> {
    let boundary = section_boundary_regex();
    let mut sections = Vec::new();
    let mut start = 0;
    let mut search_from = 0;

    while let Some(found) = boundary.find_at(text, search_from) {
        sections.push(&text[start..found.start()]);
        start = found.start() + 1;
        search_from = start;
    }
    sections.push(&text[start..]);
    sections
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Last `count` characters of `text`, on a char boundary.
fn char_tail(text: &str, count: usize) -> &str {
    match text.char_indices().rev().nth(count.saturating_sub(1)) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
