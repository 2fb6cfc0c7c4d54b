//! Heading-aware document chunking.
//!
//! A markdown document is partitioned into sections at heading lines
//! (`#` through `######` followed by a space, a tab, or the end of the
//! line). Each section body is then cut into fixed-size character windows.
//! Window sizes count Unicode scalar values, so a window never splits a code
//! point.

use serde::{Deserialize, Serialize};

use crate::error::ChunkError;

/// Title used when the document has no headings at all.
pub const DEFAULT_SECTION_TITLE: &str = "Content";

/// Title used for a heading line with no text after the markers.
pub const UNTITLED_SECTION_TITLE: &str = "Section";

/// A passage draft: text plus the metadata it will be indexed with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequential identifier (`C1`, `C2`, ...) in emission order.
    pub id: String,

    /// Nearest enclosing heading.
    pub section_title: String,

    /// Trimmed, non-empty passage text.
    pub text: String,

    /// Originating document.
    pub source: String,
}

/// How the window start advances after a window is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMode {
    /// `start = max(end - overlap, end)`. Windows abut and `overlap` has no
    /// effect; this matches indexes built by earlier tooling.
    #[default]
    Literal,
    /// `start = end - overlap`. Consecutive windows share `overlap` characters.
    BackStep,
}

/// Configuration for the chunker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Window size in characters.
    pub target_size: usize,

    /// Characters shared between consecutive windows (see [`OverlapMode`]).
    pub overlap: usize,

    /// Window advance rule.
    pub overlap_mode: OverlapMode,

    /// Identifier stamped on every chunk as its source.
    pub source: String,
}

impl ChunkerConfig {
    /// Default window size.
    pub const DEFAULT_TARGET_SIZE: usize = 800;

    /// Default overlap.
    pub const DEFAULT_OVERLAP: usize = 100;

    /// Create a configuration with the given window size and overlap.
    pub fn new(target_size: usize, overlap: usize) -> Self {
        Self {
            target_size,
            overlap,
            ..Self::default()
        }
    }

    /// Set the overlap mode.
    pub fn with_overlap_mode(mut self, mode: OverlapMode) -> Self {
        self.overlap_mode = mode;
        self
    }

    /// Set the source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Reject settings under which the window could not advance.
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.target_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "target_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap_mode == OverlapMode::BackStep && self.overlap >= self.target_size {
            return Err(ChunkError::InvalidConfig(format!(
                "overlap ({}) must be smaller than target_size ({}) in back-step mode",
                self.overlap, self.target_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_size: Self::DEFAULT_TARGET_SIZE,
            overlap: Self::DEFAULT_OVERLAP,
            overlap_mode: OverlapMode::default(),
            source: "knowledge.md".to_string(),
        }
    }
}

/// A heading-delimited slice of the document.
#[derive(Debug, PartialEq, Eq)]
struct Section<'a> {
    title: &'a str,
    body: &'a str,
}

/// Split a markdown document into ordered chunks.
///
/// Text before the first heading belongs to no section and is not emitted.
/// Sections with an empty body produce no chunks.
pub fn split_markdown(document: &str, config: &ChunkerConfig) -> Result<Vec<Chunk>, ChunkError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for section in sections(document) {
        for text in windows(section.body, config) {
            chunks.push(Chunk {
                id: format!("C{}", chunks.len() + 1),
                section_title: section.title.to_string(),
                text,
                source: config.source.clone(),
            });
        }
    }

    Ok(chunks)
}

/// Title of a heading line, or `None` if the line is not a heading.
fn heading_title(line: &str) -> Option<&str> {
    let level = line.bytes().take_while(|b| *b == b'#').count();
    if !(1..=6).contains(&level) {
        return None;
    }

    // A bare `#` run is an empty heading.
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }

    let title = rest.trim();
    Some(if title.is_empty() {
        UNTITLED_SECTION_TITLE
    } else {
        title
    })
}

fn sections(document: &str) -> Vec<Section<'_>> {
    // (line start, end of heading text, title)
    let mut headings = Vec::new();
    let mut offset = 0;
    for line in document.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        if let Some(title) = heading_title(content) {
            headings.push((offset, offset + content.len(), title));
        }
        offset += line.len();
    }

    // Windows are laid over the raw document; only each window is trimmed.
    if headings.is_empty() {
        return vec![Section {
            title: DEFAULT_SECTION_TITLE,
            body: document,
        }];
    }

    headings
        .iter()
        .enumerate()
        .map(|(i, &(_, body_start, title))| {
            let body_end = headings
                .get(i + 1)
                .map_or(document.len(), |&(next_start, _, _)| next_start);
            Section {
                title,
                body: document[body_start..body_end].trim(),
            }
        })
        .collect()
}

fn windows(body: &str, config: &ChunkerConfig) -> Vec<String> {
    // Byte offset of every char boundary, including the end of the body.
    let bounds: Vec<usize> = body
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(body.len()))
        .collect();
    let total = bounds.len() - 1;

    let mut pieces = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + config.target_size).min(total);
        let piece = body[bounds[start]..bounds[end]].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        if end == total {
            break;
        }
        start = match config.overlap_mode {
            OverlapMode::Literal => end.saturating_sub(config.overlap).max(end),
            OverlapMode::BackStep => end - config.overlap,
        };
    }

    pieces
}
