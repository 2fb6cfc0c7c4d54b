//! Citation-tagged context assembly.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::retriever::SearchResult;

/// Header used for a result without a section title.
const UNTITLED_HEADER: &str = "Context";

/// Metadata behind one citation tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub section_title: String,
    pub score: f32,
    pub source: String,
}

/// A citation as shown to the end user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub tag: String,
    pub section_title: String,
    pub score: f32,
    pub source: String,
}

/// Grounding context for the generator plus the tag lookup for the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// One `[S#] title — text` line per result, best first.
    pub block: String,

    /// `S1..Sn` in the same order as `block`.
    pub sources: IndexMap<String, SourceRef>,
}

impl AssembledContext {
    /// Whether no passages were retrieved.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Citations in tag order, scores rounded to three decimals.
    pub fn citations(&self) -> Vec<Citation> {
        self.sources
            .iter()
            .map(|(tag, source)| Citation {
                tag: tag.clone(),
                section_title: source.section_title.clone(),
                score: (source.score * 1000.0).round() / 1000.0,
                source: source.source.clone(),
            })
            .collect()
    }
}

/// Render ranked results into a context block and tag map.
///
/// Tags follow the order of `results` and are always dense from `S1`.
pub fn assemble(results: &[SearchResult]) -> AssembledContext {
    let mut lines = Vec::with_capacity(results.len());
    let mut sources = IndexMap::with_capacity(results.len());

    for (position, result) in results.iter().enumerate() {
        let tag = format!("S{}", position + 1);
        let header = if result.section_title.is_empty() {
            UNTITLED_HEADER
        } else {
            result.section_title.as_str()
        };
        lines.push(format!("[{tag}] {header} — {}", result.text).trim().to_string());
        sources.insert(
            tag,
            SourceRef {
                id: result.id.clone(),
                section_title: result.section_title.clone(),
                score: result.score,
                source: result.source.clone(),
            },
        );
    }

    AssembledContext {
        block: lines.join("\n"),
        sources,
    }
}
