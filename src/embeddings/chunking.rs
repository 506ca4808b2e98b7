//! Recursive text splitting with overlap.
//!
//! Text is first cut into pieces no longer than the chunk size, trying
//! separators in priority order (paragraphs, headings, lines, words) and
//! falling back to fixed-width character cuts. Pieces are then merged
//! greedily into chunks, and each new chunk starts with as many trailing
//! pieces of the previous one as fit in the overlap budget.

use std::collections::VecDeque;

use serde::Deserialize;
use serde::Serialize;

use crate::CarmsError;
use crate::Result;

/// Separators tried in order, highest priority first
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n# ", "\n## ", "\n### ", "\n", " "];

/// One window of the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Ordinal, contiguous from zero
    pub index: usize,
    /// Span text with surrounding whitespace trimmed, never empty
    pub text: String,
    /// Byte offset of the untrimmed span in the source
    pub start: usize,
    /// Byte offset one past the untrimmed span
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

impl Span {
    fn new(text: &str, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            chars: text[start..end].chars().count(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextChunker {
    /// Sizes are measured in characters
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(CarmsError::InvalidInput(
                "chunk size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(CarmsError::InvalidInput(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(ToString::to_string).collect(),
        })
    }

    pub fn from_config(config: &crate::config::AppConfig) -> Result<Self> {
        Self::new(config.chunk_size(), config.chunk_overlap())
    }

    /// Replace the separator priority list
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into ordered, non-empty chunks of at most `chunk_size` characters
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        let separators: Vec<&str> = self.separators.iter().map(String::as_str).collect();
        self.split_span(text, Span::new(text, 0, text.len()), &separators, &mut pieces);

        let chunks = self.merge(text, &pieces);
        tracing::debug!(
            "Chunked {} chars into {} chunks (size: {}, overlap: {})",
            text.chars().count(),
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );
        chunks
    }

    fn split_span(&self, text: &str, span: Span, separators: &[&str], out: &mut Vec<Span>) {
        if span.chars <= self.chunk_size {
            out.push(span);
            return;
        }

        let slice = &text[span.start..span.end];
        let Some(position) = separators
            .iter()
            .position(|sep| !sep.is_empty() && slice.contains(sep))
        else {
            self.hard_split(text, span, out);
            return;
        };
        let separator = separators[position];
        let rest = &separators[position + 1..];

        // The separator stays attached to the piece it introduces
        let mut piece_start = span.start;
        for (offset, _) in slice.match_indices(separator) {
            let at = span.start + offset;
            if at > piece_start {
                self.split_span(text, Span::new(text, piece_start, at), rest, out);
                piece_start = at;
            }
        }
        if piece_start < span.end {
            self.split_span(text, Span::new(text, piece_start, span.end), rest, out);
        }
    }

    fn hard_split(&self, text: &str, span: Span, out: &mut Vec<Span>) {
        let slice = &text[span.start..span.end];
        let mut piece_start = span.start;
        let mut count = 0;
        for (offset, _) in slice.char_indices() {
            if count == self.chunk_size {
                let at = span.start + offset;
                out.push(Span {
                    start: piece_start,
                    end: at,
                    chars: count,
                });
                piece_start = at;
                count = 0;
            }
            count += 1;
        }
        if piece_start < span.end {
            out.push(Span {
                start: piece_start,
                end: span.end,
                chars: count,
            });
        }
    }

    fn merge(&self, text: &str, pieces: &[Span]) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<Span> = VecDeque::new();
        let mut window_chars = 0;

        for piece in pieces {
            if !window.is_empty() && window_chars + piece.chars > self.chunk_size {
                Self::emit(text, &window, &mut chunks);
                while let Some(front) = window.front().copied() {
                    let too_much_overlap = window_chars > self.chunk_overlap;
                    let no_room = window_chars + piece.chars > self.chunk_size;
                    if !too_much_overlap && !no_room {
                        break;
                    }
                    window.pop_front();
                    window_chars -= front.chars;
                }
            }
            window.push_back(*piece);
            window_chars += piece.chars;
        }

        if !window.is_empty() {
            Self::emit(text, &window, &mut chunks);
        }
        chunks
    }

    fn emit(text: &str, window: &VecDeque<Span>, chunks: &mut Vec<TextChunk>) {
        let (Some(first), Some(last)) = (window.front(), window.back()) else {
            return;
        };
        let trimmed = text[first.start..last.end].trim();
        if trimmed.is_empty() {
            return;
        }
        chunks.push(TextChunk {
            index: chunks.len(),
            text: trimmed.to_string(),
            start: first.start,
            end: last.end,
        });
    }
}
