//! Context assembly from retrieved documents

use super::RagSource;
use super::RetrievedDocument;

pub const EXCERPT_CHARS: usize = 200;

/// First `max_chars` characters of `s`
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Stuffs retrieved chunk texts into one context string
pub struct ContextAssembler {
    max_context_length: usize,
}

impl ContextAssembler {
    pub const fn new(max_context_length: usize) -> Self {
        Self { max_context_length }
    }

    /// Documents in retrieval order separated by blank lines, stopping at the length budget
    pub fn assemble(&self, documents: &[RetrievedDocument]) -> (String, Vec<RagSource>) {
        let mut context = String::new();
        let mut sources = Vec::new();

        for document in documents {
            let separator = if context.is_empty() { "" } else { "\n\n" };
            let added = separator.len() + document.text.len();
            if !context.is_empty() && context.len() + added > self.max_context_length {
                tracing::debug!(
                    "Context budget of {} bytes reached after {} documents",
                    self.max_context_length,
                    sources.len()
                );
                break;
            }

            context.push_str(separator);
            context.push_str(&document.text);
            sources.push(RagSource {
                program_id: document.metadata.program_id,
                program_name: document.metadata.program_name.clone(),
                discipline: document.metadata.discipline.clone(),
                school: document.metadata.school.clone(),
                site: document.metadata.site.clone(),
                similarity: document.metadata.similarity,
                excerpt: truncate_chars(&document.text, EXCERPT_CHARS).to_string(),
            });
        }

        (context, sources)
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(24_000)
    }
}
