//! Catalog file parsing
//!
//! The catalog is one JSON document:
//!
//! ```json
//! {
//!   "disciplines": [{"discipline_id": 1, "discipline": "Anesthesiology"}],
//!   "programs": [{"program_stream_id": "27447", "discipline_id": 1, "school_id": "8",
//!                 "school_name": "University of Toronto", "program_site": "Toronto",
//!                 "program_stream": "CMG", "program_name": "Anesthesiology - Toronto",
//!                 "program_url": null}],
//!   "descriptions": [{"program_stream_id": "27447", "document_id": "1503|27447",
//!                     "sections": {"selection_criteria": "..."}}],
//!   "markdown_documents": [{"id": "1503|27447", "page_content": "# Anesthesiology ..."}]
//! }
//! ```
//!
//! The raw CaRMS exports (two workbooks, a sectioned CSV and the markdown
//! JSON) are read by [`crate::etl::raw`] into the same row shapes.
//!
//! Rows are decoded one at a time; a row that fails to decode is skipped
//! with a warning instead of failing the whole file.

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Deserializer;
use serde_json::Value;
use tracing::info;
use tracing::warn;

use crate::database::NewDescription;
use crate::database::NewProgram;
use crate::errors::Result;
use crate::models::DescriptionSections;

/// Identifiers appear as numbers or strings depending on the export
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {other}"
        ))),
    }
}

fn non_blank<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if s.trim().is_empty() {
        return Err(serde::de::Error::custom("empty string"));
    }
    Ok(s.trim().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisciplineRow {
    #[serde(alias = "id")]
    pub discipline_id: i64,
    #[serde(alias = "name", deserialize_with = "non_blank")]
    pub discipline: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ProgramRow {
    #[serde(deserialize_with = "string_or_number")]
    program_stream_id: String,
    discipline_id: i64,
    #[serde(alias = "school_source_id", deserialize_with = "string_or_number")]
    school_id: String,
    #[serde(deserialize_with = "non_blank")]
    school_name: String,
    #[serde(alias = "site")]
    program_site: String,
    #[serde(alias = "stream")]
    program_stream: String,
    #[serde(alias = "name", deserialize_with = "non_blank")]
    program_name: String,
    #[serde(default, alias = "url")]
    program_url: Option<String>,
}

impl From<ProgramRow> for NewProgram {
    fn from(row: ProgramRow) -> Self {
        Self {
            program_stream_id: row.program_stream_id,
            discipline_id: row.discipline_id,
            school_source_id: row.school_id,
            school_name: row.school_name,
            site: row.program_site,
            stream: row.program_stream,
            name: row.program_name,
            url: row.program_url.filter(|u| !u.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DescriptionRow {
    #[serde(deserialize_with = "string_or_number")]
    program_stream_id: String,
    #[serde(default)]
    document_id: Option<String>,
    #[serde(default)]
    sections: DescriptionSections,
    #[serde(default, alias = "full_markdown")]
    markdown: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MarkdownDocument {
    id: String,
    page_content: String,
}

impl MarkdownDocument {
    /// Stream id from a `"<iteration>|<stream id>"` document id
    fn stream_id(&self) -> Option<&str> {
        match self.id.split('|').collect::<Vec<_>>().as_slice() {
            [_, stream] if !stream.trim().is_empty() => Some(stream.trim()),
            _ => None,
        }
    }
}

/// Undecoded rows per table
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawCatalog {
    #[serde(default)]
    pub disciplines: Vec<Value>,
    #[serde(default)]
    pub programs: Vec<Value>,
    #[serde(default)]
    pub descriptions: Vec<Value>,
    #[serde(default)]
    pub markdown_documents: Vec<Value>,
}

/// A description ready for staging, keyed by the program it belongs to
#[derive(Debug, Clone)]
pub struct CatalogDescription {
    pub program_stream_id: String,
    pub description: NewDescription,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub disciplines: Vec<DisciplineRow>,
    pub programs: Vec<NewProgram>,
    pub descriptions: Vec<CatalogDescription>,
    /// Rows dropped because they could not be decoded
    pub skipped: usize,
}

fn decode_rows<T: DeserializeOwned>(kind: &str, rows: Vec<Value>, skipped: &mut usize) -> Vec<T> {
    rows.into_iter()
        .enumerate()
        .filter_map(|(i, row)| match serde_json::from_value::<T>(row) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!("Skipping {} row {}: {}", kind, i, e);
                *skipped += 1;
                None
            }
        })
        .collect()
}

impl Catalog {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawCatalog = serde_json::from_str(content)?;
        Ok(Self::from_raw(raw))
    }

    pub(crate) fn from_raw(raw: RawCatalog) -> Self {
        let mut skipped = 0;

        let disciplines: Vec<DisciplineRow> = decode_rows("discipline", raw.disciplines, &mut skipped);
        let programs: Vec<ProgramRow> = decode_rows("program", raw.programs, &mut skipped);
        let rows: Vec<DescriptionRow> = decode_rows("description", raw.descriptions, &mut skipped);
        let documents: Vec<MarkdownDocument> =
            decode_rows("markdown document", raw.markdown_documents, &mut skipped);

        let mut markdown: HashMap<String, String> = HashMap::new();
        for doc in &documents {
            match doc.stream_id() {
                Some(stream) => {
                    markdown.insert(stream.to_string(), doc.page_content.clone());
                }
                None => {
                    warn!("Skipping markdown document with malformed id {:?}", doc.id);
                    skipped += 1;
                }
            }
        }

        let mut descriptions: Vec<CatalogDescription> = rows
            .into_iter()
            .map(|row| {
                let full_markdown = row
                    .markdown
                    .filter(|m| !m.trim().is_empty())
                    .or_else(|| markdown.remove(&row.program_stream_id));
                CatalogDescription {
                    program_stream_id: row.program_stream_id,
                    description: NewDescription {
                        document_id: row.document_id,
                        sections: row.sections,
                        full_markdown,
                    },
                }
            })
            .collect();

        // Markdown with no sectioned counterpart still describes the program
        let mut leftovers: Vec<(String, String)> = markdown.into_iter().collect();
        leftovers.sort();
        for (stream, content) in leftovers {
            descriptions.push(CatalogDescription {
                description: NewDescription {
                    document_id: None,
                    sections: DescriptionSections::default(),
                    full_markdown: Some(content),
                },
                program_stream_id: stream,
            });
        }

        let catalog = Self {
            disciplines,
            programs: programs.into_iter().map(NewProgram::from).collect(),
            descriptions,
            skipped,
        };
        info!(
            "Parsed catalog: {} disciplines, {} programs, {} descriptions ({} rows skipped)",
            catalog.disciplines.len(),
            catalog.programs.len(),
            catalog.descriptions.len(),
            catalog.skipped
        );
        catalog
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// A JSON catalog file, or a directory holding the raw CaRMS exports
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_raw_dir(path)
        } else {
            Self::from_file(path)
        }
    }
}
