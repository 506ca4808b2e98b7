use serde::Deserialize;
use serde::Serialize;
use sqlx::FromRow;

/// Medical discipline (e.g. Family Medicine)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Discipline {
    pub id: i64,
    pub name: String,
}

/// Medical school; `source_id` is the first external id seen for the school name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct School {
    pub id: i64,
    pub source_id: String,
    pub name: String,
}

/// Residency program row, upserted by `program_stream_id`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Program {
    pub id: i64,
    pub discipline_id: i64,
    pub school_id: i64,
    pub program_stream_id: String,
    pub site: String,
    pub stream: String,
    pub name: String,
    pub url: Option<String>,
}

/// Structured and free-text description, one per program
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct ProgramDescription {
    pub id: i64,
    pub program_id: i64,
    pub document_id: Option<String>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub sections: DescriptionSections,
    pub full_markdown: Option<String>,
}

/// The named sections of a program description
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct DescriptionSections {
    pub program_name_section: Option<String>,
    pub match_iteration_name: Option<String>,
    pub program_contacts: Option<String>,
    pub general_instructions: Option<String>,
    pub supporting_documentation_information: Option<String>,
    pub review_process: Option<String>,
    pub interviews: Option<String>,
    pub selection_criteria: Option<String>,
    pub program_highlights: Option<String>,
    pub program_curriculum: Option<String>,
    pub training_sites: Option<String>,
    pub additional_information: Option<String>,
    pub return_of_service: Option<String>,
    pub faq: Option<String>,
    pub summary_of_changes: Option<String>,
}

impl DescriptionSections {
    /// Column names in storage order
    pub const COLUMNS: [&'static str; 15] = [
        "program_name_section",
        "match_iteration_name",
        "program_contacts",
        "general_instructions",
        "supporting_documentation_information",
        "review_process",
        "interviews",
        "selection_criteria",
        "program_highlights",
        "program_curriculum",
        "training_sites",
        "additional_information",
        "return_of_service",
        "faq",
        "summary_of_changes",
    ];

    /// Values in the same order as [`Self::COLUMNS`]
    pub fn values(&self) -> [Option<&str>; 15] {
        [
            self.program_name_section.as_deref(),
            self.match_iteration_name.as_deref(),
            self.program_contacts.as_deref(),
            self.general_instructions.as_deref(),
            self.supporting_documentation_information.as_deref(),
            self.review_process.as_deref(),
            self.interviews.as_deref(),
            self.selection_criteria.as_deref(),
            self.program_highlights.as_deref(),
            self.program_curriculum.as_deref(),
            self.training_sites.as_deref(),
            self.additional_information.as_deref(),
            self.return_of_service.as_deref(),
            self.faq.as_deref(),
            self.summary_of_changes.as_deref(),
        ]
    }

    /// Concatenate non-empty sections as markdown, used when no full document exists
    pub fn to_markdown(&self) -> String {
        Self::COLUMNS
            .iter()
            .zip(self.values())
            .filter_map(|(name, value)| {
                let value = value?.trim();
                if value.is_empty() {
                    return None;
                }
                Some(format!("## {}\n\n{value}", name.replace('_', " ")))
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl ProgramDescription {
    /// Text fed to the chunker: the full document, falling back to the sections
    pub fn embeddable_text(&self) -> String {
        match self.full_markdown.as_deref().map(str::trim) {
            Some(md) if !md.is_empty() => md.to_string(),
            _ => self.sections.to_markdown(),
        }
    }
}

/// One embedded chunk of a description
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramEmbedding {
    pub id: i64,
    pub program_id: i64,
    pub description_id: i64,
    pub chunk_index: i32,
    pub chunk_text: String,
}

/// Chunk ready to be written to the vector store
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub program_id: i64,
    pub description_id: i64,
    pub chunk_index: i32,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
}

/// Chunk waiting for its embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChunk {
    pub program_id: i64,
    pub description_id: i64,
    pub chunk_index: i32,
    pub chunk_text: String,
}

impl PendingChunk {
    pub fn with_embedding(self, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            program_id: self.program_id,
            description_id: self.description_id,
            chunk_index: self.chunk_index,
            chunk_text: self.chunk_text,
            embedding,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct DisciplineWithCount {
    pub id: i64,
    pub name: String,
    pub program_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct SchoolWithCount {
    pub id: i64,
    pub name: String,
    pub program_count: i64,
}

/// Program joined with discipline and school names
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramSummary {
    pub id: i64,
    pub name: String,
    pub discipline: String,
    pub school: String,
    pub site: String,
    pub stream: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramDetail {
    #[serde(flatten)]
    pub program: ProgramSummary,
    pub description: Option<DescriptionOut>,
}

/// Description as returned to clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptionOut {
    #[serde(flatten)]
    pub sections: DescriptionSections,
    pub full_markdown: Option<String>,
}

impl From<ProgramDescription> for DescriptionOut {
    fn from(d: ProgramDescription) -> Self {
        Self {
            sections: d.sections,
            full_markdown: d.full_markdown,
        }
    }
}

/// Optional structured filters applied before similarity ranking
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchFilters {
    pub discipline_id: Option<i64>,
    pub school_id: Option<i64>,
    pub site: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.discipline_id.is_none()
            && self.school_id.is_none()
            && self.site.as_deref().map_or(true, |s| s.trim().is_empty())
    }
}

/// One nearest-neighbour hit joined with program metadata
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SearchResult {
    pub program_id: i64,
    pub program_name: String,
    pub discipline: String,
    pub school: String,
    pub site: String,
    pub stream: String,
    pub chunk_text: String,
    pub similarity: f64,
    pub url: Option<String>,
}

/// Filters for the program listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramListQuery {
    pub discipline_id: Option<i64>,
    pub school_id: Option<i64>,
    pub site: Option<String>,
    /// Program name substring
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Name-substring filters used by the agent's `filter_programs` tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramNameFilter {
    pub discipline: Option<String>,
    pub school: Option<String>,
    pub site: Option<String>,
    pub stream: Option<String>,
}

/// Side-by-side view of a program used by `compare_programs`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProgramComparison {
    pub id: i64,
    pub name: String,
    pub discipline: String,
    pub school: String,
    pub site: String,
    pub stream: String,
    pub selection_criteria: Option<String>,
    pub program_highlights: Option<String>,
    pub interviews: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyticsOverview {
    pub total_programs: i64,
    pub total_disciplines: i64,
    pub total_schools: i64,
    pub total_embeddings: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct DisciplineAnalytics {
    pub discipline: String,
    pub program_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct SchoolAnalytics {
    pub school: String,
    pub program_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct SiteAnalytics {
    pub site: String,
    pub program_count: i64,
}

/// Per-discipline totals with stream breakdown and description coverage
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DisciplineSummaryRow {
    pub discipline: String,
    pub total_programs: i64,
    pub cmg_programs: i64,
    pub img_programs: i64,
    /// Share of programs with a description, 0-100, one decimal
    pub description_coverage_pct: f64,
}

/// How many schools offer a discipline
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DisciplineCoverageRow {
    pub discipline: String,
    pub schools_offering: i64,
    pub total_schools: i64,
    pub coverage_pct: f64,
}
