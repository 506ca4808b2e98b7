//! Tools the agent can call against the program catalog

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;
use tracing::debug;

use crate::database::Database;
use crate::errors::CarmsError;
use crate::errors::Result;
use crate::llm::ToolDefinition;
use crate::models::ProgramNameFilter;
use crate::models::SearchFilters;
use crate::rag::context::truncate_chars;
use crate::rag::retriever::DEFAULT_TOP_K;
use crate::rag::retriever::MAX_TOP_K;
use crate::rag::SearchService;

const RELEVANT_TEXT_CHARS: usize = 300;
const COMPARE_FIELD_CHARS: usize = 500;
const TOP_ANALYTICS: i64 = 10;

/// Dispatch surface for model tool calls
///
/// `Err` is reported back to the model as a failed tool result; it never
/// aborts the turn.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn execute(&self, name: &str, input: &Value) -> Result<String>;
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

pub fn catalog_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "search_programs",
            "Semantic search over CaRMS residency program descriptions. \
             Use this when a user describes what they're looking for.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Natural language description"},
                    "top_k": {"type": "integer", "minimum": 1, "maximum": MAX_TOP_K, "default": DEFAULT_TOP_K}
                },
                "required": ["query"]
            }),
        ),
        tool(
            "filter_programs",
            "Filter programs by discipline, school, site, or stream. Use this for structured queries.",
            json!({
                "type": "object",
                "properties": {
                    "discipline": {"type": "string"},
                    "school": {"type": "string"},
                    "site": {"type": "string"},
                    "stream": {"type": "string"}
                }
            }),
        ),
        tool(
            "get_program_detail",
            "Get full details for a specific program including all description sections.",
            json!({
                "type": "object",
                "properties": {"program_id": {"type": "integer"}},
                "required": ["program_id"]
            }),
        ),
        tool(
            "compare_programs",
            "Compare multiple programs side by side. Provide program IDs separated by commas.",
            json!({
                "type": "object",
                "properties": {"program_ids": {"type": "string", "description": "e.g. \"12,40,97\""}},
                "required": ["program_ids"]
            }),
        ),
        tool(
            "list_disciplines",
            "List all medical disciplines with program counts.",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            "list_schools",
            "List all Canadian medical schools with program counts.",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            "get_analytics",
            "Get aggregate statistics about CaRMS programs.",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct DetailArgs {
    program_id: i64,
}

#[derive(Debug, Deserialize)]
struct CompareArgs {
    program_ids: Value,
}

fn args<T: serde::de::DeserializeOwned>(tool: &str, input: &Value) -> Result<T> {
    serde_json::from_value(input.clone())
        .map_err(|e| CarmsError::InvalidInput(format!("invalid arguments for {tool}: {e}")))
}

/// Accepts "1, 2,3" or a JSON array of integers
pub fn parse_program_ids(value: &Value) -> Result<Vec<i64>> {
    let invalid = || {
        CarmsError::InvalidInput(
            "Invalid program IDs. Provide comma-separated integers.".to_string(),
        )
    };
    match value {
        Value::String(s) => s
            .split(',')
            .map(|part| part.trim().parse::<i64>().map_err(|_| invalid()))
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_i64().ok_or_else(invalid))
            .collect(),
        Value::Number(n) => n.as_i64().map(|id| vec![id]).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

fn clip(text: Option<&str>, max: usize) -> String {
    truncate_chars(text.unwrap_or_default(), max).to_string()
}

fn pretty(value: &impl serde::Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Catalog-backed tool implementations
pub struct CatalogTools {
    database: Database,
    search: Arc<SearchService>,
}

impl CatalogTools {
    pub fn new(database: Database, search: Arc<SearchService>) -> Self {
        Self { database, search }
    }

    async fn search_programs(&self, input: &Value) -> Result<String> {
        let SearchArgs { query, top_k } = args("search_programs", input)?;
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K).clamp(1, MAX_TOP_K);
        let results = self
            .search
            .search(&query, top_k, &SearchFilters::default())
            .await?;

        let rows: Vec<Value> = results
            .iter()
            .map(|r| {
                json!({
                    "program_id": r.program_id,
                    "name": r.program_name,
                    "discipline": r.discipline,
                    "school": r.school,
                    "site": r.site,
                    "stream": r.stream,
                    "relevant_text": truncate_chars(&r.chunk_text, RELEVANT_TEXT_CHARS),
                    "similarity": round4(r.similarity),
                })
            })
            .collect();
        pretty(&rows)
    }

    async fn filter_programs(&self, input: &Value) -> Result<String> {
        let filter: ProgramNameFilter = args("filter_programs", input)?;
        let programs = self.database.filter_programs(&filter).await?;
        let rows: Vec<Value> = programs
            .iter()
            .map(|p| {
                json!({
                    "program_id": p.id,
                    "name": p.name,
                    "discipline": p.discipline,
                    "school": p.school,
                    "site": p.site,
                    "stream": p.stream,
                })
            })
            .collect();
        Ok(format!("Found {} programs:\n{}", rows.len(), pretty(&rows)?))
    }

    async fn get_program_detail(&self, input: &Value) -> Result<String> {
        let DetailArgs { program_id } = args("get_program_detail", input)?;
        match self.database.get_program_detail(program_id).await? {
            Some(detail) => pretty(&detail),
            None => Ok(format!("Program {program_id} not found.")),
        }
    }

    async fn compare_programs(&self, input: &Value) -> Result<String> {
        let CompareArgs { program_ids } = args("compare_programs", input)?;
        let ids = parse_program_ids(&program_ids)?;
        let programs = self.database.compare_programs(&ids).await?;
        let rows: Vec<Value> = programs
            .iter()
            .map(|p| {
                json!({
                    "program_id": p.id,
                    "name": p.name,
                    "discipline": p.discipline,
                    "school": p.school,
                    "site": p.site,
                    "stream": p.stream,
                    "selection_criteria": clip(p.selection_criteria.as_deref(), COMPARE_FIELD_CHARS),
                    "highlights": clip(p.program_highlights.as_deref(), COMPARE_FIELD_CHARS),
                    "interviews": clip(p.interviews.as_deref(), COMPARE_FIELD_CHARS),
                })
            })
            .collect();
        pretty(&rows)
    }

    async fn get_analytics(&self) -> Result<String> {
        let overview = self.database.analytics_overview().await?;
        let disciplines = self.database.programs_by_discipline(Some(TOP_ANALYTICS)).await?;
        let sites = self.database.top_sites(TOP_ANALYTICS).await?;
        pretty(&json!({
            "total_programs": overview.total_programs,
            "total_disciplines": overview.total_disciplines,
            "total_schools": overview.total_schools,
            "top_disciplines": disciplines
                .iter()
                .map(|d| json!({"name": d.discipline, "count": d.program_count}))
                .collect::<Vec<_>>(),
            "top_sites": sites
                .iter()
                .map(|s| json!({"site": s.site, "count": s.program_count}))
                .collect::<Vec<_>>(),
        }))
    }
}

#[async_trait]
impl ToolExecutor for CatalogTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        catalog_tool_definitions()
    }

    async fn execute(&self, name: &str, input: &Value) -> Result<String> {
        debug!("Executing tool {} with {}", name, input);
        match name {
            "search_programs" => self.search_programs(input).await,
            "filter_programs" => self.filter_programs(input).await,
            "get_program_detail" => self.get_program_detail(input).await,
            "compare_programs" => self.compare_programs(input).await,
            "list_disciplines" => pretty(&self.database.list_disciplines().await?),
            "list_schools" => pretty(&self.database.list_schools().await?),
            "get_analytics" => self.get_analytics().await,
            other => Err(CarmsError::InvalidInput(format!("Tool not found: {other}"))),
        }
    }
}
