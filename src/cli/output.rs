//! CLI output formatting utilities
//!
//! This module provides consistent output formatting for the `carms-explorer` CLI

use crate::embeddings::RebuildStats;
use crate::etl::StagingStats;
use crate::models::SearchResult;
use crate::rag::RagResponse;
use crate::reports::Report;
use crate::reports::ReportInfo;
use crate::AppConfig;
use crate::Capabilities;

/// Safely truncate a string at character boundary (not byte boundary)
///
/// Appends `...` when anything was cut.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Collapse whitespace so chunk excerpts print on one line
fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Print search header
pub fn print_search_header(query: &str, top_k: usize) {
    println!("🔍 Searching programs for: \"{query}\" (top {top_k})");
    println!();
}

/// Print search results
pub fn print_search_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No matching programs found.");
        return;
    }

    println!("Found {} matches:", results.len());
    for (rank, result) in results.iter().enumerate() {
        println!();
        println!(
            "  {}. {} ({:.1}% match)",
            rank + 1,
            result.program_name,
            result.similarity * 100.0
        );
        println!("     🏥 {} | {} | {}", result.discipline, result.school, result.site);
        println!("     📝 {}", truncate_str(&one_line(&result.chunk_text), 160));
        if let Some(url) = &result.url {
            println!("     🔗 {url}");
        }
    }
}

/// Widest a report column may print
const REPORT_CELL_CHARS: usize = 40;

fn report_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => truncate_str(&one_line(s), REPORT_CELL_CHARS),
        other => other.to_string(),
    }
}

/// Print the report registry
pub fn print_report_list(reports: &[ReportInfo]) {
    println!("📊 Available reports:");
    for report in reports {
        println!();
        println!("  {} ({})", report.name, report.title);
        println!("     {}", report.description);
    }
}

/// Render report rows as an aligned table
pub fn format_report_table(report: &Report) -> String {
    let columns = &report.metadata.columns;
    let cells: Vec<Vec<String>> = report
        .data
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(report_cell).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{v:<width$}", width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(columns.as_slice());
    out.push('\n');
    out.push_str(&line(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>()));
    for row in &cells {
        out.push('\n');
        out.push_str(&line(row.as_slice()));
    }
    out
}

/// Print one generated report
pub fn print_report(report: &Report) {
    println!(
        "📊 {} ({} rows, generated {})",
        report.metadata.title, report.metadata.row_count, report.metadata.generated_at
    );
    println!("   {}", report.metadata.description);
    println!();
    if report.data.is_empty() {
        println!("No data. Load a catalog with `carms-explorer ingest` first.");
        return;
    }
    println!("{}", format_report_table(report));
}

/// Print a RAG answer with its sources
pub fn print_rag_response(response: &RagResponse) {
    println!("💬 {}", response.question);
    println!();
    println!("{}", response.answer);
    println!();

    if response.sources.is_empty() {
        return;
    }
    println!("📚 Sources:");
    for (i, source) in response.sources.iter().enumerate() {
        println!(
            "  [{}] {} (program {}, {:.3})",
            i + 1,
            source.program_name,
            source.program_id,
            source.similarity
        );
    }
}

pub fn print_staging_stats(stats: &StagingStats, skipped: usize) {
    println!("📊 Ingest summary:");
    println!("  Disciplines: {}", stats.disciplines);
    println!("  Schools: {}", stats.schools);
    println!("  Programs: {}", stats.programs);
    println!("  Descriptions: {}", stats.descriptions);
    if stats.orphaned_descriptions > 0 {
        println!("  Orphaned descriptions: {}", stats.orphaned_descriptions);
    }
    if skipped > 0 {
        println!("  Skipped rows: {skipped}");
    }
}

pub fn print_rebuild_stats(stats: &RebuildStats) {
    println!("📊 Embedding rebuild summary:");
    println!("  Descriptions: {}", stats.descriptions);
    println!("  Old chunks deleted: {}", stats.deleted);
    println!(
        "  Chunks stored: {}/{} ({:.1}%)",
        stats.chunks_stored,
        stats.chunks_total,
        stats.success_rate()
    );
    println!(
        "  Batches: {} succeeded, {} failed",
        stats.batches_succeeded, stats.batches_failed
    );
}

/// Print configuration
pub fn print_config(config: &AppConfig) {
    println!("📋 CaRMS Explorer Configuration:");
    println!();

    println!("🗄️  Database:");
    println!("  URL: {}", mask_database_url(config.database_url()));
    println!("  Max connections: {}", config.max_connections());
    println!("  Min connections: {}", config.min_connections());
    println!("  Connection timeout: {}s", config.connection_timeout());
    println!();

    println!("📝 Logging:");
    println!("  Level: {}", config.logging.level);
    println!("  Backtrace: {}", config.logging.backtrace);
    println!();

    let e = &config.embeddings;
    println!("🧠 Embeddings:");
    println!("  Provider: {}", e.provider);
    println!("  Model: {}", config.embedding_model());
    println!("  Dimension: {}", config.embedding_dimension());
    println!("  Chunking: {} chars, {} overlap", e.chunk_size, e.chunk_overlap);
    println!("  Rebuild: batch size {}, {} workers", e.batch_size, e.workers);
    println!();

    println!("🤖 LLM:");
    println!("  Endpoint: {}", config.llm_endpoint());
    println!("  Model: {}", config.llm_model());
    println!("  Extraction model: {}", config.llm.extraction_model);
    println!(
        "  Key: {}",
        if config.llm_key().is_some() { "configured" } else { "not set" }
    );
    println!();

    let Capabilities { rag, agent } = config.capabilities();
    println!("🌐 Server:");
    println!("  Bind: {}:{}", config.server.host, config.server.port);
    println!("  CORS: {}", config.server.cors);
    println!("  RAG: {}", if rag { "enabled" } else { "disabled" });
    println!("  Agent: {}", if agent { "enabled" } else { "disabled" });
}

/// Mask database URL for logging (hide password)
pub fn mask_database_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "***invalid***".to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => url.to_string(),
    }
}

/// Print colored output functions
pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_success(msg: &str) {
    println!("✅ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("❌ {msg}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_multibyte() {
        assert_eq!(truncate_str("Québec", 3), "Qué...");
        assert_eq!(truncate_str("short", 10), "short");
    }

    #[test]
    fn test_mask_database_url() {
        assert_eq!(
            mask_database_url("postgresql://carms:secret@db:5432/carms"),
            "postgresql://carms:***@db:5432/carms"
        );
        assert_eq!(
            mask_database_url("postgresql://localhost/carms"),
            "postgresql://localhost/carms"
        );
        assert_eq!(mask_database_url("not a url"), "***invalid***");
    }

    #[test]
    fn test_one_line() {
        assert_eq!(one_line("a\n\n  b\tc "), "a b c");
    }

    #[test]
    fn test_report_table_aligns_columns() {
        let report = Report {
            metadata: crate::reports::ReportMetadata {
                name: "program_gap_analysis".to_string(),
                title: "Program Gap Analysis".to_string(),
                description: String::new(),
                generated_at: "2026-01-01T00:00:00+00:00".to_string(),
                row_count: 2,
                columns: vec!["discipline".to_string(), "coverage_pct".to_string()],
            },
            data: vec![
                serde_json::json!({"discipline": "Family Medicine", "coverage_pct": 100.0}),
                serde_json::json!({"discipline": "Urology", "coverage_pct": 37.5}),
            ],
        };

        let table = format_report_table(&report);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "discipline       coverage_pct");
        assert_eq!(lines[2], "Family Medicine  100.0");
        assert_eq!(lines[3], "Urology          37.5");
    }
}
