//! Reader for the raw CaRMS export directory
//!
//! | file                                        | content                      |
//! |---------------------------------------------|------------------------------|
//! | `1503_discipline.xlsx`                      | discipline id and name       |
//! | `1503_program_master.xlsx`                  | one row per program stream   |
//! | `1503_program_descriptions_x_section.csv`   | description text per section |
//! | `1503_markdown_program_descriptions_v2.json`| full markdown per document   |
//!
//! The two workbooks are required; the description files are optional.
//! Sheet rows become JSON objects keyed by header so they decode through
//! the same row types as the JSON catalog.

use std::io::Read;
use std::path::Path;

use calamine::open_workbook_auto;
use calamine::Data;
use calamine::Reader;
use serde_json::Map;
use serde_json::Value;
use tracing::info;
use tracing::warn;

use super::catalog::Catalog;
use super::catalog::RawCatalog;
use crate::errors::CarmsError;
use crate::errors::Result;

pub const DISCIPLINES_FILE: &str = "1503_discipline.xlsx";
pub const PROGRAM_MASTER_FILE: &str = "1503_program_master.xlsx";
pub const SECTIONED_DESCRIPTIONS_FILE: &str = "1503_program_descriptions_x_section.csv";
pub const MARKDOWN_DOCUMENTS_FILE: &str = "1503_markdown_program_descriptions_v2.json";

/// Sectioned CSV column -> description section field
const SECTION_COLUMNS: [(&str, &str); 15] = [
    ("program_name", "program_name_section"),
    ("match_iteration_name", "match_iteration_name"),
    // the export misspells this column
    ("program_contracts", "program_contacts"),
    ("general_instructions", "general_instructions"),
    (
        "supporting_documentation_information",
        "supporting_documentation_information",
    ),
    ("review_process", "review_process"),
    ("interviews", "interviews"),
    ("selection_criteria", "selection_criteria"),
    ("program_highlights", "program_highlights"),
    ("program_curriculum", "program_curriculum"),
    ("training_sites", "training_sites"),
    ("additional_information", "additional_information"),
    ("return_of_service", "return_of_service"),
    ("faq", "faq"),
    ("summary_of_changes", "summary_of_changes"),
];

/// Largest float that still maps exactly onto an integer id
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Index columns written by dataframe exports carry no header
fn is_index_column(header: &str) -> bool {
    header.is_empty() || header.starts_with("Unnamed")
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => Value::from(*f as i64),
        Data::Float(f) => Value::from(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::String(s.trim().to_string()),
        other => Value::String(other.to_string()),
    }
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// First row is the header; blank rows and index columns are dropped
fn rows_to_objects<'a, I>(mut rows: I) -> Vec<Value>
where
    I: Iterator<Item = &'a [Data]>,
{
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_row.iter().map(header_name).collect();

    rows.filter_map(|row| {
        let object: Map<String, Value> = headers
            .iter()
            .zip(row)
            .filter(|(header, _)| !is_index_column(header))
            .map(|(header, cell)| (header.clone(), cell_to_value(cell)))
            .collect();
        object
            .values()
            .any(|v| !v.is_null())
            .then_some(Value::Object(object))
    })
    .collect()
}

/// Rows of the first worksheet as JSON objects
pub fn read_sheet(path: &Path) -> Result<Vec<Value>> {
    let read_error = |e: &dyn std::fmt::Display| CarmsError::CatalogRead(format!("{}: {e}", path.display()));

    let mut workbook = open_workbook_auto(path).map_err(|e| read_error(&e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| read_error(&"workbook has no sheets"))?
        .map_err(|e| read_error(&e))?;

    let rows = rows_to_objects(range.rows());
    info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Program stream id from a `"<iteration>-<stream id>"` document id
fn stream_id_from_document(document_id: &str) -> &str {
    document_id
        .rsplit_once('-')
        .map_or(document_id, |(_, stream)| stream)
        .trim()
}

/// Sectioned descriptions as description rows
pub fn read_sectioned_descriptions<R: Read>(reader: R) -> Result<Vec<Value>> {
    let csv_error = |e: csv::Error| CarmsError::CatalogRead(format!("sectioned descriptions: {e}"));

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers().map_err(csv_error)?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);
    let document_col = column("document_id").ok_or_else(|| {
        CarmsError::CatalogRead("sectioned descriptions have no document_id column".to_string())
    })?;
    let section_cols: Vec<(usize, &str)> = SECTION_COLUMNS
        .iter()
        .filter_map(|(csv_name, field)| column(csv_name).map(|idx| (idx, *field)))
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping sectioned description line {}: {}", line + 2, e);
                continue;
            }
        };
        let Some(document_id) = record.get(document_col).map(str::trim).filter(|d| !d.is_empty())
        else {
            warn!("Skipping sectioned description line {}: no document id", line + 2);
            continue;
        };

        let sections: Map<String, Value> = section_cols
            .iter()
            .filter_map(|(idx, field)| {
                record
                    .get(*idx)
                    .filter(|text| !text.trim().is_empty())
                    .map(|text| ((*field).to_string(), Value::String(text.to_string())))
            })
            .collect();

        rows.push(serde_json::json!({
            "program_stream_id": stream_id_from_document(document_id),
            "document_id": document_id,
            "sections": sections,
        }));
    }
    Ok(rows)
}

fn require(dir: &Path, name: &str) -> Result<std::path::PathBuf> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(CarmsError::CatalogRead(format!(
            "{} not found in {}",
            name,
            dir.display()
        )))
    }
}

impl Catalog {
    /// Load the raw export files from `dir`
    pub fn from_raw_dir(dir: &Path) -> Result<Self> {
        let disciplines = read_sheet(&require(dir, DISCIPLINES_FILE)?)?;
        let programs = read_sheet(&require(dir, PROGRAM_MASTER_FILE)?)?;

        let sectioned = dir.join(SECTIONED_DESCRIPTIONS_FILE);
        let descriptions = if sectioned.is_file() {
            read_sectioned_descriptions(std::fs::File::open(&sectioned)?)?
        } else {
            warn!("{} not found; loading without sectioned descriptions", SECTIONED_DESCRIPTIONS_FILE);
            Vec::new()
        };

        let markdown = dir.join(MARKDOWN_DOCUMENTS_FILE);
        let markdown_documents: Vec<Value> = if markdown.is_file() {
            serde_json::from_str(&std::fs::read_to_string(&markdown)?)?
        } else {
            warn!("{} not found; loading without markdown documents", MARKDOWN_DOCUMENTS_FILE);
            Vec::new()
        };

        Ok(Self::from_raw(RawCatalog {
            disciplines,
            programs,
            descriptions,
            markdown_documents,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_to_value(&Data::Float(27447.0)), json!(27447));
        assert_eq!(cell_to_value(&Data::Float(2.5)), json!(2.5));
        assert_eq!(cell_to_value(&Data::Int(3)), json!(3));
        assert_eq!(cell_to_value(&text("  CMG ")), json!("CMG"));
        assert_eq!(cell_to_value(&text("   ")), Value::Null);
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
    }

    #[test]
    fn test_index_column_and_blank_rows_dropped() {
        let sheet = [
            vec![Data::Empty, text("discipline_id"), text("discipline")],
            vec![Data::Float(0.0), Data::Float(1.0), text("Anesthesiology")],
            vec![Data::Float(1.0), Data::Empty, Data::Empty],
            vec![Data::Float(2.0), Data::Float(2.0), text("Dermatology")],
        ];
        let rows = rows_to_objects(sheet.iter().map(Vec::as_slice));

        // the index cell alone does not keep a row alive
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], json!({"discipline_id": 1, "discipline": "Anesthesiology"}));
        assert!(rows[1].get("").is_none());
    }

    #[test]
    fn test_unnamed_header_is_dropped() {
        let sheet = [
            vec![text("Unnamed: 0"), text("discipline_id")],
            vec![Data::Float(7.0), Data::Float(4.0)],
        ];
        let rows = rows_to_objects(sheet.iter().map(Vec::as_slice));
        assert_eq!(rows, vec![json!({"discipline_id": 4})]);
    }

    #[test]
    fn test_sectioned_csv_maps_columns() {
        let csv = "\
,document_id,program_name,program_contracts,selection_criteria,unknown_column
0,1503-27447,Family Medicine,Dr. Smith,\"Rural interest, strong letters\",x
1,,Orphan,,,
2,1503-30000,Psychiatry,,,
";
        let rows = read_sectioned_descriptions(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            json!({
                "program_stream_id": "27447",
                "document_id": "1503-27447",
                "sections": {
                    "program_name_section": "Family Medicine",
                    "program_contacts": "Dr. Smith",
                    "selection_criteria": "Rural interest, strong letters"
                }
            })
        );
        assert_eq!(rows[1]["sections"], json!({"program_name_section": "Psychiatry"}));
    }

    #[test]
    fn test_csv_without_document_column_is_an_error() {
        let err = read_sectioned_descriptions("program_name\nX\n".as_bytes()).unwrap_err();
        assert!(matches!(err, CarmsError::CatalogRead(_)));
    }

    #[test]
    fn test_sheet_rows_decode_into_catalog() {
        let master = [
            vec![
                Data::Empty,
                text("program_stream_id"),
                text("discipline_id"),
                text("school_id"),
                text("school_name"),
                text("program_site"),
                text("program_stream"),
                text("program_name"),
                text("program_url"),
            ],
            vec![
                Data::Float(0.0),
                Data::Float(27447.0),
                Data::Float(1.0),
                Data::Float(8.0),
                text("University of British Columbia"),
                text("Prince George"),
                text("CMG"),
                text("Family Medicine - Prince George"),
                Data::Empty,
            ],
        ];
        let descriptions = read_sectioned_descriptions(
            "document_id,program_highlights\n1503-27447,Rural training\n".as_bytes(),
        )
        .unwrap();

        let catalog = Catalog::from_raw(RawCatalog {
            disciplines: vec![json!({"discipline_id": 1, "discipline": "Family Medicine"})],
            programs: rows_to_objects(master.iter().map(Vec::as_slice)),
            descriptions,
            markdown_documents: vec![json!({"id": "1503|27447", "page_content": "# FM"})],
        });

        assert_eq!(catalog.skipped, 0);
        let program = &catalog.programs[0];
        assert_eq!(program.program_stream_id, "27447");
        assert_eq!(program.school_source_id, "8");
        assert!(program.url.is_none());
        let description = &catalog.descriptions[0].description;
        assert_eq!(catalog.descriptions.len(), 1);
        assert_eq!(description.document_id.as_deref(), Some("1503-27447"));
        assert_eq!(description.full_markdown.as_deref(), Some("# FM"));
        assert_eq!(
            description.sections.program_highlights.as_deref(),
            Some("Rural training")
        );
    }

    #[test]
    fn test_missing_workbook_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = std::fs::File::create(dir.path().join(SECTIONED_DESCRIPTIONS_FILE)).unwrap();
        writeln!(csv, "document_id\n1503-1").unwrap();

        let err = Catalog::from_raw_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains(DISCIPLINES_FILE));
    }

    #[test]
    fn test_from_path_dispatches_on_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Catalog::from_path(dir.path()),
            Err(CarmsError::CatalogRead(_))
        ));
    }
}
