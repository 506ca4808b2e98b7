//! Named tabular reports over the catalog
//!
//! Each report is one aggregate query; the registry maps a stable name to
//! its title, description and column list so clients can discover reports
//! before generating them.

use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::database::Database;
use crate::errors::CarmsError;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    DisciplineSummary,
    ProgramGapAnalysis,
}

impl ReportKind {
    pub const ALL: [Self; 2] = [Self::DisciplineSummary, Self::ProgramGapAnalysis];

    pub const fn name(self) -> &'static str {
        match self {
            Self::DisciplineSummary => "discipline_summary",
            Self::ProgramGapAnalysis => "program_gap_analysis",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::DisciplineSummary => "Discipline Summary",
            Self::ProgramGapAnalysis => "Program Gap Analysis",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::DisciplineSummary => {
                "Program count by discipline with CMG/IMG stream breakdown and description coverage percentage."
            }
            Self::ProgramGapAnalysis => {
                "Per-discipline coverage across schools: how many schools offer each discipline and the coverage percentage."
            }
        }
    }

    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::DisciplineSummary => &[
                "discipline",
                "total_programs",
                "cmg_programs",
                "img_programs",
                "description_coverage_pct",
            ],
            Self::ProgramGapAnalysis => &[
                "discipline",
                "schools_offering",
                "total_schools",
                "coverage_pct",
            ],
        }
    }

    pub fn info(self) -> ReportInfo {
        ReportInfo {
            name: self.name().to_string(),
            title: self.title().to_string(),
            description: self.description().to_string(),
        }
    }
}

impl FromStr for ReportKind {
    type Err = CarmsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or_else(|| CarmsError::ReportNotFound(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportInfo {
    pub name: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub name: String,
    pub title: String,
    pub description: String,
    /// RFC 3339, UTC
    pub generated_at: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// A generated report: metadata plus one JSON object per row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub data: Vec<serde_json::Value>,
}

impl Report {
    fn from_rows<T: Serialize>(kind: ReportKind, rows: &[T]) -> Result<Self> {
        let data = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            metadata: ReportMetadata {
                name: kind.name().to_string(),
                title: kind.title().to_string(),
                description: kind.description().to_string(),
                generated_at: chrono::Utc::now().to_rfc3339(),
                row_count: data.len(),
                columns: kind.columns().iter().map(|c| (*c).to_string()).collect(),
            },
            data,
        })
    }
}

pub fn list_reports() -> Vec<ReportInfo> {
    ReportKind::ALL.into_iter().map(ReportKind::info).collect()
}

pub async fn generate_report(db: &Database, kind: ReportKind) -> Result<Report> {
    match kind {
        ReportKind::DisciplineSummary => Report::from_rows(kind, &db.discipline_summary().await?),
        ReportKind::ProgramGapAnalysis => {
            Report::from_rows(kind, &db.discipline_coverage().await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DisciplineCoverageRow;
    use crate::models::DisciplineSummaryRow;

    #[test]
    fn test_registry_lookup() {
        assert_eq!(
            "discipline_summary".parse::<ReportKind>().unwrap(),
            ReportKind::DisciplineSummary
        );
        assert_eq!(
            "program_gap_analysis".parse::<ReportKind>().unwrap(),
            ReportKind::ProgramGapAnalysis
        );
        assert!(matches!(
            "school_coverage".parse::<ReportKind>(),
            Err(CarmsError::ReportNotFound(name)) if name == "school_coverage"
        ));
    }

    #[test]
    fn test_list_reports_names() {
        let names: Vec<String> = list_reports().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["discipline_summary", "program_gap_analysis"]);
    }

    #[test]
    fn test_rows_match_declared_columns() {
        let summary = Report::from_rows(
            ReportKind::DisciplineSummary,
            &[DisciplineSummaryRow {
                discipline: "Anesthesiology".to_string(),
                total_programs: 4,
                cmg_programs: 3,
                img_programs: 1,
                description_coverage_pct: 75.0,
            }],
        )
        .unwrap();
        let coverage = Report::from_rows(
            ReportKind::ProgramGapAnalysis,
            &[DisciplineCoverageRow {
                discipline: "Anesthesiology".to_string(),
                schools_offering: 2,
                total_schools: 4,
                coverage_pct: 50.0,
            }],
        )
        .unwrap();

        for report in [summary, coverage] {
            assert_eq!(report.metadata.row_count, 1);
            let mut keys: Vec<&String> = report.data[0].as_object().unwrap().keys().collect();
            let mut columns: Vec<&String> = report.metadata.columns.iter().collect();
            keys.sort();
            columns.sort();
            assert_eq!(keys, columns);
        }
    }

    #[test]
    fn test_empty_report_keeps_columns() {
        let report =
            Report::from_rows::<DisciplineCoverageRow>(ReportKind::ProgramGapAnalysis, &[]).unwrap();
        assert_eq!(report.metadata.row_count, 0);
        assert_eq!(report.metadata.columns.len(), 4);
        assert!(report.data.is_empty());
    }
}
