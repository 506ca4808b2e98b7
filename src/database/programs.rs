use serde::Deserialize;
use serde::Serialize;

use super::like_pattern;
use super::Database;
use crate::models::DescriptionOut;
use crate::models::DescriptionSections;
use crate::models::DisciplineWithCount;
use crate::models::ProgramComparison;
use crate::models::ProgramDescription;
use crate::models::ProgramDetail;
use crate::models::ProgramListQuery;
use crate::models::ProgramNameFilter;
use crate::models::ProgramSummary;
use crate::models::SchoolWithCount;
use crate::models::SearchFilters;
use crate::Result;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;
pub const FILTER_TOOL_LIMIT: i64 = 50;

const PROGRAM_SUMMARY_SELECT: &str = r"
    SELECT p.id, p.name, d.name AS discipline, s.name AS school, p.site, p.stream, p.url
    FROM programs p
    JOIN disciplines d ON d.id = p.discipline_id
    JOIN schools s ON s.id = p.school_id
";

/// Program as read from the catalog file, before school ids are resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProgram {
    pub program_stream_id: String,
    pub discipline_id: i64,
    pub school_source_id: String,
    pub school_name: String,
    pub site: String,
    pub stream: String,
    pub name: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDescription {
    pub document_id: Option<String>,
    pub sections: DescriptionSections,
    pub full_markdown: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BindValue {
    Int(i64),
    Text(String),
}

/// Conjunctive WHERE clause with positional parameters starting after `offset`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FilterClause {
    conditions: Vec<String>,
    pub(crate) binds: Vec<BindValue>,
}

impl FilterClause {
    fn push(&mut self, offset: usize, template: &str, value: BindValue) {
        let idx = offset + self.binds.len() + 1;
        self.conditions.push(template.replace("{}", &format!("${idx}")));
        self.binds.push(value);
    }

    /// Structured search filters: ids match exactly, site is a case-insensitive substring
    pub(crate) fn for_search(filters: &SearchFilters, offset: usize) -> Self {
        let mut clause = Self::default();
        if let Some(id) = filters.discipline_id {
            clause.push(offset, "p.discipline_id = {}", BindValue::Int(id));
        }
        if let Some(id) = filters.school_id {
            clause.push(offset, "p.school_id = {}", BindValue::Int(id));
        }
        if let Some(site) = filters.site.as_deref().filter(|s| !s.trim().is_empty()) {
            clause.push(offset, "p.site ILIKE {}", BindValue::Text(like_pattern(site)));
        }
        clause
    }

    fn for_listing(query: &ProgramListQuery) -> Self {
        let filters = SearchFilters {
            discipline_id: query.discipline_id,
            school_id: query.school_id,
            site: query.site.clone(),
        };
        let mut clause = Self::for_search(&filters, 0);
        if let Some(q) = query.q.as_deref().filter(|s| !s.trim().is_empty()) {
            clause.push(0, "p.name ILIKE {}", BindValue::Text(like_pattern(q)));
        }
        clause
    }

    fn for_names(filter: &ProgramNameFilter) -> Self {
        let mut clause = Self::default();
        let fields = [
            ("d.name ILIKE {}", &filter.discipline),
            ("s.name ILIKE {}", &filter.school),
            ("p.site ILIKE {}", &filter.site),
            ("p.stream ILIKE {}", &filter.stream),
        ];
        for (template, value) in fields {
            if let Some(v) = value.as_deref().filter(|s| !s.trim().is_empty()) {
                clause.push(0, template, BindValue::Text(like_pattern(v)));
            }
        }
        clause
    }

    pub(crate) fn where_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub(crate) fn next_param(&self, offset: usize) -> usize {
        offset + self.binds.len() + 1
    }
}

pub(crate) fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

macro_rules! bind_all {
    ($query:expr, $binds:expr) => {{
        let mut q = $query;
        for value in $binds {
            q = match value {
                BindValue::Int(v) => q.bind(*v),
                BindValue::Text(v) => q.bind(v.clone()),
            };
        }
        q
    }};
}
pub(crate) use bind_all;

impl Database {
    /// Insert or rename a discipline
    pub async fn upsert_discipline(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO disciplines (id, name) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name
            ",
        )
        .bind(id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a school by name, keeping the first source id seen; returns its row id
    pub async fn upsert_school(&self, source_id: &str, name: &str) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO schools (source_id, name) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            ",
        )
        .bind(source_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Insert or update a program keyed by `program_stream_id`
    pub async fn upsert_program(&self, program: &NewProgram, school_id: i64) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO programs (discipline_id, school_id, program_stream_id, site, stream, name, url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (program_stream_id) DO UPDATE SET
                discipline_id = EXCLUDED.discipline_id,
                school_id = EXCLUDED.school_id,
                site = EXCLUDED.site,
                stream = EXCLUDED.stream,
                name = EXCLUDED.name,
                url = EXCLUDED.url
            RETURNING id
            ",
        )
        .bind(program.discipline_id)
        .bind(school_id)
        .bind(&program.program_stream_id)
        .bind(&program.site)
        .bind(&program.stream)
        .bind(&program.name)
        .bind(&program.url)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Insert or replace the description of a program; returns its row id
    pub async fn upsert_description(
        &self,
        program_id: i64,
        description: &NewDescription,
    ) -> Result<i64> {
        let columns = DescriptionSections::COLUMNS.join(", ");
        let placeholders = (0..DescriptionSections::COLUMNS.len())
            .map(|i| format!("${}", i + 4))
            .collect::<Vec<_>>()
            .join(", ");
        let updates = DescriptionSections::COLUMNS
            .iter()
            .chain(["document_id", "full_markdown"].iter())
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO program_descriptions (program_id, document_id, full_markdown, {columns}) \
             VALUES ($1, $2, $3, {placeholders}) \
             ON CONFLICT (program_id) DO UPDATE SET {updates} \
             RETURNING id"
        );

        let mut query = sqlx::query_scalar::<_, i64>(&sql)
            .bind(program_id)
            .bind(&description.document_id)
            .bind(&description.full_markdown);
        for value in description.sections.values() {
            query = query.bind(value.map(str::to_string));
        }

        Ok(query.fetch_one(&self.pool).await?)
    }

    /// Programs ordered by name with optional filters and paging
    pub async fn list_programs(&self, query: &ProgramListQuery) -> Result<Vec<ProgramSummary>> {
        let clause = FilterClause::for_listing(query);
        let limit_idx = clause.next_param(0);
        let sql = format!(
            "{PROGRAM_SUMMARY_SELECT} {} ORDER BY p.name LIMIT ${} OFFSET ${}",
            clause.where_sql(),
            limit_idx,
            limit_idx + 1
        );

        let q = bind_all!(sqlx::query_as::<_, ProgramSummary>(&sql), &clause.binds);
        let programs = q
            .bind(clamp_limit(query.limit))
            .bind(query.offset.unwrap_or(0).max(0))
            .fetch_all(&self.pool)
            .await?;

        Ok(programs)
    }

    pub async fn get_program_summary(&self, id: i64) -> Result<Option<ProgramSummary>> {
        let sql = format!("{PROGRAM_SUMMARY_SELECT} WHERE p.id = $1");
        let program = sqlx::query_as::<_, ProgramSummary>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(program)
    }

    pub async fn get_description(&self, program_id: i64) -> Result<Option<ProgramDescription>> {
        let description = sqlx::query_as::<_, ProgramDescription>(
            "SELECT * FROM program_descriptions WHERE program_id = $1",
        )
        .bind(program_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(description)
    }

    /// Program with its description, `None` if the id is unknown
    pub async fn get_program_detail(&self, id: i64) -> Result<Option<ProgramDetail>> {
        let Some(program) = self.get_program_summary(id).await? else {
            return Ok(None);
        };
        let description = self.get_description(id).await?.map(DescriptionOut::from);
        Ok(Some(ProgramDetail {
            program,
            description,
        }))
    }

    /// Disciplines with their program counts, ordered by name
    pub async fn list_disciplines(&self) -> Result<Vec<DisciplineWithCount>> {
        let rows = sqlx::query_as::<_, DisciplineWithCount>(
            r"
            SELECT d.id, d.name, COUNT(p.id) AS program_count
            FROM disciplines d
            LEFT JOIN programs p ON p.discipline_id = d.id
            GROUP BY d.id, d.name
            ORDER BY d.name
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Schools with their program counts, largest first
    pub async fn list_schools(&self) -> Result<Vec<SchoolWithCount>> {
        let rows = sqlx::query_as::<_, SchoolWithCount>(
            r"
            SELECT s.id, s.name, COUNT(p.id) AS program_count
            FROM schools s
            LEFT JOIN programs p ON p.school_id = s.id
            GROUP BY s.id, s.name
            ORDER BY program_count DESC, s.name
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Programs whose discipline, school, site and stream names contain the given fragments
    pub async fn filter_programs(&self, filter: &ProgramNameFilter) -> Result<Vec<ProgramSummary>> {
        let clause = FilterClause::for_names(filter);
        let sql = format!(
            "{PROGRAM_SUMMARY_SELECT} {} ORDER BY p.name LIMIT {FILTER_TOOL_LIMIT}",
            clause.where_sql()
        );
        let q = bind_all!(sqlx::query_as::<_, ProgramSummary>(&sql), &clause.binds);
        Ok(q.fetch_all(&self.pool).await?)
    }

    /// Key selection fields for several programs, in the order requested
    pub async fn compare_programs(&self, ids: &[i64]) -> Result<Vec<ProgramComparison>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProgramComparison>(
            r"
            SELECT p.id, p.name, d.name AS discipline, s.name AS school, p.site, p.stream,
                   pd.selection_criteria, pd.program_highlights, pd.interviews
            FROM programs p
            JOIN disciplines d ON d.id = p.discipline_id
            JOIN schools s ON s.id = p.school_id
            LEFT JOIN program_descriptions pd ON pd.program_id = p.id
            WHERE p.id = ANY($1)
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut ordered = rows;
        ordered.sort_by_key(|r| ids.iter().position(|id| *id == r.id).unwrap_or(usize::MAX));
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_clause_numbers_params_after_offset() {
        let filters = SearchFilters {
            discipline_id: Some(3),
            school_id: None,
            site: Some("toronto".to_string()),
        };
        let clause = FilterClause::for_search(&filters, 1);
        assert_eq!(
            clause.where_sql(),
            "WHERE p.discipline_id = $2 AND p.site ILIKE $3"
        );
        assert_eq!(
            clause.binds,
            vec![BindValue::Int(3), BindValue::Text("%toronto%".to_string())]
        );
        assert_eq!(clause.next_param(1), 4);
    }

    #[test]
    fn test_empty_filters_produce_no_where() {
        let clause = FilterClause::for_search(&SearchFilters::default(), 1);
        assert_eq!(clause.where_sql(), "");
        assert_eq!(clause.next_param(1), 2);
    }

    #[test]
    fn test_listing_adds_name_substring() {
        let query = ProgramListQuery {
            school_id: Some(4),
            q: Some("surgery".to_string()),
            ..Default::default()
        };
        let clause = FilterClause::for_listing(&query);
        assert_eq!(clause.where_sql(), "WHERE p.school_id = $1 AND p.name ILIKE $2");
    }

    #[test]
    fn test_name_filter_skips_blank_fields() {
        let filter = ProgramNameFilter {
            discipline: Some("Family".to_string()),
            school: Some("  ".to_string()),
            site: None,
            stream: Some("IMG".to_string()),
        };
        let clause = FilterClause::for_names(&filter);
        assert_eq!(clause.where_sql(), "WHERE d.name ILIKE $1 AND p.stream ILIKE $2");
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), MAX_LIST_LIMIT);
        assert_eq!(clamp_limit(Some(25)), 25);
    }
}
