use super::Database;
use crate::models::AnalyticsOverview;
use crate::models::DisciplineAnalytics;
use crate::models::DisciplineCoverageRow;
use crate::models::DisciplineSummaryRow;
use crate::models::SchoolAnalytics;
use crate::models::SiteAnalytics;
use crate::Result;

impl Database {
    /// Row counts across the catalog and the vector store
    pub async fn analytics_overview(&self) -> Result<AnalyticsOverview> {
        let (total_programs, total_disciplines, total_schools, total_embeddings) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r"
                SELECT
                    (SELECT COUNT(*) FROM programs),
                    (SELECT COUNT(*) FROM disciplines),
                    (SELECT COUNT(*) FROM schools),
                    (SELECT COUNT(*) FROM program_embeddings)
                ",
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(AnalyticsOverview {
            total_programs,
            total_disciplines,
            total_schools,
            total_embeddings,
        })
    }

    /// Program count by discipline, descending; `limit` of `None` returns all
    pub async fn programs_by_discipline(&self, limit: Option<i64>) -> Result<Vec<DisciplineAnalytics>> {
        let rows = sqlx::query_as::<_, DisciplineAnalytics>(
            r"
            SELECT d.name AS discipline, COUNT(p.id) AS program_count
            FROM disciplines d
            JOIN programs p ON p.discipline_id = d.id
            GROUP BY d.name
            ORDER BY program_count DESC, d.name
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Program count by school, descending
    pub async fn programs_by_school(&self) -> Result<Vec<SchoolAnalytics>> {
        let rows = sqlx::query_as::<_, SchoolAnalytics>(
            r"
            SELECT s.name AS school, COUNT(p.id) AS program_count
            FROM schools s
            JOIN programs p ON p.school_id = s.id
            GROUP BY s.name
            ORDER BY program_count DESC, s.name
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Sites hosting the most programs
    pub async fn top_sites(&self, limit: i64) -> Result<Vec<SiteAnalytics>> {
        let rows = sqlx::query_as::<_, SiteAnalytics>(
            r"
            SELECT site, COUNT(*) AS program_count
            FROM programs
            GROUP BY site
            ORDER BY program_count DESC, site
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Discipline summary report rows, largest disciplines first
    pub async fn discipline_summary(&self) -> Result<Vec<DisciplineSummaryRow>> {
        let rows = sqlx::query_as::<_, DisciplineSummaryRow>(
            r"
            SELECT
                d.name AS discipline,
                COUNT(p.id) AS total_programs,
                COUNT(p.id) FILTER (WHERE p.stream ILIKE '%CMG%') AS cmg_programs,
                COUNT(p.id) FILTER (WHERE p.stream ILIKE '%IMG%') AS img_programs,
                ROUND(100.0 * COUNT(pd.id) / COUNT(p.id), 1)::float8 AS description_coverage_pct
            FROM disciplines d
            JOIN programs p ON p.discipline_id = d.id
            LEFT JOIN program_descriptions pd ON pd.program_id = p.id
            GROUP BY d.name
            ORDER BY total_programs DESC, d.name
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Program gap analysis rows: schools offering each discipline out of
    /// all schools with at least one program, best covered first
    pub async fn discipline_coverage(&self) -> Result<Vec<DisciplineCoverageRow>> {
        let rows = sqlx::query_as::<_, DisciplineCoverageRow>(
            r"
            WITH offered AS (
                SELECT DISTINCT discipline_id, school_id FROM programs
            ),
            total AS (
                SELECT COUNT(DISTINCT school_id) AS n FROM programs
            )
            SELECT
                d.name AS discipline,
                COUNT(o.school_id) AS schools_offering,
                t.n AS total_schools,
                ROUND(100.0 * COUNT(o.school_id) / t.n, 1)::float8 AS coverage_pct
            FROM offered o
            JOIN disciplines d ON d.id = o.discipline_id
            CROSS JOIN total t
            GROUP BY d.name, t.n
            ORDER BY coverage_pct DESC, d.name
            ",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
