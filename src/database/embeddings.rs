use pgvector::Vector;

use super::programs::bind_all;
use super::programs::BindValue;
use super::programs::FilterClause;
use super::Database;
use crate::models::NewChunk;
use crate::models::ProgramDescription;
use crate::models::SearchFilters;
use crate::models::SearchResult;
use crate::CarmsError;
use crate::Result;

/// Postgres caps bind parameters per statement at 65535; 5 per row
const INSERT_ROWS_PER_STATEMENT: usize = 1000;

/// Description text to be chunked and embedded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSource {
    pub description_id: i64,
    pub program_id: i64,
    pub text: String,
}

impl From<ProgramDescription> for EmbeddingSource {
    fn from(d: ProgramDescription) -> Self {
        let text = d.embeddable_text();
        Self {
            description_id: d.id,
            program_id: d.program_id,
            text,
        }
    }
}

/// Fail fast if any vector does not match the configured column dimension
pub fn check_dimensions(chunks: &[NewChunk], expected: usize) -> Result<()> {
    match chunks.iter().find(|c| c.embedding.len() != expected) {
        Some(bad) => Err(CarmsError::DimensionMismatch {
            expected,
            actual: bad.embedding.len(),
        }),
        None => Ok(()),
    }
}

async fn insert_chunk_rows(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    chunks: &[NewChunk],
) -> Result<u64> {
    let mut inserted = 0;
    for rows in chunks.chunks(INSERT_ROWS_PER_STATEMENT) {
        let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "INSERT INTO program_embeddings (program_id, description_id, chunk_index, chunk_text, embedding) ",
        );
        builder.push_values(rows, |mut b, chunk| {
            b.push_bind(chunk.program_id)
                .push_bind(chunk.description_id)
                .push_bind(chunk.chunk_index)
                .push_bind(chunk.chunk_text.clone())
                .push_bind(Vector::from(chunk.embedding.clone()));
        });
        let result = builder.build().execute(&mut **tx).await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

impl Database {
    /// Every description with the text that should be embedded for it
    pub async fn list_embedding_sources(&self) -> Result<Vec<EmbeddingSource>> {
        let descriptions = sqlx::query_as::<_, ProgramDescription>(
            "SELECT * FROM program_descriptions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(descriptions.into_iter().map(EmbeddingSource::from).collect())
    }

    pub async fn get_embedding_source(&self, description_id: i64) -> Result<Option<EmbeddingSource>> {
        let description = sqlx::query_as::<_, ProgramDescription>(
            "SELECT * FROM program_descriptions WHERE id = $1",
        )
        .bind(description_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(description.map(EmbeddingSource::from))
    }

    /// Remove every chunk in the corpus
    pub async fn delete_all_chunks(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM program_embeddings")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Insert one batch of chunks in its own transaction
    pub async fn insert_chunk_batch(&self, chunks: &[NewChunk], dimension: usize) -> Result<u64> {
        check_dimensions(chunks, dimension)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let inserted = insert_chunk_rows(&mut tx, chunks).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    /// Replace all chunks of one description atomically
    pub async fn replace_description_chunks(
        &self,
        description_id: i64,
        chunks: &[NewChunk],
        dimension: usize,
    ) -> Result<u64> {
        check_dimensions(chunks, dimension)?;
        if let Some(foreign) = chunks.iter().find(|c| c.description_id != description_id) {
            return Err(CarmsError::InvalidInput(format!(
                "chunk belongs to description {} not {}",
                foreign.description_id, description_id
            )));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM program_embeddings WHERE description_id = $1")
            .bind(description_id)
            .execute(&mut *tx)
            .await?;

        let inserted = insert_chunk_rows(&mut tx, chunks).await?;

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn count_chunks(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM program_embeddings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Chunk texts of one description in ordinal order
    pub async fn chunk_texts(&self, description_id: i64) -> Result<Vec<(i32, String)>> {
        let rows = sqlx::query_as::<_, (i32, String)>(
            "SELECT chunk_index, chunk_text FROM program_embeddings WHERE description_id = $1 ORDER BY chunk_index",
        )
        .bind(description_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Nearest chunks by cosine distance; filters are applied before ranking
    pub async fn semantic_search(
        &self,
        query_embedding: &[f32],
        filters: &SearchFilters,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        let clause = FilterClause::for_search(filters, 1);
        let limit_idx = clause.next_param(1);

        let sql = format!(
            r"
            SELECT
                p.id AS program_id,
                p.name AS program_name,
                d.name AS discipline,
                s.name AS school,
                p.site,
                p.stream,
                pe.chunk_text,
                1 - (pe.embedding <=> $1::vector) AS similarity,
                p.url
            FROM program_embeddings pe
            JOIN programs p ON p.id = pe.program_id
            JOIN disciplines d ON d.id = p.discipline_id
            JOIN schools s ON s.id = p.school_id
            {}
            ORDER BY pe.embedding <=> $1::vector
            LIMIT ${limit_idx}
            ",
            clause.where_sql()
        );

        let q = sqlx::query_as::<_, SearchResult>(&sql).bind(Vector::from(query_embedding.to_vec()));
        let q = bind_all!(q, &clause.binds);
        let results = q.bind(limit).fetch_all(&self.pool).await?;

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(dim: usize) -> NewChunk {
        NewChunk {
            program_id: 1,
            description_id: 1,
            chunk_index: 0,
            chunk_text: "text".to_string(),
            embedding: vec![0.0; dim],
        }
    }

    #[test]
    fn test_check_dimensions_accepts_matching() {
        assert!(check_dimensions(&[chunk(4), chunk(4)], 4).is_ok());
        assert!(check_dimensions(&[], 4).is_ok());
    }

    #[test]
    fn test_check_dimensions_rejects_mixed() {
        let err = check_dimensions(&[chunk(4), chunk(3)], 4).unwrap_err();
        assert!(matches!(
            err,
            CarmsError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_embedding_source_uses_embeddable_text() {
        let description = ProgramDescription {
            id: 11,
            program_id: 5,
            full_markdown: Some("Excellent rural training in family medicine".to_string()),
            ..Default::default()
        };
        let source = EmbeddingSource::from(description);
        assert_eq!(source.description_id, 11);
        assert_eq!(source.program_id, 5);
        assert_eq!(source.text, "Excellent rural training in family medicine");
    }
}
