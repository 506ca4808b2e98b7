use super::Database;
use crate::CarmsError;
use crate::Result;

const REQUIRED_TABLES: [&str; 5] = [
    "disciplines",
    "schools",
    "programs",
    "program_descriptions",
    "program_embeddings",
];

/// DDL for the catalog and the vector store, `IF NOT EXISTS` throughout
pub fn schema_statements(dimension: usize) -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        r"
        CREATE TABLE IF NOT EXISTS disciplines (
            id BIGINT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )"
        .to_string(),
        r"
        CREATE TABLE IF NOT EXISTS schools (
            id BIGSERIAL PRIMARY KEY,
            source_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL UNIQUE
        )"
        .to_string(),
        r"
        CREATE TABLE IF NOT EXISTS programs (
            id BIGSERIAL PRIMARY KEY,
            discipline_id BIGINT NOT NULL REFERENCES disciplines(id),
            school_id BIGINT NOT NULL REFERENCES schools(id),
            program_stream_id TEXT NOT NULL UNIQUE,
            site TEXT NOT NULL,
            stream TEXT NOT NULL,
            name TEXT NOT NULL,
            url TEXT
        )"
        .to_string(),
        "CREATE INDEX IF NOT EXISTS ix_programs_discipline_id ON programs (discipline_id)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS ix_programs_school_id ON programs (school_id)".to_string(),
        r"
        CREATE TABLE IF NOT EXISTS program_descriptions (
            id BIGSERIAL PRIMARY KEY,
            program_id BIGINT NOT NULL UNIQUE REFERENCES programs(id),
            document_id TEXT,
            program_name_section TEXT,
            match_iteration_name TEXT,
            program_contacts TEXT,
            general_instructions TEXT,
            supporting_documentation_information TEXT,
            review_process TEXT,
            interviews TEXT,
            selection_criteria TEXT,
            program_highlights TEXT,
            program_curriculum TEXT,
            training_sites TEXT,
            additional_information TEXT,
            return_of_service TEXT,
            faq TEXT,
            summary_of_changes TEXT,
            full_markdown TEXT
        )"
        .to_string(),
        format!(
            r"
        CREATE TABLE IF NOT EXISTS program_embeddings (
            id BIGSERIAL PRIMARY KEY,
            program_id BIGINT NOT NULL REFERENCES programs(id),
            description_id BIGINT NOT NULL REFERENCES program_descriptions(id),
            chunk_index INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            embedding vector({dimension}) NOT NULL,
            UNIQUE (description_id, chunk_index)
        )"
        ),
        "CREATE INDEX IF NOT EXISTS ix_program_embeddings_program_id ON program_embeddings (program_id)"
            .to_string(),
        r"
        CREATE INDEX IF NOT EXISTS ix_program_embeddings_hnsw
        ON program_embeddings
        USING hnsw (embedding vector_cosine_ops)
        WITH (m = 16, ef_construction = 64)"
            .to_string(),
    ]
}

impl Database {
    /// Create every table and index
    pub async fn init_schema(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(CarmsError::ConfigError(
                "Embedding dimension must be positive".to_string(),
            ));
        }

        for statement in schema_statements(dimension) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }

        if let Some(existing) = self.stored_embedding_dimension().await? {
            if existing != dimension {
                return Err(CarmsError::DimensionMismatch {
                    expected: existing,
                    actual: dimension,
                });
            }
        }

        tracing::info!("Schema initialized (embedding dimension {})", dimension);
        Ok(())
    }

    /// Check if database schema is initialized
    pub async fn is_schema_initialized(&self) -> Result<bool> {
        for table_name in REQUIRED_TABLES {
            let exists = sqlx::query_scalar::<_, bool>(
                r"
                SELECT EXISTS (
                    SELECT FROM information_schema.tables
                    WHERE table_schema = 'public'
                    AND table_name = $1
                )
                ",
            )
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                tracing::debug!("Missing required table: {}", table_name);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Verify database schema or return helpful error
    pub async fn verify_schema_or_error(&self) -> Result<()> {
        if self.is_schema_initialized().await? {
            Ok(())
        } else {
            Err(CarmsError::ConfigError(
                "Database schema is not initialized. Run `carms-explorer init` first.".to_string(),
            ))
        }
    }

    /// Declared dimension of `program_embeddings.embedding`, if the table exists
    pub async fn stored_embedding_dimension(&self) -> Result<Option<usize>> {
        // pgvector stores the dimension as the column typmod
        let typmod = sqlx::query_scalar::<_, i32>(
            r"
            SELECT a.atttypmod
            FROM pg_attribute a
            WHERE a.attrelid = to_regclass('public.program_embeddings')
              AND a.attname = 'embedding'
              AND NOT a.attisdropped
            ",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(typmod.filter(|t| *t > 0).map(|t| t as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_uses_configured_dimension() {
        let statements = schema_statements(384);
        assert!(statements.iter().any(|s| s.contains("vector(384)")));
        assert!(statements
            .iter()
            .any(|s| s.contains("vector_cosine_ops") && s.contains("ef_construction = 64")));
    }

    #[test]
    fn test_schema_is_idempotent_ddl() {
        for statement in schema_statements(8) {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "statement is not idempotent: {statement}"
            );
        }
    }
}
