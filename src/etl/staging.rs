//! Upsert a parsed catalog into PostgreSQL
//!
//! Order matters: disciplines, then schools, then programs, then
//! descriptions, so every foreign key resolves. Re-running over the same
//! catalog is idempotent.

use std::collections::HashMap;
use std::time::Instant;

use tracing::info;
use tracing::warn;

use super::Catalog;
use crate::database::Database;
use crate::errors::Result;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StagingStats {
    pub disciplines: usize,
    pub schools: usize,
    pub programs: usize,
    pub descriptions: usize,
    /// Descriptions whose program stream id is not in the catalog
    pub orphaned_descriptions: usize,
}

/// Schools deduplicated by name, keeping the first source id seen
pub fn unique_schools(catalog: &Catalog) -> Vec<(String, String)> {
    let mut seen = std::collections::HashSet::new();
    catalog
        .programs
        .iter()
        .filter(|p| seen.insert(p.school_name.clone()))
        .map(|p| (p.school_source_id.clone(), p.school_name.clone()))
        .collect()
}

pub async fn stage_catalog(db: &Database, catalog: &Catalog) -> Result<StagingStats> {
    let start = Instant::now();
    let mut stats = StagingStats::default();

    for discipline in &catalog.disciplines {
        db.upsert_discipline(discipline.discipline_id, &discipline.discipline)
            .await?;
        stats.disciplines += 1;
    }
    info!("Upserted {} disciplines", stats.disciplines);

    let mut school_ids: HashMap<String, i64> = HashMap::new();
    for (source_id, name) in unique_schools(catalog) {
        let id = db.upsert_school(&source_id, &name).await?;
        school_ids.insert(name, id);
        stats.schools += 1;
    }
    info!("Upserted {} schools", stats.schools);

    let mut program_ids: HashMap<&str, i64> = HashMap::new();
    for program in &catalog.programs {
        let Some(school_id) = school_ids.get(&program.school_name) else {
            warn!("School not found for name={}", program.school_name);
            continue;
        };
        let id = db.upsert_program(program, *school_id).await?;
        program_ids.insert(program.program_stream_id.as_str(), id);
        stats.programs += 1;
    }
    info!("Upserted {} programs", stats.programs);

    for entry in &catalog.descriptions {
        let Some(program_id) = program_ids.get(entry.program_stream_id.as_str()) else {
            warn!(
                "No program for description with stream id {}",
                entry.program_stream_id
            );
            stats.orphaned_descriptions += 1;
            continue;
        };
        db.upsert_description(*program_id, &entry.description).await?;
        stats.descriptions += 1;
    }

    info!(
        "Staged catalog in {:.2}s: {} descriptions ({} orphaned)",
        start.elapsed().as_secs_f64(),
        stats.descriptions,
        stats.orphaned_descriptions
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NewProgram;

    fn program(stream: &str, source: &str, school: &str) -> NewProgram {
        NewProgram {
            program_stream_id: stream.to_string(),
            discipline_id: 1,
            school_source_id: source.to_string(),
            school_name: school.to_string(),
            site: "Toronto".to_string(),
            stream: "CMG".to_string(),
            name: format!("Program {stream}"),
            url: None,
        }
    }

    #[test]
    fn test_unique_schools_keeps_first_source_id() {
        let catalog = Catalog {
            programs: vec![
                program("1", "10", "University of Toronto"),
                program("2", "11", "McGill University"),
                program("3", "12", "University of Toronto"),
            ],
            ..Default::default()
        };
        assert_eq!(
            unique_schools(&catalog),
            vec![
                ("10".to_string(), "University of Toronto".to_string()),
                ("11".to_string(), "McGill University".to_string()),
            ]
        );
    }
}
