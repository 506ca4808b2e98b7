//! Catalog ingestion: read a JSON catalog or the raw CaRMS exports and
//! stage them into the database
//!
//! Embedding the staged descriptions is a separate step, see
//! [`crate::embeddings::rebuild_embeddings`].

pub mod catalog;
pub mod raw;
pub mod staging;

pub use catalog::Catalog;
pub use catalog::CatalogDescription;
pub use catalog::DisciplineRow;
pub use staging::stage_catalog;
pub use staging::StagingStats;
