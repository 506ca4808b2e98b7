//! REST API over the catalog, search, RAG and agent services

pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;

pub use handlers::AppState;
pub use server::build_state;
pub use server::serve_api;
