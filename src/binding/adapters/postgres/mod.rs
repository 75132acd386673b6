//! `PostgreSQL` adapters for repository bindings.

mod directory;
mod models;
mod schema;

pub use directory::{BindingPgPool, PostgresBindingDirectory};
