//! Relational schema of the authentication-enabled web application.
//!
//! - `db::schema`: diesel table declarations used by the query builder.
//! - `db::catalog`: static table metadata, validated at startup.
//! - `db::{posts, users, accounts, sessions}`: row types and repositories.
//! - `config::database`: connection pool, embedded migrations, health check.
//! - `utils`: errors, structured logging and metrics.

pub mod config;
pub mod db;
pub mod utils;
