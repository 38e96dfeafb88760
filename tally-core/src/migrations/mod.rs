//! Database migrations - embedded SQL files
//!
//! Migrations are compiled into the binary with include_str! and applied
//! in name order by [`crate::services::MigrationService`].

/// All migrations of tally.duckdb, as (filename, sql)
///
/// New migrations get the next NNN_ prefix and are appended here.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
