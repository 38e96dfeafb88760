//! Log database migrations - embedded SQL files for logs.duckdb

/// All log migrations, as (filename, sql)
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
