//! Postgres table schemas.
//!
//! `teams` and `apps` are created only if missing so a fresh database (local
//! development, container tests) can run the processor end to end.
//! `{schema}` is replaced with the configured schema name.

pub const CREATE_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS {schema}";

pub const CREATE_TEAMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {schema}.teams (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

pub const CREATE_APPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {schema}.apps (
    id UUID PRIMARY KEY,
    team_id UUID NOT NULL REFERENCES {schema}.teams(id) ON DELETE CASCADE,
    app_name TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// One row per (team, app). Each timestamp is the end of the last window
/// whose results were durably written.
pub const CREATE_NETWORK_METRICS_REPORTING_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS {schema}.network_metrics_reporting (
    team_id UUID NOT NULL,
    app_id UUID NOT NULL,
    pattern_generated_at TIMESTAMPTZ,
    metrics_reported_at TIMESTAMPTZ,
    PRIMARY KEY (team_id, app_id)
)
"#;

/// All statements for `schema`, schema first.
pub fn all_tables(schema: &str) -> Vec<String> {
    [
        CREATE_SCHEMA,
        CREATE_TEAMS_TABLE,
        CREATE_APPS_TABLE,
        CREATE_NETWORK_METRICS_REPORTING_TABLE,
    ]
    .iter()
    .map(|ddl| ddl.replace("{schema}", schema))
    .collect()
}
