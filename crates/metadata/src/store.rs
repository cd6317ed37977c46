//! `MetadataStore` backed by Postgres.

use crate::client::{query_error, write_error, PgMetadataStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use processor_core::{App, MetadataStore, Result, Team, Watermark, WatermarkKind};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct WatermarkRecord {
    team_id: Uuid,
    app_id: Uuid,
    pattern_generated_at: Option<DateTime<Utc>>,
    metrics_reported_at: Option<DateTime<Utc>>,
}

impl From<WatermarkRecord> for Watermark {
    fn from(r: WatermarkRecord) -> Self {
        Self {
            team_id: r.team_id,
            app_id: r.app_id,
            pattern_generated_at: r.pattern_generated_at,
            metrics_reported_at: r.metrics_reported_at,
        }
    }
}

/// Upsert statement touching only `kind`'s column.
pub(crate) fn upsert_sql(table: &str, kind: WatermarkKind) -> String {
    let column = kind.column();
    format!(
        "INSERT INTO {table} (team_id, app_id, {column}) VALUES ($1, $2, $3) \
         ON CONFLICT (team_id, app_id) DO UPDATE SET {column} = EXCLUDED.{column}"
    )
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn list_teams(&self) -> Result<Vec<Team>> {
        let sql = format!("SELECT id FROM {} ORDER BY id", self.table("teams"));
        let ids: Vec<(Uuid,)> = sqlx::query_as(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(|e| query_error("list teams", e))?;

        Ok(ids.into_iter().map(|(id,)| Team::new(id)).collect())
    }

    async fn list_apps(&self, team_id: Uuid) -> Result<Vec<App>> {
        let sql = format!(
            "SELECT id FROM {} WHERE team_id = $1 ORDER BY id",
            self.table("apps")
        );
        let ids: Vec<(Uuid,)> = sqlx::query_as(&sql)
            .bind(team_id)
            .fetch_all(self.pool())
            .await
            .map_err(|e| query_error("list apps", e))?;

        Ok(ids.into_iter().map(|(id,)| App::new(id, team_id)).collect())
    }

    async fn get_watermark(&self, team_id: Uuid, app_id: Uuid) -> Result<Option<Watermark>> {
        let sql = format!(
            "SELECT team_id, app_id, pattern_generated_at, metrics_reported_at \
             FROM {} WHERE team_id = $1 AND app_id = $2",
            self.table("network_metrics_reporting")
        );
        let record: Option<WatermarkRecord> = sqlx::query_as(&sql)
            .bind(team_id)
            .bind(app_id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| query_error("get watermark", e))?;

        Ok(record.map(Watermark::from))
    }

    async fn upsert_watermark(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        kind: WatermarkKind,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let sql = upsert_sql(&self.table("network_metrics_reporting"), kind);
        sqlx::query(&sql)
            .bind(team_id)
            .bind(app_id)
            .bind(at)
            .execute(self.pool())
            .await
            .map_err(|e| write_error("upsert watermark", e))?;

        debug!(%team_id, %app_id, aspect = %kind, %at, "Advanced watermark");
        Ok(())
    }
}
