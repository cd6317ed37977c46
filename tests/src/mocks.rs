//! In-memory store implementations for testing.
//!
//! Both mocks implement the same traits as the Postgres and ClickHouse
//! clients, so the orchestrator and both jobs run their production code
//! paths against them. Each store can be told to fail specific calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use processor_core::{
    App, Error, EventStore, HttpEvent, HttpMetricRow, HttpPathCount, MetadataStore,
    ProcessingWindow, Result, Team, UrlTemplate, Watermark, WatermarkKind,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Mock metadata store holding teams, apps and watermarks.
#[derive(Clone, Default)]
pub struct InMemoryMetadataStore {
    teams: Arc<Mutex<Vec<Team>>>,
    apps: Arc<Mutex<Vec<App>>>,
    watermarks: Arc<Mutex<HashMap<(Uuid, Uuid), Watermark>>>,
    fail_list_teams: Arc<Mutex<bool>>,
    failing_teams: Arc<Mutex<HashSet<Uuid>>>,
    fail_watermark_writes: Arc<Mutex<bool>>,
    watermark_writes: Arc<Mutex<usize>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a team with one app per id in `app_ids`.
    pub fn add_team(&self, team_id: Uuid, app_ids: &[Uuid]) -> Vec<App> {
        self.teams.lock().push(Team::new(team_id));
        let apps: Vec<App> = app_ids.iter().map(|id| App::new(*id, team_id)).collect();
        self.apps.lock().extend(apps.iter().copied());
        apps
    }

    pub fn set_watermark(&self, app: &App, kind: WatermarkKind, at: DateTime<Utc>) {
        self.watermarks
            .lock()
            .entry(app.scope())
            .or_insert_with(|| Watermark::new(app.team_id, app.id))
            .set(kind, at);
    }

    pub fn watermark(&self, app: &App, kind: WatermarkKind) -> Option<DateTime<Utc>> {
        self.watermarks
            .lock()
            .get(&app.scope())
            .and_then(|w| w.get(kind))
    }

    /// Number of successful watermark upserts.
    pub fn watermark_writes(&self) -> usize {
        *self.watermark_writes.lock()
    }

    pub fn set_fail_list_teams(&self, fail: bool) {
        *self.fail_list_teams.lock() = fail;
    }

    /// Makes `list_apps` fail for `team_id`.
    pub fn fail_team(&self, team_id: Uuid) {
        self.failing_teams.lock().insert(team_id);
    }

    pub fn set_fail_watermark_writes(&self, fail: bool) {
        *self.fail_watermark_writes.lock() = fail;
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn list_teams(&self) -> Result<Vec<Team>> {
        if *self.fail_list_teams.lock() {
            return Err(Error::metadata_query("mock list teams failure"));
        }
        Ok(self.teams.lock().clone())
    }

    async fn list_apps(&self, team_id: Uuid) -> Result<Vec<App>> {
        if self.failing_teams.lock().contains(&team_id) {
            return Err(Error::metadata_query("mock list apps failure"));
        }
        Ok(self
            .apps
            .lock()
            .iter()
            .filter(|a| a.team_id == team_id)
            .copied()
            .collect())
    }

    async fn get_watermark(&self, team_id: Uuid, app_id: Uuid) -> Result<Option<Watermark>> {
        Ok(self.watermarks.lock().get(&(team_id, app_id)).copied())
    }

    async fn upsert_watermark(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        kind: WatermarkKind,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if *self.fail_watermark_writes.lock() {
            return Err(Error::metadata_write("mock watermark write failure"));
        }
        self.watermarks
            .lock()
            .entry((team_id, app_id))
            .or_insert_with(|| Watermark::new(team_id, app_id))
            .set(kind, at);
        *self.watermark_writes.lock() += 1;
        Ok(())
    }
}

/// Mock event store holding raw events, templates and metric rows.
///
/// Queries apply the same filters as the ClickHouse statements: windows are
/// half-open on `inserted_at`, templates replace by key keeping the newest
/// `last_updated_at`.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<Mutex<Vec<HttpEvent>>>,
    templates: Arc<Mutex<BTreeMap<(Uuid, Uuid, String, String), UrlTemplate>>>,
    metrics: Arc<Mutex<Vec<HttpMetricRow>>>,
    failing_apps: Arc<Mutex<HashSet<Uuid>>>,
    fail_writes: Arc<Mutex<bool>>,
    deletes: Arc<Mutex<Vec<(Uuid, DateTime<Utc>)>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_events(&self, events: impl IntoIterator<Item = HttpEvent>) {
        self.events.lock().extend(events);
    }

    pub fn add_templates(&self, templates: impl IntoIterator<Item = UrlTemplate>) {
        let mut stored = self.templates.lock();
        for t in templates {
            upsert_template(&mut stored, t);
        }
    }

    /// Stored templates for `app`, ordered by domain and path.
    pub fn templates(&self, app: &App) -> Vec<UrlTemplate> {
        self.templates
            .lock()
            .values()
            .filter(|t| (t.team_id, t.app_id) == app.scope())
            .cloned()
            .collect()
    }

    /// Stored metric rows for `app`, in insertion order.
    pub fn metric_rows(&self, app: &App) -> Vec<HttpMetricRow> {
        self.metrics
            .lock()
            .iter()
            .filter(|r| (r.team_id, r.app_id) == app.scope())
            .cloned()
            .collect()
    }

    /// `(app_id, from)` of every delete, in call order.
    pub fn deletes(&self) -> Vec<(Uuid, DateTime<Utc>)> {
        self.deletes.lock().clone()
    }

    /// Makes every read for `app_id` fail.
    pub fn fail_app(&self, app_id: Uuid) {
        self.failing_apps.lock().insert(app_id);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    fn check_read(&self, app_id: Uuid) -> Result<()> {
        if self.failing_apps.lock().contains(&app_id) {
            return Err(Error::events_query("mock query failure"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if *self.fail_writes.lock() {
            return Err(Error::events_write("mock write failure"));
        }
        Ok(())
    }

    fn events_in(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        window: &ProcessingWindow,
    ) -> Vec<HttpEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.team_id == team_id && e.app_id == app_id)
            .filter(|e| window.contains(e.inserted_at))
            .filter(|e| !e.domain.is_empty() && !e.path.is_empty())
            .cloned()
            .collect()
    }
}

fn upsert_template(
    stored: &mut BTreeMap<(Uuid, Uuid, String, String), UrlTemplate>,
    template: UrlTemplate,
) {
    let key = (
        template.team_id,
        template.app_id,
        template.domain.clone(),
        template.path.clone(),
    );
    match stored.get(&key) {
        Some(existing) if existing.last_updated_at > template.last_updated_at => {}
        _ => {
            stored.insert(key, template);
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn fetch_path_counts(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        window: &ProcessingWindow,
    ) -> Result<Vec<HttpPathCount>> {
        self.check_read(app_id)?;
        let mut grouped: BTreeMap<(String, String), u64> = BTreeMap::new();
        for e in self.events_in(team_id, app_id, window) {
            *grouped.entry((e.domain, e.path)).or_default() += 1;
        }
        Ok(grouped
            .into_iter()
            .map(|((domain, path), count)| HttpPathCount {
                team_id,
                app_id,
                domain,
                path,
                count,
            })
            .collect())
    }

    async fn upsert_url_patterns(&self, templates: &[UrlTemplate]) -> Result<usize> {
        self.check_write()?;
        let mut stored = self.templates.lock();
        for t in templates {
            upsert_template(&mut stored, t.clone());
        }
        Ok(templates.len())
    }

    async fn fetch_url_templates(&self, team_id: Uuid, app_id: Uuid) -> Result<Vec<UrlTemplate>> {
        self.check_read(app_id)?;
        Ok(self
            .templates
            .lock()
            .values()
            .filter(|t| t.team_id == team_id && t.app_id == app_id)
            .cloned()
            .collect())
    }

    async fn fetch_http_events(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        window: &ProcessingWindow,
        max_latency_ms: u64,
    ) -> Result<Vec<HttpEvent>> {
        self.check_read(app_id)?;
        Ok(self
            .events_in(team_id, app_id, window)
            .into_iter()
            .filter(|e| e.latency_ms <= max_latency_ms && e.status_code != 0)
            .collect())
    }

    async fn delete_http_metrics(
        &self,
        team_id: Uuid,
        app_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<()> {
        self.check_write()?;
        self.metrics
            .lock()
            .retain(|r| !(r.team_id == team_id && r.app_id == app_id && r.window_end > from));
        self.deletes.lock().push((app_id, from));
        Ok(())
    }

    async fn insert_http_metrics(&self, rows: &[HttpMetricRow]) -> Result<usize> {
        self.check_write()?;
        self.metrics.lock().extend(rows.iter().cloned());
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_template_upsert_keeps_newest() {
        let store = InMemoryEventStore::new();
        let app = App::new(Uuid::new_v4(), Uuid::new_v4());
        let old = Utc::now() - Duration::hours(1);
        let template = |at| UrlTemplate {
            team_id: app.team_id,
            app_id: app.id,
            domain: "api.example.com".into(),
            path: "/users/*".into(),
            last_updated_at: at,
        };

        store.add_templates([template(Utc::now())]);
        store.upsert_url_patterns(&[template(old)]).await.unwrap();

        let stored = store.templates(&app);
        assert_eq!(stored.len(), 1);
        assert!(stored[0].last_updated_at > old);
    }

    #[tokio::test]
    async fn test_failing_team_only_affects_list_apps() {
        let store = InMemoryMetadataStore::new();
        let team = Uuid::new_v4();
        store.add_team(team, &[Uuid::new_v4()]);
        store.fail_team(team);

        assert_eq!(store.list_teams().await.unwrap().len(), 1);
        assert!(store.list_apps(team).await.is_err());
    }
}
