//! Slide library browsing: list or search, map to view models, import.
//!
//! Every refresh is issued a ticket. Only the completion carrying the most
//! recently issued ticket is applied, so a slow response to an older query
//! never replaces the results of a newer one.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use slide_client::{ClientError, SlideApi, Upload};
use slide_common::{SearchRequest, SlideConfig, SlideIngestResponse, SlideLibraryMetadata};
use std::path::Path;

use crate::context::{file_name_of, has_extension, TEMPLATE_EXTENSION};
use crate::error::LibraryError;

pub const FALLBACK_PREVIEW: &str = "https://placehold.co/640x360?text=Slide";

/// Display form of one library entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideViewModel {
    pub id: String,
    pub description: String,
    pub subtitle: String,
    pub updated_display: String,
    pub preview_url: String,
    pub download_url: String,
    pub tags: Vec<String>,
}

impl SlideViewModel {
    pub fn from_metadata(meta: &SlideLibraryMetadata, api: &SlideApi) -> Self {
        let id = meta.library_id().to_string();
        let position = meta.slide_index + 1;
        let subtitle = if meta.source_presentation.is_empty() {
            format!("Slide #{position}")
        } else {
            format!("{} · #{position}", meta.source_presentation)
        };
        let preview_url = if meta.has_preview() {
            api.slide_preview_url(&id)
        } else {
            FALLBACK_PREVIEW.to_string()
        };
        Self {
            description: if meta.description.is_empty() {
                "Slide".to_string()
            } else {
                meta.description.clone()
            },
            subtitle,
            updated_display: format_updated(meta.updated_at.as_deref()),
            preview_url,
            download_url: api.slide_download_url(&id),
            tags: meta.tags.clone(),
            id,
        }
    }
}

/// Local calendar date of a timestamp. Naive timestamps are read as UTC;
/// text that is not a timestamp is shown verbatim.
pub fn format_updated(value: Option<&str>) -> String {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return "Unknown".to_string();
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed.with_timezone(&Local).format("%Y-%m-%d").to_string();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        let utc = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
        return utc.with_timezone(&Local).format("%Y-%m-%d").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }
    value.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibraryPhase {
    #[default]
    Loading,
    Ready,
    Error,
}

/// Which endpoint a refresh goes to.
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryQuery {
    List { skip: usize, limit: usize },
    Search(SearchRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibrarySettings {
    pub list_limit: usize,
    pub search_limit: usize,
    pub retrieval_limit: usize,
}

impl From<&SlideConfig> for LibrarySettings {
    fn from(config: &SlideConfig) -> Self {
        Self {
            list_limit: config.list_limit,
            search_limit: config.search_limit,
            retrieval_limit: config.retrieval_limit,
        }
    }
}

impl LibrarySettings {
    /// Blank queries list the library; anything else is a search.
    pub fn plan(&self, query: &str) -> LibraryQuery {
        if query.trim().is_empty() {
            LibraryQuery::List {
                skip: 0,
                limit: self.list_limit,
            }
        } else {
            LibraryQuery::Search(SearchRequest {
                query: query.to_string(),
                limit: self.search_limit,
                retrieval_limit: self.retrieval_limit,
                return_scores: false,
            })
        }
    }
}

/// Run one planned query. Detached from the workflow so the rendering
/// layer can await it off its event loop.
pub async fn fetch(
    api: &SlideApi,
    query: LibraryQuery,
) -> Result<Vec<SlideLibraryMetadata>, ClientError> {
    match query {
        LibraryQuery::List { skip, limit } => Ok(api.list_slides(skip, limit).await?.items),
        LibraryQuery::Search(search) => Ok(api
            .search_slides(&search)
            .await?
            .into_iter()
            .map(|hit| hit.into_metadata())
            .collect()),
    }
}

/// Handle for one issued refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    seq: u64,
    query: String,
}

impl RefreshTicket {
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Applied,
    /// A newer refresh was issued; this outcome was dropped.
    Discarded,
}

pub struct LibraryWorkflow {
    api: SlideApi,
    settings: LibrarySettings,
    query: String,
    results: Vec<SlideViewModel>,
    phase: LibraryPhase,
    error: Option<String>,
    issued: u64,
}

impl LibraryWorkflow {
    pub fn new(api: SlideApi, config: &SlideConfig) -> Self {
        Self {
            api,
            settings: LibrarySettings::from(config),
            query: String::new(),
            results: Vec::new(),
            phase: LibraryPhase::Loading,
            error: None,
            issued: 0,
        }
    }

    pub fn api(&self) -> &SlideApi {
        &self.api
    }

    /// Record `query` as current and issue a ticket for it.
    pub fn begin_refresh(&mut self, query: &str) -> (RefreshTicket, LibraryQuery) {
        self.issued += 1;
        self.query = query.to_string();
        self.phase = LibraryPhase::Loading;
        self.error = None;
        let ticket = RefreshTicket {
            seq: self.issued,
            query: query.to_string(),
        };
        (ticket, self.settings.plan(query))
    }

    /// Apply the outcome of a refresh unless a newer one has been issued.
    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        outcome: Result<Vec<SlideLibraryMetadata>, ClientError>,
    ) -> Result<RefreshStatus, LibraryError> {
        if ticket.seq != self.issued {
            tracing::debug!(
                "discarding stale library response for {:?} ({} < {})",
                ticket.query,
                ticket.seq,
                self.issued
            );
            return Ok(RefreshStatus::Discarded);
        }
        match outcome {
            Ok(items) => {
                self.results = items
                    .iter()
                    .map(|meta| SlideViewModel::from_metadata(meta, &self.api))
                    .collect();
                self.phase = LibraryPhase::Ready;
                tracing::debug!("library shows {} slides", self.results.len());
                Ok(RefreshStatus::Applied)
            }
            Err(err) => {
                tracing::warn!("library refresh failed: {err}");
                self.results.clear();
                self.error = Some(err.to_string());
                self.phase = LibraryPhase::Error;
                Err(LibraryError::Request(err))
            }
        }
    }

    pub async fn refresh(&mut self, query: &str) -> Result<RefreshStatus, LibraryError> {
        let (ticket, plan) = self.begin_refresh(query);
        let outcome = fetch(&self.api, plan).await;
        self.complete_refresh(ticket, outcome)
    }

    pub async fn refresh_current(&mut self) -> Result<RefreshStatus, LibraryError> {
        let query = self.query.clone();
        self.refresh(&query).await
    }

    /// Upload a presentation for ingestion, then refresh the current query.
    ///
    /// A failed upload is recorded and nothing is refreshed. A refresh
    /// failure after a successful upload is recorded on the workflow but
    /// does not undo the import.
    pub async fn import(&mut self, path: &Path) -> Result<SlideIngestResponse, LibraryError> {
        let upload = match read_upload(path).await {
            Ok(upload) => upload,
            Err(err) => {
                self.error = Some(err.to_string());
                return Err(err);
            }
        };

        self.error = None;
        tracing::info!("importing {}", upload.file_name);
        match self.api.ingest_slide(upload).await {
            Ok(ingested) => {
                tracing::info!("ingested {} slides", ingested.count);
                if let Err(err) = self.refresh_current().await {
                    tracing::warn!("refresh after import failed: {err}");
                }
                Ok(ingested)
            }
            Err(err) => {
                tracing::warn!("import failed: {err}");
                self.error = Some(err.to_string());
                Err(LibraryError::Request(err))
            }
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[SlideViewModel] {
        &self.results
    }

    pub fn phase(&self) -> LibraryPhase {
        self.phase
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

}

async fn read_upload(path: &Path) -> Result<Upload, LibraryError> {
    let file_name = file_name_of(path);
    if !has_extension(&file_name, TEMPLATE_EXTENSION) {
        return Err(LibraryError::UnsupportedFileKind {
            name: file_name,
            expected: TEMPLATE_EXTENSION,
        });
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| LibraryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Upload { file_name, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use serde_json::json;
    use slide_client::RequestBody;

    fn workflow(fake: &std::sync::Arc<FakeTransport>) -> LibraryWorkflow {
        LibraryWorkflow::new(fake.api(), &SlideConfig::default())
    }

    #[tokio::test]
    async fn blank_query_lists_and_text_query_searches() {
        let fake = FakeTransport::new();
        fake.push_json(json!({"count": 0, "items": []}));
        fake.push_json(json!([]));
        let mut wf = workflow(&fake);

        wf.refresh("  ").await.unwrap();
        wf.refresh("roadmap").await.unwrap();

        let calls = fake.calls();
        assert_eq!(calls[0].path(), "/slides");
        assert_eq!(
            calls[0].query,
            vec![
                ("skip".to_string(), "0".to_string()),
                ("limit".to_string(), "50".to_string())
            ]
        );
        assert_eq!(calls[1].path(), "/slides/search");
        assert_eq!(
            calls[1].body,
            RequestBody::Json(json!({
                "query": "roadmap",
                "limit": 20,
                "retrieval_limit": 20,
                "return_scores": false,
            }))
        );
        assert_eq!(wf.query(), "roadmap");
    }

    #[tokio::test]
    async fn view_model_ids_prefer_slide_id() {
        let fake = FakeTransport::new();
        fake.push_json(json!({"count": 3, "items": [
            {"slide_id": "s-1", "file_hash": "h-1", "description": "Intro", "source_presentation": "kickoff.pptx", "slide_index": 0, "preview": "previews/s-1.png"},
            {"file_hash": "h-2", "slide_index": 4},
            {"slide_id": "", "file_hash": "h-3", "description": "", "preview": ""}
        ]}));
        let mut wf = workflow(&fake);

        assert_eq!(wf.refresh("").await.unwrap(), RefreshStatus::Applied);
        assert_eq!(wf.phase(), LibraryPhase::Ready);

        let ids: Vec<&str> = wf.results().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s-1", "h-2", "h-3"]);

        let first = &wf.results()[0];
        assert_eq!(first.subtitle, "kickoff.pptx · #1");
        assert_eq!(first.preview_url, "http://slides.test/slides/s-1/preview");
        assert_eq!(first.download_url, "http://slides.test/slides/s-1/download");
        assert_eq!(first.updated_display, "Unknown");

        let second = &wf.results()[1];
        assert_eq!(second.subtitle, "Slide #5");
        assert_eq!(second.description, "Slide");
        assert_eq!(second.preview_url, FALLBACK_PREVIEW);
        assert_eq!(second.download_url, "http://slides.test/slides/h-2/download");

        assert_eq!(wf.results()[2].preview_url, FALLBACK_PREVIEW);
    }

    #[tokio::test]
    async fn null_fields_in_one_record_do_not_fail_the_listing() {
        let fake = FakeTransport::new();
        fake.push_json(json!({"count": 2, "items": [
            {"slide_id": "s-1", "file_hash": "h-1", "description": "Intro"},
            {"slide_id": "", "file_hash": "h-2", "description": null, "tags": null,
             "source_presentation": null, "slide_index": null}
        ]}));
        let mut wf = workflow(&fake);

        assert_eq!(wf.refresh("").await.unwrap(), RefreshStatus::Applied);
        assert_eq!(wf.phase(), LibraryPhase::Ready);
        assert_eq!(wf.results().len(), 2);

        let sparse = &wf.results()[1];
        assert_eq!(sparse.id, "h-2");
        assert_eq!(sparse.description, "Slide");
        assert_eq!(sparse.subtitle, "Slide #1");
        assert!(sparse.tags.is_empty());
    }

    #[tokio::test]
    async fn search_results_map_through_the_same_rule() {
        let fake = FakeTransport::new();
        fake.push_json(json!([{"slide_id": "s-9", "file_hash": "h"}, {"file_hash": "only-hash"}]));
        let mut wf = workflow(&fake);

        wf.refresh("roadmap").await.unwrap();
        let ids: Vec<&str> = wf.results().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s-9", "only-hash"]);
    }

    #[tokio::test]
    async fn failure_clears_results_and_records_error() {
        let fake = FakeTransport::new();
        fake.push_json(json!({"count": 1, "items": [{"file_hash": "h"}]}));
        fake.push_error(503, "Storage unavailable");
        let mut wf = workflow(&fake);

        wf.refresh("").await.unwrap();
        assert_eq!(wf.results().len(), 1);

        let err = wf.refresh("anything").await.unwrap_err();
        assert!(matches!(err, LibraryError::Request(_)));
        assert!(wf.results().is_empty());
        assert_eq!(wf.phase(), LibraryPhase::Error);
        assert_eq!(wf.error_message(), Some("Storage unavailable"));
    }

    #[test]
    fn stale_completion_is_discarded() {
        let fake = FakeTransport::new();
        let mut wf = workflow(&fake);

        let (older, _) = wf.begin_refresh("road");
        let (newer, _) = wf.begin_refresh("roadmap");

        let newer_items = vec![SlideLibraryMetadata {
            file_hash: "new".to_string(),
            ..Default::default()
        }];
        assert_eq!(
            wf.complete_refresh(newer, Ok(newer_items)).unwrap(),
            RefreshStatus::Applied
        );

        let older_items = vec![SlideLibraryMetadata {
            file_hash: "old".to_string(),
            ..Default::default()
        }];
        assert_eq!(
            wf.complete_refresh(older, Ok(older_items)).unwrap(),
            RefreshStatus::Discarded
        );
        assert_eq!(wf.results()[0].id, "new");
        assert_eq!(wf.query(), "roadmap");
    }

    #[test]
    fn stale_failure_does_not_clear_newer_results() {
        let fake = FakeTransport::new();
        let mut wf = workflow(&fake);
        let (older, _) = wf.begin_refresh("a");
        let (newer, _) = wf.begin_refresh("b");
        wf.complete_refresh(newer, Ok(vec![SlideLibraryMetadata::default()]))
            .unwrap();

        let stale = wf.complete_refresh(
            older,
            Err(ClientError::Request {
                status: 500,
                message: "late".to_string(),
            }),
        );
        assert_eq!(stale.unwrap(), RefreshStatus::Discarded);
        assert_eq!(wf.results().len(), 1);
        assert_eq!(wf.error_message(), None);
    }

    #[tokio::test]
    async fn import_uploads_then_refreshes_current_query() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("kickoff.pptx");
        std::fs::write(&path, b"PK").unwrap();

        let fake = FakeTransport::new();
        fake.push_json(json!([]));
        fake.push_json(json!({"count": 2, "slides": [{"file_hash": "a"}, {"file_hash": "b"}]}));
        fake.push_json(json!([{"file_hash": "a"}]));
        let mut wf = workflow(&fake);
        wf.refresh("kickoff").await.unwrap();

        let ingested = wf.import(&path).await.unwrap();
        assert_eq!(ingested.count, 2);
        assert_eq!(
            fake.paths(),
            vec!["/slides/search", "/slides/ingest", "/slides/search"]
        );
        assert_eq!(wf.results().len(), 1);
    }

    #[tokio::test]
    async fn failed_import_does_not_refresh() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.pptx");
        std::fs::write(&path, b"PK").unwrap();

        let fake = FakeTransport::new();
        fake.push_error(400, "Only .pptx files are supported");
        let mut wf = workflow(&fake);

        let err = wf.import(&path).await.unwrap_err();
        assert!(matches!(err, LibraryError::Request(_)));
        assert_eq!(fake.paths(), vec!["/slides/ingest"]);
        assert_eq!(wf.error_message(), Some("Only .pptx files are supported"));
    }

    #[tokio::test]
    async fn import_rejects_non_presentations_locally() {
        let fake = FakeTransport::new();
        let mut wf = workflow(&fake);
        let err = wf.import(Path::new("notes.md")).await.unwrap_err();
        assert!(matches!(err, LibraryError::UnsupportedFileKind { .. }));
        assert_eq!(fake.call_count(), 0);
    }

    #[test]
    fn plan_uses_configured_limits() {
        let settings = LibrarySettings::from(&SlideConfig::default());
        assert_eq!(settings.plan(" "), LibraryQuery::List { skip: 0, limit: 50 });
        assert_eq!(
            settings.plan("roadmap"),
            LibraryQuery::Search(SearchRequest {
                query: "roadmap".to_string(),
                limit: 20,
                retrieval_limit: 20,
                return_scores: false,
            })
        );
    }

    #[test]
    fn updated_display_rules() {
        assert_eq!(format_updated(None), "Unknown");
        assert_eq!(format_updated(Some("")), "Unknown");
        assert_eq!(format_updated(Some("yesterday-ish")), "yesterday-ish");
        assert_eq!(format_updated(Some("2024-05-01")), "2024-05-01");

        let local_date = |rfc3339: &str| {
            DateTime::parse_from_rfc3339(rfc3339)
                .unwrap()
                .with_timezone(&Local)
                .format("%Y-%m-%d")
                .to_string()
        };
        assert_eq!(
            format_updated(Some("2024-05-01T12:00:00Z")),
            local_date("2024-05-01T12:00:00Z")
        );
        assert_eq!(
            format_updated(Some("2024-05-01T12:00:00.123456")),
            local_date("2024-05-01T12:00:00.123456Z")
        );
        assert_eq!(
            format_updated(Some("2024-05-01T23:30:00+09:00")),
            local_date("2024-05-01T23:30:00+09:00")
        );
    }
}
