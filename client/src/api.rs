//! Typed operations over the slide service endpoints.

use serde::de::DeserializeOwned;
use serde_json::json;
use slide_common::{
    ComposeRequest, GeneratePayload, HealthStatus, SearchHit, SearchRequest, SlideConfig,
    SlideIngestResponse, SlideListResponse,
};
use std::sync::Arc;

use crate::error::{ClientError, Result};
use crate::transport::{join_url, ApiRequest, FormPart, HttpTransport, ResponseBody, Transport};

pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// A file picked on the client side, already read into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Cheap to clone; every clone shares one transport.
#[derive(Clone)]
pub struct SlideApi {
    transport: Arc<dyn Transport>,
}

impl SlideApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn from_config(config: &SlideConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(&config.base_url)?)))
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let body = self.transport.request(ApiRequest::get("/health")).await?;
        decode("/health", body)
    }

    pub async fn list_slides(&self, skip: usize, limit: usize) -> Result<SlideListResponse> {
        let request = ApiRequest::get("/slides")
            .query("skip", skip)
            .query("limit", limit);
        let body = self.transport.request(request).await?;
        decode("/slides", body)
    }

    pub async fn search_slides(&self, search: &SearchRequest) -> Result<Vec<SearchHit>> {
        let request = ApiRequest::post("/slides/search")
            .header("Content-Type", "application/json")
            .json(json!(search));
        let body = self.transport.request(request).await?;
        decode("/slides/search", body)
    }

    pub async fn ingest_slide(&self, upload: Upload) -> Result<SlideIngestResponse> {
        let request = ApiRequest::post("/slides/ingest").multipart(vec![FormPart::file(
            "file",
            &upload.file_name,
            upload.bytes,
            Some(PPTX_MIME),
        )]);
        let body = self.transport.request(request).await?;
        decode("/slides/ingest", body)
    }

    /// The response has no fixed schema and is returned as-is.
    pub async fn compose(&self, compose: &ComposeRequest) -> Result<ResponseBody> {
        let request = ApiRequest::post("/generation/compose")
            .header("Content-Type", "application/json")
            .json(json!(compose));
        self.transport.request(request).await
    }

    /// Multipart call: the JSON-encoded `payload` field and the `template` binary.
    pub async fn generate(
        &self,
        payload: &GeneratePayload,
        template: Upload,
    ) -> Result<ResponseBody> {
        let encoded = serde_json::to_string(payload).map_err(|source| ClientError::Decode {
            endpoint: "/generation/generate".to_string(),
            source,
        })?;
        let request = ApiRequest::post("/generation/generate").multipart(vec![
            FormPart::text("payload", encoded),
            FormPart::file("template", &template.file_name, template.bytes, Some(PPTX_MIME)),
        ]);
        self.transport.request(request).await
    }

    pub async fn download_slide(&self, slide_id: &str) -> Result<Vec<u8>> {
        self.transport
            .fetch_bytes(slide_request(slide_id, "download"))
            .await
    }

    pub async fn slide_preview(&self, slide_id: &str) -> Result<Vec<u8>> {
        self.transport
            .fetch_bytes(slide_request(slide_id, "preview"))
            .await
    }

    /// Fetch a server-side file by the raw reference a generation call returned.
    pub async fn fetch_file(&self, reference: &str) -> Result<Vec<u8>> {
        self.transport.fetch_bytes(file_request(reference)).await
    }

    pub fn slide_download_url(&self, slide_id: &str) -> String {
        self.url_for(&slide_request(slide_id, "download"))
    }

    pub fn slide_preview_url(&self, slide_id: &str) -> String {
        self.url_for(&slide_request(slide_id, "preview"))
    }

    pub fn file_url(&self, reference: &str) -> String {
        self.url_for(&file_request(reference))
    }

    fn url_for(&self, request: &ApiRequest) -> String {
        join_url(self.transport.base_url(), &request.segments, &request.query)
    }
}

/// Compose body; a missing prompt falls back to the context itself.
pub fn compose_request(
    context: &str,
    prompt: Option<&str>,
    num_slides: Option<u32>,
    output_dir: &str,
) -> ComposeRequest {
    ComposeRequest {
        user_context: context.to_string(),
        user_prompt: prompt.unwrap_or(context).to_string(),
        num_slides,
        output_dir: output_dir.to_string(),
    }
}

fn slide_request(slide_id: &str, leaf: &str) -> ApiRequest {
    ApiRequest::get("/slides").segment(slide_id).segment(leaf)
}

fn file_request(reference: &str) -> ApiRequest {
    ApiRequest::get("/files").query("path", reference)
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: ResponseBody) -> Result<T> {
    let decoded = match body {
        ResponseBody::Json(value) => serde_json::from_value(value),
        ResponseBody::Text(text) => serde_json::from_str(&text),
    };
    decoded.map_err(|source| ClientError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}
