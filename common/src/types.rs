use serde::{Deserialize, Deserializer, Serialize};

/// Explicit `null` reads the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One slide as stored in the remote library.
///
/// Only `file_hash` is reliably present; everything else is defaulted so that
/// best-effort documents from the list endpoint still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlideLibraryMetadata {
    #[serde(default)]
    pub slide_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_hash: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_presentation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slide_index: i64,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub element_count: Option<i64>,
}

impl SlideLibraryMetadata {
    /// `slide_id` when set and non-empty, otherwise `file_hash`.
    pub fn library_id(&self) -> &str {
        match self.slide_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.file_hash,
        }
    }

    pub fn has_preview(&self) -> bool {
        self.preview.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlideListResponse {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub items: Vec<SlideLibraryMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlideIngestResponse {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub slides: Vec<SlideLibraryMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub retrieval_limit: usize,
    pub return_scores: bool,
}

/// A search result; the service wraps metadata with a score when asked to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SearchHit {
    Scored {
        metadata: SlideLibraryMetadata,
        score: f64,
    },
    Plain(SlideLibraryMetadata),
}

impl SearchHit {
    pub fn metadata(&self) -> &SlideLibraryMetadata {
        match self {
            SearchHit::Scored { metadata, .. } => metadata,
            SearchHit::Plain(metadata) => metadata,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            SearchHit::Scored { score, .. } => Some(*score),
            SearchHit::Plain(_) => None,
        }
    }

    pub fn into_metadata(self) -> SlideLibraryMetadata {
        match self {
            SearchHit::Scored { metadata, .. } => metadata,
            SearchHit::Plain(metadata) => metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeRequest {
    pub user_context: String,
    pub user_prompt: String,
    pub num_slides: Option<u32>,
    pub output_dir: String,
}

/// JSON carried in the `payload` form field of a generate call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratePayload {
    pub user_input: String,
    pub documents: String,
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}
