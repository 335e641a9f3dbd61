use async_trait::async_trait;
use reqwest::{Method, Url};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Body of a response: JSON when it parses, the raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    /// An empty body reads as JSON `null`.
    pub fn parse(text: String) -> Self {
        if text.is_empty() {
            return ResponseBody::Json(Value::Null);
        }
        match serde_json::from_str(&text) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(text),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// Human-facing rendering: pretty JSON or the text verbatim.
    pub fn to_display_string(&self) -> String {
        match self {
            ResponseBody::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            ResponseBody::Text(text) => text.clone(),
        }
    }
}

/// Message for a non-success response.
///
/// A text body (or JSON string) is used as-is. An object contributes its
/// `detail`, then its `error` field. Anything else gets a generic message.
pub fn failure_message(status: u16, body: &ResponseBody) -> String {
    let message = match body {
        ResponseBody::Text(text) => text.clone(),
        ResponseBody::Json(Value::String(text)) => text.clone(),
        ResponseBody::Json(Value::Object(map)) => ["detail", "error"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|value| !value.is_null())
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| format!("Request failed ({status})")),
        ResponseBody::Json(_) => format!("Request failed ({status})"),
    };
    if message.is_empty() {
        "Request failed".to_string()
    } else {
        message
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    Text(String),
    File {
        file_name: String,
        bytes: Vec<u8>,
        mime: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

impl FormPart {
    pub fn text(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: PartValue::Text(value.into()),
        }
    }

    pub fn file(name: &str, file_name: &str, bytes: Vec<u8>, mime: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            value: PartValue::File {
                file_name: file_name.to_string(),
                bytes,
                mime: mime.map(str::to_string),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

/// One call against the service. Path segments are kept unencoded and
/// escaped when the URL is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    /// Append a raw path segment (an id, for instance).
    pub fn segment(mut self, segment: &str) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// `/a/b` form, for logs and assertions.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Build an absolute URL under `base`.
pub fn join_url(base: &str, segments: &[String], query: &[(String, String)]) -> String {
    match Url::parse(base) {
        Ok(mut url) => {
            if let Ok(mut path) = url.path_segments_mut() {
                path.pop_if_empty();
                path.extend(segments);
            }
            if !query.is_empty() {
                url.query_pairs_mut().extend_pairs(query);
            }
            url.to_string()
        }
        Err(_) => {
            let mut url = format!("{}/{}", base.trim_end_matches('/'), segments.join("/"));
            if !query.is_empty() {
                let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
                url.push('?');
                url.push_str(&pairs.join("&"));
            }
            url
        }
    }
}

/// Single-attempt access to the service. No retries and no timeout; the
/// caller awaits every call to completion.
#[async_trait]
pub trait Transport: Send + Sync {
    fn base_url(&self) -> &str;

    /// Issue `request` and return the parsed body. Non-success statuses fail
    /// with [`ClientError::Request`].
    async fn request(&self, request: ApiRequest) -> Result<ResponseBody>;

    /// Issue `request` and return the raw bytes of a successful response.
    async fn fetch_bytes(&self, request: ApiRequest) -> Result<Vec<u8>>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url,
                reason: "not a hierarchical URL".to_string(),
            });
        }
        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    async fn send(&self, request: ApiRequest) -> Result<reqwest::Response> {
        let url = join_url(&self.base_url, &request.segments, &request.query);
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method, &url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };
        Ok(builder.send().await?)
    }
}

fn build_form(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match part.value {
            PartValue::Text(text) => form.text(part.name, text),
            PartValue::File {
                file_name,
                bytes,
                mime,
            } => {
                let mut file = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
                if let Some(mime) = mime {
                    file = file.mime_str(&mime)?;
                }
                form.part(part.name, file)
            }
        };
    }
    Ok(form)
}

async fn into_failure(status: reqwest::StatusCode, response: reqwest::Response) -> ClientError {
    let text = response.text().await.unwrap_or_default();
    let message = failure_message(status.as_u16(), &ResponseBody::parse(text));
    tracing::warn!("request failed with {status}: {message}");
    ClientError::Request {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, request: ApiRequest) -> Result<ResponseBody> {
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(into_failure(status, response).await);
        }
        Ok(ResponseBody::parse(response.text().await?))
    }

    async fn fetch_bytes(&self, request: ApiRequest) -> Result<Vec<u8>> {
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(into_failure(status, response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }
}
