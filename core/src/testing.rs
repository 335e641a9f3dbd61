//! Recording transport for workflow tests.

use async_trait::async_trait;
use serde_json::Value;
use slide_client::{ApiRequest, ClientError, ResponseBody, SlideApi, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "http://slides.test";

#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<VecDeque<Result<ResponseBody, ClientError>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn api(self: &Arc<Self>) -> SlideApi {
        SlideApi::new(self.clone())
    }

    pub fn push_json(&self, value: Value) {
        self.push(Ok(ResponseBody::Json(value)));
    }

    pub fn push_text(&self, text: &str) {
        self.push(Ok(ResponseBody::Text(text.to_string())));
    }

    pub fn push_error(&self, status: u16, message: &str) {
        self.push(Err(ClientError::Request {
            status,
            message: message.to_string(),
        }));
    }

    fn push(&self, response: Result<ResponseBody, ClientError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().iter().map(ApiRequest::path).collect()
    }

    fn next(&self, request: ApiRequest) -> Result<ResponseBody, ClientError> {
        self.calls.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ClientError::Request {
                    status: 500,
                    message: "no canned response".to_string(),
                })
            })
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    async fn request(&self, request: ApiRequest) -> Result<ResponseBody, ClientError> {
        self.next(request)
    }

    async fn fetch_bytes(&self, request: ApiRequest) -> Result<Vec<u8>, ClientError> {
        self.next(request).map(|body| body.to_display_string().into_bytes())
    }
}
