//! HTTP access to the slide service: a single-attempt [`Transport`] and the
//! typed [`SlideApi`] built on top of it.

pub mod api;
pub mod error;
pub mod transport;

pub use api::{compose_request, SlideApi, Upload, PPTX_MIME};
pub use error::{ClientError, Result};
pub use transport::{
    failure_message, ApiRequest, FormPart, HttpTransport, PartValue, RequestBody, ResponseBody,
    Transport,
};
