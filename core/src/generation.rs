//! Compose / generate submission workflow.
//!
//! One workflow owns its inputs, its context documents and the outcome of
//! the last submission. `submit` takes `&mut self`, so a second submission
//! cannot start while one is in flight; the rendering layer disables its
//! submit affordance while [`GenerationWorkflow::is_submitting`] holds.

use slide_client::{compose_request, ResponseBody, SlideApi, Upload};
use slide_common::{ComposeRequest, GeneratePayload, SlideConfig};
use std::path::Path;

use crate::context::{file_name_of, has_extension, ContextAggregator, TEMPLATE_EXTENSION};
use crate::error::{ContextError, GenerationError, ResponseParseDegradation};
use crate::normalize::GenerationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// Build a deck from a literal outline.
    #[default]
    Compose,
    /// Let the service synthesise a deck from a prompt and a template.
    Generate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationPhase {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// A `.pptx` template read into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl TemplateFile {
    pub fn new(name: &str, bytes: Vec<u8>) -> Result<Self, GenerationError> {
        check_template_name(name)?;
        Ok(Self {
            name: name.to_string(),
            bytes,
        })
    }

    pub async fn load(path: &Path) -> Result<Self, GenerationError> {
        let name = file_name_of(path);
        check_template_name(&name)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| GenerationError::Template {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(&name, bytes)
    }

    fn to_upload(&self) -> Upload {
        Upload {
            file_name: self.name.clone(),
            bytes: self.bytes.clone(),
        }
    }
}

fn check_template_name(name: &str) -> Result<(), GenerationError> {
    if has_extension(name, TEMPLATE_EXTENSION) {
        Ok(())
    } else {
        Err(GenerationError::UnsupportedFileKind {
            name: name.to_string(),
            expected: TEMPLATE_EXTENSION,
        })
    }
}

/// The request one submission sends; the variant follows the current mode.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    Compose(ComposeRequest),
    Generate {
        payload: GeneratePayload,
        template: TemplateFile,
    },
}

pub struct GenerationWorkflow {
    api: SlideApi,
    mode: GenerationMode,
    outline: String,
    prompt: String,
    num_slides: Option<u32>,
    output_dir: String,
    template: Option<TemplateFile>,
    context: ContextAggregator,

    phase: GenerationPhase,
    error: Option<String>,
    result: Option<ResponseBody>,
    file_references: Vec<String>,
    degradation: Option<ResponseParseDegradation>,
}

impl GenerationWorkflow {
    pub fn new(api: SlideApi, config: &SlideConfig) -> Self {
        Self {
            api,
            mode: GenerationMode::default(),
            outline: String::new(),
            prompt: String::new(),
            num_slides: None,
            output_dir: config.output_dir.clone(),
            template: None,
            context: ContextAggregator::new(),
            phase: GenerationPhase::Idle,
            error: None,
            result: None,
            file_references: Vec::new(),
            degradation: None,
        }
    }

    pub fn set_mode(&mut self, mode: GenerationMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn set_outline(&mut self, outline: impl Into<String>) {
        self.outline = outline.into();
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Slide-count hint for compose; `None` leaves it to the service.
    pub fn set_num_slides(&mut self, num_slides: Option<u32>) {
        self.num_slides = num_slides;
    }

    pub fn set_output_dir(&mut self, output_dir: impl Into<String>) {
        self.output_dir = output_dir.into();
    }

    pub fn select_template(&mut self, template: TemplateFile) {
        self.template = Some(template);
    }

    pub fn clear_template(&mut self) {
        self.template = None;
    }

    pub fn template(&self) -> Option<&TemplateFile> {
        self.template.as_ref()
    }

    pub fn context(&self) -> &ContextAggregator {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextAggregator {
        &mut self.context
    }

    /// Add one context file; a rejection is shown as the workflow error.
    pub async fn add_context_file(&mut self, path: &Path) -> Result<(), ContextError> {
        let outcome = self.context.accept_file(path).await;
        self.note_context_outcome(outcome.as_ref().err());
        outcome
    }

    /// Add a dropped batch of files; see [`ContextAggregator::accept_drop`].
    pub async fn add_context_drop<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
    ) -> Result<usize, ContextError> {
        let outcome = self.context.accept_drop(paths).await;
        self.note_context_outcome(outcome.as_ref().err());
        outcome
    }

    fn note_context_outcome(&mut self, err: Option<&ContextError>) {
        if let Some(err) = err {
            tracing::warn!("context file rejected: {err}");
            self.error = Some(err.to_string());
        }
    }

    /// Check the inputs the current mode requires, without building anything.
    pub fn validate(&self) -> Result<(), GenerationError> {
        match self.mode {
            GenerationMode::Compose => {
                if self.outline.trim().is_empty() {
                    return Err(GenerationError::MissingPrompt);
                }
            }
            GenerationMode::Generate => {
                if self.template.is_none() {
                    return Err(GenerationError::MissingTemplate);
                }
                if self.prompt.trim().is_empty() {
                    return Err(GenerationError::MissingPrompt);
                }
            }
        }
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        !self.is_submitting() && self.validate().is_ok()
    }

    pub fn build_request(&self) -> Result<GenerationRequest, GenerationError> {
        self.validate()?;
        let context = self.context.context();
        match (&self.mode, &self.template) {
            (GenerationMode::Compose, _) => Ok(GenerationRequest::Compose(compose_request(
                context,
                Some(&self.outline),
                self.num_slides,
                &self.output_dir,
            ))),
            (GenerationMode::Generate, Some(template)) => Ok(GenerationRequest::Generate {
                payload: GeneratePayload {
                    user_input: self.prompt.clone(),
                    documents: context.to_string(),
                    output_dir: self.output_dir.clone(),
                },
                template: template.clone(),
            }),
            (GenerationMode::Generate, None) => Err(GenerationError::MissingTemplate),
        }
    }

    /// Validate, send, and record the outcome.
    ///
    /// Precondition failures are recorded as the error message and returned
    /// without contacting the service. A request failure clears the previous
    /// result and moves to `Failed`; resubmitting is always possible.
    pub async fn submit(&mut self) -> Result<(), GenerationError> {
        let request = match self.build_request() {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!("submission blocked: {err}");
                self.error = Some(err.to_string());
                return Err(err);
            }
        };

        self.phase = GenerationPhase::Submitting;
        self.error = None;
        self.result = None;
        self.file_references.clear();
        self.degradation = None;
        tracing::info!("submitting {:?} request", self.mode);

        let outcome = match &request {
            GenerationRequest::Compose(compose) => self.api.compose(compose).await,
            GenerationRequest::Generate { payload, template } => {
                self.api.generate(payload, template.to_upload()).await
            }
        };

        match outcome {
            Ok(body) => {
                self.record_success(body);
                Ok(())
            }
            Err(err) => {
                tracing::warn!("{:?} request failed: {err}", self.mode);
                self.phase = GenerationPhase::Failed;
                self.error = Some(err.to_string());
                Err(GenerationError::Request(err))
            }
        }
    }

    fn record_success(&mut self, body: ResponseBody) {
        match GenerationResult::interpret(&body) {
            Ok(result) => self.file_references = result.file_references(),
            Err(degradation) => {
                tracing::warn!("{degradation}");
                self.file_references.clear();
                self.degradation = Some(degradation);
            }
        }
        tracing::info!(
            "{:?} request succeeded with {} file references",
            self.mode,
            self.file_references.len()
        );
        self.result = Some(body);
        self.phase = GenerationPhase::Succeeded;
    }

    /// Back to `Idle`, dropping the last outcome. Inputs are kept.
    pub fn reset(&mut self) {
        self.phase = GenerationPhase::Idle;
        self.error = None;
        self.result = None;
        self.file_references.clear();
        self.degradation = None;
    }

    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == GenerationPhase::Submitting
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&ResponseBody> {
        self.result.as_ref()
    }

    pub fn file_references(&self) -> &[String] {
        &self.file_references
    }

    pub fn degradation(&self) -> Option<&ResponseParseDegradation> {
        self.degradation.as_ref()
    }

    /// Where a file reference can be downloaded from.
    pub fn reference_url(&self, reference: &str) -> String {
        self.api.file_url(reference)
    }
}
