//! Client-side orchestration for the slide service: context aggregation,
//! the compose/generate workflow, response normalisation and the slide
//! library workflow.

pub mod context;
pub mod error;
pub mod generation;
pub mod library;
pub mod normalize;

#[cfg(test)]
mod testing;

pub use context::{ContextAggregator, ReferenceDocument, CONTEXT_EXTENSION, TEMPLATE_EXTENSION};
pub use error::{ContextError, GenerationError, LibraryError, ResponseParseDegradation};
pub use generation::{
    GenerationMode, GenerationPhase, GenerationRequest, GenerationWorkflow, TemplateFile,
};
pub use library::{
    LibraryPhase, LibraryQuery, LibrarySettings, LibraryWorkflow, RefreshStatus, RefreshTicket,
    SlideViewModel,
};
pub use normalize::{extract_file_references, reference_file_name, GenerationResult};
