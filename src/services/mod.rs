pub mod annotation_service;
pub mod cell_reader;
pub mod image_locator;
pub mod llm_service;
pub mod response_cache;
pub mod sheet_compositor;
pub mod tag_extractor;

pub use annotation_service::{AnnotationService, AnnotationSettings};
pub use llm_service::{EnrichmentRequest, ImagePayload, LanguageModel, LlmService};
pub use response_cache::{Fingerprint, Generation, ResponseCache};
