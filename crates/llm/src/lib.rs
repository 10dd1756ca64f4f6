//! Model session (bidirectional streaming), context cache manager, and
//! prompt builder for the voice agent's call to the multimodal model.

pub mod cache;
pub mod model_session;
pub mod prompt;

pub use cache::{is_valid_cache_handle, CachePublisher, ContextCacheManager, HttpCachePublisher};
pub use model_session::{ModelEvent, ModelSession, ModelSessionConfig, TranscriptRole};
pub use prompt::{salutation, PromptBuilder};
