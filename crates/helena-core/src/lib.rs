pub mod ai;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod router;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use ai::GeminiClient;
pub use backend::{ChatBackend, GenerationResponse, ImagePart};
pub use cache::{AssetCache, CacheSettings, DiskStorage, HttpFetcher};
pub use config::Config;
pub use error::{BackendError, CacheError};
pub use router::{classify, ContentKind, RenderableContent};
pub use session::{IgnoreReason, Outcome, Session, Submission};
pub use state::{ChatMessage, ChatRole, ConversationLog, SessionSnapshot};
