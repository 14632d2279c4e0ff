//! thumbforge: the orchestration core of an AI-assisted thumbnail concept
//! tool. One structured analysis call produces three creative concepts; one
//! image-synthesis call per concept blends the author's reference photo into
//! each concept's scene; individual results can be re-edited with free-text
//! instructions while the run's aspect ratio and resolution tier are held
//! constant. Purely an outbound client: no listener, no CLI, no persistence.

pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod types;
pub mod utils;

pub use config::Config;
pub use credentials::{ApiKeyGate, CredentialGate};
pub use engine::{EditOutcome, RunEvent, RunPhase, RunSummary, ThumbnailEngine};
pub use error::GenerationError;
pub use llm::{GeminiClient, ThumbnailModel};
pub use types::{
    AnalysisResult, AspectRatio, Concept, EncodedImage, GenerationSettings, ResolutionTier,
    WorkingImageSet,
};
