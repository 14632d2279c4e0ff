pub mod gemini;

pub use gemini::GeminiClient;

use crate::error::GenerationError;
use crate::types::{AnalysisResult, Concept, EncodedImage, GenerationSettings};

/// The three generation stages, as the engine sees them. Implementations are
/// stateless transformers of their inputs into external-service calls; the
/// production implementation is [`GeminiClient`], tests substitute fakes.
#[allow(async_fn_in_trait)]
pub trait ThumbnailModel {
    /// One structured-output request producing the strategic analysis and
    /// concept list. Precondition (caller-enforced): `context` is non-empty.
    async fn analyze(
        &self,
        context: &str,
        intent: Option<&str>,
    ) -> Result<AnalysisResult, GenerationError>;

    /// One image blending the author reference into the concept's scene,
    /// honoring the run's aspect ratio and resolution tier.
    async fn synthesize(
        &self,
        concept: &Concept,
        author_image: &EncodedImage,
        settings: &GenerationSettings,
    ) -> Result<EncodedImage, GenerationError>;

    /// A follow-up modification of a previously generated image. Orientation
    /// is re-asserted from `settings` on every call, never assumed to persist.
    async fn edit(
        &self,
        source_image: &EncodedImage,
        instruction: &str,
        settings: &GenerationSettings,
    ) -> Result<EncodedImage, GenerationError>;
}
