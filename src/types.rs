use std::collections::HashMap;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GenerationError;

/// One creative direction returned by the analysis stage. Immutable once
/// produced; `style` doubles as the identity key for the working set, so it
/// is carried as an opaque string and never re-validated against a taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub style: String,
    pub hook_text: String,
    pub visual_prompt: String,
    pub psychology: String,
}

/// Strategic summary plus concept list, produced once per run.
///
/// The request schema asks for exactly three concepts, but the service is not
/// bound to comply; any length is accepted and iterated as-is. `sources` is
/// grounding provenance attached after parsing, informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub promise: String,
    pub mechanism: String,
    pub audience: String,
    pub concepts: Vec<Concept>,
    #[serde(skip_deserializing, default)]
    pub sources: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Landscape16x9,
    Portrait9x16,
}

impl AspectRatio {
    /// The value the image API expects in `imageConfig.aspectRatio`.
    pub fn wire_value(self) -> &'static str {
        match self {
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Portrait9x16 => "9:16",
        }
    }

    /// Orientation restated in words for the instruction text.
    pub fn orientation_phrase(self) -> &'static str {
        match self {
            AspectRatio::Landscape16x9 => "LANDSCAPE 16:9 format",
            AspectRatio::Portrait9x16 => "PORTRAIT 9:16 format",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionTier {
    #[default]
    Standard,
    High,
}

impl ResolutionTier {
    /// Explicit image-size flag for the wire config; only the high tier
    /// carries one.
    pub fn wire_image_size(self) -> Option<&'static str> {
        match self {
            ResolutionTier::Standard => None,
            ResolutionTier::High => Some("2K"),
        }
    }
}

/// Format constraints chosen once per run and held constant across every
/// generation and edit call within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationSettings {
    pub aspect_ratio: AspectRatio,
    pub resolution_tier: ResolutionTier,
}

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// An image held in its in-process `data:<mime>;base64,<payload>` form, the
/// shape both the reference upload and every generated result travel in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mime = detect_mime_type(bytes).unwrap_or_else(|| "image/png".to_string());
        let payload = general_purpose::STANDARD.encode(bytes);
        EncodedImage(format!("data:{mime};base64,{payload}"))
    }

    pub fn from_base64(mime_type: &str, payload: &str) -> Self {
        EncodedImage(format!("data:{mime_type};base64,{payload}"))
    }

    pub fn from_data_url(value: impl Into<String>) -> Result<Self, GenerationError> {
        let value = value.into();
        let rest = value.strip_prefix("data:").ok_or_else(|| {
            GenerationError::InvalidImage("missing data: prefix".to_string())
        })?;
        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            GenerationError::InvalidImage("missing base64 payload".to_string())
        })?;
        if !header.ends_with(";base64") {
            return Err(GenerationError::InvalidImage(
                "only base64 data URLs are supported".to_string(),
            ));
        }
        if payload.is_empty() {
            return Err(GenerationError::InvalidImage("empty payload".to_string()));
        }
        Ok(EncodedImage(value))
    }

    pub fn as_data_url(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> &str {
        self.0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(';'))
            .map(|(mime, _)| mime)
            .unwrap_or("image/png")
    }

    /// The bare base64 payload, as the wire format's `inlineData.data` wants.
    pub fn base64_payload(&self) -> &str {
        self.0
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or("")
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GenerationError> {
        general_purpose::STANDARD
            .decode(self.base64_payload())
            .map_err(|err| GenerationError::InvalidImage(err.to_string()))
    }
}

/// Latest generated image per concept style for the current run. Entries
/// arrive one at a time as synthesis calls complete and are replaced in place
/// by successful edits; discarded wholesale on reset, never serialized.
pub type WorkingImageSet = HashMap<String, EncodedImage>;

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn encoded_image_round_trips_bytes() {
        let image = EncodedImage::from_bytes(PNG_HEADER);
        assert_eq!(image.mime_type(), "image/png");
        assert!(image.as_data_url().starts_with("data:image/png;base64,"));
        assert_eq!(image.to_bytes().unwrap(), PNG_HEADER);
    }

    #[test]
    fn data_url_parsing_rejects_malformed_input() {
        assert!(EncodedImage::from_data_url("data:image/png;base64,AAAA").is_ok());
        assert!(EncodedImage::from_data_url("image/png;base64,AAAA").is_err());
        assert!(EncodedImage::from_data_url("data:image/png;base64").is_err());
        assert!(EncodedImage::from_data_url("data:image/png,AAAA").is_err());
        assert!(EncodedImage::from_data_url("data:image/png;base64,").is_err());
    }

    #[test]
    fn aspect_ratio_wire_values_match_the_image_api() {
        assert_eq!(AspectRatio::Landscape16x9.wire_value(), "16:9");
        assert_eq!(AspectRatio::Portrait9x16.wire_value(), "9:16");
        assert_eq!(ResolutionTier::Standard.wire_image_size(), None);
        assert_eq!(ResolutionTier::High.wire_image_size(), Some("2K"));
    }

    #[test]
    fn concept_deserialization_requires_every_field() {
        let complete = serde_json::json!({
            "style": "The Authority",
            "hookText": "RAW TRUTH",
            "visualPrompt": "dim workshop, chalkboard",
            "psychology": "credibility through austerity"
        });
        let concept: Concept = serde_json::from_value(complete).unwrap();
        assert_eq!(concept.style, "The Authority");

        let missing = serde_json::json!({
            "style": "The Authority",
            "hookText": "RAW TRUTH",
            "psychology": "credibility through austerity"
        });
        assert!(serde_json::from_value::<Concept>(missing).is_err());
    }

    #[test]
    fn analysis_result_tolerates_any_concept_count() {
        let doc = serde_json::json!({
            "promise": "p",
            "mechanism": "m",
            "audience": "a",
            "concepts": []
        });
        let analysis: AnalysisResult = serde_json::from_value(doc).unwrap();
        assert!(analysis.concepts.is_empty());
        assert!(analysis.sources.is_empty());
    }
}
