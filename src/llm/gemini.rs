use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::GenerationError;
use crate::llm::ThumbnailModel;
use crate::prompts;
use crate::types::{AnalysisResult, Concept, EncodedImage, GenerationSettings, ResolutionTier};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

/// Client for the Gemini `generateContent` endpoint covering the three
/// stages: structured analysis, concept image synthesis, and image editing.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: Config,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    grounding_chunks: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn summarize_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_payload(payload: &Value, system_prompt_label: Option<&str>) -> Value {
    let mut summary = Map::new();

    if payload.pointer("/systemInstruction").is_some() {
        let label = system_prompt_label.unwrap_or("inline_system_prompt");
        summary.insert(
            "systemInstruction".to_string(),
            Value::String(label.to_string()),
        );
    }

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    if let Some(tools) = payload.get("tools") {
        summary.insert("tools".to_string(), tools.clone());
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;

    let candidates = response.candidates.as_deref().unwrap_or(&[]);
    for candidate in candidates {
        if let Some(content) = &candidate.content {
            if let Some(parts) = &content.parts {
                for part in parts {
                    match part {
                        GeminiPart::Text { text } => {
                            text_parts += 1;
                            if text_preview.is_none() && !text.trim().is_empty() {
                                text_preview = Some(truncate_for_log(text, 200));
                            }
                        }
                        GeminiPart::InlineData { inline_data } => {
                            if inline_data.mime_type.starts_with("image/") {
                                image_parts += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    json!({
        "candidates": candidates.len(),
        "textParts": text_parts,
        "imageParts": image_parts,
        "textPreview": text_preview
    })
}

fn build_safety_settings(profile: &str) -> Vec<Value> {
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown safety settings profile '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
    ]
}

/// Declared output schema for the analysis call. Every top-level field and
/// every concept field is required, so a conforming response can never yield
/// a partial object.
fn analysis_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "promise": { "type": "STRING" },
            "mechanism": { "type": "STRING" },
            "audience": { "type": "STRING" },
            "concepts": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "style": { "type": "STRING" },
                        "hookText": { "type": "STRING" },
                        "visualPrompt": { "type": "STRING" },
                        "psychology": { "type": "STRING" }
                    },
                    "required": ["style", "hookText", "visualPrompt", "psychology"]
                }
            }
        },
        "required": ["promise", "mechanism", "audience", "concepts"]
    })
}

fn build_image_generation_config(settings: &GenerationSettings) -> Value {
    let mut image_config = Map::new();
    image_config.insert(
        "aspectRatio".to_string(),
        json!(settings.aspect_ratio.wire_value()),
    );
    if let Some(image_size) = settings.resolution_tier.wire_image_size() {
        image_config.insert("imageSize".to_string(), json!(image_size));
    }

    json!({
        "responseModalities": ["TEXT", "IMAGE"],
        "imageConfig": Value::Object(image_config),
    })
}

fn extract_text(response: &GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.as_deref().unwrap_or(&[]) {
        if let Some(content) = &candidate.content {
            if let Some(parts) = &content.parts {
                for part in parts {
                    if let GeminiPart::Text { text } = part {
                        if !text.trim().is_empty() {
                            text_parts.push(text.as_str());
                        }
                    }
                }
            }
        }
    }
    text_parts.join("\n")
}

/// First image-bearing part of the response, kept in the service's own
/// base64 encoding.
fn extract_first_image(response: &GeminiResponse) -> Option<EncodedImage> {
    for candidate in response.candidates.as_deref().unwrap_or(&[]) {
        if let Some(content) = &candidate.content {
            if let Some(parts) = &content.parts {
                for part in parts {
                    if let GeminiPart::InlineData { inline_data } = part {
                        if inline_data.mime_type.starts_with("image/") {
                            return Some(EncodedImage::from_base64(
                                &inline_data.mime_type,
                                &inline_data.data,
                            ));
                        }
                    }
                }
            }
        }
    }
    None
}

fn extract_grounding_sources(response: &GeminiResponse) -> Vec<Value> {
    response
        .candidates
        .as_deref()
        .unwrap_or(&[])
        .first()
        .and_then(|candidate| candidate.grounding_metadata.as_ref())
        .and_then(|metadata| metadata.grounding_chunks.clone())
        .unwrap_or_default()
}

fn parse_analysis(response: &GeminiResponse) -> Result<AnalysisResult, GenerationError> {
    let text = extract_text(response);
    if text.trim().is_empty() {
        return Err(GenerationError::MalformedAnalysisResponse(
            "response carried no text payload".to_string(),
        ));
    }

    let mut analysis: AnalysisResult = serde_json::from_str(&text)
        .map_err(|err| GenerationError::MalformedAnalysisResponse(err.to_string()))?;
    analysis.sources = extract_grounding_sources(response);
    Ok(analysis)
}

impl GeminiClient {
    pub fn new(config: Config) -> Self {
        GeminiClient { config }
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.config.gemini_api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    /// Model selection is a pure function of the resolution tier; capability
    /// and credential checks belong to the credential gate, not here.
    fn image_model_for(&self, settings: &GenerationSettings) -> &str {
        match settings.resolution_tier {
            ResolutionTier::High => &self.config.image_pro_model,
            ResolutionTier::Standard => &self.config.image_model,
        }
    }

    async fn call_api(
        &self,
        model: &str,
        payload: Value,
        system_prompt_label: Option<&str>,
    ) -> Result<GeminiResponse, GenerationError> {
        let client = get_http_client();
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            model, self.config.gemini_api_key
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_payload(&payload, system_prompt_label);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let response = client
            .post(&url)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                let err_text = self.redact_api_key(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status(),
                );
                GenerationError::Transport(err_text)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = self.redact_api_key(&message.unwrap_or(body_summary));
            return Err(GenerationError::Api { status, detail });
        }

        let value = response
            .json::<GeminiResponse>()
            .await
            .map_err(|err| GenerationError::Transport(self.redact_api_key(&err.to_string())))?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_response(&value);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        Ok(value)
    }

    async fn request_image(
        &self,
        model: &str,
        source: &EncodedImage,
        instruction: &str,
        settings: &GenerationSettings,
        operation: &str,
        system_prompt_label: &str,
    ) -> Result<EncodedImage, GenerationError> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": source.mime_type(),
                            "data": source.base64_payload(),
                        }
                    },
                    { "text": instruction },
                ]
            }],
            "generationConfig": build_image_generation_config(settings),
            "safetySettings": build_safety_settings(&self.config.safety_settings),
        });

        let metadata = json!({
            "aspectRatio": settings.aspect_ratio.wire_value(),
            "imageSize": settings.resolution_tier.wire_image_size(),
        });
        log_llm_timing("gemini", model, operation, Some(metadata), || async {
            let response = self
                .call_api(model, payload, Some(system_prompt_label))
                .await?;
            extract_first_image(&response).ok_or_else(|| GenerationError::NoImageProduced {
                model: model.to_string(),
            })
        })
        .await
    }
}

impl ThumbnailModel for GeminiClient {
    async fn analyze(
        &self,
        context: &str,
        intent: Option<&str>,
    ) -> Result<AnalysisResult, GenerationError> {
        let payload = json!({
            "systemInstruction": { "parts": [{ "text": prompts::STRATEGIST_SYSTEM_PROMPT }] },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompts::analysis_request(context, intent) }]
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "topK": self.config.top_k,
                "topP": self.config.top_p,
                "maxOutputTokens": self.config.max_output_tokens,
                "responseMimeType": "application/json",
                "responseSchema": analysis_response_schema(),
            },
            "safetySettings": build_safety_settings(&self.config.safety_settings),
            "tools": [{ "google_search": {} }],
        });

        let model = self.config.analysis_model.clone();
        log_llm_timing("gemini", &model, "analyze_context", None, || async {
            let response = self
                .call_api(&model, payload, Some("strategist_system_prompt"))
                .await?;
            parse_analysis(&response)
        })
        .await
    }

    async fn synthesize(
        &self,
        concept: &Concept,
        author_image: &EncodedImage,
        settings: &GenerationSettings,
    ) -> Result<EncodedImage, GenerationError> {
        let instruction = prompts::synthesis_instruction(concept, settings);
        self.request_image(
            self.image_model_for(settings),
            author_image,
            &instruction,
            settings,
            "synthesize_thumbnail",
            "synthesis_instruction",
        )
        .await
    }

    async fn edit(
        &self,
        source_image: &EncodedImage,
        instruction: &str,
        settings: &GenerationSettings,
    ) -> Result<EncodedImage, GenerationError> {
        let instruction = prompts::edit_instruction(instruction, settings);
        self.request_image(
            self.image_model_for(settings),
            source_image,
            &instruction,
            settings,
            "edit_thumbnail",
            "edit_instruction",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AspectRatio;

    fn response_from(value: Value) -> GeminiResponse {
        serde_json::from_value(value).expect("sample response must deserialize")
    }

    #[test]
    fn analysis_schema_requires_all_fields() {
        let schema = analysis_response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, ["promise", "mechanism", "audience", "concepts"]);

        let concept_required: Vec<&str> = schema["properties"]["concepts"]["items"]["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(
            concept_required,
            ["style", "hookText", "visualPrompt", "psychology"]
        );
    }

    #[test]
    fn image_generation_config_flags_high_resolution_only() {
        let standard = build_image_generation_config(&GenerationSettings {
            aspect_ratio: AspectRatio::Landscape16x9,
            resolution_tier: ResolutionTier::Standard,
        });
        assert_eq!(standard["imageConfig"]["aspectRatio"], "16:9");
        assert!(standard["imageConfig"].get("imageSize").is_none());

        let high = build_image_generation_config(&GenerationSettings {
            aspect_ratio: AspectRatio::Portrait9x16,
            resolution_tier: ResolutionTier::High,
        });
        assert_eq!(high["imageConfig"]["aspectRatio"], "9:16");
        assert_eq!(high["imageConfig"]["imageSize"], "2K");
    }

    #[test]
    fn parse_analysis_accepts_a_conforming_document() {
        let doc = serde_json::json!({
            "promise": "escape the 9 to 5",
            "mechanism": "asset stacking",
            "audience": "mid-career builders",
            "concepts": [{
                "style": "The Authority",
                "hookText": "3 ASSETS",
                "visualPrompt": "raw garage office",
                "psychology": "austerity reads as truth"
            }]
        });
        let response = response_from(json!({
            "candidates": [{
                "content": { "parts": [{ "text": doc.to_string() }] },
                "groundingMetadata": {
                    "groundingChunks": [{ "web": { "uri": "https://example.com" } }]
                }
            }]
        }));

        let analysis = parse_analysis(&response).unwrap();
        assert_eq!(analysis.promise, "escape the 9 to 5");
        assert_eq!(analysis.concepts.len(), 1);
        assert_eq!(analysis.concepts[0].hook_text, "3 ASSETS");
        assert_eq!(analysis.sources.len(), 1);
    }

    #[test]
    fn parse_analysis_rejects_missing_or_incomplete_payloads() {
        let empty = response_from(json!({ "candidates": [] }));
        assert!(matches!(
            parse_analysis(&empty),
            Err(GenerationError::MalformedAnalysisResponse(_))
        ));

        let not_json = response_from(json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry, no" }] } }]
        }));
        assert!(matches!(
            parse_analysis(&not_json),
            Err(GenerationError::MalformedAnalysisResponse(_))
        ));

        let missing_field = json!({
            "promise": "p",
            "mechanism": "m",
            "concepts": []
        });
        let incomplete = response_from(json!({
            "candidates": [{ "content": { "parts": [{ "text": missing_field.to_string() }] } }]
        }));
        assert!(matches!(
            parse_analysis(&incomplete),
            Err(GenerationError::MalformedAnalysisResponse(_))
        ));
    }

    #[test]
    fn first_image_part_wins_and_text_parts_are_skipped() {
        let response = response_from(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here is your thumbnail" },
                    { "inlineData": { "mimeType": "image/png", "data": "Zmlyc3Q=" } },
                    { "inlineData": { "mimeType": "image/png", "data": "c2Vjb25k" } }
                ] }
            }]
        }));
        let image = extract_first_image(&response).unwrap();
        assert_eq!(image.as_data_url(), "data:image/png;base64,Zmlyc3Q=");
    }

    #[test]
    fn responses_without_image_parts_yield_none() {
        let response = response_from(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "refused" }] }
            }]
        }));
        assert!(extract_first_image(&response).is_none());

        let empty = response_from(json!({}));
        assert!(extract_first_image(&empty).is_none());
    }

    #[test]
    fn error_body_summaries_prefer_the_service_message() {
        let (message, _) = summarize_error_body(
            r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#,
        );
        assert_eq!(message.as_deref(), Some("Requested entity was not found."));

        let (message, summary) = summarize_error_body("plain text failure");
        assert!(message.is_none());
        assert_eq!(summary, "plain text failure");

        let (message, summary) = summarize_error_body("   ");
        assert!(message.is_none());
        assert_eq!(summary, "empty response body");
    }
}
