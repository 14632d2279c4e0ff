use std::env;

use anyhow::Result;
use tracing::warn;

/// Runtime configuration for the Gemini-backed generation stages. Loaded from
/// the environment (with `.env` support) and passed explicitly to the client
/// so tests can construct their own.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub analysis_model: String,
    pub image_model: String,
    pub image_pro_model: String,
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub max_output_tokens: i32,
    pub safety_settings: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_f32(name: &str, default: f32) -> f32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(default)
}

fn env_i32(name: &str, default: i32) -> i32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_safety_settings(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "permissive".to_string();
    }

    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "permissive" | "off" | "none" => "permissive".to_string(),
        "standard" => "standard".to_string(),
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; defaulting to permissive.",
                value
            );
            "permissive".to_string()
        }
    }
}

impl Config {
    pub fn load() -> Result<Config> {
        dotenvy::dotenv().ok();

        Ok(Config {
            gemini_api_key: env_string("GEMINI_API_KEY", ""),
            analysis_model: env_string("GEMINI_ANALYSIS_MODEL", "gemini-3-pro-preview"),
            image_model: env_string("GEMINI_IMAGE_MODEL", "gemini-2.5-flash-image"),
            image_pro_model: env_string("GEMINI_IMAGE_PRO_MODEL", "gemini-3-pro-image-preview"),
            temperature: env_f32("GEMINI_TEMPERATURE", 0.7),
            top_k: env_i32("GEMINI_TOP_K", 40),
            top_p: env_f32("GEMINI_TOP_P", 0.95),
            max_output_tokens: env_i32("GEMINI_MAX_OUTPUT_TOKENS", 8192),
            safety_settings: normalize_safety_settings(env_string("GEMINI_SAFETY_SETTINGS", "")),
            request_timeout_secs: env_u64("GEMINI_REQUEST_TIMEOUT_SECS", 90),
            log_level: env_string("LOG_LEVEL", "info"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_settings_normalization() {
        assert_eq!(normalize_safety_settings("".to_string()), "permissive");
        assert_eq!(normalize_safety_settings("OFF".to_string()), "permissive");
        assert_eq!(normalize_safety_settings("standard".to_string()), "standard");
        assert_eq!(normalize_safety_settings("strict".to_string()), "permissive");
    }
}
