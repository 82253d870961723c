use std::env;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use vistoria_contracts::inspection::ImageAnalysis;

use crate::provider::{combine_prompt, question_prompt, AnalysisProvider, ANALYZE_IMAGE_PROMPT};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Primary analysis tier backed by the Gemini `generateContent` endpoint.
///
/// Every call is a single blocking request with no retry; transport, auth,
/// quota and malformed-response failures all propagate so the resolver can
/// degrade to the offline tier.
pub struct GeminiProvider {
    api_base: String,
    model: String,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new() -> Self {
        let model = non_empty_env("VISTORIA_GEMINI_MODEL")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self::with_model(model)
    }

    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            api_base: env::var("GEMINI_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: model.into(),
            http: HttpClient::new(),
        }
    }

    fn api_key() -> Option<String> {
        non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
    }

    fn endpoint(&self) -> String {
        endpoint_for_model(&self.api_base, &self.model)
    }

    fn generate(&self, parts: Vec<Value>) -> Result<String> {
        let Some(api_key) = Self::api_key() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint();
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
        });

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let body = response_json_or_error("Gemini", response)?;

        extract_text(&body)
            .filter(|text| !text.trim().is_empty())
            .context("Gemini response carried no candidate text")
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze_image(&self, image_bytes: &[u8]) -> Result<String> {
        let parts = vec![
            json!({ "text": ANALYZE_IMAGE_PROMPT }),
            inline_image_part(image_bytes),
        ];
        self.generate(parts)
    }

    fn combine_analyses(&self, analyses: &[ImageAnalysis]) -> Result<String> {
        self.generate(vec![json!({ "text": combine_prompt(analyses) })])
    }

    fn answer_question(&self, question: &str, analysis_text: &str) -> Result<String> {
        self.generate(vec![json!({
            "text": question_prompt(question, analysis_text)
        })])
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn endpoint_for_model(api_base: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{api_base}/{model_path}:generateContent")
}

fn inline_image_part(image_bytes: &[u8]) -> Value {
    json!({
        "inline_data": {
            "mime_type": guess_mime_type(image_bytes),
            "data": BASE64.encode(image_bytes),
        }
    })
}

fn guess_mime_type(image_bytes: &[u8]) -> &'static str {
    match image::guess_format(image_bytes) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::WebP) => "image/webp",
        _ => "image/jpeg",
    }
}

fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("{label} response body read failed"))?;
    if !status.is_success() {
        let snippet: String = body.chars().take(300).collect();
        bail!("{label} request failed with status {status}: {snippet}");
    }
    serde_json::from_str(&body).with_context(|| format!("{label} returned a non-JSON response"))
}

fn extract_text(payload: &Value) -> Option<String> {
    let candidates = payload.get("candidates").and_then(Value::as_array)?;
    let mut out = String::new();
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
    }
    (!out.is_empty()).then_some(out)
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use serde_json::json;

    use super::*;

    #[test]
    fn non_empty_env_trims_and_filters_blank_values() {
        env::set_var("VISTORIA_TEST_ENV_BLANK", "   ");
        assert_eq!(non_empty_env("VISTORIA_TEST_ENV_BLANK"), None);
        env::set_var("VISTORIA_TEST_ENV_PADDED", "  models/custom  ");
        assert_eq!(
            non_empty_env("VISTORIA_TEST_ENV_PADDED").as_deref(),
            Some("models/custom")
        );
        assert_eq!(non_empty_env("VISTORIA_TEST_ENV_UNSET"), None);
    }

    #[test]
    fn endpoint_prefixes_bare_model_names() {
        assert_eq!(
            endpoint_for_model("https://api.example/v1beta", "gemini-1.5-flash"),
            "https://api.example/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(
            endpoint_for_model("https://api.example/v1beta", "models/custom"),
            "https://api.example/v1beta/models/custom:generateContent"
        );
    }

    #[test]
    fn extract_text_concatenates_candidate_parts() {
        let payload = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Análise " },
                        { "text": "completa." },
                    ]
                }
            }]
        });
        assert_eq!(extract_text(&payload).as_deref(), Some("Análise completa."));
    }

    #[test]
    fn extract_text_rejects_payloads_without_candidates() {
        assert_eq!(extract_text(&json!({ "error": "quota" })), None);
        assert_eq!(extract_text(&json!({ "candidates": [] })), None);
    }

    #[test]
    fn mime_type_follows_magic_bytes() {
        let png_header = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        assert_eq!(guess_mime_type(&png_header), "image/png");
        assert_eq!(guess_mime_type(&[0xff, 0xd8, 0xff, 0xe0]), "image/jpeg");
        assert_eq!(guess_mime_type(b"not an image"), "image/jpeg");
    }

    #[test]
    fn inline_part_round_trips_base64() {
        let part = inline_image_part(&[1, 2, 3]);
        let data = part["inline_data"]["data"].as_str().unwrap();
        assert_eq!(BASE64.decode(data).unwrap(), vec![1, 2, 3]);
    }
}
