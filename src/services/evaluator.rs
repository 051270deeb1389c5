//! Alt-text evaluation via an external vision-capable model
//!
//! Builds the fixed grading rubric, issues one chat-completion request
//! carrying the alt text and the image reference, and normalizes the model's
//! JSON verdict into an [`EvaluationResult`]. All provider failures collapse
//! into the single `Evaluation` error variant; no retries are performed here.

use crate::error::{Result, ThemisError};
use crate::types::{compliant_ordinal, EvaluationResult, Grade, ImageType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;

/// Chat completions endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Bilingual grading rubric sent as the system turn on every request
///
/// Defines the four image-type categories, the compliance and non-compliance
/// conditions, the alt-text writing principles, and the exact JSON object the
/// model must answer with.
const RUBRIC: &str = r#"You grade the alternative text of web images against accessibility guidelines. 이미지에 대한 대체텍스트를 평가하고, 미준수 시 새 대체텍스트를 제안한다.

Classify the image into one of four types by the role it plays on the page / 이미지 유형 분류:
1. informational (정보성): supports the body copy or carries information that matters in context
2. functional (기능성): triggers an interaction such as click or touch
3. decorative (장식적): purely aesthetic, conveys no information
4. complex (복합적): tables, charts, infographics that need structural description

Judge compliance / 준수 여부 판단:
- Compliant: the alt text states what the image means clearly and concisely and carries at least 25% of its information. Functional delivery is enough for somewhat-high; a thorough description earns very-high. Detailed scene description is not itself a compliance condition.
- Non-compliant: core information is missing (title, date, place, key participants; under 25% coverage); or the text is too long, unclear, or unrelated to its context (a board post, a school homepage, and so on). When non-compliant, propose a replacement appropriate to the image type.

Writing principles / 작성 원칙: be concise and clear; drop filler sentence endings ("입니다" and the like); separate lines with "/"; convey the key information for informational images; state the function and its outcome for functional images; use no alt text for decorative images (decorative emoji get an empty alt); describe the title, rows and columns for complex images.

Respond with a single JSON object and nothing else:
{
    "type": "one of: informational, functional, decorative, complex",
    "grade": "one of: very-high, somewhat-high, somewhat-low, very-low",
    "reason": "brief justification, stating the share of conveyed information as a percentage",
    "improvement": "replacement alt text when non-compliant; otherwise the existing text or a note"
}

The subject of your evaluation is the text, not the image itself."#;

/// Configuration for the model-backed evaluator
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// OpenAI API key
    pub api_key: String,

    /// Model to use
    pub model: String,

    /// Max tokens for the verdict
    pub max_tokens: u32,

    /// Sampling temperature; kept low for near-deterministic grading
    pub temperature: f32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: crate::config::DEFAULT_MODEL.to_string(),
            max_tokens: 256,
            temperature: 0.2,
        }
    }
}

/// Judgment seam between the HTTP surface and the model provider
///
/// The HTTP layer only ever talks to this trait, so tests can substitute a
/// deterministic implementation that never touches the network.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Grade `alt_text` against the image carried in `image_data` (a data URL)
    async fn evaluate(&self, alt_text: &str, image_data: &str) -> Result<EvaluationResult>;
}

/// OpenAI chat-completion request format
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrlPart },
}

#[derive(Debug, Serialize)]
struct ImageUrlPart {
    url: String,
    /// Requested analysis detail; always "low"
    detail: &'static str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format: &'static str,
}

/// OpenAI chat-completion response format
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

/// Verdict shape the rubric demands from the model
#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(rename = "type", default)]
    image_type: String,
    #[serde(default)]
    grade: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    improvement: String,
}

/// Evaluator backed by an OpenAI vision-capable model
pub struct OpenAiEvaluator {
    config: EvaluatorConfig,
    client: reqwest::Client,
}

impl OpenAiEvaluator {
    /// Create a new evaluator with custom config
    pub fn new(config: EvaluatorConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ThemisError::Config("OPENAI_API_KEY not set".to_string()));
        }

        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    /// Create with default config
    pub fn with_default() -> Result<Self> {
        Self::new(EvaluatorConfig::default())
    }

    fn build_request(&self, alt_text: &str, image_data: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: 1.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(RUBRIC.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: format!("alt='{}'", alt_text),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrlPart {
                                url: image_data.to_string(),
                                detail: "low",
                            },
                        },
                    ]),
                },
            ],
            response_format: ResponseFormat {
                format: "json_object",
            },
        }
    }

    /// Normalize the model's JSON payload into an [`EvaluationResult`]
    ///
    /// Recognized labels are canonicalized; an unrecognized grade keeps the
    /// raw string and falls back to the default ordinal.
    fn normalize(payload: &str) -> Result<EvaluationResult> {
        let raw: RawVerdict = serde_json::from_str(payload).map_err(|e| {
            ThemisError::Evaluation(format!("model returned a non-JSON verdict: {}", e))
        })?;

        let image_type = match ImageType::parse(&raw.image_type) {
            Some(t) => t.as_str().to_string(),
            None => raw.image_type,
        };
        let grade = match Grade::parse(&raw.grade) {
            Some(g) => g.as_str().to_string(),
            None => raw.grade,
        };
        let compliant = compliant_ordinal(&grade);

        Ok(EvaluationResult {
            image_type,
            grade,
            reason: raw.reason,
            improvement: raw.improvement,
            compliant,
        })
    }
}

#[async_trait]
impl Evaluator for OpenAiEvaluator {
    async fn evaluate(&self, alt_text: &str, image_data: &str) -> Result<EvaluationResult> {
        debug!("Requesting compliance verdict from {}", self.config.model);

        let request = self.build_request(alt_text, image_data);

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ThemisError::Evaluation(format!("model request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ThemisError::Evaluation(format!(
                "model request failed with status {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            ThemisError::Evaluation(format!("failed to parse provider response: {}", e))
        })?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ThemisError::Evaluation("empty response from model".to_string()))?;

        Self::normalize(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_canonical_verdict() {
        let payload = r#"{
            "type": "informational",
            "grade": "somewhat-high",
            "reason": "carries roughly 60% of the poster's information",
            "improvement": "2024 spring festival poster / main stage schedule"
        }"#;

        let result = OpenAiEvaluator::normalize(payload).unwrap();
        assert_eq!(result.image_type, "informational");
        assert_eq!(result.grade, "somewhat-high");
        assert_eq!(result.compliant, 1);
    }

    #[test]
    fn test_normalize_canonicalizes_korean_labels() {
        let payload = r#"{
            "type": "기능성",
            "grade": "매우높음",
            "reason": "버튼의 기능과 결과를 모두 설명, 정보량 90%",
            "improvement": "기존 대체텍스트 유지"
        }"#;

        let result = OpenAiEvaluator::normalize(payload).unwrap();
        assert_eq!(result.image_type, "functional");
        assert_eq!(result.grade, "very-high");
        assert_eq!(result.compliant, 0);
    }

    #[test]
    fn test_normalize_keeps_unknown_grade_with_default_ordinal() {
        let payload = r#"{"type": "decorative", "grade": "medium", "reason": "", "improvement": ""}"#;

        let result = OpenAiEvaluator::normalize(payload).unwrap();
        assert_eq!(result.grade, "medium");
        assert_eq!(result.compliant, 2);
    }

    #[test]
    fn test_normalize_tolerates_missing_fields() {
        let result = OpenAiEvaluator::normalize("{}").unwrap();
        assert_eq!(result.grade, "");
        assert_eq!(result.compliant, 2);
    }

    #[test]
    fn test_normalize_rejects_non_json() {
        let err = OpenAiEvaluator::normalize("I cannot grade this image.").unwrap_err();
        assert!(matches!(err, ThemisError::Evaluation(_)));
    }

    #[test]
    fn test_missing_api_key_fails_construction() {
        let config = EvaluatorConfig {
            api_key: String::new(),
            model: crate::config::DEFAULT_MODEL.to_string(),
            max_tokens: 256,
            temperature: 0.2,
        };
        assert!(matches!(
            OpenAiEvaluator::new(config),
            Err(ThemisError::Config(_))
        ));
    }

    #[test]
    fn test_request_shape_matches_provider_contract() {
        let config = EvaluatorConfig {
            api_key: "sk-test".to_string(),
            model: crate::config::DEFAULT_MODEL.to_string(),
            max_tokens: 256,
            temperature: 0.2,
        };
        let evaluator = OpenAiEvaluator::new(config).unwrap();

        let request = evaluator.build_request("school logo", "data:image/png;base64,AAAA");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], crate::config::DEFAULT_MODEL);
        assert_eq!(value["max_tokens"], 256);
        assert!((value["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"][0]["text"], "alt='school logo'");
        assert_eq!(
            value["messages"][1]["content"][1]["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
        assert_eq!(value["messages"][1]["content"][1]["image_url"]["detail"], "low");
    }

    #[tokio::test]
    #[ignore] // Requires OPENAI_API_KEY
    async fn test_evaluate_live() {
        let evaluator = OpenAiEvaluator::with_default().unwrap();

        // 1x1 white JPEG
        let pixel = "data:image/jpeg;base64,/9j/4AAQSkZJRgABAQEAYABgAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/wAALCAABAAEBAREA/8QAFAABAAAAAAAAAAAAAAAAAAAACf/EABQQAQAAAAAAAAAAAAAAAAAAAAD/2gAIAQEAAD8AKp//2Q==";

        let result = evaluator.evaluate("white square", pixel).await.unwrap();
        assert!(!result.grade.is_empty());
        assert!((0..=3).contains(&result.compliant));
    }
}
