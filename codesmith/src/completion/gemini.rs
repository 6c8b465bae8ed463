use super::{CompletionError, CompletionProvider, CompletionRequest};
use crate::config::{CompletionConfig, SamplingConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

/// `generateContent` client for the Gemini API
pub struct GeminiProvider {
    client: reqwest::Client,
    api_url: Url,
    model: String,
    sampling: SamplingConfig,
}

impl GeminiProvider {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            sampling: config.sampling.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url.as_str().trim_end_matches('/'),
            self.model
        )
    }

    fn build_request(&self, request: &CompletionRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Role::User,
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                }],
            }],
            system_instruction: Some(SystemInstruction {
                parts: vec![Part {
                    text: Some(request.system_prompt.clone()),
                }],
            }),
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(self.sampling.max_output_tokens),
                temperature: Some(self.sampling.temperature),
                top_p: Some(self.sampling.top_p),
                top_k: Some(self.sampling.top_k),
            }),
            safety_settings: Some(
                [
                    HarmCategory::Harassment,
                    HarmCategory::HateSpeech,
                    HarmCategory::SexuallyExplicit,
                    HarmCategory::DangerousContent,
                ]
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: HarmBlockThreshold::BlockMediumAndAbove,
                })
                .collect(),
            ),
        }
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

// Errors carry no URL so nothing request-specific reaches logs or clients
fn transport_error(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Transport(e.without_url())
    }
}

#[async_trait::async_trait]
impl CompletionProvider for GeminiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, api_key: &str, request: &CompletionRequest) -> Result<String, CompletionError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&self.build_request(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Completion provider returned {}", status);
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(transport_error)?;

        if let Some(reason) = body.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
            debug!("Prompt blocked by provider: {}", reason);
        }

        let text = body.first_candidate_text();
        if text.trim().is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Vec<SafetySetting>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn first_candidate_text(&self) -> String {
        self.candidates
            .as_ref()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.iter().filter_map(|part| part.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
    #[serde(default = "Role::model")]
    role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Role {
    User,
    Model,
}

impl Role {
    fn model() -> Self {
        Role::Model
    }
}

/// Only text parts matter here; other part kinds deserialize with `text: None`
#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: HarmCategory,
    threshold: HarmBlockThreshold,
}

#[derive(Debug, Serialize)]
enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum HarmBlockThreshold {
    BlockMediumAndAbove,
}
