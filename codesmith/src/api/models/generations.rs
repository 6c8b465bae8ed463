use crate::{
    billing::{cost::Complexity, generation::GeneratedCode},
    db::models::generations::GenerationDBResponse,
    types::{GenerationId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn default_true() -> bool {
    true
}

/// Request body for a new generation. `prompt` and `language` are required and must not be blank.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerationCreate {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub include_tests: bool,
    #[serde(default = "default_true")]
    pub include_comments: bool,
    pub framework: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerationCreateResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: GenerationId,
    pub code: String,
    pub credits_used: i64,
    pub remaining_credits: i64,
    pub model: String,
}

impl From<GeneratedCode> for GenerationCreateResponse {
    fn from(generated: GeneratedCode) -> Self {
        Self {
            id: generated.id,
            code: generated.code,
            credits_used: generated.credits_used,
            remaining_credits: generated.remaining_credits,
            model: generated.model,
        }
    }
}

/// Quote parameters; same options as a generation request
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct EstimateQuery {
    pub complexity: Option<Complexity>,
    pub include_tests: Option<bool>,
    pub framework: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EstimateResponse {
    pub cost: i64,
    pub balance: i64,
    pub affordable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: GenerationId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub prompt: String,
    pub generated_code: String,
    pub language: String,
    pub framework: Option<String>,
    pub complexity: Complexity,
    pub credits_used: i64,
    pub model: String,
    pub is_public: bool,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<GenerationDBResponse> for GenerationResponse {
    fn from(db: GenerationDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            prompt: db.prompt,
            generated_code: db.generated_code,
            language: db.language,
            framework: db.framework,
            complexity: db.complexity,
            credits_used: db.credits_used,
            model: db.model,
            is_public: db.is_public,
            likes_count: db.likes_count,
            created_at: db.created_at,
        }
    }
}

/// Only visibility can change after creation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerationUpdate {
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LikeResponse {
    pub likes_count: i64,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListGenerationsQuery {
    /// Number of items to skip
    #[param(default = 0, minimum = 0)]
    pub skip: Option<i64>,

    /// Maximum number of items to return
    #[param(default = 100, minimum = 1, maximum = 1000)]
    pub limit: Option<i64>,
}
