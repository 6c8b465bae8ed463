use crate::{
    billing::cost::Complexity,
    types::{GenerationId, UserId},
};
use chrono::{DateTime, Utc};

/// Database request for persisting a successful generation
#[derive(Debug, Clone)]
pub struct GenerationCreateDBRequest {
    pub id: GenerationId,
    pub user_id: UserId,
    pub prompt: String,
    pub generated_code: String,
    pub language: String,
    pub framework: Option<String>,
    pub complexity: Complexity,
    pub credits_used: i64,
    pub model: String,
}

/// Database response for a generation record
#[derive(Debug, Clone)]
pub struct GenerationDBResponse {
    pub id: GenerationId,
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
