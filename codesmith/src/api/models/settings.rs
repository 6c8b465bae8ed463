use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionApiKeyUpdate {
    pub api_key: String,
}

/// Where the active completion API key comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeySource {
    /// Rotated from the admin console
    Settings,
    /// Configuration file or environment
    Config,
    Unset,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionApiKeyStatus {
    pub source: ApiKeySource,
    /// Last characters of the active key
    pub masked_key: Option<String>,
}
