use crate::{
    api::models::settings::{ApiKeySource, CompletionApiKeyStatus, CompletionApiKeyUpdate},
    auth::permissions::{operation, resource, RequiresPermission},
    crypto::mask_secret,
    db::{
        handlers::{settings::COMPLETION_API_KEY, AdminLogs, Settings},
        models::admin_logs::AdminLogCreateDBRequest,
    },
    errors::{Error, Result},
    AppState,
};
use axum::{extract::State, response::Json};
use serde_json::json;
use tracing::{error, info, warn};

/// Rotate the completion provider API key
#[utoipa::path(
    put,
    path = "/settings/completion-api-key",
    tag = "admin",
    summary = "Rotate completion API key",
    description = "Store a new API key for the code generation provider (admin only). The key is encrypted at rest \
                   and takes precedence over the configured one for all subsequent generations.",
    request_body = CompletionApiKeyUpdate,
    responses(
        (status = 200, description = "Key stored", body = CompletionApiKeyStatus),
        (status = 400, description = "Blank key"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn set_completion_api_key(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Settings, operation::UpdateAll>,
    Json(data): Json<CompletionApiKeyUpdate>,
) -> Result<Json<CompletionApiKeyStatus>> {
    let api_key = data.api_key.trim();
    if api_key.is_empty() {
        return Err(Error::BadRequest {
            message: "api_key must not be blank".to_string(),
        });
    }

    let sealed = state.cipher.encrypt(api_key).map_err(|e| {
        error!("Failed to encrypt completion API key: {}", e);
        Error::Internal {
            operation: "encrypt completion API key".to_string(),
        }
    })?;
    let masked_key = mask_secret(api_key);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    Settings::new(&mut tx).set(COMPLETION_API_KEY, &sealed, current_user.id).await?;
    AdminLogs::new(&mut tx)
        .create(&AdminLogCreateDBRequest {
            admin_id: current_user.id,
            action: "completion_api_key_rotated".to_string(),
            target_user_id: None,
            details: json!({ "masked_key": masked_key }),
        })
        .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(admin_id = %current_user.id, "Completion API key rotated");
    Ok(Json(CompletionApiKeyStatus {
        source: ApiKeySource::Settings,
        masked_key: Some(masked_key),
    }))
}

/// Which completion API key is active
#[utoipa::path(
    get,
    path = "/settings/completion-api-key",
    tag = "admin",
    summary = "Completion API key status",
    description = "Where the active key comes from and its last characters (admin only). The key itself is never returned.",
    responses(
        (status = 200, description = "Key status", body = CompletionApiKeyStatus),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_completion_api_key(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Settings, operation::ReadAll>,
) -> Result<Json<CompletionApiKeyStatus>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if let Some(sealed) = Settings::new(&mut conn).get(COMPLETION_API_KEY).await? {
        match state.cipher.decrypt(&sealed) {
            Ok(key) => {
                return Ok(Json(CompletionApiKeyStatus {
                    source: ApiKeySource::Settings,
                    masked_key: Some(mask_secret(&key)),
                }))
            }
            Err(e) => warn!("Stored completion API key is unreadable: {}", e),
        }
    }

    let status = match state.config.completion.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(key) => CompletionApiKeyStatus {
            source: ApiKeySource::Config,
            masked_key: Some(mask_secret(key)),
        },
        None => CompletionApiKeyStatus {
            source: ApiKeySource::Unset,
            masked_key: None,
        },
    };
    Ok(Json(status))
}
