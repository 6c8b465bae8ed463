use crate::{
    api::models::users::{CurrentUser, Role},
    config::AuthConfig,
    db::{
        errors::DbError,
        handlers::{Credits, Repository, Users},
        models::{
            credits::{CreditTransactionCreateDBRequest, CreditTransactionType},
            users::{UserCreateDBRequest, UserDBResponse},
        },
    },
    errors::{Error, Result},
    AppState,
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Stable user id
    pub sub: Uuid,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: usize,
}

fn bearer_token(parts: &Parts) -> Result<&str> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| Error::AuthFailed {
            reason: "missing authorization header".to_string(),
        })?
        .to_str()
        .map_err(|_| Error::AuthFailed {
            reason: "malformed authorization header".to_string(),
        })?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::AuthFailed {
            reason: "expected a bearer token".to_string(),
        })
}

/// Verify an HS256 token and return its claims
pub fn verify_token(token: &str, config: &AuthConfig) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    decode::<Claims>(token, &DecodingKey::from_secret(config.jwt_secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            Error::AuthFailed {
                reason: "invalid or expired token".to_string(),
            }
        })
}

/// Look up the user for these claims, creating them on first sight.
///
/// Creation, the zero balance row and the welcome bonus commit together, and the insert is
/// conflict-tolerant so concurrent first requests provision once.
#[instrument(skip(db, claims), fields(user_id = %claims.sub), err)]
pub async fn provision_user(db: &PgPool, claims: &Claims, initial_grant: i64) -> Result<UserDBResponse> {
    {
        let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        if let Some(user) = Users::new(&mut conn).get_by_id(claims.sub).await? {
            return Ok(user);
        }
    }

    let mut tx = db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let request = UserCreateDBRequest {
        id: claims.sub,
        email: claims.email.clone(),
        display_name: claims.name.clone(),
        role: Role::User,
    };

    let created = Users::new(&mut tx).insert_if_absent(&request).await?;
    let user = match created {
        Some(user) => {
            let mut credits = Credits::new(&mut tx);
            credits.ensure_balance(user.id).await?;
            if initial_grant > 0 {
                credits
                    .apply(&CreditTransactionCreateDBRequest::new(user.id, CreditTransactionType::Bonus, initial_grant).description("Welcome bonus"))
                    .await?;
            }
            info!("Provisioned new user with {} starting credits", initial_grant);
            user
        }
        // Lost the race to a concurrent first request
        None => Users::new(&mut tx).get_by_id(claims.sub).await?.ok_or(DbError::NotFound)?,
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(user)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // RequiresPermission and a plain CurrentUser may both be extracted for one request
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(parts)?;
        let claims = verify_token(token, &state.config.auth)?;
        let user = provision_user(&state.db, &claims, state.config.credits.initial_grant).await?;

        if user.is_banned {
            return Err(Error::Forbidden {
                reason: "account is banned".to_string(),
            });
        }

        let current_user = CurrentUser::from(user);
        parts.extensions.insert(current_user.clone());
        Ok(current_user)
    }
}
