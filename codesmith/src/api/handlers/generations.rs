use crate::{
    api::{
        handlers::page,
        models::{
            generations::{
                EstimateQuery, EstimateResponse, GenerationCreate, GenerationCreateResponse, GenerationResponse, GenerationUpdate,
                LikeResponse, ListGenerationsQuery,
            },
            users::CurrentUser,
        },
    },
    auth::permissions::{can_read_all_resources, operation, resource, RequiresPermission},
    billing::{
        cost::generation_cost,
        generation::{self, GenerationRequest},
    },
    db::{errors::DbError, handlers::Credits, handlers::Generations},
    errors::{Error, Result},
    types::{GenerationId, Resource},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

fn not_found(id: GenerationId) -> Error {
    Error::NotFound {
        resource: "Generation".to_string(),
        id: id.to_string(),
    }
}

/// Generate code from a prompt
#[utoipa::path(
    post,
    path = "/generations",
    tag = "generations",
    summary = "Generate code",
    description = "Generate code for a prompt and charge the caller's credit balance. Nothing is charged if generation fails.",
    request_body = GenerationCreate,
    responses(
        (status = 201, description = "Code generated", body = GenerationCreateResponse),
        (status = 400, description = "Missing fields, insufficient credits, or the completion provider failed"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn create_generation(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Generations, operation::CreateOwn>,
    Json(data): Json<GenerationCreate>,
) -> Result<(StatusCode, Json<GenerationCreateResponse>)> {
    let request = GenerationRequest {
        prompt: data.prompt,
        language: data.language,
        complexity: data.complexity,
        include_tests: data.include_tests,
        include_comments: data.include_comments,
        framework: data.framework,
    };

    let generated = generation::generate(&state, &current_user, &request).await?;
    Ok((StatusCode::CREATED, Json(generated.into())))
}

/// Quote the cost of a generation
#[utoipa::path(
    get,
    path = "/generations/estimate",
    tag = "generations",
    summary = "Estimate generation cost",
    params(EstimateQuery),
    responses(
        (status = 200, description = "Cost quote", body = EstimateResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn estimate_generation(
    State(state): State<AppState>,
    Query(query): Query<EstimateQuery>,
    current_user: RequiresPermission<resource::Generations, operation::CreateOwn>,
) -> Result<Json<EstimateResponse>> {
    let cost = generation_cost(
        query.complexity.unwrap_or_default(),
        query.include_tests.unwrap_or(false),
        query.framework.as_deref(),
    );

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let balance = Credits::new(&mut conn)
        .get_balance_row(current_user.id)
        .await?
        .map_or(0, |b| b.amount);

    Ok(Json(EstimateResponse {
        cost,
        balance,
        affordable: balance >= cost,
    }))
}

/// List the caller's generations, newest first
#[utoipa::path(
    get,
    path = "/generations",
    tag = "generations",
    summary = "List own generations",
    params(ListGenerationsQuery),
    responses(
        (status = 200, description = "Generation history", body = [GenerationResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn list_generations(
    State(state): State<AppState>,
    Query(query): Query<ListGenerationsQuery>,
    current_user: RequiresPermission<resource::Generations, operation::ReadOwn>,
) -> Result<Json<Vec<GenerationResponse>>> {
    let (skip, limit) = page(query.skip, query.limit);
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let generations = Generations::new(&mut conn).list_user(current_user.id, skip, limit).await?;

    Ok(Json(generations.into_iter().map(GenerationResponse::from).collect()))
}

/// Browse generations their owners have shared
#[utoipa::path(
    get,
    path = "/generations/public",
    tag = "generations",
    summary = "List public generations",
    params(ListGenerationsQuery),
    responses(
        (status = 200, description = "Public generations, most liked first", body = [GenerationResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn list_public_generations(
    State(state): State<AppState>,
    Query(query): Query<ListGenerationsQuery>,
    _: RequiresPermission<resource::Generations, operation::ReadOwn>,
) -> Result<Json<Vec<GenerationResponse>>> {
    let (skip, limit) = page(query.skip, query.limit);
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let generations = Generations::new(&mut conn).list_public(skip, limit).await?;

    Ok(Json(generations.into_iter().map(GenerationResponse::from).collect()))
}

/// Get one generation. Visible to its owner, to admins, and to everyone once public.
#[utoipa::path(
    get,
    path = "/generations/{id}",
    tag = "generations",
    summary = "Get generation",
    params(
        ("id" = String, Path, description = "Generation ID"),
    ),
    responses(
        (status = 200, description = "Generation", body = GenerationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Generation not found"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_generation(
    State(state): State<AppState>,
    Path(id): Path<GenerationId>,
    current_user: CurrentUser,
) -> Result<Json<GenerationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let generation = Generations::new(&mut conn).get_by_id(id).await?.ok_or_else(|| not_found(id))?;

    let visible =
        generation.is_public || generation.user_id == current_user.id || can_read_all_resources(&current_user, Resource::Generations);
    if !visible {
        // Return 404 to avoid leaking existence
        return Err(not_found(id));
    }

    Ok(Json(generation.into()))
}

/// Share or unshare one of the caller's generations
#[utoipa::path(
    patch,
    path = "/generations/{id}",
    tag = "generations",
    summary = "Update generation visibility",
    params(
        ("id" = String, Path, description = "Generation ID"),
    ),
    request_body = GenerationUpdate,
    responses(
        (status = 200, description = "Updated generation", body = GenerationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Generation not found or not owned by the caller"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn update_generation(
    State(state): State<AppState>,
    Path(id): Path<GenerationId>,
    current_user: RequiresPermission<resource::Generations, operation::UpdateOwn>,
    Json(data): Json<GenerationUpdate>,
) -> Result<Json<GenerationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let generation = Generations::new(&mut conn)
        .set_public(id, current_user.id, data.is_public)
        .await
        .map_err(|e| match e {
            DbError::NotFound => not_found(id),
            other => other.into(),
        })?;

    Ok(Json(generation.into()))
}

/// Like a public generation; liking twice has no further effect
#[utoipa::path(
    post,
    path = "/generations/{id}/like",
    tag = "generations",
    summary = "Like a public generation",
    params(
        ("id" = String, Path, description = "Generation ID"),
    ),
    responses(
        (status = 200, description = "Current like count", body = LikeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Generation not found or not public"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn like_generation(
    State(state): State<AppState>,
    Path(id): Path<GenerationId>,
    current_user: RequiresPermission<resource::Generations, operation::ReadOwn>,
) -> Result<Json<LikeResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let likes_count = Generations::new(&mut conn)
        .like(id, current_user.id)
        .await
        .map_err(|e| match e {
            DbError::NotFound => not_found(id),
            other => other.into(),
        })?;

    Ok(Json(LikeResponse { likes_count }))
}
