use crate::{
    billing::cost::Complexity,
    db::{
        errors::{DbError, Result},
        models::generations::{GenerationCreateDBRequest, GenerationDBResponse},
    },
    types::{GenerationId, UserId},
};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, PgConnection};

#[derive(Debug, Clone, FromRow)]
struct CodeGeneration {
    id: GenerationId,
    user_id: UserId,
    prompt: String,
    generated_code: String,
    language: String,
    framework: Option<String>,
    complexity: String,
    credits_used: i64,
    model: String,
    is_public: bool,
    likes_count: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<CodeGeneration> for GenerationDBResponse {
    type Error = DbError;

    fn try_from(g: CodeGeneration) -> Result<Self> {
        let complexity = g
            .complexity
            .parse::<Complexity>()
            .map_err(|_| DbError::InvalidData(format!("unknown complexity '{}' on generation {}", g.complexity, g.id)))?;

        Ok(Self {
            id: g.id,
            user_id: g.user_id,
            prompt: g.prompt,
            generated_code: g.generated_code,
            language: g.language,
            framework: g.framework,
            complexity,
            credits_used: g.credits_used,
            model: g.model,
            is_public: g.is_public,
            likes_count: g.likes_count,
            created_at: g.created_at,
        })
    }
}

fn convert_all(rows: Vec<CodeGeneration>) -> Result<Vec<GenerationDBResponse>> {
    rows.into_iter().map(GenerationDBResponse::try_from).collect()
}

const GENERATION_COLUMNS: &str =
    "id, user_id, prompt, generated_code, language, framework, complexity, credits_used, model, is_public, likes_count, created_at";

pub struct Generations<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Generations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &GenerationCreateDBRequest) -> Result<GenerationDBResponse> {
        let generation = sqlx::query_as::<_, CodeGeneration>(&format!(
            r#"
            INSERT INTO code_generations
                (id, user_id, prompt, generated_code, language, framework, complexity, credits_used, model)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {GENERATION_COLUMNS}
            "#
        ))
        .bind(request.id)
        .bind(request.user_id)
        .bind(&request.prompt)
        .bind(&request.generated_code)
        .bind(&request.language)
        .bind(&request.framework)
        .bind(request.complexity.as_str())
        .bind(request.credits_used)
        .bind(&request.model)
        .fetch_one(&mut *self.db)
        .await?;

        generation.try_into()
    }

    pub async fn get_by_id(&mut self, id: GenerationId) -> Result<Option<GenerationDBResponse>> {
        let generation = sqlx::query_as::<_, CodeGeneration>(&format!("SELECT {GENERATION_COLUMNS} FROM code_generations WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        generation.map(GenerationDBResponse::try_from).transpose()
    }

    /// A user's own history, newest first
    pub async fn list_user(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<GenerationDBResponse>> {
        let rows = sqlx::query_as::<_, CodeGeneration>(&format!(
            "SELECT {GENERATION_COLUMNS} FROM code_generations WHERE user_id = $1 ORDER BY created_at DESC, id DESC OFFSET $2 LIMIT $3"
        ))
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        convert_all(rows)
    }

    /// Public gallery, newest first
    pub async fn list_public(&mut self, skip: i64, limit: i64) -> Result<Vec<GenerationDBResponse>> {
        let rows = sqlx::query_as::<_, CodeGeneration>(&format!(
            "SELECT {GENERATION_COLUMNS} FROM code_generations WHERE is_public ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2"
        ))
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        convert_all(rows)
    }

    /// Change visibility of a generation owned by `user_id`
    pub async fn set_public(&mut self, id: GenerationId, user_id: UserId, is_public: bool) -> Result<GenerationDBResponse> {
        let generation = sqlx::query_as::<_, CodeGeneration>(&format!(
            "UPDATE code_generations SET is_public = $3 WHERE id = $1 AND user_id = $2 RETURNING {GENERATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(is_public)
        .fetch_optional(&mut *self.db)
        .await?;

        generation.ok_or(DbError::NotFound)?.try_into()
    }

    /// Like a public generation. Idempotent per user; returns the current like count.
    pub async fn like(&mut self, id: GenerationId, user_id: UserId) -> Result<i64> {
        let mut tx = self.db.begin().await?;

        let is_public = sqlx::query_scalar::<_, bool>("SELECT is_public FROM code_generations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if is_public != Some(true) {
            return Err(DbError::NotFound);
        }

        let inserted = sqlx::query("INSERT INTO generation_likes (generation_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let likes = if inserted > 0 {
            sqlx::query_scalar::<_, i64>("UPDATE code_generations SET likes_count = likes_count + 1 WHERE id = $1 RETURNING likes_count")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
        } else {
            sqlx::query_scalar::<_, i64>("SELECT likes_count FROM code_generations WHERE id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
        };

        tx.commit().await?;
        Ok(likes)
    }

    pub async fn count(&mut self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM code_generations")
            .fetch_one(&mut *self.db)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;
    use uuid::Uuid;

    async fn create_user(pool: &PgPool) -> UserId {
        let user_id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, email) VALUES ($1, $2)")
            .bind(user_id)
            .bind(format!("{}@example.com", user_id.simple()))
            .execute(pool)
            .await
            .unwrap();
        user_id
    }

    fn request(user_id: UserId) -> GenerationCreateDBRequest {
        GenerationCreateDBRequest {
            id: Uuid::new_v4(),
            user_id,
            prompt: "reverse a string".to_string(),
            generated_code: "fn rev(s: &str) -> String { s.chars().rev().collect() }".to_string(),
            language: "rust".to_string(),
            framework: None,
            complexity: Complexity::Advanced,
            credits_used: 2,
            model: "test-model".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_uses_caller_id(pool: PgPool) {
        let user_id = create_user(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Generations::new(&mut conn);

        let req = request(user_id);
        let created = repo.create(&req).await.unwrap();
        assert_eq!(created.id, req.id);
        assert_eq!(created.complexity, Complexity::Advanced);
        assert!(!created.is_public);
        assert_eq!(created.likes_count, 0);

        let fetched = repo.get_by_id(req.id).await.unwrap().expect("generation should exist");
        assert_eq!(fetched.generated_code, req.generated_code);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_complexity_is_invalid_data(pool: PgPool) {
        let user_id = create_user(&pool).await;
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO code_generations (id, user_id, prompt, generated_code, language, complexity, credits_used, model) \
             VALUES ($1, $2, 'p', 'c', 'rust', 'galaxy-brain', 1, 'm')",
        )
        .bind(id)
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let result = Generations::new(&mut conn).get_by_id(id).await;
        assert!(matches!(result, Err(DbError::InvalidData(_))));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_set_public_only_by_owner(pool: PgPool) {
        let owner = create_user(&pool).await;
        let other = create_user(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Generations::new(&mut conn);
        let created = repo.create(&request(owner)).await.unwrap();

        assert!(matches!(repo.set_public(created.id, other, true).await, Err(DbError::NotFound)));

        let updated = repo.set_public(created.id, owner, true).await.unwrap();
        assert!(updated.is_public);

        let public = repo.list_public(0, 10).await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, created.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_like_is_idempotent_and_requires_public(pool: PgPool) {
        let owner = create_user(&pool).await;
        let fan = create_user(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Generations::new(&mut conn);
        let created = repo.create(&request(owner)).await.unwrap();

        assert!(matches!(repo.like(created.id, fan).await, Err(DbError::NotFound)));

        repo.set_public(created.id, owner, true).await.unwrap();
        assert_eq!(repo.like(created.id, fan).await.unwrap(), 1);
        assert_eq!(repo.like(created.id, fan).await.unwrap(), 1);
        assert_eq!(repo.like(created.id, owner).await.unwrap(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_user_history(pool: PgPool) {
        let user_id = create_user(&pool).await;
        let other = create_user(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Generations::new(&mut conn);

        for _ in 0..3 {
            repo.create(&request(user_id)).await.unwrap();
        }
        repo.create(&request(other)).await.unwrap();

        let history = repo.list_user(user_id, 0, 10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|g| g.user_id == user_id));
        assert!(history.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(repo.count().await.unwrap(), 4);
    }
}
