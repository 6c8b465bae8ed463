use crate::{
    api::models::users::{Role, UserResponse},
    auth::current_user::{provision_user, Claims},
    completion::{mock::MockProvider, CompletionProvider},
    config::{AuthConfig, CompletionConfig, Config, CreditsConfig, PaymentMethodSeed},
    crypto::SecretCipher,
    db::{
        handlers::{Credits, PaymentMethods, Repository, Users},
        models::{
            credits::{CreditTransactionCreateDBRequest, CreditTransactionType},
            payment_methods::{PaymentMethodConfig, PaymentMethodCreateDBRequest, PaymentMethodDBResponse},
            users::UserUpdateDBRequest,
        },
    },
    types::UserId,
    AppState,
};

use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_INITIAL_GRANT: i64 = 50;

/// Code block returned by the default mock provider
pub const MOCK_COMPLETION: &str = "```python\nprint('hello')\n```";

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_provider(pool, Arc::new(MockProvider::returning(MOCK_COMPLETION))).await
}

pub async fn create_test_app_with_provider(pool: PgPool, provider: Arc<dyn CompletionProvider>) -> TestServer {
    let router = crate::setup_app(pool, create_test_config(), provider)
        .await
        .expect("Failed to setup test app");
    TestServer::new(router).expect("Failed to create test server")
}

/// Application state without a router, for exercising billing workflows directly
pub async fn create_test_state(pool: PgPool, provider: Arc<dyn CompletionProvider>) -> AppState {
    let config = create_test_config();
    let cipher = SecretCipher::from_secret_key(config.secret_key.as_deref().expect("test config has a secret key"))
        .expect("Failed to derive test cipher");

    AppState::builder()
        .db(pool)
        .config(config)
        .completion(provider)
        .cipher(cipher)
        .build()
}

pub fn create_test_config() -> Config {
    let database_url = std::env::var("TEST_DATABASE_URL").unwrap_or_else(|_| "postgres://postgres@localhost/test".to_string());

    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: AuthConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            audience: None,
        },
        completion: CompletionConfig {
            api_key: Some("test-api-key".to_string()),
            ..Default::default()
        },
        credits: CreditsConfig {
            initial_grant: TEST_INITIAL_GRANT,
        },
        payment_methods: vec![
            PaymentMethodSeed {
                name: "bank_transfer".to_string(),
                display_name: "Bank Transfer".to_string(),
                enabled: true,
                config: PaymentMethodConfig::BankTransfer {
                    bank_name: "Test Bank".to_string(),
                    account_name: "Codesmith".to_string(),
                    account_number: "12345678".to_string(),
                    instructions: Some("Include your email in the reference".to_string()),
                },
            },
            PaymentMethodSeed {
                name: "card".to_string(),
                display_name: "Card".to_string(),
                enabled: true,
                config: PaymentMethodConfig::Card {
                    processor: "test".to_string(),
                    merchant_id: "merchant_test".to_string(),
                },
            },
        ],
        cors: Default::default(),
        enable_metrics: false,
    }
}

/// Provision a user the way the first authenticated request would, then apply `role`
pub async fn create_test_user(pool: &PgPool, role: Role) -> UserResponse {
    let id = Uuid::new_v4();
    let claims = Claims {
        sub: id,
        email: format!("user_{}@example.com", id.simple()),
        name: Some("Test User".to_string()),
        exp: far_future(),
    };

    let user = provision_user(pool, &claims, TEST_INITIAL_GRANT)
        .await
        .expect("Failed to provision test user");
    if role == Role::User {
        return UserResponse::from(user);
    }

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let updated = Users::new(&mut conn)
        .update(
            user.id,
            &UserUpdateDBRequest {
                role: Some(role),
                ..Default::default()
            },
        )
        .await
        .expect("Failed to set test user role");
    UserResponse::from(updated)
}

pub async fn create_test_admin_user(pool: &PgPool) -> UserResponse {
    create_test_user(pool, Role::Admin).await
}

/// Move a user's balance to `target` with an admin adjustment
pub async fn set_test_balance(pool: &PgPool, user_id: UserId, target: i64) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut credits = Credits::new(&mut conn);
    let current = credits.get_balance(user_id).await.expect("Failed to read balance");
    if current == target {
        return;
    }
    credits
        .apply(&CreditTransactionCreateDBRequest::new(user_id, CreditTransactionType::AdminAdjustment, target - current).description("Test balance"))
        .await
        .expect("Failed to set test balance");
}

pub async fn get_test_balance(pool: &PgPool, user_id: UserId) -> i64 {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Credits::new(&mut conn).get_balance(user_id).await.expect("Failed to read balance")
}

pub async fn create_test_payment_method(pool: &PgPool, config: PaymentMethodConfig, enabled: bool) -> PaymentMethodDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    PaymentMethods::new(&mut conn)
        .create(&PaymentMethodCreateDBRequest {
            name: format!("method_{}", Uuid::new_v4().simple()),
            display_name: "Test Method".to_string(),
            enabled,
            config,
        })
        .await
        .expect("Failed to create test payment method")
}

fn far_future() -> usize {
    (chrono::Utc::now().timestamp() + 24 * 3600) as usize
}

/// Sign a bearer token the identity provider would issue
pub fn mint_token(user_id: UserId, email: &str) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": user_id, "email": email, "exp": far_future() }),
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign test token")
}

pub fn add_auth_headers(user: &UserResponse) -> (String, String) {
    ("authorization".to_string(), format!("Bearer {}", mint_token(user.id, &user.email)))
}
