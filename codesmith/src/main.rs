mod api;
mod auth;
mod billing;
mod completion;
mod config;
mod crypto;
mod db;
mod errors;
mod metrics;
mod openapi;
mod types;

#[cfg(test)]
mod test_utils;

use crate::{
    completion::{CompletionProvider, GeminiProvider},
    config::PaymentMethodSeed,
    crypto::SecretCipher,
    db::{
        handlers::{PaymentMethods, Repository, Settings},
        models::payment_methods::PaymentMethodCreateDBRequest,
    },
    metrics::BillingMetrics,
    openapi::ApiDoc,
};
use anyhow::Context;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, Request, Response,
    },
    routing::{get, patch, post, put},
    Router,
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use clap::Parser;
use config::{Args, Config};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, instrument, Span};
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

/// Flag in `system_config` marking that configured payment methods were inserted
const PAYMENT_METHODS_SEEDED: &str = "payment_methods_seeded";

#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub completion: Arc<dyn CompletionProvider>,
    pub cipher: SecretCipher,
    pub metrics: Option<BillingMetrics>,
}

/// Insert the configured payment methods (run only once)
///
/// Later edits made through the admin API are never overwritten, even if the configuration
/// changes.
pub async fn seed_payment_methods(seeds: &[PaymentMethodSeed], db: &PgPool) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;

    if !Settings::new(&mut tx).claim_flag(PAYMENT_METHODS_SEEDED).await? {
        info!("Payment methods already seeded, skipping");
        tx.commit().await?;
        return Ok(());
    }

    info!("Seeding {} payment methods", seeds.len());
    for seed in seeds {
        let mut repo = PaymentMethods::new(&mut tx);
        if repo.get_by_name(&seed.name).await?.is_some() {
            debug!("Payment method {} already exists", seed.name);
            continue;
        }
        repo.create(&PaymentMethodCreateDBRequest {
            name: seed.name.clone(),
            display_name: seed.display_name.clone(),
            enabled: seed.enabled,
            config: seed.config.clone(),
        })
        .await
        .with_context(|| format!("Failed to seed payment method {}", seed.name))?;
    }

    tx.commit().await?;
    Ok(())
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    use crate::config::CorsOrigin;

    // tower-http panics on "*" inside an origin list, so a wildcard must use AllowOrigin::any
    let allow_origin = if config.cors.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::PUT])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(config.cors.allow_credentials);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

pub async fn setup_app(pool: PgPool, config: Config, completion: Arc<dyn CompletionProvider>) -> anyhow::Result<Router> {
    debug!("Setting up application");
    seed_payment_methods(&config.payment_methods, &pool).await?;

    let secret_key = config.secret_key.as_deref().context("secret_key must be set")?;
    let cipher = SecretCipher::from_secret_key(secret_key)?;

    let mut app_state = AppState::builder()
        .db(pool)
        .config(config)
        .completion(completion)
        .cipher(cipher)
        .build();
    build_router(&mut app_state).await
}

#[instrument(skip(state))]
pub async fn build_router(state: &mut AppState) -> anyhow::Result<Router> {
    if state.config.enable_metrics {
        let registry = prometheus::Registry::new();
        let billing_metrics = BillingMetrics::new(&registry).context("Failed to create billing metrics")?;
        state.metrics = Some(billing_metrics);
    }

    let api_routes = Router::new()
        // Generations
        .route(
            "/generations",
            get(api::handlers::generations::list_generations).post(api::handlers::generations::create_generation),
        )
        .route("/generations/estimate", get(api::handlers::generations::estimate_generation))
        .route("/generations/public", get(api::handlers::generations::list_public_generations))
        .route(
            "/generations/{id}",
            get(api::handlers::generations::get_generation).patch(api::handlers::generations::update_generation),
        )
        .route("/generations/{id}/like", post(api::handlers::generations::like_generation))
        // Payments
        .route(
            "/payments",
            get(api::handlers::payments::list_payments).post(api::handlers::payments::create_payment),
        )
        .route("/payments/{id}", get(api::handlers::payments::get_payment))
        .route("/payments/{id}/review", post(api::handlers::payments::review_payment))
        .route(
            "/payment-methods",
            get(api::handlers::payment_methods::list_payment_methods).post(api::handlers::payment_methods::create_payment_method),
        )
        .route("/payment-methods/{id}", patch(api::handlers::payment_methods::update_payment_method))
        // Credit ledger
        .route(
            "/transactions",
            get(api::handlers::transactions::list_transactions).post(api::handlers::transactions::create_transaction),
        )
        .route("/transactions/{transaction_id}", get(api::handlers::transactions::get_transaction))
        // Users
        .route("/users", get(api::handlers::users::list_users))
        .route(
            "/users/{user_id}",
            get(api::handlers::users::get_user).patch(api::handlers::users::update_user),
        )
        // Admin console
        .route("/stats", get(api::handlers::stats::get_stats))
        .route("/admin-logs", get(api::handlers::admin_logs::list_admin_logs))
        .route(
            "/settings/completion-api-key",
            put(api::handlers::settings::set_completion_api_key).get(api::handlers::settings::get_completion_api_key),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = %response.status(),
                        latency = ?latency,
                        "request completed"
                    );
                }),
        )
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/api/docs"));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        let billing_registry = state
            .metrics
            .as_ref()
            .map(|m| m.registry().clone())
            .unwrap_or_else(prometheus::Registry::new);

        // HTTP metrics from axum-prometheus followed by the billing counters
        router = router
            .route(
                "/internal/metrics",
                get(|| async move {
                    use prometheus::{Encoder, TextEncoder};

                    let mut rendered = metric_handle.render();
                    let mut buffer = vec![];
                    if let Err(e) = TextEncoder::new().encode(&billing_registry.gather(), &mut buffer) {
                        error!("Failed to encode billing metrics: {}", e);
                    }
                    rendered.push_str(&String::from_utf8_lossy(&buffer));
                    rendered
                }),
            )
            .layer(prometheus_layer);
    }

    Ok(router)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    debug!("{:?}", args);

    let config = Config::load(&args)?;
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }
    debug!("Starting codesmith on {}", config.bind_address());

    let pool = PgPool::connect(&config.database_url).await.context("Failed to connect to database")?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let completion: Arc<dyn CompletionProvider> = Arc::new(GeminiProvider::new(&config.completion)?);
    if config.completion.api_key.is_none() {
        info!("No completion API key configured; generations will fail until one is set from the admin console");
    }

    let router = setup_app(pool, config.clone(), completion).await?;

    let bind_addr = config.bind_address();
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("codesmith listening on http://{}", bind_addr);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        completion::mock::MockProvider,
        db::{handlers::payment_methods::PaymentMethodFilter, models::payment_methods::PaymentMethodConfig},
        test_utils::*,
    };
    use axum_test::TestServer;

    #[sqlx::test]
    #[test_log::test]
    async fn test_payment_methods_seeded_once(pool: PgPool) {
        let config = create_test_config();
        seed_payment_methods(&config.payment_methods, &pool).await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let seeded = PaymentMethods::new(&mut conn).list(&PaymentMethodFilter::default()).await.unwrap();
        assert_eq!(seeded.len(), config.payment_methods.len());

        // Admin edits survive a restart with a different configuration
        let bank = seeded.iter().find(|m| m.name == "bank_transfer").unwrap();
        sqlx::query("UPDATE payment_methods SET display_name = 'Edited' WHERE id = $1")
            .bind(bank.id)
            .execute(&pool)
            .await
            .unwrap();

        let extra = vec![PaymentMethodSeed {
            name: "late_wallet".to_string(),
            display_name: "Late Wallet".to_string(),
            enabled: true,
            config: PaymentMethodConfig::MobileWallet {
                provider: "nagad".to_string(),
                merchant_number: "0190000000".to_string(),
                instructions: None,
            },
        }];
        seed_payment_methods(&extra, &pool).await.unwrap();

        let after = PaymentMethods::new(&mut conn).list(&PaymentMethodFilter::default()).await.unwrap();
        assert_eq!(after.len(), seeded.len());
        assert_eq!(after.iter().find(|m| m.name == "bank_transfer").unwrap().display_name, "Edited");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_healthz_and_docs(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");

        let openapi_doc = server.get("/api-docs/openapi.json").await;
        openapi_doc.assert_status_ok();
        let body: serde_json::Value = openapi_doc.json();
        assert!(body["paths"]["/generations"].is_object());
        assert!(body["paths"]["/payments/{id}/review"].is_object());

        let list_params: Vec<&str> = body["paths"]["/payments"]["get"]["parameters"]
            .as_array()
            .expect("payment listing documents its query parameters")
            .iter()
            .filter_map(|p| p["name"].as_str())
            .collect();
        assert!(list_params.contains(&"status"));
        assert!(list_params.contains(&"user_id"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_build_router_with_metrics_disabled(pool: PgPool) {
        let server = create_test_app(pool).await;
        server.get("/internal/metrics").await.assert_status_not_found();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_build_router_with_metrics_enabled(pool: PgPool) {
        let mut config = create_test_config();
        config.enable_metrics = true;
        let router = setup_app(pool.clone(), config, Arc::new(MockProvider::returning("print('hi')")))
            .await
            .unwrap();
        let server = TestServer::new(router).unwrap();

        let user = create_test_user(&pool, crate::api::models::users::Role::User).await;
        let (name, value) = add_auth_headers(&user);
        server
            .post("/api/v1/generations")
            .add_header(name, value)
            .json(&serde_json::json!({ "prompt": "say hi", "language": "python" }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let response = server.get("/internal/metrics").await;
        response.assert_status_ok();
        let text = response.text();
        assert!(text.contains("codesmith_generations_total"));
        assert!(text.contains("codesmith_credits_debited_total 1"));
    }

    #[test]
    fn test_cors_layer_from_config() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![
            crate::config::CorsOrigin::Url("https://app.example.com".parse().unwrap()),
            crate::config::CorsOrigin::Url("https://admin.example.com".parse().unwrap()),
        ];
        config.cors.max_age = Some(600);
        assert!(create_cors_layer(&config).is_ok());
    }

    #[tokio::test]
    async fn test_wildcard_cors_allows_any_origin() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![
            crate::config::CorsOrigin::Url("https://app.example.com".parse().unwrap()),
            crate::config::CorsOrigin::Wildcard,
        ];
        config.cors.allow_credentials = false;
        let cors = create_cors_layer(&config).unwrap();

        let router = Router::new().route("/healthz", get(|| async { "OK" })).layer(cors);
        let server = TestServer::new(router).unwrap();
        let response = server
            .get("/healthz")
            .add_header(axum::http::header::ORIGIN, HeaderValue::from_static("https://elsewhere.example.org"))
            .await;
        response.assert_status_ok();
        assert_eq!(response.header(axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
    }
}
