use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use crate::{api, billing, db};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let mut bearer = Http::new(HttpAuthScheme::Bearer);
            bearer.bearer_format = Some("JWT".to_string());
            components.security_schemes.insert("BearerAuth".to_string(), SecurityScheme::Http(bearer));
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "codesmith API server")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::generations::create_generation,
        api::handlers::generations::estimate_generation,
        api::handlers::generations::list_generations,
        api::handlers::generations::list_public_generations,
        api::handlers::generations::get_generation,
        api::handlers::generations::update_generation,
        api::handlers::generations::like_generation,
        api::handlers::payments::create_payment,
        api::handlers::payments::list_payments,
        api::handlers::payments::get_payment,
        api::handlers::payments::review_payment,
        api::handlers::payment_methods::list_payment_methods,
        api::handlers::payment_methods::create_payment_method,
        api::handlers::payment_methods::update_payment_method,
        api::handlers::transactions::create_transaction,
        api::handlers::transactions::get_transaction,
        api::handlers::transactions::list_transactions,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::stats::get_stats,
        api::handlers::admin_logs::list_admin_logs,
        api::handlers::settings::set_completion_api_key,
        api::handlers::settings::get_completion_api_key,
    ),
    components(
        schemas(
            api::models::users::Role,
            api::models::users::UserUpdate,
            api::models::users::UserResponse,
            api::models::users::CurrentUser,
            api::models::generations::GenerationCreate,
            api::models::generations::GenerationCreateResponse,
            api::models::generations::EstimateResponse,
            api::models::generations::GenerationResponse,
            api::models::generations::GenerationUpdate,
            api::models::generations::LikeResponse,
            api::models::payments::PaymentCreate,
            api::models::payments::PaymentCreateResponse,
            api::models::payments::PaymentResponse,
            api::models::payments::PaymentReviewRequest,
            api::models::payments::PaymentReviewResponse,
            api::models::payment_methods::PaymentMethodCreate,
            api::models::payment_methods::PaymentMethodUpdate,
            api::models::payment_methods::PaymentMethodResponse,
            api::models::transactions::TransactionType,
            api::models::transactions::CreditTransactionCreate,
            api::models::transactions::CreditTransactionResponse,
            api::models::stats::StatsResponse,
            api::models::admin_logs::AdminLogResponse,
            api::models::settings::CompletionApiKeyUpdate,
            api::models::settings::ApiKeySource,
            api::models::settings::CompletionApiKeyStatus,
            billing::cost::Complexity,
            billing::payments::ReviewDecision,
            db::models::credits::CreditTransactionType,
            db::models::payments::PaymentStatus,
            db::models::payment_methods::PaymentMethodConfig,
        )
    ),
    tags(
        (name = "generations", description = "Credit-metered code generation"),
        (name = "payments", description = "Credit purchases and payment review"),
        (name = "payment_methods", description = "Payment method configuration"),
        (name = "transactions", description = "Credit ledger"),
        (name = "users", description = "User management API"),
        (name = "admin", description = "Admin console: statistics, audit log and settings"),
    ),
    info(
        title = "codesmith API",
        version = "0.1.0",
        description = "API for generating code against a prepaid credit balance and managing credit purchases",
    ),
)]
pub struct ApiDoc;
