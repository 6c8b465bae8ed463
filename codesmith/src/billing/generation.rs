use crate::{
    api::models::users::CurrentUser,
    billing::cost::{generation_cost, Complexity},
    completion::{build_system_prompt, extract_code, CompletionError, CompletionRequest, PromptOptions},
    db::{
        errors::DbError,
        handlers::{settings::COMPLETION_API_KEY, Credits, Generations, Settings},
        models::{
            credits::{CreditTransactionCreateDBRequest, CreditTransactionType},
            generations::GenerationCreateDBRequest,
        },
    },
    errors::{Error, Result},
    metrics::GenerationOutcome,
    types::GenerationId,
    AppState,
};
use sqlx::PgConnection;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// A validated-on-entry generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub language: String,
    pub complexity: Complexity,
    pub include_tests: bool,
    pub include_comments: bool,
    pub framework: Option<String>,
}

impl GenerationRequest {
    fn framework(&self) -> Option<&str> {
        self.framework.as_deref().map(str::trim).filter(|f| !f.is_empty())
    }

    fn cost(&self) -> i64 {
        generation_cost(self.complexity, self.include_tests, self.framework())
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub id: GenerationId,
    pub code: String,
    pub credits_used: i64,
    pub remaining_credits: i64,
    pub model: String,
}

fn validate(request: &GenerationRequest) -> Result<()> {
    let mut missing = Vec::new();
    if request.prompt.trim().is_empty() {
        missing.push("prompt");
    }
    if request.language.trim().is_empty() {
        missing.push("language");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingFields { fields: missing })
    }
}

/// Rotated key from settings wins over the configured one
async fn resolve_api_key(state: &AppState, conn: &mut PgConnection) -> Result<Option<String>> {
    if let Some(sealed) = Settings::new(conn).get(COMPLETION_API_KEY).await? {
        match state.cipher.decrypt(&sealed) {
            Ok(key) => return Ok(Some(key)),
            Err(e) => warn!("Stored completion API key is unreadable, using configured key: {}", e),
        }
    }
    Ok(state.config.completion.api_key.clone().filter(|k| !k.trim().is_empty()))
}

fn record(state: &AppState, outcome: GenerationOutcome) {
    if let Some(metrics) = &state.metrics {
        metrics.record_generation(outcome);
    }
}

/// Generate code for `user` and charge for it.
///
/// The provider is called before any credits move; a failed or empty completion charges
/// nothing. The debit is a conditional update, so a concurrent spend that drains the balance
/// after the pre-check surfaces as `InsufficientFunds` without a charge.
#[instrument(skip(state, user, request), fields(user_id = %user.id, language = %request.language), err)]
pub async fn generate(state: &AppState, user: &CurrentUser, request: &GenerationRequest) -> Result<GeneratedCode> {
    validate(request)?;
    let cost = request.cost();

    let api_key = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let balance = match Credits::new(&mut conn).get_balance(user.id).await {
            Ok(amount) => amount,
            Err(DbError::NotFound) => 0,
            Err(e) => return Err(e.into()),
        };

        if balance < 1 || balance < cost {
            record(state, GenerationOutcome::InsufficientFunds);
            return Err(Error::InsufficientFunds {
                required: cost,
                available: balance,
            });
        }

        resolve_api_key(state, &mut conn).await?
    };

    let Some(api_key) = api_key else {
        record(state, GenerationOutcome::ProviderError);
        return Err(Error::ProviderError {
            message: CompletionError::MissingApiKey.to_string(),
        });
    };

    let completion_request = CompletionRequest {
        system_prompt: build_system_prompt(&PromptOptions {
            language: request.language.trim(),
            framework: request.framework(),
            complexity: request.complexity,
            include_tests: request.include_tests,
            include_comments: request.include_comments,
        }),
        prompt: request.prompt.trim().to_string(),
    };

    let text = match state.completion.complete(&api_key, &completion_request).await {
        Ok(text) => text,
        Err(e) => {
            record(state, GenerationOutcome::ProviderError);
            return Err(Error::ProviderError { message: e.to_string() });
        }
    };
    let code = extract_code(&text);
    debug!("Provider returned {} bytes of code", code.len());

    let generation_id = Uuid::new_v4();
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let debit = CreditTransactionCreateDBRequest::new(user.id, CreditTransactionType::Usage, -cost)
        .description(format!("Code generation ({})", request.language.trim()))
        .reference(generation_id);
    let transaction = match Credits::new(&mut conn).apply(&debit).await {
        Ok(transaction) => transaction,
        Err(e @ DbError::InsufficientFunds { .. }) => {
            info!("Balance drained by a concurrent request, generation not charged");
            record(state, GenerationOutcome::InsufficientFunds);
            return Err(e.into());
        }
        Err(e) => {
            error!("Failed to debit {} credits after a successful generation: {}", cost, e);
            return Err(e.into());
        }
    };

    let record_request = GenerationCreateDBRequest {
        id: generation_id,
        user_id: user.id,
        prompt: completion_request.prompt,
        generated_code: code.clone(),
        language: request.language.trim().to_string(),
        framework: request.framework().map(str::to_string),
        complexity: request.complexity,
        credits_used: cost,
        model: state.completion.model().to_string(),
    };
    if let Err(e) = Generations::new(&mut conn).create(&record_request).await {
        error!("Generation {} was charged but its record could not be saved: {}", generation_id, e);
    }

    record(state, GenerationOutcome::Success);
    if let Some(metrics) = &state.metrics {
        metrics.record_debit(cost);
    }
    info!("Generated code for {} credits, {} remaining", cost, transaction.balance_after);

    Ok(GeneratedCode {
        id: generation_id,
        code,
        credits_used: cost,
        remaining_credits: transaction.balance_after,
        model: state.completion.model().to_string(),
    })
}
