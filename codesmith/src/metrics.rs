use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Outcome label for generation attempts
#[derive(Debug, Clone, Copy)]
pub enum GenerationOutcome {
    Success,
    InsufficientFunds,
    ProviderError,
}

impl GenerationOutcome {
    fn as_str(self) -> &'static str {
        match self {
            GenerationOutcome::Success => "success",
            GenerationOutcome::InsufficientFunds => "insufficient_funds",
            GenerationOutcome::ProviderError => "provider_error",
        }
    }
}

/// Prometheus counters for credit movements.
///
/// Registered on their own registry and rendered next to the HTTP metrics from
/// axum-prometheus at `/internal/metrics`.
#[derive(Clone)]
pub struct BillingMetrics {
    registry: Registry,
    generations: IntCounterVec,
    credits_debited: IntCounter,
    credits_awarded: IntCounterVec,
    payments: IntCounterVec,
}

impl BillingMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let generations = IntCounterVec::new(
            Opts::new("codesmith_generations_total", "Code generation attempts by outcome"),
            &["outcome"],
        )?;
        let credits_debited = IntCounter::new("codesmith_credits_debited_total", "Credits charged for generations")?;
        let credits_awarded = IntCounterVec::new(
            Opts::new("codesmith_credits_awarded_total", "Credits awarded for payments"),
            &["source"],
        )?;
        let payments = IntCounterVec::new(
            Opts::new("codesmith_payments_total", "Payment transactions by resulting status"),
            &["status"],
        )?;

        registry.register(Box::new(generations.clone()))?;
        registry.register(Box::new(credits_debited.clone()))?;
        registry.register(Box::new(credits_awarded.clone()))?;
        registry.register(Box::new(payments.clone()))?;

        Ok(Self {
            registry: registry.clone(),
            generations,
            credits_debited,
            credits_awarded,
            payments,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_generation(&self, outcome: GenerationOutcome) {
        self.generations.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn record_debit(&self, credits: i64) {
        self.credits_debited.inc_by(credits.max(0) as u64);
    }

    /// `source` is `automated` or `review`
    pub fn record_award(&self, source: &str, credits: i64) {
        self.credits_awarded.with_label_values(&[source]).inc_by(credits.max(0) as u64);
    }

    pub fn record_payment(&self, status: &str) {
        self.payments.with_label_values(&[status]).inc();
    }
}
