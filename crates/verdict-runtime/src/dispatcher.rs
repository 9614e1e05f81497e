//! The agent dispatcher: fan-out to every enabled evaluator unit,
//! fan-in to one `EvaluationResult`.
//!
//! # Execution flow
//! 1. Validate the request (the only call-level failure)
//! 2. Fan-out: the five independent units run concurrently via
//!    `tokio::join!`, each bounded by `min(unit timeout, global deadline)`
//! 3. Second phase: the prompt improver consumes the first-pass outcomes
//! 4. Fan-in: deterministic aggregation plus cost/latency telemetry
//!
//! No unit failure aborts a sibling; timeouts drop the in-flight future and
//! record `Failed` for that unit only. Dropping the `evaluate()` future
//! cancels every in-flight unit call.

use std::cmp;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::time::{timeout_at, Instant as TokioInstant};

use verdict_core::{
    aggregate, build_telemetry, AgentOutcome, EvaluationRequest, EvaluationResult, PricingTable,
    RecommendationPayload, RequestError, RuleSet, UnitName, UnitOutcomes,
};

use crate::cache::{CacheKey, OutcomeCache};
use crate::config::RuntimeConfig;
use crate::providers::LlmProvider;
use crate::registry::{SharedPricing, SharedRules};
use crate::search::SearchProvider;
use crate::units::{
    CoherenceUnit, FactualityUnit, FirstPass, HelpfulnessUnit, ImproverUnit, OptimizerUnit,
    SafetyUnit, SopUnit, UnitContext,
};

/// Call-level errors. Everything except an invalid request is absorbed into
/// the result's per-unit slices.
#[derive(Error, Debug)]
pub enum EvaluateError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),
}

/// Errors constructing a dispatcher.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("LLM provider not configured")]
    MissingProvider,

    #[error("Search provider not configured")]
    MissingSearch,
}

/// The evaluation orchestrator. One instance serves concurrent `evaluate()`
/// calls; per-call state never leaves the call.
pub struct Dispatcher {
    config: RuntimeConfig,
    rules: Arc<SharedRules>,
    pricing: Arc<SharedPricing>,
    cache: Option<OutcomeCache>,
    coherence: CoherenceUnit,
    factuality: FactualityUnit,
    safety: SafetyUnit,
    helpfulness: HelpfulnessUnit,
    sop_compliance: SopUnit,
    improver: ImproverUnit,
    optimizer: OptimizerUnit,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Run one evaluation.
    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, EvaluateError> {
        request.validate()?;

        let started = Instant::now();
        let deadline = TokioInstant::now() + self.config.global_timeout;
        let ctx = UnitContext::new(request);

        for unit in UnitName::ALL {
            if !unit.enabled() {
                tracing::debug!(unit = %unit, "unit disabled, skipping");
            }
        }

        // Fan-out. The five independent units share the deadline but
        // nothing else.
        let (coherence, factuality, safety, helpfulness, sop_compliance) = tokio::join!(
            self.run_cached(
                UnitName::Coherence,
                request,
                deadline,
                self.coherence.evaluate(&ctx)
            ),
            self.run_cached(
                UnitName::Factuality,
                request,
                deadline,
                self.factuality.evaluate(&ctx)
            ),
            self.run_cached(
                UnitName::Safety,
                request,
                deadline,
                self.safety.evaluate(&ctx)
            ),
            self.run_cached(
                UnitName::Helpfulness,
                request,
                deadline,
                self.helpfulness.evaluate(&ctx)
            ),
            self.run_cached(
                UnitName::SopCompliance,
                request,
                deadline,
                self.sop_compliance.evaluate(&ctx)
            ),
        );

        // Second phase: the improver needs the first-pass outcomes, so it
        // cannot join the fan-out. Not cached; its input is more than the
        // transcript.
        let prompt_improvement = {
            let first_pass = FirstPass {
                coherence: &coherence,
                factuality: &factuality,
                safety: &safety,
                helpfulness: &helpfulness,
                sop_compliance: &sop_compliance,
            };
            self.run_bounded(
                UnitName::PromptImprover,
                deadline,
                self.improver.evaluate(&ctx, &first_pass),
            )
            .await
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        let pricing = self.pricing.snapshot();
        let telemetry = build_telemetry(request, &pricing, latency_ms);

        let result = aggregate(
            UnitOutcomes {
                coherence,
                factuality,
                safety,
                helpfulness,
                sop_compliance,
                prompt_improvement,
            },
            telemetry,
        );

        tracing::info!(
            status = ?result.overall_status,
            latency_ms = result.telemetry.latency_ms,
            cost_usd = ?result.telemetry.cost_usd,
            model = %result.telemetry.model_used,
            session_id = request.session_id.as_deref().unwrap_or(""),
            "evaluation complete"
        );

        Ok(result)
    }

    /// Run the disabled optimizer unit on demand. Never part of
    /// `evaluate()`.
    pub async fn recommend(
        &self,
        request: &EvaluationRequest,
    ) -> Result<AgentOutcome<RecommendationPayload>, EvaluateError> {
        request.validate()?;
        let ctx = UnitContext::new(request);
        let deadline = TokioInstant::now() + self.config.global_timeout;
        Ok(self
            .run_bounded(
                UnitName::ModelOptimizer,
                deadline,
                self.optimizer.evaluate(&ctx),
            )
            .await)
    }

    /// Swap in a new rule set (out-of-band, versioned). Returns the new
    /// generation.
    pub fn reload_rules(&self, rules: RuleSet) -> u64 {
        let generation = self.rules.reload(rules);
        tracing::info!(generation, "rule set reloaded");
        generation
    }

    /// Swap in a new pricing table (out-of-band, versioned).
    pub fn reload_pricing(&self, pricing: PricingTable) -> u64 {
        let generation = self.pricing.reload(pricing);
        tracing::info!(generation, "pricing table reloaded");
        generation
    }

    pub fn rules_handle(&self) -> &Arc<SharedRules> {
        &self.rules
    }

    pub fn pricing_handle(&self) -> &Arc<SharedPricing> {
        &self.pricing
    }

    /// Bound a unit future by its timeout and the global deadline.
    async fn run_bounded<P, F>(
        &self,
        unit: UnitName,
        deadline: TokioInstant,
        fut: F,
    ) -> AgentOutcome<P>
    where
        F: Future<Output = AgentOutcome<P>>,
    {
        let per_unit = self.config.unit_timeout(unit);
        let bound = cmp::min(deadline, TokioInstant::now() + per_unit);
        match timeout_at(bound, fut).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(unit = %unit, timeout = ?per_unit, "unit timed out");
                AgentOutcome::Failed {
                    reason: format!("timed out after {per_unit:?}"),
                }
            }
        }
    }

    /// Consult the cache before running a unit; store successes after.
    async fn run_cached<P, F>(
        &self,
        unit: UnitName,
        request: &EvaluationRequest,
        deadline: TokioInstant,
        fut: F,
    ) -> AgentOutcome<P>
    where
        P: Serialize + DeserializeOwned,
        F: Future<Output = AgentOutcome<P>>,
    {
        let key = CacheKey::new(request, unit);
        if let Some(cache) = &self.cache {
            if let Some(payload) = cache.get::<P>(&key).await {
                tracing::debug!(unit = %unit, "outcome served from cache");
                return AgentOutcome::Success { payload };
            }
        }

        let outcome = self.run_bounded(unit, deadline, fut).await;

        if let (Some(cache), AgentOutcome::Success { payload }) = (&self.cache, &outcome) {
            cache.insert(key, payload).await;
        }
        outcome
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    search: Option<Arc<dyn SearchProvider>>,
    config: RuntimeConfig,
    rules: Option<RuleSet>,
    pricing: Option<PricingTable>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            search: None,
            config: RuntimeConfig::default(),
            rules: None,
            pricing: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Rule set to start from; defaults to [`RuleSet::builtin`].
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Pricing table to start from; defaults to [`PricingTable::builtin`].
    pub fn pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let provider = self.provider.ok_or(BuildError::MissingProvider)?;
        let search = self.search.ok_or(BuildError::MissingSearch)?;
        let config = self.config;

        let rules = Arc::new(SharedRules::new(
            self.rules.unwrap_or_else(RuleSet::builtin),
        ));
        let pricing = Arc::new(SharedPricing::new(
            self.pricing.unwrap_or_else(PricingTable::builtin),
        ));

        let cache = config
            .cache
            .enabled
            .then(|| OutcomeCache::new(config.cache.max_entries, config.cache.ttl));

        Ok(Dispatcher {
            coherence: CoherenceUnit::new(provider.clone(), &config),
            factuality: FactualityUnit::new(provider.clone(), search, &config),
            safety: SafetyUnit::new(provider.clone(), &config),
            helpfulness: HelpfulnessUnit::new(provider.clone(), &config),
            sop_compliance: SopUnit::new(provider.clone(), rules.clone(), &config),
            improver: ImproverUnit::new(provider.clone(), &config),
            optimizer: OptimizerUnit::new(provider, pricing.clone(), &config),
            config,
            rules,
            pricing,
            cache,
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
