//! Orchestrated chat flow.
//!
//! One request passes through the layer in a fixed order:
//! rate limit, activity touch, cache lookup, circuit check, upstream call,
//! then breaker, cache and history bookkeeping.
//!
//! Bookkeeping runs on a spawned task that the handler awaits, so it still
//! completes if the caller drops the request future mid-way.

use crate::cache::ResponseCache;
use crate::circuit_breaker::CircuitBreaker;
use crate::layer::ResilienceLayer;
use crate::session::SessionStore;
use gateway_core::{
    ChatRequest, ChatResponse, GatewayError, GatewayResult, Generation, ResultPayload,
    TextGenerator,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Endpoint label used for rate limiting by default
pub const DEFAULT_ENDPOINT: &str = "/chat";
/// Breaker service name used by default
pub const DEFAULT_SERVICE: &str = "llm";

const CONTENT_FIELD: &str = "content";
const MODEL_FIELD: &str = "model";

/// Gateway operation composing every state component around an upstream
#[derive(Clone)]
pub struct ResilientGateway {
    layer: ResilienceLayer,
    generator: Arc<dyn TextGenerator>,
    breaker: CircuitBreaker,
    endpoint: String,
}

impl std::fmt::Debug for ResilientGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientGateway")
            .field("generator", &self.generator.name())
            .field("service", &self.breaker.service())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ResilientGateway {
    /// Create a gateway with the default endpoint and service name
    #[must_use]
    pub fn new(layer: ResilienceLayer, generator: Arc<dyn TextGenerator>) -> Self {
        let breaker = layer.breaker(DEFAULT_SERVICE);
        Self {
            layer,
            generator,
            breaker,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Use a different rate-limit endpoint label
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Use a different breaker service name
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.breaker = self.layer.breaker(service);
        self
    }

    /// Underlying layer
    #[must_use]
    pub fn layer(&self) -> &ResilienceLayer {
        &self.layer
    }

    /// Breaker guarding the upstream
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Handle one chat request
    ///
    /// # Errors
    /// - `GatewayError::Validation` for a malformed request
    /// - `GatewayError::RateLimit` when the caller's window is full
    /// - `GatewayError::CircuitBreakerOpen` while the upstream is quarantined
    /// - the upstream's own error when generation fails
    /// - `GatewayError::StoreUnavailable` in fail-closed mode
    pub async fn handle(&self, request: &ChatRequest) -> GatewayResult<ChatResponse> {
        request.validate()?;
        let caller = request.caller_id.as_str();

        self.layer
            .rate_limiter()
            .check_and_consume(caller, &self.endpoint)
            .await?;
        self.layer.sessions().touch_activity(caller).await?;

        if let Some(payload) = self
            .layer
            .cache()
            .lookup(&request.prompt, &request.model, Some(caller))
            .await?
        {
            if let Some(generation) = generation_from_payload(&payload) {
                debug!(caller = %caller, "Serving cached response");
                self.layer
                    .sessions()
                    .append_exchange(caller, &request.prompt, &generation.content)
                    .await?;
                return Ok(ChatResponse::new(
                    caller,
                    &request.prompt,
                    generation.content,
                    generation.model,
                    true,
                ));
            }
            warn!(caller = %caller, "Cached payload lacks content, regenerating");
        }

        self.breaker.check().await?;

        let context = self.layer.sessions().get_context(caller).await?;
        let outcome = self
            .generator
            .generate(&request.prompt, &request.model, &context)
            .await;

        let bookkeeping = Bookkeeping {
            breaker: self.breaker.clone(),
            cache: self.layer.cache().clone(),
            sessions: self.layer.sessions().clone(),
            caller: caller.to_string(),
            prompt: request.prompt.clone(),
            model: request.model.clone(),
        };
        let outcome = tokio::spawn(bookkeeping.run(outcome))
            .await
            .map_err(|e| GatewayError::internal(format!("bookkeeping task failed: {e}")))??;

        let generation = outcome?;
        info!(
            caller = %caller,
            generator = %self.generator.name(),
            model = %generation.model,
            "Generated response"
        );
        Ok(ChatResponse::new(
            caller,
            &request.prompt,
            generation.content,
            generation.model,
            false,
        ))
    }
}

/// State updates that follow an upstream call
struct Bookkeeping {
    breaker: CircuitBreaker,
    cache: ResponseCache,
    sessions: SessionStore,
    caller: String,
    prompt: String,
    model: String,
}

impl Bookkeeping {
    /// Outer result is a bookkeeping failure, inner one the upstream outcome
    async fn run(
        self,
        outcome: GatewayResult<Generation>,
    ) -> GatewayResult<GatewayResult<Generation>> {
        match &outcome {
            Ok(generation) => {
                self.breaker.record_success().await?;
                self.cache
                    .store(
                        &self.prompt,
                        &self.model,
                        &payload_from_generation(generation),
                        None,
                        Some(&self.caller),
                    )
                    .await?;
                self.sessions
                    .append_exchange(&self.caller, &self.prompt, &generation.content)
                    .await?;
            }
            Err(e) => {
                let state = self.breaker.record_failure().await?;
                warn!(
                    service = %self.breaker.service(),
                    error = %e,
                    circuit = %state,
                    "Upstream call failed"
                );
            }
        }
        Ok(outcome)
    }
}

fn payload_from_generation(generation: &Generation) -> ResultPayload {
    let mut payload = ResultPayload::new();
    payload.insert(
        CONTENT_FIELD.to_string(),
        Value::String(generation.content.clone()),
    );
    payload.insert(
        MODEL_FIELD.to_string(),
        Value::String(generation.model.clone()),
    );
    payload
}

fn generation_from_payload(payload: &ResultPayload) -> Option<Generation> {
    let content = payload.get(CONTENT_FIELD)?.as_str()?;
    let model = payload
        .get(MODEL_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default();
    Some(Generation::new(content, model))
}
