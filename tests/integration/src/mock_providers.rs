//! Scripted upstream generators for integration testing

use async_trait::async_trait;
use gateway_core::{ChatTurn, GatewayError, GatewayResult, Generation, TextGenerator};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Upstream that echoes prompts, with switchable failure
#[derive(Debug, Default)]
pub struct MockUpstream {
    calls: AtomicUsize,
    failing: AtomicBool,
    scripted: Mutex<VecDeque<GatewayResult<String>>>,
    contexts: Mutex<Vec<Vec<ChatTurn>>>,
    delay: Option<Duration>,
}

impl MockUpstream {
    /// Healthy upstream
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Upstream that fails every call until [`MockUpstream::heal`] is called
    pub fn failing() -> Arc<Self> {
        let upstream = Self::default();
        upstream.failing.store(true, Ordering::SeqCst);
        Arc::new(upstream)
    }

    /// Upstream that sleeps before answering
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Queue a specific outcome for the next call
    pub fn push(&self, outcome: GatewayResult<String>) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    /// Start failing every call
    pub fn break_down(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Stop failing
    pub fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Number of generate calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Context passed to each call, in order
    pub fn contexts(&self) -> Vec<Vec<ChatTurn>> {
        self.contexts.lock().unwrap().clone()
    }
}

/// Reply the mock produces for a prompt when nothing is scripted
pub fn echo_reply(prompt: &str) -> String {
    format!("echo: {prompt}")
}

#[async_trait]
impl TextGenerator for MockUpstream {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        context: &[ChatTurn],
    ) -> GatewayResult<Generation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.to_vec());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.scripted.lock().unwrap().pop_front();
        if let Some(outcome) = scripted {
            return outcome.map(|content| Generation::new(content, model));
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::upstream("mock", "upstream unavailable"));
        }
        Ok(Generation::new(echo_reply(prompt), model))
    }
}
