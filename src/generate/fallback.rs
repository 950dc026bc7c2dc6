//! Model fallback chain with quota tracking.

use std::time::Duration;

use nonempty::NonEmpty;
use tracing::{info, warn};

use super::client::{ChatClient, ChatRequest, CompletionError};
use crate::domain::{Pacing, QuotaConfig};

/// Responses shorter than this (after trimming) count as failures.
pub const MIN_RESPONSE_CHARS: usize = 50;

/// A caller-side budget on completion calls for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    used: u32,
    config: QuotaConfig,
}

impl Quota {
    /// A fresh quota with no calls recorded.
    #[must_use]
    pub const fn new(config: QuotaConfig) -> Self {
        Self { used: 0, config }
    }

    /// Whether another call fits under the limit minus the safety margin.
    #[must_use]
    pub const fn can_call(&self) -> bool {
        self.used < self.config.daily_limit.saturating_sub(self.config.safety_margin)
    }

    /// Records one call, warning once usage reaches the threshold.
    pub fn record(&mut self) {
        self.used += 1;
        if self.used >= self.config.warn_threshold {
            warn!(
                "quota usage: {}/{} requests",
                self.used, self.config.daily_limit
            );
        }
    }

    /// Calls recorded so far.
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.used
    }

    /// Calls left before the hard limit.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.config.daily_limit.saturating_sub(self.used)
    }

    /// The hard limit.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.config.daily_limit
    }
}

/// An ordered list of models plus the one that last succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChain {
    models: NonEmpty<String>,
    last_success: usize,
}

impl ModelChain {
    /// A chain that starts at the first model.
    #[must_use]
    pub const fn new(models: NonEmpty<String>) -> Self {
        Self {
            models,
            last_success: 0,
        }
    }

    /// The model the next call starts with.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.models[self.last_success]
    }

    /// Number of models in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Always false: a chain has at least one model.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Model indices in the order one pass tries them.
    fn order(&self) -> impl Iterator<Item = usize> + use<> {
        let (start, len) = (self.last_success, self.models.len());
        (0..len).map(move |offset| (start + offset) % len)
    }

    fn model(&self, index: usize) -> &str {
        &self.models[index]
    }
}

/// Why a fallback-chain call produced no text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The run's quota is used up; no call was made.
    #[error("quota exhausted ({used}/{limit} requests used)")]
    QuotaExhausted {
        /// Calls used.
        used: u32,
        /// Hard limit.
        limit: u32,
    },
    /// Every model failed on every pass.
    #[error("all models failed: {}", .0.join("; "))]
    AllModelsFailed(Vec<String>),
}

/// Text returned by a successful call, with the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Raw response text.
    pub text: String,
    /// Model that answered.
    pub model: String,
}

/// Calls a [`ChatClient`] through a [`ModelChain`], charging a [`Quota`].
#[derive(Debug)]
pub struct ModelCaller<C> {
    client: C,
    chain: ModelChain,
    quota: Quota,
    temperature: f32,
    pacing: Pacing,
    token_cap: u32,
}

impl<C: ChatClient> ModelCaller<C> {
    /// Creates a caller.
    pub const fn new(
        client: C,
        chain: ModelChain,
        quota: Quota,
        temperature: f32,
        pacing: Pacing,
    ) -> Self {
        Self {
            client,
            chain,
            quota,
            temperature,
            pacing,
            token_cap: u32::MAX,
        }
    }

    /// Caps the token budget of every request at `cap`.
    #[must_use]
    pub const fn with_token_cap(mut self, cap: u32) -> Self {
        self.token_cap = cap;
        self
    }

    /// The quota as charged so far.
    pub const fn quota(&self) -> &Quota {
        &self.quota
    }

    /// The model chain, including which model last succeeded.
    pub const fn chain(&self) -> &ModelChain {
        &self.chain
    }

    /// Completes `prompt`, falling back across models.
    ///
    /// Each pass tries every model once, starting from the one that last
    /// succeeded. A rate-limited model is skipped immediately; any other
    /// failure is retried on the same model up to `retries_per_model` times.
    /// If every model was rate limited, the caller waits and runs another
    /// pass, up to `global_retries` passes.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::QuotaExhausted`] once the quota has no room, and
    /// [`CallError::AllModelsFailed`] when the passes are used up.
    pub async fn call(&mut self, prompt: &str, max_tokens: u32) -> Result<Completion, CallError> {
        let retries_per_model = self.quota.config.retries_per_model.max(1);
        let global_retries = self.quota.config.global_retries.max(1);

        let mut errors = Vec::new();
        for pass in 1..=global_retries {
            errors.clear();
            let mut all_rate_limited = true;

            for (offset, index) in self.chain.order().enumerate() {
                let model = self.chain.model(index).to_string();
                let request = ChatRequest {
                    model: model.clone(),
                    prompt: prompt.to_string(),
                    max_tokens: max_tokens.min(self.token_cap),
                    temperature: self.temperature,
                };

                for attempt in 1..=retries_per_model {
                    self.charge()?;

                    let error = match self.client.complete(&request).await {
                        Err(CompletionError::RateLimited) => {
                            info!("rate limited on {model}, trying next model");
                            errors.push(format!("{model}: rate limited"));
                            break;
                        }
                        Ok(text) if text.trim().chars().count() >= MIN_RESPONSE_CHARS => {
                            if offset > 0 {
                                info!("switched to {model}");
                                self.chain.last_success = index;
                            }
                            pause(self.pacing.call).await;
                            return Ok(Completion { text, model });
                        }
                        Ok(_) => CompletionError::Empty,
                        Err(e) => e,
                    };

                    all_rate_limited = false;
                    warn!("{model} failed (attempt {attempt}/{retries_per_model}): {error}");
                    errors.push(format!("{model}: {error}"));
                    if attempt < retries_per_model {
                        pause(self.pacing.retry).await;
                    }
                }
            }

            if all_rate_limited && pass < global_retries {
                warn!(
                    "all models rate limited, waiting {}s before pass {}",
                    self.pacing.rate_limit.as_secs(),
                    pass + 1
                );
                pause(self.pacing.rate_limit).await;
                continue;
            }
            break;
        }

        Err(CallError::AllModelsFailed(errors))
    }

    fn charge(&mut self) -> Result<(), CallError> {
        if !self.quota.can_call() {
            return Err(CallError::QuotaExhausted {
                used: self.quota.used(),
                limit: self.quota.limit(),
            });
        }
        self.quota.record();
        Ok(())
    }
}

/// Sleeps for `duration`, skipping the timer entirely for zero.
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use super::*;

    /// A client that replays canned responses and records which models were asked.
    #[derive(Debug, Default)]
    pub struct ScriptedClient {
        responses: Mutex<VecDeque<Result<String, CompletionError>>>,
        pub calls: Mutex<Vec<String>>,
        pub budgets: Mutex<Vec<u32>>,
    }

    impl ScriptedClient {
        pub fn new(responses: impl IntoIterator<Item = Result<String, CompletionError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: Mutex::default(),
                budgets: Mutex::default(),
            }
        }

        pub fn models_called(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn budgets_requested(&self) -> Vec<u32> {
            self.budgets.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatClient for ScriptedClient {
        async fn complete(&self, request: &ChatRequest) -> Result<String, CompletionError> {
            self.calls.lock().unwrap().push(request.model.clone());
            self.budgets.lock().unwrap().push(request.max_tokens);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CompletionError::Transport("script exhausted".into())))
        }
    }

    pub fn long_text(tag: &str) -> String {
        format!("{tag}: {}", "lorem ipsum ".repeat(10))
    }

    fn chain(models: &[&str]) -> ModelChain {
        let models = models.iter().map(ToString::to_string).collect();
        ModelChain::new(NonEmpty::from_vec(models).unwrap())
    }

    fn quota(retries_per_model: u32, global_retries: u32) -> Quota {
        Quota::new(QuotaConfig {
            retries_per_model,
            global_retries,
            ..QuotaConfig::default()
        })
    }

    fn caller(
        responses: Vec<Result<String, CompletionError>>,
        models: &[&str],
        quota: Quota,
    ) -> ModelCaller<ScriptedClient> {
        ModelCaller::new(
            ScriptedClient::new(responses),
            chain(models),
            quota,
            0.7,
            Pacing::none(),
        )
    }

    #[tokio::test]
    async fn first_model_answers() {
        let mut caller = caller(vec![Ok(long_text("a"))], &["m1", "m2"], quota(1, 1));

        let completion = caller.call("prompt", 100).await.unwrap();

        assert_eq!(completion.model, "m1");
        assert_eq!(caller.quota().used(), 1);
        assert_eq!(caller.client.models_called(), vec!["m1"]);
    }

    #[tokio::test]
    async fn token_budget_is_capped() {
        let mut caller = caller(
            vec![Ok(long_text("a")), Ok(long_text("b"))],
            &["m1"],
            quota(1, 1),
        )
        .with_token_cap(1000);

        caller.call("long", 8000).await.unwrap();
        caller.call("short", 800).await.unwrap();

        assert_eq!(caller.client.budgets_requested(), vec![1000, 800]);
    }

    #[tokio::test]
    async fn rate_limit_falls_back_and_remembers_the_winner() {
        let mut caller = caller(
            vec![
                Err(CompletionError::RateLimited),
                Ok(long_text("b")),
                Ok(long_text("c")),
            ],
            &["m1", "m2", "m3"],
            quota(1, 1),
        );

        assert_eq!(caller.call("p", 100).await.unwrap().model, "m2");
        assert_eq!(caller.chain().current(), "m2");
        assert_eq!(caller.call("p", 100).await.unwrap().model, "m2");
        assert_eq!(caller.client.models_called(), vec!["m1", "m2", "m2"]);
    }

    #[tokio::test]
    async fn whole_chain_rate_limited_waits_and_retries() {
        let mut caller = caller(
            vec![
                Err(CompletionError::RateLimited),
                Err(CompletionError::RateLimited),
                Ok(long_text("again")),
            ],
            &["m1", "m2"],
            quota(1, 2),
        );

        let completion = caller.call("p", 100).await.unwrap();

        assert_eq!(completion.model, "m1");
        assert_eq!(caller.client.models_called(), vec!["m1", "m2", "m1"]);
    }

    #[tokio::test]
    async fn exhausted_passes_report_every_failure() {
        let mut caller = caller(
            vec![
                Err(CompletionError::RateLimited),
                Err(CompletionError::RateLimited),
            ],
            &["m1", "m2"],
            quota(1, 1),
        );

        let err = caller.call("p", 100).await.unwrap_err();

        assert_eq!(
            err,
            CallError::AllModelsFailed(vec![
                "m1: rate limited".to_string(),
                "m2: rate limited".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn mixed_failures_do_not_wait_for_another_pass() {
        let mut caller = caller(
            vec![
                Err(CompletionError::RateLimited),
                Err(CompletionError::Status {
                    code: 500,
                    body: "boom".into(),
                }),
                Ok(long_text("unused")),
            ],
            &["m1", "m2"],
            quota(1, 3),
        );

        let err = caller.call("p", 100).await.unwrap_err();

        assert!(matches!(err, CallError::AllModelsFailed(errors) if errors.len() == 2));
        assert_eq!(caller.client.models_called().len(), 2);
    }

    #[tokio::test]
    async fn short_responses_are_retried_on_the_same_model() {
        let mut caller = caller(
            vec![Ok("too short".to_string()), Ok(long_text("ok"))],
            &["m1", "m2"],
            quota(2, 1),
        );

        let completion = caller.call("p", 100).await.unwrap();

        assert_eq!(completion.model, "m1");
        assert_eq!(caller.client.models_called(), vec!["m1", "m1"]);
    }

    #[tokio::test]
    async fn quota_stops_calls_at_the_safety_margin() {
        let config = QuotaConfig {
            daily_limit: 4,
            safety_margin: 2,
            ..QuotaConfig::default()
        };
        let mut caller = caller(
            vec![Ok(long_text("1")), Ok(long_text("2")), Ok(long_text("3"))],
            &["m1"],
            Quota::new(config),
        );

        caller.call("p", 100).await.unwrap();
        caller.call("p", 100).await.unwrap();
        let err = caller.call("p", 100).await.unwrap_err();

        assert_eq!(err, CallError::QuotaExhausted { used: 2, limit: 4 });
        assert_eq!(caller.quota().remaining(), 2);
    }
}
