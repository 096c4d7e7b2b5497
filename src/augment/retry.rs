//! Retry with exponential backoff for augmentation requests
//!
//! Only errors that `FlowcError::is_retryable` accepts are retried:
//! transport failures, timeouts, HTTP 429 and 5xx.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::util::constants::AUGMENT_MAX_RETRIES;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// 0.0 to 1.0
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: AUGMENT_MAX_RETRIES,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.config.max_delay.as_millis() as f64);

        let delay = if self.config.jitter > 0.0 {
            let range = capped * self.config.jitter;
            (capped + rand::random::<f64>() * range * 2.0 - range).max(0.0)
        } else {
            capped
        };
        Duration::from_millis(delay as u64)
    }

    /// Longest time every attempt plus the backoff between them can take
    pub fn budget(&self, per_attempt: Duration) -> Duration {
        let attempts = self.config.max_retries.saturating_add(1);
        let backoff: Duration = (0..self.config.max_retries)
            .map(|attempt| {
                let base = self.config.initial_delay.as_millis() as f64
                    * self.config.backoff_multiplier.powi(attempt as i32);
                let capped = base.min(self.config.max_delay.as_millis() as f64);
                Duration::from_millis((capped * (1.0 + self.config.jitter)).ceil() as u64)
            })
            .sum();
        per_attempt.saturating_mul(attempts) + backoff
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.calculate_delay(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying augmentation request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
