//! Offline augmenters
//!
//! `NoopAugmenter` never changes anything. `MockAugmenter` returns canned
//! replies per key and records every request, for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{FlowcError, Result};

use super::{AugmentKey, AugmentRequest, Augmenter};

/// Leaves every request unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAugmenter;

#[async_trait]
impl Augmenter for NoopAugmenter {
    fn name(&self) -> &str {
        "noop"
    }

    async fn rewrite(&self, _request: &AugmentRequest) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Canned replies keyed by request
#[derive(Debug, Clone, Default)]
pub struct MockAugmenter {
    replies: FxHashMap<AugmentKey, String>,
    failure: Option<String>,
    delay: Option<Duration>,
    /// Every request received (for assertions)
    requests: Arc<Mutex<Vec<AugmentRequest>>>,
}

impl MockAugmenter {
    /// Leaves everything unchanged until replies are added
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every request with `AugmentationFailed`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_reply(mut self, key: AugmentKey, reply: impl Into<String>) -> Self {
        self.replies.insert(key, reply.into());
        self
    }

    /// Sleep before answering, to exercise timeouts and cancellation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<AugmentRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Augmenter for MockAugmenter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn rewrite(&self, request: &AugmentRequest) -> Result<Option<String>> {
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(FlowcError::AugmentationFailed {
                reason: reason.clone(),
            });
        }
        Ok(self.replies.get(&request.key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: AugmentKey) -> AugmentRequest {
        AugmentRequest {
            key,
            text: "check the order".to_string(),
            lang: "en".to_string(),
            variables: vec![],
        }
    }

    #[tokio::test]
    async fn test_noop_never_changes() {
        let reply = NoopAugmenter.rewrite(&request(AugmentKey::Preamble)).await;
        assert_eq!(reply.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mock_replies_by_key_and_records() {
        let mock = MockAugmenter::new().with_reply(AugmentKey::Task("a".into()), "@next END");

        let hit = mock.rewrite(&request(AugmentKey::Task("a".into()))).await;
        let miss = mock.rewrite(&request(AugmentKey::Task("b".into()))).await;

        assert_eq!(hit.unwrap().as_deref(), Some("@next END"));
        assert_eq!(miss.unwrap(), None);
        assert_eq!(mock.request_count(), 2);
        assert_eq!(mock.requests()[1].key, AugmentKey::Task("b".into()));
    }

    #[tokio::test]
    async fn test_clones_share_request_log() {
        let mock = MockAugmenter::new();
        let clone = mock.clone();
        clone.rewrite(&request(AugmentKey::Preamble)).await.unwrap();
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let err = MockAugmenter::failing("down")
            .rewrite(&request(AugmentKey::Preamble))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
