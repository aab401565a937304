use std::{sync::Arc, time::Duration};

use {async_trait::async_trait, tracing::warn};

use crate::intent::Classification;

/// External classifier boundary.
///
/// Implementations turn free text plus a short context summary into a
/// [`Classification`]. Errors are allowed here; the [`ClassifierHandle`]
/// guarantees they never reach the turn pipeline.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str, context_summary: &str) -> anyhow::Result<Classification>;
}

/// Timeout-and-fallback wrapper around any classifier.
///
/// A slow or failing classifier degrades to the unknown-intent response; it
/// can never stall a turn indefinitely or surface an error to the user.
#[derive(Clone)]
pub struct ClassifierHandle {
    inner: Arc<dyn IntentClassifier>,
    timeout: Duration,
}

impl ClassifierHandle {
    pub fn new(inner: Arc<dyn IntentClassifier>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Classify, falling back to [`Classification::unknown`] on any failure.
    pub async fn classify_or_fallback(&self, text: &str, context_summary: &str) -> Classification {
        match tokio::time::timeout(self.timeout, self.inner.classify(text, context_summary)).await
        {
            Ok(Ok(classification)) => classification,
            Ok(Err(e)) => {
                warn!(error = %e, "classifier failed, using unknown-intent fallback");
                Classification::unknown()
            },
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "classifier timed out");
                Classification::unknown()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Intent;

    struct Slow;

    #[async_trait]
    impl IntentClassifier for Slow {
        async fn classify(&self, _: &str, _: &str) -> anyhow::Result<Classification> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Classification::unknown())
        }
    }

    struct Failing;

    #[async_trait]
    impl IntentClassifier for Failing {
        async fn classify(&self, _: &str, _: &str) -> anyhow::Result<Classification> {
            anyhow::bail!("upstream unavailable")
        }
    }

    struct Fixed(Intent);

    #[async_trait]
    impl IntentClassifier for Fixed {
        async fn classify(&self, _: &str, _: &str) -> anyhow::Result<Classification> {
            Ok(Classification {
                intent: self.0,
                entities: Default::default(),
                confidence: 1.0,
            })
        }
    }

    #[tokio::test]
    async fn timeout_falls_back() {
        let handle = ClassifierHandle::new(Arc::new(Slow), Duration::from_millis(50));
        let c = handle.classify_or_fallback("hello", "").await;
        assert_eq!(c.intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn error_falls_back() {
        let handle = ClassifierHandle::new(Arc::new(Failing), Duration::from_secs(5));
        let c = handle.classify_or_fallback("hello", "").await;
        assert_eq!(c.intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn success_passes_through() {
        let handle = ClassifierHandle::new(Arc::new(Fixed(Intent::Help)), Duration::from_secs(5));
        let c = handle.classify_or_fallback("help", "").await;
        assert_eq!(c.intent, Intent::Help);
    }
}
