//! Explicit result of a best-effort operation against the upstream page.
//!
//! Markup volatility must never escalate on its own, so operations that touch
//! the page report one of four outcomes and the caller decides whether to
//! degrade or escalate.

use crate::browser::DriverError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation produced a value.
    Success(T),
    /// The operation ran but nothing matched.
    Empty,
    /// The operation-local deadline elapsed.
    Timeout,
    /// The driver reported an error.
    Error(DriverError),
}

impl<T> Outcome<T> {
    /// Run `fut` under an operation-local deadline and classify its result.
    pub async fn bounded<F>(limit: Duration, fut: F) -> Self
    where
        F: Future<Output = Result<Option<T>, DriverError>>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(Some(value))) => Outcome::Success(value),
            Ok(Ok(None)) => Outcome::Empty,
            Ok(Err(e)) => Outcome::Error(e),
            Err(_elapsed) => Outcome::Timeout,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Collapse into an `Option`, discarding why there is no value.
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Short label for structured log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Empty => "empty",
            Outcome::Timeout => "timeout",
            Outcome::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_classifies_results() {
        let ok = Outcome::bounded(Duration::from_secs(1), async { Ok(Some(3)) }).await;
        assert!(matches!(ok, Outcome::Success(3)));

        let empty: Outcome<u8> = Outcome::bounded(Duration::from_secs(1), async { Ok(None) }).await;
        assert!(matches!(empty, Outcome::Empty));

        let err: Outcome<u8> = Outcome::bounded(Duration::from_secs(1), async {
            Err(DriverError::ConnectionClosed)
        })
        .await;
        assert_eq!(err.label(), "error");
    }

    #[tokio::test]
    async fn bounded_times_out() {
        let slow: Outcome<u8> = Outcome::bounded(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Some(1))
        })
        .await;
        assert!(matches!(slow, Outcome::Timeout));
        assert!(slow.ok().is_none());
    }
}
