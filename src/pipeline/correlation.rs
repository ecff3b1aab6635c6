//! Correlation identifiers.
//!
//! An id is taken from a `correlation_id` field on the event or an enclosing
//! span when present, otherwise from the task scope set with [`scope`].

use std::fmt;
use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

/// Field name recognized on events and spans.
pub const CORRELATION_FIELD: &str = "correlation_id";

tokio::task_local! {
    static CURRENT: CorrelationId;
}

/// Identifier shared by every record of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run `fut` with `id` as the ambient correlation id.
pub async fn scope<F: Future>(id: CorrelationId, fut: F) -> F::Output {
    CURRENT.scope(id, fut).await
}

/// Run `f` synchronously with `id` as the ambient correlation id.
pub fn sync_scope<R>(id: CorrelationId, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(id, f)
}

/// The ambient correlation id, if any.
pub fn current() -> Option<CorrelationId> {
    CURRENT.try_with(|id| id.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scope_propagates_across_await() {
        assert_eq!(current(), None);

        let id = CorrelationId::from("req-42");
        let seen = scope(id.clone(), async {
            tokio::task::yield_now().await;
            current()
        })
        .await;

        assert_eq!(seen, Some(id));
        assert_eq!(current(), None);
    }

    #[test]
    fn test_new_ids_are_unique_uuids() {
        let a = CorrelationId::new();
        let b = CorrelationId::new();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
        assert_eq!(sync_scope(a.clone(), current), Some(a));
    }
}
