use crate::action::Action;
use crate::request::Request;

/// Decides which [`Action`] a request maps to.
///
/// Called exactly once per request. An `Err` is answered with a bare `ERROR`
/// reply; use [`Action::error`] to give the client a message instead.
#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, request: &Request) -> anyhow::Result<Action>;
}
