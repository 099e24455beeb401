use tokio_util::sync::CancellationToken;

use crate::api::RepositoryApi;
use crate::config::ReconcilerConfig;
use crate::error::ReconcileError;

/// Everything one reconcile pass may use: the remote API, the config, and a
/// pass-scoped cancellation signal. Nothing here is mutated during a pass.
pub struct ReconcileContext<'a> {
    pub api: &'a dyn RepositoryApi,
    pub config: &'a ReconcilerConfig,
    pub cancel: CancellationToken,
}

impl<'a> ReconcileContext<'a> {
    pub fn new(api: &'a dyn RepositoryApi, config: &'a ReconcilerConfig) -> Self {
        Self {
            api,
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Checked before every remote call. Completed calls are never rolled back.
    pub(crate) fn checkpoint(&self, api: &'static str) -> Result<(), ReconcileError> {
        if self.cancel.is_cancelled() {
            tracing::warn!(api, "reconcile pass cancelled");
            return Err(ReconcileError::Cancelled { before: api });
        }
        Ok(())
    }
}
