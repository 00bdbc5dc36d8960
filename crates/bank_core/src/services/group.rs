//! crates/bank_core/src/services/group.rs
//!
//! A small structured task group: fan out independent sub-operations that
//! share one cancellation token, then fan back in.
//!
//! The first failure cancels the token so siblings that have not started yet
//! skip their work. Sub-operations already in flight are never dropped; `wait`
//! joins every task before it returns, and reports the first error in
//! completion order.

use std::future::Future;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct TaskGroup<E> {
    tasks: JoinSet<Result<(), E>>,
    token: CancellationToken,
}

impl<E> TaskGroup<E>
where
    E: From<JoinError> + Send + 'static,
{
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// A group that cancels (and honours) an existing token, so code outside
    /// the group can react to the first failure too.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            token,
        }
    }

    /// A clone of the group's shared token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawns a sub-operation.
    ///
    /// A sub-operation that sees the token cancelled before it starts returns
    /// `Ok(())`: the group already holds the error that cancelled it.
    pub fn spawn<Fut>(&mut self, task: Fut)
    where
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        let token = self.token.clone();
        self.tasks.spawn(async move {
            if token.is_cancelled() {
                return Ok(());
            }
            let result = task.await;
            if result.is_err() {
                token.cancel();
            }
            result
        });
    }

    /// Waits for every sub-operation and returns the first error, if any.
    pub async fn wait(mut self) -> Result<(), E> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            let outcome = joined.map_err(E::from).and_then(|result| result);
            if let Err(e) = outcome {
                self.token.cancel();
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    debug!("Task group: dropping a later failure");
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<E> Default for TaskGroup<E>
where
    E: From<JoinError> + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
