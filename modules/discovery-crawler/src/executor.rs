use std::future::Future;
use std::pin::pin;

use futures::stream::{self, StreamExt};
use tracing::warn;

use discovery_common::Result;

/// Runs independent remote-fetch tasks with a capped degree of parallelism.
///
/// Remote (recoverable) failures degrade to "no data for this item". Any other
/// error stops the batch; tasks still in flight are dropped.
#[derive(Debug, Clone, Copy)]
pub struct BoundedExecutor {
    max_concurrency: usize,
}

impl BoundedExecutor {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run all tasks and concatenate their results in completion order.
    pub async fn execute<T, Fut, I>(&self, stage: &'static str, tasks: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        let mut results = pin!(stream::iter(tasks).buffer_unordered(self.max_concurrency));
        let mut collected = Vec::new();
        let mut failed = 0usize;
        while let Some(result) = results.next().await {
            match result {
                Ok(items) => collected.extend(items),
                Err(e) if e.is_recoverable() => {
                    failed += 1;
                    warn!(stage, error = %e, "Task failed, treating as empty");
                }
                Err(e) => return Err(e),
            }
        }
        if failed > 0 {
            warn!(stage, failed, "Batch finished with degraded results");
        }
        Ok(collected)
    }

    /// Run side-effect tasks; returns once every task has finished.
    pub async fn execute_void<Fut, I>(&self, stage: &'static str, tasks: I) -> Result<()>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<()>>,
    {
        self.execute(
            stage,
            tasks
                .into_iter()
                .map(|task| async move { task.await.map(|()| Vec::<()>::new()) }),
        )
        .await
        .map(|_| ())
    }
}
