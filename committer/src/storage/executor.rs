//! The committer API is synchronous, but [`object_store`] is async. A [`TaskExecutor`] runs the
//! async IO to completion on behalf of a blocking caller.
//!
//! [`TokioBackgroundExecutor`] owns a single-threaded tokio runtime on a dedicated thread, so it
//! can be used both from plain threads and from inside another async runtime.

use std::future::Future;
use std::sync::mpsc;
use std::thread;

use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;

use crate::{Error, LoadResult};

/// Runs a future to completion for a synchronous caller.
///
/// Must be usable from within an async context, so it cannot simply call
/// `tokio::runtime::Runtime::block_on` on the calling thread.
pub trait TaskExecutor: Send + Sync + 'static {
    /// Block until `task` finishes and return its output. Fails only if the executor itself is
    /// gone.
    fn block_on<T>(&self, task: T) -> LoadResult<T::Output>
    where
        T: Future + Send + 'static,
        T::Output: Send + 'static;
}

/// A [`TaskExecutor`] backed by a current-thread tokio runtime driven by a background thread.
/// The thread stops when the executor is dropped.
#[derive(Debug)]
pub struct TokioBackgroundExecutor {
    handle: Handle,
    _shutdown: oneshot::Sender<()>,
    _thread: thread::JoinHandle<()>,
}

impl TokioBackgroundExecutor {
    pub fn try_new() -> LoadResult<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        let (shutdown, stopped) = oneshot::channel::<()>();
        let thread = thread::Builder::new()
            .name("load-committer-io".to_string())
            .spawn(move || {
                // spawned tasks make progress only while this block_on is running
                runtime.block_on(async move {
                    let _ = stopped.await;
                });
            })?;
        Ok(Self {
            handle,
            _shutdown: shutdown,
            _thread: thread,
        })
    }
}

impl TaskExecutor for TokioBackgroundExecutor {
    fn block_on<T>(&self, task: T) -> LoadResult<T::Output>
    where
        T: Future + Send + 'static,
        T::Output: Send + 'static,
    {
        // a std channel, since the caller may itself be inside an async context
        let (sender, receiver) = mpsc::channel();
        self.handle.spawn(async move {
            sender.send(task.await).ok();
        });
        receiver.recv().map_err(|_| {
            Error::join_failure("background IO runtime stopped before the task finished")
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    fn run_tasks(executor: &impl TaskExecutor) {
        let result = executor
            .block_on(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                2 + 2
            })
            .unwrap();
        assert_eq!(result, 4);

        let nested: LoadResult<u32> = executor
            .block_on(async { Err(Error::generic("inner failure")) })
            .unwrap();
        assert!(matches!(nested, Err(Error::Generic(msg)) if msg == "inner failure"));
    }

    #[test]
    fn runs_tasks_from_plain_thread() {
        let executor = TokioBackgroundExecutor::try_new().unwrap();
        run_tasks(&executor);
    }

    #[tokio::test]
    async fn runs_tasks_from_async_context() {
        let executor = TokioBackgroundExecutor::try_new().unwrap();
        run_tasks(&executor);
    }

    #[test]
    fn shared_between_threads() {
        let executor = Arc::new(TokioBackgroundExecutor::try_new().unwrap());
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let executor = executor.clone();
                thread::spawn(move || executor.block_on(async move { i * 10 }).unwrap())
            })
            .collect();
        let mut results: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.sort_unstable();
        assert_eq!(results, [0, 10, 20, 30]);
    }
}
