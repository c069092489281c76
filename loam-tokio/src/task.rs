use std::{
    borrow::Cow,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::task::{JoinError, JoinHandle};
use tracing::error;

/// A thin wrapper around [`tokio::task::JoinHandle`] that:
///
/// (1) carries a task name for debuggability, and
/// (2) propagates panics from the spawned task to whoever joins it, instead
///     of swallowing them inside a [`JoinError`].
///
/// `#[must_use]` nudges callers towards joining (or explicitly detaching)
/// every spawned task, so background work can't silently leak.
#[must_use]
pub struct LoamTask<T> {
    task: JoinHandle<T>,
    name: Cow<'static, str>,
}

impl<T> LoamTask<T> {
    /// Spawn a named task onto the current runtime.
    pub fn spawn<F>(name: impl Into<Cow<'static, str>>, future: F) -> LoamTask<F::Output>
    where
        F: Future<Output = T> + Send + 'static,
        F::Output: Send + 'static,
    {
        LoamTask {
            task: tokio::spawn(future),
            name: name.into(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calls [`is_finished`] on the underlying [`JoinHandle`].
    ///
    /// [`is_finished`]: tokio::task::JoinHandle::is_finished
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    #[inline]
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Drop the handle, letting the task run detached. The task's output
    /// (and any panic) can no longer be observed; use sparingly.
    #[inline]
    pub fn detach(self) {
        std::mem::drop(self)
    }
}

impl<T> Future for LoamTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(result) => result,
            Poll::Pending => return Poll::Pending,
        };

        let result = match result {
            Ok(value) => Ok(value),
            Err(join_err) => match join_err.try_into_panic() {
                Ok(panic_reason) => {
                    error!("task '{name}' panicked", name = self.name());
                    std::panic::resume_unwind(panic_reason)
                }
                Err(join_err) => Err(join_err),
            },
        };

        Poll::Ready(result)
    }
}
