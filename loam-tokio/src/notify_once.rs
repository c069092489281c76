use std::sync::Arc;

use tokio::sync::Semaphore;

/// A notification channel that delivers a signal to every consumer at most
/// once. Its main use in loam is shutdown: anything holding a clone can
/// request shutdown, and every waiting task observes the request.
///
/// Properties:
///
/// - Multi-producer, multi-consumer; clone to get another handle.
/// - Sending more than once (including from different handles) is harmless.
/// - A handle cloned *after* the signal was sent still observes it once.
///
/// Internally this leans on [`Semaphore`]: a semaphore with zero permits
/// never grants an [`acquire`], so the call only returns once the semaphore
/// is closed. `send` closes the semaphore; `recv` waits for the resulting
/// [`AcquireError`]. Closing an already-closed semaphore is a no-op, which
/// is what makes repeated sends safe.
///
/// [`acquire`]: Semaphore::acquire
/// [`AcquireError`]: tokio::sync::AcquireError
#[derive(Debug)]
pub struct NotifyOnce {
    inner: Arc<Semaphore>,
    seen: bool,
}

impl NotifyOnce {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Semaphore::new(0)),
            seen: false,
        }
    }

    /// Fire the signal. All current and future handles waiting in [`recv`]
    /// complete. Calling this again (accidentally or otherwise) does nothing.
    ///
    /// [`recv`]: NotifyOnce::recv
    pub fn send(&self) {
        self.inner.close();
    }

    /// Wait for the signal.
    ///
    /// NOTE: a handle that has already observed the signal will wait forever;
    /// each handle sees the signal at most once.
    pub async fn recv(&mut self) {
        if self.seen {
            std::future::pending().await
        } else {
            let acquired = self.inner.acquire().await;
            assert!(acquired.is_err(), "zero-permit semaphore granted a permit");
            self.seen = true;
        }
    }

    /// Whether the signal has been sent. Does not count as an observation;
    /// a later [`recv`](Self::recv) on this handle still completes.
    #[must_use]
    pub fn try_recv(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Clone for NotifyOnce {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            // A fresh clone gets its own chance to observe the signal.
            seen: false,
        }
    }
}
