use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;

use futures::future::poll_fn;
use futures::task::AtomicWaker;

/// Token for cooperative shutdown of the scan loop.
///
/// Clones share state. Traversal work polls [`ShutdownToken::is_cancelled`] at
/// natural yield points; the scheduler awaits [`ShutdownToken::cancelled`] to
/// cut its inter-cycle sleep short. Only one task may await `cancelled` at a
/// time.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    waker: AtomicWaker,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Requests shutdown and wakes the waiting task, if any.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.waker.wake();
    }

    /// Resolves once [`ShutdownToken::cancel`] has been called.
    pub fn cancelled(&self) -> impl Future<Output = ()> + '_ {
        poll_fn(move |cx| {
            if self.is_cancelled() {
                return Poll::Ready(());
            }
            self.inner.waker.register(cx.waker());
            // cancel() may have run between the check and the registration
            if self.is_cancelled() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }
}
