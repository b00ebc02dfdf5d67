//! Process shutdown signals.
use std::{
    fmt,
    future::Future,
    io,
    pin::Pin,
    task::{Context, Poll},
};

use futures::FutureExt;
use tokio::signal::unix::{Signal, SignalKind};
use tracing::{debug, info};

/// Resolves on the first SIGINT or SIGTERM.
pub struct ShutdownSignal {
    ctrl_c: Pin<Box<dyn Future<Output = io::Result<()>> + Send>>,
    term_signal: Signal,
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal").finish_non_exhaustive()
    }
}

impl ShutdownSignal {
    /// Install the signal handlers.
    pub fn new() -> io::Result<Self> {
        let ctrl_c = Box::pin(tokio::signal::ctrl_c());
        let term_signal = tokio::signal::unix::signal(SignalKind::terminate())?;
        Ok(Self { ctrl_c, term_signal })
    }
}

impl Future for ShutdownSignal {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.ctrl_c.poll_unpin(cx).is_ready() {
            debug!("Received SIGINT signal");
            return Poll::Ready(());
        }

        if this.term_signal.poll_recv(cx).is_ready() {
            debug!("Received SIGTERM signal");
            return Poll::Ready(());
        }

        Poll::Pending
    }
}

/// Drive `fut` until it completes or `shutdown` resolves.
///
/// Returns `None` when interrupted; `fut` is dropped at that point, so
/// callers stop their background work afterwards.
pub async fn run_until_shutdown<F, S, O>(fut: F, shutdown: S) -> Option<O>
where
    F: Future<Output = O>,
    S: Future<Output = ()>,
{
    tokio::select! {
        // Boxed to keep the state machine off the stack.
        result = Box::pin(fut) => Some(result),
        () = shutdown => {
            info!("Shutdown signal received");
            None
        }
    }
}
