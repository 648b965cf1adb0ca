//! Cooperative cancellation
//!
//! A cancel signal is a `watch::Receiver<bool>` that flips to `true` once. The
//! same channel type drives graceful shutdown in the CLI, so a Ctrl+C cancels
//! any in-flight token request, registry pull or render.

use tokio::sync::watch;

/// Receiver side of a cancellation channel
pub type CancelSignal = watch::Receiver<bool>;

/// Resolves once the signal has been raised
///
/// If every sender is dropped without raising the signal, the future never
/// resolves.
pub async fn cancelled(signal: &CancelSignal) {
    let mut rx = signal.clone();
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Whether the signal has already been raised
pub fn is_cancelled(signal: &CancelSignal) -> bool {
    *signal.borrow()
}

/// A signal that is never raised
pub fn never_cancelled() -> CancelSignal {
    let (_tx, rx) = watch::channel(false);
    rx
}
