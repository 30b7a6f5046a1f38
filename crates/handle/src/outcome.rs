//! Completion handle for a fence marker append.

use std::{fmt, future::IntoFuture};

use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::error::FenceError;

type Slot = Option<Result<bool, FenceError>>;

/// Result of logging a ledger's fence marker in the journal.
///
/// Resolves to:
/// - `Ok(true)`: the fence marker is durable
/// - `Ok(false)`: the journal reported a failure; the next fence call retries
/// - `Err(_)`: the append never reached the journal or was abandoned
///
/// Clones observe the same result. Awaiting never cancels the append; wrap
/// the wait in `tokio::time::timeout` to bound it.
#[derive(Clone)]
pub struct FenceOutcome {
    rx: watch::Receiver<Slot>,
}

impl FenceOutcome {
    /// An outcome that is already resolved.
    pub fn completed(result: Result<bool, FenceError>) -> Self {
        let (_tx, rx) = watch::channel(Some(result));
        Self { rx }
    }

    /// An unresolved outcome and the promise that resolves it.
    pub(crate) fn pending() -> (Self, FencePromise) {
        let (tx, rx) = watch::channel(None);
        (Self { rx }, FencePromise { tx })
    }

    /// Returns true once the outcome is resolved.
    pub fn is_done(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Returns the result without waiting, if resolved.
    pub fn peek(&self) -> Option<Result<bool, FenceError>> {
        Option::clone(&self.rx.borrow())
    }

    /// Returns true when both handles track the same append.
    pub fn same_outcome(&self, other: &FenceOutcome) -> bool {
        self.rx.same_channel(&other.rx)
    }

    /// Waits for the result.
    ///
    /// # Errors
    ///
    /// Returns the [`FenceError`] the append completed with.
    pub async fn wait(&self) -> Result<bool, FenceError> {
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(slot) => match &*slot {
                Some(result) => result.clone(),
                None => Err(FenceError::Abandoned),
            },
            // The promise always publishes before its sender goes away.
            Err(_) => Err(FenceError::Abandoned),
        }
    }

    /// Blocks the current thread until the result is available.
    ///
    /// Must not be called from an async context.
    ///
    /// # Errors
    ///
    /// Returns the [`FenceError`] the append completed with.
    pub fn wait_blocking(&self) -> Result<bool, FenceError> {
        futures::executor::block_on(self.wait())
    }
}

impl IntoFuture for FenceOutcome {
    type Output = Result<bool, FenceError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

impl fmt::Debug for FenceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.rx.borrow() {
            Some(result) => f.debug_tuple("FenceOutcome").field(result).finish(),
            None => f.write_str("FenceOutcome(<pending>)"),
        }
    }
}

/// Write side of a pending [`FenceOutcome`].
///
/// The first completion wins. A promise dropped without being completed
/// resolves its outcome with [`FenceError::Abandoned`].
pub(crate) struct FencePromise {
    tx: watch::Sender<Slot>,
}

impl FencePromise {
    /// Resolves the outcome. Returns false if it was already resolved.
    pub(crate) fn complete(&self, result: Result<bool, FenceError>) -> bool {
        let mut result = Some(result);
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = result.take();
            true
        })
    }
}

impl Drop for FencePromise {
    fn drop(&mut self) {
        self.complete(Err(FenceError::Abandoned));
    }
}
