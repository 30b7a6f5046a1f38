//! Cooperative per-thread interruption.
//!
//! Blocking collaborators (a journal waiting for queue space, for example)
//! check the calling thread's flag, clear it, and fail with an interrupted
//! error. Code that catches such an error and cannot propagate it as a
//! return value re-sets the flag so the condition stays observable to its
//! own caller.
//!
//! ```
//! use ledger_host_types::interrupt;
//!
//! interrupt::interrupt_current();
//! assert!(interrupt::is_interrupted());
//! assert!(interrupt::take_interrupted());
//! assert!(!interrupt::is_interrupted());
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

thread_local! {
    static FLAG: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
}

/// Handle that interrupts the thread it was obtained on, from any thread.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    /// Sets the owning thread's interrupt flag.
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns the owning thread's flag without clearing it.
    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Returns a handle for interrupting the calling thread.
pub fn current_handle() -> InterruptHandle {
    FLAG.with(|flag| InterruptHandle { flag: Arc::clone(flag) })
}

/// Sets the calling thread's interrupt flag.
pub fn interrupt_current() {
    FLAG.with(|flag| flag.store(true, Ordering::SeqCst));
}

/// Returns the calling thread's interrupt flag without clearing it.
pub fn is_interrupted() -> bool {
    FLAG.with(|flag| flag.load(Ordering::SeqCst))
}

/// Returns and clears the calling thread's interrupt flag.
pub fn take_interrupted() -> bool {
    FLAG.with(|flag| flag.swap(false, Ordering::SeqCst))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_per_thread() {
        interrupt_current();
        let other = std::thread::spawn(is_interrupted).join().unwrap();
        assert!(!other, "flag must not leak to other threads");
        assert!(take_interrupted());
    }

    #[test]
    fn test_take_clears() {
        assert!(!take_interrupted());
        interrupt_current();
        assert!(take_interrupted());
        assert!(!take_interrupted());
    }

    #[test]
    fn test_handle_interrupts_owning_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            tx.send(current_handle()).unwrap();
            done_rx.recv().unwrap();
            take_interrupted()
        });
        let handle = rx.recv().unwrap();
        handle.interrupt();
        assert!(handle.is_interrupted());
        done_tx.send(()).unwrap();
        assert!(worker.join().unwrap());
        assert!(!is_interrupted());
    }
}
