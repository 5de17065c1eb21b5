use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared cooperative cancellation signal.
///
/// Cloning yields a handle to the same flag. Tasks poll it at round
/// boundaries and every few thousand nodes; a stopped run still returns
/// the best state reached so far.
#[derive(Debug, Clone)]
pub struct TerminationFlag {
    running: Arc<AtomicBool>,
}

impl Default for TerminationFlag {
    fn default() -> Self {
        Self::running_true()
    }
}

impl TerminationFlag {
    /// Create a flag in the running state.
    pub fn running_true() -> Self {
        TerminationFlag {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the computation may continue.
    #[inline]
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Ask every holder of this flag to stop.
    pub fn terminate(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test_termination {
    use std::thread;

    use crate::termination::TerminationFlag;

    #[test]
    fn test_terminate_is_shared() {
        let flag = TerminationFlag::running_true();
        let handle = flag.clone();
        assert!(handle.running());

        thread::spawn(move || handle.terminate()).join().unwrap();
        assert!(!flag.running());
    }
}
