//! Single-execution admission.
//!
//! Triggers arrive concurrently but macros drive one shared mouse and keyboard.
//! The gate admits one execution at a time; a trigger that finds it closed is
//! dropped by the caller, never queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct ExecutionGate {
    busy: Arc<AtomicBool>,
}

impl ExecutionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate, or `None` while an execution holds it.
    pub fn try_acquire(&self) -> Option<GateGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Reopens the gate when dropped.
#[derive(Debug)]
pub struct GateGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_holder_at_a_time() {
        let gate = ExecutionGate::new();
        let guard = gate.try_acquire().expect("gate starts open");
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());
        assert!(gate.clone().try_acquire().is_none());
        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn guard_released_from_another_thread() {
        let gate = ExecutionGate::new();
        let guard = gate.try_acquire().unwrap();
        std::thread::spawn(move || drop(guard)).join().unwrap();
        assert!(gate.try_acquire().is_some());
    }
}
