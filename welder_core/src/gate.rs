//! Single-session gate.
//!
//! The session state lives in one `AtomicU8`. A session starts with a
//! compare-exchange from `Idle`, so two triggers can never both win, and the
//! returned guard puts the gate back to `Idle` when dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Synchronizing = 1,
    Firing = 2,
    Reporting = 3,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Synchronizing,
            2 => SessionState::Firing,
            3 => SessionState::Reporting,
            _ => SessionState::Idle,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionGate {
    state: Arc<AtomicU8>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate. Returns `None` when a session is already active.
    pub fn try_begin(&self) -> Option<SessionGuard> {
        self.state
            .compare_exchange(
                SessionState::Idle as u8,
                SessionState::Synchronizing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| SessionGuard {
                state: Arc::clone(&self.state),
            })
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_busy(&self) -> bool {
        self.state() != SessionState::Idle
    }

    /// Read-only handle for other threads.
    pub fn monitor(&self) -> SessionMonitor {
        SessionMonitor {
            state: Arc::clone(&self.state),
        }
    }
}

/// Shareable, read-only view of the session state.
#[derive(Debug, Clone)]
pub struct SessionMonitor {
    state: Arc<AtomicU8>,
}

impl SessionMonitor {
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_welding(&self) -> bool {
        self.state() != SessionState::Idle
    }
}

/// Proof of an active session. Dropping it returns the gate to `Idle`.
#[derive(Debug)]
pub struct SessionGuard {
    state: Arc<AtomicU8>,
}

impl SessionGuard {
    pub fn advance(&self, to: SessionState) {
        // Idle is only reachable through Drop.
        if to != SessionState::Idle {
            self.state.store(to as u8, Ordering::Release);
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.store(SessionState::Idle as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn second_begin_fails_until_guard_dropped() {
        let gate = SessionGate::new();
        let monitor = gate.monitor();
        let guard = gate.try_begin().expect("idle gate");
        assert!(gate.try_begin().is_none());
        guard.advance(SessionState::Firing);
        assert_eq!(monitor.state(), SessionState::Firing);
        assert!(monitor.is_welding());
        drop(guard);
        assert_eq!(monitor.state(), SessionState::Idle);
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn only_one_thread_wins_the_gate() {
        let gate = SessionGate::new();
        let barrier = Arc::new(Barrier::new(8));
        let (tx, rx) = std::sync::mpsc::channel();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let barrier = Arc::clone(&barrier);
                let tx = tx.clone();
                thread::spawn(move || {
                    barrier.wait();
                    if let Some(guard) = gate.try_begin() {
                        tx.send(()).unwrap();
                        // Hold until every contender has tried.
                        thread::sleep(std::time::Duration::from_millis(50));
                        drop(guard);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        drop(tx);
        assert_eq!(rx.iter().count(), 1);
    }
}
