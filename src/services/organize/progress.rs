//! Per-result mutual exclusion around file moves
//!
//! The tracker is created with the organizer service and shared by every
//! organize call it runs. A [ProgressGuard] holds a result id for the
//! duration of one move and releases it on drop, including on error,
//! cancellation and panic.
//!
//! The tracker also counts completed moves per id. A caller snapshots the
//! count when it starts and compares it after claiming the id; a changed
//! count means another call already moved the file in between.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct TrackerState {
    held: HashSet<Uuid>,
    moves: HashMap<Uuid, u64>,
}

#[derive(Debug, Clone, Default)]
pub struct InProgressTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl InProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `id`. `None` if another caller holds it.
    pub fn try_begin(&self, id: Uuid) -> Option<ProgressGuard> {
        if self.state.lock().held.insert(id) {
            Some(ProgressGuard {
                id,
                moved: false,
                state: Arc::clone(&self.state),
            })
        } else {
            None
        }
    }

    pub fn is_in_progress(&self, id: Uuid) -> bool {
        self.state.lock().held.contains(&id)
    }

    /// Number of completed moves recorded for `id`
    pub fn moves(&self, id: Uuid) -> u64 {
        self.state.lock().moves.get(&id).copied().unwrap_or(0)
    }

    /// Snapshot of the ids currently held
    pub fn ids(&self) -> Vec<Uuid> {
        self.state.lock().held.iter().copied().collect()
    }
}

/// Releases its id when dropped
#[derive(Debug)]
pub struct ProgressGuard {
    id: Uuid,
    moved: bool,
    state: Arc<Mutex<TrackerState>>,
}

impl ProgressGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Count a completed move for this id once the guard is released
    pub fn mark_moved(&mut self) {
        self.moved = true;
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.held.remove(&self.id);
        if self.moved {
            *state.moves.entry(self.id).or_default() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_refused() {
        let tracker = InProgressTracker::new();
        let id = Uuid::new_v4();

        let guard = tracker.try_begin(id).unwrap();
        assert_eq!(guard.id(), id);
        assert!(tracker.try_begin(id).is_none());
        assert!(tracker.is_in_progress(id));
        assert!(tracker.try_begin(Uuid::new_v4()).is_some());

        drop(guard);
        assert!(!tracker.is_in_progress(id));
        assert!(tracker.try_begin(id).is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let tracker = InProgressTracker::new();
        let id = Uuid::new_v4();

        let cloned = tracker.clone();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.try_begin(id).unwrap();
            panic!("move failed");
        }));

        assert!(outcome.is_err());
        assert!(tracker.ids().is_empty());
        assert_eq!(tracker.moves(id), 0);
    }

    #[test]
    fn test_moves_counted_on_release() {
        let tracker = InProgressTracker::new();
        let id = Uuid::new_v4();

        drop(tracker.try_begin(id).unwrap());
        assert_eq!(tracker.moves(id), 0);

        let mut guard = tracker.try_begin(id).unwrap();
        guard.mark_moved();
        assert_eq!(tracker.moves(id), 0);
        drop(guard);
        assert_eq!(tracker.moves(id), 1);
        assert!(!tracker.is_in_progress(id));
    }
}
