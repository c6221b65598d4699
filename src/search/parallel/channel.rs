//! Task queue, result channel and shared cancellation state for parallel
//! exploration.

use crate::search::enumerate::WindowEnd;
use crate::search::result::{SearchStatistics, Solution};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// One unit of work: enumerate one window for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub target: usize,
    pub window: usize,
}

/// Message sent from workers to the coordinator.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Worker found a match for a target.
    Found {
        worker_id: usize,
        target: usize,
        solution: Solution,
    },
    /// Worker stopped enumerating a window.
    WindowDone {
        worker_id: usize,
        task: Task,
        end: WindowEnd,
        statistics: SearchStatistics,
    },
    /// Worker has run out of tasks.
    Finished {
        worker_id: usize,
        statistics: SearchStatistics,
    },
}

/// Lowest window in which a target has been solved, and when work on the
/// target began.
#[derive(Debug)]
pub struct TargetProgress {
    /// `usize::MAX` means unsolved.
    solved_window: AtomicUsize,
    started: OnceLock<Instant>,
}

impl Default for TargetProgress {
    fn default() -> Self {
        Self {
            solved_window: AtomicUsize::new(usize::MAX),
            started: OnceLock::new(),
        }
    }
}

impl TargetProgress {
    /// Record a match in `window`. Returns true if this is a new lowest window.
    pub fn try_update(&self, window: usize) -> bool {
        let mut current = self.solved_window.load(Ordering::SeqCst);
        loop {
            if window >= current {
                return false;
            }
            match self.solved_window.compare_exchange_weak(
                current,
                window,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(c) => current = c,
            }
        }
    }

    pub fn solved_window(&self) -> Option<usize> {
        match self.solved_window.load(Ordering::SeqCst) {
            usize::MAX => None,
            w => Some(w),
        }
    }

    /// Whether work on `window` can no longer change the first match.
    pub fn is_superseded(&self, window: usize) -> bool {
        self.solved_window.load(Ordering::SeqCst) < window
    }

    /// Deadline of this target's `timeout` budget. The clock starts the first
    /// time any worker asks, which is when the target's first task begins.
    pub fn deadline(&self, timeout: Option<Duration>) -> Option<Instant> {
        let started = *self.started.get_or_init(Instant::now);
        timeout.map(|t| started + t)
    }
}

/// State shared between the coordinator and every worker.
#[derive(Debug)]
pub struct SharedState {
    targets: Vec<TargetProgress>,
    /// Flag to signal all workers to stop.
    should_stop: AtomicBool,
}

impl SharedState {
    pub fn new(num_targets: usize) -> Self {
        Self {
            targets: (0..num_targets).map(|_| TargetProgress::default()).collect(),
            should_stop: AtomicBool::new(false),
        }
    }

    pub fn target(&self, index: usize) -> &TargetProgress {
        &self.targets[index]
    }

    /// Check if we should stop exploring.
    pub fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    /// Signal all workers to stop.
    pub fn signal_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }
}

/// Channel endpoints for a worker.
pub struct WorkerChannels {
    /// Shared task queue.
    pub tasks: Receiver<Task>,
    /// Send messages to coordinator.
    pub to_coordinator: Sender<WorkerMessage>,
    /// Shared cancellation state.
    pub shared: Arc<SharedState>,
}

/// Channel endpoints for the coordinator.
pub struct CoordinatorChannels {
    /// Receive messages from workers.
    pub from_workers: Receiver<WorkerMessage>,
    /// Shared cancellation state.
    pub shared: Arc<SharedState>,
}

/// Create channels for parallel exploration with the task queue pre-filled.
///
/// The queue is closed once filled, so a worker's `recv` fails exactly when
/// no work is left.
pub fn create_channels(
    num_workers: usize,
    num_targets: usize,
    tasks: impl IntoIterator<Item = Task>,
) -> (CoordinatorChannels, Vec<WorkerChannels>) {
    let shared = Arc::new(SharedState::new(num_targets));

    let (task_tx, task_rx) = unbounded();
    for task in tasks {
        // the receiver is alive, so sending cannot fail
        let _ = task_tx.send(task);
    }
    drop(task_tx);

    // Unbounded channel from workers to coordinator (workers shouldn't block)
    let (worker_tx, coordinator_rx) = unbounded();

    let worker_channels = (0..num_workers)
        .map(|_| WorkerChannels {
            tasks: task_rx.clone(),
            to_coordinator: worker_tx.clone(),
            shared: Arc::clone(&shared),
        })
        .collect();

    let coordinator = CoordinatorChannels {
        from_workers: coordinator_rx,
        shared,
    };

    (coordinator, worker_channels)
}

/// Window-major task order: every target's window 0, then every target's
/// window 1, and so on.
pub fn window_major_tasks(num_targets: usize, num_windows: usize) -> Vec<Task> {
    (0..num_windows)
        .flat_map(|window| (0..num_targets).map(move |target| Task { target, window }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_progress_update() {
        let progress = TargetProgress::default();
        assert_eq!(progress.solved_window(), None);
        assert!(!progress.is_superseded(100));

        // Initial update should succeed
        assert!(progress.try_update(5));
        assert_eq!(progress.solved_window(), Some(5));

        // Lower window should succeed
        assert!(progress.try_update(3));
        assert_eq!(progress.solved_window(), Some(3));

        // Higher or equal window should fail
        assert!(!progress.try_update(4));
        assert!(!progress.try_update(3));
        assert_eq!(progress.solved_window(), Some(3));

        assert!(progress.is_superseded(4));
        assert!(!progress.is_superseded(3));
    }

    #[test]
    fn test_target_deadline_starts_once() {
        let progress = TargetProgress::default();
        assert_eq!(progress.deadline(None), None);

        let timeout = Duration::from_millis(100);
        let first = progress.deadline(Some(timeout)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(progress.deadline(Some(timeout)), Some(first));
    }

    #[test]
    fn test_shared_stop_signal() {
        let shared = SharedState::new(2);

        assert!(!shared.should_stop());
        shared.signal_stop();
        assert!(shared.should_stop());
    }

    #[test]
    fn test_window_major_order() {
        let tasks = window_major_tasks(2, 2);
        assert_eq!(
            tasks,
            vec![
                Task { target: 0, window: 0 },
                Task { target: 1, window: 0 },
                Task { target: 0, window: 1 },
                Task { target: 1, window: 1 },
            ]
        );
    }

    #[test]
    fn test_create_channels() {
        let (coordinator, workers) = create_channels(4, 1, window_major_tasks(1, 3));

        assert_eq!(workers.len(), 4);

        // Tasks are shared: each is received by exactly one worker
        let received: Vec<_> = workers[0].tasks.iter().collect();
        assert_eq!(received.len(), 3);
        assert!(workers[1].tasks.recv().is_err());

        // Test sending from worker to coordinator
        let msg = WorkerMessage::Finished {
            worker_id: 0,
            statistics: SearchStatistics::default(),
        };
        workers[0].to_coordinator.send(msg).unwrap();

        match coordinator.from_workers.recv().unwrap() {
            WorkerMessage::Finished { worker_id, .. } => assert_eq!(worker_id, 0),
            _ => panic!("Unexpected message type"),
        }
    }
}
