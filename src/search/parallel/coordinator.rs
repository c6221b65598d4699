//! Parallel exploration coordinator that manages worker threads.

use crate::ir::{Grid, Type};
use crate::library::{Library, Prior};
use crate::search::config::{SearchConfig, SearchMode};
use crate::search::enumerate::{Explorer, Interrupt, Window, WindowEnd};
use crate::search::parallel::channel::{
    create_channels, window_major_tasks, CoordinatorChannels, SharedState, WorkerChannels,
    WorkerMessage,
};
use crate::search::parallel::config::ParallelConfig;
use crate::search::result::{ExploreResult, SearchStatistics, Solution, Unsolved};
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result from parallel exploration.
#[derive(Debug)]
pub struct ParallelResult {
    /// One result per target, in input order.
    pub results: Vec<ExploreResult>,
    /// Statistics aggregated from all workers.
    pub total_statistics: SearchStatistics,
    /// Per-worker statistics.
    pub worker_statistics: Vec<(usize, SearchStatistics)>,
}

impl ParallelResult {
    pub fn solved_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_solved()).count()
    }
}

/// Explore every target in parallel, one `(target, window)` task at a time.
///
/// In fast mode the answer for each target is the match with the lowest
/// window and then the lowest ordinal, which is the match a sequential
/// [`Explorer`] returns.
pub fn run_parallel_explore(
    library: &Library,
    prior: &Prior,
    request: &Type,
    targets: &[Grid],
    search_config: &SearchConfig,
    parallel_config: &ParallelConfig,
) -> ParallelResult {
    let start_time = Instant::now();
    let num_workers = parallel_config.num_workers.max(1);
    let num_windows = search_config.window_count();

    let tasks = window_major_tasks(targets.len(), num_windows);
    let (coordinator_channels, worker_channels) =
        create_channels(num_workers, targets.len(), tasks);

    // Clone data for workers
    let library = Arc::new(library.clone());
    let prior = Arc::new(prior.clone());
    let request = Arc::new(request.clone());
    let targets = Arc::new(targets.to_vec());
    let search_config = Arc::new(search_config.clone());
    // round deadline; each target also gets `search_config.timeout` of its own
    let deadline = parallel_config.timeout.map(|t| start_time + t);

    let worker_handles: Vec<_> = worker_channels
        .into_iter()
        .enumerate()
        .map(|(worker_id, channels)| {
            let library = Arc::clone(&library);
            let prior = Arc::clone(&prior);
            let request = Arc::clone(&request);
            let targets = Arc::clone(&targets);
            let search_config = Arc::clone(&search_config);

            std::thread::spawn(move || {
                run_worker(
                    worker_id,
                    &library,
                    &prior,
                    &request,
                    &targets,
                    &search_config,
                    deadline,
                    channels,
                )
            })
        })
        .collect();

    let result = run_coordinator(
        coordinator_channels,
        targets.len(),
        &search_config,
        deadline,
        start_time,
    );

    // Wait for all workers to finish
    for handle in worker_handles {
        if handle.join().is_err() {
            log::error!("exploration worker panicked");
        }
    }

    result
}

/// Per-target bookkeeping on the coordinator side
#[derive(Default)]
struct TargetState {
    best: Option<Solution>,
    statistics: SearchStatistics,
}

/// Coordinator loop that receives messages from workers and aggregates results.
fn run_coordinator(
    channels: CoordinatorChannels,
    num_targets: usize,
    config: &SearchConfig,
    deadline: Option<Instant>,
    start_time: Instant,
) -> ParallelResult {
    let mode = config.mode;
    let num_windows = config.window_count() as u64;
    let mut states: Vec<TargetState> = (0..num_targets)
        .map(|_| TargetState {
            best: None,
            statistics: SearchStatistics::new(mode),
        })
        .collect();
    let mut worker_stats: Vec<(usize, SearchStatistics)> = Vec::new();

    loop {
        // Check if we've exceeded timeout
        if deadline.is_some_and(|d| Instant::now() >= d) && !channels.shared.should_stop() {
            log::debug!("round deadline reached, stopping workers");
            channels.shared.signal_stop();
        }

        // Receive with timeout to allow periodic checks
        match channels.from_workers.recv_timeout(Duration::from_millis(50)) {
            Ok(WorkerMessage::Found {
                worker_id,
                target,
                solution,
            }) => {
                let state = &mut states[target];
                let better = state
                    .best
                    .as_ref()
                    .map_or(true, |b| solution.improves_on(b, mode));
                if better {
                    log::trace!(
                        "worker {} matched target {} in window {} ({} nodes)",
                        worker_id,
                        target,
                        solution.window,
                        solution.size
                    );
                    state.statistics.improvements_found += 1;
                    state.best = Some(solution);
                }
            }
            Ok(WorkerMessage::WindowDone {
                task,
                end,
                statistics,
                ..
            }) => {
                let state = &mut states[task.target];
                state.statistics.merge(&statistics);
                if end == WindowEnd::Complete {
                    state.statistics.windows_completed += 1;
                }
            }
            Ok(WorkerMessage::Finished {
                worker_id,
                statistics,
            }) => {
                worker_stats.push((worker_id, statistics));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // All senders dropped, we're done
                break;
            }
        }
    }

    // Build final result
    let elapsed = start_time.elapsed();
    let mut total_stats = SearchStatistics::new(mode);
    total_stats.elapsed_time = elapsed;

    let results = states
        .into_iter()
        .map(|mut state| {
            state.statistics.elapsed_time = elapsed;
            total_stats.merge(&state.statistics);
            match state.best {
                Some(solution) => ExploreResult::solved(solution, state.statistics),
                None if state.statistics.windows_completed >= num_windows => {
                    ExploreResult::unsolved(Unsolved::Exhausted, state.statistics)
                }
                None => ExploreResult::unsolved(Unsolved::Timeout, state.statistics),
            }
        })
        .collect();

    ParallelResult {
        results,
        total_statistics: total_stats,
        worker_statistics: worker_stats,
    }
}

/// Worker function: pull tasks until the queue is empty or the round stops.
#[allow(clippy::too_many_arguments)]
fn run_worker(
    worker_id: usize,
    library: &Library,
    prior: &Prior,
    request: &Type,
    targets: &[Grid],
    config: &SearchConfig,
    deadline: Option<Instant>,
    channels: WorkerChannels,
) {
    let explorer = Explorer::new(library, prior, config.clone());
    let fast = config.mode == SearchMode::Fast;
    let mut totals = SearchStatistics::new(config.mode);

    while let Ok(task) = channels.tasks.recv() {
        if channels.shared.should_stop() {
            break;
        }
        let progress = channels.shared.target(task.target);
        if fast && progress.solved_window().is_some_and(|w| w <= task.window) {
            // an equal or lower window already holds the first match
            continue;
        }

        let deadline = earliest(deadline, progress.deadline(config.timeout));
        if deadline.is_some_and(|d| Instant::now() >= d) {
            let _ = channels.to_coordinator.send(WorkerMessage::WindowDone {
                worker_id,
                task,
                end: WindowEnd::Interrupted,
                statistics: SearchStatistics::new(config.mode),
            });
            continue;
        }

        let interrupt = cancellation(&channels.shared, task.target, task.window, fast, deadline);
        let window = Window::new(task.window, config.gap);
        let mut stats = SearchStatistics::new(config.mode);
        let (end, found) = explorer.explore_window(
            request,
            &targets[task.target],
            &window,
            interrupt,
            &mut stats,
        );

        if let Some(solution) = found {
            if fast {
                progress.try_update(task.window);
            }
            let _ = channels.to_coordinator.send(WorkerMessage::Found {
                worker_id,
                target: task.target,
                solution,
            });
        }
        totals.merge(&stats);
        let _ = channels.to_coordinator.send(WorkerMessage::WindowDone {
            worker_id,
            task,
            end,
            statistics: stats,
        });
    }

    let _ = channels.to_coordinator.send(WorkerMessage::Finished {
        worker_id,
        statistics: totals,
    });
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Stop when the round stops, the deadline passes, or (in fast mode) a lower
/// window has already solved the target.
fn cancellation(
    shared: &Arc<SharedState>,
    target: usize,
    window: usize,
    fast: bool,
    deadline: Option<Instant>,
) -> Interrupt {
    let shared = Arc::clone(shared);
    Interrupt::none()
        .with_deadline(deadline)
        .with_cancel(move || {
            shared.should_stop() || (fast && shared.target(target).is_superseded(window))
        })
}
