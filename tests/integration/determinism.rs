use crate::scenario_library;
use arcdream::ir::{Grid, PrimId, Type};
use arcdream::library::Prior;
use arcdream::sample::Sampler;
use arcdream::search::{
    explore, run_parallel_explore, Candidates, Enumerator, Flow, Interrupt, ParallelConfig,
    SearchConfig, SearchMode, Window,
};
use std::time::Duration;

fn targets() -> Vec<Grid> {
    vec![
        Grid::filled(2, 3, 3, 0),
        Grid::filled(1, 1, 2, 2),
        Grid::filled(4, 2, 2, 3),
        Grid::filled(1, 3, 3, 1),
    ]
}

#[test]
fn test_best_effort_runs_are_identical() {
    let lib = scenario_library();
    let prior = Prior::uniform(&lib);
    let config = SearchConfig::default()
        .with_mode(SearchMode::BestEffort)
        .with_max_cost(9.0)
        .with_timeout_option(None);
    let target = Grid::filled(1, 2, 3, 1);

    let a = explore(&lib, &prior, &Type::MAT, &target, &config);
    let b = explore(&lib, &prior, &Type::MAT, &target, &config);
    assert_eq!(
        a.statistics.candidates_evaluated,
        b.statistics.candidates_evaluated
    );
    assert_eq!(a.statistics.matches, b.statistics.matches);

    let (a, b) = (a.solution().unwrap(), b.solution().unwrap());
    assert_eq!(a.program, b.program);
    assert_eq!(a.position(), b.position());
    assert_eq!(lib.display(&a.program).to_string(), "fill(1, 2, 3)");
}

/// Every tree of every window below `windows * 1.5`, in visiting order
fn visiting_order(windows: usize) -> Vec<(Vec<PrimId>, f64)> {
    let lib = scenario_library();
    let prior = Prior::uniform(&lib);
    let enumerator = Enumerator::new(&lib, &prior, 4);
    let mut visited = Vec::new();
    for k in 0..windows {
        let window = Window::new(k, 1.5);
        enumerator.enumerate_window(&Type::MAT, &window, Interrupt::none(), |picks, cost| {
            visited.push((picks.to_vec(), cost));
            Flow::Continue
        });
    }
    visited
}

#[test]
fn test_windows_visit_candidates_in_identical_order() {
    let first = visiting_order(6);
    assert!(first.len() > 100);
    assert_eq!(first, visiting_order(6));
    // costs never decrease from one window to the next
    let mut last_window = 0;
    for (_, cost) in &first {
        let window = (cost / 1.5).floor() as usize;
        assert!(window >= last_window);
        last_window = window;
    }
}

#[test]
fn test_lazy_candidates_come_in_identical_order() {
    let lib = scenario_library();
    let prior = Prior::uniform(&lib);
    let run = || {
        Candidates::new(&lib, &prior, &Type::MAT, 9.0)
            .with_max_depth(4)
            .map(|c| (lib.display(&c.program).to_string(), c.cost))
            .collect::<Vec<_>>()
    };
    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}

#[test]
fn test_parallel_agrees_with_sequential() {
    let lib = scenario_library();
    let prior = Prior::uniform(&lib);
    let search_config = SearchConfig::default()
        .with_max_cost(15.0)
        .with_timeout_option(None);
    let targets = targets();

    for workers in [1, 3] {
        let parallel_config = ParallelConfig::default()
            .with_workers(workers)
            .with_timeout(Duration::from_secs(60));
        let parallel = run_parallel_explore(
            &lib,
            &prior,
            &Type::MAT,
            &targets,
            &search_config,
            &parallel_config,
        );
        assert_eq!(parallel.solved_count(), targets.len());

        for (target, result) in targets.iter().zip(&parallel.results) {
            let sequential = explore(&lib, &prior, &Type::MAT, target, &search_config);
            let (p, s) = (result.solution().unwrap(), sequential.solution().unwrap());
            assert_eq!(p.program, s.program, "{} workers", workers);
            assert_eq!(p.position(), s.position());
        }
    }
}

#[test]
fn test_dreams_repeat_for_a_seed() {
    let lib = scenario_library();
    let prior = Prior::uniform(&lib);
    let render = |seed| {
        Sampler::new(&lib, &prior, seed)
            .with_max_depth(3)
            .dream(&Type::MAT, 6)
            .iter()
            .map(|d| lib.display(&d.program).to_string())
            .collect::<Vec<_>>()
    };
    let first = render(11);
    assert!(!first.is_empty());
    assert_eq!(first, render(11));
}
