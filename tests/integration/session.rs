use crate::scenario_library;
use arcdream::ir::Type;
use arcdream::library::Prior;
use arcdream::recognition::FrequencyModel;
use arcdream::sample::Sampler;
use arcdream::search::{ParallelConfig, SearchConfig};
use arcdream::semantics::evaluate;
use arcdream::session::{Session, SessionConfig};
use std::time::Duration;

#[test]
fn test_dream_session_learns_and_keeps_solutions_valid() {
    let lib = scenario_library();
    let prior = Prior::uniform(&lib);
    let targets: Vec<_> = Sampler::new(&lib, &prior, 2)
        .with_max_depth(3)
        .dream(&Type::MAT, 6)
        .into_iter()
        .map(|d| d.target)
        .collect();
    assert!(!targets.is_empty());

    let config = SessionConfig::default()
        .with_search(SearchConfig::default().with_max_cost(12.0))
        .with_parallel(
            ParallelConfig::default()
                .with_workers(2)
                .with_timeout(Duration::from_secs(60)),
        )
        .with_rounds(2);
    let mut session = Session::new(lib, Box::new(FrequencyModel::default()), config);
    let reports = session.run(&targets).unwrap();

    assert_eq!(reports.len(), 2);
    // every dream is reachable within the budget
    assert_eq!(reports[0].solved, targets.len());
    assert_eq!(session.store().len(), targets.len());
    for report in &reports {
        assert!(report.description_length_after <= report.description_length_before);
        let saved: i64 = report.adopted.iter().map(|a| a.score).sum();
        assert_eq!(
            report.description_length_before as i64 - report.description_length_after as i64,
            saved
        );
    }

    for entry in session.store().iter() {
        let value = evaluate(session.library(), &entry.program).unwrap();
        assert_eq!(value.as_grid(), Some(&entry.target));
    }
    assert!(session.prior().missing(session.library()).is_empty());
}
