use crate::{grid_library, scenario_library, target_of};
use arcdream::compress::{compress, description_length, CompressionConfig};
use arcdream::ir::{Grid, Type};
use arcdream::library::Prior;
use arcdream::search::{explore, SearchConfig};
use arcdream::semantics::{evaluate, matches_target};

#[test]
fn test_explore_finds_repeated_zero_grid() {
    let lib = scenario_library();
    let prior = Prior::uniform(&lib);
    let target = Grid::filled(2, 3, 3, 0);

    let result = explore(&lib, &prior, &Type::MAT, &target, &SearchConfig::default());
    let solution = result.solution().expect("scenario target should be solved");

    assert_eq!(
        lib.display(&solution.program).to_string(),
        "rep_t(fill(0, 3, 3), 2)"
    );
    assert_eq!(solution.size, 6);
    assert!(solution.window <= 5);
    let value = evaluate(&lib, &solution.program).unwrap();
    assert!(matches_target(&value, &target));
}

#[test]
fn test_compress_adopts_shared_zero_fill() {
    let lib = grid_library();
    let programs = vec![
        lib.parse("rep_t(fill(0, 3, 3), 2)").unwrap(),
        lib.parse("flip_h(fill(0, 3, 3))").unwrap(),
    ];
    let before: usize = programs.iter().map(|p| p.size()).sum();
    let dl = description_length(&lib, &programs);

    let result = compress(&lib, programs, &CompressionConfig::default()).unwrap();
    assert_eq!(result.adopted.len(), 1);
    let adoption = &result.adopted[0];
    assert_eq!((adoption.size, adoption.occurrences, adoption.arity), (4, 2, 0));
    assert_eq!(adoption.score, 2);

    let after: usize = result.programs.iter().map(|p| p.size()).sum();
    assert_eq!(before - after, 6);
    assert_eq!(dl - result.description_length(), 2);

    let g0 = result.library.find("g0").unwrap();
    assert_eq!(g0.arity(), 0);
    assert_eq!(
        result.library.display(&result.programs[1]).to_string(),
        "flip_h(g0)"
    );
    assert_eq!(
        evaluate(&result.library, &result.programs[0]).unwrap().as_grid(),
        Some(&target_of(&lib, "rep_t(fill(0, 3, 3), 2)"))
    );
}
