//! End-to-end tests over the public API and the binary

mod cli;
mod compression;
mod determinism;
mod scenario;
mod session;
mod snapshot;

use arcdream::dsl::grid;
use arcdream::ir::Grid;
use arcdream::library::Library;
use arcdream::semantics::evaluate;

pub fn scenario_library() -> Library {
    Library::new(grid::scenario_primitives()).unwrap()
}

pub fn grid_library() -> Library {
    Library::new(grid::grid_primitives()).unwrap()
}

/// Value of `text` under `library`
pub fn target_of(library: &Library, text: &str) -> Grid {
    let program = library.parse(text).unwrap();
    evaluate(library, &program)
        .unwrap()
        .as_grid()
        .unwrap()
        .clone()
}
