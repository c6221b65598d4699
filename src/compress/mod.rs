//! Library compression
//!
//! Repeatedly mine the solved trees for the ghost that saves the most
//! description length, adopt it as a discovered primitive, and rewrite every
//! tree to call it. The loop stops when no ghost has a positive score or the
//! iteration cap is hit.
//!
//! Description length is the node count of every solved tree plus the
//! non-hole node count of every discovered body. Each adoption lowers it by
//! exactly the adopted ghost's score.

pub mod config;
pub mod ghost;
pub mod rewrite;

pub use config::CompressionConfig;
pub use ghost::{Ghost, ScoredGhost};

use crate::ir::Program;
use crate::library::{Library, LibraryError};

/// A ghost that was turned into a library entry
#[derive(Debug, Clone)]
pub struct Adoption {
    pub name: String,
    pub score: i64,
    pub occurrences: usize,
    pub size: usize,
    pub arity: usize,
}

/// Output of [`compress`]
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub library: Library,
    /// The input programs, rewritten, in input order
    pub programs: Vec<Program>,
    pub adopted: Vec<Adoption>,
}

impl CompressionResult {
    pub fn description_length(&self) -> usize {
        description_length(&self.library, &self.programs)
    }
}

/// Total size of the programs plus the bodies of discovered primitives
pub fn description_length(library: &Library, programs: &[Program]) -> usize {
    let trees: usize = programs.iter().map(Program::size).sum();
    let bodies: usize = library
        .discovered()
        .filter_map(|def| def.body())
        .map(|body| {
            let forest = body.forest();
            forest
                .preorder(body.root())
                .into_iter()
                .filter(|&id| !forest.get(id).is_hole())
                .count()
        })
        .sum();
    trees + bodies
}

/// Find the best ghost over `programs`, if any has a positive score
pub fn best_ghost(
    library: &Library,
    programs: &[Program],
    config: &CompressionConfig,
) -> Option<ScoredGhost> {
    let ghosts = ghost::mine(programs, config.max_holes);
    log::trace!("{} candidate ghosts", ghosts.len());
    let producible = library.producible_types();
    let scored = ghost::score_all(ghosts, programs, config.min_occurrences, &producible);
    ghost::select(scored)
}

/// Compress `programs` against `library`.
///
/// Fails only if registering an adopted ghost is rejected, which indicates a
/// malformed tree in the input.
pub fn compress(
    library: &Library,
    programs: Vec<Program>,
    config: &CompressionConfig,
) -> Result<CompressionResult, LibraryError> {
    let mut library = library.clone();
    let mut programs = programs;
    let mut adopted = Vec::new();

    for iteration in 0..config.max_iterations {
        let Some(best) = best_ghost(&library, &programs, config) else {
            log::debug!("no compressing ghost after {} adoptions", iteration);
            break;
        };

        let (next, id) =
            library.register_discovered(best.ghost.body.clone(), best.ghost.args.clone())?;
        library = next;
        let def = library
            .get(id)
            .ok_or_else(|| LibraryError::UnknownPrimitive(id.to_string()))?;

        let mut replaced = 0;
        for program in programs.iter_mut() {
            replaced += rewrite::rewrite_program(program, &best.ghost, def);
        }
        debug_assert_eq!(replaced, best.occurrences);

        log::info!(
            "adopted {} = {} (score {}, {} occurrences)",
            def.name,
            library.display(&best.ghost.body),
            best.score,
            best.occurrences
        );
        adopted.push(Adoption {
            name: def.name.clone(),
            score: best.score,
            occurrences: best.occurrences,
            size: best.ghost.size,
            arity: best.ghost.arity(),
        });
    }

    Ok(CompressionResult {
        library,
        programs,
        adopted,
    })
}
