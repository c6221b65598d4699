//! Single-pass enumeration under a fixed cost ceiling
//!
//! [`Candidates`] walks the space depth-first with an explicit work stack and
//! yields every tree cheaper than the ceiling exactly once. There are no
//! windows, so trees do not come out in cost order; callers that need
//! "everything below this cost has been tried" at intermediate points should
//! use the windowed [`Enumerator`](super::enumerate::Enumerator) instead.

use crate::ir::{Forest, Grid, NodeId, PrimId, Program, Type};
use crate::library::{Library, Prior};
use crate::search::config::SearchMode;
use crate::search::enumerate::ChoiceTable;
use crate::search::result::{ExploreResult, SearchStatistics, Solution, Unsolved};
use crate::semantics::{evaluate_node, matches_target};
use std::time::{Duration, Instant};

/// A partial tree: pre-order picks so far plus the slots still to fill,
/// next slot on top.
#[derive(Debug, Clone)]
struct Partial {
    picks: Vec<PrimId>,
    pending: Vec<(Type, usize)>,
    cost: f64,
}

/// A complete candidate produced by [`Candidates`]
#[derive(Debug, Clone)]
pub struct Candidate {
    pub program: Program,
    /// Description length, `-log p`
    pub cost: f64,
}

/// Depth-first generator of every tree of one type below a cost ceiling
pub struct Candidates<'a> {
    library: &'a Library,
    table: ChoiceTable,
    ceiling: f64,
    max_depth: usize,
    stack: Vec<Partial>,
}

impl<'a> Candidates<'a> {
    pub fn new(library: &'a Library, prior: &Prior, request: &Type, ceiling: f64) -> Self {
        Self {
            library,
            table: ChoiceTable::new(library, prior),
            ceiling,
            max_depth: usize::MAX,
            stack: vec![Partial {
                picks: Vec::new(),
                pending: vec![(request.clone(), 1)],
                cost: 0.0,
            }],
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    fn materialize(&self, picks: &[PrimId]) -> Option<Program> {
        let mut forest = Forest::with_capacity(picks.len());
        let mut pos = 0;
        let root = build(self.library, &mut forest, picks, &mut pos)?;
        (pos == picks.len()).then(|| Program::new(forest, root))
    }
}

fn build(
    library: &Library,
    forest: &mut Forest,
    picks: &[PrimId],
    pos: &mut usize,
) -> Option<NodeId> {
    let def = library.get(*picks.get(*pos)?)?;
    *pos += 1;
    let mut tails = Vec::with_capacity(def.arity());
    for _ in 0..def.arity() {
        tails.push(build(library, forest, picks, pos)?);
    }
    Some(forest.add(def.node(tails)))
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        while let Some(mut partial) = self.stack.pop() {
            let Some((ty, depth)) = partial.pending.pop() else {
                if let Some(program) = self.materialize(&partial.picks) {
                    return Some(Candidate {
                        program,
                        cost: partial.cost,
                    });
                }
                continue;
            };

            // pushed in reverse so the first library entry is expanded first
            for choice in self.table.choices(&ty).iter().rev() {
                let cost = partial.cost + choice.cost;
                if cost >= self.ceiling {
                    continue;
                }
                if !choice.args.is_empty() && depth >= self.max_depth {
                    continue;
                }
                let mut next = partial.clone();
                next.picks.push(choice.id);
                next.cost = cost;
                next.pending
                    .extend(choice.args.iter().rev().map(|arg| (arg.clone(), depth + 1)));
                self.stack.push(next);
            }
        }
        None
    }
}

/// Search every tree below `ceiling` for one evaluating to `target`
pub fn explore_below(
    library: &Library,
    prior: &Prior,
    request: &Type,
    target: &Grid,
    ceiling: f64,
    mode: SearchMode,
    timeout: Option<Duration>,
) -> ExploreResult {
    let start = Instant::now();
    let deadline = timeout.map(|t| start + t);
    let mut stats = SearchStatistics::new(mode);
    let mut best: Option<Solution> = None;
    let mut timed_out = false;

    for (ordinal, candidate) in Candidates::new(library, prior, request, ceiling).enumerate() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            timed_out = true;
            break;
        }
        stats.candidates_evaluated += 1;
        let size = candidate.program.size();
        if best.as_ref().is_some_and(|b| b.size <= size) {
            continue;
        }
        match evaluate_node(library, candidate.program.forest(), candidate.program.root()) {
            Ok(value) if matches_target(&value, target) => {
                stats.matches += 1;
                stats.improvements_found += 1;
                best = Some(Solution {
                    program: candidate.program,
                    size,
                    log_prob: -candidate.cost,
                    window: 0,
                    ordinal: ordinal as u64,
                });
                if mode == SearchMode::Fast {
                    break;
                }
            }
            Ok(_) => {}
            Err(err) if err.is_recoverable() => stats.eval_failures += 1,
            Err(err) => log::warn!("discarding malformed candidate: {}", err),
        }
    }

    stats.elapsed_time = start.elapsed();
    match best {
        Some(solution) => ExploreResult::solved(solution, stats),
        None if timed_out => ExploreResult::unsolved(Unsolved::Timeout, stats),
        None => {
            stats.windows_completed = 1;
            ExploreResult::unsolved(Unsolved::Exhausted, stats)
        }
    }
}
