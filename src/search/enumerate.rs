//! Windowed anytime enumeration
//!
//! Candidates are measured by description length, `cost = -log p`, the sum of
//! the prior costs of every node in the tree. The cost axis is cut into
//! half-open windows `[k * gap, (k + 1) * gap)` and each window is enumerated
//! exhaustively before the next one starts. Since every node costs at least
//! zero, a partial tree whose running cost already reaches the window's upper
//! bound can be pruned without visiting its completions.
//!
//! Expansion is continuation-passing: filling a slot calls back with the cost
//! of the subtree just chosen, and the enclosing node folds those costs across
//! its argument slots. Only the last slot of a node sees the window's lower
//! bound; earlier slots are bounded from above only.

use crate::ir::{Forest, Grid, NodeId, PrimId, Program, Type};
use crate::library::{Library, Prior, PrimitiveDef};
use crate::search::config::{SearchConfig, SearchMode};
use crate::search::result::{ExploreResult, SearchStatistics, Solution, Unsolved};
use crate::semantics::{evaluate_node, matches_target};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Slack on the internal pruning bounds. The exact window test is repeated on
/// the canonical cost of every complete tree, so slack never lets a tree into
/// two windows.
const BOUND_SLACK: f64 = 1e-9;

/// Number of expansions between two wall-clock checks
const CLOCK_INTERVAL: u64 = 256;

/// Whether enumeration should continue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

impl Flow {
    pub fn is_stop(self) -> bool {
        self == Flow::Stop
    }
}

/// One half-open band of description length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
}

impl Window {
    pub fn new(index: usize, gap: f64) -> Self {
        Self {
            index,
            lower: index as f64 * gap,
            upper: (index + 1) as f64 * gap,
        }
    }

    pub fn contains(&self, cost: f64) -> bool {
        self.lower <= cost && cost < self.upper
    }
}

/// Cooperative stop condition checked at every expansion step
#[derive(Clone, Default)]
pub struct Interrupt {
    deadline: Option<Instant>,
    cancel: Option<Arc<dyn Fn() -> bool + Send + Sync>>,
}

impl Interrupt {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_cancel<F>(mut self, cancel: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.cancel = Some(Arc::new(cancel));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c())
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// A library entry as seen by the enumerator
#[derive(Debug, Clone)]
pub(crate) struct Choice {
    pub id: PrimId,
    pub cost: f64,
    pub args: Vec<Type>,
}

/// Library entries grouped by return type, in library order, paired with
/// their prior cost. Entries the prior makes unusable are left out.
#[derive(Debug, Clone)]
pub(crate) struct ChoiceTable {
    by_type: BTreeMap<Type, Vec<Choice>>,
    costs: Vec<f64>,
}

impl ChoiceTable {
    pub fn new(library: &Library, prior: &Prior) -> Self {
        let mut by_type = BTreeMap::new();
        for ty in library.types() {
            let choices: Vec<Choice> = library
                .lookup(ty, prior)
                .into_iter()
                .filter(|(_, log_prob)| log_prob.is_finite())
                .map(|(def, log_prob)| Choice {
                    id: def.id,
                    cost: -log_prob,
                    args: def.args.clone(),
                })
                .collect();
            by_type.insert(ty.clone(), choices);
        }
        let costs = library.iter().map(|def| prior.cost(def.id)).collect();
        Self { by_type, costs }
    }

    pub fn choices(&self, ty: &Type) -> &[Choice] {
        self.by_type.get(ty).map_or(&[], |c| c.as_slice())
    }

    /// Canonical description length of a pre-order pick sequence
    pub fn cost_of(&self, picks: &[PrimId]) -> f64 {
        picks
            .iter()
            .fold(0.0, |acc, id| acc + self.costs[id.0 as usize])
    }
}

/// Mutable state threaded through one window's expansion
pub(crate) struct State {
    picks: Vec<PrimId>,
    steps: u64,
    interrupt: Interrupt,
    stopped: bool,
}

impl State {
    fn new(interrupt: Interrupt) -> Self {
        Self {
            picks: Vec::new(),
            steps: 0,
            interrupt,
            stopped: false,
        }
    }

    fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        self.steps += 1;
        if self.interrupt.is_cancelled()
            || (self.steps % CLOCK_INTERVAL == 0 && self.interrupt.deadline_passed())
        {
            self.stopped = true;
        }
        self.stopped
    }
}

/// How a single window enumeration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEnd {
    /// Every tree in the window was produced
    Complete,
    /// The consumer asked to stop
    Stopped,
    /// The interrupt fired before the window finished
    Interrupted,
}

type Continuation<'k> = dyn FnMut(&mut State, f64) -> Flow + 'k;

/// Deterministic enumerator over one library snapshot and prior
pub struct Enumerator<'a> {
    library: &'a Library,
    table: ChoiceTable,
    max_depth: usize,
}

impl<'a> Enumerator<'a> {
    pub fn new(library: &'a Library, prior: &Prior, max_depth: usize) -> Self {
        Self {
            library,
            table: ChoiceTable::new(library, prior),
            max_depth: max_depth.max(1),
        }
    }

    pub fn library(&self) -> &'a Library {
        self.library
    }

    /// Produce every tree of type `ty` whose cost lies in `window`, in a
    /// fixed order, as its pre-order primitive picks and canonical cost.
    pub fn enumerate_window<F>(
        &self,
        ty: &Type,
        window: &Window,
        interrupt: Interrupt,
        mut emit: F,
    ) -> WindowEnd
    where
        F: FnMut(&[PrimId], f64) -> Flow,
    {
        let mut state = State::new(interrupt);
        let mut consumer_stopped = false;
        let flow = self.expand(
            ty,
            window.lower,
            window.upper,
            1,
            &mut state,
            &mut |st: &mut State, _| {
                let cost = self.table.cost_of(&st.picks);
                if !window.contains(cost) {
                    return Flow::Continue;
                }
                let flow = emit(&st.picks, cost);
                if flow.is_stop() {
                    consumer_stopped = true;
                }
                flow
            },
        );
        match flow {
            Flow::Continue => WindowEnd::Complete,
            Flow::Stop if consumer_stopped => WindowEnd::Stopped,
            Flow::Stop => WindowEnd::Interrupted,
        }
    }

    /// Fill one slot of type `ty` with every subtree whose cost lies in
    /// `[lo, hi)`, calling `k` with each subtree's cost.
    fn expand(
        &self,
        ty: &Type,
        lo: f64,
        hi: f64,
        depth: usize,
        state: &mut State,
        k: &mut Continuation<'_>,
    ) -> Flow {
        for choice in self.table.choices(ty) {
            if state.should_stop() {
                return Flow::Stop;
            }
            if choice.cost >= hi + BOUND_SLACK {
                continue;
            }
            let flow = if choice.args.is_empty() {
                if choice.cost + BOUND_SLACK < lo {
                    continue;
                }
                state.picks.push(choice.id);
                k(state, choice.cost)
            } else {
                if depth >= self.max_depth {
                    continue;
                }
                let own = choice.cost;
                state.picks.push(choice.id);
                self.expand_args(
                    &choice.args,
                    lo - own,
                    hi - own,
                    depth + 1,
                    state,
                    &mut |st: &mut State, rest| k(st, own + rest),
                )
            };
            state.picks.pop();
            if flow.is_stop() {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Fold over argument slots left to right. Earlier slots take any cost
    /// below the remaining upper bound; the last slot closes the window.
    fn expand_args(
        &self,
        args: &[Type],
        lo: f64,
        hi: f64,
        depth: usize,
        state: &mut State,
        k: &mut Continuation<'_>,
    ) -> Flow {
        match args.split_first() {
            None => k(state, 0.0),
            Some((last, [])) => self.expand(last, lo, hi, depth, state, k),
            Some((first, rest)) => self.expand(
                first,
                0.0,
                hi,
                depth,
                state,
                &mut |st: &mut State, used| {
                    self.expand_args(
                        rest,
                        lo - used,
                        hi - used,
                        depth,
                        st,
                        &mut |st2: &mut State, more| k(st2, used + more),
                    )
                },
            ),
        }
    }

    /// Append the tree described by pre-order `picks` to `forest`
    pub fn materialize(&self, forest: &mut Forest, picks: &[PrimId]) -> Option<NodeId> {
        let mut pos = 0;
        let root = self.build(forest, picks, &mut pos)?;
        (pos == picks.len()).then_some(root)
    }

    fn build(&self, forest: &mut Forest, picks: &[PrimId], pos: &mut usize) -> Option<NodeId> {
        let def: &PrimitiveDef = self.library.get(*picks.get(*pos)?)?;
        *pos += 1;
        let mut tails = Vec::with_capacity(def.arity());
        for _ in 0..def.arity() {
            tails.push(self.build(forest, picks, pos)?);
        }
        Some(forest.add(def.node(tails)))
    }
}

/// Single-target exploration driver
pub struct Explorer<'a> {
    enumerator: Enumerator<'a>,
    config: SearchConfig,
}

impl<'a> Explorer<'a> {
    pub fn new(library: &'a Library, prior: &Prior, config: SearchConfig) -> Self {
        Self {
            enumerator: Enumerator::new(library, prior, config.max_depth),
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn enumerator(&self) -> &Enumerator<'a> {
        &self.enumerator
    }

    /// Search windows in increasing order for a program of type `request`
    /// evaluating to `target`.
    pub fn explore(&self, request: &Type, target: &Grid) -> ExploreResult {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        self.explore_with(request, target, Interrupt::none().with_deadline(deadline))
    }

    /// As [`explore`](Self::explore), with a caller-supplied stop condition
    pub fn explore_with(
        &self,
        request: &Type,
        target: &Grid,
        interrupt: Interrupt,
    ) -> ExploreResult {
        let start = Instant::now();
        let mut stats = SearchStatistics::new(self.config.mode);
        let mut best: Option<Solution> = None;
        let mut timed_out = false;

        for index in 0..self.config.window_count() {
            let window = Window::new(index, self.config.gap);
            let (end, found) =
                self.explore_window(request, target, &window, interrupt.clone(), &mut stats);

            if let Some(found) = found {
                let better = best
                    .as_ref()
                    .map_or(true, |b| found.improves_on(b, self.config.mode));
                if better {
                    stats.improvements_found += 1;
                    best = Some(found);
                }
            }
            match end {
                WindowEnd::Complete => {
                    stats.windows_completed += 1;
                    log::trace!(
                        "window {} [{:.2}, {:.2}) complete, {} candidates so far",
                        index,
                        window.lower,
                        window.upper,
                        stats.candidates_evaluated
                    );
                }
                WindowEnd::Stopped => {}
                WindowEnd::Interrupted => {
                    timed_out = true;
                }
            }
            if timed_out || (self.config.mode == SearchMode::Fast && best.is_some()) {
                break;
            }
        }

        stats.elapsed_time = start.elapsed();
        match best {
            Some(solution) => ExploreResult::solved(solution, stats),
            None if timed_out => ExploreResult::unsolved(Unsolved::Timeout, stats),
            None => ExploreResult::unsolved(Unsolved::Exhausted, stats),
        }
    }

    /// Enumerate one window against `target`. In fast mode the first match
    /// ends the window; in best-effort mode the smallest match in the window
    /// is kept.
    pub fn explore_window(
        &self,
        request: &Type,
        target: &Grid,
        window: &Window,
        interrupt: Interrupt,
        stats: &mut SearchStatistics,
    ) -> (WindowEnd, Option<Solution>) {
        let mode = self.config.mode;
        let library = self.enumerator.library();
        let mut scratch = Forest::new();
        let mut best: Option<Solution> = None;
        let mut ordinal = 0u64;

        let end = self
            .enumerator
            .enumerate_window(request, window, interrupt, |picks, cost| {
                let current = ordinal;
                ordinal += 1;
                stats.candidates_evaluated += 1;

                if best.as_ref().is_some_and(|b| b.size <= picks.len()) {
                    return Flow::Continue;
                }

                scratch.truncate(0);
                let Some(root) = self.enumerator.materialize(&mut scratch, picks) else {
                    return Flow::Continue;
                };
                match evaluate_node(library, &scratch, root) {
                    Ok(value) if matches_target(&value, target) => {
                        stats.matches += 1;
                        best = Some(Solution {
                            program: Program::extract(&scratch, root),
                            size: picks.len(),
                            log_prob: -cost,
                            window: window.index,
                            ordinal: current,
                        });
                        if mode == SearchMode::Fast {
                            return Flow::Stop;
                        }
                    }
                    Ok(_) => {}
                    Err(err) if err.is_recoverable() => stats.eval_failures += 1,
                    Err(err) => log::warn!("discarding malformed candidate: {}", err),
                }
                Flow::Continue
            });
        (end, best)
    }
}

/// Explore one target with a fresh [`Explorer`]
pub fn explore(
    library: &Library,
    prior: &Prior,
    request: &Type,
    target: &Grid,
    config: &SearchConfig,
) -> ExploreResult {
    Explorer::new(library, prior, config.clone()).explore(request, target)
}
