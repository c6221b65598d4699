//! Ghost mining and scoring
//!
//! A ghost is proposed by anti-unifying two subtrees with the same root
//! primitive: positions where the two agree are kept, positions where they
//! differ (or where either side is frozen) become holes, numbered in
//! pre-order. Occurrences are counted top-down without overlap: once a ghost
//! matches at a node, only the subtrees bound to its holes are searched
//! further. Rewriting walks trees the same way, so every counted occurrence
//! is exactly one rewritten call.

use crate::ir::{Forest, Head, Node, NodeId, PrimId, Program, Type};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

/// A candidate abstraction: a body whose holes are its arguments
#[derive(Debug, Clone)]
pub struct Ghost {
    /// Body with holes `$0..$n` in pre-order
    pub body: Program,
    /// Type of each hole, by index
    pub args: Vec<Type>,
    /// Canonical serialization, unique per shape
    pub key: String,
    /// Non-hole node count
    pub size: usize,
}

impl Ghost {
    fn new(body: Program, args: Vec<Type>) -> Self {
        let forest = body.forest();
        let key = canonical(forest, body.root());
        let size = forest
            .preorder(body.root())
            .into_iter()
            .filter(|&id| !forest.get(id).is_hole())
            .count();
        Self {
            body,
            args,
            key,
            size,
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Net description length saved by adopting this ghost: every
    /// occurrence shrinks from `size` nodes to one, and the body costs
    /// `size` once.
    pub fn score(&self, occurrences: usize) -> i64 {
        occurrences as i64 * (self.size as i64 - 1) - self.size as i64
    }

    /// Match the ghost at `id`, returning the node bound to each hole
    pub fn bind(&self, forest: &Forest, id: NodeId) -> Option<Vec<NodeId>> {
        let mut bound = vec![None; self.arity()];
        if !self.bind_into(self.body.root(), forest, id, &mut bound) {
            return None;
        }
        bound.into_iter().collect()
    }

    fn bind_into(
        &self,
        gid: NodeId,
        forest: &Forest,
        id: NodeId,
        bound: &mut [Option<NodeId>],
    ) -> bool {
        let g = self.body.forest().get(gid);
        let node = forest.get(id);
        if let Head::Hole(i) = g.head {
            if g.ty != node.ty {
                return false;
            }
            bound[i] = Some(id);
            return true;
        }
        !node.frozen
            && g.head == node.head
            && g.ty == node.ty
            && g.tails.len() == node.tails.len()
            && g.tails
                .iter()
                .zip(&node.tails)
                .all(|(&gt, &t)| self.bind_into(gt, forest, t, bound))
    }

    /// Non-overlapping occurrences in the tree at `id`
    pub fn count_in(&self, forest: &Forest, id: NodeId) -> usize {
        match self.bind(forest, id) {
            Some(bound) => 1 + bound.iter().map(|&b| self.count_in(forest, b)).sum::<usize>(),
            None => forest
                .get(id)
                .tails
                .iter()
                .map(|&t| self.count_in(forest, t))
                .sum(),
        }
    }

    /// Occurrences summed over every program
    pub fn occurrences(&self, programs: &[Program]) -> usize {
        programs
            .iter()
            .map(|p| self.count_in(p.forest(), p.root()))
            .sum()
    }
}

/// A ghost together with its occurrence count and score
#[derive(Debug, Clone)]
pub struct ScoredGhost {
    pub ghost: Ghost,
    pub occurrences: usize,
    pub score: i64,
}

/// Canonical serialization of a subtree: primitive ids, typed literals and
/// typed holes.
pub fn canonical(forest: &Forest, id: NodeId) -> String {
    let mut out = String::new();
    write_canonical(forest, id, &mut out);
    out
}

fn write_canonical(forest: &Forest, id: NodeId, out: &mut String) {
    let node = forest.get(id);
    match &node.head {
        Head::Literal(value) => {
            let _ = write!(out, "{}:{}", node.ty, value);
        }
        Head::Hole(i) => {
            let _ = write!(out, "${}:{}", i, node.ty);
        }
        Head::Call(prim) => {
            let _ = write!(out, "{}", prim);
            if !node.tails.is_empty() {
                out.push('(');
                for (i, &tail) in node.tails.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_canonical(forest, tail, out);
                }
                out.push(')');
            }
        }
    }
}

struct AntiUnifier<'a> {
    fa: &'a Forest,
    fb: &'a Forest,
    out: Forest,
    holes: Vec<Type>,
    max_holes: usize,
}

impl AntiUnifier<'_> {
    fn walk(&mut self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let (na, nb) = (self.fa.get(a), self.fb.get(b));
        let shared = !na.frozen
            && !nb.frozen
            && !na.is_hole()
            && na.head == nb.head
            && na.ty == nb.ty
            && na.tails.len() == nb.tails.len();
        if !shared {
            if self.holes.len() >= self.max_holes {
                return None;
            }
            let index = self.holes.len();
            self.holes.push(na.ty.clone());
            return Some(self.out.add(Node::hole(index, na.ty.clone())));
        }
        let mut tails = Vec::with_capacity(na.tails.len());
        for (&ta, &tb) in na.tails.iter().zip(&nb.tails) {
            tails.push(self.walk(ta, tb)?);
        }
        Some(self.out.add(Node {
            head: na.head.clone(),
            ty: na.ty.clone(),
            tailtypes: na.tailtypes.clone(),
            tails,
            hiddentail: None,
            frozen: false,
        }))
    }
}

/// Most specific ghost covering both subtrees, if their roots agree, it has
/// at most `max_holes` holes and at least two non-hole nodes.
pub fn anti_unify(
    fa: &Forest,
    a: NodeId,
    fb: &Forest,
    b: NodeId,
    max_holes: usize,
) -> Option<Ghost> {
    let (na, nb) = (fa.get(a), fb.get(b));
    if na.frozen || nb.frozen || !matches!(na.head, Head::Call(_)) || na.head != nb.head {
        return None;
    }
    let mut au = AntiUnifier {
        fa,
        fb,
        out: Forest::new(),
        holes: Vec::new(),
        max_holes,
    };
    let root = au.walk(a, b)?;
    let ghost = Ghost::new(Program::new(au.out, root), au.holes);
    (ghost.size >= 2).then_some(ghost)
}

/// Every distinct ghost proposed by a pair of subtrees with the same root
/// primitive, in key order. Frozen nodes never appear in a ghost's structure.
pub fn mine(programs: &[Program], max_holes: usize) -> Vec<Ghost> {
    let mut sites: BTreeMap<PrimId, Vec<(usize, NodeId)>> = BTreeMap::new();
    for (index, program) in programs.iter().enumerate() {
        let forest = program.forest();
        for id in forest.preorder(program.root()) {
            let node = forest.get(id);
            if let (Head::Call(prim), false) = (&node.head, node.frozen) {
                sites.entry(*prim).or_default().push((index, id));
            }
        }
    }

    let groups: Vec<Vec<(usize, NodeId)>> =
        sites.into_values().filter(|s| s.len() > 1).collect();
    let proposals: Vec<Ghost> = groups
        .par_iter()
        .flat_map_iter(|group| {
            let mut found = Vec::new();
            for (i, &(pa, a)) in group.iter().enumerate() {
                for &(pb, b) in &group[i + 1..] {
                    let (fa, fb) = (programs[pa].forest(), programs[pb].forest());
                    if let Some(ghost) = anti_unify(fa, a, fb, b, max_holes) {
                        found.push(ghost);
                    }
                }
            }
            found
        })
        .collect();

    let mut unique: BTreeMap<String, Ghost> = BTreeMap::new();
    for ghost in proposals {
        unique.entry(ghost.key.clone()).or_insert(ghost);
    }
    unique.into_values().collect()
}

/// Score every ghost against `programs` in parallel, keeping those with
/// enough occurrences and a positive score whose hole types are producible.
pub fn score_all(
    ghosts: Vec<Ghost>,
    programs: &[Program],
    min_occurrences: usize,
    producible: &BTreeSet<Type>,
) -> Vec<ScoredGhost> {
    ghosts
        .into_par_iter()
        .filter(|g| g.args.iter().all(|ty| producible.contains(ty)))
        .map(|ghost| {
            let occurrences = ghost.occurrences(programs);
            let score = ghost.score(occurrences);
            ScoredGhost {
                ghost,
                occurrences,
                score,
            }
        })
        .filter(|s| s.occurrences >= min_occurrences && s.score > 0)
        .collect()
}

/// Highest score wins; ties go to the smallest canonical key.
pub fn select(scored: Vec<ScoredGhost>) -> Option<ScoredGhost> {
    scored.into_par_iter().max_by(|a, b| {
        a.score
            .cmp(&b.score)
            .then_with(|| b.ghost.key.cmp(&a.ghost.key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::grid;
    use crate::ir::{Grid, Value};
    use crate::library::Library;

    fn lib() -> Library {
        Library::new(grid::grid_primitives()).unwrap()
    }

    fn programs(lib: &Library, texts: &[&str]) -> Vec<Program> {
        texts.iter().map(|t| lib.parse(t).unwrap()).collect()
    }

    #[test]
    fn test_anti_unify_holes_in_preorder() {
        let lib = lib();
        let a = lib.parse("fill(0, 3, 3)").unwrap();
        let b = lib.parse("fill(2, 1, 3)").unwrap();
        let ghost = anti_unify(a.forest(), a.root(), b.forest(), b.root(), 4).unwrap();
        assert_eq!(lib.display(&ghost.body).to_string(), "fill($0, $1, 3)");
        assert_eq!(ghost.args, vec![Type::INT, Type::INT]);
        assert_eq!(ghost.size, 2);
    }

    #[test]
    fn test_anti_unify_respects_hole_cap_and_roots() {
        let lib = lib();
        let a = lib.parse("fill(0, 3, 3)").unwrap();
        let b = lib.parse("fill(2, 1, 3)").unwrap();
        assert!(anti_unify(a.forest(), a.root(), b.forest(), b.root(), 1).is_none());

        let c = lib.parse("flip_h(fill(2, 1, 3))").unwrap();
        assert!(anti_unify(a.forest(), a.root(), c.forest(), c.root(), 4).is_none());

        // everything but the root differs: a single non-hole node
        let d = lib.parse("flip_h(fill(0, 1, 1))").unwrap();
        let e = lib.parse("flip_h(flip_h(fill(0, 1, 1)))").unwrap();
        assert!(anti_unify(d.forest(), d.root(), e.forest(), e.root(), 4).is_none());
    }

    #[test]
    fn test_count_is_non_overlapping() {
        let lib = lib();
        let p = lib.parse("flip_h(flip_h(flip_h(fill(1, 1, 1))))").unwrap();
        let q = lib.parse("flip_h(flip_h(fill(2, 2, 2)))").unwrap();
        let ghost = anti_unify(p.forest(), p.root(), q.forest(), q.root(), 4).unwrap();
        assert_eq!(lib.display(&ghost.body).to_string(), "flip_h(flip_h($0))");
        // three nested flips hold one occurrence, the third flip is left over
        assert_eq!(ghost.count_in(p.forest(), p.root()), 1);
        assert_eq!(ghost.count_in(q.forest(), q.root()), 1);
    }

    #[test]
    fn test_score_formula() {
        let lib = lib();
        let ps = programs(&lib, &["rep_t(fill(0, 3, 3), 2)", "rep_t(fill(0, 3, 3), 3)"]);
        let ghosts = mine(&ps, 4);
        let scored = score_all(ghosts, &ps, 2, &lib.producible_types());
        let by_key: BTreeMap<_, _> = scored
            .iter()
            .map(|s| (lib.display(&s.ghost.body).to_string(), (s.occurrences, s.score)))
            .collect();
        assert_eq!(by_key.get("fill(0, 3, 3)"), Some(&(2, 2)));
        assert_eq!(by_key.get("rep_t(fill(0, 3, 3), $0)"), Some(&(2, 3)));

        let best = select(scored).unwrap();
        assert_eq!(
            lib.display(&best.ghost.body).to_string(),
            "rep_t(fill(0, 3, 3), $0)"
        );
    }

    #[test]
    fn test_mine_dedups_by_key() {
        let lib = lib();
        let ps = programs(&lib, &["fill(0, 3, 3)", "fill(0, 3, 3)", "fill(0, 3, 3)"]);
        let ghosts = mine(&ps, 4);
        assert_eq!(ghosts.len(), 1);
        assert_eq!(ghosts[0].arity(), 0);
        assert_eq!(ghosts[0].occurrences(&ps), 3);
        assert_eq!(ghosts[0].score(3), 5);
    }

    #[test]
    fn test_frozen_nodes_become_holes() {
        let lib = lib();
        let body = lib.parse("fill(1, 1, 1)").unwrap();
        let (lib, _) = lib.register_discovered(body, vec![]).unwrap();
        let a = lib.parse("cat_h(g0, fill(2, 1, 1))").unwrap();
        let b = lib.parse("cat_h(g0, fill(3, 1, 1))").unwrap();
        let ghost = anti_unify(a.forest(), a.root(), b.forest(), b.root(), 4).unwrap();
        assert_eq!(
            lib.display(&ghost.body).to_string(),
            "cat_h($0, fill($1, 1, 1))"
        );

        // frozen calls never root a ghost
        let ga = a.forest().get(a.root()).tails[0];
        let gb = b.forest().get(b.root()).tails[0];
        assert!(anti_unify(a.forest(), ga, b.forest(), gb, 4).is_none());
    }

    #[test]
    fn test_select_tie_breaks_on_key() {
        let lib = lib();
        let ps = programs(
            &lib,
            &[
                "fill(1, 2, 2)",
                "fill(1, 2, 2)",
                "flip_h(fill(0, 1, 1))",
                "flip_h(fill(0, 1, 1))",
            ],
        );
        let scored = score_all(mine(&ps, 0), &ps, 2, &lib.producible_types());
        // fill(1, 2, 2): 2 * 3 - 4 = 2; flip_h(fill(0, 1, 1)): 2 * 4 - 5 = 3
        let best = select(scored.clone()).unwrap();
        assert_eq!(best.score, 3);

        let ties: Vec<_> = scored.into_iter().filter(|s| s.score == 2).collect();
        let keys: Vec<_> = ties.iter().map(|s| s.ghost.key.clone()).collect();
        let winner = select(ties).unwrap();
        assert_eq!(Some(&winner.ghost.key), keys.iter().min());
    }

    #[test]
    fn test_canonical_key_spells_out_grid_literals() {
        let mut forest = Forest::new();
        let zero = forest.add(Node::literal(Value::Grid(Grid::filled(1, 1, 1, 0)), Type::MAT));
        let one = forest.add(Node::literal(Value::Grid(Grid::filled(1, 1, 1, 1)), Type::MAT));
        let again = forest.add(Node::literal(Value::Grid(Grid::filled(1, 1, 1, 0)), Type::MAT));
        assert_ne!(canonical(&forest, zero), canonical(&forest, one));
        assert_eq!(canonical(&forest, zero), canonical(&forest, again));
    }
}
