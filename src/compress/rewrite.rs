//! Folding an adopted ghost back into solved trees
//!
//! Rewrites never touch existing nodes. Each replaced occurrence gets a new
//! call node; each ancestor on the path to the root is copied with its new
//! tail, and every untouched sibling is shared with the old tree.

use crate::compress::ghost::Ghost;
use crate::ir::{Forest, Node, NodeId, Program};
use crate::library::PrimitiveDef;

/// Rewrite every occurrence of `ghost` in `program` as a call to `def`.
/// Returns the number of occurrences replaced.
pub fn rewrite_program(program: &mut Program, ghost: &Ghost, def: &PrimitiveDef) -> usize {
    let root = program.root();
    let mut rewriter = Rewriter {
        ghost,
        def,
        hidden: None,
        replaced: 0,
    };
    let new_root = rewriter.rewrite(program.forest_mut(), root);
    program.set_root(new_root);
    rewriter.replaced
}

struct Rewriter<'a> {
    ghost: &'a Ghost,
    def: &'a PrimitiveDef,
    /// Copy of the ghost body in the forest being rewritten, shared by every
    /// new call
    hidden: Option<NodeId>,
    replaced: usize,
}

impl Rewriter<'_> {
    fn rewrite(&mut self, forest: &mut Forest, id: NodeId) -> NodeId {
        if let Some(bound) = self.ghost.bind(forest, id) {
            self.replaced += 1;
            let tails: Vec<NodeId> = bound
                .into_iter()
                .map(|arg| self.rewrite(forest, arg))
                .collect();
            let body = &self.ghost.body;
            let hidden = *self
                .hidden
                .get_or_insert_with(|| forest.import(body.forest(), body.root()));
            let mut call = self.def.node(tails);
            call.hiddentail = Some(hidden);
            call.frozen = true;
            return forest.add(call);
        }

        let old_tails = forest.get(id).tails.clone();
        let new_tails: Vec<NodeId> = old_tails
            .iter()
            .map(|&tail| self.rewrite(forest, tail))
            .collect();
        if new_tails == old_tails {
            return id;
        }
        let old = forest.get(id);
        let copy = Node {
            head: old.head.clone(),
            ty: old.ty.clone(),
            tailtypes: old.tailtypes.clone(),
            tails: new_tails,
            hiddentail: old.hiddentail,
            frozen: old.frozen,
        };
        forest.add(copy)
    }
}
