//! Arena-backed expression trees
//!
//! Every node of a program lives in a [`Forest`] and is addressed by a
//! [`NodeId`]. Parents refer to their children by id, so a rewrite can build a
//! new parent that shares all untouched siblings with the old one.

use crate::ir::types::{Type, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable identity of a library primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimId(pub u32);

impl fmt::Display for PrimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a node inside a [`Forest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a node does when evaluated
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Head {
    /// A constant value
    Literal(Value),
    /// Application of a library primitive to the node's tails
    Call(PrimId),
    /// Argument slot of a discovered primitive body, numbered in pre-order
    Hole(usize),
}

/// One node of a typed program tree
#[derive(Debug, Clone)]
pub struct Node {
    pub head: Head,
    /// Return type of this node
    pub ty: Type,
    /// Expected type of each argument slot
    pub tailtypes: Vec<Type>,
    /// Children filling the argument slots
    pub tails: Vec<NodeId>,
    /// Expansion of a discovered primitive (only on discovered calls)
    pub hiddentail: Option<NodeId>,
    /// Frozen nodes are never part of a future ghost
    pub frozen: bool,
}

impl Node {
    pub fn literal(value: Value, ty: Type) -> Self {
        Self {
            head: Head::Literal(value),
            ty,
            tailtypes: Vec::new(),
            tails: Vec::new(),
            hiddentail: None,
            frozen: false,
        }
    }

    pub fn hole(index: usize, ty: Type) -> Self {
        Self {
            head: Head::Hole(index),
            ty,
            tailtypes: Vec::new(),
            tails: Vec::new(),
            hiddentail: None,
            frozen: false,
        }
    }

    pub fn call(prim: PrimId, ty: Type, tailtypes: Vec<Type>, tails: Vec<NodeId>) -> Self {
        Self {
            head: Head::Call(prim),
            ty,
            tailtypes,
            tails,
            hiddentail: None,
            frozen: false,
        }
    }

    pub fn is_hole(&self) -> bool {
        matches!(self.head, Head::Hole(_))
    }
}

/// Append-only arena of nodes.
///
/// Nodes are never mutated once added; rewriting produces new nodes and the
/// old ones simply become unreachable from the new root.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<Node>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node added after `len`. Ids at or above `len` become invalid.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    /// Number of nodes reachable from `id` through tails; hidden expansions
    /// are not counted.
    pub fn size(&self, id: NodeId) -> usize {
        let node = self.get(id);
        1 + node.tails.iter().map(|&t| self.size(t)).sum::<usize>()
    }

    /// Pre-order list of ids reachable from `id` through tails
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.get(next).tails.iter().rev());
        }
        out
    }

    /// Each tail's type equals its slot type, recursively
    pub fn is_well_typed(&self, id: NodeId) -> bool {
        let node = self.get(id);
        node.tails.len() == node.tailtypes.len()
            && node
                .tails
                .iter()
                .zip(&node.tailtypes)
                .all(|(&t, ty)| self.get(t).ty == *ty && self.is_well_typed(t))
    }

    /// Whether any hole is reachable from `id` through tails
    pub fn has_holes(&self, id: NodeId) -> bool {
        let node = self.get(id);
        node.is_hole() || node.tails.iter().any(|&t| self.has_holes(t))
    }

    /// Deep-copy the subtree rooted at `id` in `other` into this forest.
    pub fn import(&mut self, other: &Forest, id: NodeId) -> NodeId {
        self.import_shared(other, id, &mut HashMap::new())
    }

    /// Copy that keeps nodes shared in `other` shared here: a node reached
    /// twice is copied once.
    fn import_shared(
        &mut self,
        other: &Forest,
        id: NodeId,
        copied: &mut HashMap<NodeId, NodeId>,
    ) -> NodeId {
        if let Some(&done) = copied.get(&id) {
            return done;
        }
        let node = other.get(id);
        let tails = node
            .tails
            .iter()
            .map(|&t| self.import_shared(other, t, copied))
            .collect();
        let hiddentail = node.hiddentail.map(|h| self.import_shared(other, h, copied));
        let new = self.add(Node {
            head: node.head.clone(),
            ty: node.ty.clone(),
            tailtypes: node.tailtypes.clone(),
            tails,
            hiddentail,
            frozen: node.frozen,
        });
        copied.insert(id, new);
        new
    }

    /// Structural equality of two subtrees (heads, types and tails)
    pub fn same_tree(&self, a: NodeId, other: &Forest, b: NodeId) -> bool {
        let (na, nb) = (self.get(a), other.get(b));
        na.head == nb.head
            && na.ty == nb.ty
            && na.tails.len() == nb.tails.len()
            && na
                .tails
                .iter()
                .zip(&nb.tails)
                .all(|(&ta, &tb)| self.same_tree(ta, other, tb))
    }
}

/// A complete program tree: a forest plus the id of its root
#[derive(Debug, Clone)]
pub struct Program {
    forest: Forest,
    root: NodeId,
}

impl Program {
    pub fn new(forest: Forest, root: NodeId) -> Self {
        Self { forest, root }
    }

    /// Copy the subtree at `id` into a fresh forest holding only the nodes
    /// reachable from it
    pub fn extract(forest: &Forest, id: NodeId) -> Self {
        let mut fresh = Forest::with_capacity(forest.size(id));
        let root = fresh.import(forest, id);
        Self::new(fresh, root)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.forest.get(id)
    }

    pub fn ty(&self) -> &Type {
        &self.node(self.root).ty
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        self.forest.size(self.root)
    }

    /// Replace the root, typically after a rewrite appended new nodes
    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    pub fn forest_mut(&mut self) -> &mut Forest {
        &mut self.forest
    }

    /// Rebuild the forest keeping only nodes reachable from the root
    pub fn compact(&mut self) {
        *self = Self::extract(&self.forest, self.root);
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.forest.same_tree(self.root, &other.forest, other.root)
    }
}
