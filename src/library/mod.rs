//! Primitive library: the registry of primitives a program may call
//!
//! A [`Library`] is an immutable snapshot. Growing it with a discovered
//! primitive returns a new snapshot with a bumped version, leaving the old one
//! untouched, so every enumeration round works against a fixed library.

pub mod parse;
pub mod prior;
pub mod snapshot;

pub use parse::ParseError;
pub use prior::{Prior, PriorError};
pub use snapshot::{LibrarySnapshot, ProgramRecord, SnapshotError};

use crate::ir::{Forest, Head, Node, NodeId, PrimId, Program, Type, Value};
use crate::semantics::EvalError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Semantic function of an original primitive, applied to evaluated arguments
pub type SemanticFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Library configuration errors. All of these are fatal: the library is
/// rejected before any search starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LibraryError {
    #[error("type '{ty}' is required by '{needed_by}' but no finite program produces it")]
    Unproducible { ty: Type, needed_by: String },

    #[error("duplicate primitive name '{0}'")]
    DuplicateName(String),

    #[error("unknown primitive '{0}'")]
    UnknownPrimitive(String),

    #[error("'{name}' expects {expected} arguments, found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("'{name}' argument {slot} expects type '{expected}', found '{found}'")]
    TypeMismatch {
        name: String,
        slot: usize,
        expected: Type,
        found: Type,
    },

    #[error("invalid discovered body: {0}")]
    InvalidBody(String),
}

/// A primitive as supplied by the caller at startup
#[derive(Clone)]
pub struct Primitive {
    pub name: String,
    pub ty: Type,
    pub args: Vec<Type>,
    pub kind: PrimKind,
}

impl Primitive {
    /// A primitive backed by a caller-supplied semantic function
    pub fn function<F>(name: impl Into<String>, ty: Type, args: Vec<Type>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            ty,
            args,
            kind: PrimKind::Original(Arc::new(f)),
        }
    }

    /// A constant, named after its value
    pub fn literal(value: Value, ty: Type) -> Self {
        Self {
            name: value.to_string(),
            ty,
            args: Vec::new(),
            kind: PrimKind::Literal(value),
        }
    }

    /// Integer literal of type `int`
    pub fn int(n: i64) -> Self {
        Self::literal(Value::Int(n), Type::INT)
    }
}

/// How a primitive is realised
#[derive(Clone)]
pub enum PrimKind {
    /// Built-in operation
    Original(SemanticFn),
    /// Constant value
    Literal(Value),
    /// Abbreviation of a body whose holes are the primitive's arguments
    Discovered(Arc<Program>),
}

impl fmt::Debug for PrimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimKind::Original(_) => write!(f, "Original(<fn>)"),
            PrimKind::Literal(v) => write!(f, "Literal({:?})", v),
            PrimKind::Discovered(body) => write!(f, "Discovered({} nodes)", body.size()),
        }
    }
}

/// A registered primitive
#[derive(Debug, Clone)]
pub struct PrimitiveDef {
    pub id: PrimId,
    pub name: String,
    pub ty: Type,
    pub args: Vec<Type>,
    pub kind: PrimKind,
}

impl PrimitiveDef {
    pub fn is_discovered(&self) -> bool {
        matches!(self.kind, PrimKind::Discovered(_))
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn body(&self) -> Option<&Program> {
        match &self.kind {
            PrimKind::Discovered(body) => Some(body),
            _ => None,
        }
    }

    /// Build a node applying this primitive to `tails`.
    ///
    /// Discovered calls are frozen: their expansion is opaque to compression.
    pub fn node(&self, tails: Vec<NodeId>) -> Node {
        match &self.kind {
            PrimKind::Literal(value) => Node::literal(value.clone(), self.ty.clone()),
            PrimKind::Original(_) => {
                Node::call(self.id, self.ty.clone(), self.args.clone(), tails)
            }
            PrimKind::Discovered(_) => {
                let mut node = Node::call(self.id, self.ty.clone(), self.args.clone(), tails);
                node.frozen = true;
                node
            }
        }
    }
}

/// Versioned, immutable registry of primitives indexed by return type.
///
/// Within a type, original entries come first in input order, followed by
/// discovered entries in discovery order.
#[derive(Debug, Clone)]
pub struct Library {
    version: u64,
    prims: Vec<Arc<PrimitiveDef>>,
    by_type: BTreeMap<Type, Vec<PrimId>>,
    by_literal: BTreeMap<(Type, String), PrimId>,
    n_original: usize,
}

impl Library {
    /// Build the initial library. Fails if a name repeats or an argument type
    /// cannot be produced by any finite program.
    pub fn new(primitives: Vec<Primitive>) -> Result<Self, LibraryError> {
        let mut library = Self {
            version: 0,
            prims: Vec::with_capacity(primitives.len()),
            by_type: BTreeMap::new(),
            by_literal: BTreeMap::new(),
            n_original: primitives.len(),
        };
        for primitive in primitives {
            if matches!(primitive.kind, PrimKind::Discovered(_)) {
                return Err(LibraryError::InvalidBody(format!(
                    "'{}' cannot be supplied as an original primitive",
                    primitive.name
                )));
            }
            library.push(primitive)?;
        }
        library.check_producible()?;
        Ok(library)
    }

    fn push(&mut self, primitive: Primitive) -> Result<PrimId, LibraryError> {
        if self.find(&primitive.name).is_some() {
            return Err(LibraryError::DuplicateName(primitive.name));
        }
        let id = PrimId(self.prims.len() as u32);
        if let PrimKind::Literal(value) = &primitive.kind {
            self.by_literal
                .insert((primitive.ty.clone(), literal_key(value)), id);
        }
        self.by_type.entry(primitive.ty.clone()).or_default().push(id);
        self.prims.push(Arc::new(PrimitiveDef {
            id,
            name: primitive.name,
            ty: primitive.ty,
            args: primitive.args,
            kind: primitive.kind,
        }));
        Ok(id)
    }

    /// Return a new snapshot with a discovered primitive appended.
    ///
    /// `body` must be well-typed, and its holes numbered `0..args.len()` in
    /// pre-order with types matching `args`.
    pub fn register_discovered(
        &self,
        body: Program,
        args: Vec<Type>,
    ) -> Result<(Library, PrimId), LibraryError> {
        validate_body(&body, &args)?;

        let mut next = self.clone();
        let name = (self.discovered().count()..)
            .map(|n| format!("g{}", n))
            .find(|name| self.find(name).is_none())
            .unwrap_or_default();
        let ty = body.ty().clone();
        let id = next.push(Primitive {
            name,
            ty,
            args,
            kind: PrimKind::Discovered(Arc::new(body)),
        })?;
        next.check_producible()?;
        next.version += 1;
        Ok((next, id))
    }

    /// Every type reachable as an argument type must be producible by some
    /// finite tree built from the library.
    fn check_producible(&self) -> Result<(), LibraryError> {
        let producible = self.producible_types();
        for def in &self.prims {
            if let Some(ty) = def.args.iter().find(|ty| !producible.contains(*ty)) {
                return Err(LibraryError::Unproducible {
                    ty: ty.clone(),
                    needed_by: def.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Least fixpoint of "some primitive of this type has only producible
    /// argument types".
    pub fn producible_types(&self) -> BTreeSet<Type> {
        let mut producible = BTreeSet::new();
        loop {
            let before = producible.len();
            for def in &self.prims {
                if def.args.iter().all(|ty| producible.contains(ty)) {
                    producible.insert(def.ty.clone());
                }
            }
            if producible.len() == before {
                return producible;
            }
        }
    }

    pub fn is_producible(&self, ty: &Type) -> bool {
        self.producible_types().contains(ty)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    pub fn get(&self, id: PrimId) -> Option<&PrimitiveDef> {
        self.prims.get(id.0 as usize).map(|p| p.as_ref())
    }

    pub fn find(&self, name: &str) -> Option<&PrimitiveDef> {
        self.prims.iter().find(|p| p.name == name).map(|p| p.as_ref())
    }

    /// The literal entry producing `value` at type `ty`
    pub fn literal(&self, ty: &Type, value: &Value) -> Option<&PrimitiveDef> {
        self.by_literal
            .get(&(ty.clone(), literal_key(value)))
            .and_then(|&id| self.get(id))
    }

    /// Ids of every primitive returning `ty`, in library order
    pub fn of_type(&self, ty: &Type) -> &[PrimId] {
        self.by_type.get(ty).map_or(&[], |ids| ids.as_slice())
    }

    /// Primitives returning `ty` in library order, paired with their prior
    /// log-probability
    pub fn lookup<'a>(&'a self, ty: &Type, prior: &Prior) -> Vec<(&'a PrimitiveDef, f64)> {
        self.of_type(ty)
            .iter()
            .filter_map(|&id| self.get(id))
            .map(|def| (def, prior.log_prob(def.id)))
            .collect()
    }

    pub fn types(&self) -> impl Iterator<Item = &Type> {
        self.by_type.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrimitiveDef> {
        self.prims.iter().map(|p| p.as_ref())
    }

    pub fn originals(&self) -> impl Iterator<Item = &PrimitiveDef> {
        self.iter().take(self.n_original)
    }

    pub fn discovered(&self) -> impl Iterator<Item = &PrimitiveDef> {
        self.iter().skip(self.n_original)
    }

    /// Add a call to the primitive named `name` to `forest`, checking arity
    /// and argument types.
    pub fn call(
        &self,
        forest: &mut Forest,
        name: &str,
        tails: Vec<NodeId>,
    ) -> Result<NodeId, LibraryError> {
        let def = self
            .find(name)
            .ok_or_else(|| LibraryError::UnknownPrimitive(name.to_string()))?;
        if tails.len() != def.arity() {
            return Err(LibraryError::Arity {
                name: def.name.clone(),
                expected: def.arity(),
                found: tails.len(),
            });
        }
        for (slot, (&tail, expected)) in tails.iter().zip(&def.args).enumerate() {
            let found = &forest.get(tail).ty;
            if found != expected {
                return Err(LibraryError::TypeMismatch {
                    name: def.name.clone(),
                    slot,
                    expected: expected.clone(),
                    found: found.clone(),
                });
            }
        }
        Ok(forest.add(def.node(tails)))
    }

    /// Parse a program written as `name(arg, ...)`; see [`parse`].
    pub fn parse(&self, text: &str) -> Result<Program, ParseError> {
        parse::parse_program(self, text)
    }

    /// Render a program using display names
    pub fn display<'a>(&'a self, program: &'a Program) -> ProgramDisplay<'a> {
        ProgramDisplay {
            library: self,
            forest: program.forest(),
            root: program.root(),
        }
    }

    /// Render a subtree of an arbitrary forest
    pub fn display_node<'a>(&'a self, forest: &'a Forest, root: NodeId) -> ProgramDisplay<'a> {
        ProgramDisplay {
            library: self,
            forest,
            root,
        }
    }
}

fn literal_key(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Grid(g) => format!("{:?}", g),
    }
}

fn validate_body(body: &Program, args: &[Type]) -> Result<(), LibraryError> {
    let forest = body.forest();
    if !forest.is_well_typed(body.root()) {
        return Err(LibraryError::InvalidBody("body is not well-typed".into()));
    }
    let holes: Vec<_> = forest
        .preorder(body.root())
        .into_iter()
        .filter_map(|id| match forest.get(id).head {
            Head::Hole(i) => Some((i, forest.get(id).ty.clone())),
            _ => None,
        })
        .collect();
    if holes.len() != args.len() {
        return Err(LibraryError::InvalidBody(format!(
            "{} holes for {} arguments",
            holes.len(),
            args.len()
        )));
    }
    for (position, ((index, ty), expected)) in holes.iter().zip(args).enumerate() {
        if *index != position {
            return Err(LibraryError::InvalidBody(format!(
                "hole ${} found at pre-order position {}",
                index, position
            )));
        }
        if ty != expected {
            return Err(LibraryError::InvalidBody(format!(
                "hole ${} has type '{}', argument has type '{}'",
                index, ty, expected
            )));
        }
    }
    Ok(())
}

/// `Display` adapter returned by [`Library::display`]
pub struct ProgramDisplay<'a> {
    library: &'a Library,
    forest: &'a Forest,
    root: NodeId,
}

impl ProgramDisplay<'_> {
    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId) -> fmt::Result {
        let node = self.forest.get(id);
        match &node.head {
            Head::Literal(value) => write!(f, "{}", value),
            Head::Hole(i) => write!(f, "${}", i),
            Head::Call(prim) => {
                match self.library.get(*prim) {
                    Some(def) => write!(f, "{}", def.name)?,
                    None => write!(f, "{}", prim)?,
                }
                if node.tails.is_empty() {
                    return Ok(());
                }
                write!(f, "(")?;
                for (i, &tail) in node.tails.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.write_node(f, tail)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for ProgramDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::grid;
    use crate::ir::Grid;

    fn small() -> Library {
        Library::new(grid::scenario_primitives()).unwrap()
    }

    #[test]
    fn test_lookup_order_and_types() {
        let lib = small();
        let names: Vec<_> = lib
            .of_type(&Type::MAT)
            .iter()
            .map(|&id| lib.get(id).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["fill", "rep_t"]);
        assert_eq!(lib.of_type(&Type::INT).len(), 4);
        assert!(lib.of_type(&Type::named("color")).is_empty());
    }

    #[test]
    fn test_unproducible_type_rejected() {
        let prims = vec![
            Primitive::int(0),
            Primitive::function("paint", Type::MAT, vec![Type::named("color")], |_| {
                Ok(Value::Int(0))
            }),
        ];
        let err = Library::new(prims).unwrap_err();
        assert!(matches!(err, LibraryError::Unproducible { .. }));
    }

    #[test]
    fn test_only_recursive_producer_is_unproducible() {
        // mat can only be built from another mat: no finite tree exists
        let prims = vec![
            Primitive::int(0),
            Primitive::function("grow", Type::MAT, vec![Type::MAT], |args| {
                Ok(args[0].clone())
            }),
            Primitive::function("frames", Type::INT, vec![Type::MAT], |_| Ok(Value::Int(1))),
        ];
        assert!(matches!(
            Library::new(prims),
            Err(LibraryError::Unproducible { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let prims = vec![Primitive::int(1), Primitive::int(1)];
        assert_eq!(
            Library::new(prims).unwrap_err(),
            LibraryError::DuplicateName("1".into())
        );
    }

    #[test]
    fn test_register_discovered_bumps_version() {
        let lib = small();
        let body = lib.parse("fill(0, 3, 3)").unwrap();
        let (grown, id) = lib.register_discovered(body, vec![]).unwrap();

        assert_eq!(lib.version(), 0);
        assert_eq!(grown.version(), 1);
        assert_eq!(grown.len(), lib.len() + 1);
        let def = grown.get(id).unwrap();
        assert_eq!(def.name, "g0");
        assert!(def.is_discovered());
        assert_eq!(grown.of_type(&Type::MAT).last(), Some(&id));
        assert_eq!(grown.discovered().count(), 1);
        assert!(lib.get(id).is_none());
    }

    #[test]
    fn test_register_discovered_checks_holes() {
        let lib = small();
        let body = lib.parse("fill($0, 3, $1)").unwrap();
        assert!(lib
            .register_discovered(body.clone(), vec![Type::INT, Type::INT])
            .is_ok());
        assert!(matches!(
            lib.register_discovered(body.clone(), vec![Type::INT]),
            Err(LibraryError::InvalidBody(_))
        ));
        assert!(matches!(
            lib.register_discovered(body, vec![Type::MAT, Type::INT]),
            Err(LibraryError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_call_checks_signature() {
        let lib = small();
        let mut forest = Forest::new();
        let zero = lib.call(&mut forest, "0", vec![]).unwrap();
        let err = lib.call(&mut forest, "fill", vec![zero]).unwrap_err();
        assert!(matches!(err, LibraryError::Arity { expected: 3, .. }));

        let grid = lib.call(&mut forest, "fill", vec![zero, zero, zero]).unwrap();
        let err = lib.call(&mut forest, "rep_t", vec![zero, grid]).unwrap_err();
        assert!(matches!(err, LibraryError::TypeMismatch { slot: 0, .. }));
    }

    #[test]
    fn test_display() {
        let lib = small();
        let program = lib.parse("rep_t(fill(0,3,3), 2)").unwrap();
        assert_eq!(lib.display(&program).to_string(), "rep_t(fill(0, 3, 3), 2)");
    }

    #[test]
    fn test_literal_lookup() {
        let lib = small();
        let def = lib.literal(&Type::INT, &Value::Int(2)).unwrap();
        assert_eq!(def.name, "2");
        assert!(lib.literal(&Type::INT, &Value::Int(9)).is_none());
    }

    #[test]
    fn test_discovered_names_skip_taken_ones() {
        let mut prims = grid::scenario_primitives();
        prims.push(Primitive::function("g0", Type::MAT, vec![Type::MAT], |args| {
            Ok(args[0].clone())
        }));
        let lib = Library::new(prims).unwrap();
        let body = lib.parse("fill(1, 1, 1)").unwrap();
        let (lib, id) = lib.register_discovered(body, vec![]).unwrap();
        assert_eq!(lib.get(id).unwrap().name, "g1");

        let body = lib.parse("fill(2, 2, 2)").unwrap();
        let (lib, id) = lib.register_discovered(body, vec![]).unwrap();
        assert_eq!(lib.get(id).unwrap().name, "g2");
        assert_eq!(lib.find("g0").unwrap().arity(), 1);
    }

    #[test]
    fn test_grid_literals_of_one_shape_get_distinct_names() {
        let zero = Value::Grid(Grid::filled(1, 1, 1, 0));
        let one = Value::Grid(Grid::filled(1, 1, 1, 1));
        let lib = Library::new(vec![
            Primitive::int(1),
            Primitive::literal(zero.clone(), Type::MAT),
            Primitive::literal(one.clone(), Type::MAT),
        ])
        .unwrap();
        let a = lib.literal(&Type::MAT, &zero).unwrap();
        let b = lib.literal(&Type::MAT, &one).unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.name, b.name);
    }
}
