//! Serializable form of a library and of program trees
//!
//! Semantic functions cannot be serialized, so restoring a snapshot takes the
//! caller's original primitive set and rebinds entries by name. Discovered
//! primitives are rebuilt from their recorded recipes.

use crate::ir::{Forest, Head, Node, NodeId, PrimId, Program, Type, Value};
use crate::library::{Library, LibraryError, PrimKind, Primitive};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot refers to unknown primitive '{0}'")]
    UnknownPrimitive(String),

    #[error("snapshot does not match the supplied primitives: {0}")]
    Mismatch(String),

    #[error(transparent)]
    Library(#[from] LibraryError),
}

/// Node head as stored in a snapshot; calls are stored by display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HeadRecord {
    Literal { value: Value },
    Call { name: String },
    Hole { index: usize },
}

/// A program tree as nested records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub head: HeadRecord,
    pub ty: Type,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tails: Vec<ProgramRecord>,
}

impl ProgramRecord {
    pub fn capture(library: &Library, forest: &Forest, root: NodeId) -> Self {
        let node = forest.get(root);
        let head = match &node.head {
            Head::Literal(value) => HeadRecord::Literal {
                value: value.clone(),
            },
            Head::Hole(index) => HeadRecord::Hole { index: *index },
            Head::Call(prim) => HeadRecord::Call {
                name: library
                    .get(*prim)
                    .map_or_else(|| prim.to_string(), |def| def.name.clone()),
            },
        };
        Self {
            head,
            ty: node.ty.clone(),
            tails: node
                .tails
                .iter()
                .map(|&t| Self::capture(library, forest, t))
                .collect(),
        }
    }

    pub fn of_program(library: &Library, program: &Program) -> Self {
        Self::capture(library, program.forest(), program.root())
    }

    /// Rebuild the tree against `library`
    pub fn to_program(&self, library: &Library) -> Result<Program, SnapshotError> {
        let mut forest = Forest::new();
        let root = self.build(library, &mut forest)?;
        Ok(Program::new(forest, root))
    }

    fn build(&self, library: &Library, forest: &mut Forest) -> Result<NodeId, SnapshotError> {
        let tails = self
            .tails
            .iter()
            .map(|t| t.build(library, forest))
            .collect::<Result<Vec<_>, _>>()?;
        let node = match &self.head {
            HeadRecord::Literal { value } => Node::literal(value.clone(), self.ty.clone()),
            HeadRecord::Hole { index } => Node::hole(*index, self.ty.clone()),
            HeadRecord::Call { name } => library
                .find(name)
                .ok_or_else(|| SnapshotError::UnknownPrimitive(name.clone()))?
                .node(tails),
        };
        Ok(forest.add(node))
    }
}

/// Where a snapshot entry comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "lowercase")]
pub enum Origin {
    Original,
    Literal { value: Value },
    Discovered { recipe: ProgramRecord },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimitiveRecord {
    pub id: PrimId,
    pub name: String,
    pub ty: Type,
    pub args: Vec<Type>,
    #[serde(flatten)]
    pub origin: Origin,
}

/// Serializable list of every primitive in a library, in id order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub version: u64,
    pub primitives: Vec<PrimitiveRecord>,
}

impl LibrarySnapshot {
    pub fn capture(library: &Library) -> Self {
        let primitives = library
            .iter()
            .map(|def| PrimitiveRecord {
                id: def.id,
                name: def.name.clone(),
                ty: def.ty.clone(),
                args: def.args.clone(),
                origin: match &def.kind {
                    PrimKind::Original(_) => Origin::Original,
                    PrimKind::Literal(value) => Origin::Literal {
                        value: value.clone(),
                    },
                    PrimKind::Discovered(body) => Origin::Discovered {
                        recipe: ProgramRecord::of_program(library, body),
                    },
                },
            })
            .collect();
        Self {
            version: library.version(),
            primitives,
        }
    }

    /// Rebuild the library, binding semantic functions from `originals`.
    ///
    /// `originals` must list the same original and literal primitives as the
    /// snapshot, in the same order.
    pub fn restore(&self, originals: Vec<Primitive>) -> Result<Library, SnapshotError> {
        let recorded: Vec<_> = self
            .primitives
            .iter()
            .filter(|p| !matches!(p.origin, Origin::Discovered { .. }))
            .collect();
        if recorded.len() != originals.len() {
            return Err(SnapshotError::Mismatch(format!(
                "snapshot has {} original primitives, {} supplied",
                recorded.len(),
                originals.len()
            )));
        }
        for (record, primitive) in recorded.iter().zip(&originals) {
            if record.name != primitive.name
                || record.ty != primitive.ty
                || record.args != primitive.args
            {
                return Err(SnapshotError::Mismatch(format!(
                    "snapshot entry '{}' differs from supplied '{}'",
                    record.name, primitive.name
                )));
            }
        }

        let mut library = Library::new(originals)?;
        for record in &self.primitives {
            if let Origin::Discovered { recipe } = &record.origin {
                let body = recipe.to_program(&library)?;
                let (next, id) = library.register_discovered(body, record.args.clone())?;
                if id != record.id {
                    return Err(SnapshotError::Mismatch(format!(
                        "'{}' restored as {} but recorded as {}",
                        record.name, id, record.id
                    )));
                }
                library = next;
            }
        }
        Ok(library)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
