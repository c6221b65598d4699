//! arcdream: probability-ordered enumeration of typed grid programs, with a
//! library that grows by compressing the programs it finds.
//!
//! A round searches for a program per target grid ([`search`]), folds the
//! solutions' recurring subtrees into new library entries ([`compress`]), and
//! asks a [`recognition`] model for the prior of the next round. [`session`]
//! ties the three together.

pub mod compress;
pub mod dsl;
pub mod ir;
pub mod library;
pub mod recognition;
pub mod sample;
pub mod search;
pub mod semantics;
pub mod session;

pub use ir::{Grid, Program, Type, Value};
pub use library::{Library, Prior};
pub use session::{RoundReport, Session, SessionConfig};
