//! Core value and type representations for program trees

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Semantic type of a program node (e.g. `mat`, `int`).
///
/// Types are open-ended names supplied by the primitive set; two types are
/// equal iff their names are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Type(Cow<'static, str>);

impl Type {
    /// Grid (3-D array) type
    pub const MAT: Type = Type(Cow::Borrowed("mat"));
    /// Integer type
    pub const INT: Type = Type(Cow::Borrowed("int"));

    pub fn named(name: impl Into<String>) -> Self {
        Type(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 3-D array of small non-negative integers, indexed `frame x row x column`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid {
    frames: usize,
    height: usize,
    width: usize,
    cells: Vec<u8>,
}

impl Grid {
    /// Create a grid with every cell set to `value`
    pub fn filled(frames: usize, height: usize, width: usize, value: u8) -> Self {
        Self {
            frames,
            height,
            width,
            cells: vec![value; frames * height * width],
        }
    }

    /// Build a grid from nested `frames[row][column]` vectors.
    ///
    /// Returns `None` if the rows or frames are ragged.
    pub fn from_frames(frames: Vec<Vec<Vec<u8>>>) -> Option<Self> {
        let n_frames = frames.len();
        let height = frames.first().map_or(0, |f| f.len());
        let width = frames
            .first()
            .and_then(|f| f.first())
            .map_or(0, |r| r.len());

        let mut cells = Vec::with_capacity(n_frames * height * width);
        for frame in frames {
            if frame.len() != height {
                return None;
            }
            for row in frame {
                if row.len() != width {
                    return None;
                }
                cells.extend(row);
            }
        }

        Some(Self {
            frames: n_frames,
            height,
            width,
            cells,
        })
    }

    /// Build a grid from a flat cell buffer in frame-major, row-major order
    pub fn from_cells(frames: usize, height: usize, width: usize, cells: Vec<u8>) -> Option<Self> {
        if cells.len() != frames * height * width {
            return None;
        }
        Some(Self {
            frames,
            height,
            width,
            cells,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// `(frames, height, width)`
    pub fn dims(&self) -> (usize, usize, usize) {
        (self.frames, self.height, self.width)
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn get(&self, frame: usize, row: usize, col: usize) -> Option<u8> {
        if frame >= self.frames || row >= self.height || col >= self.width {
            return None;
        }
        Some(self.cells[self.offset(frame, row, col)])
    }

    /// Cells of a single frame, row-major
    pub fn frame(&self, frame: usize) -> &[u8] {
        let size = self.height * self.width;
        &self.cells[frame * size..(frame + 1) * size]
    }

    fn offset(&self, frame: usize, row: usize, col: usize) -> usize {
        (frame * self.height + row) * self.width + col
    }

    /// Canonical encoding used to key the solution store
    pub fn key(&self) -> GridKey {
        let mut bytes = Vec::with_capacity(24 + self.cells.len());
        for dim in [self.frames, self.height, self.width] {
            bytes.extend_from_slice(&(dim as u64).to_le_bytes());
        }
        bytes.extend_from_slice(&self.cells);
        GridKey(bytes)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in 0..self.frames {
            if frame > 0 {
                writeln!(f, "--")?;
            }
            for row in 0..self.height {
                let line: Vec<String> = (0..self.width)
                    .map(|col| self.cells[self.offset(frame, row, col)].to_string())
                    .collect();
                writeln!(f, "{}", line.join(" "))?;
            }
        }
        Ok(())
    }
}

/// Canonical byte encoding of a [`Grid`]: dimensions followed by cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridKey(Vec<u8>);

/// A concrete runtime value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Int(i64),
    Grid(Grid),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Grid(_) => None,
        }
    }

    pub fn as_grid(&self) -> Option<&Grid> {
        match self {
            Value::Grid(g) => Some(g),
            Value::Int(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Grid(g) => {
                let (frames, height, width) = g.dims();
                write!(f, "<grid {}x{}x{}:", frames, height, width)?;
                for cell in g.cells() {
                    write!(f, " {}", cell)?;
                }
                write!(f, ">")
            }
        }
    }
}
