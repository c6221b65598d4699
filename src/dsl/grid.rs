//! Grid primitives
//!
//! Every operation is pure and rejects out-of-range values with
//! [`EvalError::Domain`] and incompatible dimensions with [`EvalError::Shape`].

use crate::ir::{Grid, Type, Value};
use crate::library::Primitive;
use crate::semantics::EvalError;

/// Largest extent allowed along any axis
pub const MAX_EXTENT: usize = 30;
/// Largest cell value (colors 0-9)
pub const MAX_COLOR: i64 = 9;

fn int_arg(args: &[Value], i: usize) -> Result<i64, EvalError> {
    args.get(i)
        .and_then(Value::as_int)
        .ok_or_else(|| EvalError::Type(format!("argument {} is not an int", i)))
}

fn grid_arg(args: &[Value], i: usize) -> Result<&Grid, EvalError> {
    args.get(i)
        .and_then(Value::as_grid)
        .ok_or_else(|| EvalError::Type(format!("argument {} is not a grid", i)))
}

fn extent(n: i64, what: &str) -> Result<usize, EvalError> {
    if n < 1 || n as usize > MAX_EXTENT {
        return Err(EvalError::Domain(format!(
            "{} {} outside 1..={}",
            what, n, MAX_EXTENT
        )));
    }
    Ok(n as usize)
}

fn color(n: i64) -> Result<u8, EvalError> {
    if !(0..=MAX_COLOR).contains(&n) {
        return Err(EvalError::Domain(format!("color {} outside 0..={}", n, MAX_COLOR)));
    }
    Ok(n as u8)
}

fn grid(frames: usize, height: usize, width: usize, cells: Vec<u8>) -> Result<Value, EvalError> {
    if frames > MAX_EXTENT {
        return Err(EvalError::Domain(format!("{} frames exceeds {}", frames, MAX_EXTENT)));
    }
    Grid::from_cells(frames, height, width, cells)
        .map(Value::Grid)
        .ok_or_else(|| EvalError::Shape("cell count does not match dimensions".into()))
}

/// `fill(color, height, width)`: a single frame of one color
pub fn fill(args: &[Value]) -> Result<Value, EvalError> {
    let value = color(int_arg(args, 0)?)?;
    let height = extent(int_arg(args, 1)?, "height")?;
    let width = extent(int_arg(args, 2)?, "width")?;
    Ok(Value::Grid(Grid::filled(1, height, width, value)))
}

/// `rep_t(m, n)`: repeat all frames of `m` n times along the frame axis
pub fn rep_t(args: &[Value]) -> Result<Value, EvalError> {
    let m = grid_arg(args, 0)?;
    let n = extent(int_arg(args, 1)?, "repeat count")?;
    let cells = m.cells().repeat(n);
    grid(m.frames() * n, m.height(), m.width(), cells)
}

/// `cat_t(a, b)`: frames of `a` followed by frames of `b`
pub fn cat_t(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = (grid_arg(args, 0)?, grid_arg(args, 1)?);
    if (a.height(), a.width()) != (b.height(), b.width()) {
        return Err(EvalError::Shape(format!(
            "cat_t of {}x{} and {}x{} frames",
            a.height(),
            a.width(),
            b.height(),
            b.width()
        )));
    }
    let mut cells = a.cells().to_vec();
    cells.extend_from_slice(b.cells());
    grid(a.frames() + b.frames(), a.height(), a.width(), cells)
}

/// `cat_h(a, b)`: `b` to the right of `a`, frame by frame
pub fn cat_h(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = (grid_arg(args, 0)?, grid_arg(args, 1)?);
    if (a.frames(), a.height()) != (b.frames(), b.height()) {
        return Err(EvalError::Shape(format!(
            "cat_h needs equal frames and height, got {:?} and {:?}",
            a.dims(),
            b.dims()
        )));
    }
    let width = a.width() + b.width();
    if width > MAX_EXTENT {
        return Err(EvalError::Domain(format!("width {} exceeds {}", width, MAX_EXTENT)));
    }
    let mut cells = Vec::with_capacity(a.frames() * a.height() * width);
    for frame in 0..a.frames() {
        let (fa, fb) = (a.frame(frame), b.frame(frame));
        for row in 0..a.height() {
            cells.extend_from_slice(&fa[row * a.width()..(row + 1) * a.width()]);
            cells.extend_from_slice(&fb[row * b.width()..(row + 1) * b.width()]);
        }
    }
    grid(a.frames(), a.height(), width, cells)
}

/// `cat_v(a, b)`: `b` below `a`, frame by frame
pub fn cat_v(args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = (grid_arg(args, 0)?, grid_arg(args, 1)?);
    if (a.frames(), a.width()) != (b.frames(), b.width()) {
        return Err(EvalError::Shape(format!(
            "cat_v needs equal frames and width, got {:?} and {:?}",
            a.dims(),
            b.dims()
        )));
    }
    let height = a.height() + b.height();
    if height > MAX_EXTENT {
        return Err(EvalError::Domain(format!("height {} exceeds {}", height, MAX_EXTENT)));
    }
    let mut cells = Vec::with_capacity(a.frames() * height * a.width());
    for frame in 0..a.frames() {
        cells.extend_from_slice(a.frame(frame));
        cells.extend_from_slice(b.frame(frame));
    }
    grid(a.frames(), height, a.width(), cells)
}

/// `flip_h(m)`: mirror every frame left to right
pub fn flip_h(args: &[Value]) -> Result<Value, EvalError> {
    let m = grid_arg(args, 0)?;
    let mut cells = Vec::with_capacity(m.cells().len());
    for row in m.cells().chunks(m.width().max(1)) {
        cells.extend(row.iter().rev());
    }
    grid(m.frames(), m.height(), m.width(), cells)
}

/// `recolor(m, from, to)`: replace every cell of color `from` with `to`
pub fn recolor(args: &[Value]) -> Result<Value, EvalError> {
    let m = grid_arg(args, 0)?;
    let from = color(int_arg(args, 1)?)?;
    let to = color(int_arg(args, 2)?)?;
    let cells = m
        .cells()
        .iter()
        .map(|&c| if c == from { to } else { c })
        .collect();
    grid(m.frames(), m.height(), m.width(), cells)
}

/// The minimal primitive set: `fill`, `rep_t` and the literals 0-3
pub fn scenario_primitives() -> Vec<Primitive> {
    let mut prims = vec![
        Primitive::function("fill", Type::MAT, vec![Type::INT; 3], fill),
        Primitive::function("rep_t", Type::MAT, vec![Type::MAT, Type::INT], rep_t),
    ];
    prims.extend((0..=3).map(Primitive::int));
    prims
}

/// The full grid primitive set with literals 0-5
pub fn grid_primitives() -> Vec<Primitive> {
    let mut prims = vec![
        Primitive::function("fill", Type::MAT, vec![Type::INT; 3], fill),
        Primitive::function("rep_t", Type::MAT, vec![Type::MAT, Type::INT], rep_t),
        Primitive::function("cat_t", Type::MAT, vec![Type::MAT, Type::MAT], cat_t),
        Primitive::function("cat_h", Type::MAT, vec![Type::MAT, Type::MAT], cat_h),
        Primitive::function("cat_v", Type::MAT, vec![Type::MAT, Type::MAT], cat_v),
        Primitive::function("flip_h", Type::MAT, vec![Type::MAT], flip_h),
        Primitive::function("recolor", Type::MAT, vec![Type::MAT, Type::INT, Type::INT], recolor),
    ];
    prims.extend((0..=5).map(Primitive::int));
    prims
}
