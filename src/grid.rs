// Positional worksheet grid.
//
// Workbooks are decoded with calamine and copied into an owned grid that keeps
// the absolute sheet coordinates, so the parser can address cells by the fixed
// row/column offsets of the checklist layout.
use crate::error::{OssError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Blank means empty or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
            Cell::Bool(_) => false,
        }
    }

    /// Trimmed display text of the cell, as a spreadsheet would show it.
    ///
    /// Integral numbers render without a fractional part (`1`, not `1.0`).
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number_cell(*n),
            Cell::Bool(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        }
    }

    /// Numeric value of the cell; text is parsed after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Cell::Empty => return None,
            Cell::Number(n) => *n,
            Cell::Bool(b) => if *b { 1.0 } else { 0.0 },
            Cell::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

fn format_number_cell(n: f64) -> String {
    if n.is_nan() {
        return String::new();
    }
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<&Data> for Cell {
    fn from(d: &Data) -> Self {
        match d {
            Data::Empty => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) => Cell::Text(s.clone()),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) => Cell::Empty,
        }
    }
}

/// One worksheet as an untyped grid. Out-of-range reads yield `Cell::Empty`.
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    pub name: String,
    rows: Vec<Vec<Cell>>,
    width: usize,
}

static EMPTY: Cell = Cell::Empty;

impl SheetGrid {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        SheetGrid { name: name.into(), rows, width }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, row: usize, col: usize) -> &Cell {
        self.rows.get(row).and_then(|r| r.get(col)).unwrap_or(&EMPTY)
    }
}

/// Read every worksheet of a workbook into positional grids.
///
/// Any decoding error fails the whole file; the caller decides whether to skip it.
pub fn read_workbook(path: &Path) -> Result<Vec<SheetGrid>> {
    let wrap = |source: calamine::Error| OssError::Workbook { path: path.to_path_buf(), source };
    let mut workbook = open_workbook_auto(path).map_err(wrap)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name).map_err(wrap)?;
        // calamine ranges start at the first used cell, not at A1
        let (row0, col0) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row0];
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; col0];
            cells.extend(row.iter().map(Cell::from));
            rows.push(cells);
        }
        sheets.push(SheetGrid::new(name, rows));
    }
    Ok(sheets)
}
