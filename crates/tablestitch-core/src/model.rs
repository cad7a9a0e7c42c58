use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in top-left-origin page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned bounding rectangle `(x0, y0, x1, y1)` with `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Build a bbox from raw backend coordinates.
    ///
    /// Backends that cannot report geometry hand back `[0, 0, 0, 0]`; that
    /// sentinel maps to `None` so downstream code never mistakes it for a
    /// real rectangle at the page origin.
    pub fn from_coords(coords: [f64; 4]) -> Option<Self> {
        if coords.iter().all(|c| *c == 0.0) {
            return None;
        }
        let [x0, y0, x1, y1] = coords;
        Some(Self::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)))
    }

    /// Smallest bbox covering both points.
    pub fn from_points(a: Point, b: Point) -> Self {
        Self::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }

    /// Overlapping region, or `None` when the rectangles are disjoint.
    pub fn intersection(&self, other: &BBox) -> Option<BBox> {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        (x0 <= x1 && y0 <= y1).then(|| BBox::new(x0, y0, x1, y1))
    }

    pub fn contains_point(&self, p: Point, tolerance: f64) -> bool {
        p.x >= self.x0 - tolerance
            && p.x <= self.x1 + tolerance
            && p.y >= self.y0 - tolerance
            && p.y <= self.y1 + tolerance
    }

    pub fn contains(&self, other: &BBox, tolerance: f64) -> bool {
        other.x0 >= self.x0 - tolerance
            && other.y0 >= self.y0 - tolerance
            && other.x1 <= self.x1 + tolerance
            && other.y1 <= self.y1 + tolerance
    }
}

/// A single table cell as handed back by a backend.
///
/// Most backends produce text; some report typed scalars. Normalization only
/// ever touches `Text`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    #[default]
    Null,
}

impl Cell {
    /// `Null` or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Null => true,
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }

    /// Text view used for comparisons. `Null` renders as the empty string.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Cell::Text(s) => Cow::Borrowed(s.as_str()),
            Cell::Number(n) => Cow::Owned(n.to_string()),
            Cell::Bool(b) => Cow::Owned(b.to_string()),
            Cell::Null => Cow::Borrowed(""),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Build a row of text cells. Mostly a test and backend convenience.
pub fn text_row<S: AsRef<str>>(cells: &[S]) -> Vec<Cell> {
    cells.iter().map(|c| Cell::Text(c.as_ref().to_string())).collect()
}

/// A table extracted from one page (or, after merging, from two consecutive pages).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    pub id: String,
    /// 1-based page the table starts on.
    pub page: u32,
    /// `(first, last)` page, set only for merged cross-page tables.
    pub page_range: Option<(u32, u32)>,
    pub bbox: Option<BBox>,
    pub headers: Vec<Cell>,
    pub rows: Vec<Vec<Cell>>,
    pub extraction_method: String,
    /// Backend-relative confidence in `[0, 1]`. Not comparable across backends.
    pub confidence: f64,
    pub context: String,
    pub refined: bool,
    pub is_cross_page: bool,
}

impl Table {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Width of the first row; rows are not guaranteed rectangular before refinement.
    pub fn num_cols(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn has_headers(&self) -> bool {
        !self.headers.is_empty()
    }

    /// Number of cells across headers and rows.
    pub fn cell_count(&self) -> usize {
        self.headers.len() + self.rows.iter().map(Vec::len).sum::<usize>()
    }

    /// Top edge used for reading-order sorting; `0.0` when geometry is unknown.
    pub fn top(&self) -> f64 {
        self.bbox.map_or(0.0, |b| b.y0)
    }
}

/// A table in the shape a backend returns it, before it becomes a [`Table`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub cells: Vec<Vec<Cell>>,
    #[serde(default)]
    pub bbox: Option<BBox>,
    /// Native accuracy score in percent (0–100), if the backend computes one.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Backend mode tag, e.g. `lattice_bordered`.
    #[serde(default)]
    pub mode_tag: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_bbox_is_sentinel() {
        assert_eq!(BBox::from_coords([0.0, 0.0, 0.0, 0.0]), None);
        let b = BBox::from_coords([10.0, 20.0, 5.0, 40.0]).unwrap();
        assert_eq!(b, BBox::new(5.0, 20.0, 10.0, 40.0));
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 20.0, 20.0);
        let c = BBox::new(30.0, 30.0, 40.0, 40.0);
        assert_eq!(a.intersection(&b), Some(BBox::new(5.0, 5.0, 10.0, 10.0)));
        assert_eq!(a.intersection(&c), None);
        assert!((a.intersection(&b).unwrap().area() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_cell_blankness() {
        assert!(Cell::Null.is_blank());
        assert!(Cell::from("  \t").is_blank());
        assert!(!Cell::from("x").is_blank());
        assert!(!Cell::Number(0.0).is_blank());
    }

    #[test]
    fn test_num_cols_uses_first_row() {
        let table = Table {
            rows: vec![text_row(&["a", "b", "c"]), text_row(&["d"])],
            ..Table::default()
        };
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_cols(), 3);
        assert_eq!(Table::default().num_cols(), 0);
    }

    #[test]
    fn test_cell_untagged_json() {
        let cells: Vec<Cell> = serde_json::from_str(r#"["a", 1.5, true, null]"#).unwrap();
        assert_eq!(
            cells,
            vec![Cell::from("a"), Cell::Number(1.5), Cell::Bool(true), Cell::Null]
        );
    }
}
