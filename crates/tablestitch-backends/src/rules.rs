//! Ruling lines recovered from page drawings.

use tablestitch_core::{BBox, BackendSettings, PageLayout, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orientation {
    Horizontal,
    Vertical,
}

/// An axis-aligned rule. `pos` is the y of a horizontal rule or the x of a
/// vertical one; `start..end` is its extent along the other axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Rule {
    pub orientation: Orientation,
    pub pos: f64,
    pub start: f64,
    pub end: f64,
}

impl Rule {
    fn new(orientation: Orientation, pos: f64, a: f64, b: f64) -> Self {
        Self {
            orientation,
            pos,
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_horizontal(&self) -> bool {
        self.orientation == Orientation::Horizontal
    }

    /// Crossing, or collinear and overlapping, within `tol`.
    pub fn touches(&self, other: &Rule, tol: f64) -> bool {
        if self.orientation == other.orientation {
            (self.pos - other.pos).abs() <= tol
                && self.start <= other.end + tol
                && other.start <= self.end + tol
        } else {
            other.pos >= self.start - tol
                && other.pos <= self.end + tol
                && self.pos >= other.start - tol
                && self.pos <= other.end + tol
        }
    }

    pub fn bbox(&self) -> BBox {
        match self.orientation {
            Orientation::Horizontal => BBox::new(self.start, self.pos, self.end, self.pos),
            Orientation::Vertical => BBox::new(self.pos, self.start, self.pos, self.end),
        }
    }
}

/// Horizontal and vertical rules on the page that are long enough to be
/// table borders: at least `page dimension / line_scale`.
///
/// Thin rectangles count as a single rule; larger rectangles contribute
/// their four edges.
pub(crate) fn ruling_lines(page: &PageLayout, settings: &BackendSettings) -> Vec<Rule> {
    use Orientation::*;

    let tol = settings.snap_tolerance;
    let mut rules = Vec::new();
    for shape in page.shapes.iter().filter(|s| s.is_finite()) {
        match *shape {
            Shape::Line { from, to } => {
                if (to.y - from.y).abs() <= tol {
                    rules.push(Rule::new(Horizontal, (from.y + to.y) / 2.0, from.x, to.x));
                } else if (to.x - from.x).abs() <= tol {
                    rules.push(Rule::new(Vertical, (from.x + to.x) / 2.0, from.y, to.y));
                }
            }
            Shape::Rect(b) => {
                if b.height() <= tol {
                    rules.push(Rule::new(Horizontal, b.center().y, b.x0, b.x1));
                } else if b.width() <= tol {
                    rules.push(Rule::new(Vertical, b.center().x, b.y0, b.y1));
                } else {
                    rules.push(Rule::new(Horizontal, b.y0, b.x0, b.x1));
                    rules.push(Rule::new(Horizontal, b.y1, b.x0, b.x1));
                    rules.push(Rule::new(Vertical, b.x0, b.y0, b.y1));
                    rules.push(Rule::new(Vertical, b.x1, b.y0, b.y1));
                }
            }
        }
    }

    let min_h = page.width / settings.line_scale;
    let min_v = page.height / settings.line_scale;
    rules.retain(|r| match r.orientation {
        Horizontal => r.length() >= min_h,
        Vertical => r.length() >= min_v,
    });
    rules
}

/// Partition rules into groups connected by `connected`.
pub(crate) fn connected_groups(
    rules: &[Rule],
    connected: impl Fn(&Rule, &Rule) -> bool,
) -> Vec<Vec<Rule>> {
    let mut parent: Vec<usize> = (0..rules.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..rules.len() {
        for j in (i + 1)..rules.len() {
            if connected(&rules[i], &rules[j]) {
                let (a, b) = (find(&mut parent, i), find(&mut parent, j));
                if a != b {
                    parent[b] = a;
                }
            }
        }
    }

    let mut groups: Vec<Vec<Rule>> = Vec::new();
    let mut index_of_root = vec![usize::MAX; rules.len()];
    for (i, rule) in rules.iter().enumerate() {
        let root = find(&mut parent, i);
        if index_of_root[root] == usize::MAX {
            index_of_root[root] = groups.len();
            groups.push(Vec::new());
        }
        groups[index_of_root[root]].push(*rule);
    }
    groups
}

/// Smallest box covering every rule, if there are any.
pub(crate) fn ruled_area(rules: &[Rule]) -> Option<BBox> {
    crate::layout::union_all(rules.iter().map(Rule::bbox))
}
