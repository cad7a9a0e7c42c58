use tablestitch_core::{
    BBox, BackendError, BackendKind, BackendSettings, Cell, ExtractionMode, PageLayout,
    PageRequest, RawTable, TableBackend, Word,
};

use crate::layout::{cluster, group_rows, merge_intervals, segmented_rows};
use crate::rules::{Rule, connected_groups, ruling_lines};

/// Table detection from ruling lines.
///
/// In bordered mode every connected set of horizontal and vertical rules with
/// at least two distinct positions on each axis becomes a grid, and words are
/// dropped into cells by their centre. In borderless mode only horizontal
/// rules delimit rows and columns come from gaps in the text.
///
/// Each table carries an accuracy score: the percentage of its words that fit
/// wholly inside the cell they were assigned to.
#[derive(Debug, Clone, Default)]
pub struct LatticeBackend {
    settings: BackendSettings,
}

impl LatticeBackend {
    pub fn new(settings: BackendSettings) -> Self {
        Self { settings }
    }

    fn bordered(&self, page: &PageLayout) -> Vec<RawTable> {
        let tol = self.settings.snap_tolerance;
        let rules = ruling_lines(page, &self.settings);
        let words: Vec<&Word> = page.words().collect();

        connected_groups(&rules, |a, b| a.touches(b, tol))
            .into_iter()
            .filter_map(|group| {
                let ys = positions(&group, true, tol);
                let xs = positions(&group, false, tol);
                if ys.len() < 2 || xs.len() < 2 {
                    return None;
                }
                let columns = xs.windows(2).map(|w| (w[0], w[1])).collect();
                Grid { columns, ys }.fill(&words, &self.settings, "lattice_bordered")
            })
            .collect()
    }

    fn borderless(&self, page: &PageLayout) -> Vec<RawTable> {
        let tol = self.settings.snap_tolerance;
        let horizontal: Vec<Rule> = ruling_lines(page, &self.settings)
            .into_iter()
            .filter(Rule::is_horizontal)
            .collect();
        let words: Vec<&Word> = page.words().collect();

        // Stacked rules spanning the same x range belong to one table
        connected_groups(&horizontal, |a, b| a.start <= b.end + tol && b.start <= a.end + tol)
            .into_iter()
            .filter_map(|group| {
                let ys = positions(&group, true, tol);
                if ys.len() < 2 {
                    return None;
                }
                let x0 = group.iter().map(|r| r.start).fold(f64::INFINITY, f64::min);
                let x1 = group.iter().map(|r| r.end).fold(f64::NEG_INFINITY, f64::max);
                let region = BBox::new(x0, ys[0], x1, ys[ys.len() - 1]);

                let inside: Vec<&Word> = words
                    .iter()
                    .copied()
                    .filter(|w| region.contains_point(w.bbox.center(), 0.0))
                    .collect();
                let intervals: Vec<(f64, f64)> = segmented_rows(&inside, &self.settings)
                    .into_iter()
                    .flatten()
                    .map(|seg| (seg.bbox.x0, seg.bbox.x1))
                    .collect();
                let columns = merge_intervals(intervals);
                if columns.len() < 2 {
                    return None;
                }
                Grid { columns, ys }.fill(&inside, &self.settings, "lattice_borderless")
            })
            .collect()
    }
}

impl TableBackend for LatticeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Lattice
    }

    fn extract(&self, request: &PageRequest<'_>) -> Result<Vec<RawTable>, BackendError> {
        let mut tables = match request.mode {
            ExtractionMode::Bordered => self.bordered(request.page),
            ExtractionMode::Borderless => self.borderless(request.page),
        };
        tables.sort_by(|a, b| {
            let (ya, yb) = (a.bbox.map_or(0.0, |b| b.y0), b.bbox.map_or(0.0, |b| b.y0));
            ya.total_cmp(&yb)
        });
        tracing::debug!(
            page = request.page_number(),
            mode = request.mode.as_str(),
            tables = tables.len(),
            "lattice extraction"
        );
        Ok(tables)
    }
}

/// Distinct rule positions of one orientation, snapped together.
fn positions(rules: &[Rule], horizontal: bool, tol: f64) -> Vec<f64> {
    cluster(
        rules
            .iter()
            .filter(|r| r.is_horizontal() == horizontal)
            .map(|r| r.pos)
            .collect(),
        tol,
    )
}

/// Row boundaries plus column intervals. Columns may have gaps between them
/// when they come from text rather than rules.
struct Grid {
    columns: Vec<(f64, f64)>,
    ys: Vec<f64>,
}

impl Grid {
    fn bbox(&self) -> BBox {
        BBox::new(
            self.columns[0].0,
            self.ys[0],
            self.columns[self.columns.len() - 1].1,
            self.ys[self.ys.len() - 1],
        )
    }

    fn locate(&self, word: &Word) -> Option<(usize, usize)> {
        let c = word.bbox.center();
        let row = self.ys.windows(2).position(|w| c.y >= w[0] && c.y <= w[1])?;
        let col = self
            .columns
            .iter()
            .position(|&(start, end)| c.x >= start && c.x <= end)?;
        Some((row, col))
    }

    fn cell_bbox(&self, row: usize, col: usize) -> BBox {
        let (x0, x1) = self.columns[col];
        BBox::new(x0, self.ys[row], x1, self.ys[row + 1])
    }

    /// Assign words to cells. `None` when no word falls inside the grid.
    fn fill(&self, words: &[&Word], settings: &BackendSettings, tag: &str) -> Option<RawTable> {
        let n_rows = self.ys.len() - 1;
        let n_cols = self.columns.len();
        let mut buckets: Vec<Vec<Vec<&Word>>> = vec![vec![Vec::new(); n_cols]; n_rows];

        let (mut total, mut fitted) = (0usize, 0usize);
        for word in words {
            let Some((row, col)) = self.locate(word) else {
                continue;
            };
            total += 1;
            if self.cell_bbox(row, col).contains(&word.bbox, settings.snap_tolerance) {
                fitted += 1;
            }
            buckets[row][col].push(*word);
        }
        if total == 0 {
            return None;
        }

        let cells = buckets
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|bucket| Cell::Text(cell_text(bucket, settings.row_tolerance)))
                    .collect()
            })
            .collect();

        Some(RawTable {
            cells,
            bbox: Some(self.bbox()),
            accuracy: Some(100.0 * fitted as f64 / total as f64),
            mode_tag: tag.to_string(),
        })
    }
}

/// Words of one cell in reading order, one line per text row.
fn cell_text(words: Vec<&Word>, row_tolerance: f64) -> String {
    group_rows(words, row_tolerance)
        .iter()
        .map(|row| {
            row.words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
