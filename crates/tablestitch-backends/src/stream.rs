use tablestitch_core::{
    BackendError, BackendKind, BackendSettings, Cell, ExtractionMode, PageLayout, PageRequest,
    RawTable, TableBackend, Word,
};

use crate::layout::{Segment, merge_intervals, segmented_rows, union_all};
use crate::rules::{ruled_area, ruling_lines};

/// Table detection from whitespace alignment.
///
/// Rows are split into segments wherever the gap between words is wider
/// than a column gap. A run of consecutive rows that each have at least two
/// segments forms a table, and its columns are the union of the segment
/// extents. In bordered mode only text inside the ruled area is considered.
#[derive(Debug, Clone, Default)]
pub struct StreamBackend {
    settings: BackendSettings,
}

impl StreamBackend {
    pub fn new(settings: BackendSettings) -> Self {
        Self { settings }
    }

    fn candidate_words<'a>(&self, page: &'a PageLayout, mode: ExtractionMode) -> Vec<&'a Word> {
        let words = page.words();
        if mode == ExtractionMode::Borderless {
            return words.collect();
        }
        match ruled_area(&ruling_lines(page, &self.settings)) {
            Some(area) => words
                .filter(|w| area.contains_point(w.bbox.center(), self.settings.snap_tolerance))
                .collect(),
            None => words.collect(),
        }
    }

    fn tables(&self, words: &[&Word], tag: &str) -> Vec<RawTable> {
        let mut tables = Vec::new();
        let mut run: Vec<Vec<Segment>> = Vec::new();
        for row in segmented_rows(words, &self.settings) {
            if row.len() >= 2 {
                run.push(row);
                continue;
            }
            tables.extend(self.build(std::mem::take(&mut run), tag));
        }
        tables.extend(self.build(run, tag));
        tables
    }

    fn build(&self, run: Vec<Vec<Segment>>, tag: &str) -> Option<RawTable> {
        if run.len() < self.settings.min_rows {
            return None;
        }
        let columns = merge_intervals(
            run.iter()
                .flatten()
                .map(|seg| (seg.bbox.x0, seg.bbox.x1))
                .collect(),
        );
        if columns.len() < 2 {
            return None;
        }

        let bbox = union_all(run.iter().flatten().map(|seg| seg.bbox));
        let cells = run
            .iter()
            .map(|row| {
                let mut texts = vec![String::new(); columns.len()];
                for seg in row {
                    let x = seg.bbox.center().x;
                    let col = columns
                        .iter()
                        .position(|&(start, end)| x >= start && x <= end)
                        .unwrap_or(columns.len() - 1);
                    if !texts[col].is_empty() {
                        texts[col].push(' ');
                    }
                    texts[col].push_str(&seg.text);
                }
                texts.into_iter().map(Cell::Text).collect()
            })
            .collect();

        Some(RawTable {
            cells,
            bbox,
            accuracy: None,
            mode_tag: tag.to_string(),
        })
    }
}

impl TableBackend for StreamBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Stream
    }

    fn extract(&self, request: &PageRequest<'_>) -> Result<Vec<RawTable>, BackendError> {
        let words = self.candidate_words(request.page, request.mode);
        let tag = format!("stream_{}", request.mode.as_str());
        let tables = self.tables(&words, &tag);
        tracing::debug!(
            page = request.page_number(),
            mode = request.mode.as_str(),
            words = words.len(),
            tables = tables.len(),
            "stream extraction"
        );
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::fixtures::{hline, page_with_words, vline, word};
    use std::path::Path;
    use tablestitch_core::{BBox, text_row};

    fn run(page: &PageLayout, mode: ExtractionMode) -> Vec<RawTable> {
        let request = PageRequest {
            path: Path::new("doc.pdf"),
            page,
            mode,
        };
        StreamBackend::default().extract(&request).unwrap()
    }

    fn price_list(y: f64) -> Vec<Word> {
        vec![
            word("Item", 60.0, y),
            word("Qty", 200.0, y),
            word("Price", 340.0, y),
            word("Pen", 60.0, y + 15.0),
            word("12", 200.0, y + 15.0),
            word("1.50", 340.0, y + 15.0),
            word("Ink", 60.0, y + 30.0),
            word("3", 200.0, y + 30.0),
            word("9.99", 340.0, y + 30.0),
            // Quantity missing on the last row
            word("Pad", 60.0, y + 45.0),
            word("4.00", 340.0, y + 45.0),
        ]
    }

    #[test]
    fn test_aligned_rows_become_table() {
        let mut words = vec![word("Quarterly", 60.0, 50.0), word("results", 110.0, 50.0)];
        words.extend(price_list(100.0));
        let tables = run(&page_with_words(words), ExtractionMode::Borderless);

        assert_eq!(tables.len(), 1);
        let t = &tables[0];
        assert_eq!(t.mode_tag, "stream_borderless");
        assert_eq!(t.accuracy, None);
        assert_eq!(
            t.cells,
            vec![
                text_row(&["Item", "Qty", "Price"]),
                text_row(&["Pen", "12", "1.50"]),
                text_row(&["Ink", "3", "9.99"]),
                text_row(&["Pad", "", "4.00"]),
            ]
        );
        assert_eq!(t.bbox, Some(BBox::new(60.0, 100.0, 365.0, 155.0)));
    }

    #[test]
    fn test_prose_breaks_tables_apart() {
        let mut words = price_list(100.0);
        words.push(word("Notes", 60.0, 200.0));
        words.extend(price_list(300.0));
        let tables = run(&page_with_words(words), ExtractionMode::Borderless);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].cells[0], text_row(&["Item", "Qty", "Price"]));
    }

    #[test]
    fn test_single_row_is_not_a_table() {
        let words = vec![word("Item", 60.0, 100.0), word("Qty", 200.0, 100.0)];
        assert!(run(&page_with_words(words), ExtractionMode::Borderless).is_empty());
    }

    #[test]
    fn test_bordered_mode_ignores_text_outside_rules() {
        let mut words = price_list(100.0);
        words.extend([
            word("Footer", 60.0, 400.0),
            word("p.", 200.0, 400.0),
            word("Draft", 60.0, 415.0),
            word("v2", 200.0, 415.0),
        ]);
        let mut page = page_with_words(words);
        page.shapes.push(hline(90.0, 50.0, 400.0));
        page.shapes.push(hline(165.0, 50.0, 400.0));
        page.shapes.push(vline(50.0, 90.0, 165.0));
        page.shapes.push(vline(400.0, 90.0, 165.0));

        let tables = run(&page, ExtractionMode::Bordered);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].mode_tag, "stream_bordered");
        assert_eq!(tables[0].cells.len(), 4);

        // Without the ruled area the footer rows extend the run
        let loose = run(&page, ExtractionMode::Borderless);
        assert_eq!(loose.len(), 1);
        assert_eq!(loose[0].cells.len(), 6);
        assert_eq!(loose[0].cells[5], text_row(&["Draft", "v2", ""]));
    }
}
