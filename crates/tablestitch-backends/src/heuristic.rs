use tablestitch_core::{
    BackendError, BackendKind, BackendSettings, Cell, PageRequest, RawTable, TableBackend, Word,
};

use crate::layout::{Segment, segmented_rows, union_all};

/// Plain-text fallback: consecutive rows that split into the same number of
/// gap-separated segments are read as a table, one segment per cell.
///
/// Ignores the extraction mode and never reports an accuracy.
#[derive(Debug, Clone, Default)]
pub struct HeuristicBackend {
    settings: BackendSettings,
}

impl HeuristicBackend {
    pub fn new(settings: BackendSettings) -> Self {
        Self { settings }
    }

    fn build(&self, run: Vec<Vec<Segment>>) -> Option<RawTable> {
        if run.len() < self.settings.min_rows {
            return None;
        }
        let bbox = union_all(run.iter().flatten().map(|seg| seg.bbox));
        let cells = run
            .into_iter()
            .map(|row| row.into_iter().map(|seg| Cell::Text(seg.text)).collect())
            .collect();
        Some(RawTable {
            cells,
            bbox,
            accuracy: None,
            mode_tag: "heuristic_text".to_string(),
        })
    }
}

impl TableBackend for HeuristicBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Heuristic
    }

    fn extract(&self, request: &PageRequest<'_>) -> Result<Vec<RawTable>, BackendError> {
        let words: Vec<&Word> = request.page.words().collect();

        let mut tables = Vec::new();
        let mut run: Vec<Vec<Segment>> = Vec::new();
        for row in segmented_rows(&words, &self.settings) {
            let width = run.first().map(Vec::len);
            if row.len() >= 2 && width.is_none_or(|w| w == row.len()) {
                run.push(row);
                continue;
            }
            tables.extend(self.build(std::mem::take(&mut run)));
            if row.len() >= 2 {
                run.push(row);
            }
        }
        tables.extend(self.build(run));

        tracing::debug!(
            page = request.page_number(),
            tables = tables.len(),
            "heuristic extraction"
        );
        Ok(tables)
    }
}
