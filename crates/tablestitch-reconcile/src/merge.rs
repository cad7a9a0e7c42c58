//! Stitching of tables that continue across a page break.
//!
//! Tables are ordered by page and vertical position, then scanned pairwise.
//! Each table is only ever compared with its immediate successor, and a merged
//! pair is not reconsidered in the same pass, so a table spanning three pages
//! comes out as a two-page merge followed by the third fragment.

use tablestitch_core::{ExtractionWarning, MergeThresholds, Table};
use thiserror::Error;

use crate::similarity::headers_similar;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("table {id} on page {page} has non-finite coordinates")]
    NonFiniteGeometry { id: String, page: u32 },
}

/// Whether `next` plausibly continues `cur` on the following page.
///
/// Every available signal must agree; a signal that is missing on either
/// side (no rows, no headers, no bbox) never disqualifies the pair.
pub fn tables_related(cur: &Table, next: &Table, thresholds: &MergeThresholds) -> bool {
    if next.page != cur.page + 1 {
        return false;
    }

    if !cur.rows.is_empty() && !next.rows.is_empty() {
        let (a, b) = (cur.num_cols(), next.num_cols());
        if a != b || a == 0 {
            return false;
        }
    }

    if cur.has_headers()
        && next.has_headers()
        && !headers_similar(&cur.headers, &next.headers, thresholds)
    {
        return false;
    }

    if let (Some(a), Some(b)) = (cur.bbox, next.bbox) {
        let (w1, w2) = (a.width(), b.width());
        let max_width = w1.max(w2);
        if max_width > 0.0 && (w1 - w2).abs() / max_width > thresholds.max_width_delta {
            return false;
        }
    }

    true
}

/// Join two fragments of one table.
///
/// The result keeps the first fragment's identity, bbox and headers. The
/// second fragment's header row is carried over as data unless it repeats
/// the first fragment's headers.
pub fn merge_tables(first: Table, second: Table, thresholds: &MergeThresholds) -> Table {
    let first_page = first.page_range.map_or(first.page, |(start, _)| start);
    let last_page = second.page_range.map_or(second.page, |(_, end)| end);

    let mut merged = first;
    if second.has_headers() && !headers_similar(&merged.headers, &second.headers, thresholds) {
        merged.rows.push(second.headers);
    }
    merged.rows.extend(second.rows);
    merged.context = [merged.context.trim(), second.context.trim()]
        .into_iter()
        .filter(|side| !side.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    merged.page_range = Some((first_page, last_page));
    merged.extraction_method = format!("{}_cross_page", merged.extraction_method);
    merged.is_cross_page = true;
    merged
}

/// Run one merge pass, failing if the tables cannot be put in reading order.
pub fn try_merge_cross_page(
    tables: &[Table],
    thresholds: &MergeThresholds,
) -> Result<Vec<Table>, MergeError> {
    if let Some(bad) = tables
        .iter()
        .find(|t| t.bbox.is_some_and(|b| !b.is_finite()))
    {
        return Err(MergeError::NonFiniteGeometry {
            id: bad.id.clone(),
            page: bad.page,
        });
    }

    let mut sorted = tables.to_vec();
    sorted.sort_by(|a, b| a.page.cmp(&b.page).then(a.top().total_cmp(&b.top())));

    let mut merged = Vec::with_capacity(sorted.len());
    let mut iter = sorted.into_iter().peekable();
    while let Some(cur) = iter.next() {
        match iter.next_if(|next| tables_related(&cur, next, thresholds)) {
            Some(next) => {
                tracing::debug!(
                    first = %cur.id,
                    second = %next.id,
                    pages = ?(cur.page, next.page),
                    "merging cross-page table"
                );
                merged.push(merge_tables(cur, next, thresholds));
            }
            None => merged.push(cur),
        }
    }
    Ok(merged)
}

/// Merge tables that continue across page breaks.
///
/// Never fails: if the pass cannot run, the tables come back unchanged
/// together with a [`ExtractionWarning::MergeFailed`].
pub fn merge_cross_page_tables(
    tables: Vec<Table>,
    thresholds: &MergeThresholds,
) -> (Vec<Table>, Option<ExtractionWarning>) {
    if tables.len() < 2 {
        return (tables, None);
    }

    match try_merge_cross_page(&tables, thresholds) {
        Ok(merged) => (merged, None),
        Err(e) => {
            tracing::warn!(error = %e, "cross-page table handling failed");
            let warning = ExtractionWarning::MergeFailed {
                message: e.to_string(),
            };
            (tables, Some(warning))
        }
    }
}
