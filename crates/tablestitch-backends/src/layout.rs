//! Text-layout helpers shared by the native backends: row grouping, gap
//! splitting and interval arithmetic over word boxes.

use tablestitch_core::{BBox, BackendSettings, Word};

/// Words sharing a baseline, left to right.
#[derive(Debug, Clone)]
pub(crate) struct TextRow<'a> {
    pub bbox: BBox,
    pub words: Vec<&'a Word>,
}

/// Consecutive words of a row not separated by a column gap.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Segment {
    pub bbox: BBox,
    pub text: String,
}

/// Group words into rows whose vertical centres lie within `tolerance` of
/// the row's first word. Rows come back top to bottom.
pub(crate) fn group_rows<'a>(
    words: impl IntoIterator<Item = &'a Word>,
    tolerance: f64,
) -> Vec<TextRow<'a>> {
    let mut words: Vec<&Word> = words
        .into_iter()
        .filter(|w| w.bbox.is_finite() && !w.text.trim().is_empty())
        .collect();
    words.sort_by(|a, b| a.bbox.center().y.total_cmp(&b.bbox.center().y));

    let mut rows: Vec<(f64, TextRow<'a>)> = Vec::new();
    for word in words {
        let cy = word.bbox.center().y;
        match rows.last_mut() {
            Some((anchor, row)) if (cy - *anchor).abs() <= tolerance => {
                row.bbox = row.bbox.union(&word.bbox);
                row.words.push(word);
            }
            _ => rows.push((
                cy,
                TextRow {
                    bbox: word.bbox,
                    words: vec![word],
                },
            )),
        }
    }

    rows.into_iter()
        .map(|(_, mut row)| {
            row.words.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
            row
        })
        .collect()
}

/// Split a row wherever the horizontal gap between words exceeds `gap`.
pub(crate) fn split_segments(row: &TextRow<'_>, gap: f64) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for word in &row.words {
        match segments.last_mut() {
            Some(seg) if word.bbox.x0 - seg.bbox.x1 <= gap => {
                seg.bbox = seg.bbox.union(&word.bbox);
                seg.text.push(' ');
                seg.text.push_str(&word.text);
            }
            _ => segments.push(Segment {
                bbox: word.bbox,
                text: word.text.clone(),
            }),
        }
    }
    segments
}

/// Median width of a single character across `words`.
pub(crate) fn median_char_width<'a>(words: impl IntoIterator<Item = &'a Word>) -> Option<f64> {
    let mut widths: Vec<f64> = words
        .into_iter()
        .filter_map(|w| {
            let n = w.text.chars().count();
            let width = w.bbox.width();
            (n > 0 && width.is_finite() && width > 0.0).then(|| width / n as f64)
        })
        .collect();
    if widths.is_empty() {
        return None;
    }
    widths.sort_by(f64::total_cmp);
    let mid = widths.len() / 2;
    Some(if widths.len() % 2 == 0 {
        (widths[mid - 1] + widths[mid]) / 2.0
    } else {
        widths[mid]
    })
}

/// Smallest horizontal gap that separates two columns: the configured
/// minimum, or 1.5 character widths if that is larger.
pub(crate) fn column_gap<'a>(
    words: impl IntoIterator<Item = &'a Word>,
    settings: &BackendSettings,
) -> f64 {
    median_char_width(words)
        .map_or(settings.min_column_gap, |w| settings.min_column_gap.max(1.5 * w))
}

/// Rows of `words` split into segments at column gaps.
pub(crate) fn segmented_rows(words: &[&Word], settings: &BackendSettings) -> Vec<Vec<Segment>> {
    let gap = column_gap(words.iter().copied(), settings);
    group_rows(words.iter().copied(), settings.row_tolerance)
        .iter()
        .map(|row| split_segments(row, gap))
        .collect()
}

/// Merge overlapping `(start, end)` intervals; the result is sorted.
pub(crate) fn merge_intervals(mut intervals: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Collapse values closer than `tolerance` into their mean. Sorted output.
pub(crate) fn cluster(mut values: Vec<f64>, tolerance: f64) -> Vec<f64> {
    values.retain(|v| v.is_finite());
    values.sort_by(f64::total_cmp);

    let mut groups: Vec<Vec<f64>> = Vec::new();
    for v in values {
        match groups.last_mut() {
            Some(group) if group.last().is_some_and(|last| v - last <= tolerance) => group.push(v),
            _ => groups.push(vec![v]),
        }
    }
    groups
        .into_iter()
        .map(|g| g.iter().sum::<f64>() / g.len() as f64)
        .collect()
}

/// Bounding box of all boxes, or `None` for an empty input.
pub(crate) fn union_all(boxes: impl IntoIterator<Item = BBox>) -> Option<BBox> {
    boxes.into_iter().reduce(|a, b| a.union(&b))
}
