use serde::Serialize;
use tablestitch_core::{BorderThresholds, PageLayout, Shape};

/// Raw counts behind a border decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BorderSignals {
    pub horizontal_lines: usize,
    pub vertical_lines: usize,
    pub rectangles: usize,
    pub image_blocks: usize,
}

impl BorderSignals {
    /// Apply the thresholds to these counts.
    pub fn has_borders(&self, thresholds: &BorderThresholds) -> bool {
        let ruled = self.horizontal_lines >= thresholds.min_horizontal_lines
            && self.vertical_lines >= thresholds.min_vertical_lines;
        if ruled || self.rectangles >= thresholds.min_rectangles {
            return true;
        }
        // An image block may be a scanned table
        thresholds.images_imply_borders && self.image_blocks > 0
    }
}

/// Count qualifying lines, rectangles and image blocks on a page.
///
/// Returns `None` when the page geometry cannot be trusted: the page source
/// failed to read its drawings, or a coordinate is not finite.
pub fn border_signals(page: &PageLayout, thresholds: &BorderThresholds) -> Option<BorderSignals> {
    if page.geometry_error.is_some() {
        return None;
    }

    let mut signals = BorderSignals::default();
    for shape in &page.shapes {
        if !shape.is_finite() {
            return None;
        }
        match shape {
            Shape::Line { from, to } => {
                let dx = to.x - from.x;
                let dy = to.y - from.y;
                if dx.hypot(dy) < thresholds.min_line_length {
                    continue;
                }
                if dy.abs() < thresholds.axis_tolerance {
                    signals.horizontal_lines += 1;
                } else if dx.abs() < thresholds.axis_tolerance {
                    signals.vertical_lines += 1;
                }
            }
            Shape::Rect(_) => signals.rectangles += 1,
        }
    }
    signals.image_blocks = page.image_blocks().count();
    Some(signals)
}

/// Decide whether a page likely carries tables with visible borders.
///
/// This is an inspectable threshold heuristic rather than a classifier: a
/// page is bordered when it has enough long horizontal *and* vertical rules,
/// enough rectangles, or (optionally) any image block. Untrustworthy
/// geometry is conservatively classified as borderless.
pub fn detect_table_borders(page: &PageLayout, thresholds: &BorderThresholds) -> bool {
    match border_signals(page, thresholds) {
        Some(signals) => {
            let bordered = signals.has_borders(thresholds);
            tracing::debug!(
                page = page.number,
                h = signals.horizontal_lines,
                v = signals.vertical_lines,
                rects = signals.rectangles,
                images = signals.image_blocks,
                bordered,
                "border detection"
            );
            bordered
        }
        None => {
            tracing::warn!(
                page = page.number,
                error = page.geometry_error.as_deref().unwrap_or("non-finite coordinates"),
                "table border detection failed, assuming borderless"
            );
            false
        }
    }
}
