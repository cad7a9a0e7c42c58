use std::cmp::Ordering;

use tablestitch_core::{BBox, Table};

/// Fraction of the smaller rectangle covered by the intersection of two.
pub fn overlap_ratio(a: &BBox, b: &BBox) -> f64 {
    let smaller = a.area().min(b.area());
    if smaller <= 0.0 {
        return 0.0;
    }
    a.intersection(b).map_or(0.0, |i| i.area() / smaller)
}

/// Drop tables that cover the same region as a better one.
///
/// Meant for the tables of one page from one backend, where confidences are
/// comparable. Of two overlapping tables the one with higher confidence
/// wins, then the one with more cells, then the earlier one. Tables without
/// a bbox are always kept, and survivors stay in input order.
pub fn dedupe_overlapping(tables: Vec<Table>, threshold: f64) -> Vec<Table> {
    let mut dropped = vec![false; tables.len()];

    for i in 0..tables.len() {
        if dropped[i] {
            continue;
        }
        let Some(a) = tables[i].bbox else { continue };
        for j in (i + 1)..tables.len() {
            if dropped[j] {
                continue;
            }
            let Some(b) = tables[j].bbox else { continue };
            if overlap_ratio(&a, &b) < threshold {
                continue;
            }
            if prefer(&tables[j], &tables[i]) == Ordering::Greater {
                dropped[i] = true;
                tracing::debug!(kept = %tables[j].id, dropped = %tables[i].id, "overlapping table removed");
                break;
            }
            dropped[j] = true;
            tracing::debug!(kept = %tables[i].id, dropped = %tables[j].id, "overlapping table removed");
        }
    }

    tables
        .into_iter()
        .zip(dropped)
        .filter_map(|(t, d)| (!d).then_some(t))
        .collect()
}

fn prefer(a: &Table, b: &Table) -> Ordering {
    a.confidence
        .total_cmp(&b.confidence)
        .then_with(|| a.cell_count().cmp(&b.cell_count()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestitch_core::text_row;

    fn table(id: &str, bbox: Option<BBox>, confidence: f64, rows: usize) -> Table {
        Table {
            id: id.into(),
            page: 1,
            bbox,
            confidence,
            rows: (0..rows).map(|_| text_row(&["a", "b"])).collect(),
            ..Table::default()
        }
    }

    fn ids(tables: &[Table]) -> Vec<&str> {
        tables.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_overlap_ratio() {
        let a = BBox::new(0.0, 0.0, 100.0, 100.0);
        let inner = BBox::new(10.0, 10.0, 30.0, 30.0);
        let half = BBox::new(50.0, 0.0, 150.0, 100.0);
        let apart = BBox::new(200.0, 200.0, 300.0, 300.0);
        assert!((overlap_ratio(&a, &inner) - 1.0).abs() < 1e-9);
        assert!((overlap_ratio(&a, &half) - 0.5).abs() < 1e-9);
        assert_eq!(overlap_ratio(&a, &apart), 0.0);
    }

    #[test]
    fn test_keeps_higher_confidence() {
        let b = BBox::new(0.0, 0.0, 100.0, 100.0);
        let tables = vec![
            table("low", Some(b), 0.81, 3),
            table("other", Some(BBox::new(0.0, 300.0, 100.0, 400.0)), 0.9, 3),
            table("high", Some(BBox::new(5.0, 5.0, 100.0, 100.0)), 0.95, 3),
        ];
        let kept = dedupe_overlapping(tables, 0.5);
        assert_eq!(ids(&kept), vec!["other", "high"]);
    }

    #[test]
    fn test_tie_prefers_more_cells() {
        let b = BBox::new(0.0, 0.0, 100.0, 100.0);
        let tables = vec![table("small", Some(b), 0.7, 2), table("big", Some(b), 0.7, 5)];
        assert_eq!(ids(&dedupe_overlapping(tables, 0.5)), vec!["big"]);

        let tables = vec![table("first", Some(b), 0.7, 2), table("second", Some(b), 0.7, 2)];
        assert_eq!(ids(&dedupe_overlapping(tables, 0.5)), vec!["first"]);
    }

    #[test]
    fn test_tables_without_bbox_kept() {
        let tables = vec![
            table("a", None, 0.6, 2),
            table("b", None, 0.6, 2),
            table("c", Some(BBox::new(0.0, 0.0, 10.0, 10.0)), 0.6, 2),
        ];
        assert_eq!(ids(&dedupe_overlapping(tables, 0.5)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_below_threshold_kept() {
        let tables = vec![
            table("a", Some(BBox::new(0.0, 0.0, 100.0, 100.0)), 0.9, 2),
            table("b", Some(BBox::new(60.0, 0.0, 160.0, 100.0)), 0.8, 2),
        ];
        assert_eq!(ids(&dedupe_overlapping(tables, 0.5)), vec!["a", "b"]);
    }
}
