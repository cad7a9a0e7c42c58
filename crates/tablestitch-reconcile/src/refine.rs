use tablestitch_core::{Cell, Table};

/// Clean up a table's cell structure in place.
///
/// A header row with nothing in it counts as no header. Drops all-blank
/// rows, then columns that are blank in every row and have no
/// header, promotes the first row to headers when there are none, and
/// collapses whitespace in text. Tables without rows are left untouched.
/// Refining an already refined table changes nothing.
pub fn refine_table(table: &mut Table) {
    if table.rows.is_empty() {
        return;
    }

    let before = (table.num_rows(), table.num_cols());

    if table.headers.iter().all(Cell::is_blank) {
        table.headers.clear();
    }

    table.rows.retain(|row| !row.iter().all(Cell::is_blank));

    let width = table.rows.iter().map(Vec::len).max().unwrap_or(0);
    let keep: Vec<usize> = (0..width)
        .filter(|&col| {
            let header_set = table.headers.get(col).is_some_and(|c| !c.is_blank());
            header_set
                || table
                    .rows
                    .iter()
                    .any(|row| row.get(col).is_some_and(|c| !c.is_blank()))
        })
        .collect();

    // Keep the original columns rather than leave a table with none
    if !keep.is_empty() && keep.len() < width {
        for row in &mut table.rows {
            *row = select_columns(row, &keep);
        }
        if !table.headers.is_empty() {
            table.headers = select_columns(&table.headers, &keep);
        }
    }

    if table.headers.is_empty() && !table.rows.is_empty() {
        table.headers = table.rows.remove(0);
    }

    table.headers.iter_mut().for_each(normalize_cell);
    table.rows.iter_mut().flatten().for_each(normalize_cell);
    table.refined = true;

    tracing::debug!(
        table = %table.id,
        rows_before = before.0,
        cols_before = before.1,
        rows = table.num_rows(),
        cols = table.num_cols(),
        "refined table"
    );
}

fn select_columns(row: &[Cell], keep: &[usize]) -> Vec<Cell> {
    keep.iter().filter_map(|&i| row.get(i).cloned()).collect()
}

fn normalize_cell(cell: &mut Cell) {
    if let Cell::Text(s) = cell {
        let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed != *s {
            *s = collapsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestitch_core::text_row;

    fn table(rows: &[&[&str]]) -> Table {
        Table {
            id: "table_1_1".into(),
            page: 1,
            rows: rows.iter().map(|r| text_row(r)).collect(),
            ..Table::default()
        }
    }

    #[test]
    fn test_blank_rows_dropped_and_header_promoted() {
        let mut t = table(&[&["", "", ""], &["a", "b", "c"], &["", "", ""]]);
        refine_table(&mut t);
        assert_eq!(t.headers, text_row(&["a", "b", "c"]));
        assert!(t.rows.is_empty());
        assert!(t.refined);
    }

    #[test]
    fn test_blank_column_dropped() {
        let mut t = table(&[&["Name", " ", "Age"], &["Ann", "", "31"], &["Bob", "\t", "42"]]);
        refine_table(&mut t);
        assert_eq!(t.headers, text_row(&["Name", "Age"]));
        assert_eq!(t.rows, vec![text_row(&["Ann", "31"]), text_row(&["Bob", "42"])]);
    }

    #[test]
    fn test_column_with_header_kept() {
        let mut t = table(&[&["x", ""], &["y", ""]]);
        t.headers = text_row(&["Key", "Notes"]);
        refine_table(&mut t);
        assert_eq!(t.headers, text_row(&["Key", "Notes"]));
        assert_eq!(t.num_cols(), 2);
    }

    #[test]
    fn test_whitespace_collapsed() {
        let mut t = table(&[&["  Total\n revenue ", "2024"], &["a  b", " c "]]);
        refine_table(&mut t);
        assert_eq!(t.headers, text_row(&["Total revenue", "2024"]));
        assert_eq!(t.rows, vec![text_row(&["a b", "c"])]);
    }

    #[test]
    fn test_non_text_cells_untouched() {
        let mut t = Table {
            headers: text_row(&["n", "flag"]),
            rows: vec![
                vec![Cell::Number(0.0), Cell::Null],
                vec![Cell::Number(2.5), Cell::Bool(false)],
            ],
            ..Table::default()
        };
        refine_table(&mut t);
        assert_eq!(t.rows[0], vec![Cell::Number(0.0), Cell::Null]);
        assert_eq!(t.rows[1], vec![Cell::Number(2.5), Cell::Bool(false)]);
    }

    #[test]
    fn test_all_blank_keeps_columns() {
        let mut t = table(&[&["", ""], &[" ", ""]]);
        refine_table(&mut t);
        assert!(t.rows.is_empty());
        assert!(t.headers.is_empty());
        assert!(t.refined);
    }

    #[test]
    fn test_empty_table_untouched() {
        let mut t = Table::default();
        refine_table(&mut t);
        assert_eq!(t, Table::default());
    }

    #[test]
    fn test_ragged_rows() {
        let mut t = table(&[&["h1", "h2", "h3"], &["a"], &["b", "", "c"]]);
        refine_table(&mut t);
        assert_eq!(t.headers, text_row(&["h1", "h2", "h3"]));
        assert_eq!(t.rows, vec![text_row(&["a"]), text_row(&["b", "", "c"])]);
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            table(&[&["", "", ""], &["a", "b", "c"], &["", "", ""]]),
            table(&[&["Name", " ", "Age"], &["Ann  Lee", "", "31"], &["", "", ""]]),
            table(&[&["x", ""], &["", ""], &["y", "  z "]]),
        ];
        for input in inputs {
            let mut once = input.clone();
            refine_table(&mut once);
            let mut twice = once.clone();
            refine_table(&mut twice);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_blank_header_row_replaced() {
        let mut t = table(&[&["a", "b", "c"], &["", "", ""]]);
        t.headers = text_row(&["", " ", ""]);
        refine_table(&mut t);
        assert_eq!(t.headers, text_row(&["a", "b", "c"]));
        assert!(t.rows.is_empty());
    }
}
