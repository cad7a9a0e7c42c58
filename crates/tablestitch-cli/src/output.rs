use std::io::Write;

use owo_colors::OwoColorize;
use tablestitch_core::{Cell, ExtractionReport, Table};
use tablestitch_reconcile::DocumentClassification;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Header cells shown per table before truncating.
const PREVIEW_CELLS: usize = 6;
const PREVIEW_WIDTH: usize = 24;

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn pages(table: &Table) -> String {
    match table.page_range {
        Some((first, last)) => format!("pages {first}-{last}"),
        None => format!("page {}", table.page),
    }
}

fn preview(cells: &[Cell]) -> String {
    let mut shown: Vec<String> = cells
        .iter()
        .take(PREVIEW_CELLS)
        .map(|c| truncate(&c.as_text().replace('\n', " "), PREVIEW_WIDTH))
        .collect();
    if cells.len() > PREVIEW_CELLS {
        shown.push(format!("(+{} more)", cells.len() - PREVIEW_CELLS));
    }
    shown.join(" | ")
}

/// Print the tables and warnings of one document.
pub fn print_report(
    w: &mut dyn Write,
    file_name: &str,
    report: &ExtractionReport,
    color: ColorMode,
) -> std::io::Result<()> {
    let found = format!(
        "{} table{} on {} page{}",
        report.tables.len(),
        if report.tables.len() == 1 { "" } else { "s" },
        report.pages_processed,
        if report.pages_processed == 1 { "" } else { "s" },
    );
    if color.enabled() {
        writeln!(w, "{}: {}", file_name.bold(), found)?;
    } else {
        writeln!(w, "{}: {}", file_name, found)?;
    }

    for table in &report.tables {
        let shape = format!("{}x{}", table.num_rows(), table.num_cols());
        let cross = if table.is_cross_page { " [cross-page]" } else { "" };
        if color.enabled() {
            writeln!(
                w,
                "  {}  {}  {}  {}  confidence {:.2}{}",
                table.id.cyan(),
                pages(table),
                table.extraction_method,
                shape,
                table.confidence,
                cross.magenta()
            )?;
        } else {
            writeln!(
                w,
                "  {}  {}  {}  {}  confidence {:.2}{}",
                table.id,
                pages(table),
                table.extraction_method,
                shape,
                table.confidence,
                cross
            )?;
        }

        let first = if table.has_headers() {
            Some(table.headers.as_slice())
        } else {
            table.rows.first().map(Vec::as_slice)
        };
        if let Some(cells) = first {
            let line = preview(cells);
            if color.enabled() {
                writeln!(w, "    {}", line.dimmed())?;
            } else {
                writeln!(w, "    {}", line)?;
            }
        }
    }

    for warning in &report.warnings {
        if color.enabled() {
            writeln!(w, "  {} {}", "WARNING:".yellow(), warning)?;
        } else {
            writeln!(w, "  WARNING: {}", warning)?;
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Print a document that could not be processed at all.
pub fn print_failure(
    w: &mut dyn Write,
    file_name: &str,
    error: &anyhow::Error,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}: {} {:#}", file_name.bold(), "ERROR:".red(), error)?;
    } else {
        writeln!(w, "{}: ERROR: {:#}", file_name, error)?;
    }
    writeln!(w)?;
    Ok(())
}

/// Totals across every processed document.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub documents: usize,
    pub failed: usize,
    pub tables: usize,
    pub cross_page: usize,
    pub warnings: usize,
}

impl Totals {
    pub fn add(&mut self, report: &ExtractionReport) {
        self.documents += 1;
        self.tables += report.tables.len();
        self.cross_page += report.cross_page_count();
        self.warnings += report.warnings.len();
    }

    pub fn add_failure(&mut self) {
        self.documents += 1;
        self.failed += 1;
    }
}

pub fn print_totals(w: &mut dyn Write, totals: &Totals, color: ColorMode) -> std::io::Result<()> {
    let line = format!(
        "{} tables ({} cross-page) from {} documents",
        totals.tables, totals.cross_page, totals.documents
    );
    if color.enabled() {
        writeln!(w, "{}", line.bold())?;
    } else {
        writeln!(w, "{}", line)?;
    }
    if totals.warnings > 0 {
        let line = format!("{} warnings, results may be incomplete", totals.warnings);
        if color.enabled() {
            writeln!(w, "{}", line.yellow())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }
    if totals.failed > 0 {
        let line = format!("{} documents failed", totals.failed);
        if color.enabled() {
            writeln!(w, "{}", line.red())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }
    Ok(())
}

/// Print per-page border classification.
pub fn print_classification(
    w: &mut dyn Write,
    file_name: &str,
    classification: &DocumentClassification,
    color: ColorMode,
) -> std::io::Result<()> {
    let verdict = if classification.scanned {
        "scanned"
    } else {
        "digital"
    };
    if color.enabled() {
        writeln!(w, "{}: {}", file_name.bold(), verdict)?;
    } else {
        writeln!(w, "{}: {}", file_name, verdict)?;
    }

    for page in &classification.pages {
        let kind = if page.has_borders {
            "bordered"
        } else {
            "borderless"
        };
        let detail = match (&page.signals, &page.error) {
            (_, Some(error)) => format!("error: {error}"),
            (Some(s), None) => format!(
                "h={} v={} rects={} images={}",
                s.horizontal_lines, s.vertical_lines, s.rectangles, s.image_blocks
            ),
            (None, None) => "geometry unavailable".to_string(),
        };
        if color.enabled() && page.has_borders {
            writeln!(w, "  page {:>3}  {}  {}", page.page, kind.green(), detail.dimmed())?;
        } else if color.enabled() {
            writeln!(w, "  page {:>3}  {}  {}", page.page, kind, detail.dimmed())?;
        } else {
            writeln!(w, "  page {:>3}  {}  {}", page.page, kind, detail)?;
        }
    }
    Ok(())
}
