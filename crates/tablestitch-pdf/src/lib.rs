//! PDF implementation of [`PageSource`].
//!
//! Text comes from MuPDF's structured-text device; vector drawings and image
//! placements come from interpreting the page content stream with lopdf.
//! This crate is the only one that links mupdf (AGPL-3.0), so the engine and
//! the native backends stay usable without it.

mod drawings;
mod text;

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::ObjectId;
use tablestitch_core::{BackendError, Block, PageDocument, PageLayout, PageSource};

/// Opens PDFs with MuPDF and lopdf.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageSource;

impl PdfPageSource {
    pub fn new() -> Self {
        Self
    }
}

impl PageSource for PdfPageSource {
    fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::Open("invalid path encoding".into()))?;

        let document =
            mupdf::Document::open(path_str).map_err(|e| BackendError::Open(e.to_string()))?;
        let page_count = document
            .page_count()
            .map_err(|e| BackendError::Open(e.to_string()))?;

        // Text extraction still works when lopdf cannot parse the file, so a
        // failure here only costs the drawings
        let geometry = match lopdf::Document::load(path) {
            Ok(doc) => {
                let pages = doc.get_pages();
                Ok(Geometry { doc, pages })
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read vector drawings");
                Err(e.to_string())
            }
        };

        tracing::debug!(path = %path.display(), pages = page_count, "opened PDF");
        Ok(Box::new(PdfDocument {
            document,
            page_count: u32::try_from(page_count).unwrap_or(0),
            geometry,
        }))
    }
}

struct Geometry {
    doc: lopdf::Document,
    pages: BTreeMap<u32, ObjectId>,
}

/// An open PDF. Pages are parsed on demand.
pub struct PdfDocument {
    document: mupdf::Document,
    page_count: u32,
    geometry: Result<Geometry, String>,
}

impl PdfDocument {
    fn drawings(&self, number: u32) -> Result<drawings::Drawings, String> {
        let geometry = self.geometry.as_ref().map_err(Clone::clone)?;
        let page_id = geometry
            .pages
            .get(&number)
            .ok_or_else(|| format!("page {number} missing from page tree"))?;
        drawings::page_drawings(&geometry.doc, *page_id).map_err(|e| e.to_string())
    }
}

impl PageDocument for PdfDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page(&self, number: u32) -> Result<PageLayout, BackendError> {
        let page_error = |message: String| BackendError::Page {
            page: number,
            message,
        };
        if number == 0 || number > self.page_count {
            return Err(page_error(format!(
                "page out of range (document has {} pages)",
                self.page_count
            )));
        }

        let page = self
            .document
            .load_page(number as i32 - 1)
            .map_err(|e| page_error(e.to_string()))?;
        let bounds = page.bounds().map_err(|e| page_error(e.to_string()))?;
        let mut layout = PageLayout::new(
            number,
            f64::from(bounds.x1 - bounds.x0),
            f64::from(bounds.y1 - bounds.y0),
        );
        layout.blocks = text::text_blocks(&page).map_err(|e| page_error(e.to_string()))?;

        match self.drawings(number) {
            Ok(drawings) => {
                layout.shapes = drawings.shapes;
                layout
                    .blocks
                    .extend(drawings.images.into_iter().map(|bbox| Block::Image { bbox }));
            }
            Err(message) => {
                tracing::warn!(page = number, error = %message, "page geometry unavailable");
                layout.geometry_error = Some(message);
            }
        }

        tracing::debug!(
            page = number,
            blocks = layout.blocks.len(),
            shapes = layout.shapes.len(),
            "loaded page"
        );
        Ok(layout)
    }
}
