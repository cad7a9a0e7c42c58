use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tablestitch_core::{
    BackendError, BackendKind, ExtractError, ExtractionReport, ExtractionWarning, PageLayout,
    PageSource, TableExtractionConfig,
};

use crate::borders::{BorderSignals, border_signals, detect_table_borders};
use crate::dedupe::dedupe_overlapping;
use crate::merge::merge_cross_page_tables;
use crate::orchestrator::PageExtractor;
use crate::refine::refine_table;
use crate::registry::BackendRegistry;
use crate::scanned::is_scanned_document;

/// Document-level table extraction.
///
/// Holds a validated config and the available backends; one instance can be
/// shared across threads and used for any number of documents.
#[derive(Debug, Clone)]
pub struct TableExtractor {
    config: TableExtractionConfig,
    registry: BackendRegistry,
}

impl TableExtractor {
    pub fn new(config: TableExtractionConfig, registry: BackendRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &TableExtractionConfig {
        &self.config
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Extract every table in the document at `path`.
    ///
    /// Only failing to open the document is an error. Anything that goes wrong
    /// afterwards (a page that will not load, a backend that crashes, a merge
    /// pass that cannot run) is recovered and recorded in the report's
    /// warnings.
    pub fn extract_document(
        &self,
        path: &Path,
        source: &dyn PageSource,
    ) -> Result<ExtractionReport, ExtractError> {
        let mut report = ExtractionReport::default();

        if self.registry.is_empty() {
            tracing::warn!(path = %path.display(), "no table extraction backends available");
            report.warnings.push(ExtractionWarning::NoBackendsAvailable);
            return Ok(report);
        }

        let document = source.open(path)?;
        let page_count = document.page_count();
        tracing::info!(path = %path.display(), pages = page_count, "extracting tables");

        // The scan check needs the first pages up front; keep them for the main loop
        let sample_len = if self.config.scanned.enabled {
            (self.config.scanned.sample_pages as u32).min(page_count)
        } else {
            0
        };
        let mut preloaded: Vec<Option<Result<PageLayout, BackendError>>> =
            (1..=sample_len).map(|n| Some(document.page(n))).collect();
        let sample: Vec<PageLayout> = preloaded
            .iter()
            .filter_map(|p| p.as_ref().and_then(|r| r.as_ref().ok()).cloned())
            .collect();
        let scanned = sample_len > 0 && is_scanned_document(&sample, &self.config.scanned);
        if scanned {
            tracing::info!(path = %path.display(), "document looks scanned");
        }

        let extractor = PageExtractor::new(&self.config, &self.registry);
        let mut unavailable: HashSet<BackendKind> = HashSet::new();

        for number in 1..=page_count {
            let loaded = preloaded
                .get_mut(number as usize - 1)
                .and_then(Option::take)
                .unwrap_or_else(|| document.page(number));

            let page = match loaded {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(page = number, error = %e, "table extraction failed for page");
                    report.pages_failed += 1;
                    report.warnings.push(ExtractionWarning::PageFailed {
                        page: number,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let has_borders = detect_table_borders(&page, &self.config.borders);
            let extraction = extractor.extract_page(path, &page, has_borders, scanned);

            for warning in extraction.warnings {
                // A missing backend is missing on every page; report it once
                if let ExtractionWarning::BackendUnavailable { backend, .. } = &warning
                    && !unavailable.insert(*backend)
                {
                    continue;
                }
                report.warnings.push(warning);
            }

            let mut tables = extraction.tables;
            if self.config.refine {
                tables.iter_mut().for_each(refine_table);
            }
            if self.config.dedupe_overlapping {
                tables = dedupe_overlapping(tables, self.config.overlap_threshold);
            }

            report.pages_processed += 1;
            report.tables.extend(tables);
        }

        if self.config.merge_cross_page && report.tables.len() > 1 {
            let tables = std::mem::take(&mut report.tables);
            let (merged, warning) = merge_cross_page_tables(tables, &self.config.merge);
            report.tables = merged;
            report.warnings.extend(warning);
        }

        tracing::info!(
            path = %path.display(),
            tables = report.tables.len(),
            cross_page = report.cross_page_count(),
            warnings = report.warnings.len(),
            "table extraction finished"
        );
        Ok(report)
    }

    /// Load every page and report its border classification and whether the
    /// document as a whole looks scanned. Pages that fail to load are
    /// returned as errors in place.
    pub fn classify_document(
        &self,
        path: &Path,
        source: &dyn PageSource,
    ) -> Result<DocumentClassification, ExtractError> {
        let document = source.open(path)?;
        let pages: Vec<Result<PageLayout, BackendError>> =
            (1..=document.page_count()).map(|n| document.page(n)).collect();

        let loaded: Vec<PageLayout> = pages.iter().filter_map(|p| p.as_ref().ok()).cloned().collect();
        let scanned = self.config.scanned.enabled && is_scanned_document(&loaded, &self.config.scanned);

        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, page)| match page {
                Ok(page) => PageClassification {
                    page: page.number,
                    signals: border_signals(&page, &self.config.borders),
                    has_borders: detect_table_borders(&page, &self.config.borders),
                    error: None,
                },
                Err(e) => PageClassification {
                    page: i as u32 + 1,
                    signals: None,
                    has_borders: false,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        Ok(DocumentClassification { scanned, pages })
    }
}

/// Border verdict for one page, as shown by `tablestitch classify`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageClassification {
    pub page: u32,
    /// `None` when the page geometry could not be inspected.
    pub signals: Option<BorderSignals>,
    pub has_borders: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentClassification {
    pub scanned: bool,
    pub pages: Vec<PageClassification>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tablestitch_core::{
        BBox, Block, PageDocument, PageRequest, Point, RawTable, Shape, TableBackend, text_row,
    };

    /// Pages keyed by number; a missing number fails to load.
    struct MemoryDocument {
        count: u32,
        pages: HashMap<u32, PageLayout>,
    }

    impl PageDocument for MemoryDocument {
        fn page_count(&self) -> u32 {
            self.count
        }

        fn page(&self, number: u32) -> Result<PageLayout, BackendError> {
            self.pages.get(&number).cloned().ok_or(BackendError::Page {
                page: number,
                message: "corrupt page".into(),
            })
        }
    }

    struct MemorySource {
        count: u32,
        pages: Vec<PageLayout>,
    }

    impl PageSource for MemorySource {
        fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>, BackendError> {
            if path.to_str() == Some("missing.pdf") {
                return Err(BackendError::Open("no such file".into()));
            }
            Ok(Box::new(MemoryDocument {
                count: self.count,
                pages: self.pages.iter().map(|p| (p.number, p.clone())).collect(),
            }))
        }
    }

    /// Returns one table per page with a fixed layout.
    struct OnePerPage(BackendKind);

    impl TableBackend for OnePerPage {
        fn kind(&self) -> BackendKind {
            self.0
        }

        fn extract(&self, request: &PageRequest<'_>) -> Result<Vec<RawTable>, BackendError> {
            let n = request.page_number().to_string();
            Ok(vec![RawTable {
                cells: vec![
                    text_row(&["Name", "Age", "City"]),
                    text_row(&[n.as_str(), "  30 ", "Oslo"]),
                ],
                bbox: Some(BBox::new(50.0, 100.0, 350.0, 300.0)),
                accuracy: None,
                mode_tag: format!("{}_{}", self.0, request.mode.as_str()),
            }])
        }
    }

    /// A table framed by blank rows, with a blank first row.
    struct BlankFramed;

    impl TableBackend for BlankFramed {
        fn kind(&self) -> BackendKind {
            BackendKind::Lattice
        }

        fn extract(&self, _request: &PageRequest<'_>) -> Result<Vec<RawTable>, BackendError> {
            Ok(vec![RawTable {
                cells: vec![
                    text_row(&["", "", ""]),
                    text_row(&["a", "b", "c"]),
                    text_row(&["", "", ""]),
                ],
                bbox: Some(BBox::new(50.0, 100.0, 350.0, 300.0)),
                accuracy: Some(90.0),
                mode_tag: "lattice_bordered".into(),
            }])
        }
    }

    fn ruled_page(number: u32) -> PageLayout {
        let mut page = PageLayout::new(number, 600.0, 800.0);
        for i in 0..5 {
            let y = 100.0 + 50.0 * i as f64;
            page.shapes.push(Shape::Line {
                from: Point::new(50.0, y),
                to: Point::new(350.0, y),
            });
        }
        for x in [50.0, 200.0, 350.0] {
            page.shapes.push(Shape::Line {
                from: Point::new(x, 100.0),
                to: Point::new(x, 300.0),
            });
        }
        page
    }

    fn source(numbers: &[u32], count: u32) -> MemorySource {
        MemorySource {
            count,
            pages: numbers.iter().map(|&n| ruled_page(n)).collect(),
        }
    }

    fn registry() -> BackendRegistry {
        BackendRegistry::new().with(Arc::new(OnePerPage(BackendKind::Lattice)))
    }

    #[test]
    fn test_pages_merge_and_refine() {
        let extractor = TableExtractor::new(TableExtractionConfig::default(), registry());
        let report = extractor
            .extract_document(Path::new("doc.pdf"), &source(&[1, 2, 3], 3))
            .unwrap();

        assert_eq!(report.pages_processed, 3);
        assert_eq!(report.pages_failed, 0);
        // Pages 1+2 merge, page 3 is left alone
        assert_eq!(report.tables.len(), 2);
        assert_eq!(report.tables[0].page_range, Some((1, 2)));
        assert_eq!(report.tables[0].extraction_method, "lattice_bordered_cross_page");
        assert_eq!(report.tables[0].rows[1], text_row(&["2", "30", "Oslo"]));
        assert!(report.tables[0].refined);
        assert!(!report.tables[1].is_cross_page);
        assert_eq!(report.tables[1].page, 3);
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_blank_first_row_does_not_become_headers() {
        let registry = BackendRegistry::new().with(Arc::new(BlankFramed));
        let extractor = TableExtractor::new(TableExtractionConfig::default(), registry);
        let report = extractor
            .extract_document(Path::new("doc.pdf"), &source(&[1], 1))
            .unwrap();
        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].headers, text_row(&["a", "b", "c"]));
        assert!(report.tables[0].rows.is_empty());
    }

    #[test]
    fn test_failed_page_recorded() {
        let extractor = TableExtractor::new(TableExtractionConfig::default(), registry());
        let report = extractor
            .extract_document(Path::new("doc.pdf"), &source(&[1, 3], 3))
            .unwrap();

        assert_eq!(report.pages_processed, 2);
        assert_eq!(report.pages_failed, 1);
        assert_eq!(report.tables.len(), 2);
        assert!(report.tables.iter().all(|t| !t.is_cross_page));
        assert_eq!(
            report.warnings,
            vec![ExtractionWarning::PageFailed {
                page: 2,
                message: "failed to load page 2: corrupt page".into(),
            }]
        );
    }

    #[test]
    fn test_no_backends() {
        let extractor = TableExtractor::new(TableExtractionConfig::default(), BackendRegistry::new());
        let report = extractor
            .extract_document(Path::new("doc.pdf"), &source(&[1], 1))
            .unwrap();
        assert!(report.tables.is_empty());
        assert_eq!(report.warnings, vec![ExtractionWarning::NoBackendsAvailable]);
    }

    #[test]
    fn test_open_failure_is_error() {
        let extractor = TableExtractor::new(TableExtractionConfig::default(), registry());
        let result = extractor.extract_document(Path::new("missing.pdf"), &source(&[], 0));
        assert!(matches!(result, Err(ExtractError::Open(_))));
    }

    #[test]
    fn test_unavailable_backend_reported_once() {
        // Only Heuristic is registered; Lattice is primary on ruled pages
        let registry = BackendRegistry::new().with(Arc::new(OnePerPage(BackendKind::Heuristic)));
        let mut config = TableExtractionConfig::default();
        config.merge_cross_page = false;
        let extractor = TableExtractor::new(config, registry);
        let report = extractor
            .extract_document(Path::new("doc.pdf"), &source(&[1, 2, 3], 3))
            .unwrap();

        assert_eq!(report.tables.len(), 3);
        assert_eq!(
            report.warnings,
            vec![
                ExtractionWarning::BackendUnavailable {
                    backend: BackendKind::Lattice,
                    page: 1
                },
                ExtractionWarning::BackendUnavailable {
                    backend: BackendKind::Stream,
                    page: 1
                },
            ]
        );
    }

    #[test]
    fn test_scanned_document_uses_scanned_backend() {
        let mut pages = Vec::new();
        for n in 1..=2 {
            let mut page = PageLayout::new(n, 600.0, 800.0);
            page.blocks.push(Block::Image {
                bbox: BBox::new(0.0, 0.0, 600.0, 800.0),
            });
            pages.push(page);
        }
        let source = MemorySource { count: 2, pages };
        let registry = BackendRegistry::new()
            .with(Arc::new(OnePerPage(BackendKind::Lattice)))
            .with(Arc::new(OnePerPage(BackendKind::Stream)));
        let extractor = TableExtractor::new(TableExtractionConfig::default(), registry);
        let report = extractor.extract_document(Path::new("scan.pdf"), &source).unwrap();

        // Image pages classify as bordered, but the scanned override picks Stream
        assert!(report.tables[0].extraction_method.starts_with("stream_bordered"));
    }

    #[test]
    fn test_classify_document() {
        let mut broken = ruled_page(2);
        broken.geometry_error = Some("bad content stream".into());
        let source = MemorySource {
            count: 3,
            pages: vec![ruled_page(1), broken],
        };
        let extractor = TableExtractor::new(TableExtractionConfig::default(), registry());
        let classification = extractor
            .classify_document(Path::new("doc.pdf"), &source)
            .unwrap();

        assert!(!classification.scanned);
        assert_eq!(classification.pages.len(), 3);
        assert!(classification.pages[0].has_borders);
        assert_eq!(classification.pages[0].signals.unwrap().horizontal_lines, 5);
        assert!(!classification.pages[1].has_borders);
        assert!(classification.pages[1].signals.is_none());
        assert_eq!(classification.pages[2].page, 3);
        assert!(classification.pages[2].error.is_some());
    }
}
