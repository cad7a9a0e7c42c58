//! Per-page backend selection and fallback.
//!
//! For every page one primary backend is chosen from the config and the
//! border classification. When it comes back empty the remaining backends
//! are tried in [`BackendKind::FALLBACK_ORDER`] until one finds something.
//! Backend failures never leave this module; they become warnings.

use std::path::Path;

use tablestitch_core::{
    BBox, BackendKind, ExtractionMode, ExtractionWarning, MethodSelector, PageLayout, PageRequest,
    RawTable, Table, TableExtractionConfig,
};

use crate::context::table_context;
use crate::registry::BackendRegistry;

/// Tables found on one page plus whatever went wrong on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtraction {
    pub tables: Vec<Table>,
    pub warnings: Vec<ExtractionWarning>,
    /// Backend that produced `tables`, if any did.
    pub backend: Option<BackendKind>,
}

pub struct PageExtractor<'a> {
    config: &'a TableExtractionConfig,
    registry: &'a BackendRegistry,
}

impl<'a> PageExtractor<'a> {
    pub fn new(config: &'a TableExtractionConfig, registry: &'a BackendRegistry) -> Self {
        Self { config, registry }
    }

    /// The backend tried first on a page.
    ///
    /// An explicit method always wins. In `auto` mode scanned documents use
    /// `table_types.scanned`, everything else is picked by the border flag.
    pub fn primary_backend(&self, has_borders: bool, scanned: bool) -> BackendKind {
        match self.config.method {
            MethodSelector::Backend(kind) => kind,
            MethodSelector::Auto => {
                let types = &self.config.table_types;
                if scanned && self.config.scanned.enabled {
                    types.scanned
                } else if has_borders {
                    types.bordered
                } else {
                    types.borderless
                }
            }
        }
    }

    /// Extract the tables of one page, falling back between backends.
    pub fn extract_page(
        &self,
        path: &Path,
        page: &PageLayout,
        has_borders: bool,
        scanned: bool,
    ) -> PageExtraction {
        let request = PageRequest {
            path,
            page,
            mode: ExtractionMode::from_borders(has_borders),
        };
        let primary = self.primary_backend(has_borders, scanned);
        let mut out = PageExtraction::default();

        let mut candidates = vec![primary];
        if self.config.fallback_to_heuristic {
            candidates.extend(BackendKind::FALLBACK_ORDER.into_iter().filter(|k| *k != primary));
        }

        for (attempt, kind) in candidates.into_iter().enumerate() {
            if attempt > 0 {
                tracing::debug!(page = page.number, backend = %kind, "trying fallback backend");
            }
            match self.run_backend(kind, &request) {
                Ok(tables) if !tables.is_empty() => {
                    out.tables = tables;
                    out.backend = Some(kind);
                    break;
                }
                Ok(_) => {
                    tracing::info!(page = page.number, backend = %kind, "no tables found");
                }
                Err(warning) => out.warnings.push(warning),
            }
        }

        for table in &mut out.tables {
            if let Some(bbox) = table.bbox {
                table.context = table_context(page, &bbox, self.config.context_range);
            }
        }

        tracing::debug!(
            page = page.number,
            mode = request.mode.as_str(),
            primary = %primary,
            backend = ?out.backend,
            tables = out.tables.len(),
            "page extraction finished"
        );
        out
    }

    /// Run a single backend on a page.
    ///
    /// `Ok(vec![])` means the backend ran and found nothing; `Err` means it
    /// could not run at all, so the caller knows the result is degraded.
    pub fn run_backend(
        &self,
        kind: BackendKind,
        request: &PageRequest<'_>,
    ) -> Result<Vec<Table>, ExtractionWarning> {
        let page = request.page_number();
        let Some(backend) = self.registry.get(kind) else {
            tracing::warn!(page, backend = %kind, "backend not available, skipping");
            return Err(ExtractionWarning::BackendUnavailable {
                backend: kind,
                page,
            });
        };

        match backend.extract(request) {
            Ok(raw) => Ok(self.convert(kind, page, raw)),
            Err(e) => {
                tracing::warn!(page, backend = %kind, error = %e, "backend extraction failed");
                Err(ExtractionWarning::BackendFailed {
                    backend: kind,
                    page,
                    message: e.to_string(),
                })
            }
        }
    }

    fn convert(&self, kind: BackendKind, page: u32, raw: Vec<RawTable>) -> Vec<Table> {
        let mut tables = Vec::with_capacity(raw.len());
        for (i, raw) in raw.into_iter().enumerate() {
            if let Some(accuracy) = raw.accuracy
                && accuracy < self.config.min_confidence
            {
                tracing::info!(
                    page,
                    backend = %kind,
                    accuracy,
                    threshold = self.config.min_confidence,
                    "skipping table with low accuracy"
                );
                continue;
            }

            let confidence = raw
                .accuracy
                .map_or(kind.fixed_confidence(), |a| (a / 100.0).clamp(0.0, 1.0));
            let mut rows = raw.cells;
            let headers = if self.config.header_extraction && !rows.is_empty() {
                rows.remove(0)
            } else {
                Vec::new()
            };
            let extraction_method = if raw.mode_tag.is_empty() {
                kind.as_str().to_string()
            } else {
                raw.mode_tag
            };

            tables.push(Table {
                id: format!("table_{page}_{}", i + 1),
                page,
                bbox: raw
                    .bbox
                    .and_then(|b| BBox::from_coords([b.x0, b.y0, b.x1, b.y1])),
                headers,
                rows,
                extraction_method,
                confidence,
                ..Table::default()
            });
        }
        tables
    }
}
