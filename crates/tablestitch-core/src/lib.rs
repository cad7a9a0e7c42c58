use serde::Serialize;
use thiserror::Error;

pub mod backend;
pub mod config;
pub mod config_file;
pub mod model;
pub mod page;

// Re-export for convenience
pub use backend::{
    BackendError, BackendKind, ExtractionMode, PageDocument, PageRequest, PageSource, TableBackend,
};
pub use config::{
    BackendSettings, BorderThresholds, ConfigError, MergeThresholds, MethodSelector,
    ScanDetection, TableExtractionConfig, TableExtractionConfigBuilder, TableTypes,
};
pub use config_file::{ConfigFile, ConfigFileError, ExternalBackendConfig};
pub use model::{BBox, Cell, Point, RawTable, Table, text_row};
pub use page::{Block, PageLayout, Shape, TextLine, Word};

/// A recovered failure. Extraction carries on, but the output may be
/// missing tables the document actually contains.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionWarning {
    #[error("no table extraction backends are available")]
    NoBackendsAvailable,
    #[error("{backend} backend is not available (page {page})")]
    BackendUnavailable { backend: BackendKind, page: u32 },
    #[error("{backend} backend failed on page {page}: {message}")]
    BackendFailed {
        backend: BackendKind,
        page: u32,
        message: String,
    },
    #[error("table extraction failed for page {page}: {message}")]
    PageFailed { page: u32, message: String },
    #[error("cross-page table handling failed: {message}")]
    MergeFailed { message: String },
}

/// Result of extracting tables from one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub tables: Vec<Table>,
    pub warnings: Vec<ExtractionWarning>,
    pub pages_processed: u32,
    pub pages_failed: u32,
}

impl ExtractionReport {
    /// True when any failure was recovered along the way, i.e. an empty or
    /// sparse `tables` list may not be the whole story.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn cross_page_count(&self) -> usize {
        self.tables.iter().filter(|t| t.is_cross_page).count()
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to open document: {0}")]
    Open(#[from] BackendError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_degraded() {
        let mut report = ExtractionReport::default();
        assert!(!report.is_degraded());
        report.warnings.push(ExtractionWarning::PageFailed {
            page: 2,
            message: "bad xref".into(),
        });
        assert!(report.is_degraded());
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let warning = ExtractionWarning::BackendFailed {
            backend: BackendKind::Stream,
            page: 4,
            message: "boom".into(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "backend_failed");
        assert_eq!(json["backend"], "stream");
        assert_eq!(json["page"], 4);
        assert_eq!(
            warning.to_string(),
            "stream backend failed on page 4: boom"
        );
    }
}
