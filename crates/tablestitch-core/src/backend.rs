use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::RawTable;
use crate::page::PageLayout;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open document: {0}")]
    Open(String),
    #[error("failed to load page {page}: {message}")]
    Page { page: u32, message: String },
    #[error("table extraction failed: {0}")]
    Extraction(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid backend output: {0}")]
    Json(#[from] serde_json::Error),
}

/// The closed set of table-extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ruling-line grid detection (the Camelot-lattice role).
    #[serde(alias = "camelot")]
    Lattice,
    /// Text-alignment column inference (the Tabula-guess role).
    #[serde(alias = "tabula")]
    Stream,
    /// Text-layout gap splitting (the pdfplumber text-strategy role).
    #[serde(alias = "pdfplumber")]
    Heuristic,
}

impl BackendKind {
    /// Fixed fallback order used when the primary backend finds nothing.
    pub const FALLBACK_ORDER: [BackendKind; 3] =
        [BackendKind::Lattice, BackendKind::Stream, BackendKind::Heuristic];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Lattice => "lattice",
            BackendKind::Stream => "stream",
            BackendKind::Heuristic => "heuristic",
        }
    }

    /// Confidence assigned to tables from this backend when it reports no native score.
    pub fn fixed_confidence(&self) -> f64 {
        match self {
            BackendKind::Lattice => 0.8,
            BackendKind::Stream => 0.7,
            BackendKind::Heuristic => 0.6,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lattice" | "camelot" => Ok(BackendKind::Lattice),
            "stream" | "tabula" => Ok(BackendKind::Stream),
            "heuristic" | "pdfplumber" => Ok(BackendKind::Heuristic),
            other => Err(format!("unknown backend: {other}")),
        }
    }
}

/// Mode parameters derived from the border classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    Bordered,
    Borderless,
}

impl ExtractionMode {
    pub fn from_borders(has_borders: bool) -> Self {
        if has_borders {
            ExtractionMode::Bordered
        } else {
            ExtractionMode::Borderless
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMode::Bordered => "bordered",
            ExtractionMode::Borderless => "borderless",
        }
    }
}

/// Everything a backend gets to see for one page.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub path: &'a Path,
    pub page: &'a PageLayout,
    pub mode: ExtractionMode,
}

impl PageRequest<'_> {
    /// 1-based page number.
    pub fn page_number(&self) -> u32 {
        self.page.number
    }
}

/// Trait for table-extraction backends.
///
/// Implementors turn one page into raw 2-D tables; selection, fallback,
/// refinement and merging live in the reconciliation crate.
pub trait TableBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn extract(&self, request: &PageRequest<'_>) -> Result<Vec<RawTable>, BackendError>;
}

/// Trait for document readers that supply page geometry and text.
pub trait PageSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PageDocument>, BackendError>;
}

/// An opened document. Pages are loaded one at a time so a corrupt page only
/// costs that page.
pub trait PageDocument {
    fn page_count(&self) -> u32;

    /// Load a page by 1-based number.
    fn page(&self, number: u32) -> Result<PageLayout, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse_aliases() {
        assert_eq!("camelot".parse::<BackendKind>(), Ok(BackendKind::Lattice));
        assert_eq!("Tabula".parse::<BackendKind>(), Ok(BackendKind::Stream));
        assert_eq!("pdfplumber".parse::<BackendKind>(), Ok(BackendKind::Heuristic));
        assert_eq!("stream".parse::<BackendKind>(), Ok(BackendKind::Stream));
        assert!("ocr".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_mode_from_borders() {
        assert_eq!(ExtractionMode::from_borders(true), ExtractionMode::Bordered);
        assert_eq!(ExtractionMode::from_borders(false), ExtractionMode::Borderless);
    }
}
