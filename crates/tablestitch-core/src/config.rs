use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("unknown extraction method: {0}")]
    UnknownMethod(String),
}

/// Which backend to try first on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MethodSelector {
    /// Choose per page via [`TableTypes`].
    #[default]
    Auto,
    /// Always start with this backend.
    Backend(BackendKind),
}

impl fmt::Display for MethodSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodSelector::Auto => f.write_str("auto"),
            MethodSelector::Backend(kind) => write!(f, "{kind}"),
        }
    }
}

impl FromStr for MethodSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(MethodSelector::Auto);
        }
        s.parse::<BackendKind>()
            .map(MethodSelector::Backend)
            .map_err(|_| ConfigError::UnknownMethod(s.to_string()))
    }
}

impl From<MethodSelector> for String {
    fn from(m: MethodSelector) -> Self {
        m.to_string()
    }
}

impl TryFrom<String> for MethodSelector {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Default backend per page class in `auto` mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableTypes {
    pub bordered: BackendKind,
    pub borderless: BackendKind,
    /// Used for every page of a document classified as scanned.
    pub scanned: BackendKind,
}

impl Default for TableTypes {
    fn default() -> Self {
        Self {
            bordered: BackendKind::Lattice,
            borderless: BackendKind::Stream,
            scanned: BackendKind::Stream,
        }
    }
}

/// Tunable constants of the bordered/borderless page classifier.
///
/// These are inspectable heuristics, not learned parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderThresholds {
    /// Lines shorter than this are ignored.
    pub min_line_length: f64,
    /// Maximum endpoint delta for a line to count as horizontal/vertical.
    pub axis_tolerance: f64,
    pub min_horizontal_lines: usize,
    pub min_vertical_lines: usize,
    pub min_rectangles: usize,
    /// Treat any image block as a (scanned) bordered table.
    pub images_imply_borders: bool,
}

impl Default for BorderThresholds {
    fn default() -> Self {
        Self {
            min_line_length: 10.0,
            axis_tolerance: 3.0,
            min_horizontal_lines: 5,
            min_vertical_lines: 3,
            min_rectangles: 10,
            images_imply_borders: true,
        }
    }
}

/// Thresholds of the cross-page relatedness test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeThresholds {
    /// A header column matches when its string similarity exceeds this.
    pub cell_similarity: f64,
    /// Header lists are similar when the fraction of matching columns exceeds this.
    pub header_similarity: f64,
    /// Maximum relative width difference between the two tables' bboxes.
    pub max_width_delta: f64,
}

impl Default for MergeThresholds {
    fn default() -> Self {
        Self {
            cell_similarity: 0.8,
            header_similarity: 0.7,
            max_width_delta: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanDetection {
    pub enabled: bool,
    /// Pages sampled from the start of the document.
    pub sample_pages: usize,
    /// Average characters per unit area below which text is considered sparse.
    pub max_text_density: f64,
    /// Average image-area fraction above which a page is considered an image.
    pub min_image_coverage: f64,
}

impl Default for ScanDetection {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_pages: 3,
            max_text_density: 0.01,
            min_image_coverage: 0.5,
        }
    }
}

/// Geometry knobs shared by the native backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Ruling lines shorter than `page dimension / line_scale` are ignored.
    pub line_scale: f64,
    /// Distance within which two rules are considered to touch or coincide.
    pub snap_tolerance: f64,
    /// Vertical distance within which words belong to the same text row.
    pub row_tolerance: f64,
    /// Smallest horizontal gap that separates two columns.
    pub min_column_gap: f64,
    /// Minimum number of rows for a text-based table.
    pub min_rows: usize,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            line_scale: 40.0,
            snap_tolerance: 3.0,
            row_tolerance: 5.0,
            min_column_gap: 8.0,
            min_rows: 2,
        }
    }
}

/// Configuration of the whole table reconciliation pipeline.
///
/// Use [`TableExtractionConfigBuilder`] to construct a validated config from
/// individual overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableExtractionConfig {
    pub method: MethodSelector,
    pub table_types: TableTypes,
    /// Try the other backends when the primary one finds nothing.
    pub fallback_to_heuristic: bool,
    /// Promote the first extracted row to `headers`.
    pub header_extraction: bool,
    /// Minimum native accuracy (percent) for backends that report one.
    pub min_confidence: f64,
    /// Text blocks captured on each side of a table.
    pub context_range: usize,
    pub refine: bool,
    pub merge_cross_page: bool,
    pub dedupe_overlapping: bool,
    /// Intersection over the smaller area at which two tables are duplicates.
    pub overlap_threshold: f64,
    pub borders: BorderThresholds,
    pub merge: MergeThresholds,
    pub scanned: ScanDetection,
    pub backends: BackendSettings,
}

impl Default for TableExtractionConfig {
    fn default() -> Self {
        Self {
            method: MethodSelector::Auto,
            table_types: TableTypes::default(),
            fallback_to_heuristic: true,
            header_extraction: true,
            min_confidence: 80.0,
            context_range: 3,
            refine: true,
            merge_cross_page: true,
            dedupe_overlapping: true,
            overlap_threshold: 0.5,
            borders: BorderThresholds::default(),
            merge: MergeThresholds::default(),
            scanned: ScanDetection::default(),
            backends: BackendSettings::default(),
        }
    }
}

/// Builder for [`TableExtractionConfig`].
///
/// Unset values fall back to the defaults; [`build()`](Self::build) checks
/// ranges and fails fast on the first invalid value.
#[derive(Debug, Clone, Default)]
pub struct TableExtractionConfigBuilder {
    method: Option<String>,
    table_types: Option<TableTypes>,
    fallback_to_heuristic: Option<bool>,
    header_extraction: Option<bool>,
    min_confidence: Option<f64>,
    context_range: Option<usize>,
    refine: Option<bool>,
    merge_cross_page: Option<bool>,
    dedupe_overlapping: Option<bool>,
    overlap_threshold: Option<f64>,
    borders: Option<BorderThresholds>,
    merge: Option<MergeThresholds>,
    scanned: Option<ScanDetection>,
    backends: Option<BackendSettings>,
}

impl TableExtractionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config so later calls only override.
    pub fn from_config(config: TableExtractionConfig) -> Self {
        Self {
            method: Some(config.method.to_string()),
            table_types: Some(config.table_types),
            fallback_to_heuristic: Some(config.fallback_to_heuristic),
            header_extraction: Some(config.header_extraction),
            min_confidence: Some(config.min_confidence),
            context_range: Some(config.context_range),
            refine: Some(config.refine),
            merge_cross_page: Some(config.merge_cross_page),
            dedupe_overlapping: Some(config.dedupe_overlapping),
            overlap_threshold: Some(config.overlap_threshold),
            borders: Some(config.borders),
            merge: Some(config.merge),
            scanned: Some(config.scanned),
            backends: Some(config.backends),
        }
    }

    /// `auto`, a backend name, or one of the aliases `camelot`, `tabula`, `pdfplumber`.
    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn table_types(mut self, table_types: TableTypes) -> Self {
        self.table_types = Some(table_types);
        self
    }

    pub fn fallback_to_heuristic(mut self, enabled: bool) -> Self {
        self.fallback_to_heuristic = Some(enabled);
        self
    }

    pub fn header_extraction(mut self, enabled: bool) -> Self {
        self.header_extraction = Some(enabled);
        self
    }

    pub fn min_confidence(mut self, percent: f64) -> Self {
        self.min_confidence = Some(percent);
        self
    }

    pub fn context_range(mut self, blocks: usize) -> Self {
        self.context_range = Some(blocks);
        self
    }

    pub fn refine(mut self, enabled: bool) -> Self {
        self.refine = Some(enabled);
        self
    }

    pub fn merge_cross_page(mut self, enabled: bool) -> Self {
        self.merge_cross_page = Some(enabled);
        self
    }

    pub fn dedupe_overlapping(mut self, enabled: bool) -> Self {
        self.dedupe_overlapping = Some(enabled);
        self
    }

    pub fn overlap_threshold(mut self, threshold: f64) -> Self {
        self.overlap_threshold = Some(threshold);
        self
    }

    pub fn borders(mut self, borders: BorderThresholds) -> Self {
        self.borders = Some(borders);
        self
    }

    pub fn merge(mut self, merge: MergeThresholds) -> Self {
        self.merge = Some(merge);
        self
    }

    pub fn scanned(mut self, scanned: ScanDetection) -> Self {
        self.scanned = Some(scanned);
        self
    }

    pub fn backends(mut self, backends: BackendSettings) -> Self {
        self.backends = Some(backends);
        self
    }

    pub fn build(self) -> Result<TableExtractionConfig, ConfigError> {
        let defaults = TableExtractionConfig::default();

        let method = match self.method {
            Some(m) => m.parse()?,
            None => defaults.method,
        };

        let config = TableExtractionConfig {
            method,
            table_types: self.table_types.unwrap_or(defaults.table_types),
            fallback_to_heuristic: self
                .fallback_to_heuristic
                .unwrap_or(defaults.fallback_to_heuristic),
            header_extraction: self.header_extraction.unwrap_or(defaults.header_extraction),
            min_confidence: self.min_confidence.unwrap_or(defaults.min_confidence),
            context_range: self.context_range.unwrap_or(defaults.context_range),
            refine: self.refine.unwrap_or(defaults.refine),
            merge_cross_page: self.merge_cross_page.unwrap_or(defaults.merge_cross_page),
            dedupe_overlapping: self.dedupe_overlapping.unwrap_or(defaults.dedupe_overlapping),
            overlap_threshold: self.overlap_threshold.unwrap_or(defaults.overlap_threshold),
            borders: self.borders.unwrap_or(defaults.borders),
            merge: self.merge.unwrap_or(defaults.merge),
            scanned: self.scanned.unwrap_or(defaults.scanned),
            backends: self.backends.unwrap_or(defaults.backends),
        };

        validate(&config)?;
        Ok(config)
    }
}

fn validate(config: &TableExtractionConfig) -> Result<(), ConfigError> {
    check_range("min_confidence", config.min_confidence, 0.0, 100.0)?;
    check_range("overlap_threshold", config.overlap_threshold, 0.0, 1.0)?;
    check_range("merge.cell_similarity", config.merge.cell_similarity, 0.0, 1.0)?;
    check_range("merge.header_similarity", config.merge.header_similarity, 0.0, 1.0)?;
    check_range("merge.max_width_delta", config.merge.max_width_delta, 0.0, 1.0)?;
    check_range(
        "scanned.min_image_coverage",
        config.scanned.min_image_coverage,
        0.0,
        1.0,
    )?;
    check_non_negative("borders.min_line_length", config.borders.min_line_length)?;
    check_non_negative("borders.axis_tolerance", config.borders.axis_tolerance)?;
    check_non_negative("scanned.max_text_density", config.scanned.max_text_density)?;
    check_non_negative("backends.snap_tolerance", config.backends.snap_tolerance)?;
    check_non_negative("backends.row_tolerance", config.backends.row_tolerance)?;
    check_non_negative("backends.min_column_gap", config.backends.min_column_gap)?;

    if !(config.backends.line_scale.is_finite() && config.backends.line_scale > 0.0) {
        return Err(ConfigError::InvalidValue {
            field: "backends.line_scale",
            message: format!("must be positive, got {}", config.backends.line_scale),
        });
    }
    if config.backends.min_rows == 0 {
        return Err(ConfigError::InvalidValue {
            field: "backends.min_rows",
            message: "must be at least 1".into(),
        });
    }
    Ok(())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            message: format!("expected {min}..={max}, got {value}"),
        })
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            message: format!("must be non-negative, got {value}"),
        })
    }
}
