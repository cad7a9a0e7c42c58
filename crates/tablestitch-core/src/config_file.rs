use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendKind;
use crate::config::{
    BackendSettings, BorderThresholds, ConfigError, MergeThresholds, ScanDetection,
    TableExtractionConfig, TableExtractionConfigBuilder, TableTypes,
};

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub extraction: Option<ExtractionSection>,
    pub borders: Option<BordersSection>,
    pub merge: Option<MergeSection>,
    pub scanned: Option<ScannedSection>,
    pub backends: Option<BackendsSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSection {
    pub method: Option<String>,
    pub fallback_to_heuristic: Option<bool>,
    pub header_extraction: Option<bool>,
    pub min_confidence: Option<f64>,
    pub context_range: Option<usize>,
    pub refine: Option<bool>,
    pub merge_cross_page: Option<bool>,
    pub dedupe_overlapping: Option<bool>,
    pub overlap_threshold: Option<f64>,
    pub table_types: Option<TableTypesSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableTypesSection {
    pub bordered: Option<BackendKind>,
    pub borderless: Option<BackendKind>,
    pub scanned: Option<BackendKind>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BordersSection {
    pub min_line_length: Option<f64>,
    pub axis_tolerance: Option<f64>,
    pub min_horizontal_lines: Option<usize>,
    pub min_vertical_lines: Option<usize>,
    pub min_rectangles: Option<usize>,
    pub images_imply_borders: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeSection {
    pub cell_similarity: Option<f64>,
    pub header_similarity: Option<f64>,
    pub max_width_delta: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScannedSection {
    pub enabled: Option<bool>,
    pub sample_pages: Option<usize>,
    pub max_text_density: Option<f64>,
    pub min_image_coverage: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendsSection {
    pub line_scale: Option<f64>,
    pub snap_tolerance: Option<f64>,
    pub row_tolerance: Option<f64>,
    pub min_column_gap: Option<f64>,
    pub min_rows: Option<usize>,
    /// External programs that replace the native backend of the same kind.
    pub external: Option<Vec<ExternalBackendConfig>>,
}

/// An external table extractor invoked as
/// `program [args..] --page N --mode bordered|borderless <path>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalBackendConfig {
    pub kind: BackendKind,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Field-wise overlay: values set in `top` win over `self`.
trait Overlay: Sized {
    fn overlay(self, top: Self) -> Self;
}

fn overlay_opt<T: Overlay>(base: Option<T>, top: Option<T>) -> Option<T> {
    match (base, top) {
        (None, None) => None,
        (Some(b), None) => Some(b),
        (None, Some(t)) => Some(t),
        (Some(b), Some(t)) => Some(b.overlay(t)),
    }
}

impl Overlay for TableTypesSection {
    fn overlay(self, top: Self) -> Self {
        Self {
            bordered: top.bordered.or(self.bordered),
            borderless: top.borderless.or(self.borderless),
            scanned: top.scanned.or(self.scanned),
        }
    }
}

impl Overlay for ExtractionSection {
    fn overlay(self, top: Self) -> Self {
        Self {
            method: top.method.or(self.method),
            fallback_to_heuristic: top.fallback_to_heuristic.or(self.fallback_to_heuristic),
            header_extraction: top.header_extraction.or(self.header_extraction),
            min_confidence: top.min_confidence.or(self.min_confidence),
            context_range: top.context_range.or(self.context_range),
            refine: top.refine.or(self.refine),
            merge_cross_page: top.merge_cross_page.or(self.merge_cross_page),
            dedupe_overlapping: top.dedupe_overlapping.or(self.dedupe_overlapping),
            overlap_threshold: top.overlap_threshold.or(self.overlap_threshold),
            table_types: overlay_opt(self.table_types, top.table_types),
        }
    }
}

impl Overlay for BordersSection {
    fn overlay(self, top: Self) -> Self {
        Self {
            min_line_length: top.min_line_length.or(self.min_line_length),
            axis_tolerance: top.axis_tolerance.or(self.axis_tolerance),
            min_horizontal_lines: top.min_horizontal_lines.or(self.min_horizontal_lines),
            min_vertical_lines: top.min_vertical_lines.or(self.min_vertical_lines),
            min_rectangles: top.min_rectangles.or(self.min_rectangles),
            images_imply_borders: top.images_imply_borders.or(self.images_imply_borders),
        }
    }
}

impl Overlay for MergeSection {
    fn overlay(self, top: Self) -> Self {
        Self {
            cell_similarity: top.cell_similarity.or(self.cell_similarity),
            header_similarity: top.header_similarity.or(self.header_similarity),
            max_width_delta: top.max_width_delta.or(self.max_width_delta),
        }
    }
}

impl Overlay for ScannedSection {
    fn overlay(self, top: Self) -> Self {
        Self {
            enabled: top.enabled.or(self.enabled),
            sample_pages: top.sample_pages.or(self.sample_pages),
            max_text_density: top.max_text_density.or(self.max_text_density),
            min_image_coverage: top.min_image_coverage.or(self.min_image_coverage),
        }
    }
}

impl Overlay for BackendsSection {
    fn overlay(self, top: Self) -> Self {
        Self {
            line_scale: top.line_scale.or(self.line_scale),
            snap_tolerance: top.snap_tolerance.or(self.snap_tolerance),
            row_tolerance: top.row_tolerance.or(self.row_tolerance),
            min_column_gap: top.min_column_gap.or(self.min_column_gap),
            min_rows: top.min_rows.or(self.min_rows),
            // The external list is replaced wholesale rather than concatenated.
            external: top.external.or(self.external),
        }
    }
}

impl Overlay for ConfigFile {
    fn overlay(self, top: Self) -> Self {
        Self {
            extraction: overlay_opt(self.extraction, top.extraction),
            borders: overlay_opt(self.borders, top.borders),
            merge: overlay_opt(self.merge, top.merge),
            scanned: overlay_opt(self.scanned, top.scanned),
            backends: overlay_opt(self.backends, top.backends),
        }
    }
}

impl ConfigFile {
    /// Resolve this file against the built-in defaults.
    pub fn to_config(&self) -> Result<TableExtractionConfig, ConfigError> {
        let defaults = TableExtractionConfig::default();
        let mut builder = TableExtractionConfigBuilder::new();

        if let Some(ext) = &self.extraction {
            if let Some(method) = &ext.method {
                builder = builder.method(method);
            }
            if let Some(v) = ext.fallback_to_heuristic {
                builder = builder.fallback_to_heuristic(v);
            }
            if let Some(v) = ext.header_extraction {
                builder = builder.header_extraction(v);
            }
            if let Some(v) = ext.min_confidence {
                builder = builder.min_confidence(v);
            }
            if let Some(v) = ext.context_range {
                builder = builder.context_range(v);
            }
            if let Some(v) = ext.refine {
                builder = builder.refine(v);
            }
            if let Some(v) = ext.merge_cross_page {
                builder = builder.merge_cross_page(v);
            }
            if let Some(v) = ext.dedupe_overlapping {
                builder = builder.dedupe_overlapping(v);
            }
            if let Some(v) = ext.overlap_threshold {
                builder = builder.overlap_threshold(v);
            }
            if let Some(tt) = &ext.table_types {
                let d = &defaults.table_types;
                builder = builder.table_types(TableTypes {
                    bordered: tt.bordered.unwrap_or(d.bordered),
                    borderless: tt.borderless.unwrap_or(d.borderless),
                    scanned: tt.scanned.unwrap_or(d.scanned),
                });
            }
        }

        if let Some(b) = &self.borders {
            let d = &defaults.borders;
            builder = builder.borders(BorderThresholds {
                min_line_length: b.min_line_length.unwrap_or(d.min_line_length),
                axis_tolerance: b.axis_tolerance.unwrap_or(d.axis_tolerance),
                min_horizontal_lines: b.min_horizontal_lines.unwrap_or(d.min_horizontal_lines),
                min_vertical_lines: b.min_vertical_lines.unwrap_or(d.min_vertical_lines),
                min_rectangles: b.min_rectangles.unwrap_or(d.min_rectangles),
                images_imply_borders: b.images_imply_borders.unwrap_or(d.images_imply_borders),
            });
        }

        if let Some(m) = &self.merge {
            let d = &defaults.merge;
            builder = builder.merge(MergeThresholds {
                cell_similarity: m.cell_similarity.unwrap_or(d.cell_similarity),
                header_similarity: m.header_similarity.unwrap_or(d.header_similarity),
                max_width_delta: m.max_width_delta.unwrap_or(d.max_width_delta),
            });
        }

        if let Some(s) = &self.scanned {
            let d = &defaults.scanned;
            builder = builder.scanned(ScanDetection {
                enabled: s.enabled.unwrap_or(d.enabled),
                sample_pages: s.sample_pages.unwrap_or(d.sample_pages),
                max_text_density: s.max_text_density.unwrap_or(d.max_text_density),
                min_image_coverage: s.min_image_coverage.unwrap_or(d.min_image_coverage),
            });
        }

        if let Some(b) = &self.backends {
            let d = &defaults.backends;
            builder = builder.backends(BackendSettings {
                line_scale: b.line_scale.unwrap_or(d.line_scale),
                snap_tolerance: b.snap_tolerance.unwrap_or(d.snap_tolerance),
                row_tolerance: b.row_tolerance.unwrap_or(d.row_tolerance),
                min_column_gap: b.min_column_gap.unwrap_or(d.min_column_gap),
                min_rows: b.min_rows.unwrap_or(d.min_rows),
            });
        }

        builder.build()
    }

    /// A fully populated file describing `config`, for display.
    pub fn from_config(config: &TableExtractionConfig, external: &[ExternalBackendConfig]) -> Self {
        Self {
            extraction: Some(ExtractionSection {
                method: Some(config.method.to_string()),
                fallback_to_heuristic: Some(config.fallback_to_heuristic),
                header_extraction: Some(config.header_extraction),
                min_confidence: Some(config.min_confidence),
                context_range: Some(config.context_range),
                refine: Some(config.refine),
                merge_cross_page: Some(config.merge_cross_page),
                dedupe_overlapping: Some(config.dedupe_overlapping),
                overlap_threshold: Some(config.overlap_threshold),
                table_types: Some(TableTypesSection {
                    bordered: Some(config.table_types.bordered),
                    borderless: Some(config.table_types.borderless),
                    scanned: Some(config.table_types.scanned),
                }),
            }),
            borders: Some(BordersSection {
                min_line_length: Some(config.borders.min_line_length),
                axis_tolerance: Some(config.borders.axis_tolerance),
                min_horizontal_lines: Some(config.borders.min_horizontal_lines),
                min_vertical_lines: Some(config.borders.min_vertical_lines),
                min_rectangles: Some(config.borders.min_rectangles),
                images_imply_borders: Some(config.borders.images_imply_borders),
            }),
            merge: Some(MergeSection {
                cell_similarity: Some(config.merge.cell_similarity),
                header_similarity: Some(config.merge.header_similarity),
                max_width_delta: Some(config.merge.max_width_delta),
            }),
            scanned: Some(ScannedSection {
                enabled: Some(config.scanned.enabled),
                sample_pages: Some(config.scanned.sample_pages),
                max_text_density: Some(config.scanned.max_text_density),
                min_image_coverage: Some(config.scanned.min_image_coverage),
            }),
            backends: Some(BackendsSection {
                line_scale: Some(config.backends.line_scale),
                snap_tolerance: Some(config.backends.snap_tolerance),
                row_tolerance: Some(config.backends.row_tolerance),
                min_column_gap: Some(config.backends.min_column_gap),
                min_rows: Some(config.backends.min_rows),
                external: (!external.is_empty()).then(|| external.to_vec()),
            }),
        }
    }

    /// Configured external backends, if any.
    pub fn external_backends(&self) -> &[ExternalBackendConfig] {
        self.backends
            .as_ref()
            .and_then(|b| b.external.as_deref())
            .unwrap_or(&[])
    }
}

/// Platform config directory path: `<config_dir>/tablestitch/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tablestitch").join("config.toml"))
}

/// Load config by cascading CWD `.tablestitch.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".tablestitch.toml"));
    overlay_opt(platform, cwd).unwrap_or_default()
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    read_from_path(path).ok()
}

/// Like [`load_from_path`] but reports why the file could not be used.
pub fn read_from_path(path: &Path) -> Result<ConfigFile, ConfigFileError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    base.overlay(overlay)
}
