//! Table reconciliation across multiple extraction backends.
//!
//! Classifies each page as bordered or borderless from its vector drawings,
//! runs the matching backend with fallback to the others, refines and
//! deduplicates the resulting tables, and stitches tables that continue
//! across page breaks using Levenshtein header matching.

pub mod borders;
pub mod context;
pub mod dedupe;
pub mod extractor;
pub mod merge;
pub mod orchestrator;
pub mod refine;
pub mod registry;
pub mod scanned;
pub mod similarity;

use std::path::Path;

use tablestitch_core::{ExtractError, ExtractionReport, PageSource, TableExtractionConfigBuilder};

// Re-export for convenience
pub use borders::{BorderSignals, border_signals, detect_table_borders};
pub use context::table_context;
pub use dedupe::dedupe_overlapping;
pub use extractor::{DocumentClassification, PageClassification, TableExtractor};
pub use merge::{MergeError, merge_cross_page_tables, merge_tables, tables_related};
pub use orchestrator::{PageExtraction, PageExtractor};
pub use refine::refine_table;
pub use registry::BackendRegistry;
pub use scanned::is_scanned_document;
pub use similarity::{headers_similar, string_similarity};

/// Extract tables from one document in a single call.
///
/// Validates `config` first, so an out-of-range setting is reported as
/// [`ExtractError::Config`] before the document is touched.
pub fn extract_tables(
    path: &Path,
    source: &dyn PageSource,
    config: TableExtractionConfigBuilder,
    registry: BackendRegistry,
) -> Result<ExtractionReport, ExtractError> {
    let config = config.build()?;
    TableExtractor::new(config, registry).extract_document(path, source)
}
