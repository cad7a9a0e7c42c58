//! Table extraction backends.
//!
//! Three native backends work purely on a [`PageLayout`]'s drawings and
//! positioned words:
//!
//! - [`LatticeBackend`] builds grids from ruling lines,
//! - [`StreamBackend`] infers columns from whitespace alignment,
//! - [`HeuristicBackend`] splits text rows at wide gaps.
//!
//! [`ExternalBackend`] delegates to another program that prints tables as
//! JSON, so a dedicated extractor can take the place of a native backend.
//!
//! [`PageLayout`]: tablestitch_core::PageLayout

mod layout;
mod rules;

pub mod external;
pub mod heuristic;
pub mod lattice;
pub mod stream;

use std::sync::Arc;

use tablestitch_core::{BackendSettings, TableBackend};

pub use external::ExternalBackend;
pub use heuristic::HeuristicBackend;
pub use lattice::LatticeBackend;
pub use stream::StreamBackend;

/// One instance of each native backend, in fallback order.
pub fn native_backends(settings: &BackendSettings) -> Vec<Arc<dyn TableBackend>> {
    vec![
        Arc::new(LatticeBackend::new(settings.clone())),
        Arc::new(StreamBackend::new(settings.clone())),
        Arc::new(HeuristicBackend::new(settings.clone())),
    ]
}
