use std::collections::HashMap;
use std::sync::Arc;

use tablestitch_core::{BackendKind, TableBackend};

/// The backends available for extraction, at most one per [`BackendKind`].
///
/// A kind with nothing registered is "unavailable": the orchestrator logs and
/// skips it instead of failing.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<BackendKind, Arc<dyn TableBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, backend: Arc<dyn TableBackend>) -> Self {
        self.register(backend);
        self
    }

    /// Add a backend under its own kind, replacing any previous one.
    pub fn register(&mut self, backend: Arc<dyn TableBackend>) {
        let kind = backend.kind();
        if self.backends.insert(kind, backend).is_some() {
            tracing::debug!(backend = %kind, "replaced registered backend");
        }
    }

    pub fn get(&self, kind: BackendKind) -> Option<&Arc<dyn TableBackend>> {
        self.backends.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Registered kinds in fallback order.
    pub fn kinds(&self) -> Vec<BackendKind> {
        BackendKind::FALLBACK_ORDER
            .into_iter()
            .filter(|k| self.backends.contains_key(k))
            .collect()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablestitch_core::{BackendError, PageRequest, RawTable};

    struct Named(BackendKind, &'static str);

    impl TableBackend for Named {
        fn kind(&self) -> BackendKind {
            self.0
        }

        fn extract(&self, _request: &PageRequest<'_>) -> Result<Vec<RawTable>, BackendError> {
            Ok(vec![RawTable {
                mode_tag: self.1.into(),
                ..RawTable::default()
            }])
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = BackendRegistry::new()
            .with(Arc::new(Named(BackendKind::Heuristic, "h")))
            .with(Arc::new(Named(BackendKind::Lattice, "l")));
        assert!(!registry.is_empty());
        assert!(registry.get(BackendKind::Stream).is_none());
        assert_eq!(registry.get(BackendKind::Lattice).unwrap().kind(), BackendKind::Lattice);
        assert_eq!(
            registry.kinds(),
            vec![BackendKind::Lattice, BackendKind::Heuristic]
        );
    }

    #[test]
    fn test_register_replaces_same_kind() {
        let mut registry = BackendRegistry::new();
        registry.register(Arc::new(Named(BackendKind::Stream, "native")));
        registry.register(Arc::new(Named(BackendKind::Stream, "external")));
        assert_eq!(registry.kinds(), vec![BackendKind::Stream]);

        let page = tablestitch_core::PageLayout::new(1, 10.0, 10.0);
        let request = PageRequest {
            path: std::path::Path::new("doc.pdf"),
            page: &page,
            mode: tablestitch_core::ExtractionMode::Borderless,
        };
        let raw = registry
            .get(BackendKind::Stream)
            .unwrap()
            .extract(&request)
            .unwrap();
        assert_eq!(raw[0].mode_tag, "external");
    }

    #[test]
    fn test_empty_registry() {
        assert!(BackendRegistry::default().is_empty());
    }
}
