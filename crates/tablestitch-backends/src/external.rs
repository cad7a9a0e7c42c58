use std::io::ErrorKind;
use std::process::Command;

use tablestitch_core::{
    BackendError, BackendKind, ExternalBackendConfig, PageRequest, RawTable, TableBackend,
};

/// A backend implemented by another program.
///
/// The program is run once per page as
/// `program [args..] --page N --mode bordered|borderless <path>` and must
/// print a JSON array of tables on stdout:
///
/// ```json
/// [{"cells": [["a", "b"], ["1", 2]], "bbox": {"x0": 0, "y0": 0, "x1": 1, "y1": 1}, "accuracy": 97.5}]
/// ```
///
/// A program that cannot be started makes the backend unavailable; a
/// non-zero exit or malformed output is an extraction failure.
#[derive(Debug, Clone)]
pub struct ExternalBackend {
    kind: BackendKind,
    program: String,
    args: Vec<String>,
}

impl ExternalBackend {
    pub fn new(kind: BackendKind, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind,
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl From<&ExternalBackendConfig> for ExternalBackend {
    fn from(config: &ExternalBackendConfig) -> Self {
        Self::new(config.kind, config.program.clone(), config.args.clone())
    }
}

impl TableBackend for ExternalBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn extract(&self, request: &PageRequest<'_>) -> Result<Vec<RawTable>, BackendError> {
        let page = request.page_number();
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--page")
            .arg(page.to_string())
            .arg("--mode")
            .arg(request.mode.as_str())
            .arg(request.path)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    BackendError::Unavailable(format!("{}: {}", self.program, e))
                }
                _ => BackendError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Extraction(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let mut tables: Vec<RawTable> = serde_json::from_slice(&output.stdout)?;
        let default_tag = format!("{}_{}", self.kind, request.mode.as_str());
        for table in &mut tables {
            if table.mode_tag.is_empty() {
                table.mode_tag = default_tag.clone();
            }
        }

        tracing::debug!(
            program = %self.program,
            page,
            tables = tables.len(),
            "external extraction"
        );
        Ok(tables)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::Path;
    use tablestitch_core::{BBox, Cell, ExtractionMode, PageLayout, text_row};

    fn sh(kind: BackendKind, script: &str) -> ExternalBackend {
        // `sh -c script name args..` binds the trailing arguments to $1..
        ExternalBackend::new(
            kind,
            "sh",
            vec!["-c".to_string(), script.to_string(), "backend".to_string()],
        )
    }

    fn run(backend: &ExternalBackend, page_number: u32) -> Result<Vec<RawTable>, BackendError> {
        let page = PageLayout::new(page_number, 600.0, 800.0);
        backend.extract(&PageRequest {
            path: Path::new("report.pdf"),
            page: &page,
            mode: ExtractionMode::Bordered,
        })
    }

    #[test]
    fn test_parses_stdout_json() {
        let backend = sh(
            BackendKind::Lattice,
            r#"echo "[{\"cells\": [[\"page\", \"$2\"], [\"mode\", \"$4\"], [\"file\", \"$5\"]], \"accuracy\": 91.5, \"bbox\": {\"x0\": 1, \"y0\": 2, \"x1\": 3, \"y1\": 4}}]""#,
        );
        let tables = run(&backend, 7).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0].cells,
            vec![
                text_row(&["page", "7"]),
                text_row(&["mode", "bordered"]),
                text_row(&["file", "report.pdf"]),
            ]
        );
        assert_eq!(tables[0].accuracy, Some(91.5));
        assert_eq!(tables[0].bbox, Some(BBox::new(1.0, 2.0, 3.0, 4.0)));
        assert_eq!(tables[0].mode_tag, "lattice_bordered");
    }

    #[test]
    fn test_mixed_cell_types_and_own_tag() {
        let backend = sh(
            BackendKind::Stream,
            r#"echo '[{"cells": [["n", 3, true, null]], "mode_tag": "custom"}]'"#,
        );
        let tables = run(&backend, 1).unwrap();
        assert_eq!(
            tables[0].cells[0],
            vec![Cell::from("n"), Cell::Number(3.0), Cell::Bool(true), Cell::Null]
        );
        assert_eq!(tables[0].mode_tag, "custom");
    }

    #[test]
    fn test_nonzero_exit_is_extraction_error() {
        let backend = sh(BackendKind::Stream, "echo 'no pdf backend' >&2; exit 3");
        match run(&backend, 1) {
            Err(BackendError::Extraction(msg)) => assert!(msg.contains("no pdf backend"), "{msg}"),
            other => panic!("expected extraction error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_output_is_json_error() {
        let backend = sh(BackendKind::Stream, "echo 'not json'");
        assert!(matches!(run(&backend, 1), Err(BackendError::Json(_))));
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let backend = ExternalBackend::new(
            BackendKind::Lattice,
            "tablestitch-no-such-program",
            Vec::new(),
        );
        assert!(matches!(run(&backend, 1), Err(BackendError::Unavailable(_))));
    }
}
