use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use tablestitch_backends::{ExternalBackend, native_backends};
use tablestitch_core::config_file::{self, ConfigFile};
use tablestitch_core::{TableExtractionConfig, TableExtractionConfigBuilder};
use tablestitch_reconcile::BackendRegistry;

/// Environment variable naming a config file, used when `--config` is absent.
pub const CONFIG_ENV: &str = "TABLESTITCH_CONFIG";

/// Flags that override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ExtractionFlags {
    /// Backend to use: auto, lattice, stream or heuristic
    /// (camelot, tabula and pdfplumber are accepted as aliases)
    #[arg(long, value_name = "METHOD")]
    pub method: Option<String>,

    /// Do not try other backends when the primary one finds nothing
    #[arg(long)]
    pub no_fallback: bool,

    /// Keep the first row as data instead of promoting it to headers
    #[arg(long)]
    pub no_headers: bool,

    /// Skip blank-row/column pruning and whitespace normalization
    #[arg(long)]
    pub no_refine: bool,

    /// Do not stitch tables that continue across page breaks
    #[arg(long)]
    pub no_merge: bool,

    /// Minimum native accuracy (percent) for lattice tables
    #[arg(long, value_name = "PERCENT")]
    pub min_confidence: Option<f64>,

    /// TOML config file layered over the default config locations
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl ExtractionFlags {
    fn apply(&self, mut builder: TableExtractionConfigBuilder) -> TableExtractionConfigBuilder {
        if let Some(method) = &self.method {
            builder = builder.method(method);
        }
        if self.no_fallback {
            builder = builder.fallback_to_heuristic(false);
        }
        if self.no_headers {
            builder = builder.header_extraction(false);
        }
        if self.no_refine {
            builder = builder.refine(false);
        }
        if self.no_merge {
            builder = builder.merge_cross_page(false);
        }
        if let Some(percent) = self.min_confidence {
            builder = builder.min_confidence(percent);
        }
        builder
    }
}

/// Effective configuration of one CLI run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: TableExtractionConfig,
    pub file: ConfigFile,
}

impl Settings {
    /// Resolve configuration: flags > `--config`/`TABLESTITCH_CONFIG` >
    /// cascaded config files > defaults.
    pub fn load(flags: &ExtractionFlags) -> anyhow::Result<Self> {
        let explicit = flags
            .config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let file = layered_file(config_file::load_config(), explicit.as_deref())?;
        Self::resolve(file, flags)
    }

    pub fn resolve(file: ConfigFile, flags: &ExtractionFlags) -> anyhow::Result<Self> {
        let base = file.to_config()?;
        let config = flags
            .apply(TableExtractionConfigBuilder::from_config(base))
            .build()?;
        Ok(Self { config, file })
    }

    /// Native backends, with external programs replacing the native backend
    /// of the same kind.
    pub fn registry(&self) -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        for backend in native_backends(&self.config.backends) {
            registry.register(backend);
        }
        for external in self.file.external_backends() {
            tracing::info!(
                backend = %external.kind,
                program = %external.program,
                "using external backend"
            );
            registry.register(Arc::new(ExternalBackend::from(external)));
        }
        registry
    }

    /// The effective settings as a config file, for display.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        let file = ConfigFile::from_config(&self.config, self.file.external_backends());
        Ok(toml::to_string_pretty(&file)?)
    }
}

fn layered_file(base: ConfigFile, explicit: Option<&Path>) -> anyhow::Result<ConfigFile> {
    let Some(path) = explicit else {
        return Ok(base);
    };
    let file = config_file::read_from_path(path)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config_file::merge(base, file))
}
