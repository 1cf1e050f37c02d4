//! Settings Probe - inspect how settings are located in exported policies
//!
//! Usage:
//!   settings-probe flatten policy.json
//!   settings-probe locate policy.json --catalog settings.yaml
//!   settings-probe evaluate exports/ --catalog settings.yaml
//!   settings-probe learn exports/ --catalog settings.yaml
//!
//! Documents are either `{ "id", "kind", "template_family", "content" }`
//! wrappers or raw policy JSON (the file stem becomes the id).
//!
//! Environment variables:
//!   SETTINGS_PROBE_CONFIG - engine configuration file (YAML)
//!   SETTINGS_CATALOG_TOKEN - bearer token for the definition catalog
//!   RUST_LOG - log filter (overrides --log-level)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use extraction_engine::{
    BatchEvaluator, CancellationFlag, EngineConfig, ExtractionEngine, LearnedPathTable, PathLearner,
};
use settings_core::catalog::CatalogTree;
use settings_core::{PolicyDocument, SettingDefinition};

#[derive(Parser, Debug)]
#[command(name = "settings-probe")]
#[command(about = "Locate, decode and validate settings in exported policy documents")]
#[command(version)]
struct Args {
    /// Engine configuration file (YAML)
    #[arg(long, global = true, env = "SETTINGS_PROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Decode symbolic values without contacting the definition catalog
    #[arg(long, global = true)]
    offline: bool,

    /// Bearer token for the definition catalog
    #[arg(long, global = true, env = "SETTINGS_CATALOG_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the flattened settings-catalog tree of a document
    Flatten {
        document: PathBuf,
    },

    /// Run the strategy cascade for every catalog setting against one document
    Locate {
        document: PathBuf,

        /// Setting catalog (JSON or YAML list)
        #[arg(long)]
        catalog: PathBuf,

        /// Document kind for raw documents
        #[arg(long)]
        kind: Option<String>,

        /// Template family for raw documents
        #[arg(long)]
        family: Option<String>,
    },

    /// Evaluate every catalog setting against every document in a directory
    Evaluate {
        documents: PathBuf,

        #[arg(long)]
        catalog: PathBuf,

        /// Learned path table to promote before evaluating
        #[arg(long)]
        learned: Option<PathBuf>,

        /// Maximum concurrent evaluations (defaults to the configured value)
        #[arg(long)]
        max_concurrency: Option<usize>,
    },

    /// Learn confirmed locations from a directory of historical documents
    Learn {
        documents: PathBuf,

        #[arg(long)]
        catalog: PathBuf,

        /// Write the learned path table here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_yaml(&yaml).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if args.token.is_some() {
        config.decoder.bearer_token = args.token.clone();
    }

    // Initialize logging
    let level = args.log_level.clone().unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{level},extraction_engine={level},symbol_resolver={level}"))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Flatten { document } => {
            let document = load_document(&document, None, None)?;
            let Some(tree) = CatalogTree::from_document(&document.content) else {
                bail!("{} has no settings-catalog instances", document.id);
            };
            let out = json!({
                "document_id": document.id,
                "shape": tree.shape.as_str(),
                "nodes": tree.nodes,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Locate { document, catalog, kind, family } => {
            let document = load_document(&document, kind.as_deref(), family.as_deref())?;
            let settings = load_catalog(&catalog)?;
            let engine = ExtractionEngine::from_config(&config, args.offline);

            for setting in settings.iter().filter(|s| s.applies_to(&document)) {
                let evaluation = engine.evaluate(&document, setting).await;
                println!("{}", serde_json::to_string(&evaluation)?);
            }
        }

        Command::Evaluate { documents, catalog, learned, max_concurrency } => {
            let documents = load_documents(&documents)?;
            let settings = load_catalog(&catalog)?;
            let mut engine = ExtractionEngine::from_config(&config, args.offline);
            if let Some(path) = learned {
                let table: LearnedPathTable = serde_json::from_str(
                    &std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?,
                )
                .with_context(|| format!("parsing learned path table {}", path.display()))?;
                engine = engine.promote(&table);
            }

            let cancel = CancellationFlag::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing in-flight evaluations");
                    on_signal.cancel();
                }
            });

            let batch = BatchEvaluator::new(
                Arc::new(engine),
                max_concurrency.unwrap_or(config.batch.max_concurrency),
            );
            let report = batch.evaluate_all(&documents, &settings, &cancel).await;
            for evaluation in &report.evaluations {
                println!("{}", serde_json::to_string(&evaluation.check)?);
            }
            info!(
                evaluated = report.evaluated,
                compliant = report.compliant,
                non_compliant = report.non_compliant,
                errors = report.errors,
                skipped = report.skipped,
                "Done"
            );
        }

        Command::Learn { documents, catalog, output } => {
            let documents = load_documents(&documents)?;
            let settings = load_catalog(&catalog)?;
            let engine = ExtractionEngine::new(&config);

            let report = PathLearner::new(config.learning.clone()).learn(engine.cascade(), &documents, &settings);
            let table = serde_json::to_string_pretty(&report.table)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, table).with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), entries = report.table.len(), "Wrote learned path table");
                }
                None => println!("{table}"),
            }
            for proposal in &report.proposals {
                println!("{}", serde_json::to_string(proposal)?);
            }
        }
    }

    Ok(())
}

/// Load one document, unwrapping `{ id, kind, content }` wrappers.
fn load_document(path: &Path, kind: Option<&str>, family: Option<&str>) -> Result<PolicyDocument> {
    let body = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&body).with_context(|| format!("parsing {}", path.display()))?;

    let is_wrapper = ["id", "kind", "content"].iter().all(|k| value.get(k).is_some());
    let mut document = if is_wrapper {
        serde_json::from_value(value).with_context(|| format!("parsing wrapper {}", path.display()))?
    } else {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        PolicyDocument::new(id, kind.unwrap_or("unknown"), value)
    };
    if let Some(family) = family {
        document.template_family = Some(family.to_string());
    }
    Ok(document)
}

/// Load every `.json` document in a directory, in file name order.
fn load_documents(dir: &Path) -> Result<Vec<PolicyDocument>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        match load_document(&path, None, None) {
            Ok(document) => documents.push(document),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
        }
    }
    info!(count = documents.len(), dir = %dir.display(), "Loaded documents");
    Ok(documents)
}

/// Load the setting catalog from JSON or YAML, chosen by extension.
fn load_catalog(path: &Path) -> Result<Vec<SettingDefinition>> {
    let body = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_yaml = path
        .extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    let settings: Vec<SettingDefinition> = if is_yaml {
        serde_yaml::from_str(&body).with_context(|| format!("parsing catalog {}", path.display()))?
    } else {
        serde_json::from_str(&body).with_context(|| format!("parsing catalog {}", path.display()))?
    };
    Ok(settings)
}
