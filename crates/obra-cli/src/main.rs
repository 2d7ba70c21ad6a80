//! `obra`: analyze a folder of construction-contract PDFs.
//!
//! ```text
//! obra ./obras/puente-norte -o salida/resultado.json -i salida/contrato.json
//! obra check salida/resultado.json
//! obra check --schema contract salida/contrato.json
//! ```
//!
//! Logs go to stderr (`RUST_LOG` overrides the level); stdout carries
//! only the summary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use obra_core::validation::{ANALYSIS_REQUIRED_KEYS, CONTRACT_REQUIRED_KEYS};
use obra_core::{
    validate_required_keys, validate_schema, Amount, AnalysisRecord, SchemaKind, SummaryDrift,
};
use obra_runtime::{PipelineBuilder, PipelineConfig, PipelineRun, PipelineState, ProviderRegistry};

#[derive(Parser)]
#[command(name = "obra")]
#[command(about = "Extract a construction contract from PDFs and compare its costs with the market")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Folder with the project's PDF documents
    carpeta: Option<PathBuf>,

    /// Where to write the final analysis JSON
    #[arg(short = 'o', long = "out")]
    out: Option<PathBuf>,

    /// Where to write the extracted contract JSON
    #[arg(short = 'i', long = "dump-intermedio")]
    dump_intermedio: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Check the extracted contract against its JSON Schema
    #[arg(long)]
    validate_extraction: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a JSON file against a record schema
    Check {
        /// JSON file to validate
        file: PathBuf,

        /// Record type of the file
        #[arg(short, long, value_enum, default_value_t = SchemaArg::Analysis)]
        schema: SchemaArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaArg {
    Contract,
    Analysis,
}

impl SchemaArg {
    fn required_keys(self) -> &'static [&'static str] {
        match self {
            SchemaArg::Contract => CONTRACT_REQUIRED_KEYS,
            SchemaArg::Analysis => ANALYSIS_REQUIRED_KEYS,
        }
    }
}

impl From<SchemaArg> for SchemaKind {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Contract => SchemaKind::Contract,
            SchemaArg::Analysis => SchemaKind::Analysis,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Check { file, schema }) => check(&file, schema),
        None => analyze(cli.run).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// File values first, then command-line overrides.
fn load_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(out) = &args.out {
        config.output_path = Some(out.clone());
    }
    if let Some(intermedio) = &args.dump_intermedio {
        config.intermediate_path = Some(intermedio.clone());
    }
    if args.validate_extraction {
        config.validate_extraction = true;
    }
    Ok(config)
}

async fn analyze(args: RunArgs) -> Result<ExitCode> {
    let Some(folder) = args.carpeta.clone() else {
        bail!("Missing folder argument. Usage: obra <CARPETA> [OPTIONS]");
    };
    let config = load_config(&args)?;
    tracing::debug!(config = ?config, "Configuration loaded");

    let provider = ProviderRegistry::with_defaults()
        .create(&config.provider_type, &config.provider)
        .with_context(|| format!("Failed to create '{}' provider", config.provider_type))?;

    let pipeline = PipelineBuilder::new()
        .provider(provider)
        .config(config)
        .build()
        .context("Invalid pipeline configuration")?;

    let outcome = match pipeline.run(&folder).await {
        Ok(outcome) => outcome,
        Err(failure) => {
            // Partial progress goes to stderr, stdout stays summary-only
            eprint!("{}", render_run(&failure.run));
            return Err(anyhow::Error::new(failure)
                .context(format!("Analysis of {} failed", folder.display())));
        }
    };

    print!("{}", render_summary(&outcome.record, &outcome.run));
    Ok(ExitCode::SUCCESS)
}

fn check(file: &Path, schema: SchemaArg) -> Result<ExitCode> {
    let text =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    if let Some(object) = value.as_object() {
        validate_required_keys(object, schema.required_keys())?;
    }

    match validate_schema(schema.into(), &value) {
        Ok(()) => {
            println!("{}: OK", file.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(errors) => {
            println!("{}: {} error(s)", file.display(), errors.len());
            for error in errors {
                println!("  - {}", error);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn amount(value: &Option<Amount>) -> String {
    match value {
        Some(Amount::Number(n)) => n.to_string(),
        Some(Amount::Other(Value::String(s))) => s.clone(),
        Some(Amount::Other(other)) => other.to_string(),
        None => "-".to_string(),
    }
}

fn seconds(duration: Option<std::time::Duration>) -> String {
    duration
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "-".to_string())
}

fn render_summary(record: &AnalysisRecord, run: &PipelineRun) -> String {
    let mut out = render_record(record, run.drift.as_ref());
    out.push_str(&render_run(run));
    out
}

fn render_record(record: &AnalysisRecord, drift: Option<&SummaryDrift>) -> String {
    let rg = &record.resumen_general;
    let mut out = String::new();

    out.push_str("RESUMEN GENERAL\n");
    out.push_str(&format!("  Costo en contrato:       {}\n", amount(&rg.costo_en_contrato)));
    out.push_str(&format!("  Precio estimado mercado: {}\n", amount(&rg.precio_estimado_mercado)));
    out.push_str(&format!("  Diferencia total:        {}\n", amount(&rg.diferencia_total)));
    out.push_str(&format!("  Diferencia %:            {}\n", amount(&rg.diferencia_porcentaje)));
    out.push_str(&format!("  Credibilidad:            {}\n", amount(&rg.credibilidad)));
    out.push_str(&format!(
        "  Partidas: {}  Alertas: {}  Recomendaciones: {}\n",
        record.partidas.len(),
        record.alertas.len(),
        record.recomendaciones.len()
    ));

    if let Some(drift) = drift {
        out.push_str(&format!(
            "  Aviso: el resumen no cuadra con las partidas (contrato {} / mercado {})\n",
            drift.contrato_partidas, drift.mercado_partidas
        ));
    }
    out
}

fn render_run(run: &PipelineRun) -> String {
    let mut out = String::from("\nTIEMPOS\n");
    out.push_str(&format!("  Extracción: {}\n", seconds(run.timings.extraction)));
    out.push_str(&format!("  Análisis:   {}\n", seconds(run.timings.analysis)));
    out.push_str(&format!("  Total:      {}\n", seconds(Some(run.timings.total))));

    let models = [&run.extraction_model, &run.analysis_model]
        .map(|m| m.as_deref().unwrap_or("-"));
    out.push_str(&format!("  Modelos:    {} / {}\n", models[0], models[1]));
    if run.state == PipelineState::Failed {
        out.push_str("  Estado:     fallido\n");
    }

    if let Some(path) = &run.intermediate_path {
        out.push_str(&format!("\nContrato intermedio en {}\n", path.display()));
    }
    if let Some(path) = &run.output_path {
        out.push_str(&format!("\nResultado guardado en {}\n", path.display()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("obra.yaml");
        fs::write(
            &config_path,
            "output_path: desde_archivo.json\nintermediate_path: inter.json\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "obra",
            "carpeta",
            "--config",
            config_path.to_str().unwrap(),
            "-o",
            "desde_cli.json",
            "--validate-extraction",
        ])
        .unwrap();
        let config = load_config(&cli.run).unwrap();

        assert_eq!(config.output_path, Some(PathBuf::from("desde_cli.json")));
        assert_eq!(config.intermediate_path, Some(PathBuf::from("inter.json")));
        assert!(config.validate_extraction);
    }

    #[test]
    fn test_check_subcommand_parses() {
        let cli = Cli::try_parse_from(["obra", "check", "--schema", "contract", "c.json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Check {
                schema: SchemaArg::Contract,
                ..
            })
        ));
    }

    #[test]
    fn test_check_reports_missing_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("final.json");
        fs::write(&file, json!({ "resumen_general": {}, "partidas": [] }).to_string()).unwrap();

        let err = check(&file, SchemaArg::Analysis).unwrap_err().to_string();
        assert!(err.contains("alertas"));
        assert!(err.contains("recomendaciones"));
    }

    #[test]
    fn test_check_contract_requires_partidas() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("contrato.json");
        fs::write(&file, json!({ "proyecto": {} }).to_string()).unwrap();

        let err = check(&file, SchemaArg::Contract).unwrap_err().to_string();
        assert!(err.contains("partidas"));
        assert!(!err.contains("proyecto"));

        fs::write(&file, json!({ "proyecto": {}, "partidas": [] }).to_string()).unwrap();
        assert!(check(&file, SchemaArg::Contract).is_ok());
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(&Some(Amount::Number(12.5))), "12.5");
        assert_eq!(amount(&Some(Amount::Other(json!("N/D")))), "N/D");
        assert_eq!(amount(&Some(Amount::Other(json!(null)))), "null");
        assert_eq!(amount(&None), "-");
    }

    #[test]
    fn test_summary_shows_non_numeric_amounts() {
        let record = AnalysisRecord::from_object(
            json!({
                "resumen_general": {
                    "costo_en_contrato": 1000.5,
                    "precio_estimado_mercado": "N/D"
                },
                "partidas": [],
                "alertas": ["Sin catálogo de conceptos"],
                "recomendaciones": []
            })
            .as_object()
            .unwrap()
            .clone(),
        )
        .unwrap();
        let drift = SummaryDrift {
            contrato_partidas: 900.0,
            mercado_partidas: 950.0,
            contrato_delta: Some(100.5),
            mercado_delta: None,
        };

        let summary = render_record(&record, Some(&drift));
        assert!(summary.contains("Costo en contrato:       1000.5"));
        assert!(summary.contains("Alertas: 1"));
        assert!(summary.contains("contrato 900 / mercado 950"));
        assert!(summary.contains("N/D"));
    }
}
