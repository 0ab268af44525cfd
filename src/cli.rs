//! Command-line interface.
//!
//! Subcommand shape ported from `original_source/src/agent_rad_tools/cli.py`;
//! `clap`'s derive `Parser`/`Subcommand` style grounded in the
//! `dicom_download_cli` example from the retrieval pack.

use crate::audit;
use crate::config::Config;
use crate::keyfile::read_key_file;
use crate::orchestrator::load_studies;
use crate::pacs_client::PacsClient;
use crate::sanitize::sanitize_path;
use crate::verify::verify_project;
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "rad-loader")]
#[command(about = "PID-safe research image loader for a hospital PACS")]
pub struct Cli {
    /// Path to the YAML config file.
    #[arg(long, default_value = "config/ahjo.yaml", global = true)]
    config: Utf8PathBuf,

    /// Human-readable output (default: JSON).
    #[arg(long, global = true)]
    human: bool,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Test the PACS connection with a C-ECHO.
    Echo,
    /// Query an accession number via C-FIND.
    Query { accession: String },
    /// Load studies from PACS into a project.
    Load {
        project: String,
        accessions: Vec<String>,
        /// File with accession numbers, one per line (`#` starts a comment).
        #[arg(long, short = 'f')]
        file: Option<Utf8PathBuf>,
        /// Query only, do not retrieve images.
        #[arg(long)]
        dry_run: bool,
    },
    /// Report how many cases a project has loaded so far, and any outliers.
    Status { project: String },
    /// View the audit log.
    Audit {
        project: Option<String>,
        #[arg(long)]
        all: bool,
        #[arg(long, default_value_t = 20)]
        last: u32,
    },
}

/// Parse `argv`, run the requested subcommand, and return the process exit
/// code. Never panics on user error — every failure path returns 1.
pub fn run() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run_command(&cli) {
        Ok(value) => {
            print_output(&value, cli.human);
            0
        }
        Err(message) => {
            print_output(&json!({"status": "error", "error": message}), cli.human);
            1
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}

fn run_command(cli: &Cli) -> Result<Value, String> {
    let config = load_config(&cli.config)?;

    match &cli.command {
        Command::Echo => cmd_echo(&config),
        Command::Query { accession } => cmd_query(&config, accession),
        Command::Load {
            project,
            accessions,
            file,
            dry_run,
        } => cmd_load(&config, project, accessions, file.as_deref(), *dry_run),
        Command::Status { project } => cmd_status(&config, project),
        Command::Audit { project, all, last } => cmd_audit(&config, project.as_deref(), *all, *last),
    }
}

fn load_config(path: &Utf8Path) -> Result<Config, String> {
    if !path.exists() {
        return Err(format!("config file not found: {path}"));
    }
    Config::from_file(path).map_err(|e| e.to_string())
}

fn cmd_echo(config: &Config) -> Result<Value, String> {
    let client = PacsClient::new(
        &config.pacs.host,
        config.pacs.port,
        config.scp.ae_title.clone(),
        config.pacs.ae_title.clone(),
    );
    let ok = client.echo().map_err(|e| e.to_string())?;
    if !ok {
        return Err("echo failed".to_string());
    }
    Ok(json!({
        "status": "ok",
        "pacs": format!("{}:{}", config.pacs.host, config.pacs.port),
        "ae_title": config.pacs.ae_title.as_str(),
        "echo": "success",
    }))
}

fn cmd_query(config: &Config, accession: &str) -> Result<Value, String> {
    let client = PacsClient::new(
        &config.pacs.host,
        config.pacs.port,
        config.scp.ae_title.clone(),
        config.pacs.ae_title.clone(),
    );
    let studies = client
        .find_by_accession(accession)
        .map_err(|e| e.to_string())?;
    Ok(json!({
        "status": "ok",
        "accession": accession,
        "results": studies,
    }))
}

fn cmd_load(
    config: &Config,
    project: &str,
    cli_accessions: &[String],
    file: Option<&Utf8Path>,
    dry_run: bool,
) -> Result<Value, String> {
    let mut accessions = cli_accessions.to_vec();
    if let Some(file) = file {
        if !file.exists() {
            return Err(format!("accession file not found: {file}"));
        }
        let text = fs_err::read_to_string(file).map_err(|e| e.to_string())?;
        accessions.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }

    if accessions.is_empty() {
        return Err("no accession numbers provided".to_string());
    }

    let (results, verification) =
        load_studies(config, project, &accessions, dry_run).map_err(|e| e.to_string())?;

    Ok(json!({
        "status": "ok",
        "project": project,
        "results": results,
        "verification": verification,
    }))
}

fn cmd_status(config: &Config, project: &str) -> Result<Value, String> {
    let project_dir = config.output.base_dir.join(sanitize_path(project));
    if !project_dir.exists() {
        return Ok(json!({
            "status": "ok",
            "project": project,
            "exists": false,
            "cases": 0,
        }));
    }

    let entries = read_key_file(&project_dir.join("key.csv")).map_err(|e| e.to_string())?;
    let total_images: u32 = entries.iter().map(|e| e.image_count).sum();
    let outliers = verify_project(&entries);

    Ok(json!({
        "status": "ok",
        "project": project,
        "exists": true,
        "cases": entries.len(),
        "total_images": total_images,
        "entries": entries,
        "outliers": outliers,
    }))
}

fn cmd_audit(
    config: &Config,
    project: Option<&str>,
    all_projects: bool,
    last: u32,
) -> Result<Value, String> {
    if project.is_none() && !all_projects {
        return Err("specify a project name or use --all".to_string());
    }
    let project = if all_projects { None } else { project };
    let entries = audit::query(&config.output.base_dir, project, last).map_err(|e| e.to_string())?;
    Ok(json!({
        "status": "ok",
        "entries": entries,
    }))
}

fn print_output(value: &Value, human: bool) {
    if human {
        print_human(value, 0);
    } else {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

fn print_human(value: &Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                match v {
                    Value::Array(items) => {
                        println!("{pad}{k}:");
                        for item in items {
                            print_human(item, indent + 1);
                            if matches!(item, Value::Object(_)) {
                                println!();
                            }
                        }
                    }
                    Value::Object(_) => {
                        println!("{pad}{k}:");
                        print_human(v, indent + 1);
                    }
                    other => println!("{pad}{k}: {}", display_scalar(other)),
                }
            }
        }
        other => println!("{pad}{}", display_scalar(other)),
    }
}

fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
