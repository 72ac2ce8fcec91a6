use anyhow::{Context, Result};
use clap::Parser;
use compose::{Overrides, build_from_config};
use heft_common::observability::{LogConfig, init_logging};
use heft_config::{HeftConfig, HeftConfigLoader, discover_config_file};
use heft_pipeline::Outcome;
use heft_runtime::HeftRuntime;
use std::path::PathBuf;
use std::time::Duration;
mod compose;

const DEFAULT_QUERY: &str = "weight of nike air force 1 in box";

/// Find a product's weight: search the web, read the top pages, ask a model.
#[derive(Debug, Parser)]
#[command(name = "heft", version)]
struct Cli {
    /// What to look up.
    #[arg(default_value = DEFAULT_QUERY)]
    query: String,

    /// YAML config file. Without it ./heft.yaml and the user config dir are tried.
    #[arg(long, short, env = "HEFT_CONFIG")]
    config: Option<PathBuf>,

    /// Number of search results to consider.
    #[arg(long)]
    candidates: Option<usize>,

    /// Print the whole outcome as JSON.
    #[arg(long)]
    json: bool,

    /// Probe the model endpoint before searching.
    #[arg(long)]
    health_check: bool,
}

fn load_config(cli: &Cli) -> Result<HeftConfig> {
    let loader = match (&cli.config, discover_config_file()) {
        (Some(path), _) => HeftConfigLoader::new().with_file(path),
        (None, Some(found)) => HeftConfigLoader::new().with_optional_file(found),
        (None, None) => HeftConfigLoader::new(),
    };
    Ok(loader.load()?)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = load_config(&cli).context("loading configuration")?;

    let log_path = init_logging(LogConfig {
        app_name: "heft",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;
    tracing::debug!(log = %log_path.display(), config = ?cfg, "app.start");

    let runtime = HeftRuntime::build("heft-worker", None)?;
    let handle = runtime.handle();
    let cancel = handle.cancellation();
    handle.cancel_on_ctrl_c();

    let result = runtime.block_on(async {
        let orchestrator = build_from_config(
            &cfg,
            Overrides {
                candidates: cli.candidates,
                health_check: cli.health_check,
            },
        )
        .await?;
        orchestrator
            .run(&cli.query, &cancel)
            .await
            .map_err(anyhow::Error::from)
    });
    runtime.shutdown(Duration::from_millis(250));

    let outcome = result?;
    report(&outcome, cli.json)
}

fn report(outcome: &Outcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    match outcome {
        Outcome::Found { url, judgment } => {
            println!("Found weight: {} grams", judgment.weight_grams);
            println!("{}", serde_json::to_string(judgment)?);
            println!("source: {url}");
            if judgment.is_weak() {
                println!("(the model was not sure about this one)");
            }
        }
        Outcome::NotFound { judged } => {
            println!("No weight found after judging {judged} page(s).");
        }
    }
    Ok(())
}
