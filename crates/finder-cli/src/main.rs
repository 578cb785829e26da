use clap::{Parser, Subcommand};
use finder_core::config::EngineConfig;
use finder_core::engine::Engine;
use finder_core::judge::JudgeService;
use finder_core::providers::ledger::HttpLedgerWriter;
use finder_core::providers::llm::openai::OpenAiClient;
use finder_core::providers::permissions::HttpPermissionSource;
use finder_core::providers::submissions::HttpSubmissionSource;
use finder_core::storage::Store;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "finder",
    version,
    about = "Scores wallet-attributed predictions and pushes reward weights"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one scoring iteration (or keep iterating with --interval-secs)
    Run(RunArgs),
    /// Sample unevaluated submissions and judge them in a new round
    Validate(ValidateArgs),
    /// Re-score a completed round without touching the ledger
    Score(ScoreArgs),
    /// Print evaluation statistics from the local store
    Stats(StatsArgs),
    /// Write a sample configuration file
    Init(InitArgs),
    Version,
}

#[derive(Parser, Clone)]
struct RunArgs {
    #[arg(long, default_value = "finder.yaml")]
    config: PathBuf,
    #[arg(long, default_value = ".finder/finder.db")]
    db: PathBuf,

    /// Compute and print everything, write and push nothing
    #[arg(long)]
    dry_run: bool,

    /// Keep running, sleeping this many seconds between iterations
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Bearer token for the submission API
    #[arg(long, env = "FINDER_API_TOKEN", hide_env_values = true, default_value = "")]
    api_token: String,
}

#[derive(Parser, Clone)]
struct ValidateArgs {
    #[arg(long, default_value = "finder.yaml")]
    config: PathBuf,
    #[arg(long, default_value = ".finder/finder.db")]
    db: PathBuf,

    /// Override the per-address sample quota
    #[arg(long)]
    sample_size: Option<usize>,

    /// Fixed RNG seed for reproducible sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Override the fetch lookback window in hours
    #[arg(long)]
    lookback_hours: Option<u64>,

    /// Evaluator label recorded on the round
    #[arg(long, default_value = "automated")]
    evaluator: String,

    /// Bearer token for the submission API
    #[arg(long, env = "FINDER_API_TOKEN", hide_env_values = true, default_value = "")]
    api_token: String,

    /// API key for the judge model endpoint
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    judge_api_key: String,
}

#[derive(Parser, Clone)]
struct ScoreArgs {
    #[arg(long, default_value = "finder.yaml")]
    config: PathBuf,
    #[arg(long, default_value = ".finder/finder.db")]
    db: PathBuf,

    /// Round id to score; defaults to the latest completed round
    #[arg(long)]
    round: Option<i64>,
}

#[derive(Parser, Clone)]
struct StatsArgs {
    #[arg(long, default_value = ".finder/finder.db")]
    db: PathBuf,
}

#[derive(Parser, Clone)]
struct InitArgs {
    #[arg(long, default_value = "finder.yaml")]
    config: PathBuf,
}

mod exit_codes {
    pub const OK: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            if e.downcast_ref::<finder_core::errors::ConfigError>().is_some() {
                exit_codes::CONFIG_ERROR
            } else {
                exit_codes::FAILURE
            }
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => cmd_run(args).await,
        Command::Validate(args) => cmd_validate(args).await,
        Command::Score(args) => cmd_score(args).await,
        Command::Stats(args) => cmd_stats(args).await,
        Command::Init(args) => cmd_init(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<EngineConfig> {
    finder_core::config::load_config(path).map_err(anyhow::Error::new)
}

fn build_engine(
    db_path: &std::path::Path,
    cfg: EngineConfig,
    api_token: String,
) -> anyhow::Result<Engine> {
    ensure_parent_dir(db_path)?;
    let store = Store::open(db_path)?;
    store.init_schema()?;

    let submissions = Arc::new(HttpSubmissionSource::new(
        &cfg.api.base_url,
        cfg.api.page_limit,
        api_token,
    ));
    let permissions = Arc::new(HttpPermissionSource::new(
        &cfg.ledger.endpoint,
        &cfg.ledger.permission_id,
    ));
    let ledger = Arc::new(HttpLedgerWriter::new(
        &cfg.ledger.endpoint,
        &cfg.ledger.permission_id,
    ));

    Ok(Engine {
        store,
        submissions,
        permissions,
        ledger,
        config: cfg,
    })
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<i32> {
    let cfg = load_config(&args.config)?;
    let engine = build_engine(&args.db, cfg, args.api_token)?;

    match args.interval_secs {
        None => {
            engine.run_iteration(args.dry_run).await?;
        }
        Some(secs) => loop {
            // One bad iteration must not kill the scheduler.
            if let Err(e) = engine.run_iteration(args.dry_run).await {
                tracing::error!(error = %e, "iteration failed");
            }
            tracing::info!(sleep_secs = secs, "waiting for next iteration");
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
        },
    }
    Ok(exit_codes::OK)
}

async fn cmd_validate(args: ValidateArgs) -> anyhow::Result<i32> {
    let mut cfg = load_config(&args.config)?;
    if let Some(n) = args.sample_size {
        cfg.scoring.sample_size = n;
    }
    if let Some(s) = args.seed {
        cfg.scoring.seed = Some(s);
    }
    if let Some(h) = args.lookback_hours {
        cfg.schedule.validation_lookback_hours = h;
    }

    let client = Arc::new(OpenAiClient::new(&cfg.judge, args.judge_api_key));
    let judge = Arc::new(JudgeService::new(client, &cfg.judge));
    let engine = build_engine(&args.db, cfg, args.api_token)?;

    let summary = engine.run_validation(judge, &args.evaluator).await?;
    println!(
        "round {}: sampled {}, valid {}, invalid {}, failed {}",
        summary.round_id, summary.sampled, summary.evaluated, summary.invalid, summary.failed
    );
    Ok(exit_codes::OK)
}

async fn cmd_score(args: ScoreArgs) -> anyhow::Result<i32> {
    let cfg = load_config(&args.config)?;
    let engine = build_engine(&args.db, cfg, String::new())?;

    let round_id = match args.round {
        Some(id) => id,
        None => engine
            .store
            .latest_completed_round()?
            .map(|r| r.id)
            .ok_or_else(|| anyhow::anyhow!("no completed round to score"))?,
    };

    let quality = engine.score_round(round_id).await?;
    println!("round {} quality scores", round_id);
    for (address, score) in &quality {
        println!(
            "  {:<50} base {:.4}  invalid {}  penalty {:.4}  final {:.4}",
            address, score.base, score.invalid_count, score.penalty, score.final_score
        );
    }
    Ok(exit_codes::OK)
}

async fn cmd_stats(args: StatsArgs) -> anyhow::Result<i32> {
    let store = Store::open(&args.db)?;
    store.init_schema()?;
    let stats = store.stats()?;

    println!("completed rounds    : {}", stats.completed_rounds);
    println!("total evaluations   : {}", stats.total_evaluations);
    println!("invalid evaluations : {}", stats.invalid_evaluations);
    if stats.total_evaluations > stats.invalid_evaluations {
        println!("average valid score : {:.2}", stats.average_valid_score);
    } else {
        println!("average valid score : n/a");
    }

    let finders = store.finders()?;
    let active = finders.iter().filter(|f| f.active).count();
    let permitted = finders.iter().filter(|f| f.has_permission).count();
    println!(
        "finders             : {} known, {} active, {} permitted",
        finders.len(),
        active,
        permitted
    );
    Ok(exit_codes::OK)
}

async fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    if args.config.exists() {
        eprintln!("note: {} already exists", args.config.display());
    } else {
        ensure_parent_dir(&args.config)?;
        finder_core::config::write_sample_config(&args.config)?;
        eprintln!("created {}", args.config.display());
    }
    Ok(exit_codes::OK)
}

fn ensure_parent_dir(path: &std::path::Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
