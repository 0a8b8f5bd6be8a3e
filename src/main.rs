use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use squad_sim::config::{PriceRange, SimulationConfig};
use squad_sim::sink::{write_distribution, write_price_curve, CsvSink, ResultSink};
use squad_sim::{summarize, PointsCache, RunReport, SimulationHarness, SqliteRepository, SquadBuilder};

#[derive(Parser)]
#[command(name = "squad-sim", about = "Monte Carlo squad cost vs. points simulator")]
struct Cli {
    /// TOML simulation config
    #[arg(long, env = "SQUAD_SIM_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Player database (overrides config)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Run seed (overrides config)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// CSV output path; stdout when absent
    #[arg(long, short, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and print one random squad
    Pick {
        #[arg(long)]
        target: Option<u32>,
    },
    /// Percentiles of season points per premium-player count at a fixed budget
    Distribution {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        target: Option<u32>,
    },
    /// Average season points per squad price over a budget range
    CostCurve {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long)]
        min: Option<u32>,
        #[arg(long)]
        max: Option<u32>,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    samples: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
}

impl RunArgs {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(samples) = self.samples {
            config.total_samples = samples;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "squad_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> Result<SimulationConfig> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(database) = &cli.database {
        config.database_path = database.clone();
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    match &cli.command {
        Command::Pick { target } => {
            config.target_value = target.unwrap_or(config.target_value);
        }
        Command::Distribution { run, target } => {
            run.apply(&mut config);
            config.target_value = target.unwrap_or(config.target_value);
        }
        Command::CostCurve { run, min, max } => {
            run.apply(&mut config);
            config.value_sampler_range = PriceRange {
                min: min.unwrap_or(config.value_sampler_range.min),
                max: max.unwrap_or(config.value_sampler_range.max),
            };
        }
    }
    config.validate().context("Invalid simulation config")?;
    Ok(config)
}

fn open_sink(output: &Option<PathBuf>) -> Result<Box<dyn ResultSink>> {
    Ok(match output {
        Some(path) => Box::new(
            CsvSink::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(CsvSink::new(io::stdout())),
    })
}

fn report_errors(report: &RunReport) {
    if report.errors.is_empty() {
        return;
    }
    warn!(
        failed = report.errors.len(),
        attempted = report.attempted(),
        "some simulation tasks failed"
    );
    for error in &report.errors {
        warn!(task = error.task, "{}", error.failure);
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let seed = config.seed.unwrap_or_else(rand::random);
    info!(seed, database = %config.database_path.display(), "starting");

    let repo = SqliteRepository::open(&config.database_path)?
        .with_draft_price_cap(config.draft_price_cap)
        .with_seed(seed);

    match &cli.command {
        Command::Pick { .. } => {
            let builder = SquadBuilder::new(&repo, config.build_params());
            let mut rng = SmallRng::seed_from_u64(seed);
            let squad = builder
                .build_squad(config.target_value, &mut rng)
                .context("Error occurred while creating a squad")?;
            println!("{squad}");
        }
        Command::Distribution { .. } => {
            let harness = SimulationHarness::new(
                &repo,
                config.build_params(),
                PointsCache::new(config.cache_ttl()),
                seed,
            );
            let target = config.target_value;
            let report = harness.run_batches(config.total_samples, config.batch_size, |_| target)?;
            report_errors(&report);
            let mut sink = open_sink(&cli.output)?;
            write_distribution(sink.as_mut(), &summarize(&report.samples))
                .context("Failed to write distribution")?;
        }
        Command::CostCurve { .. } => {
            let harness = SimulationHarness::new(
                &repo,
                config.build_params(),
                PointsCache::new(config.cache_ttl()),
                seed,
            );
            let range = config.value_sampler_range;
            let report =
                harness.run_batches(config.total_samples, config.batch_size, |rng| range.sample(rng))?;
            report_errors(&report);
            let mut sink = open_sink(&cli.output)?;
            write_price_curve(sink.as_mut(), &report.price_curve)
                .context("Failed to write price curve")?;
        }
    }

    Ok(())
}
