mod scenarios;

use ant_colony_core::events::{DomainEvent, EventHook, EventKind};
use ant_colony_core::{ParameterStore, Parameters, SimConfig, World};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scenarios::{FullOptions, Scenario};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ant-colony")]
#[command(about = "Headless ant colony pheromone simulation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario headless and report step metrics
    Run {
        #[arg(long, value_enum, default_value_t = Scenario::Demo)]
        scenario: Scenario,

        /// Setup config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Runtime parameter file (JSON); values are clamped to their ranges
        #[arg(long)]
        params: Option<PathBuf>,

        /// Override the config seed
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = 3600)]
        steps: usize,

        /// Seconds per tick
        #[arg(long, default_value_t = 1.0 / 60.0)]
        dt: f64,

        #[arg(long, default_value_t = 60)]
        sample_every: usize,

        /// Output directory for summary.json and events.jsonl (optional)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Also record per-agent snapshot and decision events
        #[arg(long)]
        agent_events: bool,

        #[arg(long, default_value_t = 1)]
        nests: usize,

        #[arg(long, default_value_t = 200)]
        agents: usize,

        #[arg(long, default_value_t = 3)]
        clumps: usize,

        #[arg(long, default_value_t = 100)]
        clump_size: usize,
    },
    /// Dump the default setup config and runtime parameters to stdout
    DumpDefaultConfig,
}

#[derive(Serialize)]
struct DefaultConfig {
    config: SimConfig,
    params: Parameters,
}

/// Writes events as JSON lines.
struct JsonLinesHook {
    writer: BufWriter<File>,
    agent_events: bool,
    failed: bool,
}

impl EventHook for JsonLinesHook {
    fn on_event(&mut self, event: &DomainEvent) {
        if self.failed {
            return;
        }
        let written = serde_json::to_writer(&mut self.writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"));
        if let Err(e) = written {
            warn!(error = %e, "event log write failed; further events dropped");
            self.failed = true;
        }
    }

    fn wants(&self, kind: EventKind) -> bool {
        self.agent_events || !matches!(kind, EventKind::AgentSnapshot | EventKind::AgentDecision)
    }
}

impl Drop for JsonLinesHook {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(error = %e, "failed to flush event log");
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {what} file"))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("failed to parse {what}"))
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig => {
            let defaults = DefaultConfig {
                config: SimConfig::default(),
                params: Parameters::default(),
            };
            println!("{}", serde_json::to_string_pretty(&defaults)?);
        }
        Commands::Run {
            scenario,
            config,
            params,
            seed,
            steps,
            dt,
            sample_every,
            out,
            agent_events,
            nests,
            agents,
            clumps,
            clump_size,
        } => {
            let mut sim_config: SimConfig = match &config {
                Some(path) => read_json(path, "config")?,
                None => SimConfig::default(),
            };
            if let Some(seed) = seed {
                sim_config.seed = seed;
            }
            sim_config.validate().context("Config validation error")?;
            let parameters: Parameters = match &params {
                Some(path) => read_json(path, "parameters")?,
                None => Parameters::default(),
            };

            let mut world = World::try_new(sim_config, ParameterStore::new(parameters))
                .context("failed to initialize world")?;
            if let Some(out_dir) = &out {
                std::fs::create_dir_all(out_dir).context("failed to create output directory")?;
                let file = File::create(out_dir.join("events.jsonl"))
                    .context("failed to create event log")?;
                world.set_event_hook(JsonLinesHook {
                    writer: BufWriter::new(file),
                    agent_events,
                    failed: false,
                });
            }

            let full = FullOptions {
                nests,
                agents,
                clumps,
                clump_size,
            };
            scenarios::build(scenario, &mut world, full)?;
            info!(?scenario, steps, dt, "running scenario");

            let summary = world
                .try_run_experiment(steps, dt, sample_every)
                .context("invalid experiment arguments")?;
            world.stop();

            if let Some(out_dir) = out {
                let summary_path = out_dir.join("summary.json");
                let file = File::create(summary_path).context("failed to create summary file")?;
                serde_json::to_writer_pretty(file, &summary).context("failed to write summary")?;
                println!("Run complete. Results saved to {:?}", out_dir);
            } else {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            println!(
                "Delivered {} food in {} steps ({} pickups)",
                summary.total_delivered, summary.steps, summary.total_pickups
            );
        }
    }
    Ok(())
}
