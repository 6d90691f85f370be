//! `farm-scheduler` CLI — build a plan, serve the HTTP control surface, or
//! drive a scheduler against synthetic readings for local testing.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use farm_irrigation_scheduler::api::devices::{EmptySensorApi, LoggingDeviceControl};
use farm_irrigation_scheduler::api::{create_app, ApiState};
use farm_irrigation_scheduler::config::FarmRunnerConfig;
use farm_irrigation_scheduler::dispatch::DeviceControl;
use farm_irrigation_scheduler::model::FarmConfig;
use farm_irrigation_scheduler::plan::{build_plan, build_scenarios, ReadingResolutionMode};
use farm_irrigation_scheduler::scheduler::BatchScheduler;
use farm_irrigation_scheduler::waterlevel::{WaterLevelSource, WaterLevelStore};

#[derive(Parser, Debug)]
#[command(name = "farm-scheduler")]
#[command(about = "Paddy-field irrigation planning and dynamic batch execution")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an irrigation plan from a farm config file and print it as JSON.
    Build {
        /// Path to a FarmConfig JSON file.
        farm_config: PathBuf,
        /// Write the plan here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Build and compare plans across pump subsets instead of one plan.
        #[arg(long)]
        scenarios: bool,
    },
    /// Start the HTTP control surface and run the scheduler against a
    /// loaded farm config.
    Serve {
        /// Path to a FarmConfig JSON file to serve.
        farm_config: PathBuf,
        /// Override the bind address from the runner config.
        #[arg(long)]
        addr: Option<String>,
        /// Path to the water-level cache file.
        #[arg(long, default_value = "waterlevel_cache.json")]
        cache: PathBuf,
    },
    /// Build a plan and drive the scheduler to completion against
    /// config-default water levels, for local testing without a server.
    Simulate {
        /// Path to a FarmConfig JSON file.
        farm_config: PathBuf,
    },
}

fn load_farm_config(path: &std::path::Path) -> Result<FarmConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read farm config at {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse farm config at {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let runner_config = FarmRunnerConfig::load();

    match cli.command {
        Command::Build {
            farm_config,
            out,
            scenarios,
        } => {
            let farm_config = load_farm_config(&farm_config)?;
            let json = if scenarios {
                let comparison = build_scenarios(
                    &farm_config,
                    1,
                    ReadingResolutionMode::PurelyConfigured,
                    None,
                )?;
                serde_json::to_string_pretty(&comparison)?
            } else {
                let plan = build_plan(&farm_config, ReadingResolutionMode::PurelyConfigured, None, None)?;
                serde_json::to_string_pretty(&plan)?
            };

            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write plan to {}", path.display()))?;
                    info!(path = %path.display(), "plan written");
                }
                None => println!("{json}"),
            }
        }

        Command::Serve {
            farm_config,
            addr,
            cache,
        } => {
            let farm_config = load_farm_config(&farm_config)?;
            let bind_addr = addr.unwrap_or_else(|| runner_config.server.bind_addr.clone());

            let device_control: Arc<dyn DeviceControl> = Arc::new(LoggingDeviceControl);
            let state = ApiState::new(Some(farm_config), runner_config, device_control, cache);
            let app = create_app(state);

            info!(%bind_addr, "starting farm-scheduler HTTP control surface");
            let listener = tokio::net::TcpListener::bind(&bind_addr)
                .await
                .with_context(|| format!("failed to bind {bind_addr}"))?;
            axum::serve(listener, app)
                .await
                .context("HTTP server error")?;
        }

        Command::Simulate { farm_config } => {
            let farm_config = load_farm_config(&farm_config)?;
            let plan = build_plan(&farm_config, ReadingResolutionMode::PurelyConfigured, None, None)?;

            if plan.batches.is_empty() {
                info!("plan has zero batches, nothing to simulate");
                return Ok(());
            }

            let store = WaterLevelStore::new();
            let source = WaterLevelSource::new(Box::new(EmptySensorApi), runner_config.source.clone());
            let device_control: Arc<dyn DeviceControl> = Arc::new(LoggingDeviceControl);

            let scheduler = BatchScheduler::new(
                farm_config,
                plan,
                store,
                source,
                device_control,
                runner_config.scheduler.clone(),
            )?;

            let handle = scheduler.start();
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(
                    runner_config.scheduler.tick_interval_s,
                ))
                .await;
                let status = scheduler.status().await;
                let done = status.status != farm_irrigation_scheduler::scheduler::ExecutionStatus::Running;
                info!(status = ?status.status, current_batch = ?status.current_batch, "simulation tick");
                if done {
                    break;
                }
            }
            handle.await.context("scheduler driver task panicked")?;
        }
    }

    Ok(())
}
