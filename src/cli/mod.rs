//! CLI command handling
//!
//! Turns parsed commands into configuration, builds the platform session
//! and prints results.

use std::path::Path;

use crate::commands::{Commands, RunArgs};
use crate::common::config::Platform;
use crate::common::paths::config_path;
use crate::common::{Config, Result};
use crate::device::{AndroidSession, DeviceCapability, IosSession};
use crate::plan::{linearize, InvocationList, PlanNode};
use crate::report;
use crate::runner::{ConsoleTestExecutor, Orchestrator, RunOutcome, RunSettings, TestExecutor};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => run(args).await,

        Commands::Plan { path } => {
            let plan = load_plan(&path)?;
            print_order(&plan);
            println!(
                "{} entries, {} tests",
                plan.len(),
                plan.leaves().count()
            );
            Ok(())
        }

        Commands::Devices { platform, config } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(platform) = platform {
                config.general.platform = Some(platform);
            }

            let devices = match config.platform()? {
                Platform::Android => AndroidSession::new(&config)?.list_devices().await?,
                Platform::Ios => IosSession::new(&config)?.list_devices().await?,
            };

            if devices.is_empty() {
                println!("No devices connected");
            } else {
                for (i, device) in devices.iter().enumerate() {
                    println!("  {}. {}", i + 1, device);
                }
            }
            Ok(())
        }

        Commands::Config { config } => {
            let source = config.clone().or_else(config_path);
            let loaded = Config::load(config.as_deref())?;

            match source {
                Some(path) if path.exists() => println!("# {}", path.display()),
                Some(path) => println!("# {} (not found, using defaults)", path.display()),
                None => println!("# no config directory, using defaults"),
            }
            print!("{}", loaded.to_toml()?);
            Ok(())
        }
    }
}

/// Full run: configuration errors surface as `Err`, orchestration faults do not
async fn run(args: RunArgs) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);

    let platform = config.platform()?;
    let settings = RunSettings::from_config(&config)?;

    let plan = if config.skip.tests {
        InvocationList::default()
    } else {
        let plan = load_plan(&config.plan.path)?;
        print_order(&plan);
        plan
    };

    // The runner only has to exist when tests will run
    let executor = if config.skip.tests {
        None
    } else {
        Some(ConsoleTestExecutor::from_config(&config.runner)?)
    };

    let outcome = match platform {
        Platform::Android => {
            execute(AndroidSession::new(&config)?, executor, settings, &plan).await
        }
        Platform::Ios => execute(IosSession::new(&config)?, executor, settings, &plan).await,
    };

    if !plan.is_empty() {
        report::render(&plan, &outcome.results).print();
    }
    if let Some(failure) = &outcome.failure {
        println!("Run stopped at '{}': {}", outcome.reached, failure);
    }
    Ok(())
}

/// Drive one run over any capability
pub async fn execute<C, E>(
    capability: C,
    executor: E,
    settings: RunSettings,
    plan: &InvocationList,
) -> RunOutcome
where
    C: DeviceCapability,
    E: TestExecutor,
{
    Orchestrator::new(capability, executor, settings)
        .run(plan)
        .await
}

/// Load, validate and linearize a plan file
pub fn load_plan(path: &Path) -> Result<InvocationList> {
    let root = PlanNode::load(path)?;
    tracing::debug!(path = %path.display(), tests = root.leaf_count(), "Plan loaded");
    Ok(linearize(&root))
}

fn print_order(plan: &InvocationList) {
    println!("\nOrder of tests to be run parsed from tree file:");
    for entry in plan {
        println!("{}", entry);
    }
    println!();
}
