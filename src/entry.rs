use clap::Parser;

use crate::app::{RunSettings, ServeSettings, run_local, run_server};
use crate::args::{Cli, Command};
use crate::config::{ConfigFile, load_config};
use crate::error::AppResult;

enum RunPlan {
    Local(RunSettings),
    Serve(ServeSettings),
}

/// Parses the command line, installs logging and runs the chosen mode to
/// completion on a multi-threaded runtime.
///
/// # Errors
///
/// Returns an error when the config file cannot be read, the settings are
/// invalid, or the selected mode fails.
pub fn run() -> AppResult<()> {
    let cli = Cli::parse();
    crate::logger::init_logging(cli.verbose);

    let file = load_config(cli.config.as_deref())?;
    let plan = build_plan(cli.command, file)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(execute_plan(plan))
}

fn build_plan(command: Command, file: Option<ConfigFile>) -> AppResult<RunPlan> {
    match command {
        Command::Run(args) => Ok(RunPlan::Local(RunSettings::resolve(&args, file))),
        Command::Serve(args) => {
            let settings = ServeSettings::resolve(&args, file).inspect_err(|err| {
                tracing::error!("{}", err);
            })?;
            Ok(RunPlan::Serve(settings))
        }
    }
}

async fn execute_plan(plan: RunPlan) -> AppResult<()> {
    match plan {
        RunPlan::Local(settings) => {
            run_local(settings).await?;
            Ok(())
        }
        RunPlan::Serve(settings) => run_server(settings).await,
    }
}
