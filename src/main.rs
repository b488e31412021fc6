use anyhow::Result;
use clap::Parser;

use cleanseq::prelude::*;
use cleanseq::stage::StageJob;
use cleanseq::terminal::{App, Commands};
use cleanseq::tools::report_tools;

fn run_stage(job: StageJob) -> Result<()> {
    match job.run()? {
        StageOutcome::Skipped(tool) => {
            log::warn!("Stage skipped because `{}` is not available", tool);
        }
        StageOutcome::Done(run) => {
            log::info!(
                "Cleaned {} sample(s) in {} ({} of {} invocations failed)",
                run.samples.len(),
                run.module_dir.display(),
                run.record.failed(),
                run.record.entries.len()
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = App::parse();

    init_logger(cli.log_file.clone());

    match cli.command {
        Commands::Quality(args) => {
            run_stage(args.validate_and_build()?)?;
        }
        Commands::Contaminants(args) => {
            run_stage(args.validate_and_build()?)?;
        }
        Commands::Parallel(args) => {
            let (fanout, samples) = args.validate_and_build()?;
            match fanout.run(&samples) {
                Ok(true) => log::info!("All fan-out jobs completed"),
                Ok(false) => log::warn!("Some fan-out jobs failed, see the stage logs"),
                Err(CleanseqError::MissingTool(tool)) => {
                    log::warn!("{}", CleanseqError::MissingTool(tool));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Tools(args) => {
            let tools = args.validate_and_build()?;
            match report_tools(&tools) {
                0 => log::info!("All external tools are available"),
                missing => log::warn!("{} external tool(s) are missing", missing),
            }
        }
    }

    Ok(())
}
